//! Turns a [`FormPass`] into terminal lines plus the interactive targets
//! the host can focus and activate.
//!
//! Rendering is a pure function of the pass and the host's focus/draft
//! state. Ratatui's double-buffered terminal takes care of only touching
//! the cells that changed between frames.

use crate::form::{
    ButtonAction, FormEvent, FormPass, InputKind, Variable, Widget, WidgetKind, CHOOSE_LABEL,
};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block_themed;
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use std::collections::HashMap;

/// What activating a target does.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetAction {
    /// Ready-made change: option buttons, checkboxes, section legends.
    Event(FormEvent),
    /// Free text entry; the host keeps a draft and dispatches on change.
    Edit { key: String, input: InputKind },
    /// Dropdown cycling with the neighbouring entries precomputed.
    Dropdown {
        prev: Option<FormEvent>,
        next: Option<FormEvent>,
    },
    /// Comma-separated path entry.
    File { key: String },
    /// `None` for a disabled button.
    Button(Option<ButtonAction>),
    /// Error-list link to a variable anchor.
    Jump { anchor: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Stable across passes, so focus survives a re-run.
    pub id: String,
    /// Line index inside [`RenderedForm::lines`].
    pub line: usize,
    pub action: TargetAction,
}

#[derive(Clone, Debug, Default)]
pub struct RenderedForm {
    pub lines: Vec<Line<'static>>,
    pub targets: Vec<Target>,
}

impl RenderedForm {
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.id == id)
    }

    /// First target belonging to the variable behind `anchor`.
    pub fn index_of_anchor(&self, anchor: &str) -> Option<usize> {
        let option_prefix = format!("{anchor}#");
        self.targets
            .iter()
            .position(|t| t.id == anchor || t.id.starts_with(&option_prefix))
    }

    pub fn line_of(&self, id: &str) -> Option<usize> {
        self.targets.iter().find(|t| t.id == id).map(|t| t.line)
    }

    /// Plain text of every line, mostly for tests and headless output.
    pub fn plain_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }
}

/// Host state that influences rendering.
pub struct RenderContext<'a> {
    pub theme: &'a Theme,
    pub focus: Option<&'a str>,
    /// Text being typed, by variable key; wins over the stored value.
    pub drafts: &'a HashMap<String, String>,
    pub cursor_on: bool,
}

pub fn render_form(pass: &FormPass, ctx: &RenderContext<'_>) -> RenderedForm {
    let mut out = Out {
        ctx,
        pass,
        lines: Vec::new(),
        targets: Vec::new(),
        button_rows: 0,
    };
    out.page_tabs();
    for w in &pass.widgets {
        out.widget(w, 0);
    }
    RenderedForm {
        lines: out.lines,
        targets: out.targets,
    }
}

struct Out<'a> {
    ctx: &'a RenderContext<'a>,
    pass: &'a FormPass,
    lines: Vec<Line<'static>>,
    targets: Vec<Target>,
    button_rows: usize,
}

impl<'a> Out<'a> {
    /// Register a target on the line about to be pushed; true when focused.
    fn target(&mut self, id: String, action: TargetAction) -> bool {
        let focused = self.ctx.focus == Some(id.as_str());
        self.targets.push(Target {
            id,
            line: self.lines.len(),
            action,
        });
        focused
    }

    /// Tab row of a multi-page form, one target per page.
    fn page_tabs(&mut self) {
        let pass = self.pass;
        if pass.pages.is_empty() {
            return;
        }
        let theme = self.ctx.theme;
        let mut spans = vec![Span::styled("  Pages: ", theme.text_muted())];
        for page in pass.pages.iter() {
            let current = pass.page.as_deref() == Some(page.key.as_str());
            let focused = self.target(
                format!("page:{}", page.key),
                TargetAction::Event(FormEvent::GoToPage {
                    key: page.key.clone(),
                }),
            );
            let style = if focused {
                theme.list_cursor_style()
            } else if current {
                theme.text_active_bold()
            } else {
                Style::default()
            };
            let text = if current {
                format!("[{}]", page.label)
            } else {
                format!(" {} ", page.label)
            };
            spans.push(Span::styled(text, style));
            spans.push(Span::raw(" "));
        }
        self.push(spans);
        self.push(Vec::new());
    }

    fn push(&mut self, spans: Vec<Span<'static>>) {
        self.lines.push(Line::from(spans));
    }

    fn label_spans(&self, indent: &str, focused: bool, var: &Variable, w: &Widget) -> Vec<Span<'static>> {
        let theme = self.ctx.theme;
        let sel = if focused { '›' } else { ' ' };
        let req = if var.mandatory { " *" } else { "" };
        let style = if w.options.is_disabled() {
            theme.text_muted()
        } else if var.shows_errors() {
            theme.text_error()
        } else {
            Style::default()
        };
        vec![
            Span::raw(format!("{indent}{sel} ")),
            Span::styled(var.display_label().to_string(), style),
            Span::styled(req.to_string(), theme.mandatory_marker()),
            Span::raw(": "),
        ]
    }

    fn value_style(&self, focused: bool) -> Style {
        if focused {
            self.ctx.theme.text_editing_bold()
        } else {
            Style::default()
        }
    }

    fn widget(&mut self, w: &Widget, depth: usize) {
        let indent = "  ".repeat(depth);
        let var = w
            .binding
            .as_ref()
            .and_then(|b| self.pass.variable(b.id))
            .cloned();
        let interactive = !w.options.is_disabled();
        let theme = self.ctx.theme;

        match (&w.kind, var) {
            (WidgetKind::Input { input, text }, Some(var)) => {
                let focused = interactive
                    && self.target(
                        var.anchor.clone(),
                        TargetAction::Edit {
                            key: var.key.clone(),
                            input: *input,
                        },
                    );
                let raw = self
                    .ctx
                    .drafts
                    .get(&var.key)
                    .cloned()
                    .unwrap_or_else(|| text.clone());
                let mut shown = match input {
                    InputKind::Password => "•".repeat(raw.chars().count()),
                    _ => raw,
                };
                let mut spans = self.label_spans(&indent, focused, &var, w);
                if shown.is_empty() && !focused {
                    if let Some(p) = &w.options.placeholder {
                        spans.push(Span::styled(p.clone(), theme.text_muted()));
                    }
                } else {
                    if focused && self.ctx.cursor_on {
                        shown.push('▏');
                    }
                    self.affixed(&mut spans, w, shown, self.value_style(focused));
                }
                if w.options.is_large() {
                    // Label on its own line, value below.
                    let value = spans.split_off(4);
                    self.push(spans);
                    let mut body = vec![Span::raw(format!("{indent}    "))];
                    body.extend(value);
                    self.push(body);
                } else {
                    self.push(spans);
                }
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Dropdown { .. }, Some(var)) => {
                let focused = interactive
                    && self.target(
                        var.anchor.clone(),
                        TargetAction::Dropdown {
                            prev: w.dropdown_step(-1),
                            next: w.dropdown_step(1),
                        },
                    );
                let current = w
                    .dropdown_position()
                    .and_then(|pos| w.dropdown_entries().into_iter().nth(pos))
                    .map(|(_, label)| label)
                    .unwrap_or_else(|| CHOOSE_LABEL.to_string());
                let mut spans = self.label_spans(&indent, focused, &var, w);
                spans.push(Span::styled(
                    format!("‹ {current} ›"),
                    self.value_style(focused),
                ));
                self.push(spans);
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Choice { props, active, .. }, Some(var)) => {
                let mut any_focused = false;
                let mut options = Vec::new();
                for (i, p) in props.iter().enumerate() {
                    let focused = interactive
                        && match w.click(i) {
                            Some(ev) => self.target(
                                format!("{}#{i}", var.anchor),
                                TargetAction::Event(ev),
                            ),
                            None => false,
                        };
                    any_focused |= focused;
                    let style = if focused {
                        theme.list_cursor_style()
                    } else if *active == Some(i) {
                        theme.text_active_bold()
                    } else if !interactive {
                        theme.text_muted()
                    } else {
                        Style::default()
                    };
                    let mark = if *active == Some(i) { "✓ " } else { "" };
                    options.push(Span::styled(format!("[{mark}{}]", p.label), style));
                    options.push(Span::raw(" "));
                }
                let mut spans = self.label_spans(&indent, any_focused, &var, w);
                spans.extend(options);
                self.push(spans);
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Radio { props, checked, .. }, Some(var)) => {
                let spans = self.label_spans(&indent, false, &var, w);
                self.push(spans);
                for (i, p) in props.iter().enumerate() {
                    let on = *checked == Some(i);
                    self.option_row(&indent, w, &var, i, if on { "(•)" } else { "( )" }, &p.label);
                }
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Multi { props, checked }, Some(var)) => {
                let spans = self.label_spans(&indent, false, &var, w);
                self.push(spans);
                for (i, p) in props.iter().enumerate() {
                    let on = checked.get(i).copied().unwrap_or(false);
                    self.option_row(&indent, w, &var, i, if on { "[x]" } else { "[ ]" }, &p.label);
                }
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::File { paths }, Some(var)) => {
                let focused = interactive
                    && self.target(
                        var.anchor.clone(),
                        TargetAction::File {
                            key: var.key.clone(),
                        },
                    );
                let mut spans = self.label_spans(&indent, focused, &var, w);
                let draft = self.ctx.drafts.get(&var.key);
                match draft {
                    Some(d) => {
                        let mut d = d.clone();
                        if focused && self.ctx.cursor_on {
                            d.push('▏');
                        }
                        spans.push(Span::styled(d, self.value_style(true)));
                    }
                    None if paths.is_empty() => {
                        spans.push(Span::styled("(no file)", theme.text_muted()));
                    }
                    None => {
                        let list: Vec<String> =
                            paths.iter().map(|p| p.display().to_string()).collect();
                        spans.push(Span::styled(list.join(", "), self.value_style(focused)));
                    }
                }
                self.push(spans);
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Calc { text }, Some(var)) => {
                let mut spans = self.label_spans(&indent, false, &var, w);
                self.affixed(&mut spans, w, text.clone(), theme.text_active_bold());
                self.push(spans);
                self.decorations(&indent, &var, w);
            }
            (WidgetKind::Output { content }, _) => {
                for l in content.lines() {
                    self.push(vec![Span::raw(format!("{indent}  {l}"))]);
                }
            }
            (
                WidgetKind::Section {
                    label,
                    deployed,
                    children,
                },
                _,
            ) => {
                let focused = match w.section_toggle() {
                    Some(ev) => self.target(format!("section:{label}"), TargetAction::Event(ev)),
                    None => false,
                };
                let sel = if focused { '›' } else { ' ' };
                let arrow = if *deployed { '▾' } else { '▸' };
                let style = if focused {
                    theme.list_cursor_style()
                } else {
                    theme.section_title()
                };
                let mut spans = vec![
                    Span::raw(format!("{indent}{sel} ")),
                    Span::styled(format!("{arrow} {label}"), style),
                ];
                if !*deployed {
                    spans.push(Span::styled("  (open section)", theme.text_muted()));
                }
                self.push(spans);
                if *deployed {
                    for child in children {
                        self.widget(child, depth + 1);
                    }
                }
            }
            (WidgetKind::Buttons { buttons }, _) => {
                let row = self.button_rows;
                self.button_rows += 1;
                let mut spans = vec![Span::raw(format!("{indent}  "))];
                let mut tooltip = None;
                for (i, b) in buttons.iter().enumerate() {
                    let enabled = b.action.is_some() && interactive;
                    let action = if interactive { b.action.clone() } else { None };
                    let focused =
                        self.target(format!("button:{row}:{i}"), TargetAction::Button(action));
                    if focused {
                        tooltip = b.tooltip.clone();
                    }
                    spans.push(Span::styled(
                        format!("[ {} ]", b.label),
                        theme.button(enabled, focused),
                    ));
                    spans.push(Span::raw("  "));
                }
                self.push(spans);
                if let Some(tip) = tooltip {
                    for l in tip.lines() {
                        self.push(vec![Span::styled(
                            format!("{indent}    {l}"),
                            theme.text_muted(),
                        )]);
                    }
                }
            }
            (WidgetKind::ErrorList { label, force }, _) => {
                let erroneous: Vec<Variable> = self.pass.erroneous().cloned().collect();
                if erroneous.is_empty() && !force {
                    return;
                }
                self.push(vec![Span::styled(
                    format!("{indent}  {label}"),
                    theme.text_error().add_modifier(Modifier::BOLD),
                )]);
                if erroneous.is_empty() {
                    self.push(vec![Span::styled(
                        format!("{indent}    No errors"),
                        theme.text_muted(),
                    )]);
                }
                for var in erroneous {
                    let n = var.errors.iter().filter(|e| !e.is_empty()).count();
                    let focused = self.target(
                        format!("jump:{}", var.anchor),
                        TargetAction::Jump {
                            anchor: var.anchor.clone(),
                        },
                    );
                    let style = if focused {
                        theme.list_cursor_style()
                    } else {
                        theme.text_error()
                    };
                    self.push(vec![
                        Span::raw(format!("{indent}    ")),
                        Span::styled(
                            format!(
                                "→ {}: {n} error{}",
                                var.display_label(),
                                if n == 1 { "" } else { "s" }
                            ),
                            style,
                        ),
                    ]);
                }
            }
            (_, None) => {
                tracing::debug!(kind = ?w.kind, "variable widget without binding, skipped");
            }
        }
    }

    fn option_row(&mut self, indent: &str, w: &Widget, var: &Variable, i: usize, mark: &str, label: &str) {
        let theme = self.ctx.theme;
        let focused = !w.options.is_disabled()
            && match w.click(i) {
                Some(ev) => self.target(format!("{}#{i}", var.anchor), TargetAction::Event(ev)),
                None => false,
            };
        let style = if focused {
            theme.list_cursor_style()
        } else if w.options.is_disabled() {
            theme.text_muted()
        } else {
            Style::default()
        };
        let cur = if focused { '›' } else { ' ' };
        self.push(vec![
            Span::raw(format!("{indent}  {cur} ")),
            Span::styled(format!("{mark} {label}"), style),
        ]);
    }

    fn affixed(&self, spans: &mut Vec<Span<'static>>, w: &Widget, value: String, style: Style) {
        let theme = self.ctx.theme;
        if let Some(prefix) = &w.options.prefix {
            spans.push(Span::styled(format!("{prefix} "), theme.text_muted()));
        }
        spans.push(Span::styled(value, style));
        if let Some(suffix) = &w.options.suffix {
            spans.push(Span::styled(format!(" {suffix}"), theme.text_muted()));
        }
    }

    /// Inline errors and help text under a variable widget.
    fn decorations(&mut self, indent: &str, var: &Variable, w: &Widget) {
        let theme = self.ctx.theme;
        if var.shows_errors() {
            for err in &var.errors {
                self.push(vec![Span::styled(
                    format!("{indent}    ! {err}"),
                    theme.text_error(),
                )]);
            }
        }
        if let Some(help) = &w.options.help {
            self.push(vec![Span::styled(
                format!("{indent}    {help}"),
                theme.text_help(),
            )]);
        }
    }
}

/// Scroll offset that keeps `focus_line` inside a window of `height` rows.
pub fn scroll_offset(focus_line: Option<usize>, height: usize, previous: usize) -> usize {
    let Some(line) = focus_line else {
        return previous;
    };
    if height == 0 {
        return line;
    }
    if line < previous {
        line
    } else if line >= previous + height {
        line + 1 - height
    } else {
        previous
    }
}

/// Draw a rendered form inside a bordered panel. Returns the scroll offset used.
///
/// Lines are clipped, not wrapped, so each rendered line is one screen row
/// and the offset from [`scroll_offset`] is exact.
pub fn draw_form(
    f: &mut Frame,
    area: Rect,
    form: &RenderedForm,
    title: &str,
    theme: &Theme,
    focus: Option<&str>,
    previous_offset: usize,
) -> usize {
    let inner_height = area.height.saturating_sub(2) as usize;
    let focus_line = focus.and_then(|id| form.line_of(id));
    let offset = scroll_offset(focus_line, inner_height, previous_offset);
    let block = panel_block_themed(title, true, theme);
    let p = Paragraph::new(form.lines.clone())
        .block(block)
        .scroll((offset as u16, 0));
    f.render_widget(p, area);
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormModel, FormSession, InstanceId, WidgetOptions, MSG_REQUIRED};
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn render(session: &FormSession, focus: Option<&str>) -> RenderedForm {
        let theme = Theme::default();
        let drafts = HashMap::new();
        let ctx = RenderContext {
            theme: &theme,
            focus,
            drafts: &drafts,
            cursor_on: false,
        };
        render_form(session.pass(), &ctx)
    }

    fn profile() -> FormSession {
        let mut model = FormModel::new();
        model.set("age", json!(150));
        let mut s = FormSession::new(InstanceId(1), model, |f| {
            f.text("*name", "Name", WidgetOptions::new().help("As on your passport"))?;
            f.number("age", "Age", WidgetOptions::new().bounds(Some(0.0), Some(120.0)))?;
            f.choice("color", "Color", [("r", "Red"), ("g", "Green")], WidgetOptions::new())?;
            f.section(
                "More",
                |f| {
                    f.password("secret", "Secret", WidgetOptions::new())?;
                    Ok(())
                },
                WidgetOptions::new().deploy(false),
            )?;
            f.buttons("save", WidgetOptions::new())?;
            f.error_list(WidgetOptions::new());
            Ok(())
        })
        .on_submit(|_, _| {});
        s.rebuild().unwrap();
        s
    }

    #[test]
    fn lines_show_labels_markers_and_errors() {
        let s = profile();
        let out = render(&s, None);
        let text = out.plain_lines().join("\n");
        assert!(text.contains("Name *: "), "{text}");
        assert!(text.contains("As on your passport"));
        assert!(text.contains("! Must be between 0 and 120"));
        assert!(text.contains("[Red] [Green]"));
        assert!(text.contains("▸ More  (open section)"));
        assert!(!text.contains("Secret"));
        assert!(text.contains("[ Save ]"));
        assert!(text.contains("Error list"));
        assert!(text.contains("→ Age: 1 error"));
    }

    #[test]
    fn targets_follow_widget_order() {
        let s = profile();
        let out = render(&s, None);
        let ids: Vec<&str> = out.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "af_var_1_name",
                "af_var_1_age",
                "af_var_1_color#0",
                "af_var_1_color#1",
                "section:More",
                "button:0:0",
                "jump:af_var_1_age",
            ]
        );
        // the invalid form disables the save button
        assert_eq!(out.targets[5].action, TargetAction::Button(None));
        assert_eq!(out.index_of_anchor("af_var_1_color"), Some(2));
    }

    #[test]
    fn focused_disabled_button_shows_tooltip() {
        let s = profile();
        let out = render(&s, Some("button:0:0"));
        let text = out.plain_lines().join("\n");
        assert!(text.contains("The form contains errors"));
    }

    #[test]
    fn required_error_is_rendered_inline() {
        let mut s = FormSession::new(InstanceId(9), FormModel::new(), |f| {
            f.text("*name", "Name", WidgetOptions::new())?;
            Ok(())
        })
        .on_submit(|_, _| {});
        s.rebuild().unwrap();
        s.submit().unwrap();
        let text = render(&s, None).plain_lines().join("\n");
        assert!(text.contains(&format!("! {MSG_REQUIRED}")));
    }

    #[test]
    fn empty_error_messages_stay_hidden() {
        let mut s = FormSession::new(InstanceId(2), FormModel::new(), |f| {
            f.text("a", "A", WidgetOptions::new())?;
            f.error("a", "")?;
            f.error_list(WidgetOptions::new());
            Ok(())
        });
        s.rebuild().unwrap();
        let out = render(&s, None);
        assert_eq!(out.plain_lines().len(), 1);
    }

    #[test]
    fn dropdown_shows_choose_entry() {
        let mut s = FormSession::new(InstanceId(3), FormModel::new(), |f| {
            f.dropdown("d", "Pick", ["x", "y"], WidgetOptions::new())?;
            Ok(())
        });
        s.rebuild().unwrap();
        let out = render(&s, Some("af_var_3_d"));
        assert!(out.plain_lines()[0].contains(CHOOSE_LABEL));
        match &out.targets[0].action {
            TargetAction::Dropdown { next, .. } => assert_eq!(
                next,
                &Some(FormEvent::Pick {
                    key: "d".into(),
                    value: json!("x"),
                })
            ),
            other => panic!("expected dropdown, got {other:?}"),
        }
    }

    #[test]
    fn scroll_keeps_focus_visible() {
        assert_eq!(scroll_offset(Some(3), 10, 0), 0);
        assert_eq!(scroll_offset(Some(12), 10, 0), 3);
        assert_eq!(scroll_offset(Some(1), 10, 3), 1);
        assert_eq!(scroll_offset(None, 10, 4), 4);
    }

    #[test]
    fn page_tabs_become_targets() {
        let mut s = FormSession::new(InstanceId(4), FormModel::new(), |f| {
            f.page("one", "First")?;
            f.page("two", "Second")?;
            f.text("a", "A", WidgetOptions::new())?;
            Ok(())
        });
        s.rebuild().unwrap();
        let out = render(&s, None);
        assert!(out.plain_lines()[0].contains("[First]  Second"));
        assert_eq!(out.targets[0].id, "page:one");
        assert_eq!(
            out.targets[1].action,
            TargetAction::Event(FormEvent::GoToPage { key: "two".into() })
        );
        assert_eq!(out.line_of("af_var_4_a"), Some(2));
    }

    fn screen_rows(buf: &Buffer) -> Vec<String> {
        (0..buf.area.height)
            .map(|y| (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect())
            .collect()
    }

    #[test]
    fn long_help_text_does_not_push_focus_off_screen() {
        let help = "very long help text ".repeat(10);
        let mut s = FormSession::new(InstanceId(9), FormModel::new(), move |f| {
            for i in 0..6 {
                f.text(&format!("f{i}"), &format!("Field {i}"), WidgetOptions::new().help(&help))?;
            }
            Ok(())
        });
        s.rebuild().unwrap();
        let out = render(&s, Some("af_var_9_f5"));
        let theme = Theme::default();
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        let mut offset = 0;
        terminal
            .draw(|f| {
                offset = draw_form(f, f.area(), &out, "Long", &theme, Some("af_var_9_f5"), 0);
            })
            .unwrap();
        assert_eq!(offset, out.line_of("af_var_9_f5").unwrap() + 1 - 6);
        let rows = screen_rows(terminal.backend().buffer());
        assert!(rows.iter().any(|r| r.contains("Field 5")), "{rows:#?}");
    }

    #[test]
    fn draw_form_renders_into_buffer() {
        let s = profile();
        let out = render(&s, None);
        let theme = Theme::default();
        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                draw_form(f, f.area(), &out, "Profile", &theme, None, 0);
            })
            .unwrap();
        let buf = terminal.backend().buffer().clone();
        let mut rows = Vec::new();
        for y in 0..buf.area.height {
            let mut row = String::new();
            for x in 0..buf.area.width {
                row.push_str(buf[(x, y)].symbol());
            }
            rows.push(row);
        }
        let screen = rows.join("\n");
        assert!(screen.contains("Profile"));
        assert!(screen.contains("Name *:"));
    }
}
