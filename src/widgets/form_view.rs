//! Terminal host for a [`FormSession`].
//!
//! Keeps focus on a target id across re-runs, holds per-key drafts for
//! text being typed, and turns key presses into change events.

use super::Widget;
use crate::app::Effect;
use crate::form::{
    as_number, display_value, format_number, ButtonAction, FormEvent, FormResult, FormSession,
    InputKind, Phase, SubmitOutcome, Values,
};
use crate::render::{draw_form, render_form, RenderContext, RenderedForm, Target, TargetAction};
use crate::theme::Theme;
use crate::ui::ToastLevel;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

const TOAST_SECONDS: u64 = 3;

pub struct FormView {
    pub title: String,
    session: FormSession,
    theme: Theme,
    rendered: RenderedForm,
    focus: Option<String>,
    focus_index: usize,
    drafts: HashMap<String, String>,
    scroll: usize,
    cursor_on: bool,
    submitted: Rc<RefCell<Option<Values>>>,
    pressed: Rc<RefCell<Vec<ButtonAction>>>,
}

fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds: TOAST_SECONDS,
    }
}

impl FormView {
    /// Wrap a session. The view installs its own submit and button handlers.
    pub fn new(title: impl Into<String>, session: FormSession, theme: Theme) -> FormResult<Self> {
        let submitted = Rc::new(RefCell::new(None));
        let pressed = Rc::new(RefCell::new(Vec::new()));
        let (sink, presses) = (Rc::clone(&submitted), Rc::clone(&pressed));
        let session = session
            .on_submit(move |values, _| *sink.borrow_mut() = Some(values.clone()))
            .on_button(move |action| presses.borrow_mut().push(action.clone()));
        let mut view = Self {
            title: title.into(),
            session,
            theme,
            rendered: RenderedForm::default(),
            focus: None,
            focus_index: 0,
            drafts: HashMap::new(),
            scroll: 0,
            cursor_on: false,
            submitted,
            pressed,
        };
        view.session.rebuild()?;
        view.refresh();
        Ok(view)
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn rendered(&self) -> &RenderedForm {
        &self.rendered
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn submitted(&self) -> Option<Values> {
        self.submitted.borrow().clone()
    }

    fn render_lines(&self) -> RenderedForm {
        let ctx = RenderContext {
            theme: &self.theme,
            focus: self.focus.as_deref(),
            drafts: &self.drafts,
            cursor_on: self.cursor_on,
        };
        render_form(self.session.pass(), &ctx)
    }

    /// Re-render and re-resolve focus after the pass changed.
    fn refresh(&mut self) {
        self.rendered = self.render_lines();
        if let Some(i) = self.focus.as_deref().and_then(|id| self.rendered.index_of(id)) {
            self.focus_index = i;
            return;
        }
        // The focused target vanished (or nothing was focused yet): stay at
        // the same position.
        let n = self.rendered.targets.len();
        if n == 0 {
            self.focus = None;
            self.focus_index = 0;
            return;
        }
        self.focus_index = self.focus_index.min(n - 1);
        self.focus = Some(self.rendered.targets[self.focus_index].id.clone());
        self.rendered = self.render_lines();
    }

    fn set_focus(&mut self, index: usize) {
        let Some(target) = self.rendered.targets.get(index) else {
            return;
        };
        if self.focus.as_deref() != Some(target.id.as_str()) {
            self.drafts.clear();
        }
        self.focus = Some(target.id.clone());
        self.focus_index = index;
        self.rendered = self.render_lines();
    }

    fn move_focus(&mut self, delta: isize) {
        let n = self.rendered.targets.len() as isize;
        if n == 0 {
            return;
        }
        let next = (self.focus_index as isize + delta).rem_euclid(n);
        self.set_focus(next as usize);
    }

    fn step_page(&mut self, step: isize) -> Vec<Effect> {
        let pass = self.session.pass();
        match pass.pages.step(pass.page.as_deref(), step) {
            Some(key) => {
                let key = key.to_string();
                self.apply(FormEvent::GoToPage { key })
            }
            None => Vec::new(),
        }
    }

    fn current_target(&self) -> Option<Target> {
        self.rendered.targets.get(self.focus_index).cloned()
    }

    fn apply(&mut self, event: FormEvent) -> Vec<Effect> {
        match self.session.dispatch(event) {
            Ok(_) => {
                self.refresh();
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "layout failed after change");
                vec![toast(e.to_string(), ToastLevel::Error)]
            }
        }
    }

    /// Stored text of a variable, as the input shows it.
    fn current_text(&self, key: &str, input: InputKind) -> String {
        let value = self.session.pass().value(key);
        match input {
            InputKind::Number => as_number(&value).map(format_number).unwrap_or_default(),
            _ => display_value(&value),
        }
    }

    fn edit(&mut self, key: &str, input: InputKind, change: impl FnOnce(&mut String)) -> Vec<Effect> {
        let current = self.current_text(key, input);
        let draft = self.drafts.entry(key.to_string()).or_insert(current);
        change(draft);
        let text = draft.clone();
        let key = key.to_string();
        let event = match input {
            InputKind::Number => FormEvent::Number { key, text },
            InputKind::Text | InputKind::Password => FormEvent::Text { key, text },
        };
        self.apply(event)
    }

    fn commit_number(&mut self, key: &str) -> Vec<Effect> {
        let Some(draft) = self.drafts.remove(key) else {
            return Vec::new();
        };
        let raw = draft.trim();
        self.refresh();
        if !raw.is_empty() && raw.parse::<f64>().is_err() {
            return vec![toast(format!("'{raw}' is not a number"), ToastLevel::Error)];
        }
        Vec::new()
    }

    fn edit_paths(&mut self, key: &str, change: impl FnOnce(&mut String)) {
        let current = self
            .session
            .model()
            .file_lists
            .get(key)
            .map(|paths| {
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let draft = self.drafts.entry(key.to_string()).or_insert(current);
        change(draft);
        self.rendered = self.render_lines();
    }

    fn commit_paths(&mut self, key: &str) -> Vec<Effect> {
        let Some(draft) = self.drafts.remove(key) else {
            return Vec::new();
        };
        let paths: Vec<PathBuf> = draft
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        self.apply(FormEvent::File {
            key: key.to_string(),
            paths,
        })
    }

    pub fn submit(&mut self) -> Vec<Effect> {
        let outcome = match self.session.submit() {
            Ok(outcome) => outcome,
            Err(e) => return vec![toast(e.to_string(), ToastLevel::Error)],
        };
        self.refresh();
        match outcome {
            SubmitOutcome::Submitted => {
                let values = self.submitted().unwrap_or_default();
                vec![
                    toast("Form submitted", ToastLevel::Success),
                    Effect::Submitted(values),
                ]
            }
            SubmitOutcome::Rejected(keys) => {
                let pass = self.session.pass();
                let labels: Vec<String> = keys
                    .iter()
                    .filter_map(|k| pass.find(k))
                    .map(|v| v.display_label().to_string())
                    .collect();
                let first = keys
                    .first()
                    .and_then(|k| pass.find(k))
                    .and_then(|v| self.rendered.index_of_anchor(&v.anchor));
                if let Some(i) = first {
                    self.set_focus(i);
                }
                vec![toast(
                    format!("Required information missing: {}", labels.join(", ")),
                    ToastLevel::Error,
                )]
            }
            SubmitOutcome::Invalid(problems) => {
                vec![toast(problems.join("; "), ToastLevel::Error)]
            }
            SubmitOutcome::Ignored => {
                let msg = if self.session.phase() == Phase::Submitted {
                    "Form already submitted"
                } else {
                    "Nothing to submit"
                };
                vec![toast(msg, ToastLevel::Info)]
            }
        }
    }

    fn press(&mut self, action: &ButtonAction) -> Vec<Effect> {
        if *action == ButtonAction::Submit {
            return self.submit();
        }
        if let Err(e) = self.session.press(action) {
            return vec![toast(e.to_string(), ToastLevel::Error)];
        }
        let pressed: Vec<ButtonAction> = self.pressed.borrow_mut().drain(..).collect();
        pressed
            .into_iter()
            .map(|a| match a {
                ButtonAction::Close => Effect::Quit,
                ButtonAction::Submit => toast("Submit", ToastLevel::Info),
                ButtonAction::Custom(name) => toast(format!("Action: {name}"), ToastLevel::Info),
            })
            .collect()
    }

    fn copy_submitted(&self) -> Vec<Effect> {
        let Some(values) = self.submitted() else {
            return vec![toast("Nothing submitted yet", ToastLevel::Info)];
        };
        match serde_json::to_string_pretty(&values) {
            Ok(json) => vec![Effect::CopyToClipboard(json)],
            Err(e) => vec![toast(format!("Copy failed: {e}"), ToastLevel::Error)],
        }
    }

    /// Insert clipboard text into the focused text field or path entry.
    pub fn paste(&mut self, text: &str) -> Vec<Effect> {
        let line = text.lines().next().unwrap_or_default().to_string();
        match self.current_target().map(|t| t.action) {
            Some(TargetAction::Edit { key, input }) => {
                self.edit(&key, input, |draft| draft.push_str(&line))
            }
            Some(TargetAction::File { key }) => {
                self.edit_paths(&key, |draft| draft.push_str(&line));
                Vec::new()
            }
            _ => vec![toast("Nothing to paste into", ToastLevel::Info)],
        }
    }

    fn activate(&mut self, target: Target, code: KeyCode, ctrl: bool) -> Vec<Effect> {
        let activate = matches!(code, KeyCode::Enter | KeyCode::Char(' '));
        match target.action {
            TargetAction::Edit { key, input } => match code {
                KeyCode::Char(c) if !ctrl => self.edit(&key, input, |d| d.push(c)),
                KeyCode::Backspace => self.edit(&key, input, |d| {
                    d.pop();
                }),
                KeyCode::Enter if input == InputKind::Number => self.commit_number(&key),
                KeyCode::Enter => {
                    self.move_focus(1);
                    Vec::new()
                }
                _ => Vec::new(),
            },
            TargetAction::File { key } => match code {
                KeyCode::Char(c) if !ctrl => {
                    self.edit_paths(&key, |d| d.push(c));
                    Vec::new()
                }
                KeyCode::Backspace => {
                    self.edit_paths(&key, |d| {
                        d.pop();
                    });
                    Vec::new()
                }
                KeyCode::Enter => self.commit_paths(&key),
                _ => Vec::new(),
            },
            TargetAction::Event(event) if activate => self.apply(event),
            TargetAction::Dropdown { prev, next } => {
                let step = match code {
                    KeyCode::Left => prev,
                    KeyCode::Right | KeyCode::Enter | KeyCode::Char(' ') => next,
                    _ => None,
                };
                match step {
                    Some(event) => self.apply(event),
                    None => Vec::new(),
                }
            }
            TargetAction::Button(Some(action)) if activate => self.press(&action),
            TargetAction::Button(None) if activate => {
                let problems = self.session.problems();
                let msg = if problems.is_empty() {
                    "Button is disabled".to_string()
                } else {
                    problems.join("; ")
                };
                vec![toast(msg, ToastLevel::Info)]
            }
            TargetAction::Jump { anchor } if activate => {
                if let Some(i) = self.rendered.index_of_anchor(&anchor) {
                    self.set_focus(i);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

impl Widget for FormView {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64) {
        let cursor_on = focused && tick % 4 < 2;
        if cursor_on != self.cursor_on {
            self.cursor_on = cursor_on;
            self.rendered = self.render_lines();
        }
        let title = match self.session.phase() {
            Phase::Submitted => format!("{} (submitted)", self.title),
            Phase::SubmitRejected => format!("{} (incomplete)", self.title),
            Phase::Fresh | Phase::Editing => self.title.clone(),
        };
        self.scroll = draw_form(
            f,
            area,
            &self.rendered,
            &title,
            &self.theme,
            self.focus.as_deref(),
            self.scroll,
        );
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return vec![Effect::Quit],
            KeyCode::Char('s') if ctrl => return self.submit(),
            KeyCode::Char('y') if ctrl => return self.copy_submitted(),
            KeyCode::Char('v') if ctrl => return vec![Effect::PasteFromClipboard],
            KeyCode::Up | KeyCode::BackTab => {
                self.move_focus(-1);
                return Vec::new();
            }
            KeyCode::Down | KeyCode::Tab => {
                self.move_focus(1);
                return Vec::new();
            }
            KeyCode::PageDown => return self.step_page(1),
            KeyCode::PageUp => return self.step_page(-1),
            _ => {}
        }
        match self.current_target() {
            Some(target) => self.activate(target, key.code, ctrl),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormModel, InstanceId, WidgetOptions};
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(view: &mut FormView, s: &str) {
        for c in s.chars() {
            view.on_key(key(KeyCode::Char(c)));
        }
    }

    fn view() -> FormView {
        let session = FormSession::new(InstanceId(1), FormModel::new(), |f| {
            f.text("*name", "Name", WidgetOptions::new())?;
            f.number("age", "Age", WidgetOptions::new())?;
            f.choice("color", "Color", [("r", "Red"), ("g", "Green")], WidgetOptions::new())?;
            f.buttons("save", WidgetOptions::new())
        });
        FormView::new("Profile", session, Theme::default()).unwrap()
    }

    fn has_toast(effects: &[Effect], level_ok: fn(&ToastLevel) -> bool) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, Effect::ShowToast { level, .. } if level_ok(level)))
    }

    #[test]
    fn focus_starts_on_first_target_and_wraps() {
        let mut v = view();
        assert_eq!(v.focus(), Some("af_var_1_name"));
        v.on_key(key(KeyCode::Up));
        assert_eq!(v.focus(), Some("button:0:0"));
        v.on_key(key(KeyCode::Tab));
        assert_eq!(v.focus(), Some("af_var_1_name"));
    }

    #[test]
    fn typing_updates_the_model_immediately() {
        let mut v = view();
        type_str(&mut v, "Alx");
        v.on_key(key(KeyCode::Backspace));
        type_str(&mut v, "ice");
        assert_eq!(v.session().values()["name"], json!("Alice"));
        // focus survives the re-runs
        assert_eq!(v.focus(), Some("af_var_1_name"));
    }

    #[test]
    fn partial_numbers_stay_in_the_draft() {
        let mut v = view();
        v.on_key(key(KeyCode::Down));
        type_str(&mut v, "-");
        assert!(!v.session().values().contains_key("age"));
        assert!(v.rendered().plain_lines()[1].contains('-'));
        type_str(&mut v, "4");
        assert_eq!(v.session().values()["age"], json!(-4.0));
        v.on_key(key(KeyCode::Backspace));
        type_str(&mut v, "x");
        let effects = v.on_key(key(KeyCode::Enter));
        assert!(has_toast(&effects, |l| matches!(l, ToastLevel::Error)));
        assert_eq!(v.session().values()["age"], json!(-4.0));
    }

    #[test]
    fn enter_on_option_picks_it() {
        let mut v = view();
        v.on_key(key(KeyCode::Down));
        v.on_key(key(KeyCode::Down));
        assert_eq!(v.focus(), Some("af_var_1_color#0"));
        v.on_key(key(KeyCode::Enter));
        assert_eq!(v.session().values()["color"], json!("r"));
        v.on_key(key(KeyCode::Char(' ')));
        assert_eq!(v.session().values()["color"], serde_json::Value::Null);
    }

    #[test]
    fn submit_flow_rejects_then_succeeds() {
        let mut v = view();
        v.on_key(key(KeyCode::Down));
        let effects = v.on_key(ctrl('s'));
        assert!(has_toast(&effects, |l| matches!(l, ToastLevel::Error)));
        assert_eq!(v.focus(), Some("af_var_1_name"));
        assert!(v
            .rendered()
            .plain_lines()
            .iter()
            .any(|l| l.contains("Required field missing")));

        type_str(&mut v, "Ada");
        let effects = v.on_key(ctrl('s'));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Submitted(values) if values["name"] == json!("Ada"))));
        assert_eq!(v.submitted().unwrap()["name"], json!("Ada"));

        match v.on_key(ctrl('y')).as_slice() {
            [Effect::CopyToClipboard(json)] => assert!(json.contains("\"Ada\"")),
            _ => panic!("expected clipboard copy"),
        }
    }

    #[test]
    fn paste_goes_into_focused_text() {
        let mut v = view();
        v.paste("Grace\nHopper");
        assert_eq!(v.session().values()["name"], json!("Grace"));
        v.on_key(key(KeyCode::Up));
        let effects = v.paste("x");
        assert!(has_toast(&effects, |l| matches!(l, ToastLevel::Info)));
    }

    #[test]
    fn file_paths_commit_on_enter() {
        let session = FormSession::new(InstanceId(2), FormModel::new(), |f| {
            f.file("scan", "Scan", WidgetOptions::new())?;
            Ok(())
        });
        let mut v = FormView::new("Files", session, Theme::default()).unwrap();
        type_str(&mut v, "a.pdf, b.pdf");
        assert!(!v.session().values().contains_key("scan"));
        v.on_key(key(KeyCode::Enter));
        assert_eq!(v.session().values()["scan"], json!("a.pdf"));
        assert_eq!(v.session().model().file_lists["scan"].len(), 2);
    }

    #[test]
    fn close_button_quits() {
        let session = FormSession::new(InstanceId(3), FormModel::new(), |f| {
            f.buttons("ok_cancel", WidgetOptions::new())
        });
        let mut v = FormView::new("Confirm", session, Theme::default()).unwrap();
        v.on_key(key(KeyCode::Down));
        assert_eq!(v.focus(), Some("button:0:1"));
        let effects = v.on_key(key(KeyCode::Enter));
        assert!(matches!(effects.as_slice(), [Effect::Quit]));
    }

    #[test]
    fn pages_switch_by_key_and_tab() {
        let session = FormSession::new(InstanceId(5), FormModel::new(), |f| {
            f.page("one", "First")?;
            f.page("two", "Second")?;
            match f.current_page() {
                Some("two") => f.number("age", "Age", WidgetOptions::new())?,
                _ => f.text("name", "Name", WidgetOptions::new())?,
            };
            Ok(())
        });
        let mut v = FormView::new("Pages", session, Theme::default()).unwrap();
        assert_eq!(v.focus(), Some("page:one"));
        v.on_key(key(KeyCode::PageDown));
        assert_eq!(v.session().pass().page.as_deref(), Some("two"));
        assert!(v.session().pass().contains("age"));

        v.on_key(key(KeyCode::Enter));
        assert_eq!(v.session().pass().page.as_deref(), Some("one"));
        assert!(v.session().pass().contains("name"));
    }
}
