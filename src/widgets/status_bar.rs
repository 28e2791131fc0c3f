use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::form::Phase;
use crate::ui::{AppState, ToastLevel};

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Fresh => "fresh",
        Phase::Editing => "editing",
        Phase::SubmitRejected => "incomplete",
        Phase::Submitted => "submitted",
    }
}

pub fn draw_footer_combined(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(t) = &state.toast {
        let color = state.theme.toast_color(t.level);
        let tag = match t.level {
            ToastLevel::Success => "[OK]",
            ToastLevel::Error => "[ERROR]",
            ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!(" {tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }
    let session = state.form.session();
    spans.push(Span::styled(
        format!(" {} ", phase_label(session.phase())),
        Style::default().fg(state.theme.accent),
    ));
    let errors = session.pass().error_count();
    if errors > 0 {
        spans.push(Span::styled(
            format!("{errors} error(s) "),
            state.theme.text_error(),
        ));
    }
    spans.push(Span::raw(" |  "));
    spans.push(Span::styled(help_text.to_string(), state.theme.text_muted()));
    let p = Paragraph::new(Line::from(spans));
    f.render_widget(p, area);
}
