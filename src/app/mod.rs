use crate::form::Values;
use crate::ui::{AppState, Toast, ToastLevel};
use crate::widgets::Widget;
use crossterm::event::KeyEvent;

/// Ticks per second of the UI loop (200ms tick rate).
pub const TICKS_PER_SECOND: u64 = 5;

pub enum AppMsg {
    Key(KeyEvent),
    /// Clipboard text delivered after an `Effect::PasteFromClipboard`.
    Paste(String),
    Tick,
}

#[derive(Debug)]
pub enum Effect {
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    CopyToClipboard(String),
    PasteFromClipboard,
    /// The form accepted a submission with these values.
    Submitted(Values),
    Quit,
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    match msg {
        AppMsg::Key(key) => {
            state.dbg(format!("key {:?} {:?}", key.code, key.modifiers));
            state.form.on_key(key)
        }
        AppMsg::Paste(text) => {
            state.dbg(format!("paste {} chars", text.chars().count()));
            state.form.paste(&text)
        }
        AppMsg::Tick => {
            state.tick = state.tick.wrapping_add(1);
            if let Some(t) = &state.toast {
                if state.tick >= t.expires_at_tick {
                    state.toast = None;
                }
            }
            Vec::new()
        }
    }
}

/// Apply the effects that only touch application state. Clipboard and
/// file system effects are returned for the caller.
pub fn apply_local(state: &mut AppState, effects: Vec<Effect>) -> Vec<Effect> {
    let mut rest = Vec::new();
    for eff in effects {
        match eff {
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                state.dbg(format!("toast {level:?}: {text}"));
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: state.tick + seconds * TICKS_PER_SECOND,
                });
            }
            Effect::Quit => state.quit = true,
            Effect::Submitted(values) => {
                state.submitted = Some(values.clone());
                if state.config.exit_on_submit {
                    state.quit = true;
                }
                rest.push(Effect::Submitted(values));
            }
            other => rest.push(other),
        }
    }
    rest
}

#[cfg(test)]
mod tests;
