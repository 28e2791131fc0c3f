use super::*;
use crate::ui::test_state;
use crossterm::event::{KeyCode, KeyModifiers};
use serde_json::json;

const NAME_FORM: &str = r#"
items:
  - text: "*name"
    label: Name
  - buttons: save
"#;

fn press(state: &mut AppState, code: KeyCode, modifiers: KeyModifiers) -> Vec<Effect> {
    let effects = update(state, AppMsg::Key(KeyEvent::new(code, modifiers)));
    apply_local(state, effects)
}

fn type_str(state: &mut AppState, s: &str) {
    for c in s.chars() {
        press(state, KeyCode::Char(c), KeyModifiers::NONE);
    }
}

#[test]
fn tick_expires_toast() {
    let mut st = test_state(NAME_FORM);
    let rest = apply_local(
        &mut st,
        vec![Effect::ShowToast {
            text: "hello".into(),
            level: ToastLevel::Info,
            seconds: 1,
        }],
    );
    assert!(rest.is_empty());
    assert_eq!(st.toast.as_ref().unwrap().expires_at_tick, TICKS_PER_SECOND);
    for _ in 0..TICKS_PER_SECOND - 1 {
        update(&mut st, AppMsg::Tick);
    }
    assert!(st.toast.is_some());
    update(&mut st, AppMsg::Tick);
    assert!(st.toast.is_none());
    assert_eq!(st.tick, TICKS_PER_SECOND);
}

#[test]
fn keys_reach_the_form() {
    let mut st = test_state(NAME_FORM);
    type_str(&mut st, "Ada");
    assert_eq!(st.form.session().values()["name"], json!("Ada"));
    assert!(st.debug_log.iter().any(|l| l.starts_with("key ")));
}

#[test]
fn missing_field_rejects_submit_with_error_toast() {
    let mut st = test_state(NAME_FORM);
    let rest = press(&mut st, KeyCode::Char('s'), KeyModifiers::CONTROL);
    assert!(rest.is_empty());
    let toast = st.toast.as_ref().unwrap();
    assert_eq!(toast.level, ToastLevel::Error);
    assert!(toast.text.contains("Name"));
    assert!(st.submitted.is_none());
    assert!(!st.quit);
}

#[test]
fn submit_records_values_and_passes_effect_on() {
    let mut st = test_state(NAME_FORM);
    type_str(&mut st, "Ada");
    let rest = press(&mut st, KeyCode::Char('s'), KeyModifiers::CONTROL);
    assert!(matches!(rest.as_slice(), [Effect::Submitted(v)] if v["name"] == json!("Ada")));
    assert_eq!(st.submitted.as_ref().unwrap()["name"], json!("Ada"));
    assert_eq!(st.toast.as_ref().unwrap().level, ToastLevel::Success);
    assert!(!st.quit);
}

#[test]
fn exit_on_submit_quits() {
    let mut st = test_state(NAME_FORM);
    st.config.exit_on_submit = true;
    type_str(&mut st, "Ada");
    press(&mut st, KeyCode::Char('s'), KeyModifiers::CONTROL);
    assert!(st.quit);
}

#[test]
fn escape_quits_and_clipboard_effects_are_returned() {
    let mut st = test_state(NAME_FORM);
    let rest = press(&mut st, KeyCode::Char('v'), KeyModifiers::CONTROL);
    assert!(matches!(rest.as_slice(), [Effect::PasteFromClipboard]));
    let rest = apply_local(&mut st, vec![Effect::CopyToClipboard("x".into())]);
    assert!(matches!(rest.as_slice(), [Effect::CopyToClipboard(s)] if s == "x"));
    press(&mut st, KeyCode::Esc, KeyModifiers::NONE);
    assert!(st.quit);
}

#[test]
fn paste_message_fills_focused_field() {
    let mut st = test_state(NAME_FORM);
    let effects = update(&mut st, AppMsg::Paste("Grace\nHopper".into()));
    apply_local(&mut st, effects);
    assert_eq!(st.form.session().values()["name"], json!("Grace"));
}
