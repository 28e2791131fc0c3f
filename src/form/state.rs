//! Mutable data behind one form session.
//!
//! The builder reads from it on every pass; change events write to it.
//! Nothing in here knows about rendering.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

pub type Values = Map<String, Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Fresh,
    Editing,
    SubmitRejected,
    Submitted,
}

/// A change produced by interacting with a rendered widget.
#[derive(Clone, Debug, PartialEq)]
pub enum FormEvent {
    /// Text or password input; empty text stores `null`.
    Text { key: String, text: String },
    /// Raw numeric input; see [`FormModel::apply`] for partial input.
    Number { key: String, text: String },
    /// Choice, radio, dropdown or multi selection already resolved by the widget.
    Pick { key: String, value: Value },
    File { key: String, paths: Vec<PathBuf> },
    ToggleSection { label: String },
    /// Switch a multi-page form to another page.
    GoToPage { key: String },
}

impl FormEvent {
    pub fn key(&self) -> Option<&str> {
        match self {
            FormEvent::Text { key, .. }
            | FormEvent::Number { key, .. }
            | FormEvent::Pick { key, .. }
            | FormEvent::File { key, .. } => Some(key),
            FormEvent::ToggleSection { .. } | FormEvent::GoToPage { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FormModel {
    pub values: Values,
    /// Keys that get a visible "required" error after a rejected submit.
    pub missing_errors: BTreeSet<String>,
    pub sections_state: HashMap<String, bool>,
    pub file_lists: HashMap<String, Vec<PathBuf>>,
    /// Requested page of a multi-page form.
    pub page: Option<String>,
    pub phase: Phase,
}

impl FormModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded record.
    pub fn with_values(values: Values) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stored value, or `default` when the key was never set.
    pub fn get(&self, key: &str, default: Option<&Value>) -> Value {
        match self.values.get(key) {
            Some(v) => v.clone(),
            None => default.cloned().unwrap_or(Value::Null),
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn is_missing_error(&self, key: &str) -> bool {
        self.missing_errors.contains(key)
    }

    /// Expansion state of a section, seeded with `deploy` on first sight.
    pub fn section_deployed(&mut self, label: &str, deploy: bool) -> bool {
        *self
            .sections_state
            .entry(label.to_string())
            .or_insert(deploy)
    }

    /// Apply a change. Returns `false` when nothing was written.
    pub fn apply(&mut self, event: FormEvent) -> bool {
        if self.phase == Phase::Submitted {
            tracing::debug!(?event, "form already submitted, ignoring change");
            return false;
        }
        match event {
            FormEvent::GoToPage { key } => {
                // Navigation, not an edit: the phase stays as it is.
                if self.page.as_deref() == Some(key.as_str()) {
                    return false;
                }
                self.page = Some(key);
                return true;
            }
            FormEvent::Text { key, text } => {
                let value = if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                };
                self.write(key, value);
            }
            FormEvent::Number { key, text } => {
                let raw = text.trim();
                if raw.is_empty() {
                    self.write(key, Value::Null);
                } else {
                    // Keep the previous value on partial input such as "-" or "1e".
                    match raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                        Some(n) => self.write(key, Value::Number(n)),
                        None => return false,
                    }
                }
            }
            FormEvent::Pick { key, value } => self.write(key, value),
            FormEvent::File { key, paths } => {
                let first = paths
                    .first()
                    .map(|p| Value::String(p.display().to_string()))
                    .unwrap_or(Value::Null);
                self.file_lists.insert(key.clone(), paths);
                self.write(key, first);
            }
            FormEvent::ToggleSection { label } => {
                let entry = self.sections_state.entry(label).or_insert(true);
                *entry = !*entry;
            }
        }
        if self.phase == Phase::Fresh {
            self.phase = Phase::Editing;
        }
        true
    }

    fn write(&mut self, key: String, value: Value) {
        // The user is correcting the field, drop its pending "required" error.
        self.missing_errors.remove(&key);
        self.values.insert(key, value);
        if self.phase == Phase::SubmitRejected && self.missing_errors.is_empty() {
            self.phase = Phase::Editing;
        }
    }

    /// Replace the pending "required" errors after a rejected submit.
    pub fn reject_missing<I: IntoIterator<Item = String>>(&mut self, keys: I) {
        self.missing_errors.clear();
        self.missing_errors.extend(keys);
        self.phase = Phase::SubmitRejected;
    }
}
