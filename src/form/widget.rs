use super::options::WidgetOptions;
use super::proposition::Proposition;
use super::state::FormEvent;
use serde_json::Value;
use std::path::PathBuf;

/// Label of the dropdown entry that stores `null`.
pub const CHOOSE_LABEL: &str = "-- Choose an option --";

/// Index of a variable inside one build pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub usize);

/// A data-bound widget as seen by validation and submit handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub key: String,
    pub label: String,
    pub value: Value,
    pub missing: bool,
    pub mandatory: bool,
    pub errors: Vec<String>,
    /// Stable identifier used by error-list links and focus tracking.
    pub anchor: String,
}

impl Variable {
    /// True when at least one error carries a message.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_empty())
    }

    /// Inline messages are shown only when every error has text.
    pub fn shows_errors(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(|e| !e.is_empty())
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.key
        } else {
            &self.label
        }
    }
}

/// Handle returned by the builder's variable methods.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub id: VarId,
    pub key: String,
    pub value: Value,
    pub missing: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Password,
    Number,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Submit,
    Close,
    Custom(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Button {
    pub label: String,
    /// `None` renders a disabled button.
    pub action: Option<ButtonAction>,
    pub tooltip: Option<String>,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Option<ButtonAction>) -> Self {
        Self {
            label: label.into(),
            action,
            tooltip: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        let tooltip = tooltip.into();
        self.tooltip = if tooltip.is_empty() {
            None
        } else {
            Some(tooltip)
        };
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub id: VarId,
    pub key: String,
}

/// What a widget looks like and how it reacts. Built fresh on every pass.
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetKind {
    Input {
        input: InputKind,
        text: String,
    },
    Dropdown {
        props: Vec<Proposition>,
        selected: Option<usize>,
        /// Offer a "choose" entry that stores `null`.
        null_entry: bool,
    },
    Choice {
        props: Vec<Proposition>,
        active: Option<usize>,
        untoggle: bool,
    },
    Radio {
        props: Vec<Proposition>,
        checked: Option<usize>,
        untoggle: bool,
    },
    Multi {
        props: Vec<Proposition>,
        checked: Vec<bool>,
    },
    File {
        paths: Vec<PathBuf>,
    },
    Calc {
        text: String,
    },
    Output {
        content: String,
    },
    Section {
        label: String,
        deployed: bool,
        children: Vec<Widget>,
    },
    Buttons {
        buttons: Vec<Button>,
    },
    ErrorList {
        label: String,
        force: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Widget {
    pub kind: WidgetKind,
    pub options: WidgetOptions,
    pub binding: Option<Binding>,
}

impl Widget {
    pub fn key(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.key.as_str())
    }

    /// Event for clicking option `index` of a choice, radio or multi widget.
    pub fn click(&self, index: usize) -> Option<FormEvent> {
        let key = self.key()?.to_string();
        match &self.kind {
            WidgetKind::Choice {
                props,
                active,
                untoggle,
            } => {
                let p = props.get(index)?;
                let value = if *untoggle && *active == Some(index) {
                    Value::Null
                } else {
                    p.value.clone()
                };
                Some(FormEvent::Pick { key, value })
            }
            WidgetKind::Radio {
                props,
                checked,
                untoggle,
            } => {
                let p = props.get(index)?;
                let value = if *untoggle && *checked == Some(index) {
                    Value::Null
                } else {
                    p.value.clone()
                };
                Some(FormEvent::Pick { key, value })
            }
            WidgetKind::Multi { props, checked } => {
                props.get(index)?;
                let now_checked = !checked.get(index).copied().unwrap_or(false);
                let nullify = now_checked && props[index].is_null();
                let mut selection: Vec<Value> = Vec::new();
                for (i, p) in props.iter().enumerate() {
                    let mut on = if i == index {
                        now_checked
                    } else {
                        checked.get(i).copied().unwrap_or(false)
                    };
                    // The null box and the regular boxes exclude each other.
                    if p.is_null() != nullify {
                        on = false;
                    }
                    if on {
                        selection.push(p.value.clone());
                    }
                }
                Some(FormEvent::Pick {
                    key,
                    value: Value::Array(selection),
                })
            }
            _ => None,
        }
    }

    /// Values offered by a dropdown, the optional null entry first.
    pub fn dropdown_entries(&self) -> Vec<(Value, String)> {
        match &self.kind {
            WidgetKind::Dropdown {
                props, null_entry, ..
            } => {
                let mut entries = Vec::with_capacity(props.len() + 1);
                if *null_entry {
                    entries.push((Value::Null, CHOOSE_LABEL.to_string()));
                }
                entries.extend(props.iter().map(|p| (p.value.clone(), p.label.clone())));
                entries
            }
            _ => Vec::new(),
        }
    }

    /// Position of the current value within [`Widget::dropdown_entries`].
    pub fn dropdown_position(&self) -> Option<usize> {
        match &self.kind {
            WidgetKind::Dropdown {
                selected,
                null_entry,
                ..
            } => match selected {
                Some(i) => Some(i + usize::from(*null_entry)),
                None if *null_entry => Some(0),
                None => None,
            },
            _ => None,
        }
    }

    /// Event for moving a dropdown selection by `step` entries, wrapping around.
    pub fn dropdown_step(&self, step: isize) -> Option<FormEvent> {
        let key = self.key()?.to_string();
        let entries = self.dropdown_entries();
        if entries.is_empty() {
            return None;
        }
        let len = entries.len() as isize;
        let next = match self.dropdown_position() {
            Some(pos) => (pos as isize + step).rem_euclid(len),
            None if step >= 0 => 0,
            None => len - 1,
        };
        let (value, _) = entries.into_iter().nth(next as usize)?;
        Some(FormEvent::Pick { key, value })
    }

    pub fn section_toggle(&self) -> Option<FormEvent> {
        match &self.kind {
            WidgetKind::Section { label, .. } => Some(FormEvent::ToggleSection {
                label: label.clone(),
            }),
            _ => None,
        }
    }
}
