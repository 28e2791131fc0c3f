//! The object handed to layout functions.
//!
//! Each widget method appends a descriptor to the current target list and,
//! for data-bound widgets, registers a variable against the model. The
//! layout function runs again from scratch after every change, so nothing
//! here outlives a single pass except what is written into the model.

use super::error::{FormError, FormResult};
use super::key::{decode_key, make_anchor, InstanceId};
use super::options::{MissingMode, OptionsStack, WidgetOptions};
use super::pages::PageList;
use super::pass::{default_problems, FormPass};
use super::proposition::{display_value, Proposition};
use super::state::FormModel;
use super::widget::{
    Binding, Button, ButtonAction, Field, InputKind, Variable, Widget, WidgetKind,
};
use serde_json::Value;

pub const MSG_REQUIRED: &str = "Required field missing";

pub type Validator = dyn Fn(&FormPass) -> Vec<String>;

/// Names accepted by [`FormBuilder::buttons`] as a preset.
pub const BUTTON_PRESETS: [&str; 2] = ["save", "ok_cancel"];

/// Either a preset name or an explicit button row.
#[derive(Clone, Debug, PartialEq)]
pub enum ButtonList {
    Preset(String),
    Explicit(Vec<Button>),
}

impl From<&str> for ButtonList {
    fn from(name: &str) -> Self {
        ButtonList::Preset(name.to_string())
    }
}

impl From<Vec<Button>> for ButtonList {
    fn from(buttons: Vec<Button>) -> Self {
        ButtonList::Explicit(buttons)
    }
}

pub struct FormBuilder<'a> {
    model: &'a mut FormModel,
    instance: InstanceId,
    validator: &'a Validator,
    can_submit: bool,
    options: OptionsStack,
    target: Vec<Widget>,
    pass: FormPass,
}

impl<'a> FormBuilder<'a> {
    pub fn new(model: &'a mut FormModel, instance: InstanceId) -> Self {
        Self {
            model,
            instance,
            validator: &default_problems,
            can_submit: false,
            options: OptionsStack::default(),
            target: Vec::new(),
            pass: FormPass::default(),
        }
    }

    pub fn with_validator(mut self, validator: &'a Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Tell the builder whether a submit handler is installed; presets use it.
    pub fn with_submit(mut self, can_submit: bool) -> Self {
        self.can_submit = can_submit;
        self
    }

    pub fn finish(mut self) -> FormPass {
        self.pass.widgets = std::mem::take(&mut self.target);
        self.pass.page = self.current_page().map(str::to_string);
        self.pass
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Read access to the model, for layouts that branch on raw record data.
    pub fn model(&self) -> &FormModel {
        &*self.model
    }

    // -- pages ----------------------------------------------------------------

    /// Declare a page of a multi-page form.
    pub fn page(&mut self, key: &str, label: &str) -> FormResult<()> {
        self.pass.pages.add(key, label)
    }

    pub fn pages(&self) -> &PageList {
        &self.pass.pages
    }

    /// The page to build: the one the model asks for if declared, else the first.
    pub fn current_page(&self) -> Option<&str> {
        self.pass
            .pages
            .resolve(self.model.page.as_deref())
            .map(|p| p.key.as_str())
    }

    // -- options scopes ---------------------------------------------------

    pub fn push_options(&mut self, options: WidgetOptions) {
        self.options.push(&options);
    }

    pub fn pop_options(&mut self) -> FormResult<()> {
        self.options.pop()
    }

    // -- lookups ------------------------------------------------------------

    pub fn find(&self, key: &str) -> Option<&Variable> {
        self.pass.find(key)
    }

    pub fn value(&self, key: &str) -> Value {
        self.pass.value(key)
    }

    pub fn missing(&self, key: &str) -> FormResult<bool> {
        self.pass
            .find(key)
            .map(|v| v.missing)
            .ok_or_else(|| FormError::UnknownVariable(key.to_string()))
    }

    /// Attach a user-input error to a variable built earlier in this pass.
    pub fn error(&mut self, key: &str, msg: impl Into<String>) -> FormResult<()> {
        let id = self
            .pass
            .id_of(key)
            .ok_or_else(|| FormError::UnknownVariable(key.to_string()))?;
        self.pass.flag(id, msg);
        Ok(())
    }

    pub fn proposition(&self, value: impl Into<Value>, label: impl Into<String>) -> Proposition {
        Proposition::new(value, label)
    }

    pub fn problems(&self) -> Vec<String> {
        (self.validator)(&self.pass)
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    pub fn pass(&self) -> &FormPass {
        &self.pass
    }

    // -- variable widgets ---------------------------------------------------

    pub fn text(&mut self, key: &str, label: &str, options: WidgetOptions) -> FormResult<Field> {
        self.input(key, label, options, InputKind::Text)
    }

    pub fn password(
        &mut self,
        key: &str,
        label: &str,
        options: WidgetOptions,
    ) -> FormResult<Field> {
        self.input(key, label, options, InputKind::Password)
    }

    fn input(
        &mut self,
        key: &str,
        label: &str,
        options: WidgetOptions,
        input: InputKind,
    ) -> FormResult<Field> {
        let (key, options) = self.prepare(key, options)?;
        let value = self.model.get(&key, options.value.as_ref());
        let missing = value.is_null();
        let kind = WidgetKind::Input {
            input,
            text: display_value(&value),
        };
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    pub fn number(&mut self, key: &str, label: &str, options: WidgetOptions) -> FormResult<Field> {
        let (key, options) = self.prepare(key, options)?;
        let number = as_number(&self.model.get(&key, options.value.as_ref()));
        let value = number
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        let kind = WidgetKind::Input {
            input: InputKind::Number,
            text: number.map(format_number).unwrap_or_default(),
        };
        let (min, max) = (options.min, options.max);
        let field = self.bind(key, label, value, number.is_none(), kind, options);

        if let Some(n) = number {
            let below = min.is_some_and(|m| n < m);
            let above = max.is_some_and(|m| n > m);
            if below || above {
                let msg = match (min, max) {
                    (Some(lo), Some(hi)) => format!(
                        "Must be between {} and {}",
                        format_number(lo),
                        format_number(hi)
                    ),
                    (Some(lo), None) => format!("Must be ≥ {}", format_number(lo)),
                    (None, _) => format!("Must be ≤ {}", format_number(max.unwrap_or(n))),
                };
                self.pass.flag(field.id, msg);
            }
        }
        Ok(field)
    }

    pub fn dropdown<I, P>(
        &mut self,
        key: &str,
        label: &str,
        props: I,
        options: WidgetOptions,
    ) -> FormResult<Field>
    where
        I: IntoIterator<Item = P>,
        P: Into<Proposition>,
    {
        let (key, options) = self.prepare(key, options)?;
        let props = super::proposition::normalize(props);
        let value = self.model.get(&key, options.value.as_ref());
        let selected = props.iter().position(|p| p.value == value);
        let kind = WidgetKind::Dropdown {
            null_entry: options.allows_untoggle() || selected.is_none(),
            props,
            selected,
        };
        let missing = value.is_null();
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    pub fn choice<I, P>(
        &mut self,
        key: &str,
        label: &str,
        props: I,
        options: WidgetOptions,
    ) -> FormResult<Field>
    where
        I: IntoIterator<Item = P>,
        P: Into<Proposition>,
    {
        let (key, options) = self.prepare(key, options)?;
        let props = super::proposition::normalize(props);
        let value = self.model.get(&key, options.value.as_ref());
        let kind = WidgetKind::Choice {
            active: props.iter().position(|p| p.value == value),
            untoggle: options.allows_untoggle(),
            props,
        };
        let missing = value.is_null();
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    pub fn binary(&mut self, key: &str, label: &str, options: WidgetOptions) -> FormResult<Field> {
        self.choice(key, label, [(1, "Yes"), (0, "No")], options)
    }

    pub fn boolean(&mut self, key: &str, label: &str, options: WidgetOptions) -> FormResult<Field> {
        self.choice(key, label, [(true, "Yes"), (false, "No")], options)
    }

    pub fn radio<I, P>(
        &mut self,
        key: &str,
        label: &str,
        props: I,
        options: WidgetOptions,
    ) -> FormResult<Field>
    where
        I: IntoIterator<Item = P>,
        P: Into<Proposition>,
    {
        let (key, options) = self.prepare(key, options)?;
        let props = super::proposition::normalize(props);
        let value = self.model.get(&key, options.value.as_ref());
        let kind = WidgetKind::Radio {
            checked: props.iter().position(|p| p.value == value),
            untoggle: options.allows_untoggle(),
            props,
        };
        let missing = value.is_null();
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    pub fn multi<I, P>(
        &mut self,
        key: &str,
        label: &str,
        props: I,
        options: WidgetOptions,
    ) -> FormResult<Field>
    where
        I: IntoIterator<Item = P>,
        P: Into<Proposition>,
    {
        let (key, options) = self.prepare(key, options)?;
        let props = super::proposition::normalize(props);
        let selection = match self.model.get(&key, options.value.as_ref()) {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        let checked = props.iter().map(|p| selection.contains(&p.value)).collect();
        let missing = selection.is_empty() && props.iter().any(Proposition::is_null);
        let kind = WidgetKind::Multi { props, checked };
        Ok(self.bind(key, label, Value::Array(selection), missing, kind, options))
    }

    pub fn file(&mut self, key: &str, label: &str, options: WidgetOptions) -> FormResult<Field> {
        let (key, options) = self.prepare(key, options)?;
        let value = match self.model.get(&key, options.value.as_ref()) {
            v @ Value::String(_) => v,
            _ => Value::Null,
        };
        let paths = if value.is_null() {
            Vec::new()
        } else {
            self.model.file_lists.get(&key).cloned().unwrap_or_default()
        };
        let missing = value.is_null();
        let kind = WidgetKind::File { paths };
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    /// Computed field: the value is written into the model on every pass.
    pub fn calc(
        &mut self,
        key: &str,
        label: &str,
        value: impl Into<Value>,
        options: WidgetOptions,
    ) -> FormResult<Field> {
        let (key, options) = self.prepare(key, options)?;
        let value = value.into();
        self.model.set(&key, value.clone());
        let text = match &value {
            Value::Number(n) if !options.is_raw() => {
                n.as_f64().map(round_display).unwrap_or_else(|| n.to_string())
            }
            other => display_value(other),
        };
        let missing = value.is_null();
        let kind = WidgetKind::Calc { text };
        Ok(self.bind(key, label, value, missing, kind, options))
    }

    // -- static widgets -----------------------------------------------------

    /// Free text. Empty content adds nothing.
    pub fn output(&mut self, content: impl Into<String>, options: WidgetOptions) {
        let content = content.into();
        if content.is_empty() {
            return;
        }
        let options = self.options.expand(&options);
        self.target.push(Widget {
            kind: WidgetKind::Output { content },
            options,
            binding: None,
        });
    }

    /// Collapsible group; `body` builds the children.
    pub fn section<F>(&mut self, label: &str, body: F, options: WidgetOptions) -> FormResult<()>
    where
        F: FnOnce(&mut Self) -> FormResult<()>,
    {
        let options = self.options.expand(&options);
        let outer = std::mem::take(&mut self.target);
        let built = body(self);
        let children = std::mem::replace(&mut self.target, outer);
        built?;

        let deployed = self.model.section_deployed(label, options.deploys());
        self.target.push(Widget {
            kind: WidgetKind::Section {
                label: label.to_string(),
                deployed,
                children,
            },
            options,
            binding: None,
        });
        Ok(())
    }

    pub fn buttons(&mut self, list: impl Into<ButtonList>, options: WidgetOptions) -> FormResult<()> {
        let options = self.options.expand(&options);
        let buttons = match list.into() {
            ButtonList::Explicit(buttons) => buttons,
            ButtonList::Preset(name) => self.preset(&name, options.label.as_deref())?,
        };
        self.target.push(Widget {
            kind: WidgetKind::Buttons { buttons },
            options,
            binding: None,
        });
        Ok(())
    }

    fn preset(&self, name: &str, label: Option<&str>) -> FormResult<Vec<Button>> {
        let problems = self.problems();
        let submit = (self.can_submit && problems.is_empty()).then_some(ButtonAction::Submit);
        let tooltip = problems.join("\n");
        match name {
            "save" => Ok(vec![
                Button::new(label.unwrap_or("Save"), submit).with_tooltip(tooltip)
            ]),
            "ok_cancel" => Ok(vec![
                Button::new(label.unwrap_or("OK"), submit).with_tooltip(tooltip),
                Button::new("Cancel", Some(ButtonAction::Close)),
            ]),
            _ => Err(FormError::UnknownButtonPreset {
                name: name.to_string(),
                valid: BUTTON_PRESETS.join(", "),
            }),
        }
    }

    /// Summary of erroneous variables, resolved when the pass is rendered.
    pub fn error_list(&mut self, options: WidgetOptions) {
        let options = self.options.expand(&options);
        let label = options
            .label
            .clone()
            .unwrap_or_else(|| "Error list".to_string());
        self.target.push(Widget {
            kind: WidgetKind::ErrorList {
                label,
                force: options.is_forced(),
            },
            options,
            binding: None,
        });
    }

    // -- internals ----------------------------------------------------------

    fn prepare(&self, raw_key: &str, options: WidgetOptions) -> FormResult<(String, WidgetOptions)> {
        let decoded = decode_key(raw_key)?;
        let mut options = self.options.expand(&options);
        if decoded.mandatory {
            options.mandatory = Some(true);
        }
        if self.pass.contains(&decoded.name) {
            return Err(FormError::DuplicateKey(decoded.name));
        }
        Ok((decoded.name, options))
    }

    fn bind(
        &mut self,
        key: String,
        label: &str,
        value: Value,
        missing: bool,
        kind: WidgetKind,
        options: WidgetOptions,
    ) -> Field {
        let missing = missing || options.is_forced_missing();
        let mandatory = options.is_mandatory();
        let id = self.pass.register(Variable {
            key: key.clone(),
            label: label.to_string(),
            value: value.clone(),
            missing,
            mandatory,
            errors: Vec::new(),
            anchor: make_anchor(self.instance, &key),
        });

        if mandatory && missing {
            self.pass.missing_set.insert(key.clone());
            if options.missing_mode == Some(MissingMode::Error) || self.model.is_missing_error(&key)
            {
                self.pass.flag(id, MSG_REQUIRED);
            }
            if options.missing_mode == Some(MissingMode::Disable) {
                self.pass.missing_block = true;
            }
        }

        self.target.push(Widget {
            kind,
            options,
            binding: Some(Binding {
                id,
                key: key.clone(),
            }),
        });
        Field {
            id,
            key,
            value,
            missing,
        }
    }
}

/// Numeric reading of a stored value; strings are parsed like user input.
pub fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Shortest decimal form that reads back as the same number. No exponent,
/// no trailing zeros.
pub fn format_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    v.to_string()
}

/// Two-decimal rounding for calc display, compensating binary drift first.
fn round_display(v: f64) -> String {
    let scaled = v * 100.0;
    let scaled = format!("{scaled:.11}").parse::<f64>().unwrap_or(scaled);
    format_number(scaled.round() / 100.0)
}
