//! YAML form scripts.
//!
//! A script is a list of items interpreted against a [`FormBuilder`] on
//! every pass, so `visible_if` conditions and calc formulas follow the
//! current values.
//!
//! ```yaml
//! items:
//!   - text: "*name"
//!     label: Name
//!     checks: { min_len: 2 }
//!   - section: Details
//!     options: { deploy: false }
//!     children:
//!       - number: age
//!         label: Age
//!         options: { min: 0, max: 130 }
//!   - buttons: save
//! ```
//!
//! Multi-page forms list their pages under `pages`; top-level `items` then
//! follow the current page's items on every page.

use crate::form::{
    as_number, Button, ButtonAction, ButtonList, FormBuilder, FormError, FormResult, PageList,
    WidgetOptions,
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FormScript {
    #[serde(default)]
    pub items: Vec<ScriptItem>,
    #[serde(default)]
    pub pages: Vec<PageScript>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageScript {
    pub page: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub items: Vec<ScriptItem>,
}

impl PageScript {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.page)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScriptItem {
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: WidgetOptions,
    /// Propositions for choice-like items, in any JSON shape.
    #[serde(default)]
    pub props: Vec<Value>,
    #[serde(default)]
    pub children: Option<Vec<ScriptItem>>,
    #[serde(default)]
    pub visible_if: Option<Condition>,
    #[serde(default)]
    pub checks: Option<Checks>,
    #[serde(default)]
    pub formula: Option<Formula>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Text(String),
    Password(String),
    Number(String),
    Dropdown(String),
    Choice(String),
    Binary(String),
    Boolean(String),
    Radio(String),
    Multi(String),
    Calc(String),
    File(String),
    Output(String),
    Section(String),
    /// Options scope around `children`.
    Scope(WidgetOptions),
    Buttons(ButtonsSpec),
    /// Optional title.
    ErrorList(Option<String>),
}

impl ItemKind {
    /// Raw key of a data-bound item, `*` marker included.
    pub fn key(&self) -> Option<&str> {
        match self {
            ItemKind::Text(k)
            | ItemKind::Password(k)
            | ItemKind::Number(k)
            | ItemKind::Dropdown(k)
            | ItemKind::Choice(k)
            | ItemKind::Binary(k)
            | ItemKind::Boolean(k)
            | ItemKind::Radio(k)
            | ItemKind::Multi(k)
            | ItemKind::Calc(k)
            | ItemKind::File(k) => Some(k),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ButtonsSpec {
    Preset(String),
    List(Vec<ButtonSpec>),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ButtonSpec {
    pub label: String,
    /// `submit`, `close`, or any custom name reported to the host.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub tooltip: Option<String>,
}

impl ButtonSpec {
    fn to_button(&self) -> Button {
        let action = self.action.as_deref().map(|a| match a {
            "submit" => ButtonAction::Submit,
            "close" => ButtonAction::Close,
            other => ButtonAction::Custom(other.to_string()),
        });
        Button::new(self.label.clone(), action)
            .with_tooltip(self.tooltip.clone().unwrap_or_default())
    }
}

/// Show an item only while another value matches.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    #[serde(default)]
    pub equals: Option<Value>,
    #[serde(default)]
    pub missing: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Checks {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Formula {
    pub op: FormulaOp,
    pub of: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormulaOp {
    Sum,
    Product,
    Ratio,
}

impl Formula {
    /// `null` as soon as one operand is missing or the ratio divides by zero.
    pub fn eval(&self, f: &FormBuilder<'_>) -> Value {
        let mut operands = Vec::with_capacity(self.of.len());
        for key in &self.of {
            match as_number(&lookup(f, key)) {
                Some(n) => operands.push(n),
                None => return Value::Null,
            }
        }
        let result = match self.op {
            FormulaOp::Sum => Some(operands.iter().sum()),
            FormulaOp::Product => Some(operands.iter().product()),
            FormulaOp::Ratio => match operands.as_slice() {
                [a, b] if *b != 0.0 => Some(a / b),
                _ => None,
            },
        };
        result
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Value of a variable built earlier in the pass, or the raw model entry.
fn lookup(f: &FormBuilder<'_>, key: &str) -> Value {
    match f.find(key) {
        Some(var) => var.value.clone(),
        None => f.model().get(key, None),
    }
}

/// JSON equality, except numbers compare by value (`2` matches `2.0`).
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

impl Condition {
    pub fn holds(&self, f: &FormBuilder<'_>) -> bool {
        let value = lookup(f, &self.key);
        if let Some(expected) = &self.equals {
            if !same_value(&value, expected) {
                return false;
            }
        }
        match self.missing {
            Some(want) => value.is_null() == want,
            None => self.equals.is_some() || !value.is_null(),
        }
    }
}

impl Checks {
    fn apply(&self, f: &mut FormBuilder<'_>, key: &str) -> FormResult<()> {
        let text = match f.value(key) {
            Value::String(s) => s,
            _ => return Ok(()),
        };
        let len = text.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                f.error(key, format!("Must be at least {min} characters"))?;
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                f.error(key, format!("Must be at most {max} characters"))?;
            }
        }
        if let Some(pattern) = &self.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(&text) => {
                    f.error(key, "Does not match required pattern")?;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%pattern, error = %e, "ignoring invalid check pattern"),
            }
        }
        Ok(())
    }
}

impl FormScript {
    pub fn from_yaml(s: &str) -> Result<Self> {
        let script: FormScript = serde_yaml::from_str(s).context("parsing form script")?;
        validate_script(&script).map_err(anyhow::Error::msg)?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        Self::from_yaml(&s).with_context(|| format!("loading form script {path:?}"))
    }

    /// Layout function body: replay every item against the builder.
    pub fn build(&self, f: &mut FormBuilder<'_>) -> FormResult<()> {
        for page in &self.pages {
            f.page(&page.page, page.label())?;
        }
        let current = f.current_page().map(str::to_string);
        if let Some(page) = current.and_then(|key| self.pages.iter().find(|p| p.page == key)) {
            build_items(&page.items, f)?;
        }
        build_items(&self.items, f)
    }
}

fn build_items(items: &[ScriptItem], f: &mut FormBuilder<'_>) -> FormResult<()> {
    for item in items {
        build_item(item, f)?;
    }
    Ok(())
}

fn build_item(item: &ScriptItem, f: &mut FormBuilder<'_>) -> FormResult<()> {
    if let Some(cond) = &item.visible_if {
        if !cond.holds(f) {
            return Ok(());
        }
    }
    let label = item.label.as_str();
    let opts = item.options.clone();
    let props = || crate::form::proposition::normalize_json(&item.props);

    let field = match &item.kind {
        ItemKind::Text(k) => Some(f.text(k, label, opts)?),
        ItemKind::Password(k) => Some(f.password(k, label, opts)?),
        ItemKind::Number(k) => Some(f.number(k, label, opts)?),
        ItemKind::Dropdown(k) => Some(f.dropdown(k, label, props(), opts)?),
        ItemKind::Choice(k) => Some(f.choice(k, label, props(), opts)?),
        ItemKind::Binary(k) => Some(f.binary(k, label, opts)?),
        ItemKind::Boolean(k) => Some(f.boolean(k, label, opts)?),
        ItemKind::Radio(k) => Some(f.radio(k, label, props(), opts)?),
        ItemKind::Multi(k) => Some(f.multi(k, label, props(), opts)?),
        ItemKind::File(k) => Some(f.file(k, label, opts)?),
        ItemKind::Calc(k) => {
            let value = item
                .formula
                .as_ref()
                .map(|formula| formula.eval(f))
                .unwrap_or(Value::Null);
            Some(f.calc(k, label, value, opts)?)
        }
        ItemKind::Output(content) => {
            f.output(content.clone(), opts);
            None
        }
        ItemKind::Section(title) => {
            let children = item
                .children
                .as_deref()
                .ok_or_else(|| FormError::SectionWithoutBody(title.clone()))?;
            f.section(title, |f| build_items(children, f), opts)?;
            None
        }
        ItemKind::Scope(scope) => {
            f.push_options(scope.clone());
            build_items(item.children.as_deref().unwrap_or_default(), f)?;
            f.pop_options()?;
            None
        }
        ItemKind::Buttons(ButtonsSpec::Preset(name)) => {
            f.buttons(name.as_str(), opts)?;
            None
        }
        ItemKind::Buttons(ButtonsSpec::List(list)) => {
            let buttons: Vec<Button> = list.iter().map(ButtonSpec::to_button).collect();
            f.buttons(buttons, opts)?;
            None
        }
        ItemKind::ErrorList(title) => {
            let mut opts = opts;
            if title.is_some() {
                opts.label = title.clone();
            }
            f.error_list(opts);
            None
        }
    };

    if let (Some(field), Some(checks)) = (field, &item.checks) {
        checks.apply(f, &field.key)?;
    }
    Ok(())
}

/// Static checks run once at load time.
pub fn validate_script(script: &FormScript) -> Result<(), String> {
    let mut keys = HashSet::new();
    validate_items(&script.items, &mut keys, "items")?;
    let mut pages = PageList::new();
    for (i, page) in script.pages.iter().enumerate() {
        let at = format!("pages[{i}]");
        pages
            .add(&page.page, page.label())
            .map_err(|e| format!("{at}: {e}"))?;
        // Only one page is built per pass, so keys may repeat across pages.
        let mut page_keys = keys.clone();
        validate_items(&page.items, &mut page_keys, &format!("{at}.items"))?;
    }
    Ok(())
}

fn validate_items(
    items: &[ScriptItem],
    keys: &mut HashSet<String>,
    path: &str,
) -> Result<(), String> {
    for (i, item) in items.iter().enumerate() {
        let at = format!("{path}[{i}]");
        if let Some(raw) = item.kind.key() {
            let decoded = crate::form::key::decode_key(raw).map_err(|e| format!("{at}: {e}"))?;
            // Alternatives behind opposite `visible_if` conditions may share a key.
            if item.visible_if.is_none() && !keys.insert(decoded.name.clone()) {
                return Err(format!("{at}: duplicate key '{}'", decoded.name));
            }
        }
        match &item.kind {
            ItemKind::Section(title) => {
                let children = item
                    .children
                    .as_ref()
                    .ok_or_else(|| format!("{at}: section '{title}' has no children"))?;
                validate_items(children, keys, &format!("{at}.children"))?;
            }
            ItemKind::Scope(_) => {
                if let Some(children) = &item.children {
                    validate_items(children, keys, &format!("{at}.children"))?;
                }
            }
            ItemKind::Calc(k) => {
                if let Some(formula) = &item.formula {
                    if formula.of.is_empty() {
                        return Err(format!("{at}: calc '{k}' formula needs operands"));
                    }
                    if formula.op == FormulaOp::Ratio && formula.of.len() != 2 {
                        return Err(format!("{at}: calc '{k}' ratio takes exactly two keys"));
                    }
                }
            }
            ItemKind::Buttons(ButtonsSpec::Preset(name)) => {
                if !crate::form::builder::BUTTON_PRESETS.contains(&name.as_str()) {
                    return Err(format!("{at}: unknown button preset '{name}'"));
                }
            }
            _ => {}
        }
        if let Some(pattern) = item.checks.as_ref().and_then(|c| c.pattern.as_deref()) {
            Regex::new(pattern).map_err(|e| format!("{at}: invalid pattern: {e}"))?;
        }
    }
    Ok(())
}
