use super::error::{FormError, FormResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingMode {
    /// Show the "required" error right away, not only after a rejected submit.
    Error,
    /// Block submission while the field is missing.
    Disable,
}

/// Widget configuration. Every field is optional so that a scope only
/// overrides what it names; the accessor methods apply the defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidgetOptions {
    /// Default value used while the model has nothing for the key.
    pub value: Option<Value>,
    pub mandatory: Option<bool>,
    pub missing_mode: Option<MissingMode>,
    /// Force the field to count as missing.
    pub missing: Option<bool>,
    pub disable: Option<bool>,
    pub help: Option<String>,
    pub large: Option<bool>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub untoggle: Option<bool>,
    /// Initial expansion of a section.
    pub deploy: Option<bool>,
    pub placeholder: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub size: Option<u16>,
    pub decimals: Option<u32>,
    /// Display calc values as-is instead of rounding them.
    pub raw: Option<bool>,
    /// Title of the error list.
    pub label: Option<String>,
    /// Show the error list even when it is empty.
    pub force: Option<bool>,
}

macro_rules! overlay_fields {
    ($base:expr, $over:expr, $($f:ident),* $(,)?) => {
        WidgetOptions {
            $($f: $over.$f.clone().or_else(|| $base.$f.clone()),)*
        }
    };
}

impl WidgetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options of the implicit base scope.
    pub fn base() -> Self {
        Self {
            deploy: Some(true),
            untoggle: Some(true),
            ..Self::default()
        }
    }

    /// Fields set in `over` win, the rest comes from `self`.
    pub fn overlay(&self, over: &WidgetOptions) -> WidgetOptions {
        overlay_fields!(
            self,
            over,
            value,
            mandatory,
            missing_mode,
            missing,
            disable,
            help,
            large,
            min,
            max,
            untoggle,
            deploy,
            placeholder,
            prefix,
            suffix,
            size,
            decimals,
            raw,
            label,
            force,
        )
    }

    pub fn mandatory(mut self, on: bool) -> Self {
        self.mandatory = Some(on);
        self
    }
    pub fn missing_mode(mut self, mode: MissingMode) -> Self {
        self.missing_mode = Some(mode);
        self
    }
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
    pub fn disable(mut self, on: bool) -> Self {
        self.disable = Some(on);
        self
    }
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }
    pub fn bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
    pub fn untoggle(mut self, on: bool) -> Self {
        self.untoggle = Some(on);
        self
    }
    pub fn deploy(mut self, on: bool) -> Self {
        self.deploy = Some(on);
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory.unwrap_or(false)
    }
    pub fn is_forced_missing(&self) -> bool {
        self.missing.unwrap_or(false)
    }
    pub fn is_disabled(&self) -> bool {
        self.disable.unwrap_or(false)
    }
    pub fn is_large(&self) -> bool {
        self.large.unwrap_or(false)
    }
    pub fn allows_untoggle(&self) -> bool {
        self.untoggle.unwrap_or(false)
    }
    pub fn deploys(&self) -> bool {
        self.deploy.unwrap_or(true)
    }
    pub fn is_raw(&self) -> bool {
        self.raw.unwrap_or(false)
    }
    pub fn is_forced(&self) -> bool {
        self.force.unwrap_or(false)
    }
    pub fn input_size(&self) -> u16 {
        self.size.unwrap_or(30)
    }
}

/// Scope stack behind `push_options` / `pop_options`.
#[derive(Clone, Debug)]
pub struct OptionsStack {
    scopes: Vec<WidgetOptions>,
}

impl Default for OptionsStack {
    fn default() -> Self {
        Self {
            scopes: vec![WidgetOptions::base()],
        }
    }
}

impl OptionsStack {
    pub fn current(&self) -> &WidgetOptions {
        // The base scope can never be popped.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Merge per-call options over the innermost scope.
    pub fn expand(&self, options: &WidgetOptions) -> WidgetOptions {
        self.current().overlay(options)
    }

    pub fn push(&mut self, options: &WidgetOptions) {
        let merged = self.expand(options);
        self.scopes.push(merged);
    }

    pub fn pop(&mut self) -> FormResult<()> {
        if self.scopes.len() < 2 {
            return Err(FormError::UnbalancedOptions);
        }
        self.scopes.pop();
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }
}
