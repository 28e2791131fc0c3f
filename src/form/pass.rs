use super::pages::PageList;
use super::widget::{VarId, Variable, Widget};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

pub const PROBLEM_MISSING: &str = "Required information missing";
pub const PROBLEM_ERRORS: &str = "The form contains errors";

/// Everything one run of the layout function produced.
#[derive(Clone, Debug, Default)]
pub struct FormPass {
    pub widgets: Vec<Widget>,
    pub variables: Vec<Variable>,
    index: HashMap<String, VarId>,
    /// Mandatory variables whose value is missing.
    pub missing_set: BTreeSet<String>,
    /// Set by `missing_mode: disable` fields; blocks submission outright.
    pub missing_block: bool,
    /// Variables in the order they first received an error.
    pub error_order: Vec<VarId>,
    /// Pages declared by the layout; empty for single-page forms.
    pub pages: PageList,
    /// Page this pass built.
    pub page: Option<String>,
}

impl FormPass {
    pub(crate) fn register(&mut self, variable: Variable) -> VarId {
        let id = VarId(self.variables.len());
        self.index.insert(variable.key.clone(), id);
        self.variables.push(variable);
        id
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn id_of(&self, key: &str) -> Option<VarId> {
        self.index.get(key).copied()
    }

    pub fn find(&self, key: &str) -> Option<&Variable> {
        self.id_of(key).map(|id| &self.variables[id.0])
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    /// Current value, `null` for unknown keys.
    pub fn value(&self, key: &str) -> Value {
        self.find(key).map(|v| v.value.clone()).unwrap_or(Value::Null)
    }

    pub(crate) fn flag(&mut self, id: VarId, msg: impl Into<String>) {
        let Some(var) = self.variables.get_mut(id.0) else {
            return;
        };
        if var.errors.is_empty() {
            self.error_order.push(id);
        }
        var.errors.push(msg.into());
    }

    /// Variables carrying at least one error message, in error order.
    pub fn erroneous(&self) -> impl Iterator<Item = &Variable> {
        self.error_order
            .iter()
            .filter_map(|id| self.variables.get(id.0))
            .filter(|v| v.has_errors())
    }

    pub fn error_count(&self) -> usize {
        self.erroneous().count()
    }
}

/// Validation used when the host does not install its own.
pub fn default_problems(pass: &FormPass) -> Vec<String> {
    let mut problems = Vec::new();
    if pass.missing_block {
        problems.push(PROBLEM_MISSING.to_string());
    }
    if pass.error_count() > 0 {
        problems.push(PROBLEM_ERRORS.to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(key: &str) -> Variable {
        Variable {
            key: key.into(),
            label: String::new(),
            value: Value::Null,
            missing: true,
            mandatory: false,
            errors: vec![],
            anchor: format!("af_var_1_{key}"),
        }
    }

    #[test]
    fn empty_messages_do_not_count_as_errors() {
        let mut pass = FormPass::default();
        let a = pass.register(var("a"));
        let b = pass.register(var("b"));
        pass.flag(a, "");
        assert!(default_problems(&pass).is_empty());
        pass.flag(b, "bad");
        pass.flag(b, "worse");
        assert_eq!(pass.error_order, vec![a, b]);
        assert_eq!(pass.error_count(), 1);
        assert_eq!(default_problems(&pass), vec![PROBLEM_ERRORS.to_string()]);
        pass.missing_block = true;
        assert_eq!(default_problems(&pass).len(), 2);
    }
}
