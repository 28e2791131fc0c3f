//! One live form: model, layout function, handlers and the latest pass.
//!
//! Control flow is always the same: an event mutates the model, the layout
//! function runs again from scratch, and the host re-renders the new pass.

use super::builder::{FormBuilder, Validator};
use super::error::FormResult;
use super::key::InstanceId;
use super::pass::{default_problems, FormPass};
use super::state::{FormEvent, FormModel, Phase, Values};
use super::widget::{ButtonAction, Variable};

pub type Layout = Box<dyn FnMut(&mut FormBuilder<'_>) -> FormResult<()>>;
pub type SubmitHandler = Box<dyn FnMut(&Values, &[Variable])>;
pub type ChangeHandler = Box<dyn FnMut(&FormPass)>;
pub type ButtonHandler = Box<dyn FnMut(&ButtonAction)>;

/// What [`FormSession::submit`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No submit handler, or the form was already submitted.
    Ignored,
    /// Validation reported problems; nothing changed.
    Invalid(Vec<String>),
    /// Mandatory fields are missing; they now show a "required" error.
    Rejected(Vec<String>),
    Submitted,
}

pub struct FormSession {
    instance: InstanceId,
    model: FormModel,
    layout: Layout,
    validate: Box<Validator>,
    on_submit: Option<SubmitHandler>,
    on_change: Option<ChangeHandler>,
    on_button: Option<ButtonHandler>,
    pass: FormPass,
    /// The model changed since `pass` was built.
    stale: bool,
}

impl FormSession {
    pub fn new<F>(instance: InstanceId, model: FormModel, layout: F) -> Self
    where
        F: FnMut(&mut FormBuilder<'_>) -> FormResult<()> + 'static,
    {
        Self {
            instance,
            model,
            layout: Box::new(layout),
            validate: Box::new(default_problems),
            on_submit: None,
            on_change: None,
            on_button: None,
            pass: FormPass::default(),
            stale: true,
        }
    }

    pub fn on_submit(mut self, handler: impl FnMut(&Values, &[Variable]) + 'static) -> Self {
        self.on_submit = Some(Box::new(handler));
        self
    }

    pub fn on_change(mut self, handler: impl FnMut(&FormPass) + 'static) -> Self {
        self.on_change = Some(Box::new(handler));
        self
    }

    pub fn on_button(mut self, handler: impl FnMut(&ButtonAction) + 'static) -> Self {
        self.on_button = Some(Box::new(handler));
        self
    }

    /// Replace the default validation ("missing block" and "any error").
    pub fn validate_with(mut self, validate: impl Fn(&FormPass) -> Vec<String> + 'static) -> Self {
        self.validate = Box::new(validate);
        self
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    pub fn pass(&self) -> &FormPass {
        &self.pass
    }

    pub fn values(&self) -> &Values {
        &self.model.values
    }

    pub fn phase(&self) -> Phase {
        self.model.phase
    }

    pub fn problems(&self) -> Vec<String> {
        (self.validate)(&self.pass)
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Re-run the layout function. On error the previous pass is kept.
    pub fn rebuild(&mut self) -> FormResult<&FormPass> {
        let mut builder = FormBuilder::new(&mut self.model, self.instance)
            .with_validator(&*self.validate)
            .with_submit(self.on_submit.is_some());
        (self.layout)(&mut builder)?;
        self.pass = builder.finish();
        self.stale = false;
        tracing::debug!(
            instance = %self.instance,
            variables = self.pass.variables.len(),
            errors = self.pass.error_count(),
            "form rebuilt"
        );
        if let Some(handler) = self.on_change.as_mut() {
            handler(&self.pass);
        }
        Ok(&self.pass)
    }

    /// Apply a change event; re-runs the layout when the model changed.
    pub fn dispatch(&mut self, event: FormEvent) -> FormResult<bool> {
        let changed = self.model.apply(event);
        if changed {
            self.stale = true;
            self.rebuild()?;
        }
        Ok(changed)
    }

    /// React to a button. Only `Submit` produces an outcome.
    pub fn press(&mut self, action: &ButtonAction) -> FormResult<Option<SubmitOutcome>> {
        match action {
            ButtonAction::Submit => self.submit().map(Some),
            other => {
                if let Some(handler) = self.on_button.as_mut() {
                    handler(other);
                }
                Ok(None)
            }
        }
    }

    pub fn submit(&mut self) -> FormResult<SubmitOutcome> {
        if self.on_submit.is_none() || self.model.phase == Phase::Submitted {
            return Ok(SubmitOutcome::Ignored);
        }
        // Validate what is about to be submitted, not an older pass.
        if self.stale {
            self.rebuild()?;
        }
        let problems = self.problems();
        if !problems.is_empty() {
            tracing::debug!(?problems, "submit ignored, form is invalid");
            return Ok(SubmitOutcome::Invalid(problems));
        }

        if !self.pass.missing_set.is_empty() {
            let missing: Vec<String> = self.pass.missing_set.iter().cloned().collect();
            tracing::warn!(instance = %self.instance, ?missing, "submit rejected, required fields missing");
            self.model.reject_missing(missing.iter().cloned());
            self.stale = true;
            self.rebuild()?;
            return Ok(SubmitOutcome::Rejected(missing));
        }

        if let Some(handler) = self.on_submit.as_mut() {
            handler(&self.model.values, &self.pass.variables);
        }
        self.model.phase = Phase::Submitted;
        tracing::info!(
            instance = %self.instance,
            fields = self.model.values.len(),
            "form submitted"
        );
        Ok(SubmitOutcome::Submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::builder::as_number;
    use crate::form::options::WidgetOptions;
    use crate::form::widget::WidgetKind;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<Values>>>;

    fn name_form(calls: &Calls) -> FormSession {
        let sink = Rc::clone(calls);
        FormSession::new(InstanceId(1), FormModel::new(), |f| {
            f.text("name", "Name", WidgetOptions::new().mandatory(true))?;
            Ok(())
        })
        .on_submit(move |values, _| sink.borrow_mut().push(values.clone()))
    }

    fn text(key: &str, text: &str) -> FormEvent {
        FormEvent::Text {
            key: key.into(),
            text: text.into(),
        }
    }

    #[test]
    fn name_scenario() {
        let calls: Calls = Rc::default();
        let mut session = name_form(&calls);
        session.rebuild().unwrap();

        assert_eq!(
            session.submit().unwrap(),
            SubmitOutcome::Rejected(vec!["name".into()])
        );
        assert!(calls.borrow().is_empty());
        assert_eq!(session.phase(), Phase::SubmitRejected);
        assert!(session.model().is_missing_error("name"));
        assert_eq!(
            session.pass().find("name").unwrap().errors,
            vec!["Required field missing"]
        );

        assert!(session.dispatch(text("name", "Alice")).unwrap());
        assert!(!session.pass().find("name").unwrap().missing);
        assert!(session.model().missing_errors.is_empty());
        assert_eq!(session.phase(), Phase::Editing);

        assert_eq!(session.submit().unwrap(), SubmitOutcome::Submitted);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(calls.borrow()[0]["name"], json!("Alice"));
        assert_eq!(session.phase(), Phase::Submitted);

        // terminal phase
        assert!(!session.dispatch(text("name", "Bob")).unwrap());
        assert_eq!(session.submit().unwrap(), SubmitOutcome::Ignored);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn submit_without_handler_is_a_no_op() {
        let mut session = FormSession::new(InstanceId(1), FormModel::new(), |f| {
            f.text("a", "A", WidgetOptions::new())?;
            Ok(())
        });
        session.rebuild().unwrap();
        assert_eq!(session.submit().unwrap(), SubmitOutcome::Ignored);
        assert_eq!(session.phase(), Phase::Fresh);
    }

    #[test]
    fn invalid_form_does_not_submit() {
        let calls: Calls = Rc::default();
        let sink = Rc::clone(&calls);
        let mut model = FormModel::new();
        model.set("age", json!(150));
        let mut session = FormSession::new(InstanceId(1), model, |f| {
            f.number("age", "Age", WidgetOptions::new().bounds(Some(0.0), Some(120.0)))?;
            Ok(())
        })
        .on_submit(move |values, _| sink.borrow_mut().push(values.clone()));
        session.rebuild().unwrap();
        assert!(!session.is_valid());
        assert!(matches!(session.submit().unwrap(), SubmitOutcome::Invalid(_)));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn custom_validation_replaces_default() {
        let mut session = FormSession::new(InstanceId(3), FormModel::new(), |f| {
            f.text("a", "A", WidgetOptions::new())?;
            Ok(())
        })
        .on_submit(|_, _| {})
        .validate_with(|pass| {
            if pass.value("a").is_null() {
                vec!["Fill in A".to_string()]
            } else {
                Vec::new()
            }
        });
        session.rebuild().unwrap();
        assert_eq!(session.problems(), vec!["Fill in A"]);
        session.dispatch(text("a", "x")).unwrap();
        assert!(session.is_valid());
    }

    #[test]
    fn color_untoggle_scenario() {
        for (untoggle, expected) in [(true, Value::Null), (false, json!("r"))] {
            let mut session = FormSession::new(InstanceId(2), FormModel::new(), move |f| {
                f.choice(
                    "color",
                    "Color",
                    [("r", "Red"), ("g", "Green")],
                    WidgetOptions::new().untoggle(untoggle),
                )?;
                Ok(())
            });
            session.rebuild().unwrap();
            let click = |s: &FormSession| s.pass().widgets[0].click(0).unwrap();

            let first = click(&session);
            session.dispatch(first).unwrap();
            assert_eq!(session.values()["color"], json!("r"));
            assert!(matches!(
                session.pass().widgets[0].kind,
                WidgetKind::Choice { active: Some(0), .. }
            ));

            let again = click(&session);
            session.dispatch(again).unwrap();
            assert_eq!(session.values()["color"], expected);
        }
    }

    #[test]
    fn radio_untoggle_scenario() {
        for (untoggle, expected) in [(true, Value::Null), (false, json!("l"))] {
            let mut session = FormSession::new(InstanceId(2), FormModel::new(), move |f| {
                f.radio(
                    "size",
                    "Size",
                    [("s", "Small"), ("l", "Large")],
                    WidgetOptions::new().untoggle(untoggle),
                )?;
                Ok(())
            });
            session.rebuild().unwrap();
            let click = |s: &FormSession| s.pass().widgets[0].click(1).unwrap();

            let first = click(&session);
            session.dispatch(first).unwrap();
            assert_eq!(session.values()["size"], json!("l"));
            assert!(matches!(
                session.pass().widgets[0].kind,
                WidgetKind::Radio { checked: Some(1), .. }
            ));

            let again = click(&session);
            session.dispatch(again).unwrap();
            assert_eq!(session.values()["size"], expected);
        }
    }

    #[test]
    fn pages_share_one_record() {
        let mut session = FormSession::new(InstanceId(8), FormModel::new(), |f| {
            f.page("identity", "Identity")?;
            f.page("health", "Health")?;
            match f.current_page() {
                Some("health") => f.number("weight", "Weight", WidgetOptions::new())?,
                _ => f.text("name", "Name", WidgetOptions::new())?,
            };
            Ok(())
        });
        session.rebuild().unwrap();
        assert!(session.pass().contains("name"));
        session.dispatch(text("name", "Ada")).unwrap();

        let go = FormEvent::GoToPage {
            key: "health".into(),
        };
        assert!(session.dispatch(go.clone()).unwrap());
        assert!(!session.dispatch(go).unwrap());
        assert_eq!(session.pass().page.as_deref(), Some("health"));
        assert!(session.pass().contains("weight"));
        assert!(!session.pass().contains("name"));
        assert_eq!(session.values()["name"], json!("Ada"));
    }

    #[test]
    fn change_and_button_handlers_fire() {
        let seen = Rc::new(RefCell::new(0));
        let pressed = Rc::new(RefCell::new(Vec::new()));
        let (seen_in, pressed_in) = (Rc::clone(&seen), Rc::clone(&pressed));
        let mut session = FormSession::new(InstanceId(4), FormModel::new(), |f| {
            f.text("a", "A", WidgetOptions::new())?;
            f.buttons("ok_cancel", WidgetOptions::new())
        })
        .on_change(move |_| *seen_in.borrow_mut() += 1)
        .on_button(move |action| pressed_in.borrow_mut().push(action.clone()));
        session.rebuild().unwrap();
        session.dispatch(text("a", "1")).unwrap();
        assert_eq!(*seen.borrow(), 2);
        assert_eq!(session.press(&ButtonAction::Close).unwrap(), None);
        assert_eq!(*pressed.borrow(), vec![ButtonAction::Close]);
    }

    #[test]
    fn layout_errors_keep_previous_pass() {
        let broken = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&broken);
        let mut session = FormSession::new(InstanceId(5), FormModel::new(), move |f| {
            f.text("a", "A", WidgetOptions::new())?;
            if *flag.borrow() {
                f.text("a", "again", WidgetOptions::new())?;
            }
            Ok(())
        });
        session.rebuild().unwrap();
        *broken.borrow_mut() = true;
        assert!(session.dispatch(text("a", "x")).is_err());
        assert_eq!(session.pass().variables.len(), 1);
    }

    #[test]
    fn submit_before_first_run_still_checks_mandatory_fields() {
        let calls: Calls = Rc::default();
        let mut session = name_form(&calls);
        assert_eq!(
            session.submit().unwrap(),
            SubmitOutcome::Rejected(vec!["name".into()])
        );
        assert!(calls.borrow().is_empty());
        assert_eq!(session.pass().variables.len(), 1);
    }

    #[test]
    fn submit_after_failed_rerun_does_not_use_old_pass() {
        let calls: Calls = Rc::default();
        let sink = Rc::clone(&calls);
        let mut session = FormSession::new(InstanceId(6), FormModel::new(), |f| {
            let n = f.number("n", "N", WidgetOptions::new().bounds(Some(0.0), Some(10.0)))?;
            if as_number(&n.value).is_some_and(|v| v > 50.0) {
                f.text("n", "again", WidgetOptions::new())?;
            }
            Ok(())
        })
        .on_submit(move |values, _| sink.borrow_mut().push(values.clone()));
        session.rebuild().unwrap();
        let event = FormEvent::Number {
            key: "n".into(),
            text: "99".into(),
        };
        assert!(session.dispatch(event).is_err());
        assert!(session.submit().is_err());
        assert!(calls.borrow().is_empty());
        assert_eq!(session.phase(), Phase::Editing);
    }
}
