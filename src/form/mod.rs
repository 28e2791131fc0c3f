//! Declarative form building.
//!
//! A layout function receives a [`FormBuilder`] and describes the form by
//! calling widget methods on it. The builder reads values from the
//! [`FormModel`], records bindings and validation errors, and produces a
//! [`FormPass`]. [`FormSession`] reruns the layout after every change.

pub mod builder;
pub mod error;
pub mod key;
pub mod options;
pub mod pages;
pub mod pass;
pub mod proposition;
pub mod session;
pub mod state;
pub mod widget;

pub use builder::{as_number, format_number, ButtonList, FormBuilder, MSG_REQUIRED};
pub use error::{FormError, FormResult};
pub use key::{make_anchor, InstanceId, InstanceIds};
pub use options::{MissingMode, OptionsStack, WidgetOptions};
pub use pages::{Page, PageList};
pub use pass::{default_problems, FormPass, PROBLEM_ERRORS, PROBLEM_MISSING};
pub use proposition::{display_value, Proposition};
pub use session::{FormSession, SubmitOutcome};
pub use state::{FormEvent, FormModel, Phase, Values};
pub use widget::{
    Button, ButtonAction, Field, InputKind, VarId, Variable, Widget, WidgetKind, CHOOSE_LABEL,
};
