//! Declarative forms for the terminal.
//!
//! A layout function describes the form on every pass through a
//! [`form::FormBuilder`]; [`form::FormSession`] re-runs it on each change
//! and [`widgets::form_view::FormView`] hosts the session in a ratatui UI.

pub mod app;
pub mod form;
pub mod logging;
pub mod model;
pub mod render;
pub mod script;
pub mod theme;
pub mod ui;
pub mod widgets;
