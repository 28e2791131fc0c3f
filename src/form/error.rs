/// Result alias for builder operations.
pub type FormResult<T> = std::result::Result<T, FormError>;

/// Mistakes in the layout code itself. User-input problems never end up
/// here; they are collected as error strings on the affected variable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Empty variable keys are not allowed")]
    EmptyKey,

    #[error("Invalid variable key '{0}': allowed characters are a-z, A-Z, _ and 0-9 (not as first character)")]
    InvalidKey(String),

    #[error("Variable '{0}' already exists")]
    DuplicateKey(String),

    #[error("Page '{0}' is already used in this form")]
    DuplicatePage(String),

    #[error("Variable '{0}' does not exist")]
    UnknownVariable(String),

    #[error("Too many pop_options() operations")]
    UnbalancedOptions,

    #[error(
        "Section '{0}' must contain children.\n\nMake sure the items are nested under the section:\n    - section: Title\n      children:\n        - text: key"
    )]
    SectionWithoutBody(String),

    #[error("Standard button list '{name}' does not exist.\n\nValid choices include:\n    {valid}")]
    UnknownButtonPreset { name: String, valid: String },
}
