//! File logging. The terminal belongs to the form, so nothing goes to stdout.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "CHI_FORMS_LOG";
pub const LOG_FILE_ENV: &str = "CHI_FORMS_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "chi-forms.log";
const DEFAULT_FILTER: &str = "info";

pub fn log_path() -> PathBuf {
    std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

pub fn init() -> Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let path = log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {path:?}"))?;

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}
