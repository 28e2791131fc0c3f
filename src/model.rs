use crate::form::Values;
use crate::script::FormScript;
use crate::theme::ThemeMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Path to a form script, relative to the config file's directory.
    #[serde(default)]
    pub script: Option<String>,
    /// Inline form script.
    #[serde(default)]
    pub form: Option<FormScript>,
    /// Initial record the form edits.
    #[serde(default)]
    pub values: Values,
    #[serde(default)]
    pub theme: ThemeMode,
    /// Where to write the submitted record as JSON.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub exit_on_submit: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            script: None,
            form: None,
            values: Values::new(),
            theme: ThemeMode::default(),
            output: None,
            exit_on_submit: false,
        }
    }
}

fn default_title() -> String {
    "CHI Forms".to_string()
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        p
    } else {
        base_dir.join(p)
    }
}

impl AppConfig {
    /// The form to run: the inline script, or the referenced file.
    pub fn load_script(&self, base_dir: &Path) -> Result<FormScript> {
        if let Some(form) = &self.form {
            return Ok(form.clone());
        }
        let path = self
            .script
            .as_deref()
            .context("config has neither 'form' nor 'script'")?;
        FormScript::load(&resolve(base_dir, path))
    }

    pub fn output_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.output.as_deref().map(|p| resolve(base_dir, p))
    }
}

pub(crate) fn validate_app_config(cfg: &AppConfig) -> Result<(), String> {
    match (&cfg.form, &cfg.script) {
        (Some(_), Some(_)) => {
            return Err("config must set only one of 'form' and 'script'".to_string());
        }
        (None, None) => return Err("config requires either 'form' or 'script'".to_string()),
        (Some(form), None) => crate::script::validate_script(form)?,
        (None, Some(path)) => {
            if path.trim().is_empty() {
                return Err("'script' must not be empty".to_string());
            }
        }
    }
    if cfg.title.trim().is_empty() {
        return Err("'title' must not be empty".to_string());
    }
    if let Some(bad) = cfg.values.keys().find(|k| crate::form::key::decode_key(k).is_err()) {
        return Err(format!("initial value '{bad}' is not a valid variable key"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_inline_form_with_defaults() {
        let cfg: AppConfig = serde_yaml::from_str(
            r#"
form:
  items:
    - text: name
values:
  name: Ada
"#,
        )
        .unwrap();
        assert_eq!(cfg.title, "CHI Forms");
        assert_eq!(cfg.theme, ThemeMode::Dark);
        assert_eq!(cfg.values["name"], json!("Ada"));
        assert!(validate_app_config(&cfg).is_ok());
        assert_eq!(
            cfg.load_script(Path::new(".")).unwrap().items.len(),
            1
        );
    }

    #[test]
    fn rejects_missing_or_double_form_source() {
        let cfg = AppConfig::default();
        assert!(validate_app_config(&cfg)
            .unwrap_err()
            .contains("either 'form' or 'script'"));
        let cfg = AppConfig {
            script: Some("a.yaml".into()),
            form: Some(FormScript::default()),
            ..AppConfig::default()
        };
        assert!(validate_app_config(&cfg).unwrap_err().contains("only one"));
    }

    #[test]
    fn rejects_bad_initial_keys() {
        let mut cfg = AppConfig {
            script: Some("a.yaml".into()),
            ..AppConfig::default()
        };
        cfg.values.insert("not a key".into(), json!(1));
        assert!(validate_app_config(&cfg).unwrap_err().contains("not a key"));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let cfg = AppConfig {
            output: Some("out/record.json".into()),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.output_path(Path::new("/etc/forms")),
            Some(PathBuf::from("/etc/forms/out/record.json"))
        );
        assert!(cfg.load_script(Path::new("/nonexistent")).is_err());
    }
}
