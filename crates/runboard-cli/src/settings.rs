use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AnalysisArgs;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8321";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub include_successful_tasks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "gpt-4.1".to_string(),
            temperature: 0.0,
            include_successful_tasks: false,
        }
    }
}

impl Settings {
    /// File values first (explicit path, else ./runboard.yaml when present),
    /// then per-flag overrides on top.
    pub fn resolve(args: &AnalysisArgs) -> Result<Settings> {
        let mut settings = match &args.settings {
            Some(path) => Settings::load(path)?,
            None => {
                let default_path = default_settings_path();
                if default_path.exists() {
                    Settings::load(&default_path)?
                } else {
                    Settings::default()
                }
            }
        };
        if let Some(endpoint) = &args.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(model) = &args.model {
            settings.model = model.clone();
        }
        if let Some(temperature) = args.temperature {
            settings.temperature = temperature;
        }
        Ok(settings)
    }

    fn load(path: &Path) -> Result<Settings> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read settings file {}: {}", path.display(), e))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| anyhow!("settings file {} is invalid: {}", path.display(), e))
    }
}

pub fn default_settings_path() -> PathBuf {
    PathBuf::from("runboard.yaml")
}

pub fn write_template(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Err(anyhow!(
            "settings file already exists (use --force): {}",
            path.display()
        ));
    }
    let template = "\
# runboard analysis settings
endpoint: http://127.0.0.1:8321     # analysis collaborator base URL
model: gpt-4.1                      # must appear in the collaborator's model list
temperature: 0
include_successful_tasks: false     # batch analysis covers failed tasks only by default
";
    fs::write(path, template)?;
    Ok(())
}
