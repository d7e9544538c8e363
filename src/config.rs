use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{AuditorError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub intake: IntakeConfig,
    pub reports: ReportsConfig,
}

/// Locations of the two tool services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Serves `extract_text` and `validate_business_key`
    pub extraction_address: String,
    /// Serves `translate_to_structured` and `render_report`
    pub language_address: String,
    /// Unset means a remote call may block indefinitely
    pub request_timeout_secs: Option<u64>,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            extraction_address: constants::DEFAULT_EXTRACTION_ADDRESS.to_string(),
            language_address: constants::DEFAULT_LANGUAGE_ADDRESS.to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub incoming_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            incoming_dir: PathBuf::from(constants::DEFAULT_INCOMING_DIR),
            processed_dir: PathBuf::from(constants::DEFAULT_PROCESSED_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub output_dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(constants::DEFAULT_REPORTS_DIR),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                AuditorError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&config_content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides take a lookup function so tests don't have to touch the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AUDITOR_EXTRACTION_ADDRESS") {
            self.remote.extraction_address = v;
        }
        if let Some(v) = lookup("AUDITOR_LANGUAGE_ADDRESS") {
            self.remote.language_address = v;
        }
        if let Some(v) = lookup("AUDITOR_REQUEST_TIMEOUT_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|e| {
                AuditorError::Config(format!("AUDITOR_REQUEST_TIMEOUT_SECS '{}': {}", v, e))
            })?;
            self.remote.request_timeout_secs = Some(secs);
        }
        if let Some(v) = lookup("AUDITOR_INCOMING_DIR") {
            self.intake.incoming_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("AUDITOR_PROCESSED_DIR") {
            self.intake.processed_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("AUDITOR_REPORTS_DIR") {
            self.reports.output_dir = PathBuf::from(v);
        }
        Ok(())
    }
}
