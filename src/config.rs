//! Autosave configuration
//!
//! Everything except the delay has a sensible default; pages normally only
//! pass the delay (in seconds) to `init`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::DEFAULT_DELAY_MS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid autosave config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("autosave config must be a JSON object")]
    NotObject,
    #[error("invalid autosave delay: {0} seconds")]
    Delay(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Delay between the first unsaved change and the save (ms)
    pub delay_ms: u64,
    /// Hidden-field poll interval (ms)
    pub hidden_poll_interval_ms: u64,
    /// Editor library detection: retry interval (ms) and number of tries
    pub editor_detection_interval_ms: u64,
    pub editor_detection_repeats: u32,
    /// DOM id of the attempt form
    pub form_id: String,
    /// Endpoint the form is POSTed to
    pub handler_url: String,
    /// Global the rich-text editor library installs on `window`
    pub editor_global: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            hidden_poll_interval_ms: 1_000,
            editor_detection_interval_ms: 500,
            editor_detection_repeats: 20,
            form_id: "responseform".to_string(),
            handler_url: "/mod/quiz/autosave.ajax.php".to_string(),
            editor_global: "tinyMCE".to_string(),
        }
    }
}

impl AutosaveConfig {
    /// Defaults with the delay given in seconds
    pub fn with_delay_secs(secs: f64) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.set_delay_secs(secs)?;
        Ok(config)
    }

    pub fn set_delay_secs(&mut self, secs: f64) -> Result<(), ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::Delay(secs));
        }
        self.delay_ms = (secs * 1000.0).round() as u64;
        Ok(())
    }

    /// Parse from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        // Derived structs also accept a positional array
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ConfigError::NotObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// How long to wait for the editor library before giving up
    pub fn editor_detection_timeout_ms(&self) -> u64 {
        self.editor_detection_interval_ms
            .saturating_mul(u64::from(self.editor_detection_repeats))
    }
}
