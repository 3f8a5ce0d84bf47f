//! Configuration handling for the diff engine
//!
//! Similarity thresholds used by the matcher and classifier. Every value has a
//! documented default; a TOML file may override any subset of them:
//!
//! ```toml
//! [diff]
//! move_threshold = 0.5
//! move_rename_threshold = 0.85
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Top-level configuration file layout
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Diff engine settings
    #[serde(default)]
    pub diff: DiffConfig,
}

/// Thresholds for entity matching and refactoring classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Minimum similarity for a same-name match across locations (tier 2)
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,

    /// Minimum body similarity for a same-container rename (tier 3)
    #[serde(default = "default_rename_threshold")]
    pub rename_threshold: f64,

    /// Minimum body similarity for a body-only match (tier 4)
    #[serde(default = "default_move_rename_threshold")]
    pub move_rename_threshold: f64,

    /// Fraction of an extracted/inlined body that must be accounted for
    #[serde(default = "default_extract_threshold")]
    pub extract_threshold: f64,

    /// Body similarity for a pull-up or push-down to count as unchanged
    #[serde(default = "default_pull_up_threshold")]
    pub pull_up_threshold: f64,

    /// Bodies with fewer tokens never match by body similarity alone
    #[serde(default = "default_min_body_tokens")]
    pub min_body_tokens: u32,
}

fn default_move_threshold() -> f64 {
    0.5
}

fn default_rename_threshold() -> f64 {
    0.5
}

fn default_move_rename_threshold() -> f64 {
    0.8
}

fn default_extract_threshold() -> f64 {
    0.6
}

fn default_pull_up_threshold() -> f64 {
    0.8
}

fn default_min_body_tokens() -> u32 {
    2
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            move_threshold: default_move_threshold(),
            rename_threshold: default_rename_threshold(),
            move_rename_threshold: default_move_rename_threshold(),
            extract_threshold: default_extract_threshold(),
            pull_up_threshold: default_pull_up_threshold(),
            min_body_tokens: default_min_body_tokens(),
        }
    }
}

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid threshold {name} = {value}: must be within 0.0..=1.0")]
    Threshold { name: &'static str, value: f64 },
}

impl DiffConfig {
    /// Load configuration from a TOML file with a `[diff]` table
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.diff.validate()?;
        Ok(config.diff)
    }

    /// Check that every threshold is a fraction
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("move_threshold", self.move_threshold),
            ("rename_threshold", self.rename_threshold),
            ("move_rename_threshold", self.move_rename_threshold),
            ("extract_threshold", self.extract_threshold),
            ("pull_up_threshold", self.pull_up_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        Ok(())
    }
}
