//! TOML configuration file loading
//!
//! Supports `~/.config/interview-coach/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::voice::Voice;
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoachConfigFile {
    /// Dialogue backend settings
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Speech input/output settings
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Dialogue backend configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendFileConfig {
    /// API base URL (e.g. "http://localhost:5000/api")
    pub url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Seconds between health probes
    pub health_interval_secs: Option<u64>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceFileConfig {
    /// Speak replies aloud
    pub enabled: Option<bool>,

    /// Locale for recognition and voice selection (e.g. "en-US")
    pub locale: Option<String>,

    /// Speaking rate multiplier
    pub rate: Option<f32>,

    /// Pitch multiplier
    pub pitch: Option<f32>,

    /// Volume, 0.0 to 1.0
    pub volume: Option<f32>,

    /// TTS program to run instead of auto-detecting one
    pub synth_command: Option<String>,

    /// Voices the TTS program offers
    pub voices: Option<Vec<Voice>>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist. Without one, the standard path is used
/// and a missing file yields defaults.
///
/// # Errors
///
/// Returns error if an explicit file is missing, or any file cannot be read
/// or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<CoachConfigFile> {
    let path = match path {
        Some(path) if !path.exists() => {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(CoachConfigFile::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/interview-coach/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("interview-coach")
            .join("config.toml")
    })
}
