//! Configuration management for the interview coach
//!
//! Values come from built-in defaults, then the TOML file, then `COACH_*`
//! environment variables. Command-line flags are applied last by the binary.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::backend::DEFAULT_BACKEND_URL;
use crate::backend::status::DEFAULT_HEALTH_INTERVAL;
use crate::conversation::DEFAULT_SPEECH_RATE;
use crate::voice::recognition::DEFAULT_LOCALE;
use crate::voice::{RecognitionOptions, SpeechOptions, Voice};
use crate::{Error, Result};

use file::CoachConfigFile;

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Interview coach configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Dialogue backend settings
    pub backend: BackendConfig,

    /// Speech settings
    pub voice: VoiceConfig,
}

/// Dialogue backend configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// API base URL
    pub url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Interval between health probes
    pub health_interval: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Speak replies aloud
    pub enabled: bool,

    /// Locale for recognition and voice selection
    pub locale: String,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// Volume, 0.0 to 1.0
    pub volume: f32,

    /// TTS program override (auto-detected when `None`)
    pub synth_command: Option<String>,

    /// Voices offered by the TTS program
    pub voices: Vec<Voice>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: DEFAULT_LOCALE.to_string(),
            rate: DEFAULT_SPEECH_RATE,
            pitch: 1.0,
            volume: 1.0,
            synth_command: None,
            voices: Vec::new(),
        }
    }
}

impl VoiceConfig {
    /// Playback settings for interviewer replies
    #[must_use]
    pub fn speech_options(&self) -> SpeechOptions {
        SpeechOptions {
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            locale: self.locale.clone(),
        }
    }

    /// Settings for each recognition session
    #[must_use]
    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions::new(self.locale.clone())
    }
}

impl Config {
    /// Load configuration from file and process environment
    ///
    /// `path` overrides `COACH_CONFIG` and the standard location.
    ///
    /// # Errors
    ///
    /// Returns error if the config file is unreadable or a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration with a custom environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the config file is unreadable or a value is invalid
    pub fn load_with_env(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env("COACH_CONFIG").map(PathBuf::from));
        let fc = file::load_config_file(explicit.as_deref())?;

        let mut config = Self::default();
        config.apply_file(fc);
        config.apply_env(&env)?;
        config.validate()?;

        tracing::debug!(
            backend = %config.backend.url,
            voice = config.voice.enabled,
            locale = %config.voice.locale,
            "configuration loaded"
        );
        Ok(config)
    }

    fn apply_file(&mut self, fc: CoachConfigFile) {
        let backend = fc.backend;
        if let Some(url) = backend.url {
            self.backend.url = url;
        }
        if let Some(secs) = backend.request_timeout_secs {
            self.backend.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = backend.health_interval_secs {
            self.backend.health_interval = Duration::from_secs(secs);
        }

        let voice = fc.voice;
        self.voice.enabled = voice.enabled.unwrap_or(self.voice.enabled);
        self.voice.locale = voice.locale.unwrap_or_else(|| self.voice.locale.clone());
        self.voice.rate = voice.rate.unwrap_or(self.voice.rate);
        self.voice.pitch = voice.pitch.unwrap_or(self.voice.pitch);
        self.voice.volume = voice.volume.unwrap_or(self.voice.volume);
        if voice.synth_command.is_some() {
            self.voice.synth_command = voice.synth_command;
        }
        if let Some(voices) = voice.voices {
            self.voice.voices = voices;
        }
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env("COACH_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(secs) = parse_env::<u64>(env, "COACH_REQUEST_TIMEOUT")? {
            self.backend.request_timeout = Duration::from_secs(secs);
        }
        if env("COACH_DISABLE_VOICE").is_some_and(|v| is_truthy(&v)) {
            self.voice.enabled = false;
        }
        if let Some(locale) = env("COACH_LOCALE") {
            self.voice.locale = locale;
        }
        if let Some(rate) = parse_env::<f32>(env, "COACH_SPEECH_RATE")? {
            self.voice.rate = rate;
        }
        if let Some(command) = env("COACH_SYNTH_COMMAND") {
            self.voice.synth_command = Some(command);
        }
        Ok(())
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend url must start with http:// or https://, got '{url}'"
            )));
        }
        if self.backend.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        if self.backend.health_interval.is_zero() {
            return Err(Error::Config("health interval must be positive".to_string()));
        }
        if self.voice.locale.trim().is_empty() {
            return Err(Error::Config("voice locale must not be empty".to_string()));
        }
        if !(0.1..=10.0).contains(&self.voice.rate) {
            return Err(Error::Config(format!(
                "speech rate must be between 0.1 and 10, got {}",
                self.voice.rate
            )));
        }
        if !(0.0..=2.0).contains(&self.voice.pitch) {
            return Err(Error::Config(format!(
                "speech pitch must be between 0 and 2, got {}",
                self.voice.pitch
            )));
        }
        if !(0.0..=1.0).contains(&self.voice.volume) {
            return Err(Error::Config(format!(
                "speech volume must be between 0 and 1, got {}",
                self.voice.volume
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://localhost:5000/api");
        assert_eq!(config.backend.request_timeout, Duration::from_secs(60));
        assert_eq!(config.backend.health_interval, Duration::from_secs(10));
        assert!(config.voice.enabled);
        assert!((config.voice.rate - 0.9).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(
            "[backend]\nurl = \"http://file.test/api\"\nrequest_timeout_secs = 5\n\n[voice]\nlocale = \"en-GB\"\n",
        );
        let env = env_of(&[
            ("COACH_BACKEND_URL", "https://env.test/api"),
            ("COACH_DISABLE_VOICE", "1"),
        ]);

        let config = Config::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.backend.url, "https://env.test/api");
        assert_eq!(config.backend.request_timeout, Duration::from_secs(5));
        assert_eq!(config.voice.locale, "en-GB");
        assert!(!config.voice.enabled);
    }

    #[test]
    fn test_config_path_from_env() {
        let file = config_file("[voice]\nrate = 1.2\n");
        let path = file.path().to_string_lossy().to_string();
        let env = env_of(&[("COACH_CONFIG", path.as_str())]);

        let config = Config::load_with_env(None, env).unwrap();
        assert!((config.voice.rate - 1.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_env_number() {
        let file = config_file("");
        let env = env_of(&[("COACH_REQUEST_TIMEOUT", "soon")]);
        let err = Config::load_with_env(Some(file.path()), env).unwrap_err();
        assert!(err.to_string().contains("COACH_REQUEST_TIMEOUT"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.backend.url = "localhost:5000".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.voice.volume = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.backend.request_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_disable_voice_requires_truthy_value() {
        let file = config_file("");
        let env = env_of(&[("COACH_DISABLE_VOICE", "false")]);
        let config = Config::load_with_env(Some(file.path()), env).unwrap();
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_speech_options_from_voice_config() {
        let voice = VoiceConfig {
            locale: "en-AU".to_string(),
            ..VoiceConfig::default()
        };
        let options = voice.speech_options();
        assert_eq!(options.locale, "en-AU");
        assert!((options.rate - 0.9).abs() < f32::EPSILON);
        assert_eq!(voice.recognition_options().locale, "en-AU");
    }
}
