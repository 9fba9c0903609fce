//! Host speech-synthesis capability

use serde::Deserialize;

use super::recognition::DEFAULT_LOCALE;

/// Voice name fragments that signal higher audio quality
const QUALITY_MARKERS: [&str; 3] = ["Natural", "Neural", "Premium"];

/// A voice offered by the synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Voice {
    /// Host voice name (e.g. "Microsoft Aria Online (Natural)")
    pub name: String,
    /// BCP 47 locale tag (e.g. "en-US")
    pub locale: String,
}

impl Voice {
    /// Create a voice description
    #[must_use]
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }
}

/// Per-request playback settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Volume, 0.0 to 1.0
    pub volume: f32,
    /// Locale used for voice selection
    pub locale: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

/// Identifier of one utterance
pub type UtteranceId = u64;

/// A request for the synthesizer to speak
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Coordinator-assigned id
    pub id: UtteranceId,
    /// Text to speak
    pub text: String,
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Volume, 0.0 to 1.0
    pub volume: f32,
    /// Locale tag
    pub locale: String,
    /// Selected voice, host default when `None`
    pub voice: Option<Voice>,
}

/// How an utterance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// Played to the end
    Finished,
    /// Cut short by `cancel()`
    Canceled,
    /// Playback failed
    Failed(String),
}

/// Called exactly once when an utterance ends
pub type UtteranceCallback = Box<dyn FnOnce(UtteranceOutcome) + Send>;

/// Host text-to-speech capability
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently installed
    fn voices(&self) -> Vec<Voice>;

    /// Begin playing `utterance`, reporting its end through `on_done`
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot begin
    fn speak(&self, utterance: Utterance, on_done: UtteranceCallback) -> crate::Result<()>;

    /// Cancel whatever is playing
    fn cancel(&self);

    /// Whether audio is currently playing
    fn is_speaking(&self) -> bool;
}

/// Pick a voice for `locale`
///
/// Prefers a voice of the same language whose name signals higher quality,
/// then the first voice whose locale starts with `locale`.
#[must_use]
pub fn select_voice(voices: &[Voice], locale: &str) -> Option<Voice> {
    let locale = locale.to_ascii_lowercase();
    let language = locale.split(['-', '_']).next().unwrap_or_default();

    voices
        .iter()
        .find(|voice| {
            voice.locale.to_ascii_lowercase().starts_with(language)
                && QUALITY_MARKERS.iter().any(|m| voice.name.contains(m))
        })
        .or_else(|| {
            voices
                .iter()
                .find(|voice| voice.locale.to_ascii_lowercase().starts_with(&locale))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("Thomas", "fr-FR"),
            Voice::new("Daniel", "en-GB"),
            Voice::new("Samantha", "en-US"),
            Voice::new("Aria Online (Natural)", "en-AU"),
        ]
    }

    #[test]
    fn test_prefers_quality_voice_for_language() {
        let voice = select_voice(&voices(), "en-US").unwrap();
        assert_eq!(voice.name, "Aria Online (Natural)");
    }

    #[test]
    fn test_falls_back_to_locale_match() {
        let voices = vec![Voice::new("Daniel", "en-GB"), Voice::new("Samantha", "en-US")];
        let voice = select_voice(&voices, "en-US").unwrap();
        assert_eq!(voice.name, "Samantha");
    }

    #[test]
    fn test_locale_match_is_case_insensitive() {
        let voices = vec![Voice::new("Samantha", "en_us")];
        assert!(select_voice(&voices, "en").is_some());
    }

    #[test]
    fn test_no_voice_for_unknown_locale() {
        assert_eq!(select_voice(&voices(), "ja-JP"), None);
        assert_eq!(select_voice(&[], "en-US"), None);
    }

    #[test]
    fn test_default_options() {
        let options = SpeechOptions::default();
        assert!((options.rate - 1.0).abs() < f32::EPSILON);
        assert!((options.pitch - 1.0).abs() < f32::EPSILON);
        assert!((options.volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(options.locale, "en-US");
    }
}
