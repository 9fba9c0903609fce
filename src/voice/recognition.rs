//! Host speech-recognition capability
//!
//! The host (browser, desktop shell, test harness) implements
//! [`RecognitionCapability`]; the controller never looks it up globally.

use tokio::sync::mpsc;

/// Default recognition locale
pub const DEFAULT_LOCALE: &str = "en-US";

/// Per-session configuration handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep listening after the first utterance
    pub continuous: bool,
    /// Deliver partial transcripts
    pub interim_results: bool,
    /// BCP 47 locale tag (e.g. "en-US")
    pub locale: String,
    /// Alternatives per result
    pub max_alternatives: u32,
}

impl RecognitionOptions {
    /// Single-shot, final-results-only options for a locale
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            continuous: false,
            interim_results: false,
            locale: locale.into(),
            max_alternatives: 1,
        }
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

/// Generation token naming one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub(crate) u64);

impl SessionToken {
    /// Raw generation number
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Event raised by a host recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Audio capture began
    Started,
    /// Final transcript for the utterance
    Result(String),
    /// Host error code (`no-speech`, `not-allowed`, ...)
    Error(String),
    /// Session ended
    End,
}

/// A host event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    /// Session that raised the event
    pub token: SessionToken,
    /// What happened
    pub event: RecognitionEvent,
}

/// Channel a session uses to report back to its controller
#[derive(Debug, Clone)]
pub struct RecognitionEventSink {
    token: SessionToken,
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl RecognitionEventSink {
    pub(crate) const fn new(token: SessionToken, tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { token, tx }
    }

    /// Token of the session this sink belongs to
    #[must_use]
    pub const fn token(&self) -> SessionToken {
        self.token
    }

    /// Deliver an event; dropped silently once the controller is gone
    pub fn emit(&self, event: RecognitionEvent) {
        if self
            .tx
            .send(HostEvent {
                token: self.token,
                event,
            })
            .is_err()
        {
            tracing::trace!(token = self.token.0, "recognition controller gone, event dropped");
        }
    }
}

/// Synchronous failure of a session's `start()`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Host reports the session is already capturing
    #[error("recognition has already started")]
    Busy,

    /// Any other refusal
    #[error("{0}")]
    Failed(String),
}

/// One capture attempt owned by the controller
pub trait RecognitionSession: Send {
    /// Begin capturing audio
    ///
    /// # Errors
    ///
    /// Returns [`StartError::Busy`] if the host is still capturing
    fn start(&mut self) -> Result<(), StartError>;

    /// Request the host to stop capturing; must not fail
    fn stop(&mut self);
}

/// Host factory for recognition sessions
pub trait RecognitionCapability: Send + Sync {
    /// Allocate a session that reports through `sink`
    ///
    /// # Errors
    ///
    /// Returns error if the host cannot allocate a session
    fn create(
        &self,
        options: &RecognitionOptions,
        sink: RecognitionEventSink,
    ) -> crate::Result<Box<dyn RecognitionSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_single_shot() {
        let options = RecognitionOptions::default();
        assert!(!options.continuous);
        assert!(!options.interim_results);
        assert_eq!(options.max_alternatives, 1);
        assert_eq!(options.locale, "en-US");
    }

    #[test]
    fn test_sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = RecognitionEventSink::new(SessionToken(7), tx);
        sink.emit(RecognitionEvent::Result("hello".to_string()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.token.get(), 7);
        assert_eq!(event.event, RecognitionEvent::Result("hello".to_string()));
    }

    #[test]
    fn test_sink_survives_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        RecognitionEventSink::new(SessionToken(1), tx).emit(RecognitionEvent::End);
    }
}
