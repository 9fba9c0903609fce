//! Error types for the interview coach

use thiserror::Error;

/// Result type alias for coach operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the interview coach
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech recognition error
    #[error(transparent)]
    Voice(#[from] VoiceError),

    /// Speech synthesis error
    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    /// Backend could not be reached (connection refused, DNS, timeout)
    #[error(
        "Connection failed. Please ensure:\n1. Backend server is running on {url}\n2. CORS is enabled on the backend\n3. No firewall is blocking the connection"
    )]
    Network {
        /// Backend URL that was being contacted
        url: String,
        /// Transport-level reason
        reason: String,
    },

    /// Backend answered with a non-2xx status
    #[error("Server error ({status}): {body}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Best-effort response body
        body: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures surfaced by the voice session controller
///
/// `Display` renders the sentence shown next to the voice control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// Host provides no recognition capability
    #[error("Your browser does not support speech recognition. Please use Chrome, Edge, or Safari.")]
    CapabilityMissing,

    /// Recognition was still active after the retry
    #[error("Voice recognition is busy. Please wait a moment and try again.")]
    Busy,

    /// Microphone permission denied
    #[error(
        "Microphone access denied. Please allow microphone access in your browser settings and try again."
    )]
    PermissionDenied,

    /// No microphone available
    #[error("No microphone found. Please connect a microphone and try again.")]
    DeviceUnavailable,

    /// Recognition service unreachable
    #[error("Network error. Please check your internet connection and try again.")]
    Network,

    /// Recognition service refused to run
    #[error("Speech recognition service is not available. Please try again later.")]
    ServiceUnavailable,

    /// Host rejected the start request for a reason other than busy
    #[error("Failed to start voice recognition: {0}. Please try again.")]
    StartFailed(String),

    /// Unrecognized host error code, passed through
    #[error("Speech recognition error: {0}. Please try again.")]
    Unclassified(String),
}

impl Error {
    /// Whether the failure happened before the backend answered
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
