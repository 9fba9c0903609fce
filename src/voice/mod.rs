//! Voice interaction
//!
//! Speech recognition runs through [`VoiceSessionController`], one capture
//! session at a time. Speech output runs through [`SpeechOutput`], one
//! utterance at a time. Both talk to host capabilities through the traits in
//! [`recognition`] and [`synthesis`].

mod command;
mod controller;
pub mod recognition;
mod speech;
pub mod synthesis;

pub use command::{CommandSynthesizer, Dialect};
pub use controller::{
    BUSY_RETRY_DELAY, HostErrorKind, NO_VOICE_WARNING, VoiceCommand, VoiceEvent,
    VoiceSessionController, VoiceSessionState, VoiceStatus, WATCHDOG_TIMEOUT,
    classify_host_error,
};
pub use recognition::{
    HostEvent, RecognitionCapability, RecognitionEvent, RecognitionEventSink,
    RecognitionOptions, RecognitionSession, SessionToken, StartError,
};
pub use speech::{SpeechOutput, SynthesizerBinder};
pub use synthesis::{
    SpeechOptions, SpeechSynthesizer, Utterance, UtteranceCallback, UtteranceId,
    UtteranceOutcome, Voice, select_voice,
};
