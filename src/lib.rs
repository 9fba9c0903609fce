//! Interview Coach - voice-driven interview practice
//!
//! This library provides the core of the coach:
//! - Speech recognition session control (watchdog, busy retry, stale events)
//! - Serialized speech output over a single audio channel
//! - Conversation orchestration against a remote dialogue backend
//! - Extraction of coding examples from interviewer prose
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Front end                         │
//! │        Terminal REPL  │  transcript  │  status       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Conversation                        │
//! │   Voice Session  │  Speech Output  │  Question      │
//! │   Controller     │  Coordinator    │  Parser        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          Dialogue backend (HTTP + JSON)              │
//! │     /api  │  /api/start  │  /api/feedback  │ /health │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod question;
pub mod repl;
pub mod voice;

pub use config::Config;
pub use conversation::{ChatMessage, Conversation, ConversationView, Role, TurnOutcome};
pub use error::{Error, Result, VoiceError};
pub use question::CodingExample;
