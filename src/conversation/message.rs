//! Transcript entries

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The candidate
    User,
    /// The backend interviewer
    Assistant,
}

/// One immutable entry in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Monotonic id, unique within the process
    pub id: u64,
    /// Message text
    pub text: String,
    /// Who sent it
    pub sender: Sender,
    /// When it was appended
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether the candidate wrote this message
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}
