//! Conversation orchestration
//!
//! Owns the transcript and drives each turn: append the candidate's message,
//! call the backend, append the reply, extract any coding example, then
//! speak the reply. Independent turns may be in flight at once; state is
//! only touched in short critical sections, never across an `.await`.

mod message;
mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

pub use message::{ChatMessage, Sender};
pub use session::{Role, generate_session_id};

use crate::backend::{
    DialogueBackend, FeedbackRequest, MessageRequest, StartRequest, opening_text, reply_text,
};
use crate::question::{self, CodingExample};
use crate::voice::{SpeechOptions, SpeechOutput};
use crate::Error;

/// Pause between canceling old speech and starting the reply
pub const SPEECH_DELAY: Duration = Duration::from_millis(100);

/// Speaking rate used for interviewer replies
pub const DEFAULT_SPEECH_RATE: f32 = 0.9;

/// Everything a front end needs to render the conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    /// Session identifier sent with every request
    pub session_id: String,
    /// Messages in append order
    pub transcript: Vec<ChatMessage>,
    /// Whether any request is in flight
    pub loading: bool,
    /// Error shown to the candidate, if any
    pub error: Option<String>,
    /// Selected role
    pub role: Option<Role>,
    /// Latest interviewer message
    pub current_question: Option<String>,
    /// Example extracted from the latest reply (engineer role only)
    pub example: CodingExample,
    /// Whether replies are spoken
    pub voice_enabled: bool,
}

/// Result of one request to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input, nothing sent
    Ignored,
    /// The interviewer's message, already appended
    Replied(ChatMessage),
    /// The request failed; the text is also in the error field
    Failed(String),
}

struct State {
    session_id: String,
    role: Option<Role>,
    transcript: Vec<ChatMessage>,
    next_message_id: u64,
    error: Option<String>,
    current_question: Option<String>,
    example: CodingExample,
    voice_enabled: bool,
    in_flight: usize,
    /// Bumped whenever pending speech must not start
    speech_generation: u64,
}

impl State {
    fn push(&mut self, text: String, sender: Sender) -> ChatMessage {
        self.next_message_id += 1;
        let message = ChatMessage {
            id: self.next_message_id,
            text,
            sender,
            sent_at: chrono::Utc::now(),
        };
        self.transcript.push(message.clone());
        message
    }

    fn reset_interview(&mut self) {
        self.speech_generation += 1;
        self.transcript.clear();
        self.current_question = None;
        self.example = CodingExample::default();
        self.error = None;
    }

    fn view(&self) -> ConversationView {
        ConversationView {
            session_id: self.session_id.clone(),
            transcript: self.transcript.clone(),
            loading: self.in_flight > 0,
            error: self.error.clone(),
            role: self.role,
            current_question: self.current_question.clone(),
            example: self.example.clone(),
            voice_enabled: self.voice_enabled,
        }
    }
}

struct Inner {
    backend: Arc<dyn DialogueBackend>,
    speech: Arc<SpeechOutput>,
    speech_options: SpeechOptions,
    state: Mutex<State>,
    view: watch::Sender<ConversationView>,
}

/// Shared handle to one interview conversation
#[derive(Clone)]
pub struct Conversation {
    inner: Arc<Inner>,
}

/// Keeps the loading flag raised until dropped
struct LoadingGuard {
    conversation: Conversation,
}

impl LoadingGuard {
    fn new(conversation: &Conversation) -> Self {
        conversation.update(|state| state.in_flight += 1);
        Self {
            conversation: conversation.clone(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.conversation
            .update(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}

impl Conversation {
    /// Create a conversation with a fresh session id
    #[must_use]
    pub fn new(
        backend: Arc<dyn DialogueBackend>,
        speech: Arc<SpeechOutput>,
        speech_options: SpeechOptions,
    ) -> Self {
        Self::with_session_id(backend, speech, speech_options, generate_session_id())
    }

    /// Create a conversation bound to an existing session id
    #[must_use]
    pub fn with_session_id(
        backend: Arc<dyn DialogueBackend>,
        speech: Arc<SpeechOutput>,
        speech_options: SpeechOptions,
        session_id: String,
    ) -> Self {
        let state = State {
            session_id,
            role: None,
            transcript: Vec::new(),
            next_message_id: 0,
            error: None,
            current_question: None,
            example: CodingExample::default(),
            voice_enabled: true,
            in_flight: 0,
            speech_generation: 0,
        };
        let (view, _) = watch::channel(state.view());

        Self {
            inner: Arc::new(Inner {
                backend,
                speech,
                speech_options,
                state: Mutex::new(state),
                view,
            }),
        }
    }

    /// Send one candidate turn and wait for the interviewer's reply
    pub async fn send_turn(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }

        let request = self.update(|state| {
            state.push(text.to_string(), Sender::User);
            state.error = None;
            MessageRequest {
                message: text.to_string(),
                session_id: state.session_id.clone(),
                role: state.role,
            }
        });
        let _loading = LoadingGuard::new(self);

        match self.inner.backend.send_message(&request).await {
            Ok(payload) => {
                let reply = reply_text(&payload);
                let (message, speak) = self.update(|state| {
                    let message = state.push(reply.clone(), Sender::Assistant);
                    state.current_question = Some(reply.clone());
                    if state.role.is_some_and(Role::is_coding) {
                        state.example = question::extract(&reply);
                    }
                    (message, state.voice_enabled)
                });

                tracing::info!(message = message.id, chars = reply.len(), "turn completed");
                if speak {
                    self.speak_later(reply);
                }
                TurnOutcome::Replied(message)
            }
            Err(e) => TurnOutcome::Failed(self.record_failure(&e)),
        }
    }

    /// Select a role and ask the backend to open the interview
    ///
    /// The transcript is reset. On failure the role is cleared again.
    pub async fn start_role(&self, role: Role) -> TurnOutcome {
        let request = self.update(|state| {
            state.reset_interview();
            state.role = Some(role);
            StartRequest {
                session_id: state.session_id.clone(),
                role,
            }
        });
        let _loading = LoadingGuard::new(self);

        match self.inner.backend.start_session(&request).await {
            Ok(payload) => {
                let welcome = opening_text(&payload, role);
                let (message, speak) = self.update(|state| {
                    state.transcript.clear();
                    (
                        state.push(welcome.clone(), Sender::Assistant),
                        state.voice_enabled,
                    )
                });

                tracing::info!(%role, "interview started");
                if speak {
                    self.speak_later(welcome);
                }
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                let text = e.to_string();
                tracing::error!(%role, error = %text, "failed to start interview");
                self.update(|state| {
                    state.error = Some(text.clone());
                    if state.role == Some(role) {
                        state.role = None;
                    }
                });
                TurnOutcome::Failed(text)
            }
        }
    }

    /// Ask the backend to assess the interview so far
    pub async fn request_feedback(&self) -> TurnOutcome {
        let request = self.update(|state| {
            state.error = None;
            FeedbackRequest {
                session_id: state.session_id.clone(),
            }
        });
        let _loading = LoadingGuard::new(self);

        match self.inner.backend.request_feedback(&request).await {
            Ok(payload) => {
                let feedback = reply_text(&payload);
                let (message, speak) = self.update(|state| {
                    (
                        state.push(feedback.clone(), Sender::Assistant),
                        state.voice_enabled,
                    )
                });

                tracing::info!(message = message.id, "feedback received");
                if speak {
                    self.speak_later(feedback);
                }
                TurnOutcome::Replied(message)
            }
            Err(e) => TurnOutcome::Failed(self.record_failure(&e)),
        }
    }

    /// Return to role selection, discarding the transcript
    pub fn new_interview(&self) {
        self.update(|state| {
            state.reset_interview();
            state.role = None;
        });
        self.inner.speech.stop();
        tracing::info!("interview reset");
    }

    /// Turn spoken replies on or off; turning off silences current speech
    pub fn set_voice_enabled(&self, enabled: bool) {
        self.update(|state| state.voice_enabled = enabled);
        if !enabled {
            self.stop_speaking();
        }
    }

    /// Silence the current reply and drop any reply still waiting to be spoken
    pub fn stop_speaking(&self) {
        self.lock().speech_generation += 1;
        self.inner.speech.stop();
    }

    /// Show an error that did not come from a backend call
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.error = Some(message));
    }

    /// Dismiss the current error
    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> ConversationView {
        self.inner.view.borrow().clone()
    }

    /// Observe state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.inner.view.subscribe()
    }

    /// Session identifier
    #[must_use]
    pub fn session_id(&self) -> String {
        self.lock().session_id.clone()
    }

    /// Selected role
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.lock().role
    }

    /// Whether any request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    /// Shared speech output
    #[must_use]
    pub fn speech(&self) -> &Arc<SpeechOutput> {
        &self.inner.speech
    }

    fn record_failure(&self, error: &Error) -> String {
        let text = error.to_string();
        tracing::error!(error = %text, network = error.is_network(), "backend request failed");
        self.update(|state| {
            state.error = Some(text.clone());
            state.push(format!("Error: {text}"), Sender::Assistant);
        });
        text
    }

    fn speak_later(&self, text: String) {
        let generation = {
            let mut state = self.lock();
            state.speech_generation += 1;
            state.speech_generation
        };
        self.inner.speech.stop();

        let conversation = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SPEECH_DELAY).await;
            let current = {
                let state = conversation.lock();
                state.voice_enabled && state.speech_generation == generation
            };
            if current {
                let inner = &conversation.inner;
                inner.speech.speak(&text, &inner.speech_options);
            } else {
                tracing::debug!("pending speech superseded");
            }
        });
    }

    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.inner.view.send_replace(state.view());
        result
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::backend::HealthReport;

    struct Echo;

    #[async_trait]
    impl DialogueBackend for Echo {
        async fn send_message(&self, request: &MessageRequest) -> crate::Result<Value> {
            Ok(json!({ "response": format!("echo: {}", request.message) }))
        }

        async fn start_session(&self, _request: &StartRequest) -> crate::Result<Value> {
            Ok(json!({}))
        }

        async fn request_feedback(&self, _request: &FeedbackRequest) -> crate::Result<Value> {
            Ok(json!({ "response": "Good job" }))
        }

        async fn health(&self) -> crate::Result<HealthReport> {
            Ok(HealthReport::default())
        }

        fn endpoint(&self) -> &str {
            "http://echo"
        }
    }

    fn conversation() -> Conversation {
        Conversation::with_session_id(
            Arc::new(Echo),
            Arc::new(SpeechOutput::unavailable()),
            SpeechOptions::default(),
            "session_1".to_string(),
        )
    }

    #[tokio::test]
    async fn test_message_ids_are_monotonic() {
        let conversation = conversation();
        conversation.send_turn("one").await;
        conversation.send_turn("two").await;

        let ids: Vec<u64> = conversation
            .snapshot()
            .transcript
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_non_engineer_reply_not_parsed() {
        let conversation = conversation();
        conversation.start_role(Role::Sales).await;
        conversation.send_turn("Input: 5 Output: 25").await;

        let view = conversation.snapshot();
        assert!(view.example.is_empty());
        assert_eq!(
            view.current_question.as_deref(),
            Some("echo: Input: 5 Output: 25")
        );
    }

    #[tokio::test]
    async fn test_start_role_uses_fallback_welcome() {
        let conversation = conversation();
        let outcome = conversation.start_role(Role::Retail).await;

        let TurnOutcome::Replied(message) = outcome else {
            panic!("expected reply");
        };
        assert_eq!(message.text, "Welcome! Let's start your retail interview.");
        assert_eq!(conversation.role(), Some(Role::Retail));
    }

    #[tokio::test]
    async fn test_new_interview_clears_everything() {
        let conversation = conversation();
        conversation.start_role(Role::Engineer).await;
        conversation.send_turn("hello").await;
        conversation.report_error("boom");

        conversation.new_interview();
        let view = conversation.snapshot();
        assert!(view.transcript.is_empty());
        assert_eq!(view.role, None);
        assert_eq!(view.error, None);
        assert_eq!(view.current_question, None);
        assert_eq!(view.session_id, "session_1");
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let conversation = conversation();
        let mut rx = conversation.subscribe();
        conversation.report_error("microphone unplugged");

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().error.as_deref(),
            Some("microphone unplugged")
        );

        conversation.clear_error();
        assert_eq!(rx.borrow().error, None);
    }

    #[test]
    fn test_voice_toggle() {
        let conversation = conversation();
        assert!(conversation.snapshot().voice_enabled);
        conversation.set_voice_enabled(false);
        assert!(!conversation.snapshot().voice_enabled);
    }
}
