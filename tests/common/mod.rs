//! Shared test utilities
//!
//! Scriptable stand-ins for the host recognition and synthesis capabilities
//! and for the dialogue backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use interview_coach::backend::{
    DialogueBackend, FeedbackRequest, HealthReport, MessageRequest, StartRequest,
};
use interview_coach::voice::{
    RecognitionCapability, RecognitionEvent, RecognitionEventSink, RecognitionOptions,
    RecognitionSession, SpeechSynthesizer, StartError, Utterance, UtteranceCallback,
    UtteranceOutcome, Voice,
};
use interview_coach::{Error, Result};
use serde_json::{Value, json};

#[derive(Default)]
struct RecognitionCounters {
    created: AtomicUsize,
    alive: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    start_results: Mutex<VecDeque<std::result::Result<(), StartError>>>,
    sinks: Mutex<Vec<RecognitionEventSink>>,
    options: Mutex<Option<RecognitionOptions>>,
}

/// Recognition capability whose sessions are counted and scripted
#[derive(Default)]
pub struct FakeRecognition {
    counters: Arc<RecognitionCounters>,
}

impl FakeRecognition {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next host `start()` call
    pub fn script_start(&self, result: std::result::Result<(), StartError>) {
        self.counters.start_results.lock().unwrap().push_back(result);
    }

    /// Session objects created so far
    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Session objects not yet dropped
    pub fn alive(&self) -> usize {
        self.counters.alive.load(Ordering::SeqCst)
    }

    /// Host `start()` calls
    pub fn starts(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    /// Host `stop()` calls
    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Options passed with the latest session
    pub fn last_options(&self) -> Option<RecognitionOptions> {
        self.counters.options.lock().unwrap().clone()
    }

    /// Sink handed to the `index`-th session
    pub fn sink(&self, index: usize) -> RecognitionEventSink {
        self.counters.sinks.lock().unwrap()[index].clone()
    }

    /// Emit an event from the most recent session
    pub fn emit(&self, event: RecognitionEvent) {
        let sink = self.counters.sinks.lock().unwrap().last().cloned();
        sink.expect("no session created").emit(event);
    }
}

impl RecognitionCapability for FakeRecognition {
    fn create(
        &self,
        options: &RecognitionOptions,
        sink: RecognitionEventSink,
    ) -> Result<Box<dyn RecognitionSession>> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.counters.alive.fetch_add(1, Ordering::SeqCst);
        self.counters.sinks.lock().unwrap().push(sink);
        *self.counters.options.lock().unwrap() = Some(options.clone());

        Ok(Box::new(FakeSession {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    counters: Arc<RecognitionCounters>,
}

impl RecognitionSession for FakeSession {
    fn start(&mut self) -> std::result::Result<(), StartError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        self.counters
            .start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Synthesizer that records utterances and holds their completions
pub struct FakeSynthesizer {
    voices: Vec<Voice>,
    pub spoken: Mutex<Vec<Utterance>>,
    pending: Mutex<Vec<(u64, UtteranceCallback)>>,
    cancels: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new(voices: Vec<Voice>) -> Arc<Self> {
        Arc::new(Self {
            voices,
            spoken: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    /// Texts spoken so far, in order
    pub fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Report the end of utterance `id`
    pub fn complete(&self, id: u64, outcome: UtteranceOutcome) {
        let callback = {
            let mut pending = self.pending.lock().unwrap();
            let index = pending
                .iter()
                .position(|(pending_id, _)| *pending_id == id)
                .expect("no pending utterance with that id");
            pending.remove(index).1
        };
        callback(outcome);
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, on_done: UtteranceCallback) -> Result<()> {
        self.pending.lock().unwrap().push((utterance.id, on_done));
        self.spoken.lock().unwrap().push(utterance);
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        !self.pending.lock().unwrap().is_empty()
    }
}

/// Scripted failure for [`MockBackend`]
#[derive(Debug, Clone)]
pub enum Failure {
    /// Backend unreachable
    Network,
    /// Backend answered with an error status
    Server(u16, &'static str),
}

impl Failure {
    fn into_error(self, url: &str) -> Error {
        match self {
            Self::Network => Error::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            },
            Self::Server(status, body) => Error::Server {
                status,
                body: body.to_string(),
            },
        }
    }
}

type Scripted = std::result::Result<Value, Failure>;

/// Dialogue backend with scripted replies and recorded requests
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Scripted>>,
    start_replies: Mutex<VecDeque<Scripted>>,
    feedback_replies: Mutex<VecDeque<Scripted>>,
    pub messages: Mutex<Vec<MessageRequest>>,
    pub starts: Mutex<Vec<StartRequest>>,
    pub feedback: Mutex<Vec<FeedbackRequest>>,
    delay: Option<Duration>,
}

pub const MOCK_URL: &str = "http://localhost:5000/api";

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Backend that takes `delay` to answer each request
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn reply(&self, reply: Scripted) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn start_reply(&self, reply: Scripted) {
        self.start_replies.lock().unwrap().push_back(reply);
    }

    pub fn feedback_reply(&self, reply: Scripted) {
        self.feedback_replies.lock().unwrap().push_back(reply);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    async fn answer(&self, queue: &Mutex<VecDeque<Scripted>>) -> Result<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(json!({ "response": "ok" })))
            .map_err(|failure| failure.into_error(MOCK_URL))
    }
}

#[async_trait]
impl DialogueBackend for MockBackend {
    async fn send_message(&self, request: &MessageRequest) -> Result<Value> {
        self.messages.lock().unwrap().push(request.clone());
        self.answer(&self.replies).await
    }

    async fn start_session(&self, request: &StartRequest) -> Result<Value> {
        self.starts.lock().unwrap().push(request.clone());
        self.answer(&self.start_replies).await
    }

    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<Value> {
        self.feedback.lock().unwrap().push(request.clone());
        self.answer(&self.feedback_replies).await
    }

    async fn health(&self) -> Result<HealthReport> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            message: "Backend API is running".to_string(),
            api_key_configured: true,
        })
    }

    fn endpoint(&self) -> &str {
        MOCK_URL
    }
}
