//! Voice session controller
//!
//! Wraps an unreliable, event-driven recognition capability in a small state
//! machine with a watchdog and a single retry when the host reports it is
//! still busy. The transitions are synchronous and take the current instant,
//! so they can be driven by [`VoiceSessionController::run`] or stepped
//! directly.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::recognition::{
    HostEvent, RecognitionCapability, RecognitionEvent, RecognitionEventSink, RecognitionOptions,
    RecognitionSession, SessionToken, StartError,
};
use crate::error::VoiceError;

/// How long to wait for a result before giving up
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before retrying a start the host reported as busy
pub const BUSY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Warning shown when nothing was heard
pub const NO_VOICE_WARNING: &str = "No voice detected. Please speak clearly or type your message.";

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSessionState {
    /// Capability not yet probed
    #[default]
    Uninitialized,
    /// Host has no recognition capability
    Unsupported,
    /// Ready to start
    Idle,
    /// Capturing one utterance
    Listening,
    /// Waiting to retry a busy start
    Cooldown,
}

/// Output of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// Trimmed, non-empty transcript of one utterance
    Transcript(String),
    /// Hard failure for the caller to surface
    Error(VoiceError),
}

/// Caller requests accepted by the driver loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Start listening, or stop if already listening
    Start,
    /// Cancel the current session
    Stop,
    /// Hosting view became hidden or visible again
    VisibilityChanged {
        /// Whether the view is now hidden
        hidden: bool,
    },
    /// Stop and exit the driver loop
    Shutdown,
}

/// Snapshot for UI collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceStatus {
    /// Current state
    pub state: VoiceSessionState,
    /// Local warning rendered next to the voice control
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Watchdog,
    Retry,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    kind: TimerKind,
    token: SessionToken,
}

struct LiveSession {
    token: SessionToken,
    session: Box<dyn RecognitionSession>,
}

/// How a host error code is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostErrorKind {
    /// Expected outcome, shown as a local warning
    Warning,
    /// Caused by our own stop request
    Silent,
    /// Forwarded to the caller
    Fault(VoiceError),
}

/// Classify a host recognition error code
#[must_use]
pub fn classify_host_error(code: &str) -> HostErrorKind {
    match code {
        "no-speech" => HostErrorKind::Warning,
        "aborted" => HostErrorKind::Silent,
        "audio-capture" => HostErrorKind::Fault(VoiceError::DeviceUnavailable),
        "not-allowed" => HostErrorKind::Fault(VoiceError::PermissionDenied),
        "network" => HostErrorKind::Fault(VoiceError::Network),
        "service-not-allowed" => HostErrorKind::Fault(VoiceError::ServiceUnavailable),
        other => HostErrorKind::Fault(VoiceError::Unclassified(other.to_string())),
    }
}

/// Recognition state machine owning at most one live capture session
pub struct VoiceSessionController {
    capability: Option<Arc<dyn RecognitionCapability>>,
    options: RecognitionOptions,
    state: VoiceSessionState,
    live: Option<LiveSession>,
    generation: u64,
    deadline: Option<Deadline>,
    warning: Option<String>,
    host_tx: mpsc::UnboundedSender<HostEvent>,
    host_rx: mpsc::UnboundedReceiver<HostEvent>,
    events: mpsc::UnboundedSender<VoiceEvent>,
    status: watch::Sender<VoiceStatus>,
}

impl VoiceSessionController {
    /// Create a controller, probing for the capability once
    ///
    /// `None` means the host has no recognition support; the controller then
    /// stays [`VoiceSessionState::Unsupported`] for its whole life.
    #[must_use]
    pub fn new(
        capability: Option<Arc<dyn RecognitionCapability>>,
        options: RecognitionOptions,
        events: mpsc::UnboundedSender<VoiceEvent>,
    ) -> Self {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(VoiceStatus::default());

        let mut controller = Self {
            capability,
            options,
            state: VoiceSessionState::Uninitialized,
            live: None,
            generation: 0,
            deadline: None,
            warning: None,
            host_tx,
            host_rx,
            events,
            status,
        };

        controller.state = if controller.capability.is_some() {
            VoiceSessionState::Idle
        } else {
            tracing::warn!("speech recognition not supported by host");
            VoiceSessionState::Unsupported
        };
        controller.publish();
        controller
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> VoiceSessionState {
        self.state
    }

    /// Local warning, if any
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Whether a capture session object is currently owned
    #[must_use]
    pub const fn has_live_session(&self) -> bool {
        self.live.is_some()
    }

    /// Next instant at which [`Self::fire_due_timers`] has work
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline.map(|d| d.at)
    }

    /// Watch state and warning changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceStatus> {
        self.status.subscribe()
    }

    /// Start listening; acts as [`Self::stop`] when already active
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::CapabilityMissing`] if the host has no
    /// recognition support. Every other failure is reported as a
    /// [`VoiceEvent::Error`].
    pub fn start(&mut self, now: Instant) -> Result<(), VoiceError> {
        match self.state {
            VoiceSessionState::Uninitialized | VoiceSessionState::Unsupported => {
                return Err(VoiceError::CapabilityMissing);
            }
            VoiceSessionState::Listening | VoiceSessionState::Cooldown => {
                tracing::debug!(state = ?self.state, "start while active, stopping instead");
                self.stop();
                return Ok(());
            }
            VoiceSessionState::Idle => {}
        }

        let Some(capability) = self.capability.clone() else {
            return Err(VoiceError::CapabilityMissing);
        };

        // Never keep two capture sessions alive
        if let Some(mut stale) = self.live.take() {
            stale.session.stop();
        }
        self.deadline = None;
        self.warning = None;

        self.generation += 1;
        let token = SessionToken(self.generation);
        let sink = RecognitionEventSink::new(token, self.host_tx.clone());

        match capability.create(&self.options, sink) {
            Ok(session) => {
                self.live = Some(LiveSession { token, session });
                self.begin_capture(now, token, false);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create recognition session");
                self.state = VoiceSessionState::Idle;
                self.emit(VoiceEvent::Error(VoiceError::StartFailed(e.to_string())));
                self.publish();
            }
        }

        Ok(())
    }

    /// Cancel the current session; always legal and idempotent
    pub fn stop(&mut self) {
        if matches!(
            self.state,
            VoiceSessionState::Uninitialized | VoiceSessionState::Unsupported
        ) {
            return;
        }

        self.deadline = None;
        if let Some(mut live) = self.live.take() {
            tracing::debug!(token = live.token.0, "stopping recognition session");
            live.session.stop();
        }
        self.warning = None;
        self.state = VoiceSessionState::Idle;
        self.publish();
    }

    /// Hosting view visibility changed
    pub fn visibility_changed(&mut self, hidden: bool) {
        if hidden
            && matches!(
                self.state,
                VoiceSessionState::Listening | VoiceSessionState::Cooldown
            )
        {
            tracing::info!("view hidden while listening, releasing microphone");
            self.stop();
        }
    }

    /// Apply one event reported by the host
    pub fn handle_host_event(&mut self, event: HostEvent) {
        let Some(live) = self.live.as_ref() else {
            tracing::trace!(token = event.token.0, "event without live session ignored");
            return;
        };
        if live.token != event.token {
            tracing::trace!(
                token = event.token.0,
                live = live.token.0,
                "stale recognition event ignored"
            );
            return;
        }

        // Events during cooldown come from stopping the busy capture
        if self.state == VoiceSessionState::Cooldown {
            tracing::trace!(event = ?event.event, "event during cooldown ignored");
            return;
        }

        match event.event {
            RecognitionEvent::Started => {
                tracing::debug!(token = event.token.0, "recognition started");
                self.warning = None;
            }
            RecognitionEvent::Result(text) => {
                self.finish_session();
                let transcript = text.trim();
                if transcript.is_empty() {
                    tracing::debug!("empty transcript discarded");
                } else {
                    tracing::info!(transcript, "voice transcript received");
                    self.warning = None;
                    self.emit(VoiceEvent::Transcript(transcript.to_string()));
                }
            }
            RecognitionEvent::Error(code) => {
                self.finish_session();
                match classify_host_error(&code) {
                    HostErrorKind::Warning => {
                        tracing::debug!("no speech detected");
                        self.warning = Some(NO_VOICE_WARNING.to_string());
                    }
                    HostErrorKind::Silent => {
                        tracing::trace!("recognition aborted");
                    }
                    HostErrorKind::Fault(error) => {
                        tracing::warn!(code = %code, error = %error, "speech recognition error");
                        self.emit(VoiceEvent::Error(error));
                    }
                }
            }
            RecognitionEvent::End => {
                tracing::debug!(token = event.token.0, "recognition ended");
                self.finish_session();
            }
        }

        self.publish();
    }

    /// Apply every host event already queued
    pub fn drain_host_events(&mut self) {
        while let Ok(event) = self.host_rx.try_recv() {
            self.handle_host_event(event);
        }
    }

    /// Run the watchdog or busy retry if its deadline has passed
    pub fn fire_due_timers(&mut self, now: Instant) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if deadline.at > now {
            return;
        }
        self.deadline = None;

        let is_live = self.live.as_ref().is_some_and(|l| l.token == deadline.token);

        match deadline.kind {
            TimerKind::Watchdog => {
                if is_live && self.state == VoiceSessionState::Listening {
                    tracing::info!(token = deadline.token.0, "no result before watchdog, stopping");
                    if let Some(mut live) = self.live.take() {
                        live.session.stop();
                    }
                    self.warning = Some(NO_VOICE_WARNING.to_string());
                    self.state = VoiceSessionState::Idle;
                }
            }
            TimerKind::Retry => {
                if is_live && self.state == VoiceSessionState::Cooldown {
                    tracing::debug!(token = deadline.token.0, "retrying busy recognition start");
                    self.begin_capture(now, deadline.token, true);
                } else {
                    tracing::debug!(token = deadline.token.0, "busy retry suppressed");
                }
            }
        }

        self.publish();
    }

    /// Drive the controller until [`VoiceCommand::Shutdown`] or the command
    /// channel closes
    pub async fn run(mut self, mut commands: mpsc::Receiver<VoiceCommand>) {
        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(VoiceCommand::Start) => {
                        if let Err(e) = self.start(Instant::now()) {
                            self.emit(VoiceEvent::Error(e));
                        }
                    }
                    Some(VoiceCommand::Stop) => self.stop(),
                    Some(VoiceCommand::VisibilityChanged { hidden }) => {
                        self.visibility_changed(hidden);
                    }
                    Some(VoiceCommand::Shutdown) | None => {
                        self.stop();
                        break;
                    }
                },
                Some(event) = self.host_rx.recv() => {
                    self.handle_host_event(event);
                }
                () = wait_until(deadline) => {
                    self.fire_due_timers(Instant::now());
                }
            }
        }

        tracing::debug!("voice controller stopped");
    }

    /// Spawn [`Self::run`] on the current runtime
    #[must_use]
    pub fn spawn(self) -> (mpsc::Sender<VoiceCommand>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    fn begin_capture(&mut self, now: Instant, token: SessionToken, is_retry: bool) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        match live.session.start() {
            Ok(()) => {
                tracing::debug!(token = token.0, is_retry, "listening");
                self.state = VoiceSessionState::Listening;
                self.deadline = Some(Deadline {
                    at: now + WATCHDOG_TIMEOUT,
                    kind: TimerKind::Watchdog,
                    token,
                });
            }
            Err(StartError::Busy) if !is_retry => {
                tracing::warn!(token = token.0, "recognition busy, retrying shortly");
                live.session.stop();
                self.state = VoiceSessionState::Cooldown;
                self.deadline = Some(Deadline {
                    at: now + BUSY_RETRY_DELAY,
                    kind: TimerKind::Retry,
                    token,
                });
            }
            Err(StartError::Busy) => {
                tracing::warn!(token = token.0, "recognition still busy after retry");
                self.finish_session();
                self.emit(VoiceEvent::Error(VoiceError::Busy));
            }
            Err(StartError::Failed(reason)) => {
                tracing::error!(token = token.0, reason = %reason, "failed to start recognition");
                self.finish_session();
                self.emit(VoiceEvent::Error(VoiceError::StartFailed(reason)));
            }
        }

        self.publish();
    }

    /// Drop the session and return to idle without touching the warning
    fn finish_session(&mut self) {
        self.deadline = None;
        self.live = None;
        self.state = VoiceSessionState::Idle;
    }

    fn emit(&self, event: VoiceEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("voice event receiver gone");
        }
    }

    fn publish(&self) {
        self.status.send_replace(VoiceStatus {
            state: self.state,
            warning: self.warning.clone(),
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
