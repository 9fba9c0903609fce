//! Speech output coordinator
//!
//! Serializes `speak` requests against a single audio channel. One instance
//! is shared by `Arc` for the whole process; it owns the only live utterance
//! handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::synthesis::{
    SpeechOptions, SpeechSynthesizer, Utterance, UtteranceId, UtteranceOutcome, select_voice,
};

/// Produces the host synthesizer, or `None` when the host has none
pub type SynthesizerBinder = Box<dyn Fn() -> Option<Arc<dyn SpeechSynthesizer>> + Send + Sync>;

/// Coordinates text-to-speech so that at most one utterance plays
pub struct SpeechOutput {
    binder: SynthesizerBinder,
    synthesizer: Mutex<Option<Arc<dyn SpeechSynthesizer>>>,
    live: Arc<Mutex<Option<UtteranceId>>>,
    next_id: AtomicU64,
}

impl SpeechOutput {
    /// Create a coordinator that binds its synthesizer lazily
    #[must_use]
    pub fn new(binder: SynthesizerBinder) -> Self {
        Self {
            binder,
            synthesizer: Mutex::new(None),
            live: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a coordinator around an already available synthesizer
    #[must_use]
    pub fn with_synthesizer(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self::new(Box::new(move || Some(Arc::clone(&synthesizer))))
    }

    /// Create a coordinator for a host without speech output
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(Box::new(|| None))
    }

    /// Speak `text`, replacing anything currently playing
    ///
    /// Returns `false` when no synthesizer can be bound or playback does not
    /// begin; audio is a convenience, so callers treat that as a no-op.
    pub fn speak(&self, text: &str, options: &SpeechOptions) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let Some(synthesizer) = self.bind() else {
            tracing::debug!("speech synthesis not supported");
            return false;
        };

        let previous = lock(&self.live).take();
        if let Some(previous) = previous {
            tracing::debug!(utterance = previous, "canceling current utterance");
            synthesizer.cancel();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let voice = select_voice(&synthesizer.voices(), &options.locale);
        tracing::debug!(
            utterance = id,
            voice = ?voice.as_ref().map(|v| v.name.as_str()),
            chars = text.len(),
            "speaking"
        );

        let utterance = Utterance {
            id,
            text: text.to_string(),
            rate: options.rate,
            pitch: options.pitch,
            volume: options.volume,
            locale: options.locale.clone(),
            voice,
        };

        *lock(&self.live) = Some(id);

        let live = Arc::downgrade(&self.live);
        let on_done = Box::new(move |outcome: UtteranceOutcome| {
            if let UtteranceOutcome::Failed(reason) = &outcome {
                tracing::warn!(utterance = id, reason = %reason, "speech synthesis error");
            }
            if let Some(live) = live.upgrade() {
                let mut current = lock(&live);
                if *current == Some(id) {
                    *current = None;
                }
            }
        });

        if let Err(e) = synthesizer.speak(utterance, on_done) {
            tracing::warn!(utterance = id, error = %e, "failed to start speech");
            let mut current = lock(&self.live);
            if *current == Some(id) {
                *current = None;
            }
            return false;
        }

        true
    }

    /// Cancel the live utterance, if any
    pub fn stop(&self) {
        let previous = lock(&self.live).take();
        if previous.is_none() {
            return;
        }

        if let Some(synthesizer) = lock(&self.synthesizer).clone() {
            tracing::debug!(utterance = ?previous, "speech stopped");
            synthesizer.cancel();
        }
    }

    /// True while an utterance is live and the host reports playback
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        if lock(&self.live).is_none() {
            return false;
        }
        lock(&self.synthesizer)
            .as_ref()
            .is_some_and(|s| s.is_speaking())
    }

    /// Id of the live utterance
    #[must_use]
    pub fn live_utterance(&self) -> Option<UtteranceId> {
        *lock(&self.live)
    }

    /// Whether a synthesizer has been bound
    #[must_use]
    pub fn is_bound(&self) -> bool {
        lock(&self.synthesizer).is_some()
    }

    fn bind(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        let mut slot = lock(&self.synthesizer);
        if slot.is_none() {
            *slot = (self.binder)();
            if slot.is_some() {
                tracing::debug!("speech synthesizer bound");
            }
        }
        slot.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
