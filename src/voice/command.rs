//! Speech output through an external TTS program
//!
//! Desktop hosts have no synthesis API to bind, so speech is handed to
//! `espeak-ng`, `espeak` or macOS `say`. The text goes in on stdin; killing
//! the child cancels playback.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;

use super::synthesis::{
    SpeechSynthesizer, Utterance, UtteranceCallback, UtteranceId, UtteranceOutcome, Voice,
};
use crate::{Error, Result};

/// Programs probed, in order, when none is configured
const DEFAULT_PROGRAMS: [&str; 3] = ["espeak-ng", "espeak", "say"];

/// Words per minute at rate 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Command-line dialect of the TTS program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `espeak` / `espeak-ng`
    Espeak,
    /// macOS `say`
    Say,
}

impl Dialect {
    fn from_program(program: &Path) -> Self {
        let stem = program
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem == "say" { Self::Say } else { Self::Espeak }
    }
}

struct Playback {
    id: UtteranceId,
    cancel: oneshot::Sender<()>,
}

/// Synthesizer backed by a TTS program on `PATH`
pub struct CommandSynthesizer {
    program: PathBuf,
    dialect: Dialect,
    voices: Vec<Voice>,
    playback: Arc<Mutex<Option<Playback>>>,
}

impl CommandSynthesizer {
    /// Wrap a specific program
    #[must_use]
    pub fn new(program: PathBuf, voices: Vec<Voice>) -> Self {
        let dialect = Dialect::from_program(&program);
        Self {
            program,
            dialect,
            voices,
            playback: Arc::new(Mutex::new(None)),
        }
    }

    /// Locate a TTS program, preferring `preferred` when given
    ///
    /// Returns `None` when nothing usable is installed.
    #[must_use]
    pub fn detect(preferred: Option<&str>, voices: Vec<Voice>) -> Option<Self> {
        let candidates: Vec<&str> = preferred.map_or_else(|| DEFAULT_PROGRAMS.to_vec(), |p| vec![p]);

        let found = candidates
            .into_iter()
            .find_map(|name| which::which(name).ok());

        match found {
            Some(program) => {
                tracing::info!(program = %program.display(), "speech output program found");
                Some(Self::new(program, voices))
            }
            None => {
                tracing::debug!(?preferred, "no speech output program found");
                None
            }
        }
    }

    /// Program that will be run
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line dialect in use
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, on_done: UtteranceCallback) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Synthesis(format!("no async runtime: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(build_args(self.dialect, &utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Synthesis(format!("failed to spawn {}: {e}", self.program.display()))
            })?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let id = utterance.id;

        // Replacing the slot drops the old sender, which also kills that child
        *lock(&self.playback) = Some(Playback {
            id,
            cancel: cancel_tx,
        });

        let playback = Arc::clone(&self.playback);
        let text = utterance.text;

        runtime.spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    tracing::debug!(error = %e, "failed to write text to speech program");
                }
            }

            let outcome = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => UtteranceOutcome::Finished,
                    Ok(status) => UtteranceOutcome::Failed(format!("speech program exited with {status}")),
                    Err(e) => UtteranceOutcome::Failed(e.to_string()),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "failed to kill speech program");
                    }
                    UtteranceOutcome::Canceled
                }
            };

            {
                let mut current = lock(&playback);
                if current.as_ref().is_some_and(|p| p.id == id) {
                    *current = None;
                }
            }

            tracing::trace!(utterance = id, ?outcome, "speech program finished");
            on_done(outcome);
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Some(playback) = lock(&self.playback).take() {
            // Receiver already gone means the program exited on its own
            let _ = playback.cancel.send(());
        }
    }

    fn is_speaking(&self) -> bool {
        lock(&self.playback).is_some()
    }
}

/// Arguments for one utterance; the text itself is written to stdin
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_args(dialect: Dialect, utterance: &Utterance) -> Vec<String> {
    let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate)
        .round()
        .clamp(80.0, 450.0) as u32;

    match dialect {
        Dialect::Espeak => {
            let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
            let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;
            let voice = utterance
                .voice
                .as_ref()
                .map_or_else(|| utterance.locale.to_ascii_lowercase(), |v| v.name.clone());

            vec![
                "-s".to_string(),
                words_per_minute.to_string(),
                "-p".to_string(),
                pitch.to_string(),
                "-a".to_string(),
                amplitude.to_string(),
                "-v".to_string(),
                voice,
                "--stdin".to_string(),
            ]
        }
        Dialect::Say => {
            let mut args = vec!["-r".to_string(), words_per_minute.to_string()];
            if let Some(voice) = &utterance.voice {
                args.push("-v".to_string());
                args.push(voice.name.clone());
            }
            args.push("-f".to_string());
            args.push("-".to_string());
            args
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
