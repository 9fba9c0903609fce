//! Terminal front end
//!
//! Reads turns from stdin, prints the transcript to stdout, and relays voice
//! transcripts and backend status changes as they arrive.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::backend::status::{BackendStatus, StatusReport};
use crate::conversation::{ChatMessage, Conversation, Role, Sender, TurnOutcome};
use crate::question::CodingExample;
use crate::voice::{VoiceCommand, VoiceEvent, VoiceSessionController, VoiceStatus};
use crate::Result;

const HELP: &str = "\
Type a message and press enter to answer the interviewer.

Commands:
  /role <engineer|sales|retail>  start an interview for a role
  /new                           start over and pick a new role
  /feedback                      ask for feedback on the interview so far
  /voice on|off                  speak replies aloud
  /listen                        answer by voice (again to stop)
  /stop                          stop listening and speaking
  /example                       show the current coding example
  /status                        show backend and voice status
  /help                          show this help
  /quit                          exit";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line
    Empty,
    /// A turn for the interviewer
    Say(String),
    /// Start an interview for a role
    Role(Role),
    /// Return to role selection
    New,
    /// Request feedback
    Feedback,
    /// Toggle spoken replies
    Voice(bool),
    /// Toggle listening
    Listen,
    /// Stop listening and speaking
    Stop,
    /// Show the coding example
    Example,
    /// Show backend and voice status
    Status,
    /// Show help
    Help,
    /// Exit
    Quit,
    /// Malformed command, with a usage hint
    Invalid(String),
}

impl ReplCommand {
    /// Parse one input line
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        match (name.as_str(), arg) {
            ("role", Some(role)) => role
                .parse()
                .map_or_else(|e: crate::Error| Self::Invalid(e.to_string()), Self::Role),
            ("role", None) => Self::Invalid("usage: /role <engineer|sales|retail>".to_string()),
            ("new", _) => Self::New,
            ("feedback", _) => Self::Feedback,
            ("voice", Some("on")) => Self::Voice(true),
            ("voice", Some("off")) => Self::Voice(false),
            ("voice", _) => Self::Invalid("usage: /voice on|off".to_string()),
            ("listen", _) => Self::Listen,
            ("stop", _) => Self::Stop,
            ("example", _) => Self::Example,
            ("status", _) => Self::Status,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("unknown command '/{other}', try /help")),
        }
    }
}

/// Everything the REPL drives
pub struct Repl {
    conversation: Conversation,
    voice: VoiceSessionController,
    voice_events: mpsc::UnboundedReceiver<VoiceEvent>,
    backend_status: watch::Receiver<StatusReport>,
    initial_role: Option<Role>,
}

impl Repl {
    /// Assemble a REPL from its collaborators
    #[must_use]
    pub fn new(
        conversation: Conversation,
        voice: VoiceSessionController,
        voice_events: mpsc::UnboundedReceiver<VoiceEvent>,
        backend_status: watch::Receiver<StatusReport>,
    ) -> Self {
        Self {
            conversation,
            voice,
            voice_events,
            backend_status,
            initial_role: None,
        }
    }

    /// Start an interview for `role` before reading input
    #[must_use]
    pub fn with_initial_role(mut self, role: Option<Role>) -> Self {
        self.initial_role = role;
        self
    }

    /// Run until `/quit` or end of input
    ///
    /// # Errors
    ///
    /// Returns error if reading stdin fails
    pub async fn run(self) -> Result<()> {
        let Self {
            conversation,
            voice,
            mut voice_events,
            mut backend_status,
            initial_role,
        } = self;

        let mut voice_status = voice.subscribe();
        let (voice_tx, voice_task) = voice.spawn();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut shown_status = None;

        println!("{HELP}\n");
        if let Some(role) = initial_role {
            let command = ReplCommand::Role(role);
            handle(&conversation, &voice_tx, &backend_status, &voice_status, command).await;
        }

        loop {
            prompt();

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let command = ReplCommand::parse(&line);
                    if command == ReplCommand::Quit {
                        break;
                    }
                    handle(&conversation, &voice_tx, &backend_status, &voice_status, command).await;
                }
                Some(event) = voice_events.recv() => match event {
                    VoiceEvent::Transcript(text) => {
                        println!("\nyou (voice)> {text}");
                        print_outcome(&conversation.send_turn(&text).await);
                    }
                    VoiceEvent::Error(e) => {
                        conversation.report_error(e.to_string());
                        println!("\n! {e}");
                    }
                },
                Ok(()) = voice_status.changed() => {
                    let status = voice_status.borrow_and_update().clone();
                    if let Some(warning) = status.warning {
                        println!("\n! {warning}");
                    }
                }
                Ok(()) = backend_status.changed() => {
                    let status = backend_status.borrow_and_update().status;
                    if status != BackendStatus::Checking && shown_status != Some(status) {
                        println!("\n[{status}]");
                        shown_status = Some(status);
                    }
                }
            }
        }

        if voice_tx.send(VoiceCommand::Shutdown).await.is_err() {
            tracing::debug!("voice controller already stopped");
        }
        if let Err(e) = voice_task.await {
            tracing::warn!(error = %e, "voice controller task failed");
        }
        conversation.stop_speaking();
        Ok(())
    }
}

async fn handle(
    conversation: &Conversation,
    voice_tx: &mpsc::Sender<VoiceCommand>,
    backend_status: &watch::Receiver<StatusReport>,
    voice_status: &watch::Receiver<VoiceStatus>,
    command: ReplCommand,
) {
    match command {
        ReplCommand::Empty | ReplCommand::Quit => {}
        ReplCommand::Say(text) => print_outcome(&conversation.send_turn(&text).await),
        ReplCommand::Role(role) => {
            println!("Starting {} interview...", role.title());
            print_outcome(&conversation.start_role(role).await);
        }
        ReplCommand::New => {
            conversation.new_interview();
            println!("Interview cleared. Pick a role with /role.");
        }
        ReplCommand::Feedback => print_outcome(&conversation.request_feedback().await),
        ReplCommand::Voice(enabled) => {
            conversation.set_voice_enabled(enabled);
            println!("Voice output {}", if enabled { "on" } else { "off" });
        }
        ReplCommand::Listen => send_voice(voice_tx, VoiceCommand::Start).await,
        ReplCommand::Stop => {
            send_voice(voice_tx, VoiceCommand::Stop).await;
            conversation.stop_speaking();
        }
        ReplCommand::Example => print_example(&conversation.snapshot().example),
        ReplCommand::Status => {
            let report = backend_status.borrow().clone();
            let voice = voice_status.borrow().clone();
            let checked = report
                .last_checked
                .map_or_else(|| "never".to_string(), |t| t.format("%H:%M:%S").to_string());
            println!("{} (last checked {checked})", report.status);
            println!("Voice input: {:?}", voice.state);
            if let Some(role) = conversation.role() {
                println!("Role: {}", role.title());
            }
        }
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Invalid(message) => println!("! {message}"),
    }
}

async fn send_voice(voice_tx: &mpsc::Sender<VoiceCommand>, command: VoiceCommand) {
    if voice_tx.send(command).await.is_err() {
        tracing::warn!(?command, "voice controller not running");
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Ignored => {}
        TurnOutcome::Replied(message) => print_message(message),
        TurnOutcome::Failed(text) => println!("coach> Error: {text}"),
    }
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "coach",
    };
    println!(
        "[{}] {speaker}> {}",
        message.sent_at.with_timezone(&chrono::Local).format("%H:%M"),
        message.text
    );
}

fn print_example(example: &CodingExample) {
    if example.is_empty() {
        println!("No example found in the current question.");
        return;
    }
    println!("Input:\n  {}", example.input.as_deref().unwrap_or("-"));
    println!("Output:\n  {}", example.output.as_deref().unwrap_or("-"));
}

fn prompt() {
    print!("you> ");
    if let Err(e) = std::io::stdout().flush() {
        tracing::debug!(error = %e, "failed to flush prompt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_turn() {
        assert_eq!(
            ReplCommand::parse("  I would use a hash map  "),
            ReplCommand::Say("I would use a hash map".to_string())
        );
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
    }

    #[test]
    fn test_role_command() {
        assert_eq!(ReplCommand::parse("/role Engineer"), ReplCommand::Role(Role::Engineer));
        assert!(matches!(ReplCommand::parse("/role"), ReplCommand::Invalid(_)));
        assert!(matches!(
            ReplCommand::parse("/role astronaut"),
            ReplCommand::Invalid(_)
        ));
    }

    #[test]
    fn test_voice_command() {
        assert_eq!(ReplCommand::parse("/voice on"), ReplCommand::Voice(true));
        assert_eq!(ReplCommand::parse("/voice off"), ReplCommand::Voice(false));
        assert!(matches!(ReplCommand::parse("/voice loud"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(ReplCommand::parse("/new"), ReplCommand::New);
        assert_eq!(ReplCommand::parse("/feedback"), ReplCommand::Feedback);
        assert_eq!(ReplCommand::parse("/listen"), ReplCommand::Listen);
        assert_eq!(ReplCommand::parse("/stop"), ReplCommand::Stop);
        assert_eq!(ReplCommand::parse("/example"), ReplCommand::Example);
        assert_eq!(ReplCommand::parse("/QUIT"), ReplCommand::Quit);
    }

    #[test]
    fn test_unknown_command() {
        let ReplCommand::Invalid(message) = ReplCommand::parse("/dance") else {
            panic!("expected invalid command");
        };
        assert!(message.contains("/dance"));
    }
}
