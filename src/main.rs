use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use interview_coach::backend::status::spawn_monitor;
use interview_coach::backend::{DialogueBackend, HttpBackend};
use interview_coach::config::VoiceConfig;
use interview_coach::conversation::{Conversation, Role};
use interview_coach::repl::Repl;
use interview_coach::voice::{
    CommandSynthesizer, SpeechOutput, SpeechSynthesizer, VoiceSessionController,
};
use interview_coach::{Config, question};

/// Coach - voice-driven interview practice
#[derive(Parser)]
#[command(name = "coach", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/interview-coach/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dialogue backend API URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Role to interview for; prompts when omitted
    #[arg(short, long, value_enum)]
    role: Option<Role>,

    /// Do not speak replies aloud
    #[arg(long)]
    no_voice: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive interview (default)
    Chat,
    /// Extract the Input/Output example from a question
    Parse {
        /// File holding the question text; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Check whether the backend is reachable
    Health,
    /// List the available roles
    Roles,
    /// Test speech output
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! Let's practice for your interview.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,interview_coach=info",
        1 => "info,interview_coach=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mut cli: Cli) -> anyhow::Result<()> {
    match cli.command.take() {
        Some(Command::Parse { file }) => cmd_parse(file).await,
        Some(Command::Roles) => {
            cmd_roles();
            Ok(())
        }
        Some(Command::Health) => cmd_health(&load_config(&cli)?).await,
        Some(Command::Say { text }) => cmd_say(&load_config(&cli)?.voice, &text).await,
        Some(Command::Chat) | None => cmd_chat(load_config(&cli)?, cli.role).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(url) = &cli.backend_url {
        config.backend.url.clone_from(url);
    }
    if cli.no_voice {
        config.voice.enabled = false;
    }
    config.validate()?;

    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

async fn cmd_chat(config: Config, role: Option<Role>) -> anyhow::Result<()> {
    let backend: Arc<dyn DialogueBackend> = Arc::new(HttpBackend::new(
        config.backend.url.clone(),
        config.backend.request_timeout,
    )?);

    let speech = Arc::new(speech_output(&config.voice));
    let conversation = Conversation::new(
        Arc::clone(&backend),
        speech,
        config.voice.speech_options(),
    );
    conversation.set_voice_enabled(config.voice.enabled);

    // Terminals have no speech recognizer; /listen reports that
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let voice = VoiceSessionController::new(None, config.voice.recognition_options(), events_tx);

    let (status, monitor) = spawn_monitor(Arc::clone(&backend), config.backend.health_interval);

    let role = match role {
        Some(role) => Some(role),
        None => pick_role()?,
    };

    tracing::info!(
        backend = %config.backend.url,
        session = %conversation.session_id(),
        voice = config.voice.enabled,
        "starting interview coach"
    );

    let result = Repl::new(conversation, voice, events_rx, status)
        .with_initial_role(role)
        .run()
        .await;

    monitor.abort();
    result?;
    Ok(())
}

/// Ask for a role when attached to a terminal
fn pick_role() -> anyhow::Result<Option<Role>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut labels: Vec<String> = Role::ALL
        .iter()
        .map(|role| format!("{} - {}", role.title(), role.description()))
        .collect();
    labels.push("Decide later".to_string());

    let choice = dialoguer::Select::new()
        .with_prompt("Select a role to practice")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(Role::ALL.get(choice).copied())
}

async fn cmd_parse(file: Option<PathBuf>) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(&path).await?,
        None => {
            let mut text = String::new();
            tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut text).await?;
            text
        }
    };

    let example = question::extract(&text);
    println!("{}", serde_json::to_string_pretty(&example)?);
    Ok(())
}

fn cmd_roles() {
    for role in Role::ALL {
        println!("{:<10} {} ({})", role.as_str(), role.title(), role.description());
    }
}

async fn cmd_health(config: &Config) -> anyhow::Result<()> {
    let backend = HttpBackend::new(config.backend.url.clone(), config.backend.request_timeout)?;
    println!("Checking {}...", backend.health_url());

    let report = backend.health().await?;
    println!("Backend Online");
    println!("  status:  {}", report.status);
    if !report.message.is_empty() {
        println!("  message: {}", report.message);
    }
    println!(
        "  api key: {}",
        if report.api_key_configured { "configured" } else { "missing" }
    );
    Ok(())
}

async fn cmd_say(voice: &VoiceConfig, text: &str) -> anyhow::Result<()> {
    let Some(synth) = CommandSynthesizer::detect(voice.synth_command.as_deref(), voice.voices.clone())
    else {
        anyhow::bail!("no speech output program found (install espeak-ng, or set COACH_SYNTH_COMMAND)");
    };
    println!("Using {} ({:?})", synth.program().display(), synth.dialect());

    let speech = SpeechOutput::with_synthesizer(Arc::new(synth));
    println!("Speaking: \"{text}\"");

    if !speech.speak(text, &voice.speech_options()) {
        anyhow::bail!("speech output failed to start");
    }

    while speech.live_utterance().is_some() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("\n---");
    println!("If you heard the speech, voice output is working!");
    Ok(())
}

/// Speech output bound lazily to whichever TTS program is installed
fn speech_output(voice: &VoiceConfig) -> SpeechOutput {
    let command = voice.synth_command.clone();
    let voices = voice.voices.clone();

    SpeechOutput::new(Box::new(move || {
        CommandSynthesizer::detect(command.as_deref(), voices.clone())
            .map(|synth| Arc::new(synth) as Arc<dyn SpeechSynthesizer>)
    }))
}
