//! tempo, the terminal front end for the Tempo scheduling assistant
//!
//! Talks to the forwarder (`tempo-server`) and keeps the conversation, session
//! id and speech settings in the local storage directory, so a conversation
//! survives between invocations.
//!
//! # Subcommands
//! - `chat`                        : interactive chat with speech support
//! - `send <message>`              : one exchange in the saved conversation
//! - `history [--json]`            : print the saved conversation
//! - `new`                         : forget the saved conversation
//! - `availability [--start] [--end] [--json]`: list calendar events
//! - `schedule <json>`             : schedule a meeting (body forwarded as-is)
//! - `status`                      : forwarder, backend and speech status
//! - `settings [--auto-speak] [--tts] [--stt] [--voice]`: speech settings

mod chat;
mod render;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tempo_core::api::AvailabilityQuery;
use tempo_core::speech::{
    CommandRecognizer, CommandSynthesizer, SpeechInput, SpeechOutput,
};
use tempo_core::{
    FileStore, ForwarderClient, KeyValueStore, SessionStore, SpeechPreferences, TempoConfig,
};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG: &str = "tempo.toml";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "tempo", version, about = "Tempo scheduling assistant in the terminal")]
struct Cli {
    /// Config file (TOML); missing files fall back to defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Forwarder URL (overrides client.server_url)
    #[arg(long, env = "TEMPO_SERVER_URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat interactively, with optional speech input and output
    Chat,

    /// Send one message in the saved conversation and print the reply
    Send {
        /// Message text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Print the saved conversation
    History {
        /// Output the raw message log as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget the saved conversation and session id
    New,

    /// List calendar events
    Availability {
        /// First day to include (passed to the backend as-is)
        #[arg(long)]
        start: Option<String>,

        /// Last day to include (passed to the backend as-is)
        #[arg(long)]
        end: Option<String>,

        /// Output the events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Schedule a meeting; the JSON body is forwarded verbatim
    Schedule {
        /// Meeting request body, e.g. '{"title":"Lunch","date":"2026-03-03"}'
        body: String,
    },

    /// Show forwarder, backend and speech status
    Status,

    /// Show or change speech settings
    Settings {
        /// Read replies aloud automatically
        #[arg(long)]
        auto_speak: Option<bool>,

        /// Enable text-to-speech
        #[arg(long)]
        tts: Option<bool>,

        /// Enable speech input
        #[arg(long)]
        stt: Option<bool>,

        /// Preferred synthesis voice name
        #[arg(long)]
        voice: Option<String>,
    },
}

// ============================================================================
// Shared setup
// ============================================================================

fn forwarder(config: &TempoConfig, server: Option<&str>) -> anyhow::Result<ForwarderClient> {
    let url = server.unwrap_or(&config.client.server_url);
    Ok(ForwarderClient::new(url, config.client.timeout())?)
}

fn open_storage(config: &TempoConfig) -> anyhow::Result<Arc<FileStore>> {
    let dir = config.storage.resolved_dir();
    let store = FileStore::open(&dir)
        .with_context(|| format!("cannot open storage directory {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn open_session(
    config: &TempoConfig,
    server: Option<&str>,
) -> anyhow::Result<(Arc<SessionStore>, Arc<FileStore>)> {
    let client = forwarder(config, server)?;
    let storage = open_storage(config)?;
    let store = SessionStore::new(Arc::new(client), storage.clone());
    Ok((Arc::new(store), storage))
}

fn join_message(words: &[String]) -> String {
    words.join(" ").trim().to_string()
}

// ============================================================================
// Commands
// ============================================================================

async fn do_send(config: &TempoConfig, server: Option<&str>, text: &str) -> anyhow::Result<()> {
    let (store, _) = open_session(config, server)?;
    store.restore();
    let reply = store.send_message(text).await?;
    println!("{}", reply.content);
    Ok(())
}

fn do_history(config: &TempoConfig, server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (store, _) = open_session(config, server)?;
    if let Some(summary) = store.restore() {
        if summary.discarded_log {
            eprintln!("tempo: saved conversation was unreadable and has been discarded");
        }
    }
    let state = store.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&state.messages)?);
        return Ok(());
    }
    if state.messages.is_empty() {
        println!("No saved conversation");
    }
    for message in &state.messages {
        println!("{}", render::render_message(message));
    }
    if let Some(id) = state.session_id {
        println!("Session: {}", id);
    }
    Ok(())
}

fn do_new(config: &TempoConfig, server: Option<&str>) -> anyhow::Result<()> {
    let (store, _) = open_session(config, server)?;
    store.restore();
    store.start_new_session();
    println!("Started a new conversation.");
    Ok(())
}

async fn do_availability(
    config: &TempoConfig,
    server: Option<&str>,
    query: AvailabilityQuery,
    json: bool,
) -> anyhow::Result<()> {
    let availability = forwarder(config, server)?.availability(&query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&availability)?);
    } else {
        println!("{}", render::render_events(&availability.events));
    }
    Ok(())
}

async fn do_schedule(config: &TempoConfig, server: Option<&str>, body: &str) -> anyhow::Result<()> {
    let body: serde_json::Value =
        serde_json::from_str(body).context("meeting body must be valid JSON")?;
    let result = forwarder(config, server)?.schedule_meeting(&body).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn do_status(config: &TempoConfig, server: Option<&str>) -> anyhow::Result<()> {
    let client = forwarder(config, server)?;
    println!("Forwarder:     {}", client.base_url());
    match client.health().await {
        Ok(body) => println!(
            "Backend:       {}",
            body["status"].as_str().unwrap_or("ok")
        ),
        Err(e) => println!("Backend:       unavailable ({})", e),
    }

    // Engines are probed only; nothing is spawned.
    let (utterance_tx, _utterance_rx) = tokio::sync::mpsc::unbounded_channel();
    let (recognition_tx, _recognition_rx) = tokio::sync::mpsc::unbounded_channel();
    let output = match config.speech.synthesizer.as_deref() {
        Some(cmd) => SpeechOutput::negotiate(CommandSynthesizer::new(cmd, utterance_tx)),
        None => SpeechOutput::unsupported(),
    };
    let input = match config.speech.recognizer.as_deref() {
        Some(cmd) => SpeechInput::negotiate(CommandRecognizer::new(
            cmd,
            config.speech.language.clone(),
            recognition_tx,
        )),
        None => SpeechInput::unsupported(),
    };
    println!("Speech output: {}", render::capability_label(output.capability()));
    println!("Speech input:  {}", render::capability_label(input.capability()));

    let storage = open_storage(config)?;
    println!("Storage:       {}", storage.dir().display());
    let session = storage.get(tempo_core::storage::SESSION_ID_KEY)?;
    println!("Session:       {}", session.as_deref().unwrap_or("none"));
    Ok(())
}

fn do_settings(
    config: &TempoConfig,
    auto_speak: Option<bool>,
    tts: Option<bool>,
    stt: Option<bool>,
    voice: Option<String>,
) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let store: &dyn KeyValueStore = storage.as_ref();
    let mut prefs = SpeechPreferences::load(store)?;
    if let Some(on) = auto_speak {
        prefs.set_auto_speak(store, on)?;
    }
    if let Some(on) = tts {
        prefs.set_tts_enabled(store, on)?;
    }
    if let Some(on) = stt {
        prefs.set_stt_enabled(store, on)?;
    }
    if let Some(name) = voice {
        prefs.set_selected_voice(store, &name)?;
    }
    println!("{}", render::render_preferences(&prefs));
    Ok(())
}

async fn run(cli: Cli, config: TempoConfig) -> anyhow::Result<()> {
    let server = cli.server.as_deref();
    match cli.command {
        Commands::Chat => {
            let (store, storage) = open_session(&config, server)?;
            chat::run(store, storage, &config.speech).await
        }
        Commands::Send { message } => do_send(&config, server, &join_message(&message)).await,
        Commands::History { json } => do_history(&config, server, json),
        Commands::New => do_new(&config, server),
        Commands::Availability { start, end, json } => {
            do_availability(&config, server, AvailabilityQuery { start, end }, json).await
        }
        Commands::Schedule { body } => do_schedule(&config, server, &body).await,
        Commands::Status => do_status(&config, server).await,
        Commands::Settings {
            auto_speak,
            tts,
            stt,
            voice,
        } => do_settings(&config, auto_speak, tts, stt, voice),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only command output
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let config = match TempoConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tempo: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        eprintln!("tempo: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
