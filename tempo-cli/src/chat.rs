//! Interactive chat loop.
//!
//! Lines typed at the prompt are sent as messages; lines starting with `/` are
//! commands. A recognized utterance becomes a draft that an empty line sends.
//! Exchanges run as background tasks so the prompt stays usable while a reply
//! is pending, but only one message is in flight at a time. Speech engine events, replies and delayed
//! auto-speak requests all arrive on channels drained by one `select!` loop.

use std::sync::Arc;

use tempo_core::config::SpeechConfig;
use tempo_core::models::Message;
use tempo_core::preferences::SpeechPreferences;
use tempo_core::speech::{
    spoken_reply, AutoSpeaker, CommandRecognizer, CommandSynthesizer, RecognitionEvent,
    SpeechInput, SpeechOutput, Voice,
};
use tempo_core::{KeyValueStore, SendError, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::render;

const HELP: &str = "\
Commands:
  /new              start a new conversation
  /listen           speak a message (speech input)
  /speak            read the last reply aloud
  /stop             stop speaking or listening
  /voices           list synthesis voices
  /voice <name>     select a voice
  /autospeak on|off read replies aloud automatically
  /history          show the conversation
  (empty line)      send the draft heard by /listen
  /help             show this help
  /quit             leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Message(String),
    NewSession,
    Listen,
    Speak,
    Stop,
    Voices,
    Voice(String),
    AutoSpeak(bool),
    History,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_line(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplInput::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("new", _) => ReplInput::NewSession,
        ("listen", _) => ReplInput::Listen,
        ("speak", _) => ReplInput::Speak,
        ("stop", _) => ReplInput::Stop,
        ("voices", _) => ReplInput::Voices,
        ("voice", name) if !name.is_empty() => ReplInput::Voice(name.to_string()),
        ("autospeak", "on") => ReplInput::AutoSpeak(true),
        ("autospeak", "off") => ReplInput::AutoSpeak(false),
        ("history", _) => ReplInput::History,
        ("help", _) | ("?", _) => ReplInput::Help,
        ("quit", _) | ("exit", _) => ReplInput::Quit,
        _ => ReplInput::Unknown(line.to_string()),
    }
}

struct Channels {
    replies: UnboundedSender<Result<Message, SendError>>,
    speak: UnboundedSender<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Send(String),
    Busy(String),
    Nothing,
}

/// Typed text replaces the draft; an empty line sends the draft. While a
/// reply is pending nothing is sent and the text is kept as the draft.
pub fn submit(typed: Option<String>, draft: &mut Option<String>, busy: bool) -> Submission {
    let Some(text) = typed.or_else(|| draft.take()) else {
        return Submission::Nothing;
    };
    if busy {
        *draft = Some(text.clone());
        return Submission::Busy(text);
    }
    *draft = None;
    Submission::Send(text)
}

fn spawn_send(store: &Arc<SessionStore>, channels: &Channels, text: String) {
    let store = store.clone();
    let replies = channels.replies.clone();
    tokio::spawn(async move {
        let result = store.send_message(&text).await;
        let _ = replies.send(result);
    });
}

pub async fn run(
    store: Arc<SessionStore>,
    storage: Arc<dyn KeyValueStore>,
    speech: &SpeechConfig,
) -> anyhow::Result<()> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let (speak_tx, mut speak_rx) = mpsc::unbounded_channel::<String>();
    let (utterance_tx, mut utterance_rx) = mpsc::unbounded_channel();
    let (recognition_tx, mut recognition_rx) = mpsc::unbounded_channel();
    let (voices_tx, mut voices_rx) = mpsc::unbounded_channel::<Vec<Voice>>();
    let channels = Channels {
        replies: reply_tx,
        speak: speak_tx,
    };

    let mut prefs = SpeechPreferences::load(storage.as_ref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read speech settings, using defaults");
        SpeechPreferences::default()
    });

    let mut output = match speech.synthesizer.as_deref() {
        Some(cmd) => {
            let lister = CommandSynthesizer::new(cmd, utterance_tx.clone());
            tokio::spawn(async move {
                match lister.list_voices().await {
                    Ok(voices) => {
                        let _ = voices_tx.send(voices);
                    }
                    Err(e) => tracing::debug!(error = %e, "Voice listing unavailable"),
                }
            });
            SpeechOutput::negotiate(CommandSynthesizer::new(cmd, utterance_tx.clone()))
        }
        None => SpeechOutput::unsupported(),
    };
    let mut input = match speech.recognizer.as_deref() {
        Some(cmd) => SpeechInput::negotiate(CommandRecognizer::new(
            cmd,
            speech.language.clone(),
            recognition_tx.clone(),
        )),
        None => SpeechInput::unsupported(),
    };

    let mut auto_speaker = AutoSpeaker::new();
    if let Some(summary) = store.restore() {
        if summary.discarded_log {
            println!("(The saved conversation could not be read and was discarded.)");
        }
    }
    let restored = store.snapshot();
    auto_speaker.prime(&restored.messages);
    for message in &restored.messages {
        println!("{}", render::render_message(message));
    }
    println!(
        "Tempo scheduling assistant. Speech output: {}, speech input: {}. Type /help for commands.",
        render::capability_label(output.capability()),
        render::capability_label(input.capability())
    );

    let mut draft: Option<String> = None;
    let mut awaiting_reply = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let entry = parse_line(&line);
                match entry {
                    ReplInput::Empty | ReplInput::Message(_) => {
                        let typed = match entry {
                            ReplInput::Message(text) => Some(text),
                            _ => None,
                        };
                        let busy = awaiting_reply || store.snapshot().is_loading;
                        match submit(typed, &mut draft, busy) {
                            Submission::Send(text) => {
                                awaiting_reply = true;
                                spawn_send(&store, &channels, text);
                            }
                            Submission::Busy(text) => println!(
                                "Waiting for the previous reply. Press Enter to send \"{}\" once it arrives.",
                                text
                            ),
                            Submission::Nothing => {}
                        }
                    }
                    ReplInput::NewSession => {
                        output.stop();
                        draft = None;
                        store.start_new_session();
                        auto_speaker = AutoSpeaker::new();
                        println!("Started a new conversation.");
                    }
                    ReplInput::Listen => {
                        if !prefs.stt_enabled {
                            println!("Speech input is turned off (tempo settings --stt true).");
                        } else if let Err(e) = input.start() {
                            println!("{}", input.error().map(str::to_string).unwrap_or_else(|| e.to_string()));
                        } else {
                            println!("Listening...");
                        }
                    }
                    ReplInput::Speak => {
                        if !prefs.tts_enabled {
                            println!("Text-to-speech is turned off (tempo settings --tts true).");
                        } else if let Some(last) = store.snapshot().last_assistant_message() {
                            if let Err(e) = output.speak(&spoken_reply(&last.content)) {
                                println!("{}", e);
                            }
                        }
                    }
                    ReplInput::Stop => {
                        output.stop();
                        input.stop();
                    }
                    ReplInput::Voices => {
                        println!("{}", render::render_voices(output.voices(), output.selected_voice()));
                    }
                    ReplInput::Voice(name) => {
                        if output.select_voice(&name) {
                            if let Err(e) = prefs.set_selected_voice(storage.as_ref(), &name) {
                                tracing::warn!(error = %e, "Failed to save voice selection");
                            }
                            println!("Voice set to {}.", name);
                        } else {
                            println!("Unknown voice '{}'. Try /voices.", name);
                        }
                    }
                    ReplInput::AutoSpeak(on) => {
                        if let Err(e) = prefs.set_auto_speak(storage.as_ref(), on) {
                            tracing::warn!(error = %e, "Failed to save auto-speak setting");
                        }
                        println!("Auto-speak {}.", if on { "on" } else { "off" });
                    }
                    ReplInput::History => {
                        for message in &store.snapshot().messages {
                            println!("{}", render::render_message(message));
                        }
                    }
                    ReplInput::Help => println!("{}", HELP),
                    ReplInput::Quit => break,
                    ReplInput::Unknown(raw) => println!("Unknown command '{}'. Type /help.", raw),
                }
            }
            Some(result) = reply_rx.recv() => match result {
                Ok(message) => {
                    awaiting_reply = false;
                    println!("{}", render::render_message(&message));
                    if let Some(text) = auto_speaker.next_utterance(&prefs, &message) {
                        let speak = channels.speak.clone();
                        let delay = speech.auto_speak_delay();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = speak.send(text);
                        });
                    }
                }
                Err(SendError::Stale) => awaiting_reply = false,
                Err(e) => {
                    awaiting_reply = false;
                    println!("Error: {}", e);
                }
            },
            Some(text) = speak_rx.recv() => {
                if let Err(e) = output.speak(&text) {
                    tracing::warn!(error = %e, "Auto-speak failed");
                }
            }
            Some(event) = utterance_rx.recv() => output.handle(event),
            Some(event) = recognition_rx.recv() => {
                let failed = matches!(event, RecognitionEvent::Error(_));
                input.handle(event);
                if failed {
                    if let Some(error) = input.error() {
                        println!("{}", error);
                    }
                }
                if let Some(text) = input.take_transcript() {
                    println!("Heard: {} (Enter sends it, or type a replacement)", text);
                    draft = Some(text);
                }
            }
            Some(voices) = voices_rx.recv() => {
                output.set_voices(voices);
                if let Some(name) = prefs.selected_voice.as_deref() {
                    if !output.select_voice(name) {
                        tracing::debug!(voice = name, "Saved voice not offered by synthesizer");
                    }
                }
            }
        }
    }

    output.stop();
    input.stop();
    Ok(())
}
