//! Speech engines backed by external programs.
//!
//! A configured command line such as `espeak-ng -s 160` is split on
//! whitespace; the first word is resolved against `PATH`. Engines must be
//! driven from inside a tokio runtime.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::config::expand_path;
use crate::speech::input::{RecognitionEngine, RecognitionEvent};
use crate::speech::output::{SynthesisEngine, Utterance, UtteranceEvent, Voice};
use crate::speech::SpeechError;

/// Environment variable carrying the recognition language to the recognizer program.
pub const LANGUAGE_ENV: &str = "TEMPO_SPEECH_LANG";

#[derive(Debug, Clone)]
struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLine {
    fn parse(raw: &str) -> Option<Self> {
        let expanded = expand_path(raw);
        let mut words = expanded.split_whitespace();
        let program = resolve_program(words.next()?)?;
        Some(Self {
            program,
            args: words.map(str::to_string).collect(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Find `name` on `PATH`, or accept it directly when it already names a file.
pub fn resolve_program(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if name.contains(std::path::MAIN_SEPARATOR) {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn describe_failure(status: std::process::ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", status)
    } else {
        stderr
    }
}

pub struct CommandSynthesizer {
    command: Option<CommandLine>,
    events: UnboundedSender<UtteranceEvent>,
    running: Option<JoinHandle<()>>,
}

impl CommandSynthesizer {
    pub fn new(command_line: &str, events: UnboundedSender<UtteranceEvent>) -> Self {
        Self {
            command: CommandLine::parse(command_line),
            events,
            running: None,
        }
    }

    /// Ask the program for its voices (`<program> --voices`, espeak format).
    pub async fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let command = self
            .command
            .as_ref()
            .ok_or(SpeechError::Unsupported("Speech synthesis"))?;
        let output = Command::new(&command.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(SpeechError::Engine(describe_failure(
                output.status,
                &output.stderr,
            )));
        }
        Ok(parse_espeak_voices(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl SynthesisEngine for CommandSynthesizer {
    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        let command = self
            .command
            .as_ref()
            .ok_or(SpeechError::Unsupported("Speech synthesis"))?;
        let mut cmd = command.command();
        // espeak selects voices by language code
        if let Some(voice) = &utterance.voice {
            cmd.arg("-v").arg(&voice.lang);
        }
        cmd.arg(&utterance.text);

        let child = cmd.spawn()?;
        let id = utterance.id;
        let events = self.events.clone();
        let _ = events.send(UtteranceEvent::Started(id));
        self.running = Some(tokio::spawn(async move {
            let event = match child.wait_with_output().await {
                Ok(out) if out.status.success() => UtteranceEvent::Ended(id),
                Ok(out) => UtteranceEvent::Failed(id, describe_failure(out.status, &out.stderr)),
                Err(e) => UtteranceEvent::Failed(id, e.to_string()),
            };
            let _ = events.send(event);
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        // Aborting drops the child, which kills it.
        if let Some(handle) = self.running.take() {
            handle.abort();
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct CommandRecognizer {
    command: Option<CommandLine>,
    language: String,
    events: UnboundedSender<RecognitionEvent>,
    running: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(
        command_line: &str,
        language: impl Into<String>,
        events: UnboundedSender<RecognitionEvent>,
    ) -> Self {
        Self {
            command: CommandLine::parse(command_line),
            language: language.into(),
            events,
            running: None,
        }
    }
}

impl RecognitionEngine for CommandRecognizer {
    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    fn start(&mut self) -> Result<(), SpeechError> {
        let command = self
            .command
            .as_ref()
            .ok_or(SpeechError::Unsupported("Speech recognition"))?;
        let mut cmd = command.command();
        cmd.env(LANGUAGE_ENV, &self.language);

        let child = cmd.spawn()?;
        let events = self.events.clone();
        let _ = events.send(RecognitionEvent::Started);
        self.running = Some(tokio::spawn(async move {
            let event = match child.wait_with_output().await {
                Ok(out) if out.status.success() => {
                    let transcript = String::from_utf8_lossy(&out.stdout).trim().to_string();
                    if transcript.is_empty() {
                        RecognitionEvent::Error("no-speech".to_string())
                    } else {
                        RecognitionEvent::Result(transcript)
                    }
                }
                Ok(out) => RecognitionEvent::Error(describe_failure(out.status, &out.stderr)),
                Err(e) => RecognitionEvent::Error(e.to_string()),
            };
            let _ = events.send(event);
            let _ = events.send(RecognitionEvent::Ended);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.abort();
            let _ = self.events.send(RecognitionEvent::Ended);
        }
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.abort();
        }
    }
}

/// Parse `espeak-ng --voices` output:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
pub fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            match cols.as_slice() {
                [_pty, lang, _age_gender, name, ..] => Some(Voice {
                    name: name.replace('_', " "),
                    lang: lang.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}
