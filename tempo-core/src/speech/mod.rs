//! Speech input and output adapters.
//!
//! The adapters are engine-agnostic state machines. Engines report events
//! back to their adapter; `command` provides engines backed by external
//! programs for terminal hosts.

pub mod command;
pub mod input;
pub mod output;
pub mod text;

use std::fmt;

use thiserror::Error;

pub use command::{CommandRecognizer, CommandSynthesizer};
pub use input::{RecognitionEngine, RecognitionEvent, SpeechInput};
pub use output::{SpeechOutput, SynthesisEngine, Utterance, UtteranceEvent, UtteranceId, Voice};
pub use text::{display_text, speakable_text, spoken_reply, AutoSpeaker};

/// Result of probing an engine once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Unsupported,
    Idle,
    Active,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Unsupported => write!(f, "unsupported"),
            Capability::Idle => write!(f, "idle"),
            Capability::Active => write!(f, "active"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("{0} is not supported on this system")]
    Unsupported(&'static str),

    #[error("Speech engine error: {0}")]
    Engine(String),

    #[error("Failed to launch speech program: {0}")]
    Spawn(#[from] std::io::Error),
}
