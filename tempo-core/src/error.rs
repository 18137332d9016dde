use thiserror::Error;

use crate::client::ExchangeError;
use crate::speech::SpeechError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum TempoError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
