pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod preferences;
pub mod session;
pub mod speech;
pub mod storage;

pub use api::{ChatReply, ChatRequest, ErrorBody, SEND_FAILED};
pub use client::{ChatTransport, ExchangeError, ForwarderClient};
pub use config::TempoConfig;
pub use error::TempoError;
pub use preferences::SpeechPreferences;
pub use session::{ConversationState, SendError, SessionStore, StaleReplyPolicy};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
