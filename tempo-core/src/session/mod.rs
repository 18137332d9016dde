pub mod state;
pub mod store;

pub use state::{Action, ConversationState};
pub use store::{RestoreSummary, SendError, SessionStore, StaleReplyPolicy};
