//! Conversation session store.
//!
//! Owns the [`ConversationState`], applies every change through the reducer,
//! mirrors `messages` and `session_id` into a [`KeyValueStore`] once the
//! initial restore has run, and performs chat exchanges through a
//! [`ChatTransport`].
//!
//! The state mutex is never held across the exchange `.await`; the session id
//! attached to a request is the live value at the moment the request is built.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;

use crate::api::ChatRequest;
use crate::client::{ChatTransport, ExchangeError};
use crate::models::{IdSequence, Message};
use crate::session::state::{Action, ConversationState};
use crate::storage::{KeyValueStore, MESSAGES_KEY, SESSION_ID_KEY};

/// What to do with a reply that lands after `start_new_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleReplyPolicy {
    /// Apply it to the new session anyway.
    #[default]
    Apply,
    /// Drop it without touching state.
    Discard,
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Reply arrived after the session was reset and was discarded")]
    Stale,
}

/// Result of the one-time restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub messages: usize,
    pub session_id: Option<String>,
    /// A stored log existed but could not be parsed.
    pub discarded_log: bool,
}

struct Inner {
    state: ConversationState,
    restored: bool,
    epoch: u64,
    ids: IdSequence,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    transport: Arc<dyn ChatTransport>,
    storage: Arc<dyn KeyValueStore>,
    stale_policy: StaleReplyPolicy,
}

impl SessionStore {
    pub fn new(transport: Arc<dyn ChatTransport>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConversationState::default(),
                restored: false,
                epoch: 0,
                ids: IdSequence::default(),
            }),
            transport,
            storage,
            stale_policy: StaleReplyPolicy::default(),
        }
    }

    pub fn with_stale_reply_policy(mut self, policy: StaleReplyPolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn snapshot(&self) -> ConversationState {
        self.lock().state.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().state.session_id.clone()
    }

    pub fn is_restored(&self) -> bool {
        self.lock().restored
    }

    /// Load the saved log and session id. Runs once; later calls return `None`.
    ///
    /// An unparsable log is dropped with a warning and the store stays empty.
    pub fn restore(&self) -> Option<RestoreSummary> {
        let mut inner = self.lock();
        if inner.restored {
            return None;
        }

        let mut discarded_log = false;
        match self.storage.get(MESSAGES_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => {
                    inner.ids.seed_from(&messages);
                    self.dispatch(&mut inner, Action::LoadMessages(messages));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable saved conversation");
                    discarded_log = true;
                }
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read saved conversation"),
        }

        match self.storage.get(SESSION_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => {
                self.dispatch(&mut inner, Action::SetSessionId(id.trim().to_string()));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read saved session id"),
        }

        inner.restored = true;
        let summary = RestoreSummary {
            messages: inner.state.messages.len(),
            session_id: inner.state.session_id.clone(),
            discarded_log,
        };
        tracing::info!(
            messages = summary.messages,
            session_id = summary.session_id.as_deref().unwrap_or("none"),
            "Conversation restored"
        );
        Some(summary)
    }

    /// Append the user message, run one exchange, append the reply.
    ///
    /// On failure the error is recorded in the state and no assistant message
    /// is added. `is_loading` is cleared on both paths.
    pub async fn send_message(&self, text: &str) -> Result<Message, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let (request, epoch) = {
            let mut inner = self.lock();
            let now = Utc::now();
            let id = inner.ids.next(now);
            self.dispatch(&mut inner, Action::AddMessage(Message::user(id, text, now)));
            self.dispatch(&mut inner, Action::SetLoading(true));
            self.dispatch(&mut inner, Action::SetError(None));
            let request = ChatRequest::new(text, inner.state.session_id.clone());
            (request, inner.epoch)
        };

        tracing::debug!(
            session_id = request.session_id.as_deref().unwrap_or("none"),
            "Starting exchange"
        );
        let result = self.transport.exchange(&request).await;

        let mut inner = self.lock();
        if inner.epoch != epoch && self.stale_policy == StaleReplyPolicy::Discard {
            tracing::info!("Dropping reply from a session that has since been reset");
            return Err(SendError::Stale);
        }

        let outcome = match result {
            Ok(reply) => {
                if let Some(session_id) = reply.session_id.filter(|s| !s.is_empty()) {
                    if inner.state.session_id.as_deref() != Some(session_id.as_str()) {
                        tracing::info!(
                            previous = inner.state.session_id.as_deref().unwrap_or("none"),
                            current = %session_id,
                            "Backend assigned session id"
                        );
                    }
                    self.dispatch(&mut inner, Action::SetSessionId(session_id));
                }
                let now = Utc::now();
                let id = inner.ids.next(now);
                let message = Message::assistant(id, reply.response, now);
                self.dispatch(&mut inner, Action::AddMessage(message.clone()));
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Exchange failed");
                self.dispatch(&mut inner, Action::SetError(Some(e.to_string())));
                Err(SendError::Exchange(e))
            }
        };

        self.dispatch(&mut inner, Action::SetLoading(false));
        outcome
    }

    /// Reset to the empty aggregate and purge the saved log and session id.
    /// Pending exchanges are not cancelled.
    pub fn start_new_session(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        self.dispatch(&mut inner, Action::ClearSession);
        for key in [MESSAGES_KEY, SESSION_ID_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to purge stored session state");
            }
        }
        tracing::info!(epoch = inner.epoch, "Started new session");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, inner: &mut Inner, action: Action) {
        let touches_messages = action.touches_messages();
        let previous_session = inner.state.session_id.clone();
        inner.state = std::mem::take(&mut inner.state).reduce(action);

        if !inner.restored {
            return;
        }

        if touches_messages && !inner.state.messages.is_empty() {
            self.persist_messages(&inner.state.messages);
        }
        if inner.state.session_id != previous_session {
            self.persist_session_id(inner.state.session_id.as_deref());
        }
    }

    fn persist_messages(&self, messages: &[Message]) {
        let raw = match serde_json::to_string(messages) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize conversation");
                return;
            }
        };
        if let Err(e) = self.storage.set(MESSAGES_KEY, &raw) {
            tracing::warn!(error = %e, "Failed to save conversation");
        }
    }

    fn persist_session_id(&self, session_id: Option<&str>) {
        let result = match session_id {
            Some(id) => self.storage.set(SESSION_ID_KEY, id),
            None => self.storage.remove(SESSION_ID_KEY),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save session id");
        }
    }
}
