//! Conversation aggregate and its reducer.
//!
//! Every state change goes through [`ConversationState::reduce`]. The reducer
//! reads only the action payload and the prior state, so replaying the same
//! actions from [`ConversationState::default`] always yields the same state.

use crate::models::Message;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub session_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddMessage(Message),
    SetLoading(bool),
    SetError(Option<String>),
    SetSessionId(String),
    LoadMessages(Vec<Message>),
    ClearSession,
}

impl Action {
    pub fn touches_messages(&self) -> bool {
        matches!(
            self,
            Action::AddMessage(_) | Action::LoadMessages(_) | Action::ClearSession
        )
    }
}

impl ConversationState {
    pub fn reduce(mut self, action: Action) -> Self {
        match action {
            Action::AddMessage(message) => self.messages.push(message),
            Action::SetLoading(loading) => self.is_loading = loading,
            Action::SetError(error) => self.error = error,
            Action::SetSessionId(id) => self.session_id = Some(id),
            Action::LoadMessages(messages) => self.messages = messages,
            Action::ClearSession => return Self::default(),
        }
        self
    }

    pub fn replay(actions: impl IntoIterator<Item = Action>) -> Self {
        actions
            .into_iter()
            .fold(Self::default(), |state, action| state.reduce(action))
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }
}
