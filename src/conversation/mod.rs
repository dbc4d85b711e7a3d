mod dispatch;
mod store;

use std::collections::HashMap;

use tracing::{debug, warn};

pub use dispatch::OutgoingMessage;
pub use store::{ConversationState, ConversationStore};

use crate::{
    client::{ChatClient, ChatEvent},
    error::FetchError,
    model::{Message, User, UserId},
};

/// How a selection's history fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Loaded { messages: usize },
    /// Another selection (or a deselect or logout) happened first.
    Discarded,
}

impl ChatClient {
    /// Fetches contacts and unseen counters and replaces the local copies.
    pub async fn get_users(&self) -> Result<Vec<User>, FetchError> {
        let (token, ticket) = {
            let mut state = self.shared.state.lock().await;
            let token = state.token().ok_or(FetchError::NotAuthenticated)?;
            (token, state.store.begin_contacts())
        };

        let snapshot = self.shared.backend.fetch_contacts(&token).await?;

        let mut state = self.shared.state.lock().await;
        if !state.holds(&token) {
            return Err(FetchError::NotAuthenticated);
        }
        if state.store.apply_contacts(ticket, snapshot) {
            self.shared.emit(ChatEvent::ContactsUpdated);
        } else {
            debug!("ignoring superseded contact list");
        }
        Ok(state.store.contacts().to_vec())
    }

    /// Opens the conversation with `user_id`: its unseen count drops to 0
    /// at once, then history is fetched and replaces whatever was shown.
    pub async fn select_conversation(&self, user_id: &UserId) -> Result<SelectOutcome, FetchError> {
        let (token, ticket) = {
            let mut state = self.shared.state.lock().await;
            let token = state.token().ok_or(FetchError::NotAuthenticated)?;
            let ticket = state.store.select(user_id.clone());
            self.shared.emit(ChatEvent::ConversationSelected(user_id.clone()));
            self.shared.emit(ChatEvent::UnseenChanged {
                user_id: user_id.clone(),
                count: 0,
            });
            (token, ticket)
        };

        let history = match self.shared.backend.fetch_history(&token, user_id).await {
            Ok(history) => history,
            Err(err) => {
                let mut state = self.shared.state.lock().await;
                if state.holds(&token) && state.store.abandon_history(&ticket) {
                    warn!("history for u/{user_id} failed to load: {err}");
                }
                return Err(err.into());
            }
        };

        let mut state = self.shared.state.lock().await;
        let Some(local) = state.local_id().cloned().filter(|_| state.holds(&token)) else {
            return Ok(SelectOutcome::Discarded);
        };
        match state.store.apply_history(&ticket, &local, history) {
            Some(messages) => {
                self.shared.emit(ChatEvent::HistoryLoaded {
                    user_id: ticket.user_id.clone(),
                    messages,
                });
                Ok(SelectOutcome::Loaded { messages })
            }
            None => {
                debug!("discarding stale history for u/{user_id}");
                Ok(SelectOutcome::Discarded)
            }
        }
    }

    pub async fn deselect(&self) {
        let mut state = self.shared.state.lock().await;
        if state.store.deselect() {
            self.shared.emit(ChatEvent::ConversationClosed);
        }
    }

    pub async fn contacts(&self) -> Vec<User> {
        self.shared.state.lock().await.store.contacts().to_vec()
    }

    pub async fn filter_contacts(&self, query: &str) -> Vec<User> {
        let state = self.shared.state.lock().await;
        state.store.filter_contacts(query).into_iter().cloned().collect()
    }

    pub async fn active_conversation(&self) -> Option<UserId> {
        self.shared.state.lock().await.store.active().cloned()
    }

    pub async fn conversation_state(&self, user_id: &UserId) -> ConversationState {
        self.shared.state.lock().await.store.state_of(user_id)
    }

    /// The open conversation's messages, oldest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().await.store.messages().to_vec()
    }

    pub async fn unseen(&self, user_id: &UserId) -> u32 {
        self.shared.state.lock().await.store.unseen(user_id)
    }

    pub async fn unseen_counts(&self) -> HashMap<UserId, u32> {
        self.shared.state.lock().await.store.unseen_counts().clone()
    }
}
