use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    api::{Backend, HttpBackend},
    config::ChatConfig,
    conversation::ConversationStore,
    error::TransportError,
    model::{AuthToken, Message, User, UserId},
    presence::{ChannelId, PresenceChannel, PresenceSet},
    push::{PushEvent, PushTransport, WsTransport},
    session::Session,
};

/// Everything a view might want to react to.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    SessionStarted(User),
    SessionEnded,
    ProfileUpdated(User),
    ChannelConnected,
    ChannelLost(TransportError),
    ChannelAbandoned(TransportError),
    PresenceChanged(PresenceSet),
    ContactsUpdated,
    ConversationSelected(UserId),
    ConversationClosed,
    HistoryLoaded { user_id: UserId, messages: usize },
    MessageAppended(Message),
    UnseenChanged { user_id: UserId, count: u32 },
}

/// The chat core. Clones share the same session and state.
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) transport: Arc<dyn PushTransport>,
    pub(crate) config: ChatConfig,
    pub(crate) state: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
}

/// All mutable state, behind one lock so that selection resets, pushed
/// increments and history applies are linearized.
#[derive(Default)]
pub(crate) struct ChatState {
    pub(crate) session: Option<Session>,
    pub(crate) channel: Option<PresenceChannel>,
    pub(crate) presence: PresenceSet,
    pub(crate) store: ConversationStore,
}

impl ChatState {
    /// Drops the session and its channel and forgets everything it saw.
    pub(crate) fn clear(&mut self) {
        self.channel = None;
        self.session = None;
        self.presence = PresenceSet::default();
        self.store.clear();
    }

    pub(crate) fn token(&self) -> Option<AuthToken> {
        self.session.as_ref().map(|session| session.token.clone())
    }

    pub(crate) fn local_id(&self) -> Option<&UserId> {
        self.session.as_ref().map(|session| &session.user.id)
    }

    /// True while the session that issued `token` is still the live one.
    pub(crate) fn holds(&self, token: &AuthToken) -> bool {
        self.session.as_ref().is_some_and(|session| &session.token == token)
    }

    fn owns_channel(&self, channel: ChannelId) -> bool {
        self.session.is_some() && self.channel.as_ref().is_some_and(|c| c.id() == channel)
    }
}

impl ChatClient {
    pub fn new(backend: Arc<dyn Backend>, transport: Arc<dyn PushTransport>, config: ChatConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                backend,
                transport,
                config,
                state: Mutex::new(ChatState::default()),
                events,
            }),
        }
    }

    /// HTTP backend and websocket push at the configured URLs.
    pub fn from_config(config: ChatConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(config.api_url.clone()));
        let transport = Arc::new(WsTransport::new(config.push_url.clone()));
        Self::new(backend, transport, config)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.events.subscribe()
    }
}

impl Shared {
    pub(crate) fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) async fn channel_connected(&self, channel: ChannelId) -> bool {
        let mut state = self.state.lock().await;
        if !state.owns_channel(channel) {
            return false;
        }
        if let Some(session) = state.session.as_mut() {
            session.channel_live = true;
        }
        self.emit(ChatEvent::ChannelConnected);
        true
    }

    /// The last known presence stays in place until a new snapshot arrives.
    pub(crate) async fn channel_lost(&self, channel: ChannelId, err: TransportError) -> bool {
        let mut state = self.state.lock().await;
        if !state.owns_channel(channel) {
            return false;
        }
        if let Some(session) = state.session.as_mut() {
            session.channel_live = false;
        }
        warn!("presence channel lost: {err}");
        self.emit(ChatEvent::ChannelLost(err));
        true
    }

    pub(crate) async fn channel_abandoned(&self, channel: ChannelId, err: TransportError) {
        let mut state = self.state.lock().await;
        if !state.owns_channel(channel) {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.channel_live = false;
        }
        // The task returns right after this, so the abort on drop is a no-op.
        state.channel = None;
        self.emit(ChatEvent::ChannelAbandoned(err));
    }

    /// Applies one pushed event. Returns false once `channel` is no longer
    /// the session's channel.
    pub(crate) async fn handle_push(self: &Arc<Self>, channel: ChannelId, event: PushEvent) -> bool {
        let mut state = self.state.lock().await;
        if !state.owns_channel(channel) {
            debug!("dropping push for retired channel {channel:?}");
            return false;
        }

        match event {
            PushEvent::PresenceSnapshot { user_ids } => {
                state.presence = user_ids.into_iter().collect();
                self.emit(ChatEvent::PresenceChanged(state.presence.clone()));
                drop(state);

                if self.config.refresh_contacts_on_presence {
                    let client = ChatClient {
                        shared: Arc::clone(self),
                    };
                    tokio::spawn(async move {
                        if let Err(err) = client.get_users().await {
                            warn!("contact refresh failed: {err}");
                        }
                    });
                }
            }
            PushEvent::NewMessage { message } => self.receive_message(&mut state, message),
        }
        true
    }
}
