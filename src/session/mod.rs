mod login;
mod logout;
mod profile;

use std::sync::Arc;

use tracing::info;

pub use profile::ProfileUpdate;

use crate::{
    client::ChatClient,
    model::{AuthToken, User, UserId},
    presence::{PresenceChannel, PresenceSet},
    push::PushIdentity,
};

/// The logged-in user, the token the service issued, and whether the
/// presence channel is currently connected.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub(crate) token: AuthToken,
    pub channel_live: bool,
}

impl ChatClient {
    pub async fn is_logged_in(&self) -> bool {
        self.shared.state.lock().await.session.is_some()
    }

    pub async fn current_user(&self) -> Option<User> {
        let state = self.shared.state.lock().await;
        state.session.as_ref().map(|session| session.user.clone())
    }

    pub async fn is_channel_live(&self) -> bool {
        let state = self.shared.state.lock().await;
        state.session.as_ref().is_some_and(|session| session.channel_live)
    }

    pub async fn online_users(&self) -> PresenceSet {
        self.shared.state.lock().await.presence.clone()
    }

    /// The local user counts as online whenever the channel is connected,
    /// whether or not the last snapshot listed them.
    pub async fn is_online(&self, user_id: &UserId) -> bool {
        let state = self.shared.state.lock().await;
        let Some(session) = &state.session else {
            return false;
        };
        (session.channel_live && &session.user.id == user_id) || state.presence.contains(user_id)
    }

    /// Reopens the presence channel after it gave up. Does nothing while a
    /// channel task is still running or when logged out.
    pub async fn reconnect(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        let Some(session) = &state.session else {
            return false;
        };
        if state.channel.as_ref().is_some_and(PresenceChannel::is_running) {
            return false;
        }

        let identity = PushIdentity {
            user_id: session.user.id.clone(),
            token: session.token.clone(),
        };
        info!("reopening presence channel for u/{}", identity.user_id);
        state.channel = Some(self.open_channel(identity));
        true
    }

    pub(crate) fn open_channel(&self, identity: PushIdentity) -> PresenceChannel {
        PresenceChannel::open(
            Arc::downgrade(&self.shared),
            Arc::clone(&self.shared.transport),
            identity,
            self.shared.config.reconnect,
        )
    }
}
