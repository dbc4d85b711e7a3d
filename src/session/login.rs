use tracing::info;

use crate::{
    client::{ChatClient, ChatEvent},
    error::AuthError,
    model::{AuthGrant, AuthKind, Credentials, User},
    push::PushIdentity,
};

use super::Session;

impl ChatClient {
    /// Signs up or logs in, then opens the presence channel. Fails without
    /// touching anything if a session is already live.
    pub async fn login(&self, kind: AuthKind, credentials: Credentials) -> Result<User, AuthError> {
        credentials.check(kind).map_err(AuthError::InvalidInput)?;
        if self.shared.state.lock().await.session.is_some() {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let AuthGrant { user, token } = self.shared.backend.authenticate(kind, &credentials).await?;

        let mut state = self.shared.state.lock().await;
        if state.session.is_some() {
            return Err(AuthError::AlreadyAuthenticated);
        }
        state.clear();

        let identity = PushIdentity {
            user_id: user.id.clone(),
            token: token.clone(),
        };
        state.channel = Some(self.open_channel(identity));
        state.session = Some(Session {
            user: user.clone(),
            token,
            channel_live: false,
        });

        info!("welcome u/{}, {}", user.id, user.full_name);
        self.shared.emit(ChatEvent::SessionStarted(user.clone()));
        Ok(user)
    }
}
