use tracing::info;

use crate::client::{ChatClient, ChatEvent};

impl ChatClient {
    /// Closes the channel and forgets the session. Safe to call twice.
    pub async fn logout(&self) {
        let mut state = self.shared.state.lock().await;
        let ended = state.session.as_ref().map(|session| session.user.id.clone());
        state.clear();

        if let Some(user_id) = ended {
            info!("bye u/{user_id}");
            self.shared.emit(ChatEvent::SessionEnded);
        }
    }
}
