use tracing::{info, warn};

use crate::{
    client::{ChatClient, ChatEvent, ChatState, Shared},
    error::SendError,
    image::InlineImage,
    model::{Message, MessagePayload},
};

use super::store::Routed;

/// A message about to be sent: text, raw image bytes, or both.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            image: Some(bytes),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = Some(bytes);
        self
    }

    pub(crate) fn into_payload(self, max_image_bytes: usize) -> Result<MessagePayload, SendError> {
        let text = match self.text {
            Some(text) if text.trim().is_empty() => return Err(SendError::EmptyMessage),
            Some(text) => Some(text.trim().to_owned()),
            None => None,
        };
        let image = match self.image {
            Some(bytes) => Some(InlineImage::from_bytes(bytes, max_image_bytes)?.to_data_url()),
            None => None,
        };
        if text.is_none() && image.is_none() {
            return Err(SendError::EmptyMessage);
        }
        Ok(MessagePayload { text, image })
    }
}

impl ChatClient {
    /// Sends to the open conversation. The message shows up locally only
    /// once the service has accepted it.
    pub async fn send_message(&self, outgoing: OutgoingMessage) -> Result<Message, SendError> {
        let (token, to) = {
            let state = self.shared.state.lock().await;
            let token = state.token().ok_or(SendError::NotAuthenticated)?;
            let to = state.store.active().cloned().ok_or(SendError::NoActiveConversation)?;
            (token, to)
        };
        let payload = outgoing.into_payload(self.shared.config.max_image_bytes)?;

        let message = self.shared.backend.post_message(&token, &to, &payload).await?;
        info!("sent {} to u/{to}", message.id);

        let mut state = self.shared.state.lock().await;
        if let Some(local) = state.local_id().cloned().filter(|_| state.holds(&token)) {
            if state.store.append_confirmed(&local, &message) {
                self.shared.emit(ChatEvent::MessageAppended(message.clone()));
            }
        }
        Ok(message)
    }
}

impl Shared {
    pub(crate) fn receive_message(&self, state: &mut ChatState, message: Message) {
        let Some(local) = state.local_id().cloned() else {
            return;
        };
        match state.store.route_incoming(&local, message) {
            Routed::Appended(message) => self.emit(ChatEvent::MessageAppended(message)),
            Routed::Unseen { user_id, count } => self.emit(ChatEvent::UnseenChanged { user_id, count }),
            Routed::Duplicate => {}
            Routed::Foreign => warn!("dropping pushed message not addressed to u/{local}"),
        }
    }
}
