mod ws;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use ws::WsTransport;

use crate::{
    error::TransportError,
    model::{AuthToken, Message, UserId},
};

/// What the push connection delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    PresenceSnapshot {
        #[serde(rename = "userIds")]
        user_ids: Vec<UserId>,
    },
    NewMessage { message: Message },
}

/// Who the push connection authenticates as.
#[derive(Debug, Clone)]
pub struct PushIdentity {
    pub user_id: UserId,
    pub token: AuthToken,
}

/// Ends when the connection closes; an `Err` item means it broke.
pub type PushStream = BoxStream<'static, Result<PushEvent, TransportError>>;

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, identity: &PushIdentity) -> Result<PushStream, TransportError>;
}
