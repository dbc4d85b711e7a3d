pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod image;
pub mod model;
pub mod presence;
pub mod push;
pub mod session;

pub use api::{Backend, HttpBackend};
pub use client::{ChatClient, ChatEvent};
pub use config::{ChatConfig, ReconnectPolicy};
pub use conversation::{ConversationState, ConversationStore, OutgoingMessage, SelectOutcome};
pub use error::{ApiError, AuthError, ConfigError, FetchError, ProfileError, SendError, TransportError};
pub use image::{ImageError, InlineImage};
pub use model::{
    AuthGrant, AuthKind, AuthToken, ContactSnapshot, Credentials, Message, MessageBody, MessageId, MessagePayload,
    ProfilePatch, User, UserId,
};
pub use presence::{ChannelId, PresenceSet};
pub use push::{PushEvent, PushIdentity, PushStream, PushTransport, WsTransport};
pub use session::{ProfileUpdate, Session};
