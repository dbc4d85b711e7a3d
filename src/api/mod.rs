mod http;

use async_trait::async_trait;

pub use http::HttpBackend;

use crate::{
    error::ApiError,
    model::{AuthGrant, AuthKind, AuthToken, ContactSnapshot, Credentials, Message, MessagePayload, ProfilePatch, User, UserId},
};

/// The backing service that stores users, messages and profiles.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn authenticate(&self, kind: AuthKind, credentials: &Credentials) -> Result<AuthGrant, ApiError>;

    async fn fetch_profile(&self, token: &AuthToken) -> Result<User, ApiError>;

    async fn update_profile(&self, token: &AuthToken, patch: &ProfilePatch) -> Result<User, ApiError>;

    async fn fetch_contacts(&self, token: &AuthToken) -> Result<ContactSnapshot, ApiError>;

    async fn fetch_history(&self, token: &AuthToken, with: &UserId) -> Result<Vec<Message>, ApiError>;

    async fn post_message(
        &self,
        token: &AuthToken,
        to: &UserId,
        payload: &MessagePayload,
    ) -> Result<Message, ApiError>;
}
