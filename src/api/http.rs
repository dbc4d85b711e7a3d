use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::ApiError,
    model::{AuthGrant, AuthKind, AuthToken, ContactSnapshot, Credentials, Message, MessagePayload, ProfilePatch, User, UserId},
};

use super::Backend;

trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, ApiError>;
    fn take_field<T: DeserializeOwned>(&mut self, field: &str) -> Result<T, ApiError>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> Result<String, ApiError> {
        Ok(
            self.get(field)
            .ok_or_else(|| ApiError::Malformed(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| ApiError::Malformed(format!("expected {field} in {self} to be string")))?
            .to_owned()
        )
    }

    fn take_field<T: DeserializeOwned>(&mut self, field: &str) -> Result<T, ApiError> {
        let value = self
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| ApiError::Malformed(format!("expected {field} in response")))?;
        Ok(serde_json::from_value(value)?)
    }
}

/// `Backend` over the service's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder, token: &AuthToken) -> RequestBuilder {
        request.bearer_auth(token.secret())
    }

    async fn body(response: Response) -> Result<Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get_str_field("message").ok())
            .unwrap_or(text);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn authenticate(&self, kind: AuthKind, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        debug!("POST /auth/{kind} for {}", credentials.email);
        let response = self
            .http
            .post(self.url(&format!("/auth/{}", kind.path())))
            .json(credentials)
            .send()
            .await?;
        let mut body = Self::body(response).await?;

        let token = AuthToken::new(body.get_str_field("token")?);
        let user = body.take_field("user")?;
        Ok(AuthGrant { user, token })
    }

    async fn fetch_profile(&self, token: &AuthToken) -> Result<User, ApiError> {
        let response = self
            .authed(self.http.get(self.url("/profile")), token)
            .send()
            .await?;
        Self::body(response).await?.take_field("user")
    }

    async fn update_profile(&self, token: &AuthToken, patch: &ProfilePatch) -> Result<User, ApiError> {
        let response = self
            .authed(self.http.put(self.url("/profile")), token)
            .json(patch)
            .send()
            .await?;
        Self::body(response).await?.take_field("user")
    }

    async fn fetch_contacts(&self, token: &AuthToken) -> Result<ContactSnapshot, ApiError> {
        let response = self
            .authed(self.http.get(self.url("/users")), token)
            .send()
            .await?;
        Ok(serde_json::from_value(Self::body(response).await?)?)
    }

    async fn fetch_history(&self, token: &AuthToken, with: &UserId) -> Result<Vec<Message>, ApiError> {
        let response = self
            .authed(self.http.get(self.url(&format!("/messages/{with}"))), token)
            .send()
            .await?;
        Self::body(response).await?.take_field("messages")
    }

    async fn post_message(
        &self,
        token: &AuthToken,
        to: &UserId,
        payload: &MessagePayload,
    ) -> Result<Message, ApiError> {
        let response = self
            .authed(self.http.post(self.url(&format!("/messages/{to}"))), token)
            .json(payload)
            .send()
            .await?;
        Self::body(response).await?.take_field("message")
    }
}
