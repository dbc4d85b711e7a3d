use thiserror::Error;

use crate::image::ImageError;

/// Failures talking to the backing HTTP service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("account already exists: {0}")]
    DuplicateAccount(String),
    #[error("a session is already live")]
    AlreadyAuthenticated,
    #[error(transparent)]
    Transport(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status: 400 | 401 | 403, message } => {
                AuthError::InvalidCredentials(message)
            }
            ApiError::Status { status: 409, message } => AuthError::DuplicateAccount(message),
            err => AuthError::Transport(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("name must not be blank")]
    EmptyName,
    #[error("nothing to update")]
    NothingToUpdate,
    #[error("avatar: {0}")]
    Image(#[from] ImageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("no conversation is open")]
    NoActiveConversation,
    #[error("message needs text or an image")]
    EmptyMessage,
    #[error("image: {0}")]
    Image(#[from] ImageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Contact list and history fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("gave up after {attempts} attempts")]
    Abandoned { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}
