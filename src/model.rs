use std::{collections::HashMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use time::{macros::format_description, OffsetDateTime};

use crate::image::{ImageError, InlineImage};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer token handed out by the backing service at login.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(
        rename = "profilePic",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub bio: Option<String>,
}

impl User {
    /// Folds a confirmed profile into this copy. Fields the patch did not
    /// touch keep their local value when the service leaves them out.
    pub(crate) fn merge_profile(&mut self, patch: &ProfilePatch, confirmed: User) {
        let User { id, full_name, avatar, bio } = confirmed;
        self.id = id;
        self.full_name = full_name;
        if let Some(avatar) = avatar.or_else(|| patch.profile_pic.clone()) {
            self.avatar = Some(avatar);
        }
        if let Some(bio) = bio.or_else(|| patch.bio.clone()) {
            self.bio = Some(bio);
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(rename = "senderId")]
    pub sender: UserId,
    #[serde(rename = "receiverId")]
    pub recipient: UserId,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What a message shows. The image wins when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody<'a> {
    Image(&'a str),
    Text(&'a str),
    Empty,
}

impl Message {
    /// The other participant, seen from `local`. `None` when the message
    /// does not involve `local` at all.
    pub fn counterpart(&self, local: &UserId) -> Option<&UserId> {
        if &self.sender == local {
            Some(&self.recipient)
        } else if &self.recipient == local {
            Some(&self.sender)
        } else {
            None
        }
    }

    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender == user
    }

    pub fn body(&self) -> MessageBody<'_> {
        match (&self.image, &self.text) {
            (Some(image), _) => MessageBody::Image(image),
            (None, Some(text)) => MessageBody::Text(text),
            (None, None) => MessageBody::Empty,
        }
    }

    pub fn image_bytes(&self) -> Option<Result<InlineImage, ImageError>> {
        self.image.as_deref().map(InlineImage::from_data_url)
    }

    /// `HH:MM` in the offset the timestamp was recorded with.
    pub fn time_label(&self) -> String {
        self.created_at
            .format(format_description!("[hour]:[minute]"))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Signup,
    Login,
}

impl AuthKind {
    pub fn path(&self) -> &'static str {
        use AuthKind::*;
        match self {
            Signup => "signup",
            Login => "login",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl Credentials {
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            full_name: None,
            email: email.into(),
            password: password.into(),
            bio: None,
        }
    }

    pub fn signup(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        bio: Option<String>,
    ) -> Self {
        Self {
            full_name: Some(full_name.into()),
            email: email.into(),
            password: password.into(),
            bio,
        }
    }

    pub(crate) fn check(&self, kind: AuthKind) -> Result<(), &'static str> {
        if self.email.trim().is_empty() {
            return Err("email is required");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        if kind == AuthKind::Signup
            && self.full_name.as_deref().is_none_or(|name| name.trim().is_empty())
        {
            return Err("full name is required to sign up");
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("password", &"..")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    pub user: User,
    pub token: AuthToken,
}

/// `GET /users`: contacts plus the unseen counters in one response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactSnapshot {
    pub users: Vec<User>,
    #[serde(rename = "unseenMessages", default)]
    pub unseen: HashMap<UserId, u32>,
}

/// Body of `POST /messages/{userId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of `PUT /profile`. Only the named fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}
