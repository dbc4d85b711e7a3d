use tracing::info;

use crate::{
    client::{ChatClient, ChatEvent},
    error::ProfileError,
    image::InlineImage,
    model::{ProfilePatch, User},
};

/// Profile edits. Only the fields that are `Some` change.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    /// Raw image file bytes; encoded inline before upload.
    pub avatar: Option<Vec<u8>>,
}

impl ProfileUpdate {
    pub(crate) fn into_patch(self, max_image_bytes: usize) -> Result<ProfilePatch, ProfileError> {
        let full_name = match self.full_name {
            Some(name) if name.trim().is_empty() => return Err(ProfileError::EmptyName),
            Some(name) => Some(name.trim().to_owned()),
            None => None,
        };
        let profile_pic = match self.avatar {
            Some(bytes) => Some(InlineImage::from_bytes(bytes, max_image_bytes)?.to_data_url()),
            None => None,
        };

        let patch = ProfilePatch {
            full_name,
            bio: self.bio,
            profile_pic,
        };
        if patch == ProfilePatch::default() {
            return Err(ProfileError::NothingToUpdate);
        }
        Ok(patch)
    }
}

impl ChatClient {
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ProfileError> {
        let token = self
            .shared
            .state
            .lock()
            .await
            .token()
            .ok_or(ProfileError::NotAuthenticated)?;
        let patch = update.into_patch(self.shared.config.max_image_bytes)?;

        let confirmed = self.shared.backend.update_profile(&token, &patch).await?;

        let mut state = self.shared.state.lock().await;
        let Some(session) = state.session.as_mut().filter(|session| session.token == token) else {
            return Err(ProfileError::NotAuthenticated);
        };
        session.user.merge_profile(&patch, confirmed);
        let user = session.user.clone();

        info!("profile updated for u/{}", user.id);
        self.shared.emit(ChatEvent::ProfileUpdated(user.clone()));
        Ok(user)
    }

    /// Replaces the local copy with what the service has on record.
    pub async fn refresh_profile(&self) -> Result<User, ProfileError> {
        let token = self
            .shared
            .state
            .lock()
            .await
            .token()
            .ok_or(ProfileError::NotAuthenticated)?;

        let user = self.shared.backend.fetch_profile(&token).await?;

        let mut state = self.shared.state.lock().await;
        let Some(session) = state.session.as_mut().filter(|session| session.token == token) else {
            return Err(ProfileError::NotAuthenticated);
        };
        session.user = user.clone();
        self.shared.emit(ChatEvent::ProfileUpdated(user.clone()));
        Ok(user)
    }
}
