use crate::{
    core::store::{RestStore, StoreError},
    models::user::LoginUser,
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

const AVATAR_BUCKET: &str = "profile-pictures";

/// What the credential check concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(crate::models::user::Session),
    PasswordChangeRequired { user_id: String },
    Rejected,
}

/// Credential RPCs and profile-picture storage. Verification itself happens
/// on the server.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn check_login(&self, username: &str, password: &str)
    -> Result<LoginOutcome, StoreError>;

    async fn change_password(&self, user_id: &str, new_password: &str) -> Result<(), StoreError>;

    /// Stores the image and returns its public URL.
    async fn upload_avatar(
        &self,
        user_id: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StoreError>;

    async fn set_profile_picture(&self, user_id: &str, url: &str) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct LoginParams<'a> {
    input_username: &'a str,
    input_password: &'a str,
}

#[derive(Serialize)]
struct PasswordParams<'a> {
    input_id: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct ProfilePicturePatch<'a> {
    profile_picture: &'a str,
}

/// Content type for an uploaded picture, by file extension.
pub fn image_content_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Extension used for the stored object; falls back to `png`.
pub fn avatar_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string())
}

#[async_trait]
impl AccountService for RestStore {
    async fn check_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, StoreError> {
        let url = self.endpoint().join("rest/v1/rpc/check_user_login")?;
        let request = self.client().post(url).json(&LoginParams {
            input_username: username,
            input_password: password,
        });
        let user = self
            .execute(request)
            .await?
            .json::<Option<LoginUser>>()
            .await?;

        let Some(user) = user else {
            return Ok(LoginOutcome::Rejected);
        };
        if user.needs_password_change {
            if let Some(user_id) = user.id.clone().filter(|id| !id.is_empty()) {
                return Ok(LoginOutcome::PasswordChangeRequired { user_id });
            }
        }
        Ok(user
            .into_session()
            .map(LoginOutcome::Authenticated)
            .unwrap_or(LoginOutcome::Rejected))
    }

    async fn change_password(&self, user_id: &str, new_password: &str) -> Result<(), StoreError> {
        let url = self.endpoint().join("rest/v1/rpc/update_user_password")?;
        let request = self.client().post(url).json(&PasswordParams {
            input_id: user_id,
            new_password,
        });
        self.execute(request).await?;
        tracing::info!("Password updated for user {}", user_id);
        Ok(())
    }

    async fn upload_avatar(
        &self,
        user_id: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StoreError> {
        let object = format!("{}/profile.{}", user_id, extension);
        let upload_url = self
            .endpoint()
            .join(&format!("storage/v1/object/{}/{}", AVATAR_BUCKET, object))?;
        let request = self
            .client()
            .post(upload_url)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, image_content_type(extension))
            .body(bytes);
        self.execute(request).await?;

        let public_url = self.endpoint().join(&format!(
            "storage/v1/object/public/{}/{}",
            AVATAR_BUCKET, object
        ))?;
        tracing::info!("Uploaded profile picture to {}", public_url);
        Ok(public_url.to_string())
    }

    async fn set_profile_picture(&self, user_id: &str, url: &str) -> Result<(), StoreError> {
        let mut endpoint = self.table("users")?;
        endpoint
            .query_pairs_mut()
            .append_pair("id", &format!("eq.{}", user_id));
        let request = self
            .client()
            .patch(endpoint)
            .json(&ProfilePicturePatch {
                profile_picture: url,
            });
        self.execute(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_defaults_to_png() {
        assert_eq!(avatar_extension(&PathBuf::from("me.JPG")), "jpg");
        assert_eq!(avatar_extension(&PathBuf::from("avatar")), "png");
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(image_content_type("jpeg"), "image/jpeg");
        assert_eq!(image_content_type("PNG"), "image/png");
        assert_eq!(image_content_type("bmp"), "application/octet-stream");
    }
}
