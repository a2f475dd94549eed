use crate::models::user::Session;
use eyre::{Context, eyre};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const SESSION_FILE_NAME: &str = "session.json";

/// Owns the locally persisted session. Nothing else reads or writes the file.
#[derive(Clone, Debug)]
pub struct IdentityHolder {
    path: PathBuf,
}

impl IdentityHolder {
    pub fn new() -> Result<Self, eyre::Report> {
        let data_path = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not find a config directory"))?
            .join(env!("CARGO_PKG_NAME"));
        Ok(Self::with_path(data_path.join(SESSION_FILE_NAME)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session, or `None` when nobody is signed in.
    pub async fn load(&self) -> Result<Option<Session>, eyre::Report> {
        let Ok(mut file) = tokio::fs::File::open(&self.path).await else {
            tracing::info!("No stored session at {:?}", self.path);
            return Ok(None);
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .await
            .context("Could not read session file")?;
        let session: Session =
            serde_json::from_slice(&buffer).context("Could not parse session file")?;
        tracing::info!("Restored session for user {}", session.id);
        Ok(Some(session))
    }

    pub async fn store(&self, session: &Session) -> Result<(), eyre::Report> {
        let bytes = serde_json::to_vec_pretty(session).context("Failed to serialize session")?;
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create session directory")?;
            }
        }
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .context("Failed to create session file")?;
        file.write_all(&bytes)
            .await
            .context("Failed to write session file")?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), eyre::Report> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn scratch_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir()
            .join(format!("hrooms-{}-{}-{}", tag, std::process::id(), nanos))
            .join(SESSION_FILE_NAME)
    }

    #[tokio::test]
    async fn store_load_clear() {
        let holder = IdentityHolder::with_path(scratch_path("roundtrip"));
        assert!(holder.load().await.unwrap().is_none());

        let session = Session {
            id: "u1".to_string(),
            name: Some("Amiya".to_string()),
            role: Role::Dm,
            profile_picture: None,
        };
        holder.store(&session).await.unwrap();
        assert_eq!(holder.load().await.unwrap(), Some(session));

        holder.clear().await.unwrap();
        holder.clear().await.unwrap();
        assert!(holder.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let holder = IdentityHolder::with_path(scratch_path("corrupt"));
        let parent = holder.path().parent().unwrap().to_path_buf();
        tokio::fs::create_dir_all(&parent).await.unwrap();
        tokio::fs::write(holder.path(), b"not json").await.unwrap();
        assert!(holder.load().await.is_err());
    }
}
