use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::BridgeError;
use crate::spotify_rs::types::Token;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Persists the single Spotify token between runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Overwrites any previously saved token.
    async fn save(&self, token: &Token) -> Result<(), BridgeError>;
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<Token>, BridgeError>;
}

/// Token cache stored as JSON on the local filesystem.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create_parent_dir(&self) -> Result<(), BridgeError> {
        let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);

        builder
            .create(dir)
            .await
            .map_err(|err| BridgeError::token_io(dir, format!("failed to create directory: {err}")))
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, token: &Token) -> Result<(), BridgeError> {
        self.create_parent_dir().await?;

        let data = serde_json::to_vec(token)
            .map_err(|err| BridgeError::token_io(&self.path, format!("failed to encode: {err}")))?;

        tokio::fs::write(&self.path, data)
            .await
            .map_err(|err| BridgeError::token_io(&self.path, format!("failed to write: {err}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(FILE_MODE))
                .await
                .map_err(|err| {
                    BridgeError::token_io(&self.path, format!("failed to set permissions: {err}"))
                })?;
        }

        tracing::info!(path = %self.path.display(), "Saved Spotify token");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Token>, BridgeError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved Spotify token");
                return Ok(None);
            }
            Err(err) => {
                return Err(BridgeError::token_io(
                    &self.path,
                    format!("failed to read: {err}"),
                ));
            }
        };

        let token = serde_json::from_slice(&data)
            .map_err(|err| BridgeError::token_io(&self.path, format!("failed to decode: {err}")))?;
        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn token() -> Token {
        Token {
            access_token: "access".into(),
            token_type: "Bearer".into(),
            refresh_token: "refresh".into(),
            expiry: Utc::now() + Duration::hours(1),
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("spotify_token.json"));

        let token = token();
        store.save(&token).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("spotify_token.json"));

        store.save(&token()).await.unwrap();
        let mut newer = token();
        newer.access_token = "newer".into();
        store.save(&newer).await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap().access_token, "newer");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("missing.json"));

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify_token.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileTokenStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, BridgeError::TokenIo { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("spotify_token.json"));
        store.save(&token()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }
}
