use std::path::PathBuf;
use std::time::Duration;

/// Failures surfaced by the bridge.
///
/// Startup variants (`Config`, `TokenIo`, `AuthTimeout`, `Gateway`) are fatal in
/// `main`; the rest are per-operation and get logged by whoever drives the event.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Config(Vec<String>),

    #[error("token file {path}: {reason}")]
    TokenIo { path: PathBuf, reason: String },

    #[error("timed out after {0:?} waiting for Spotify authorization")]
    AuthTimeout(Duration),

    #[error("spotify client is not authenticated")]
    NotAuthenticated,

    #[error("spotify authentication failed: {0}")]
    AuthFailed(color_eyre::Report),

    #[error("failed to refresh spotify token: {0}")]
    RefreshFailed(color_eyre::Report),

    #[error("cannot access playlist {playlist_id}: {reason}")]
    PlaylistAccess {
        playlist_id: String,
        reason: color_eyre::Report,
    },

    #[error("failed to add tracks to playlist {playlist_id}: {reason}")]
    PlaylistMutation {
        playlist_id: String,
        reason: color_eyre::Report,
    },

    #[error("discord gateway error: {0}")]
    Gateway(String),

    #[error("invalid message event: {0}")]
    InvalidEvent(&'static str),
}

impl BridgeError {
    pub fn token_io(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        BridgeError::TokenIo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
