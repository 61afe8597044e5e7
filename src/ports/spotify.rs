use std::sync::Arc;

use color_eyre::eyre::Result;

use crate::error::BridgeError;
use crate::spotify_rs::types::{PlaylistItemPage, SpotifyPlaylist, SpotifyUser, Token};

/// Port trait wrapping the Spotify Web API calls the bridge makes with an authorized token.
///
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn current_user(&self) -> Result<SpotifyUser>;
    async fn playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist>;
    /// First page of the playlist's items only.
    async fn playlist_items(&self, playlist_id: &str) -> Result<PlaylistItemPage>;
    /// Appends the tracks in order and returns the new snapshot ID.
    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String])
    -> Result<String>;
}

/// Builds an API client bound to a token. Called again after every refresh.
pub type SpotifyApiFactory = Arc<dyn Fn(&Token) -> Arc<dyn SpotifyApi> + Send + Sync>;

/// Port trait for the OAuth2 authorization server.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<Token>;
    async fn refresh(&self, token: &Token) -> Result<Token>;
}

/// Outcome of a successful add request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTracksOutcome {
    /// The message text held no track links.
    NoTracks,
    /// Every track is already in the playlist.
    NothingNew,
    Added {
        snapshot_id: String,
        track_ids: Vec<String>,
    },
}

/// What the message actions need from the music client.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistAdder: Send + Sync {
    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_urls: &[String],
    ) -> std::result::Result<AddTracksOutcome, BridgeError>;
}
