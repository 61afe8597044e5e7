use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use serde::Serialize;

use crate::ports::spotify::SpotifyApi;
use crate::spotify_rs::types::{PlaylistItemPage, SnapshotResponse, SpotifyPlaylist, SpotifyUser};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Spotify accepts at most this many URIs per add request.
const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Spotify API client
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser> {
        let response = self
            .client
            .get(format!("{}/me", SPOTIFY_API_URL))
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Get playlist metadata. Does not include the tracks.
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist> {
        let response = self
            .client
            .get(format!("{}/playlists/{}", SPOTIFY_API_URL, playlist_id))
            .query(&[("fields", "id,name,description,snapshot_id,owner,tracks.total")])
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Get the first page of tracks in a playlist
    pub async fn get_playlist_items(&self, playlist_id: &str) -> Result<PlaylistItemPage> {
        let response = self
            .client
            .get(format!("{}/playlists/{}/tracks", SPOTIFY_API_URL, playlist_id))
            .query(&[("limit", "100")])
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Append tracks to a playlist, returning the snapshot ID of the last request
    pub async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<String> {
        #[derive(Serialize)]
        struct AddTracksRequest {
            uris: Vec<String>,
        }

        let mut snapshot_id = String::new();
        for chunk in track_ids.chunks(MAX_TRACKS_PER_REQUEST) {
            let body = AddTracksRequest {
                uris: chunk.iter().map(|id| track_uri(id)).collect(),
            };

            let response = self
                .client
                .post(format!("{}/playlists/{}/tracks", SPOTIFY_API_URL, playlist_id))
                .bearer_auth(&self.access_token)
                .json(&body)
                .timeout(Duration::from_secs(10))
                .send()
                .await?
                .error_for_status()?;

            let snapshot: SnapshotResponse = response.json().await?;
            snapshot_id = snapshot.snapshot_id;
        }

        Ok(snapshot_id)
    }
}

fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn current_user(&self) -> Result<SpotifyUser> {
        self.get_current_user().await
    }

    async fn playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist> {
        self.get_playlist(playlist_id).await
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<PlaylistItemPage> {
        self.get_playlist_items(playlist_id).await
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<String> {
        self.add_tracks(playlist_id, track_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_uri() {
        assert_eq!(track_uri("4uLU6hMCjMI75M1A2tKUQC"), "spotify:track:4uLU6hMCjMI75M1A2tKUQC");
    }
}
