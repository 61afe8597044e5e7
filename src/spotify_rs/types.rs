use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_DELTA_SECS: i64 = 10;

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth2 credential as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Build a token from a fresh code exchange.
    pub fn from_response(response: SpotifyTokenResponse, now: DateTime<Utc>) -> Self {
        let mut extra = serde_json::Map::new();
        if let Some(scope) = response.scope {
            extra.insert("scope".to_string(), serde_json::Value::String(scope));
        }

        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token.unwrap_or_default(),
            expiry: now + Duration::seconds(response.expires_in as i64),
            extra,
        }
    }

    /// Build the successor of `self` from a refresh response.
    ///
    /// Spotify may omit the refresh token on refresh, in which case the old one stays usable.
    pub fn refreshed(&self, response: SpotifyTokenResponse, now: DateTime<Utc>) -> Self {
        let mut token = Token::from_response(response, now);
        if token.refresh_token.is_empty() {
            token.refresh_token = self.refresh_token.clone();
        }
        if !token.extra.contains_key("scope") {
            if let Some(scope) = self.extra.get("scope") {
                token.extra.insert("scope".to_string(), scope.clone());
            }
        }
        token
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expiry - Duration::seconds(EXPIRY_DELTA_SECS) > now
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    pub fn scope(&self) -> Option<&str> {
        self.extra.get("scope").and_then(|scope| scope.as_str())
    }
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Spotify playlist metadata (tracks are fetched separately)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub snapshot_id: String,
    pub owner: SpotifyUser,
    pub tracks: SpotifyPlaylistTracks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTracks {
    pub total: i32,
}

/// One page of `GET /playlists/{id}/tracks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItemPage {
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub total: i32,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Null for removed or unavailable tracks.
    pub track: Option<PlaylistTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTrack {
    /// Null for local files.
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl PlaylistItem {
    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().and_then(|track| track.id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}
