use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::discord::channel::ChannelType;
use crate::error::BridgeError;

/// Environment variable names
pub mod env {
    pub const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
    pub const DISCORD_APP_ID: &str = "DISCORD_APP_ID";
    pub const DISCORD_AUTH_CHANNEL_ID: &str = "DISCORD_AUTH_CHANNEL_ID";
    pub const DISCORD_DEBUG_CHANNEL_ID: &str = "DISCORD_DEBUG_CHANNEL_ID";
    pub const DISCORD_SONGS_CHANNEL_ID: &str = "DISCORD_SONGS_CHANNEL_ID";
    pub const DISCORD_TEST_REPLIES: &str = "DISCORD_TEST_REPLIES";

    pub const SPOTIFY_APP_ID: &str = "SPOTIFY_APP_ID";
    pub const SPOTIFY_SECRET: &str = "SPOTIFY_SECRET";
    pub const SPOTIFY_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
    pub const SPOTIFY_PLAYLIST_ID: &str = "SPOTIFY_PLAYLIST_ID";
}

/// Credentials and channel settings, read from flags or the environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Discord bot token
    #[arg(long, env = env::DISCORD_TOKEN, hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Discord application ID, shown by the debug endpoint
    #[arg(long, env = env::DISCORD_APP_ID)]
    pub discord_app_id: Option<String>,

    /// Channel that receives Spotify authorization links
    #[arg(long, env = env::DISCORD_AUTH_CHANNEL_ID)]
    pub discord_auth_channel_id: Option<String>,

    /// Channel that echoes every message
    #[arg(long, env = env::DISCORD_DEBUG_CHANNEL_ID)]
    pub discord_debug_channel_id: Option<String>,

    /// Channel whose Spotify links are added to the playlist
    #[arg(long, env = env::DISCORD_SONGS_CHANNEL_ID)]
    pub discord_songs_channel_id: Option<String>,

    /// Canned `/test` replies as `user_id=reply,user_id=reply`
    #[arg(long, env = env::DISCORD_TEST_REPLIES)]
    pub discord_test_replies: Option<String>,

    /// Spotify application client ID
    #[arg(long, env = env::SPOTIFY_APP_ID)]
    pub spotify_app_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, env = env::SPOTIFY_SECRET, hide_env_values = true)]
    pub spotify_secret: Option<String>,

    /// Redirect URI registered with the Spotify application
    #[arg(long, env = env::SPOTIFY_REDIRECT_URI)]
    pub spotify_redirect_uri: Option<String>,

    /// Playlist that receives tracks
    #[arg(long, env = env::SPOTIFY_PLAYLIST_ID)]
    pub spotify_playlist_id: Option<String>,
}

impl CredentialArgs {
    /// Looks a setting up by its environment variable name.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            env::DISCORD_TOKEN => &self.discord_token,
            env::DISCORD_APP_ID => &self.discord_app_id,
            env::DISCORD_AUTH_CHANNEL_ID => &self.discord_auth_channel_id,
            env::DISCORD_DEBUG_CHANNEL_ID => &self.discord_debug_channel_id,
            env::DISCORD_SONGS_CHANNEL_ID => &self.discord_songs_channel_id,
            env::DISCORD_TEST_REPLIES => &self.discord_test_replies,
            env::SPOTIFY_APP_ID => &self.spotify_app_id,
            env::SPOTIFY_SECRET => &self.spotify_secret,
            env::SPOTIFY_REDIRECT_URI => &self.spotify_redirect_uri,
            env::SPOTIFY_PLAYLIST_ID => &self.spotify_playlist_id,
            _ => return None,
        };
        value.clone()
    }
}

/// Reads `VERBOSE_LOGS_ENABLED`. Unparseable values log a warning and count
/// as disabled.
pub fn parse_verbose_flag(raw: Option<&str>) -> bool {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return false;
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => true,
        "0" | "f" | "false" => false,
        _ => {
            tracing::warn!(value = raw, "Failed to parse verbose logs flag, leaving it off");
            false
        }
    }
}

/// Lookup that treats empty values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub app_id: Option<String>,
    pub channel_ids: BTreeMap<ChannelType, String>,
    /// Canned `/test` replies keyed by user ID
    pub test_replies: HashMap<String, String>,
}

impl DiscordConfig {
    pub fn from_args(args: &CredentialArgs) -> Result<Self, BridgeError> {
        Self::from_lookup(|key| args.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let token = non_empty(&lookup, env::DISCORD_TOKEN)
            .ok_or_else(|| BridgeError::Config(vec![env::DISCORD_TOKEN.to_string()]))?;

        let mut channel_ids = BTreeMap::new();
        for (channel_type, key) in [
            (ChannelType::Auth, env::DISCORD_AUTH_CHANNEL_ID),
            (ChannelType::Debug, env::DISCORD_DEBUG_CHANNEL_ID),
            (ChannelType::Songs, env::DISCORD_SONGS_CHANNEL_ID),
        ] {
            if let Some(channel_id) = non_empty(&lookup, key) {
                channel_ids.insert(channel_type, channel_id.trim().to_string());
            }
        }

        if !channel_ids.contains_key(&ChannelType::Auth) {
            tracing::warn!("Authentication channel ID is not set, auth URLs will only be printed");
        }

        Ok(Self {
            token,
            app_id: non_empty(&lookup, env::DISCORD_APP_ID),
            channel_ids,
            test_replies: non_empty(&lookup, env::DISCORD_TEST_REPLIES)
                .map(|raw| parse_test_replies(&raw))
                .unwrap_or_default(),
        })
    }

    pub fn channel_id(&self, channel_type: ChannelType) -> Option<&str> {
        self.channel_ids.get(&channel_type).map(String::as_str)
    }
}

/// Parses `user_id=reply,user_id=reply`. Malformed entries are skipped.
fn parse_test_replies(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (user_id, reply) = entry.split_once('=')?;
            let (user_id, reply) = (user_id.trim(), reply.trim());
            if user_id.is_empty() || reply.is_empty() {
                tracing::warn!(entry, "Ignoring malformed test reply entry");
                return None;
            }
            Some((user_id.to_string(), reply.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Only needed by the add-tracks action, which reports its absence itself
    pub playlist_id: Option<String>,
}

impl SpotifyConfig {
    pub fn from_args(args: &CredentialArgs) -> Result<Self, BridgeError> {
        Self::from_lookup(|key| args.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let client_id = non_empty(&lookup, env::SPOTIFY_APP_ID);
        let client_secret = non_empty(&lookup, env::SPOTIFY_SECRET);
        let redirect_uri = non_empty(&lookup, env::SPOTIFY_REDIRECT_URI);

        match (client_id, client_secret, redirect_uri) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Ok(Self {
                client_id,
                client_secret,
                redirect_uri,
                playlist_id: non_empty(&lookup, env::SPOTIFY_PLAYLIST_ID),
            }),
            (client_id, client_secret, redirect_uri) => {
                let missing = [
                    (client_id.is_none(), env::SPOTIFY_APP_ID),
                    (client_secret.is_none(), env::SPOTIFY_SECRET),
                    (redirect_uri.is_none(), env::SPOTIFY_REDIRECT_URI),
                ]
                .into_iter()
                .filter(|(is_missing, _)| *is_missing)
                .map(|(_, key)| key.to_string())
                .collect();
                Err(BridgeError::Config(missing))
            }
        }
    }
}

/// Default token cache location: `~/.discordbot/spotify_token.json`
pub fn default_token_path() -> Result<PathBuf, BridgeError> {
    dirs::home_dir()
        .map(|home| home.join(".discordbot").join("spotify_token.json"))
        .ok_or_else(|| BridgeError::token_io("~/.discordbot", "failed to get home directory"))
}
