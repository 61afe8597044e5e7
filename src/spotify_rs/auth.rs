use std::time::Duration;

use async_trait::async_trait;
use base64::{
    Engine, alphabet,
    engine::{self, general_purpose},
};
use chrono::Utc;

use crate::config::SpotifyConfig;
use crate::ports::spotify::OAuthProvider;
use crate::spotify_rs::types::{SpotifyTokenResponse, Token};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub const SPOTIFY_SCOPES: [&str; 2] = ["playlist-modify-public", "playlist-modify-private"];

const CUSTOM_ENGINE: engine::GeneralPurpose =
    engine::GeneralPurpose::new(&alphabet::STANDARD, general_purpose::PAD);

/// Build the URL the user has to open to grant the bot access.
pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    let scope = SPOTIFY_SCOPES.join(" ");

    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(&scope)
    )
}

fn basic_auth(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        CUSTOM_ENGINE.encode(format!("{}:{}", client_id, client_secret))
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeCodeForTokenError {
    #[error("Invalid code: {reason}")]
    InvalidCode { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    // Must match the redirect URI the authorization URL was built with
    redirect_uri: &str,
) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // x-www-form-urlencoded, as required by spotify
        .form(&params)
        .header("Authorization", basic_auth(client_id, client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(ExchangeCodeForTokenError::InvalidCode {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToParseResponse)
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("Invalid refresh token: {reason}")]
    InvalidRefreshToken { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, RefreshTokenError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        .form(&params)
        .header("Authorization", basic_auth(client_id, client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(RefreshTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(RefreshTokenError::InvalidRefreshToken {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(RefreshTokenError::FailedToParseResponse)
}

/// Authorization-code flow against accounts.spotify.com.
pub struct SpotifyOAuth {
    config: SpotifyConfig,
    http: reqwest::Client,
}

impl SpotifyOAuth {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OAuthProvider for SpotifyOAuth {
    fn authorize_url(&self, state: &str) -> String {
        authorize_url(&self.config.client_id, &self.config.redirect_uri, state)
    }

    async fn exchange_code(&self, code: &str) -> color_eyre::Result<Token> {
        let response = exchange_code_for_token(
            &self.http,
            &self.config.client_id,
            &self.config.client_secret,
            code,
            &self.config.redirect_uri,
        )
        .await?;
        Ok(Token::from_response(response, Utc::now()))
    }

    async fn refresh(&self, token: &Token) -> color_eyre::Result<Token> {
        let response = refresh_access_token(
            &self.http,
            &self.config.client_id,
            &self.config.client_secret,
            &token.refresh_token,
        )
        .await?;
        Ok(token.refreshed(response, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url() {
        let url = authorize_url(
            "test_client_id",
            "http://localhost:8080/spotify/callback",
            "discord-bot-state",
        );

        assert!(url.starts_with(SPOTIFY_AUTH_URL));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fspotify%2Fcallback"));
        assert!(url.contains("state=discord-bot-state"));
        assert!(url.contains("scope=playlist-modify-public%20playlist-modify-private"));
    }

    #[test]
    fn test_basic_auth_header() {
        // base64("id:secret")
        assert_eq!(basic_auth("id", "secret"), "Basic aWQ6c2VjcmV0");
    }
}
