use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tokio::sync::{Mutex, mpsc};

use crate::error::BridgeError;
use crate::ports::spotify::OAuthProvider;
use crate::spotify_rs::types::Token;

/// Fixed OAuth `state` value sent with every authorization request.
pub const OAUTH_STATE: &str = "discord-bot-state";
pub const CALLBACK_PATH: &str = "/spotify/callback";
/// How long `authenticate` waits for the user to finish in the browser.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const CALLBACK_SUCCESS: &str = "Spotify authentication successful! You can close this window.";

#[derive(Debug, serde::Deserialize)]
pub struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

/// Drives the authorization-code flow: hands out the consent URL, receives the
/// redirect and delivers the exchanged token to whoever is waiting in `authenticate`.
pub struct AuthCoordinator {
    provider: Arc<dyn OAuthProvider>,
    tokens_tx: mpsc::Sender<Token>,
    tokens_rx: Mutex<mpsc::Receiver<Token>>,
    timeout: Duration,
}

impl AuthCoordinator {
    pub fn new(provider: Arc<dyn OAuthProvider>) -> Self {
        let (tokens_tx, tokens_rx) = mpsc::channel(1);
        Self {
            provider,
            tokens_tx,
            tokens_rx: Mutex::new(tokens_rx),
            timeout: AUTH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn auth_url(&self) -> String {
        self.provider.authorize_url(OAUTH_STATE)
    }

    /// Router serving the OAuth redirect.
    pub fn routes(self: &Arc<Self>) -> Router {
        Router::new()
            .route(CALLBACK_PATH, get(callback))
            .with_state(self.clone())
    }

    /// Waits for the first successful callback.
    pub async fn authenticate(&self) -> Result<Token, BridgeError> {
        let mut tokens_rx = self.tokens_rx.lock().await;
        match tokio::time::timeout(self.timeout, tokens_rx.recv()).await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(BridgeError::AuthFailed(color_eyre::eyre::eyre!(
                "token channel closed"
            ))),
            Err(_) => Err(BridgeError::AuthTimeout(self.timeout)),
        }
    }

    pub async fn refresh(&self, token: &Token) -> Result<Token, BridgeError> {
        self.provider
            .refresh(token)
            .await
            .map_err(BridgeError::RefreshFailed)
    }

    async fn complete(&self, params: CallbackParams) -> (StatusCode, &'static str) {
        if params.state.as_deref() != Some(OAUTH_STATE) {
            tracing::error!(state = ?params.state, "OAuth state mismatch");
            return (StatusCode::FORBIDDEN, "State mismatch");
        }

        let code = match (params.code, params.error) {
            (Some(code), None) if !code.is_empty() => code,
            (_, error) => {
                tracing::error!(error = ?error, "Authorization callback without a code");
                return (StatusCode::FORBIDDEN, "Couldn't get token");
            }
        };

        let token = match self.provider.exchange_code(&code).await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to exchange authorization code");
                return (StatusCode::FORBIDDEN, "Couldn't get token");
            }
        };

        // Only the first token is wanted; later callbacks still get a success page
        if self.tokens_tx.try_send(token).is_err() {
            tracing::debug!("Token already delivered, dropping duplicate callback");
        }
        tracing::info!("Spotify authorization callback succeeded");
        (StatusCode::OK, CALLBACK_SUCCESS)
    }
}

async fn callback(
    State(coordinator): State<Arc<AuthCoordinator>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    coordinator.complete(params).await
}
