use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use color_eyre::eyre::{Context, Result};

use crate::config::{CredentialArgs, DiscordConfig, SpotifyConfig};
use crate::discord::actions::{ActionDeps, ChannelActions};
use crate::discord::channel::ChannelType;
use crate::discord::client::{DiscordMessenger, GatewayClient};
use crate::discord::interactions::InteractionDispatcher;
use crate::discord::message::MessageDispatcher;
use crate::error::BridgeError;
use crate::http_server::app::HttpServer;
use crate::http_server::debug::DebugService;
use crate::ports::discord::Messenger;
use crate::ports::spotify::{PlaylistAdder, SpotifyApi, SpotifyApiFactory};
use crate::services::music::{AuthNotifier, MusicClient};
use crate::services::spotify_auth::{AuthCoordinator, CALLBACK_PATH};
use crate::services::token_store::FileTokenStore;
use crate::spotify_rs::auth::SpotifyOAuth;
use crate::spotify_rs::client::SpotifyClient;
use crate::spotify_rs::types::Token;

/// A long-lived component started and stopped by the bridge.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start(&self) -> Result<(), BridgeError>;
    async fn stop(&self) -> Result<(), BridgeError>;
}

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub port: u16,
    pub verbose_logs: bool,
    pub token_path: PathBuf,
    pub credentials: CredentialArgs,
}

/// Wires every component together and runs until Ctrl-C.
pub async fn run(options: BridgeOptions) -> Result<()> {
    let discord = DiscordConfig::from_args(&options.credentials)?;
    let spotify = SpotifyConfig::from_args(&options.credentials)?;

    let auth = Arc::new(AuthCoordinator::new(Arc::new(SpotifyOAuth::new(
        spotify.clone(),
    ))));
    let debug = Arc::new(DebugService::new(discord.app_id.clone()));

    let router = Router::new().merge(debug.routes()).merge(auth.routes());
    let server = HttpServer::start(options.port, router).await?;
    tracing::info!(
        addr = %server.local_addr(),
        callback = CALLBACK_PATH,
        "Listening for Spotify authorization callbacks"
    );

    let messenger: Arc<dyn Messenger> = Arc::new(DiscordMessenger::new(&discord.token));
    let api_factory: SpotifyApiFactory = Arc::new(|token: &Token| {
        Arc::new(SpotifyClient::new(token.access_token.clone())) as Arc<dyn SpotifyApi>
    });

    let store = FileTokenStore::new(options.token_path);
    tracing::info!(path = %store.path().display(), "Using Spotify token cache");

    let mut music =
        MusicClient::new(auth, Arc::new(store), api_factory).with_verbose(options.verbose_logs);
    if let Some(channel_id) = discord.channel_id(ChannelType::Auth) {
        music = music.with_notifier(AuthNotifier {
            messenger: messenger.clone(),
            channel_id: channel_id.to_string(),
        });
    }
    let music = Arc::new(music);

    let actions = ChannelActions::from_channels(&discord.channel_ids);
    if actions.is_empty() {
        tracing::warn!("No channels have actions, messages will be ignored");
    } else {
        tracing::info!(channels = actions.len(), "Channel actions registered");
    }
    let actions = Arc::new(actions);
    let messages = Arc::new(MessageDispatcher::new(
        actions,
        ActionDeps {
            messenger,
            playlist: Some(music.clone() as Arc<dyn PlaylistAdder>),
            playlist_id: spotify.playlist_id.clone(),
            reply_body: None,
        },
        options.verbose_logs,
    ));
    let interactions = Arc::new(InteractionDispatcher::new(discord.test_replies.clone()));
    let gateway = Arc::new(GatewayClient::new(
        discord.token.clone(),
        messages,
        interactions,
    ));

    let services: Vec<Arc<dyn Service>> = vec![debug, music, gateway];
    let result = run_services(&services, async {
        tokio::signal::ctrl_c()
            .await
            .wrap_err("Failed to listen for shutdown signal")
    })
    .await;

    server.stop().await?;
    result
}

/// Starts every service, waits for `shutdown`, then stops them in reverse.
/// A failed start has already stopped what was started, so nothing else is
/// stopped on that path.
async fn run_services<F>(services: &[Arc<dyn Service>], shutdown: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    start_all(services).await?;
    tracing::info!("Bridge is running, press Ctrl-C to stop");

    let result = shutdown.await;

    tracing::info!("Shutting down");
    stop_all(services).await;
    result
}

/// Starts services in order. On failure, the ones already started are stopped
/// in reverse before the error is returned.
async fn start_all(services: &[Arc<dyn Service>]) -> Result<(), BridgeError> {
    for (index, service) in services.iter().enumerate() {
        tracing::info!(service = service.name(), "Starting");
        if let Err(err) = service.start().await {
            tracing::error!(service = service.name(), error = %err, "Failed to start");
            stop_all(&services[..index]).await;
            return Err(err);
        }
    }
    Ok(())
}

/// Stops services in reverse order, logging failures.
async fn stop_all(services: &[Arc<dyn Service>]) {
    for service in services.iter().rev() {
        if let Err(err) = service.stop().await {
            tracing::error!(service = service.name(), error = %err, "Failed to stop");
        } else {
            tracing::info!(service = service.name(), "Stopped");
        }
    }
}
