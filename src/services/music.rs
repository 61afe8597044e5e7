use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bridge::Service;
use crate::error::BridgeError;
use crate::ports::discord::Messenger;
use crate::ports::spotify::{AddTracksOutcome, PlaylistAdder, SpotifyApi, SpotifyApiFactory};
use crate::services::spotify_auth::AuthCoordinator;
use crate::services::token_store::TokenStore;
use crate::spotify_rs::types::Token;
use crate::track::{filter_tracks, to_track_ids};

/// Where to post the authorization URL besides stdout.
pub struct AuthNotifier {
    pub messenger: Arc<dyn Messenger>,
    pub channel_id: String,
}

/// A token together with the API client bound to it.
#[derive(Clone)]
struct Session {
    token: Token,
    api: Arc<dyn SpotifyApi>,
}

/// Spotify client that keeps its token fresh and persisted.
pub struct MusicClient {
    auth: Arc<AuthCoordinator>,
    store: Arc<dyn TokenStore>,
    api_factory: SpotifyApiFactory,
    session: RwLock<Option<Session>>,
    notifier: Option<AuthNotifier>,
    verbose: bool,
}

impl MusicClient {
    pub fn new(
        auth: Arc<AuthCoordinator>,
        store: Arc<dyn TokenStore>,
        api_factory: SpotifyApiFactory,
    ) -> Self {
        Self {
            auth,
            store,
            api_factory,
            session: RwLock::new(None),
            notifier: None,
            verbose: false,
        }
    }

    pub fn with_notifier(mut self, notifier: AuthNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn connect(&self, token: Token) -> Session {
        Session {
            api: (self.api_factory)(&token),
            token,
        }
    }

    /// Asks the operator to authorize in the browser and waits for the callback.
    async fn authenticate_interactively(&self) -> Result<Token, BridgeError> {
        let url = self.auth.auth_url();
        println!("Please log in to Spotify by visiting the following page in your browser: {url}");

        if let Some(notifier) = &self.notifier {
            let content = format!("Please log in to Spotify: {url}");
            if let Err(err) = notifier.messenger.send(&notifier.channel_id, &content).await {
                tracing::warn!(
                    channel_id = %notifier.channel_id,
                    error = ?err,
                    "Failed to post auth URL to Discord"
                );
            }
        }

        let token = self.auth.authenticate().await?;
        self.store.save(&token).await?;
        Ok(token)
    }

    /// Refreshes the session's token, persists it and rebinds the API client.
    ///
    /// On failure the session is cleared so the next operation starts over from the store.
    async fn refresh(&self, session: &Session) -> Result<Session, BridgeError> {
        tracing::info!(expiry = %session.token.expiry, "Refreshing Spotify token");

        let token = match self.auth.refresh(&session.token).await {
            Ok(token) => token,
            Err(err) => {
                *self.session.write().await = None;
                return Err(err);
            }
        };

        if let Err(err) = self.store.save(&token).await {
            tracing::warn!(error = %err, "Failed to save refreshed Spotify token");
        }

        let session = self.connect(token);
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Current session, loading it from the store when none is held.
    async fn session(&self) -> Result<Session, BridgeError> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }

        let token = self
            .store
            .load()
            .await?
            .ok_or(BridgeError::NotAuthenticated)?;
        let session = self.connect(token);
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn log_playlist(&self, api: &dyn SpotifyApi, playlist_id: &str) {
        match api.playlist(playlist_id).await {
            Ok(playlist) => tracing::info!(
                playlist_id,
                name = %playlist.name,
                owner = %playlist.owner.id,
                total = playlist.tracks.total,
                "Target playlist"
            ),
            Err(reason) => {
                let err = BridgeError::PlaylistAccess {
                    playlist_id: playlist_id.to_string(),
                    reason,
                };
                tracing::warn!(error = %err, "Failed to get playlist info");
            }
        }
    }
}

#[async_trait::async_trait]
impl PlaylistAdder for MusicClient {
    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_urls: &[String],
    ) -> Result<AddTracksOutcome, BridgeError> {
        let mut session = self.session().await?;
        if !session.token.is_valid() {
            session = self.refresh(&session).await?;
        }

        let user = session
            .api
            .current_user()
            .await
            .map_err(BridgeError::AuthFailed)?;
        tracing::debug!(user_id = %user.id, "Spotify session is authenticated");

        if self.verbose {
            self.log_playlist(session.api.as_ref(), playlist_id).await;
        }

        let track_ids = to_track_ids(track_urls);
        if track_ids.is_empty() {
            return Ok(AddTracksOutcome::NoTracks);
        }

        let page = session
            .api
            .playlist_items(playlist_id)
            .await
            .map_err(|reason| BridgeError::PlaylistAccess {
                playlist_id: playlist_id.to_string(),
                reason,
            })?;

        let track_ids = filter_tracks(Some(&page), track_ids);
        if self.verbose {
            tracing::info!(track_ids = ?track_ids, "Tracks not yet in playlist");
        }
        if track_ids.is_empty() {
            return Ok(AddTracksOutcome::NothingNew);
        }

        let snapshot_id = session
            .api
            .add_tracks_to_playlist(playlist_id, &track_ids)
            .await
            .map_err(|reason| BridgeError::PlaylistMutation {
                playlist_id: playlist_id.to_string(),
                reason,
            })?;

        Ok(AddTracksOutcome::Added {
            snapshot_id,
            track_ids,
        })
    }
}

#[async_trait::async_trait]
impl Service for MusicClient {
    fn name(&self) -> &'static str {
        "Spotify Client"
    }

    /// Restores the saved token, refreshing or re-authorizing as needed, then
    /// probes the account.
    async fn start(&self) -> Result<(), BridgeError> {
        let session = match self.store.load().await? {
            Some(token) if token.is_valid() => self.connect(token),
            Some(token) if token.can_refresh() => {
                let stale = self.connect(token);
                match self.refresh(&stale).await {
                    Ok(session) => session,
                    Err(err) => {
                        tracing::warn!(error = %err, "Saved token could not be refreshed");
                        self.connect(self.authenticate_interactively().await?)
                    }
                }
            }
            _ => self.connect(self.authenticate_interactively().await?),
        };

        let user = session
            .api
            .current_user()
            .await
            .map_err(BridgeError::AuthFailed)?;
        tracing::info!(
            user_id = %user.id,
            display_name = user.display_name.as_deref().unwrap_or_default(),
            scope = session.token.scope().unwrap_or_default(),
            "Logged in to Spotify"
        );

        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        *self.session.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use color_eyre::eyre::eyre;

    use crate::ports::discord::MockMessenger;
    use crate::ports::spotify::{MockOAuthProvider, MockSpotifyApi, OAuthProvider};
    use crate::services::token_store::MockTokenStore;
    use crate::spotify_rs::types::{
        PlaylistItem, PlaylistItemPage, PlaylistTrack, SpotifyUser,
    };

    fn token(access_token: &str, expires_in: i64) -> Token {
        Token {
            access_token: access_token.into(),
            token_type: "Bearer".into(),
            refresh_token: "refresh".into(),
            expiry: Utc::now() + chrono::Duration::seconds(expires_in),
            extra: serde_json::Map::new(),
        }
    }

    fn user() -> SpotifyUser {
        SpotifyUser {
            id: "owner".into(),
            display_name: Some("Owner".into()),
        }
    }

    fn page(ids: &[&str]) -> PlaylistItemPage {
        PlaylistItemPage {
            items: ids
                .iter()
                .map(|id| PlaylistItem {
                    track: Some(PlaylistTrack {
                        id: Some(id.to_string()),
                        name: None,
                    }),
                })
                .collect(),
            total: ids.len() as i32,
            next: None,
        }
    }

    fn coordinator(provider: MockOAuthProvider) -> Arc<AuthCoordinator> {
        Arc::new(
            AuthCoordinator::new(Arc::new(provider) as Arc<dyn OAuthProvider>)
                .with_timeout(Duration::from_millis(20)),
        )
    }

    /// Factory that hands out `api` and records the access token it was bound to.
    fn factory(api: MockSpotifyApi, seen: Arc<Mutex<Vec<String>>>) -> SpotifyApiFactory {
        let api: Arc<dyn SpotifyApi> = Arc::new(api);
        Arc::new(move |token: &Token| {
            seen.lock().unwrap().push(token.access_token.clone());
            api.clone()
        })
    }

    fn store_with(saved: Option<Token>) -> MockTokenStore {
        let mut store = MockTokenStore::new();
        store
            .expect_load()
            .returning(move || Ok(saved.clone()));
        store
    }

    fn urls(ids: &[&str]) -> Vec<String> {
        ids.iter()
            .map(|id| format!("https://open.spotify.com/track/{id}"))
            .collect()
    }

    #[tokio::test]
    async fn test_adds_only_missing_tracks() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_playlist_items()
            .withf(|playlist_id| playlist_id == "P")
            .returning(|_| Ok(page(&["bbb"])));
        api.expect_add_tracks_to_playlist()
            .withf(|playlist_id, ids| playlist_id == "P" && ids == ["aaa".to_string()])
            .times(1)
            .returning(|_, _| Ok("snap".into()));

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        let outcome = client
            .add_tracks_to_playlist("P", &urls(&["aaa", "bbb"]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AddTracksOutcome::Added {
                snapshot_id: "snap".into(),
                track_ids: vec!["aaa".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_all_present_adds_nothing() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_playlist_items()
            .returning(|_| Ok(page(&["aaa"])));
        api.expect_add_tracks_to_playlist().times(0);

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        let outcome = client
            .add_tracks_to_playlist("P", &urls(&["aaa"]))
            .await
            .unwrap();
        assert_eq!(outcome, AddTracksOutcome::NothingNew);
    }

    #[tokio::test]
    async fn test_refreshes_stale_token() {
        let mut provider = MockOAuthProvider::new();
        provider
            .expect_refresh()
            .withf(|token| token.access_token == "stale")
            .times(1)
            .returning(|_| Ok(token("fresh", 3600)));

        let mut store = store_with(Some(token("stale", -60)));
        store
            .expect_save()
            .withf(|token| token.access_token == "fresh")
            .times(1)
            .returning(|_| Ok(()));

        let mut api = MockSpotifyApi::new();
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_playlist_items()
            .returning(|_| Ok(PlaylistItemPage::default()));
        api.expect_add_tracks_to_playlist()
            .times(1)
            .returning(|_, _| Ok("snap".into()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let client = MusicClient::new(
            coordinator(provider),
            Arc::new(store),
            factory(api, seen.clone()),
        );

        client
            .add_tracks_to_playlist("P", &urls(&["aaa"]))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["stale", "fresh"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let mut provider = MockOAuthProvider::new();
        provider
            .expect_refresh()
            .times(2)
            .returning(|_| Err(eyre!("invalid_grant")));

        let mut api = MockSpotifyApi::new();
        api.expect_current_user().times(0);

        let client = MusicClient::new(
            coordinator(provider),
            Arc::new(store_with(Some(token("stale", -60)))),
            factory(api, Arc::default()),
        );

        for _ in 0..2 {
            let err = client
                .add_tracks_to_playlist("P", &urls(&["aaa"]))
                .await
                .unwrap_err();
            assert!(matches!(err, BridgeError::RefreshFailed(_)));
        }
        assert!(client.session.read().await.is_none());
    }

    #[tokio::test]
    async fn test_without_token_is_not_authenticated() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().times(0);

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(None)),
            factory(api, Arc::default()),
        );

        let err = client
            .add_tracks_to_playlist("P", &urls(&["aaa"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_failed_probe_is_auth_failure() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user()
            .returning(|| Err(eyre!("401 Unauthorized")));
        api.expect_playlist_items().times(0);

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        let err = client
            .add_tracks_to_playlist("P", &urls(&["aaa"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_playlist_errors_are_wrapped() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_playlist_items()
            .returning(|_| Err(eyre!("404 Not Found")));

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        let err = client
            .add_tracks_to_playlist("P", &urls(&["aaa"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::PlaylistAccess { ref playlist_id, .. } if playlist_id == "P"));
    }

    #[tokio::test]
    async fn test_non_track_urls_add_nothing() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().returning(|| Ok(user()));
        api.expect_playlist_items().times(0);
        api.expect_add_tracks_to_playlist().times(0);

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        let outcome = client
            .add_tracks_to_playlist("P", &["https://example.com/song".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome, AddTracksOutcome::NoTracks);
    }

    #[tokio::test]
    async fn test_start_with_saved_token() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user().times(1).returning(|| Ok(user()));

        let client = MusicClient::new(
            coordinator(MockOAuthProvider::new()),
            Arc::new(store_with(Some(token("access", 3600)))),
            factory(api, Arc::default()),
        );

        client.start().await.unwrap();
        assert!(client.session.read().await.is_some());
    }

    #[tokio::test]
    async fn test_start_without_token_posts_url_and_times_out() {
        let mut provider = MockOAuthProvider::new();
        provider
            .expect_authorize_url()
            .returning(|state| format!("https://accounts.spotify.com/authorize?state={state}"));

        let mut messenger = MockMessenger::new();
        messenger
            .expect_send()
            .withf(|channel_id, content| {
                channel_id == "auth" && content.contains("state=discord-bot-state")
            })
            .times(1)
            .returning(|_, _| Err(eyre!("missing access")));

        let client = MusicClient::new(
            coordinator(provider),
            Arc::new(store_with(None)),
            factory(MockSpotifyApi::new(), Arc::default()),
        )
        .with_notifier(AuthNotifier {
            messenger: Arc::new(messenger),
            channel_id: "auth".into(),
        });

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthTimeout(_)));
    }
}
