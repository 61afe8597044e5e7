use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use color_eyre::eyre::{OptionExt, Result};
use tracing::Instrument;

use crate::config::env;
use crate::discord::channel::ChannelType;
use crate::discord::message::MessageEvent;
use crate::error::BridgeError;
use crate::ports::discord::Messenger;
use crate::ports::spotify::{AddTracksOutcome, PlaylistAdder};
use crate::track::extract_track_urls;

/// The closed set of things a message can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Reply,
    AddTracksToPlaylist,
}

/// Channel ID to the actions run, in order, for every message posted there.
#[derive(Debug, Clone, Default)]
pub struct ChannelActions(HashMap<String, Vec<ActionKind>>);

impl ChannelActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `kind` to the channel's actions. Adding the same kind twice runs it twice.
    pub fn add(&mut self, channel_id: impl Into<String>, kind: ActionKind) {
        self.0.entry(channel_id.into()).or_default().push(kind);
    }

    pub fn get(&self, channel_id: &str) -> Option<&[ActionKind]> {
        self.0.get(channel_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the registry from the configured channels.
    ///
    /// Channel types without actions are logged and skipped.
    pub fn from_channels(channels: &BTreeMap<ChannelType, String>) -> Self {
        let mut actions = Self::new();
        for (channel_type, channel_id) in channels {
            let kinds = actions_for(*channel_type);
            if kinds.is_empty() {
                tracing::info!(
                    channel_type = %channel_type,
                    channel_id = %channel_id,
                    "No actions for channel type, skipping"
                );
                continue;
            }
            for kind in kinds {
                tracing::info!(
                    channel_type = %channel_type,
                    channel_id = %channel_id,
                    action = ?kind,
                    "Registering channel action"
                );
                actions.add(channel_id.clone(), *kind);
            }
        }
        actions
    }
}

fn actions_for(channel_type: ChannelType) -> &'static [ActionKind] {
    match channel_type {
        ChannelType::Debug => &[ActionKind::Reply],
        ChannelType::Songs => &[ActionKind::AddTracksToPlaylist],
        ChannelType::Auth => &[],
    }
}

/// Per-message state shared by every action run for that message.
pub struct ActionContext {
    pub event: MessageEvent,
    /// Carries the message's log fields
    pub span: tracing::Span,
}

impl ActionContext {
    pub fn new(event: MessageEvent) -> Self {
        let span = tracing::info_span!(
            "message",
            channel_id = %event.channel_id,
            message_id = %event.id,
            author = event.author.as_ref().map(|author| author.name.as_str()).unwrap_or_default(),
        );
        Self { event, span }
    }
}

/// Collaborators handed to every action instance.
#[derive(Clone)]
pub struct ActionDeps {
    pub messenger: Arc<dyn Messenger>,
    pub playlist: Option<Arc<dyn PlaylistAdder>>,
    pub playlist_id: Option<String>,
    /// Replaces the echo body of reply actions
    pub reply_body: Option<String>,
}

pub enum Action {
    Reply(ReplyAction),
    AddTracksToPlaylist(AddTracksAction),
}

impl Action {
    pub fn new(kind: ActionKind, deps: &ActionDeps) -> Self {
        match kind {
            ActionKind::Reply => {
                let mut action = ReplyAction::new(deps.messenger.clone());
                if let Some(body) = &deps.reply_body {
                    action = action.with_body(body.clone());
                }
                Action::Reply(action)
            }
            ActionKind::AddTracksToPlaylist => Action::AddTracksToPlaylist(AddTracksAction {
                playlist: deps.playlist.clone(),
                playlist_id: deps.playlist_id.clone(),
            }),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Reply(_) => ActionKind::Reply,
            Action::AddTracksToPlaylist(_) => ActionKind::AddTracksToPlaylist,
        }
    }

    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let span = ctx.span.clone();
        match self {
            Action::Reply(action) => action.execute(ctx).instrument(span).await,
            Action::AddTracksToPlaylist(action) => action.execute(ctx).instrument(span).await,
        }
    }
}

/// Replies to the message, echoing it unless a body is set.
pub struct ReplyAction {
    messenger: Arc<dyn Messenger>,
    body: Option<String>,
}

impl ReplyAction {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self {
            messenger,
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let reply = match &self.body {
            Some(body) => body.clone(),
            None => format!("Echo: {}", ctx.event.content),
        };

        self.messenger
            .reply(&ctx.event.channel_id, &ctx.event.id, &reply)
            .await?;
        tracing::info!(reply = %reply, "Sent reply");
        Ok(())
    }
}

/// Adds the Spotify tracks linked in the message to the playlist.
pub struct AddTracksAction {
    playlist: Option<Arc<dyn PlaylistAdder>>,
    playlist_id: Option<String>,
}

impl AddTracksAction {
    async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let playlist = self
            .playlist
            .as_ref()
            .ok_or_eyre("spotify client is not configured")?;

        let (track_urls, found) = extract_track_urls(&ctx.event.content);
        if !found {
            tracing::info!("No Spotify tracks found in message");
            return Ok(());
        }
        tracing::info!(count = track_urls.len(), tracks = ?track_urls, "Found Spotify tracks");

        let playlist_id = self
            .playlist_id
            .as_deref()
            .ok_or_else(|| BridgeError::Config(vec![env::SPOTIFY_PLAYLIST_ID.to_string()]))?;

        match playlist
            .add_tracks_to_playlist(playlist_id, &track_urls)
            .await?
        {
            AddTracksOutcome::NoTracks => {
                tracing::info!(playlist_id, "No track IDs in the found links")
            }
            AddTracksOutcome::NothingNew => {
                tracing::info!(playlist_id, "All tracks are already in the playlist")
            }
            AddTracksOutcome::Added {
                snapshot_id,
                track_ids,
            } => tracing::info!(
                playlist_id,
                snapshot_id = %snapshot_id,
                track_ids = ?track_ids,
                "Added tracks to playlist"
            ),
        }
        Ok(())
    }
}
