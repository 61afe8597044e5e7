use std::sync::Arc;

use tracing::Instrument;

use crate::discord::actions::{Action, ActionContext, ActionDeps, ChannelActions};
use crate::error::BridgeError;

#[derive(Debug, Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub bot: bool,
}

/// A message posted in a channel the bot can see.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: String,
    pub channel_id: String,
    pub author: Option<Author>,
    pub content: String,
}

impl MessageEvent {
    pub fn validate(&self) -> Result<&Author, BridgeError> {
        if self.id.is_empty() || self.channel_id.is_empty() {
            return Err(BridgeError::InvalidEvent("message is missing its ids"));
        }
        if self.content.is_empty() {
            return Err(BridgeError::InvalidEvent("message content is empty"));
        }
        self.author
            .as_ref()
            .ok_or(BridgeError::InvalidEvent("message author is missing"))
    }
}

/// Runs the registered actions for every message posted in a registered channel.
pub struct MessageDispatcher {
    actions: Arc<ChannelActions>,
    deps: ActionDeps,
    verbose: bool,
}

impl MessageDispatcher {
    pub fn new(actions: Arc<ChannelActions>, deps: ActionDeps, verbose: bool) -> Self {
        Self {
            actions,
            deps,
            verbose,
        }
    }

    /// Handles one message event, returning how many actions ran.
    ///
    /// Action failures are logged and never stop the actions after them.
    pub async fn handle(&self, event: MessageEvent) -> usize {
        let author = match event.validate() {
            Ok(author) => author,
            Err(err) => {
                tracing::error!(
                    channel_id = %event.channel_id,
                    message_id = %event.id,
                    error = %err,
                    "Dropping invalid message"
                );
                return 0;
            }
        };

        if author.bot {
            tracing::debug!(
                channel_id = %event.channel_id,
                user = %author.name,
                "Ignoring bot message"
            );
            return 0;
        }

        let Some(kinds) = self.actions.get(&event.channel_id) else {
            tracing::debug!(
                channel_id = %event.channel_id,
                "No actions registered for channel"
            );
            return 0;
        };

        // Instantiate up front so the event can move into the context
        let actions: Vec<Action> = kinds
            .iter()
            .map(|kind| Action::new(*kind, &self.deps))
            .collect();
        let ctx = ActionContext::new(event);

        async {
            if self.verbose {
                tracing::info!(event = ?ctx.event, "Full message data");
            }
            tracing::info!(content = %ctx.event.content, "Received message");

            for action in &actions {
                if let Err(err) = action.execute(&ctx).await {
                    tracing::error!(action = ?action.kind(), error = ?err, "Action failed");
                }
            }
        }
        .instrument(ctx.span.clone())
        .await;

        actions.len()
    }
}
