use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serenity::all::{
    ChannelId, Client, Command, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, EventHandler, GatewayIntents, Http,
    Interaction, Message, MessageId, Ready, ShardManager,
};
use serenity::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::bridge::Service;
use crate::discord::interactions::{
    CHALLENGE_COMMAND, CHALLENGE_OPTION, InteractionDispatcher, InteractionEvent,
    InteractionReply, TEST_COMMAND,
};
use crate::discord::message::{Author, MessageDispatcher, MessageEvent};
use crate::error::BridgeError;
use crate::ports::discord::Messenger;

/// How long `start` waits for the first `Ready` event.
const READY_TIMEOUT: Duration = Duration::from_secs(60);

impl From<&Message> for MessageEvent {
    fn from(msg: &Message) -> Self {
        MessageEvent {
            id: msg.id.to_string(),
            channel_id: msg.channel_id.to_string(),
            author: Some(Author {
                id: msg.author.id.to_string(),
                name: msg.author.name.clone(),
                bot: msg.author.bot,
            }),
            content: msg.content.clone(),
        }
    }
}

impl From<&CommandInteraction> for InteractionEvent {
    fn from(command: &CommandInteraction) -> Self {
        InteractionEvent::Command {
            name: command.data.name.clone(),
            user_id: Some(command.user.id.to_string()),
            option: command
                .data
                .options
                .first()
                .and_then(|option| option.value.as_str())
                .map(String::from),
        }
    }
}

fn parse_snowflake(id: &str) -> Result<u64> {
    id.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| color_eyre::eyre::eyre!("invalid discord id: {id:?}"))
}

/// Posts through Discord's REST API. Works without an open gateway session.
pub struct DiscordMessenger {
    http: Arc<Http>,
}

impl DiscordMessenger {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl Messenger for DiscordMessenger {
    async fn reply(&self, channel_id: &str, message_id: &str, content: &str) -> Result<()> {
        let channel = ChannelId::new(parse_snowflake(channel_id)?);
        let message = MessageId::new(parse_snowflake(message_id)?);

        channel
            .send_message(
                self.http.as_ref(),
                CreateMessage::new()
                    .content(content)
                    .reference_message((channel, message)),
            )
            .await
            .wrap_err("Failed to send reply")?;
        Ok(())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<()> {
        let channel = ChannelId::new(parse_snowflake(channel_id)?);

        channel
            .send_message(self.http.as_ref(), CreateMessage::new().content(content))
            .await
            .wrap_err("Failed to send message")?;
        Ok(())
    }
}

/// Maps a gateway interaction onto the dispatcher's event.
fn interaction_event(interaction: &Interaction) -> InteractionEvent {
    match interaction {
        Interaction::Ping(_) => InteractionEvent::Ping,
        Interaction::Command(command) => InteractionEvent::from(command),
        other => InteractionEvent::Other {
            kind: format!("{:?}", other.kind()),
        },
    }
}

/// Serenity event handler forwarding to the dispatchers.
struct Handler {
    messages: Arc<MessageDispatcher>,
    interactions: Arc<InteractionDispatcher>,
    /// Fired on the first `Ready` so `start` knows the session is up
    ready_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Handler {
    async fn respond(&self, ctx: &Context, interaction: &Interaction) -> Result<()> {
        let reply = self.interactions.handle(&interaction_event(interaction));

        match (interaction, reply) {
            (Interaction::Ping(ping), Some(InteractionReply::Pong)) => {
                ctx.http
                    .create_interaction_response(
                        ping.id,
                        &ping.token,
                        &CreateInteractionResponse::Pong,
                        Vec::new(),
                    )
                    .await
                    .wrap_err("Failed to respond to ping")?;
            }
            (Interaction::Command(command), Some(InteractionReply::Message(content))) => {
                command
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new().content(content),
                        ),
                    )
                    .await
                    .wrap_err_with(|| format!("Failed to respond to {}", command.data.name))?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        self.messages.handle(MessageEvent::from(&msg)).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        tracing::info!(id = %interaction.id(), kind = ?interaction.kind(), "Received interaction");
        if let Err(err) = self.respond(&ctx, &interaction).await {
            tracing::error!(error = ?err, "Failed to respond to interaction");
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "Discord bot connected");
        if let Some(ready_tx) = self.ready_tx.lock().await.take() {
            let _ = ready_tx.send(());
        }

        let commands = vec![
            CreateCommand::new(TEST_COMMAND).description("Get a test message from the bot"),
            CreateCommand::new(CHALLENGE_COMMAND)
                .description("Challenge the bot")
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    CHALLENGE_OPTION,
                    "What you challenge the bot with",
                )),
        ];

        if let Err(err) = Command::set_global_commands(&ctx.http, commands).await {
            tracing::error!(error = %err, "Failed to register slash commands");
        }
    }
}

/// Resolves once the session reports ready. Fails if the gateway task ends
/// first or nothing arrives within `timeout`.
async fn wait_until_ready<E: Display>(
    ready_rx: oneshot::Receiver<()>,
    task: &mut JoinHandle<Result<(), E>>,
    timeout: Duration,
) -> Result<(), BridgeError> {
    let outcome = tokio::time::timeout(timeout, async {
        tokio::select! {
            ready = ready_rx => ready.map_err(|_| {
                BridgeError::Gateway("event handler dropped before ready".into())
            }),
            joined = &mut *task => Err(BridgeError::Gateway(match joined {
                Ok(Ok(())) => "session closed before ready".to_string(),
                Ok(Err(err)) => format!("failed to open session: {err}"),
                Err(err) => format!("gateway task failed: {err}"),
            })),
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Gateway(format!(
            "session not ready after {}s",
            timeout.as_secs_f32()
        ))),
    }
}

/// Owns the gateway session.
pub struct GatewayClient {
    token: String,
    messages: Arc<MessageDispatcher>,
    interactions: Arc<InteractionDispatcher>,
    shard_manager: Mutex<Option<Arc<ShardManager>>>,
    task: Mutex<Option<JoinHandle<serenity::Result<()>>>>,
}

impl GatewayClient {
    pub fn new(
        token: String,
        messages: Arc<MessageDispatcher>,
        interactions: Arc<InteractionDispatcher>,
    ) -> Self {
        Self {
            token,
            messages,
            interactions,
            shard_manager: Mutex::new(None),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Service for GatewayClient {
    fn name(&self) -> &'static str {
        "Discord Gateway Client"
    }

    async fn start(&self) -> Result<(), BridgeError> {
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let (ready_tx, ready_rx) = oneshot::channel();
        let handler = Handler {
            messages: self.messages.clone(),
            interactions: self.interactions.clone(),
            ready_tx: Mutex::new(Some(ready_tx)),
        };

        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .map_err(|err| BridgeError::Gateway(format!("failed to create session: {err}")))?;
        let shard_manager = client.shard_manager.clone();

        // Serenity runs the receive loop until the shards are shut down
        let mut task = tokio::spawn(async move {
            let result = client.start().await;
            if let Err(err) = &result {
                tracing::error!(error = %err, "Discord gateway stopped with an error");
            }
            result
        });

        tracing::info!("Connecting to Discord");
        if let Err(err) = wait_until_ready(ready_rx, &mut task, READY_TIMEOUT).await {
            shard_manager.shutdown_all().await;
            task.abort();
            return Err(err);
        }

        *self.shard_manager.lock().await = Some(shard_manager);
        *self.task.lock().await = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        if let Some(shard_manager) = self.shard_manager.lock().await.take() {
            shard_manager.shutdown_all().await;
        }
        if let Some(task) = self.task.lock().await.take() {
            // A session error was already logged by the task
            let _ = task
                .await
                .map_err(|err| BridgeError::Gateway(format!("gateway task failed: {err}")))?;
        }
        Ok(())
    }
}
