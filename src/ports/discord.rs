use color_eyre::eyre::Result;

/// Port trait for posting to Discord channels.
///
/// Channel and message IDs are the platform's snowflakes in string form.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `content` to the channel as a reply referencing `message_id`.
    async fn reply(&self, channel_id: &str, message_id: &str, content: &str) -> Result<()>;
    async fn send(&self, channel_id: &str, content: &str) -> Result<()>;
}
