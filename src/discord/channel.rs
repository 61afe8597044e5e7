use std::fmt;

/// The roles a configured Discord channel can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelType {
    /// Receives Spotify authorization URLs
    Auth,
    /// Echoes messages back, for debugging the bot
    Debug,
    /// Track links posted here are added to the playlist
    Songs,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Auth => "Authentication",
            ChannelType::Debug => "Debug",
            ChannelType::Songs => "Songs",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
