use std::collections::HashMap;

pub const TEST_COMMAND: &str = "test";
pub const CHALLENGE_COMMAND: &str = "challenge";
pub const CHALLENGE_OPTION: &str = "choice";

const DEFAULT_TEST_REPLY: &str = "Test message";
const CHALLENGE_TAUNT: &str = "Challenge me once you're worthy.";

/// The parts of an interaction the bot cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    Ping,
    Command {
        name: String,
        user_id: Option<String>,
        /// First option's string value, if one was supplied
        option: Option<String>,
    },
    Other {
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionReply {
    Pong,
    Message(String),
}

/// Routes pings and slash commands to their responses.
pub struct InteractionDispatcher {
    test_replies: HashMap<String, String>,
}

impl InteractionDispatcher {
    pub fn new(test_replies: HashMap<String, String>) -> Self {
        Self { test_replies }
    }

    /// Returns the response to send, or `None` when the interaction is ignored.
    pub fn handle(&self, event: &InteractionEvent) -> Option<InteractionReply> {
        match event {
            InteractionEvent::Ping => {
                tracing::info!("Handling ping interaction");
                Some(InteractionReply::Pong)
            }
            InteractionEvent::Command {
                name,
                user_id,
                option,
            } => {
                tracing::info!(command = %name, "Handling slash command");
                match name.as_str() {
                    TEST_COMMAND => Some(InteractionReply::Message(
                        self.test_reply(user_id.as_deref()),
                    )),
                    CHALLENGE_COMMAND => Some(InteractionReply::Message(challenge_message(
                        option.as_deref(),
                    ))),
                    _ => {
                        tracing::error!(command = %name, "Unknown slash command");
                        None
                    }
                }
            }
            InteractionEvent::Other { kind } => {
                tracing::error!(kind = %kind, "No responder for interaction type");
                None
            }
        }
    }

    fn test_reply(&self, user_id: Option<&str>) -> String {
        user_id
            .and_then(|user_id| self.test_replies.get(user_id))
            .cloned()
            .unwrap_or_else(|| DEFAULT_TEST_REPLY.to_string())
    }
}

pub fn challenge_message(choice: Option<&str>) -> String {
    match choice {
        Some(choice) => format!(
            "{}? Really? You think you can defeat me with {}? {}",
            to_title_case(choice),
            choice.to_uppercase(),
            CHALLENGE_TAUNT
        ),
        None => CHALLENGE_TAUNT.to_string(),
    }
}

/// Uppercases the first letter of every space-separated word, leaving the rest alone.
fn to_title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c == ' ';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, user_id: Option<&str>, option: Option<&str>) -> InteractionEvent {
        InteractionEvent::Command {
            name: name.into(),
            user_id: user_id.map(String::from),
            option: option.map(String::from),
        }
    }

    fn dispatcher() -> InteractionDispatcher {
        InteractionDispatcher::new(HashMap::from([("42".to_string(), "GIOGIOGIO".to_string())]))
    }

    #[test]
    fn test_ping_gets_pong() {
        assert_eq!(
            dispatcher().handle(&InteractionEvent::Ping),
            Some(InteractionReply::Pong)
        );
    }

    #[test]
    fn test_challenge_with_option() {
        assert_eq!(
            dispatcher().handle(&command(CHALLENGE_COMMAND, None, Some("rock"))),
            Some(InteractionReply::Message(
                "Rock? Really? You think you can defeat me with ROCK? Challenge me once you're worthy."
                    .into()
            ))
        );
    }

    #[test]
    fn test_challenge_without_option() {
        assert_eq!(
            dispatcher().handle(&command(CHALLENGE_COMMAND, None, None)),
            Some(InteractionReply::Message(CHALLENGE_TAUNT.into()))
        );
    }

    #[test]
    fn test_test_command_per_user() {
        let dispatcher = dispatcher();
        assert_eq!(
            dispatcher.handle(&command(TEST_COMMAND, Some("42"), None)),
            Some(InteractionReply::Message("GIOGIOGIO".into()))
        );
        assert_eq!(
            dispatcher.handle(&command(TEST_COMMAND, Some("7"), None)),
            Some(InteractionReply::Message("Test message".into()))
        );
        assert_eq!(
            dispatcher.handle(&command(TEST_COMMAND, None, None)),
            Some(InteractionReply::Message("Test message".into()))
        );
    }

    #[test]
    fn test_unknown_command_and_type_are_ignored() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.handle(&command("dance", None, None)), None);
        assert_eq!(
            dispatcher.handle(&InteractionEvent::Other {
                kind: "Component".into()
            }),
            None
        );
    }

    #[test]
    fn test_to_title_case() {
        assert_eq!(to_title_case("paper scissors"), "Paper Scissors");
        assert_eq!(to_title_case("rOCK"), "ROCK");
        assert_eq!(to_title_case(""), "");
    }
}
