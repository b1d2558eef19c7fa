use std::fmt;

/// One inbound event from the platform, already stripped of transport details.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Message(Message),
    InlineQuery(InlineQuery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatKind::Private => write!(f, "private"),
            ChatKind::Group => write!(f, "group"),
            ChatKind::Supergroup => write!(f, "supergroup"),
            ChatKind::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
}

/// Declared content of a message, used by the per-rule content filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Photo,
    Video,
    VideoNote,
    Animation,
    Audio,
    Voice,
    Document,
    Sticker,
    Contact,
    Location,
    Poll,
    Dice,
    NewChatMembers,
    MigrateToChatId,
    MigrateFromChatId,
    Other,
}

/// Who a forwarded user message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardedSender {
    Disclosed { user_id: u64, is_bot: bool },
    /// The sender enabled anonymous forwarding. Their display name is not kept.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    TextOrMedia,
    ForwardedFromChannel { channel_id: i64 },
    ForwardedFromUser { sender: ForwardedSender },
    NewChatMembers { joined: Vec<u64> },
    ChatMigratedTo { old_chat_id: i64, new_chat_id: i64 },
    ChatMigratedFrom { old_chat_id: i64, new_chat_id: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i32,
    pub chat: Chat,
    /// Message text; captions are not included.
    pub text: Option<String>,
    pub content_type: ContentType,
    pub kind: MessageKind,
}

impl Message {
    pub fn is_private(&self) -> bool {
        self.chat.kind == ChatKind::Private
    }

    pub fn is_privacy_hidden_forward(&self) -> bool {
        matches!(
            self.kind,
            MessageKind::ForwardedFromUser {
                sender: ForwardedSender::Hidden
            }
        )
    }

    /// Parse the leading bot command, if any.
    pub fn command(&self, bot_username: Option<&str>) -> Option<Command> {
        self.text
            .as_deref()
            .and_then(|text| Command::parse(text, bot_username))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineQuery {
    pub id: String,
    pub from_user_id: u64,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Id,
    Help,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::Id, Command::Help];

    pub fn name(self) -> &'static str {
        match self {
            Command::Id => "id",
            Command::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Id => "Show the ID of the current chat",
            Command::Help => "How to use this bot",
        }
    }

    /// Parse `/name`, `/name@bot` or `/name args`.
    ///
    /// A mention addressed to another bot does not match. When our own
    /// username is unknown, any mention is accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        // The command must be the very first thing in the message.
        let head = text.split(char::is_whitespace).next()?;
        let head = head.strip_prefix('/')?;
        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (head, None),
        };

        if let (Some(mention), Some(own)) = (mention, bot_username) {
            if !mention.eq_ignore_ascii_case(own) {
                return None;
            }
        }

        Command::ALL
            .into_iter()
            .find(|cmd| cmd.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/id", Some(Command::Id))]
    #[case("/help", Some(Command::Help))]
    #[case("/ID", Some(Command::Id))]
    #[case("/id some trailing words", Some(Command::Id))]
    #[case("/id@IdBot", Some(Command::Id))]
    #[case("/id@idbot", Some(Command::Id))]
    #[case("/id@OtherBot", None)]
    #[case("/identity", None)]
    #[case("id", None)]
    #[case("hello /id", None)]
    #[case("   /id", None)]
    #[case("\n/help", None)]
    #[case("/id\nmore lines", Some(Command::Id))]
    #[case("", None)]
    fn test_command_parse(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse(text, Some("IdBot")), expected);
    }

    #[test]
    fn test_command_mention_accepted_without_username() {
        assert_eq!(Command::parse("/help@Whatever", None), Some(Command::Help));
    }

    #[test]
    fn test_chat_kind_display() {
        assert_eq!(ChatKind::Private.to_string(), "private");
        assert_eq!(ChatKind::Supergroup.to_string(), "supergroup");
    }

    #[test]
    fn test_privacy_hidden_forward() {
        let msg = Message {
            id: 1,
            chat: Chat {
                id: 10,
                kind: ChatKind::Private,
            },
            text: None,
            content_type: ContentType::Photo,
            kind: MessageKind::ForwardedFromUser {
                sender: ForwardedSender::Hidden,
            },
        };
        assert!(msg.is_privacy_hidden_forward());
        assert!(msg.is_private());
        assert_eq!(msg.command(None), None);
    }
}
