//! Identity resolution: decides which entity ID an update discloses and
//! renders the HTML reply for it. Pure functions, no I/O.

use crate::config::Settings;
use crate::update::{ChatKind, ForwardedSender, InlineQuery, Message, MessageKind};

const HIDDEN_FORWARD_NOTICE: &str = "This user decided to <b>hide</b> their ID.\n\n\
     Learn more about this feature \
     <a href=\"https://telegram.org/blog/unsend-privacy-emoji#anonymous-forwarding\">here</a>.";

const HELP_TEXT: &str = "Use this bot to get ID for different entities across Telegram.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    ChatId,
    ChannelId,
    UserId,
    BotId,
    Hidden,
    MigrationNotice,
}

/// What a rule resolved to. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityReport {
    Chat { id: i64, kind: ChatKind },
    Channel { id: i64 },
    User { id: u64 },
    Bot { id: u64 },
    Hidden,
    MigratedTo { old_id: i64, new_id: i64 },
    MigratedFrom { old_id: i64, new_id: i64 },
    /// One-to-one chat: the chat ID equals the user's ID.
    PrivateChat { id: i64 },
    Inline { user_id: u64 },
}

impl IdentityReport {
    pub fn kind(&self) -> ReportKind {
        match self {
            IdentityReport::Chat { .. } | IdentityReport::PrivateChat { .. } => ReportKind::ChatId,
            IdentityReport::Channel { .. } => ReportKind::ChannelId,
            IdentityReport::User { .. } | IdentityReport::Inline { .. } => ReportKind::UserId,
            IdentityReport::Bot { .. } => ReportKind::BotId,
            IdentityReport::Hidden => ReportKind::Hidden,
            IdentityReport::MigratedTo { .. } | IdentityReport::MigratedFrom { .. } => {
                ReportKind::MigrationNotice
            }
        }
    }

    /// Chat the reply must be sent to, for reports that come from a chat.
    ///
    /// After a migration the old chat no longer accepts messages, so the
    /// `MigratedTo` notice goes to the new ID. `MigratedFrom` already arrives
    /// on the new chat.
    pub fn target(&self, origin_chat_id: i64) -> i64 {
        match self {
            IdentityReport::MigratedTo { new_id, .. } => *new_id,
            _ => origin_chat_id,
        }
    }

    /// HTML reply text.
    pub fn render(&self) -> String {
        match self {
            IdentityReport::Chat { id, kind } => {
                format!("This {} chat ID is <code>{}</code>", kind, id)
            }
            IdentityReport::Channel { id } => format!("This channel's ID is <code>{}</code>", id),
            IdentityReport::User { id } => format!("This user's ID is <code>{}</code>", id),
            IdentityReport::Bot { id } => format!("This bot's ID is <code>{}</code>", id),
            IdentityReport::Hidden => HIDDEN_FORWARD_NOTICE.to_string(),
            IdentityReport::MigratedTo { new_id, .. } => {
                format!("Group upgraded to supergroup.\nNew ID: <code>{}</code>", new_id)
            }
            IdentityReport::MigratedFrom { old_id, .. } => {
                format!(
                    "Group upgraded to supergroup.\nPrevious ID: <code>{}</code>",
                    old_id
                )
            }
            IdentityReport::PrivateChat { id } => {
                format!("Your Telegram ID is <code>{}</code>", id)
            }
            IdentityReport::Inline { user_id } => {
                format!("My Telegram ID is <code>{}</code>", user_id)
            }
        }
    }
}

pub fn current_chat(msg: &Message) -> IdentityReport {
    IdentityReport::Chat {
        id: msg.chat.id,
        kind: msg.chat.kind,
    }
}

pub fn private_chat(msg: &Message) -> IdentityReport {
    IdentityReport::PrivateChat { id: msg.chat.id }
}

/// Disclosed origin of a forwarded message.
pub fn forward_origin(msg: &Message) -> Option<IdentityReport> {
    match &msg.kind {
        MessageKind::ForwardedFromChannel { channel_id } => {
            Some(IdentityReport::Channel { id: *channel_id })
        }
        MessageKind::ForwardedFromUser { sender } => Some(match sender {
            ForwardedSender::Disclosed {
                user_id,
                is_bot: true,
            } => IdentityReport::Bot { id: *user_id },
            ForwardedSender::Disclosed { user_id, .. } => IdentityReport::User { id: *user_id },
            // Never try to guess the ID behind an anonymous forward.
            ForwardedSender::Hidden => IdentityReport::Hidden,
        }),
        _ => None,
    }
}

/// Report the chat only when the bot itself is among the joined members.
pub fn bot_joined(msg: &Message, settings: &Settings) -> Option<IdentityReport> {
    let bot_id = settings.bot_id?;
    match &msg.kind {
        MessageKind::NewChatMembers { joined } if joined.contains(&bot_id) => {
            Some(current_chat(msg))
        }
        _ => None,
    }
}

pub fn migration(msg: &Message) -> Option<IdentityReport> {
    match msg.kind {
        MessageKind::ChatMigratedTo {
            old_chat_id,
            new_chat_id,
        } => Some(IdentityReport::MigratedTo {
            old_id: old_chat_id,
            new_id: new_chat_id,
        }),
        MessageKind::ChatMigratedFrom {
            old_chat_id,
            new_chat_id,
        } => Some(IdentityReport::MigratedFrom {
            old_id: old_chat_id,
            new_id: new_chat_id,
        }),
        _ => None,
    }
}

/// Personal inline answer for the requesting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAnswer {
    pub query_id: String,
    pub result_id: String,
    pub title: String,
    pub description: String,
    pub message_text: String,
    pub cache_time: u32,
    /// Results must never be shared between users.
    pub is_personal: bool,
}

pub fn inline_answer(query: &InlineQuery, settings: &Settings) -> InlineAnswer {
    let report = IdentityReport::Inline {
        user_id: query.from_user_id,
    };
    InlineAnswer {
        query_id: query.id.clone(),
        result_id: ".".to_string(),
        title: format!("Your ID is {}", query.from_user_id),
        description: "Tap to send your ID to current chat".to_string(),
        message_text: report.render(),
        cache_time: settings.inline_cache_time.max(1),
        is_personal: true,
    }
}

pub fn help_text(settings: &Settings) -> String {
    match &settings.source_url {
        Some(url) => format!("{} Source code: {}", HELP_TEXT, url),
        None => HELP_TEXT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{Chat, ContentType};
    use rstest::rstest;

    fn message(kind: MessageKind, chat_kind: ChatKind) -> Message {
        Message {
            id: 7,
            chat: Chat {
                id: -100,
                kind: chat_kind,
            },
            text: None,
            content_type: ContentType::Text,
            kind,
        }
    }

    #[test]
    fn test_current_chat_report() {
        let msg = message(MessageKind::TextOrMedia, ChatKind::Supergroup);
        let report = current_chat(&msg);
        assert_eq!(report.kind(), ReportKind::ChatId);
        assert_eq!(report.render(), "This supergroup chat ID is <code>-100</code>");
    }

    #[rstest]
    #[case(MessageKind::ForwardedFromChannel { channel_id: -1001 }, ReportKind::ChannelId, "This channel's ID is <code>-1001</code>")]
    #[case(MessageKind::ForwardedFromUser { sender: ForwardedSender::Disclosed { user_id: 42, is_bot: false } }, ReportKind::UserId, "This user's ID is <code>42</code>")]
    #[case(MessageKind::ForwardedFromUser { sender: ForwardedSender::Disclosed { user_id: 43, is_bot: true } }, ReportKind::BotId, "This bot's ID is <code>43</code>")]
    fn test_forward_origin(
        #[case] kind: MessageKind,
        #[case] expected_kind: ReportKind,
        #[case] expected_text: &str,
    ) {
        let report = forward_origin(&message(kind, ChatKind::Private)).unwrap();
        assert_eq!(report.kind(), expected_kind);
        assert_eq!(report.render(), expected_text);
    }

    #[test]
    fn test_hidden_forward_discloses_no_id() {
        let msg = message(
            MessageKind::ForwardedFromUser {
                sender: ForwardedSender::Hidden,
            },
            ChatKind::Private,
        );
        let report = forward_origin(&msg).unwrap();
        assert_eq!(report.kind(), ReportKind::Hidden);
        let text = report.render();
        assert!(!text.chars().any(|c| c.is_ascii_digit()));
        assert!(!text.contains("<code>"));
    }

    #[test]
    fn test_not_a_forward() {
        assert!(forward_origin(&message(MessageKind::TextOrMedia, ChatKind::Group)).is_none());
    }

    #[test]
    fn test_bot_joined_only_for_own_id() {
        let settings = Settings {
            bot_id: Some(12345),
            ..Settings::default()
        };
        let joined = message(
            MessageKind::NewChatMembers {
                joined: vec![67890, 12345],
            },
            ChatKind::Group,
        );
        assert_eq!(
            bot_joined(&joined, &settings),
            Some(IdentityReport::Chat {
                id: -100,
                kind: ChatKind::Group
            })
        );

        let others = message(
            MessageKind::NewChatMembers {
                joined: vec![67890],
            },
            ChatKind::Group,
        );
        assert!(bot_joined(&others, &settings).is_none());
    }

    #[test]
    fn test_bot_joined_disabled_without_bot_id() {
        let msg = message(
            MessageKind::NewChatMembers {
                joined: vec![12345],
            },
            ChatKind::Group,
        );
        assert!(bot_joined(&msg, &Settings::default()).is_none());
    }

    #[test]
    fn test_migration_targets_new_chat() {
        let to = message(
            MessageKind::ChatMigratedTo {
                old_chat_id: -100,
                new_chat_id: -1009,
            },
            ChatKind::Group,
        );
        let report = migration(&to).unwrap();
        assert_eq!(report.kind(), ReportKind::MigrationNotice);
        assert_eq!(report.target(to.chat.id), -1009);
        assert!(report.render().contains("New ID: <code>-1009</code>"));

        let from = Message {
            chat: Chat {
                id: -1009,
                kind: ChatKind::Supergroup,
            },
            ..message(
                MessageKind::ChatMigratedFrom {
                    old_chat_id: -100,
                    new_chat_id: -1009,
                },
                ChatKind::Supergroup,
            )
        };
        let report = migration(&from).unwrap();
        assert_eq!(report.target(from.chat.id), -1009);
        assert!(report.render().contains("Previous ID: <code>-100</code>"));
    }

    #[test]
    fn test_private_chat_report() {
        let msg = message(MessageKind::TextOrMedia, ChatKind::Private);
        assert_eq!(
            private_chat(&msg).render(),
            "Your Telegram ID is <code>-100</code>"
        );
    }

    #[test]
    fn test_inline_answer_is_personal() {
        let query = InlineQuery {
            id: "q1".to_string(),
            from_user_id: 555,
            query: String::new(),
        };
        let answer = inline_answer(&query, &Settings::default());
        assert_eq!(answer.query_id, "q1");
        assert!(answer.message_text.contains("555"));
        assert!(answer.title.contains("555"));
        assert!(answer.is_personal);
        assert_eq!(answer.cache_time, 3600);
    }

    #[test]
    fn test_help_text_with_source_url() {
        let settings = Settings {
            source_url: Some("https://example.com/src".to_string()),
            ..Settings::default()
        };
        assert!(help_text(&settings).ends_with("Source code: https://example.com/src"));
        assert_eq!(help_text(&Settings::default()), HELP_TEXT);
    }
}
