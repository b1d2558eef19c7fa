use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::config::Settings;
use crate::error::DeliveryError;
use crate::identity::{self, IdentityReport, InlineAnswer};
use crate::stats::TrackingSink;
use crate::update::{
    Command, ContentType, ForwardedSender, InlineQuery, Message, MessageKind, Update,
};

const TEXT_ONLY: &[ContentType] = &[ContentType::Text];
const NEW_MEMBERS: &[ContentType] = &[ContentType::NewChatMembers];
const MIGRATE_TO: &[ContentType] = &[ContentType::MigrateToChatId];
const MIGRATE_FROM: &[ContentType] = &[ContentType::MigrateFromChatId];
const INLINE_LABEL: &str = "Inline mode";

/// An outbound HTML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
    /// Quote this message in the target chat.
    pub reply_to: Option<i32>,
}

/// Outbound side of the platform.
#[async_trait]
pub trait ReplyEmitter: Send + Sync {
    async fn send(&self, reply: &Reply) -> Result<(), DeliveryError>;

    async fn answer_inline(&self, answer: &InlineAnswer) -> Result<(), DeliveryError>;
}

/// Predicate part of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Command(Command),
    ForwardedFromChannel,
    ForwardedFromUser,
    ForwardedHidden,
    NewChatMembers,
    MigratedTo,
    MigratedFrom,
    PrivateChat,
}

impl Guard {
    pub fn matches(&self, msg: &Message, settings: &Settings) -> bool {
        match self {
            Guard::Command(cmd) => msg.command(settings.bot_username.as_deref()) == Some(*cmd),
            Guard::ForwardedFromChannel => {
                matches!(msg.kind, MessageKind::ForwardedFromChannel { .. })
            }
            Guard::ForwardedFromUser => matches!(
                msg.kind,
                MessageKind::ForwardedFromUser {
                    sender: ForwardedSender::Disclosed { .. }
                }
            ),
            Guard::ForwardedHidden => msg.is_privacy_hidden_forward(),
            Guard::NewChatMembers => matches!(msg.kind, MessageKind::NewChatMembers { .. }),
            Guard::MigratedTo => matches!(msg.kind, MessageKind::ChatMigratedTo { .. }),
            Guard::MigratedFrom => matches!(msg.kind, MessageKind::ChatMigratedFrom { .. }),
            Guard::PrivateChat => msg.is_private(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReportChat,
    ShowHelp,
    ReportForwardOrigin,
    ReportJoinedChat,
    AnnounceMigration,
    ReportPrivateChat,
}

/// One handler registration: guard, optional content allow-set, action.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    /// Label sent to the tracking sink when the rule delivers a reply.
    pub label: &'static str,
    pub guard: Guard,
    /// `None` accepts every content type.
    pub content: Option<&'static [ContentType]>,
    pub action: Action,
}

impl Rule {
    pub fn accepts(&self, msg: &Message, settings: &Settings) -> bool {
        let content_ok = self
            .content
            .map_or(true, |allowed| allowed.contains(&msg.content_type));
        content_ok && self.guard.matches(msg, settings)
    }
}

/// Registrations in priority order, highest first.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "command_id",
            label: "/id",
            guard: Guard::Command(Command::Id),
            content: Some(TEXT_ONLY),
            action: Action::ReportChat,
        },
        Rule {
            name: "command_help",
            label: "/help",
            guard: Guard::Command(Command::Help),
            content: Some(TEXT_ONLY),
            action: Action::ShowHelp,
        },
        Rule {
            name: "forwarded_channel",
            label: "Get channel ID",
            guard: Guard::ForwardedFromChannel,
            content: None,
            action: Action::ReportForwardOrigin,
        },
        Rule {
            name: "forwarded_user",
            label: "Check user or bot",
            guard: Guard::ForwardedFromUser,
            content: None,
            action: Action::ReportForwardOrigin,
        },
        Rule {
            name: "forwarded_hidden",
            label: "Check user or bot",
            guard: Guard::ForwardedHidden,
            content: None,
            action: Action::ReportForwardOrigin,
        },
        Rule {
            name: "new_chat_members",
            label: "Added to group",
            guard: Guard::NewChatMembers,
            content: Some(NEW_MEMBERS),
            action: Action::ReportJoinedChat,
        },
        Rule {
            name: "migrated_to",
            label: "Group migrate",
            guard: Guard::MigratedTo,
            content: Some(MIGRATE_TO),
            action: Action::AnnounceMigration,
        },
        Rule {
            name: "migrated_from",
            label: "Group migrate (previous ID)",
            guard: Guard::MigratedFrom,
            content: Some(MIGRATE_FROM),
            action: Action::AnnounceMigration,
        },
        Rule {
            name: "private_chat",
            label: "Any message in PM",
            guard: Guard::PrivateChat,
            content: None,
            action: Action::ReportPrivateChat,
        },
    ]
}

/// Result of a single dispatch. Delivery errors never escape as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No registration accepted the update.
    Unmatched,
    /// A rule matched but had nothing to say (e.g. someone else joined).
    Skipped { rule: &'static str },
    Delivered { rule: &'static str },
    Failed { rule: &'static str },
}

impl Outcome {
    pub fn rule(&self) -> Option<&'static str> {
        match self {
            Outcome::Unmatched => None,
            Outcome::Skipped { rule } | Outcome::Delivered { rule } | Outcome::Failed { rule } => {
                Some(rule)
            }
        }
    }
}

pub struct Router {
    rules: Vec<Rule>,
    settings: Arc<Settings>,
    emitter: Arc<dyn ReplyEmitter>,
    tracker: Arc<dyn TrackingSink>,
}

impl Router {
    pub fn new(
        settings: Arc<Settings>,
        emitter: Arc<dyn ReplyEmitter>,
        tracker: Arc<dyn TrackingSink>,
    ) -> Self {
        Self {
            rules: default_rules(),
            settings,
            emitter,
            tracker,
        }
    }

    pub async fn dispatch(&self, update: Update) -> Outcome {
        match update {
            Update::Message(msg) => self.dispatch_message(&msg).await,
            Update::InlineQuery(query) => self.dispatch_inline(&query).await,
        }
    }

    /// First registration accepting `msg`, if any.
    pub fn route(&self, msg: &Message) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.accepts(msg, &self.settings))
    }

    async fn dispatch_message(&self, msg: &Message) -> Outcome {
        let Some(rule) = self.route(msg) else {
            trace!("No rule for message {} in chat {}", msg.id, msg.chat.id);
            return Outcome::Unmatched;
        };

        debug!("Rule '{}' matched message {} in chat {}", rule.name, msg.id, msg.chat.id);

        let Some(reply) = self.build_reply(rule.action, msg) else {
            return Outcome::Skipped { rule: rule.name };
        };

        match self.emitter.send(&reply).await {
            Ok(()) => {
                self.tracker.track(rule.label);
                Outcome::Delivered { rule: rule.name }
            }
            Err(DeliveryError::RecipientBlocked) if msg.is_private() => {
                debug!("User {} has blocked the bot", msg.chat.id);
                Outcome::Failed { rule: rule.name }
            }
            Err(e) => {
                warn!(
                    "Failed to deliver '{}' reply to chat {}: {}",
                    rule.name, reply.chat_id, e
                );
                Outcome::Failed { rule: rule.name }
            }
        }
    }

    async fn dispatch_inline(&self, query: &InlineQuery) -> Outcome {
        trace!(
            "Inline query {} from {}: {:?}",
            query.id,
            query.from_user_id,
            query.query
        );
        let answer = identity::inline_answer(query, &self.settings);

        match self.emitter.answer_inline(&answer).await {
            Ok(()) => {
                self.tracker.track(INLINE_LABEL);
                Outcome::Delivered { rule: "inline_query" }
            }
            Err(e) => {
                warn!("Failed to answer inline query {}: {}", query.id, e);
                Outcome::Failed {
                    rule: "inline_query",
                }
            }
        }
    }

    fn build_reply(&self, action: Action, msg: &Message) -> Option<Reply> {
        let (report, reply_to): (IdentityReport, Option<i32>) = match action {
            Action::ShowHelp => {
                return Some(Reply {
                    chat_id: msg.chat.id,
                    text: identity::help_text(&self.settings),
                    reply_to: None,
                });
            }
            Action::ReportChat => (identity::current_chat(msg), None),
            Action::ReportForwardOrigin => (identity::forward_origin(msg)?, Some(msg.id)),
            Action::ReportJoinedChat => (identity::bot_joined(msg, &self.settings)?, None),
            Action::AnnounceMigration => (identity::migration(msg)?, None),
            Action::ReportPrivateChat => (identity::private_chat(msg), Some(msg.id)),
        };

        debug!("Resolved {:?} in chat {}", report.kind(), msg.chat.id);

        Some(Reply {
            chat_id: report.target(msg.chat.id),
            text: report.render(),
            reply_to,
        })
    }
}
