use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::{AnswerInlineQuerySetters, DeleteWebhookSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
    InlineQueryId, InputMessageContentText, MessageId, MessageOrigin, ParseMode, ReplyParameters,
};
use teloxide::{ApiError, RequestError};
use tracing::{info, trace, warn};

use crate::error::DeliveryError;
use crate::identity::InlineAnswer;
use crate::router::{Reply, ReplyEmitter, Router};
use crate::update::{self as domain, ChatKind, ContentType, ForwardedSender, MessageKind};

/// Sends replies through the Bot API, always as HTML.
pub struct TelegramEmitter {
    bot: Bot,
}

impl TelegramEmitter {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReplyEmitter for TelegramEmitter {
    async fn send(&self, reply: &Reply) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .send_message(ChatId(reply.chat_id), reply.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(id) = reply.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }

        request.await.map(|_| ()).map_err(delivery_error)
    }

    async fn answer_inline(&self, answer: &InlineAnswer) -> Result<(), DeliveryError> {
        let content = InputMessageContent::Text(
            InputMessageContentText::new(answer.message_text.clone()).parse_mode(ParseMode::Html),
        );
        let article = InlineQueryResultArticle::new(
            answer.result_id.clone(),
            answer.title.clone(),
            content,
        )
        .description(answer.description.clone());

        self.bot
            .answer_inline_query(
                inline_query_id(answer),
                vec![InlineQueryResult::Article(article)],
            )
            .cache_time(answer.cache_time)
            .is_personal(answer.is_personal)
            .await
            .map(|_| ())
            .map_err(delivery_error)
    }
}

fn inline_query_id(answer: &InlineAnswer) -> InlineQueryId {
    InlineQueryId(answer.query_id.clone())
}

fn delivery_error(e: RequestError) -> DeliveryError {
    match e {
        RequestError::Api(ApiError::BotBlocked) => DeliveryError::RecipientBlocked,
        RequestError::MigrateToChatId(id) => DeliveryError::ChatMigrated { new_chat_id: id.0 },
        RequestError::Network(e) => DeliveryError::Network(e.to_string()),
        other => DeliveryError::Api(other.to_string()),
    }
}

fn chat_kind(chat: &teloxide::types::Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn content_type(msg: &Message) -> ContentType {
    if msg.text().is_some() {
        ContentType::Text
    } else if msg.photo().is_some() {
        ContentType::Photo
    } else if msg.video().is_some() {
        ContentType::Video
    } else if msg.video_note().is_some() {
        ContentType::VideoNote
    } else if msg.animation().is_some() {
        ContentType::Animation
    } else if msg.audio().is_some() {
        ContentType::Audio
    } else if msg.voice().is_some() {
        ContentType::Voice
    } else if msg.document().is_some() {
        ContentType::Document
    } else if msg.sticker().is_some() {
        ContentType::Sticker
    } else if msg.contact().is_some() {
        ContentType::Contact
    } else if msg.location().is_some() {
        ContentType::Location
    } else if msg.poll().is_some() {
        ContentType::Poll
    } else if msg.dice().is_some() {
        ContentType::Dice
    } else if msg.new_chat_members().is_some() {
        ContentType::NewChatMembers
    } else if msg.migrate_to_chat_id().is_some() {
        ContentType::MigrateToChatId
    } else if msg.migrate_from_chat_id().is_some() {
        ContentType::MigrateFromChatId
    } else {
        ContentType::Other
    }
}

fn message_kind(msg: &Message) -> MessageKind {
    if let Some(members) = msg.new_chat_members() {
        return MessageKind::NewChatMembers {
            joined: members.iter().map(|user| user.id.0).collect(),
        };
    }
    if let Some(new_id) = msg.migrate_to_chat_id() {
        return MessageKind::ChatMigratedTo {
            old_chat_id: msg.chat.id.0,
            new_chat_id: new_id.0,
        };
    }
    if let Some(old_id) = msg.migrate_from_chat_id() {
        return MessageKind::ChatMigratedFrom {
            old_chat_id: old_id.0,
            new_chat_id: msg.chat.id.0,
        };
    }

    match msg.forward_origin() {
        Some(MessageOrigin::Channel { chat, .. }) => MessageKind::ForwardedFromChannel {
            channel_id: chat.id.0,
        },
        // Anonymous group admins forward on behalf of the group itself.
        Some(MessageOrigin::Chat { sender_chat, .. }) => MessageKind::ForwardedFromChannel {
            channel_id: sender_chat.id.0,
        },
        Some(MessageOrigin::User { sender_user, .. }) => MessageKind::ForwardedFromUser {
            sender: ForwardedSender::Disclosed {
                user_id: sender_user.id.0,
                is_bot: sender_user.is_bot,
            },
        },
        // Only the fact that the sender is hidden is kept, never their display name.
        Some(MessageOrigin::HiddenUser { .. }) => MessageKind::ForwardedFromUser {
            sender: ForwardedSender::Hidden,
        },
        None => MessageKind::TextOrMedia,
    }
}

pub fn convert_message(msg: &Message) -> domain::Message {
    domain::Message {
        id: msg.id.0,
        chat: domain::Chat {
            id: msg.chat.id.0,
            kind: chat_kind(&msg.chat),
        },
        text: msg.text().map(str::to_string),
        content_type: content_type(msg),
        kind: message_kind(msg),
    }
}

pub fn convert_inline_query(query: &InlineQuery) -> domain::InlineQuery {
    domain::InlineQuery {
        id: query.id.to_string(),
        from_user_id: query.from.id.0,
        query: query.query.clone(),
    }
}

/// Publish the command list shown in the client's command menu.
pub async fn register_commands(bot: &Bot) {
    let commands = domain::Command::ALL
        .iter()
        .map(|cmd| BotCommand::new(cmd.name(), cmd.description()));

    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("Failed to register bot commands: {}", e);
    }
}

/// Run long polling until interrupted.
pub async fn run(bot: Bot, router: Arc<Router>, skip_pending_updates: bool) -> Result<()> {
    info!("Starting Telegram platform...");

    if skip_pending_updates {
        bot.delete_webhook()
            .drop_pending_updates(true)
            .await
            .context("Failed to drop pending updates")?;
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_inline_query().endpoint(handle_inline_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|upd| async move {
            trace!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, router: Arc<Router>) -> ResponseResult<()> {
    let outcome = router
        .dispatch(domain::Update::Message(convert_message(&msg)))
        .await;
    trace!("Message {} handled by {:?}", msg.id.0, outcome.rule());
    Ok(())
}

async fn handle_inline_query(query: InlineQuery, router: Arc<Router>) -> ResponseResult<()> {
    router
        .dispatch(domain::Update::InlineQuery(convert_inline_query(&query)))
        .await;
    Ok(())
}
