use thiserror::Error;

/// Why an outbound reply could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("recipient has blocked the bot")]
    RecipientBlocked,

    #[error("chat was migrated to {new_chat_id}")]
    ChatMigrated { new_chat_id: i64 },

    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),
}
