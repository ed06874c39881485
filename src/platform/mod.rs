pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

/// A text message received from a user; lives for one handler invocation.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
    /// Message that replies should quote; set in group chats only.
    pub reply_to: Option<MessageId>,
}

/// Outbound chat operations the router needs.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message and return its id.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId>;

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        image: Vec<u8>,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<()>;
}
