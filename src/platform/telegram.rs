use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatMemberStatus, InputFile, MessageEntityKind, MessageId, Recipient, ReplyParameters,
};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::bot::{MessageRouter, HELP_TEXT, START_TEXT};
use crate::config::Config;
use crate::image::ImageClient;
use crate::llm::ChatClient;
use crate::platform::{IncomingMessage, Messenger};
use crate::subscription::{MembershipLookup, MembershipStatus, SubscriptionChecker};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show usage")]
    Help,
}

impl Command {
    /// Fixed reply; commands carry no state.
    pub fn reply_text(&self) -> &'static str {
        match self {
            Command::Start => START_TEXT,
            Command::Help => HELP_TEXT,
        }
    }
}

/// [`Messenger`] backed by the Bot API.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId> {
        let mut request = self.bot.send_message(chat_id, text);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id));
        }
        let sent = request.await.context("Failed to send message")?;
        Ok(sent.id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .await
            .context("Failed to edit message")?;
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.bot
            .delete_message(chat_id, message_id)
            .await
            .context("Failed to delete message")?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        image: Vec<u8>,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .send_photo(chat_id, InputFile::memory(image).file_name("image.png"))
            .caption(caption);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id));
        }
        request.await.context("Failed to send photo")?;
        Ok(())
    }
}

/// [`MembershipLookup`] via `getChatMember`. The bot must be an admin of the channel.
pub struct TelegramMembership {
    bot: Bot,
}

impl TelegramMembership {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipLookup for TelegramMembership {
    async fn status(&self, channel: &str, user_id: UserId) -> Result<MembershipStatus> {
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel), user_id)
            .await
            .with_context(|| format!("getChatMember failed for {}", channel))?;
        Ok(membership_status(member.kind.status()))
    }
}

/// Numeric ids address the chat directly, anything else is a public `@username`.
pub fn channel_recipient(channel: &str) -> Recipient {
    let channel = channel.trim();
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if channel.starts_with('@') => Recipient::ChannelUsername(channel.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{}", channel)),
    }
}

fn membership_status(status: ChatMemberStatus) -> MembershipStatus {
    match status {
        ChatMemberStatus::Owner => MembershipStatus::Creator,
        ChatMemberStatus::Administrator => MembershipStatus::Administrator,
        ChatMemberStatus::Member => MembershipStatus::Member,
        ChatMemberStatus::Restricted => MembershipStatus::Restricted,
        ChatMemberStatus::Left => MembershipStatus::Left,
        ChatMemberStatus::Banned => MembershipStatus::Kicked,
    }
}

/// A message is a command when it opens with a `bot_command` entity.
///
/// Text like "/رسم قطة" carries no such entity and goes to the router.
fn is_command(msg: &Message) -> bool {
    msg.entities().is_some_and(|entities| {
        entities
            .iter()
            .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand))
    })
}

/// Replies quote the request in groups; private chats get plain messages.
fn reply_target(msg: &Message) -> Option<MessageId> {
    if msg.chat.is_private() {
        None
    } else {
        Some(msg.id)
    }
}

fn build_router(bot: &Bot, config: &Config) -> MessageRouter {
    let subscription = SubscriptionChecker::new(
        Arc::new(TelegramMembership::new(bot.clone())),
        config.telegram.required_channel.clone(),
    );
    MessageRouter::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        subscription,
        Arc::new(ChatClient::new(config.openai.clone(), config.chat.clone())),
        Arc::new(ImageClient::new(config.openai.clone(), config.image.clone())),
        &config.image.keywords,
    )
}

/// Run the Telegram bot until the process is stopped
pub async fn run(config: Config) -> Result<()> {
    let bot = Bot::new(&config.telegram.bot_token);
    let router = Arc::new(build_router(&bot, &config));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            Message::filter_text()
                .filter(|msg: Message| !is_command(&msg))
                .endpoint(handle_text),
        );

    info!("Bot started!");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<()> {
    TelegramMessenger::new(bot)
        .send_text(msg.chat.id, cmd.reply_text(), reply_target(&msg))
        .await?;
    Ok(())
}

async fn handle_text(msg: Message, text: String, router: Arc<MessageRouter>) -> Result<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    info!(
        "Telegram message from {} ({}): {}",
        user.first_name, user.id.0, text
    );

    let incoming = IncomingMessage {
        chat_id: msg.chat.id,
        user_id: user.id,
        text,
        reply_to: reply_target(&msg),
    };

    router.handle(&incoming).await?;
    Ok(())
}
