use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::types::{ChatId, MessageId};
use tracing::{debug, error, info, warn};

use crate::image::ImageResponder;
use crate::llm::TextResponder;
use crate::platform::{IncomingMessage, Messenger};
use crate::subscription::SubscriptionChecker;

pub const START_TEXT: &str = "🎨 أهلاً بك في بوت صور الأنمي!";
pub const HELP_TEXT: &str = "📖 استخدم /start للبدء";
pub const NOT_SUBSCRIBED_TEXT: &str = "⚠️ يرجى الاشتراك في القناة أولاً";
pub const PROCESSING_TEXT: &str = "🔄 جاري المعالجة...";
pub const IMAGE_FAILED_TEXT: &str = "❌ خطأ في التوليد";
pub const UNEXPECTED_ERROR_TEXT: &str = "❌ خطأ غير متوقع";

const TEXT_REPLY_MARKER: &str = "🤖";
const IMAGE_CAPTION_HEADER: &str = "🎨 تم الإنشاء بنجاح!";

/// Telegram rejects photo captions longer than this, counted in UTF-16 units.
const MAX_CAPTION_LEN: usize = 1024;

/// Which backend a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Image,
    Text,
}

impl Route {
    /// `keywords` must already be lowercase.
    pub fn classify(text: &str, keywords: &[String]) -> Self {
        let folded = text.to_lowercase();
        if keywords.iter().any(|k| folded.contains(k.as_str())) {
            Route::Image
        } else {
            Route::Text
        }
    }
}

/// How the handling of one message ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rejected,
    TextReplied,
    ImageSent,
    ImageFailed,
    Failed,
}

/// The transient "processing" message. Consumed by the edit or delete that replaces it,
/// so its id is never used twice.
struct Placeholder {
    chat_id: ChatId,
    message_id: MessageId,
}

impl Placeholder {
    async fn edit(self, messenger: &dyn Messenger, text: &str) -> Result<()> {
        messenger.edit_text(self.chat_id, self.message_id, text).await
    }

    async fn delete(self, messenger: &dyn Messenger) -> Result<()> {
        messenger.delete(self.chat_id, self.message_id).await
    }
}

/// Per-message pipeline: gate, placeholder, classify, generate, reply.
///
/// Holds no mutable state, so one router serves every concurrent update.
pub struct MessageRouter {
    messenger: Arc<dyn Messenger>,
    subscription: SubscriptionChecker,
    text: Arc<dyn TextResponder>,
    image: Arc<dyn ImageResponder>,
    keywords: Vec<String>,
}

impl MessageRouter {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        subscription: SubscriptionChecker,
        text: Arc<dyn TextResponder>,
        image: Arc<dyn ImageResponder>,
        keywords: &[String],
    ) -> Self {
        Self {
            messenger,
            subscription,
            text,
            image,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Handle one incoming text message.
    ///
    /// Errors are only returned when the rejection notice or the placeholder
    /// cannot be sent; anything after the placeholder exists ends in a reply.
    pub async fn handle(&self, incoming: &IncomingMessage) -> Result<Outcome> {
        let chat_id = incoming.chat_id;

        if !self.subscription.is_subscribed(incoming.user_id).await {
            info!(user_id = incoming.user_id.0, "Rejected: not subscribed");
            self.messenger
                .send_text(chat_id, NOT_SUBSCRIBED_TEXT, incoming.reply_to)
                .await?;
            return Ok(Outcome::Rejected);
        }

        let message_id = self
            .messenger
            .send_text(chat_id, PROCESSING_TEXT, incoming.reply_to)
            .await?;
        let mut placeholder = Some(Placeholder {
            chat_id,
            message_id,
        });

        match self.process(incoming, &mut placeholder).await {
            Ok(outcome) => {
                info!(user_id = incoming.user_id.0, ?outcome, "Message handled");
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    user_id = incoming.user_id.0,
                    "Unexpected error while handling message: {:#}", e
                );
                self.report_failure(incoming, placeholder).await;
                Ok(Outcome::Failed)
            }
        }
    }

    async fn process(
        &self,
        incoming: &IncomingMessage,
        placeholder: &mut Option<Placeholder>,
    ) -> Result<Outcome> {
        let route = Route::classify(&incoming.text, &self.keywords);
        debug!(user_id = incoming.user_id.0, ?route, "Routing message");

        match route {
            Route::Image => match self.image.generate(&incoming.text).await {
                Ok(image) => {
                    take_placeholder(placeholder)?
                        .delete(self.messenger.as_ref())
                        .await?;
                    let caption = image_caption(&incoming.text);
                    self.messenger
                        .send_photo(incoming.chat_id, image, &caption, incoming.reply_to)
                        .await?;
                    Ok(Outcome::ImageSent)
                }
                Err(e) => {
                    warn!(user_id = incoming.user_id.0, "Image generation failed: {:#}", e);
                    take_placeholder(placeholder)?
                        .edit(self.messenger.as_ref(), IMAGE_FAILED_TEXT)
                        .await?;
                    Ok(Outcome::ImageFailed)
                }
            },
            Route::Text => {
                let answer = self.text.respond(&incoming.text).await;
                take_placeholder(placeholder)?
                    .edit(
                        self.messenger.as_ref(),
                        &format!("{} {}", TEXT_REPLY_MARKER, answer),
                    )
                    .await?;
                Ok(Outcome::TextReplied)
            }
        }
    }

    /// Edits a placeholder that is still unused; once it was edited or deleted,
    /// the error goes out as a new message instead.
    async fn report_failure(&self, incoming: &IncomingMessage, placeholder: Option<Placeholder>) {
        let reported = match placeholder {
            Some(placeholder) => {
                placeholder
                    .edit(self.messenger.as_ref(), UNEXPECTED_ERROR_TEXT)
                    .await
            }
            None => self
                .messenger
                .send_text(incoming.chat_id, UNEXPECTED_ERROR_TEXT, incoming.reply_to)
                .await
                .map(|_| ()),
        };
        if let Err(e) = reported {
            warn!("Failed to report error to user: {:#}", e);
        }
    }
}

fn take_placeholder(placeholder: &mut Option<Placeholder>) -> Result<Placeholder> {
    placeholder.take().context("placeholder already consumed")
}

/// Success caption echoing the request, cut to Telegram's caption limit.
fn image_caption(text: &str) -> String {
    let caption = format!("{}\n{}", IMAGE_CAPTION_HEADER, text);
    if caption.encode_utf16().count() <= MAX_CAPTION_LEN {
        return caption;
    }
    let mut cut = String::new();
    let mut len = 0;
    for c in caption.chars() {
        // Leave room for the ellipsis.
        if len + c.len_utf16() > MAX_CAPTION_LEN - 1 {
            break;
        }
        len += c.len_utf16();
        cut.push(c);
    }
    cut.push('…');
    cut
}
