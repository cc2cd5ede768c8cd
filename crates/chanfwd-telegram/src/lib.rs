//! Telegram adapters.
//!
//! `TelegramMessenger` implements the `chanfwd-core` MessagingPort over the Bot API
//! (teloxide); `web::WebPreviewSource` reads public channels through their
//! `t.me/s/<name>` preview pages.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

pub mod web;

use chanfwd_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    /// Errors tied to the message itself become `Rejected`; everything else may
    /// succeed on a later attempt.
    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Api(
                ApiError::MessageIsTooLong
                | ApiError::MessageTextIsEmpty
                | ApiError::CantParseEntities,
            ) => Error::Rejected(format!("telegram error: {e}")),
            other => Error::Delivery(format!("telegram error: {other}")),
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn check_chat(&self, chat_id: ChatId) -> Result<()> {
        self.bot
            .get_chat(Self::tg_chat(chat_id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        // No retry here: a failed send is picked up again on the next poll.
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), html.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}
