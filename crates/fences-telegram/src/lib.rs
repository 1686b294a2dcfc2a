//! Telegram adapter (teloxide).
//!
//! Implements the `fences-core` DeliveryPort over the Telegram Bot API and
//! hosts the polling dispatcher that feeds updates into the engine.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

use fences_core::{
    domain::ChatId,
    errors::Error,
    messaging::{port::DeliveryPort, types::Chunk},
    Result,
};

pub mod handlers;
pub mod router;

#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Delivery(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl DeliveryPort for TelegramDelivery {
    async fn deliver(&self, chat: ChatId, chunk: &Chunk) -> Result<()> {
        match chunk {
            Chunk::Text(text) => {
                self.bot
                    .send_message(Self::tg_chat(chat), text.clone())
                    .await
                    .map_err(Self::map_err)?;
            }
            Chunk::Attachment { file_id, caption } => {
                let mut req = self
                    .bot
                    .send_document(Self::tg_chat(chat), InputFile::file_id(file_id.clone()));
                if let Some(caption) = caption {
                    req = req.caption(caption.clone());
                }
                req.await.map_err(Self::map_err)?;
            }
        }
        Ok(())
    }
}
