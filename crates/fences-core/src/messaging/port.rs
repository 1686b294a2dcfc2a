use async_trait::async_trait;

use crate::{domain::ChatId, messaging::types::Chunk, Result};

/// Outbound delivery port used by the broadcast dispatcher.
///
/// Telegram is the first implementation; the shape is deliberately small so
/// other messengers can fit behind it.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn deliver(&self, chat: ChatId, chunk: &Chunk) -> Result<()>;
}
