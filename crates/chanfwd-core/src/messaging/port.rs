use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::MessagingCapabilities,
    Result,
};

/// Destination messenger port.
///
/// Failures surface as `Error::Delivery` so the poll loop can keep the post
/// eligible for the next iteration.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Fails when the chat cannot be resolved by this messenger.
    async fn check_chat(&self, chat_id: ChatId) -> Result<()>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}
