use async_trait::async_trait;

use crate::{
    domain::{Channel, SourceMessage},
    Result,
};

/// Hexagonal port for reading watched channels.
///
/// Implementations return `Error::ChannelInaccessible` when the channel is
/// private, missing, or otherwise unreadable, and any other variant for
/// transient failures.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Up to `limit` of the most recent posts. Order within the batch is unspecified.
    async fn fetch_recent(&self, channel: &Channel, limit: usize) -> Result<Vec<SourceMessage>>;
}
