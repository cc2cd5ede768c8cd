/// Core error type for the forwarder.
///
/// Adapter crates map their specific errors into this type so the poll loop
/// can tell a dead channel apart from a transient failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel {channel} is inaccessible: {reason}")]
    ChannelInaccessible { channel: String, reason: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The messenger refused this particular message; resending it will not help.
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn inaccessible(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelInaccessible {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
