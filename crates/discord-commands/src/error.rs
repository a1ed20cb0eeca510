//! Error types for discord-commands

use thiserror::Error;

/// Boxed transport error, kept opaque so `Error` does not depend on the transport type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for command registration, dispatch and the bot lifecycle.
///
/// Only `ConnectionInit`, `InvalidScope`, `ConnectionOpen` and `Cancelled` are
/// returned to callers of [`crate::Bot`]. The delivery and publication variants
/// are logged where they happen and never abort the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate command: {0}")]
    DuplicateCommand(String),

    #[error("invalid command '{name}': {reason}")]
    InvalidCommand { name: String, reason: String },

    #[error("invalid target scope '{0}': expected empty or a guild id")]
    InvalidScope(String),

    #[error("error creating session: {0}")]
    ConnectionInit(#[source] BoxError),

    #[error("error opening connection: {0}")]
    ConnectionOpen(#[source] BoxError),

    #[error("error sending deferred response: {0}")]
    AckDelivery(#[source] BoxError),

    #[error("error editing interaction response: {0}")]
    ResponseDelivery(#[source] BoxError),

    #[error("failed to publish commands: {0}")]
    Publication(#[source] BoxError),

    #[error("error cleaning up commands: {0}")]
    Retraction(#[source] BoxError),

    #[error("context cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid_command(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
