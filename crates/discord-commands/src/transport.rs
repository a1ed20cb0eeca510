//! The gateway seam.
//!
//! Everything the command core needs from Discord goes through [`Transport`]:
//! a stream of inbound interaction events and four outbound calls. The
//! serenity-backed implementation lives in [`crate::gateway`]; tests use
//! `mocks::MockTransport`.

use std::future::Future;

use tokio::sync::mpsc;

use crate::command::{CommandDefinition, CommandOption};

/// Interaction type as delivered by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
    Unknown,
}

/// Reference to a single interaction, enough to acknowledge and edit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub id: u64,
    pub token: String,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user_id: u64,
}

/// An inbound interaction event.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    pub interaction: Interaction,
    pub command_name: String,
    pub options: Vec<CommandOption>,
}

/// Deployment boundary for published commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Guild(u64),
}

impl Scope {
    /// Parse a target scope identifier: empty means global, anything else is a guild id.
    pub fn from_target(target: &str) -> Option<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Some(Scope::Global);
        }
        target.parse::<u64>().ok().filter(|id| *id != 0).map(Scope::Guild)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

/// Connection to the chat platform.
///
/// Outbound calls must be safe to make concurrently from many invocation tasks.
/// For any one interaction, `acknowledge` is called before `edit_response`, and
/// `edit_response` is called at most once.
pub trait Transport: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the connection and return the stream of inbound events.
    fn open(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<InteractionEvent>, Self::Error>> + Send;

    /// Reply with a deferred "thinking" response.
    fn acknowledge(
        &self,
        interaction: &Interaction,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Replace the content of the deferred response.
    fn edit_response(
        &self,
        interaction: &Interaction,
        content: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Replace the full set of published commands for `scope`.
    fn bulk_overwrite_commands(
        &self,
        scope: &Scope,
        commands: &[CommandDefinition],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
