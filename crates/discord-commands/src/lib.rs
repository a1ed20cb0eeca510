//! Slash-command framework for Discord bots.
//!
//! Declare commands with their options and an async handler, then run the
//! bot: commands are published when the connection opens and cleared again on
//! shutdown. Every invocation is acknowledged right away and answered by
//! editing the deferred response, either with the handler's text or with
//! [`TIMEOUT_MESSAGE`] if the handler does not finish in time.
//!
//! ```no_run
//! use discord_commands::{Bot, OptionKind, OptionSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> discord_commands::Result<()> {
//! let mut bot = Bot::new("bot-token", "")?;
//! bot.add_command("ping", "Replies with pong", vec![], |_ctx| async {
//!     "pong".to_string()
//! })?;
//! bot.add_command(
//!     "echo",
//!     "Echo text back",
//!     vec![OptionSpec::new(OptionKind::String, "message", "Text to echo").required(true)],
//!     |ctx| async move { ctx.options.str("message").unwrap_or_default().to_string() },
//! )?;
//! bot.start(CancellationToken::new()).await
//! # }
//! ```

pub mod bot;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod signal;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use bot::Bot;
pub use command::{
    Command, CommandContext, CommandDefinition, CommandOptionValue, CommandSpec, OptionKind,
    OptionSpec, ParameterMap,
};
pub use dispatcher::{Outcome, FAILURE_MESSAGE, TIMEOUT_MESSAGE};
pub use error::{Error, Result};
pub use gateway::{GatewayError, SerenityTransport};
pub use transport::{Interaction, InteractionEvent, InteractionKind, Scope, Transport};
