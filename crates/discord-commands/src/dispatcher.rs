//! Interaction dispatcher.
//!
//! Runs the per-invocation protocol: deferred acknowledge, handler on its own
//! task raced against the timeout, then at most one edit of the deferred reply.

#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::command::{CommandContext, ParameterMap};
use crate::error::Error;
use crate::registry::Registry;
use crate::transport::{InteractionEvent, InteractionKind, Transport};

/// Final response when the handler does not finish in time.
pub const TIMEOUT_MESSAGE: &str = "⏱️ Response time limit exceeded";

/// Final response when the handler task panics.
pub const FAILURE_MESSAGE: &str = "⚠️ Command failed";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-invocation timeout shared between the bot and its dispatcher.
///
/// Read at dispatch time, so a change only affects invocations that start after it.
#[derive(Debug, Clone)]
pub struct SharedTimeout(Arc<AtomicU64>);

impl SharedTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(as_nanos(timeout))))
    }

    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, timeout: Duration) {
        self.0.store(as_nanos(timeout), Ordering::Relaxed);
    }
}

impl Default for SharedTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Nanoseconds, saturating at `u64::MAX` (about 584 years).
fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// How an interaction event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command invocation, or no command registered under that name.
    Ignored,
    /// The deferred acknowledge failed; the handler never ran.
    AckFailed,
    /// The handler returned an empty response; nothing was edited.
    Silent,
    /// The final response was written to the deferred message.
    Delivered { timed_out: bool },
    /// The final response could not be written.
    DeliveryFailed { timed_out: bool },
}

/// Routes interaction events to registered handlers.
pub struct Dispatcher<T> {
    transport: Arc<T>,
    registry: Arc<Registry<T>>,
    timeout: SharedTimeout,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: Arc<T>, registry: Arc<Registry<T>>, timeout: SharedTimeout) -> Self {
        Self {
            transport,
            registry,
            timeout,
        }
    }

    /// Handle one inbound event through to its terminal outcome.
    ///
    /// Never panics on transport failures; each one is logged and ends the
    /// invocation.
    pub async fn dispatch(&self, event: InteractionEvent) -> Outcome {
        if event.kind != InteractionKind::ApplicationCommand {
            return Outcome::Ignored;
        }

        let Some(spec) = self.registry.lookup(&event.command_name) else {
            debug!(command = %event.command_name, "No handler registered for command");
            return Outcome::Ignored;
        };

        let InteractionEvent {
            interaction,
            command_name,
            options,
            ..
        } = event;

        if let Err(e) = self.transport.acknowledge(&interaction).await {
            let err = Error::AckDelivery(Box::new(e));
            error!(command = %command_name, interaction_id = interaction.id, "{}", err);
            return Outcome::AckFailed;
        }

        let timeout = self.timeout.get();
        let cancellation = CancellationToken::new();
        let ctx = CommandContext {
            transport: Arc::clone(&self.transport),
            interaction: interaction.clone(),
            options: ParameterMap::from_options(options),
            cancellation: cancellation.clone(),
        };

        let (result_tx, result_rx) = oneshot::channel();
        let handler = Arc::clone(spec.handler());
        tokio::spawn(async move {
            // Receiver is gone after a timeout; the late result is dropped here.
            let _ = result_tx.send(handler(ctx).await);
        });

        let (response, timed_out) = match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(response)) => (response, false),
            Ok(Err(_)) => {
                error!(command = %command_name, "Command handler panicked");
                (FAILURE_MESSAGE.to_string(), false)
            }
            Err(_) => {
                cancellation.cancel();
                warn!(
                    command = %command_name,
                    timeout = ?timeout,
                    "Command timed out"
                );
                (TIMEOUT_MESSAGE.to_string(), true)
            }
        };

        if response.is_empty() {
            debug!(command = %command_name, "Command completed without a response");
            return Outcome::Silent;
        }

        match self.transport.edit_response(&interaction, &response).await {
            Ok(()) => {
                debug!(command = %command_name, timed_out, "Delivered command response");
                Outcome::Delivered { timed_out }
            }
            Err(e) => {
                let err = Error::ResponseDelivery(Box::new(e));
                error!(command = %command_name, interaction_id = interaction.id, "{}", err);
                Outcome::DeliveryFailed { timed_out }
            }
        }
    }
}
