//! Bot lifecycle: connect, publish commands, dispatch until shutdown, clean up.

#[path = "bot_tests.rs"]
mod bot_tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command::{CommandContext, CommandSpec, OptionSpec};
use crate::dispatcher::{Dispatcher, SharedTimeout};
use crate::error::{Error, Result};
use crate::gateway::SerenityTransport;
use crate::registry::Registry;
use crate::signal::{self, ShutdownReason};
use crate::transport::{Scope, Transport};

/// A slash-command bot.
///
/// Commands are added through `&mut self` before [`Bot::start`]; the timeout
/// can be changed at any time and applies to invocations dispatched afterwards.
pub struct Bot<T: Transport = SerenityTransport> {
    transport: Arc<T>,
    registry: Registry<T>,
    scope: Scope,
    timeout: SharedTimeout,
}

impl Bot<SerenityTransport> {
    /// Build a bot on the serenity gateway.
    ///
    /// `target_scope` is empty for global commands or a guild id to publish
    /// commands to that guild only.
    pub fn new(token: &str, target_scope: &str) -> Result<Self> {
        let scope = Scope::from_target(target_scope)
            .ok_or_else(|| Error::InvalidScope(target_scope.to_string()))?;
        let transport =
            SerenityTransport::new(token).map_err(|e| Error::ConnectionInit(Box::new(e)))?;
        Ok(Self::with_transport(transport, scope))
    }
}

impl<T: Transport> Bot<T> {
    pub fn with_transport(transport: T, scope: Scope) -> Self {
        Self {
            transport: Arc::new(transport),
            registry: Registry::new(),
            scope,
            timeout: SharedTimeout::default(),
        }
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn register(&mut self, spec: CommandSpec<T>) -> Result<()> {
        self.registry.register(spec)
    }

    /// Declare a command and the handler that answers it.
    pub fn add_command<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        options: Vec<OptionSpec>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(CommandContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.register(CommandSpec::new(name, description, options, handler))
    }

    /// Run the bot until `shutdown` is cancelled or the process receives
    /// SIGINT/SIGTERM.
    ///
    /// Returns `Error::ConnectionOpen` without publishing anything if the
    /// connection cannot be opened, `Error::Cancelled` when the token ended
    /// the run and `Ok(())` on a signal. Either way the published commands
    /// are cleared and the connection closed before returning. In-flight
    /// invocations are not drained; their edits may land after the close.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        self.run_until(shutdown, signal::os_signal()).await
    }

    pub(crate) async fn run_until(
        &self,
        shutdown: CancellationToken,
        interrupt: impl Future<Output = ()>,
    ) -> Result<()> {
        let mut events = match self.transport.open().await {
            Ok(events) => events,
            Err(e) => {
                let err = Error::ConnectionOpen(Box::new(e));
                error!("{}", err);
                return Err(err);
            }
        };
        info!(scope = %self.scope, commands = self.registry.len(), "Connection open");

        self.publish_commands().await;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.transport),
            Arc::new(self.registry.clone()),
            self.timeout.clone(),
        ));

        let shutdown_requested = signal::shutdown_requested(&shutdown, interrupt);
        tokio::pin!(shutdown_requested);

        let mut events_open = true;
        let reason = loop {
            tokio::select! {
                reason = &mut shutdown_requested => break reason,
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            dispatcher.dispatch(event).await;
                        });
                    }
                    None => {
                        warn!("Gateway event stream ended; waiting for shutdown");
                        events_open = false;
                    }
                },
            }
        };

        if reason == ShutdownReason::Cancelled {
            info!("context cancelled");
        }

        self.retract_commands().await;

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Error closing connection");
        }
        info!("Connection closed");

        match reason {
            ShutdownReason::Cancelled => Err(Error::Cancelled),
            ShutdownReason::Signal => Ok(()),
        }
    }

    async fn publish_commands(&self) {
        let definitions = self.registry.definitions();
        match self
            .transport
            .bulk_overwrite_commands(&self.scope, &definitions)
            .await
        {
            Ok(()) => info!(scope = %self.scope, count = definitions.len(), "Published commands"),
            Err(e) => error!("{}", Error::Publication(Box::new(e))),
        }
    }

    async fn retract_commands(&self) {
        match self.transport.bulk_overwrite_commands(&self.scope, &[]).await {
            Ok(()) => info!(scope = %self.scope, "Cleared published commands"),
            Err(e) => error!("{}", Error::Retraction(Box::new(e))),
        }
    }
}
