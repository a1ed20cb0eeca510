//! Mock transport for unit testing without a Discord connection.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! discord-commands = { path = "...", features = ["test-support"] }
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::command::CommandDefinition;
use crate::transport::{Interaction, InteractionEvent, Scope, Transport};

const EVENT_BUFFER: usize = 64;

/// One outbound call observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Open,
    Acknowledge { interaction_id: u64 },
    EditResponse { interaction_id: u64, content: String },
    BulkOverwrite { scope: Scope, commands: Vec<String> },
    Close,
}

#[derive(Debug)]
pub struct MockTransportError(pub &'static str);

impl std::fmt::Display for MockTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockTransportError {}

struct MockState {
    calls: Mutex<Vec<TransportCall>>,
    events_tx: Mutex<Option<mpsc::Sender<InteractionEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<InteractionEvent>>>,
    fail_open: AtomicBool,
    fail_ack: AtomicBool,
    fail_edit: AtomicBool,
    fail_publish: AtomicBool,
    fail_close: AtomicBool,
}

/// Records every transport call in order. Clones share state, so a test can
/// keep one handle while the bot owns another.
///
/// Events queued with [`MockTransport::push_event`] are delivered through the
/// receiver returned by the first `open`.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(MockState {
                calls: Mutex::new(Vec::new()),
                events_tx: Mutex::new(Some(events_tx)),
                events_rx: Mutex::new(Some(events_rx)),
                fail_open: AtomicBool::new(false),
                fail_ack: AtomicBool::new(false),
                fail_edit: AtomicBool::new(false),
                fail_publish: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
            }),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    /// Content of every `edit_response` call, in order.
    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::EditResponse { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.calls.lock().unwrap().clear();
    }

    /// Queue an inbound event for the bot's event loop.
    pub fn push_event(&self, event: InteractionEvent) {
        self.state
            .events_tx
            .lock()
            .unwrap()
            .as_ref()
            .expect("event stream closed")
            .try_send(event)
            .expect("mock event buffer full");
    }

    /// Drop the sending side, so the event stream ends once queued events
    /// are drained, as when the gateway task dies.
    pub fn close_events(&self) {
        self.state.events_tx.lock().unwrap().take();
    }

    /// Poll until `done` holds for the recorded calls.
    pub async fn wait_for(&self, done: impl Fn(&[TransportCall]) -> bool) {
        loop {
            if done(&self.state.calls.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn fail_open(&self) {
        self.state.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_ack(&self) {
        self.state.fail_ack.store(true, Ordering::SeqCst);
    }

    pub fn fail_edit(&self) {
        self.state.fail_edit.store(true, Ordering::SeqCst);
    }

    pub fn fail_publish(&self) {
        self.state.fail_publish.store(true, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.state.fail_close.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: TransportCall) {
        self.state.calls.lock().unwrap().push(call);
    }
}

impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn open(&self) -> Result<mpsc::Receiver<InteractionEvent>, MockTransportError> {
        self.record(TransportCall::Open);
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(MockTransportError("gateway unreachable"));
        }
        self.state
            .events_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(MockTransportError("already opened"))
    }

    async fn acknowledge(&self, interaction: &Interaction) -> Result<(), MockTransportError> {
        self.record(TransportCall::Acknowledge {
            interaction_id: interaction.id,
        });
        if self.state.fail_ack.load(Ordering::SeqCst) {
            return Err(MockTransportError("unknown interaction"));
        }
        Ok(())
    }

    async fn edit_response(
        &self,
        interaction: &Interaction,
        content: &str,
    ) -> Result<(), MockTransportError> {
        self.record(TransportCall::EditResponse {
            interaction_id: interaction.id,
            content: content.to_string(),
        });
        if self.state.fail_edit.load(Ordering::SeqCst) {
            return Err(MockTransportError("unknown webhook"));
        }
        Ok(())
    }

    async fn bulk_overwrite_commands(
        &self,
        scope: &Scope,
        commands: &[CommandDefinition],
    ) -> Result<(), MockTransportError> {
        self.record(TransportCall::BulkOverwrite {
            scope: *scope,
            commands: commands.iter().map(|c| c.name.clone()).collect(),
        });
        if self.state.fail_publish.load(Ordering::SeqCst) {
            return Err(MockTransportError("missing access"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), MockTransportError> {
        self.record(TransportCall::Close);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(MockTransportError("already closed"));
        }
        Ok(())
    }
}
