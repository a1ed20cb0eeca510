//! Command registry: the dispatch table and the list published to the gateway.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::command::{CommandDefinition, CommandSpec};
use crate::error::{Error, Result};

/// Registered commands, keyed by name, in registration order.
///
/// Only grows, and only through `&mut self`; once the bot starts the registry
/// is shared read-only behind an `Arc`.
pub struct Registry<T> {
    index: HashMap<String, usize>,
    specs: Vec<Arc<CommandSpec<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            specs: Vec::new(),
        }
    }

    /// Add a command. A name that is already registered is rejected.
    pub fn register(&mut self, spec: CommandSpec<T>) -> Result<()> {
        spec.definition().validate()?;
        if self.index.contains_key(spec.name()) {
            return Err(Error::DuplicateCommand(spec.name().to_string()));
        }

        debug!(command = %spec.name(), "Registered command");
        self.index.insert(spec.name().to_string(), self.specs.len());
        self.specs.push(Arc::new(spec));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<CommandSpec<T>>> {
        self.index.get(name).map(|&i| Arc::clone(&self.specs[i]))
    }

    pub fn snapshot(&self) -> Vec<Arc<CommandSpec<T>>> {
        self.specs.clone()
    }

    /// The publishable part of every command, in registration order.
    pub fn definitions(&self) -> Vec<CommandDefinition> {
        self.specs.iter().map(|s| s.definition().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            specs: self.specs.clone(),
        }
    }
}
