//! Command declarations, option values and the per-invocation handler context.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::bot::Bot;
use crate::error::{Error, Result};
use crate::transport::{Interaction, Transport};

const MAX_NAME_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 100;
const MAX_OPTIONS: usize = 25;
const MAX_CHOICES: usize = 25;

/// Declared type of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

/// A fixed choice offered for a string option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionChoice {
    pub name: String,
    pub value: String,
}

/// Declared parameter of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub choices: Vec<OptionChoice>,
}

impl OptionSpec {
    pub fn new(kind: OptionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// The part of a command that is published to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub options: Vec<OptionSpec>,
}

impl CommandDefinition {
    /// Check the definition against the platform's naming and size limits.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name).map_err(|reason| Error::invalid_command(&self.name, reason))?;
        validate_description(&self.description)
            .map_err(|reason| Error::invalid_command(&self.name, reason))?;

        if self.options.len() > MAX_OPTIONS {
            return Err(Error::invalid_command(
                &self.name,
                format!("at most {MAX_OPTIONS} options are allowed"),
            ));
        }

        let mut seen_optional = false;
        for (i, opt) in self.options.iter().enumerate() {
            validate_name(&opt.name).map_err(|reason| {
                Error::invalid_command(&self.name, format!("option '{}': {reason}", opt.name))
            })?;
            validate_description(&opt.description).map_err(|reason| {
                Error::invalid_command(&self.name, format!("option '{}': {reason}", opt.name))
            })?;
            if self.options[..i].iter().any(|o| o.name == opt.name) {
                return Err(Error::invalid_command(
                    &self.name,
                    format!("option '{}' declared twice", opt.name),
                ));
            }
            if opt.required && seen_optional {
                return Err(Error::invalid_command(
                    &self.name,
                    format!("required option '{}' follows an optional one", opt.name),
                ));
            }
            seen_optional |= !opt.required;
            if !opt.choices.is_empty() && opt.kind != OptionKind::String {
                return Err(Error::invalid_command(
                    &self.name,
                    format!("option '{}': choices are only supported on strings", opt.name),
                ));
            }
            if opt.choices.len() > MAX_CHOICES {
                return Err(Error::invalid_command(
                    &self.name,
                    format!("option '{}': at most {MAX_CHOICES} choices", opt.name),
                ));
            }
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(format!("name must be 1-{MAX_NAME_LEN} characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("name may only contain lowercase letters, digits, '-' and '_'".to_string());
    }
    Ok(())
}

fn validate_description(description: &str) -> std::result::Result<(), String> {
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        return Err(format!("description must be 1-{MAX_DESCRIPTION_LEN} characters"));
    }
    Ok(())
}

/// Value supplied for a command option.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOptionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    User(u64),
    Channel(u64),
    Role(u64),
    Mentionable(u64),
    Number(f64),
    Attachment(u64),
}

/// A supplied option as it arrives on the event.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOption {
    pub name: String,
    pub value: CommandOptionValue,
}

/// Options of one invocation, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap(HashMap<String, CommandOptionValue>);

impl ParameterMap {
    pub fn from_options(options: Vec<CommandOption>) -> Self {
        options.into_iter().collect()
    }

    pub fn get(&self, name: &str) -> Option<&CommandOptionValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            CommandOptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            CommandOptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numbers and integers both read as `f64`.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            CommandOptionValue::Number(n) => Some(*n),
            CommandOptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            CommandOptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn user(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            CommandOptionValue::User(id) => Some(*id),
            _ => None,
        }
    }

    pub fn channel(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            CommandOptionValue::Channel(id) => Some(*id),
            _ => None,
        }
    }

    pub fn role(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            CommandOptionValue::Role(id) => Some(*id),
            _ => None,
        }
    }
}

impl FromIterator<CommandOption> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = CommandOption>>(iter: I) -> Self {
        Self(iter.into_iter().map(|opt| (opt.name, opt.value)).collect())
    }
}

/// Everything a handler gets for one invocation.
pub struct CommandContext<T> {
    pub transport: Arc<T>,
    pub interaction: Interaction,
    pub options: ParameterMap,
    /// Cancelled when the invocation times out. Handlers are never aborted;
    /// watching this token is how a long-running handler stops early.
    pub cancellation: CancellationToken,
}

impl<T> CommandContext<T> {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Type-erased command handler. Resolves to the final response; an empty
/// string means no edit is sent.
pub type Handler<T> = Arc<dyn Fn(CommandContext<T>) -> BoxFuture<'static, String> + Send + Sync>;

/// A registered command: what gets published plus the handler that runs it.
pub struct CommandSpec<T> {
    definition: CommandDefinition,
    handler: Handler<T>,
}

impl<T> CommandSpec<T> {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        options: Vec<OptionSpec>,
        handler: F,
    ) -> Self
    where
        F: Fn(CommandContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self {
            definition: CommandDefinition {
                name: name.into(),
                description: description.into(),
                options,
            },
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.definition.options
    }

    pub fn definition(&self) -> &CommandDefinition {
        &self.definition
    }

    pub fn handler(&self) -> &Handler<T> {
        &self.handler
    }
}

impl<T> Clone for CommandSpec<T> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T> std::fmt::Debug for CommandSpec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// A command declared as a value, bound to a bot in one call.
///
/// ```rust,no_run
/// use discord_commands::{Bot, Command};
///
/// # fn demo(bot: &mut Bot) -> discord_commands::Result<()> {
/// Command::new("ping", "Check that the bot is alive", |_ctx| async { "pong".to_string() })
///     .bind(bot)?;
/// # Ok(())
/// # }
/// ```
pub struct Command<T> {
    spec: CommandSpec<T>,
}

impl<T: Transport> Command<T> {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self {
            spec: CommandSpec::new(name, description, Vec::new(), handler),
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.spec.definition.options.push(option);
        self
    }

    /// Register this command on `bot`.
    pub fn bind(self, bot: &mut Bot<T>) -> Result<()> {
        bot.register(self.spec)
    }

    pub fn into_spec(self) -> CommandSpec<T> {
        self.spec
    }
}
