//! Configuration for the discord-commands binary

#[path = "config_tests.rs"]
mod config_tests;

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatcher::DEFAULT_TIMEOUT;
use crate::transport::Scope;

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
}

/// Discord connection and command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal
    #[serde(default)]
    pub bot_token: String,
    /// Guild to publish commands to; empty publishes globally
    #[serde(default)]
    pub guild_id: String,
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
}

/// Environment lookup, injectable for tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_impl(&SystemEnv)
    }

    pub(crate) fn from_env_impl(env: &impl ReadEnv) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .context("DISCORD_BOT_TOKEN not set")?;

        let guild_id = env.var("DISCORD_GUILD_ID").unwrap_or_default();

        let command_timeout_secs = match env.var("DISCORD_COMMAND_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid DISCORD_COMMAND_TIMEOUT_SECS: {}", raw))?,
            None => default_timeout_secs(),
        };

        Ok(Config {
            discord: DiscordConfig {
                bot_token,
                guild_id,
                command_timeout_secs,
            },
        })
    }
}

impl DiscordConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Parsed publication scope, `None` if `guild_id` is not a valid guild id.
    pub fn scope(&self) -> Option<Scope> {
        Scope::from_target(&self.guild_id)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
