//! Demo slash-command bot.
//!
//! Publishes `/ping`, `/echo` and `/sleep`, answers them until SIGINT/SIGTERM,
//! then clears the published commands and disconnects.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use discord_commands::config::Config;
use discord_commands::{Bot, OptionKind, OptionSpec};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Discord slash-command bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/discord-commands.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Guild to publish commands to; empty for global (overrides config file)
    #[arg(long, env = "DISCORD_GUILD_ID")]
    guild_id: Option<String>,

    /// Per-command response time limit in seconds (overrides config file)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discord_commands=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };

    if let Some(bot_token) = args.bot_token {
        config.discord.bot_token = bot_token;
    }
    if let Some(guild_id) = args.guild_id {
        config.discord.guild_id = guild_id;
    }
    if let Some(secs) = args.timeout_secs {
        config.discord.command_timeout_secs = secs;
    }

    let mut bot = Bot::new(&config.discord.bot_token, &config.discord.guild_id)
        .context("Failed to create bot")?;
    bot.set_timeout(config.discord.timeout());

    bot.add_command("ping", "Replies with pong", vec![], |_ctx| async {
        "pong".to_string()
    })?;

    bot.add_command(
        "echo",
        "Repeats your message",
        vec![OptionSpec::new(OptionKind::String, "message", "Text to repeat").required(true)],
        |ctx| async move {
            match ctx.options.str("message") {
                Some(message) => message.to_string(),
                None => "Nothing to echo".to_string(),
            }
        },
    )?;

    let limit = bot.timeout();
    bot.add_command(
        "sleep",
        "Waits before answering",
        vec![
            OptionSpec::new(OptionKind::Integer, "seconds", "How long to wait").required(true),
        ],
        move |ctx| async move {
            let secs = ctx.options.integer("seconds").unwrap_or(0).max(0) as u64;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    format!("Slept {secs}s (limit {}s)", limit.as_secs())
                }
                _ = ctx.cancellation.cancelled() => String::new(),
            }
        },
    )?;

    info!(scope = %bot.scope(), timeout = ?bot.timeout(), "Starting Discord bot");
    bot.start(CancellationToken::new()).await?;

    info!("Discord bot stopped");
    Ok(())
}
