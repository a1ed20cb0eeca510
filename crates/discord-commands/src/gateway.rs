//! Serenity-backed transport.
//!
//! Inbound events come from a serenity gateway client running on its own
//! task; outbound calls go through a separate `Http` handle so they can be
//! made (and tested) without a live gateway.

#[path = "gateway_tests.rs"]
mod gateway_tests;

use std::sync::Arc;
use std::time::Duration;

use serenity::async_trait;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::gateway::ShardManager;
use serenity::http::{Http, HttpBuilder};
use serenity::model::application::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType,
    Interaction as SerenityInteraction,
};
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::id::{ApplicationId, GuildId, InteractionId};
use serenity::prelude::{Client, Context, EventHandler};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{CommandDefinition, CommandOption, CommandOptionValue, OptionKind};
use crate::transport::{Interaction, InteractionEvent, InteractionKind, Scope, Transport};

const EVENT_BUFFER: usize = 256;
const READY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid bot token")]
    InvalidToken,

    #[error("Discord error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("gateway connection already open")]
    AlreadyOpen,

    #[error("gateway connection not open")]
    NotOpen,

    #[error("gateway closed before ready")]
    ClosedBeforeReady,

    #[error("gateway not ready after {0:?}")]
    ReadyTimeout(Duration),
}

struct Session {
    shard_manager: Arc<ShardManager>,
    runner: JoinHandle<()>,
}

/// [`Transport`] over the Discord gateway and REST API.
pub struct SerenityTransport {
    token: String,
    intents: GatewayIntents,
    http: Arc<Http>,
    session: Mutex<Option<Session>>,
}

impl SerenityTransport {
    /// Fails with `GatewayError::InvalidToken` if the token is malformed.
    pub fn new(token: &str) -> Result<Self, GatewayError> {
        serenity::utils::validate_token(token).map_err(|_| GatewayError::InvalidToken)?;
        let http = HttpBuilder::new(token).build();
        Ok(Self::with_http(token, Arc::new(http)))
    }

    /// Use an existing HTTP client for outbound calls.
    pub fn with_http(token: &str, http: Arc<Http>) -> Self {
        Self {
            token: token.to_string(),
            intents: GatewayIntents::GUILDS,
            http,
            session: Mutex::new(None),
        }
    }

    pub fn intents(mut self, intents: GatewayIntents) -> Self {
        self.intents = intents;
        self
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }
}

impl Transport for SerenityTransport {
    type Error = GatewayError;

    async fn open(&self) -> Result<mpsc::Receiver<InteractionEvent>, GatewayError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(GatewayError::AlreadyOpen);
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();
        let handler = GatewayHandler {
            events: events_tx,
            ready: std::sync::Mutex::new(Some(ready_tx)),
        };

        let mut client = Client::builder(&self.token, self.intents)
            .event_handler(handler)
            .await?;
        let shard_manager = Arc::clone(&client.shard_manager);

        info!("Starting Discord gateway connection...");
        let runner = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "Discord client error");
            }
        });

        let application_id = match tokio::time::timeout(READY_TIMEOUT, ready_rx).await {
            Ok(Ok(id)) => id,
            Ok(Err(_)) => {
                runner.abort();
                return Err(GatewayError::ClosedBeforeReady);
            }
            Err(_) => {
                shard_manager.shutdown_all().await;
                runner.abort();
                return Err(GatewayError::ReadyTimeout(READY_TIMEOUT));
            }
        };

        self.http.set_application_id(application_id);
        *session = Some(Session {
            shard_manager,
            runner,
        });
        Ok(events_rx)
    }

    async fn acknowledge(&self, interaction: &Interaction) -> Result<(), GatewayError> {
        let response = CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new());
        self.http
            .create_interaction_response(
                InteractionId::new(interaction.id),
                &interaction.token,
                &response,
                Vec::new(),
            )
            .await?;
        Ok(())
    }

    async fn edit_response(
        &self,
        interaction: &Interaction,
        content: &str,
    ) -> Result<(), GatewayError> {
        let edit = EditInteractionResponse::new().content(content);
        self.http
            .edit_original_interaction_response(&interaction.token, &edit, Vec::new())
            .await?;
        Ok(())
    }

    async fn bulk_overwrite_commands(
        &self,
        scope: &Scope,
        commands: &[CommandDefinition],
    ) -> Result<(), GatewayError> {
        let commands: Vec<CreateCommand> = commands.iter().map(create_command).collect();
        let published = match scope {
            Scope::Global => self.http.create_global_commands(&commands).await?,
            Scope::Guild(id) => {
                self.http
                    .create_guild_commands(GuildId::new(*id), &commands)
                    .await?
            }
        };
        debug!(%scope, count = published.len(), "Bulk overwrite accepted");
        Ok(())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let Some(session) = self.session.lock().await.take() else {
            return Err(GatewayError::NotOpen);
        };

        session.shard_manager.shutdown_all().await;
        if let Err(e) = session.runner.await {
            warn!(error = %e, "Discord client task ended abnormally");
        }
        Ok(())
    }
}

struct GatewayHandler {
    events: mpsc::Sender<InteractionEvent>,
    ready: std::sync::Mutex<Option<oneshot::Sender<ApplicationId>>>,
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "Discord bot connected");
        let ready_tx = self.ready.lock().ok().and_then(|mut slot| slot.take());
        if let Some(tx) = ready_tx {
            let _ = tx.send(ready.application.id);
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: SerenityInteraction) {
        if self.events.send(convert_interaction(&interaction)).await.is_err() {
            debug!("Interaction dropped: event receiver closed");
        }
    }
}

pub(crate) fn convert_interaction(interaction: &SerenityInteraction) -> InteractionEvent {
    match interaction {
        SerenityInteraction::Command(cmd) => command_event(InteractionKind::ApplicationCommand, cmd),
        SerenityInteraction::Autocomplete(cmd) => command_event(InteractionKind::Autocomplete, cmd),
        other => {
            let kind = match other {
                SerenityInteraction::Ping(_) => InteractionKind::Ping,
                SerenityInteraction::Component(_) => InteractionKind::MessageComponent,
                SerenityInteraction::Modal(_) => InteractionKind::ModalSubmit,
                _ => InteractionKind::Unknown,
            };
            InteractionEvent {
                kind,
                interaction: Interaction {
                    id: other.id().get(),
                    token: other.token().to_string(),
                    guild_id: other.guild_id().map(|g| g.get()),
                    channel_id: 0,
                    user_id: 0,
                },
                command_name: String::new(),
                options: Vec::new(),
            }
        }
    }
}

fn command_event(kind: InteractionKind, cmd: &CommandInteraction) -> InteractionEvent {
    let options = cmd
        .data
        .options
        .iter()
        .filter_map(|opt| match convert_option_value(&opt.value) {
            Some(value) => Some(CommandOption {
                name: opt.name.clone(),
                value,
            }),
            None => {
                debug!(command = %cmd.data.name, option = %opt.name, "Skipping unsupported option");
                None
            }
        })
        .collect();

    InteractionEvent {
        kind,
        interaction: Interaction {
            id: cmd.id.get(),
            token: cmd.token.clone(),
            guild_id: cmd.guild_id.map(|g| g.get()),
            channel_id: cmd.channel_id.get(),
            user_id: cmd.user.id.get(),
        },
        command_name: cmd.data.name.clone(),
        options,
    }
}

pub(crate) fn convert_option_value(value: &CommandDataOptionValue) -> Option<CommandOptionValue> {
    let converted = match value {
        CommandDataOptionValue::String(s) => CommandOptionValue::String(s.clone()),
        CommandDataOptionValue::Integer(i) => CommandOptionValue::Integer(*i),
        CommandDataOptionValue::Boolean(b) => CommandOptionValue::Boolean(*b),
        CommandDataOptionValue::Number(n) => CommandOptionValue::Number(*n),
        CommandDataOptionValue::User(id) => CommandOptionValue::User(id.get()),
        CommandDataOptionValue::Channel(id) => CommandOptionValue::Channel(id.get()),
        CommandDataOptionValue::Role(id) => CommandOptionValue::Role(id.get()),
        CommandDataOptionValue::Mentionable(id) => CommandOptionValue::Mentionable(id.get()),
        CommandDataOptionValue::Attachment(id) => CommandOptionValue::Attachment(id.get()),
        _ => return None,
    };
    Some(converted)
}

pub(crate) fn create_command(definition: &CommandDefinition) -> CreateCommand {
    definition.options.iter().fold(
        CreateCommand::new(&definition.name).description(&definition.description),
        |command, opt| {
            let option = opt.choices.iter().fold(
                CreateCommandOption::new(option_type(opt.kind), &opt.name, &opt.description)
                    .required(opt.required),
                |option, choice| option.add_string_choice(&choice.name, &choice.value),
            );
            command.add_option(option)
        },
    )
}

fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::Boolean => CommandOptionType::Boolean,
        OptionKind::User => CommandOptionType::User,
        OptionKind::Channel => CommandOptionType::Channel,
        OptionKind::Role => CommandOptionType::Role,
        OptionKind::Mentionable => CommandOptionType::Mentionable,
        OptionKind::Number => CommandOptionType::Number,
        OptionKind::Attachment => CommandOptionType::Attachment,
    }
}
