use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use ticketbot_core::{Attachment, Author, ChannelId, GuildId, InboundMessage, MessageId, UserId};

use super::relay_auth::RelayAuth;
use crate::dispatch::BotEvent;
use crate::error::AppError;
use crate::state::AppState;

/// A gateway dispatch as forwarded by the relay: event name and payload.
#[derive(Debug, Deserialize)]
pub struct GatewayEnvelope {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

#[derive(Debug, Deserialize)]
pub struct GatewayUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
pub struct GatewayAttachment {
    pub filename: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: GatewayUser,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<GatewayAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayChannel {
    pub id: String,
}

fn snowflake(raw: &str) -> Result<u64, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid snowflake: {raw}")))
}

impl TryFrom<GatewayMessage> for InboundMessage {
    type Error = AppError;

    fn try_from(msg: GatewayMessage) -> Result<Self, Self::Error> {
        Ok(InboundMessage {
            id: MessageId(snowflake(&msg.id)?),
            channel_id: ChannelId(snowflake(&msg.channel_id)?),
            guild_id: msg
                .guild_id
                .as_deref()
                .map(snowflake)
                .transpose()?
                .map(GuildId),
            author: Author {
                id: UserId(snowflake(&msg.author.id)?),
                name: msg.author.username,
                bot: msg.author.bot,
            },
            content: msg.content,
            attachments: msg
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    filename: a.filename,
                    url: a.url,
                })
                .collect(),
        })
    }
}

fn payload<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, AppError> {
    serde_json::from_value(data).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Queues one relayed gateway event for the bot.
///
/// Answers once the event is queued; the bot handles events one at a time
/// in the order they were accepted here.
pub async fn ingest(
    _relay: RelayAuth,
    State(state): State<AppState>,
    Json(envelope): Json<GatewayEnvelope>,
) -> Result<StatusCode, AppError> {
    let event = match envelope.t.as_str() {
        "MESSAGE_CREATE" => {
            let message: GatewayMessage = payload(envelope.d)?;
            BotEvent::Message(InboundMessage::try_from(message)?)
        }
        "CHANNEL_DELETE" => {
            let channel: GatewayChannel = payload(envelope.d)?;
            BotEvent::ChannelDeleted(ChannelId(snowflake(&channel.id)?))
        }
        other => {
            tracing::trace!("Ignoring gateway event {other}");
            return Ok(StatusCode::NO_CONTENT);
        }
    };
    state.events.push(event).await?;
    Ok(StatusCode::ACCEPTED)
}
