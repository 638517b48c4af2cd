//! Identifiers, inbound message model and the messaging platform contract.
//!
//! The core never speaks a wire protocol. Everything it needs from the chat
//! platform is expressed by [`MessagingPlatform`]; terminal verification
//! outcomes go to an [`AuditSink`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::notice::Notice;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// A platform user.
    UserId
);
snowflake!(
    /// A text channel.
    ChannelId
);
snowflake!(
    /// A guild (server).
    GuildId
);
snowflake!(
    /// A message previously posted by the bot.
    MessageId
);

impl UserId {
    /// Mention markup that pings the user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

/// The sender of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub url: String,
}

/// A message received from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    /// Content trimmed and lowercased, the form app names and replies are matched in.
    pub fn folded_content(&self) -> String {
        self.content.trim().to_lowercase()
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Everything the platform needs to create a private ticket channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateChannelRequest {
    pub guild_id: GuildId,
    pub name: String,
    /// The only regular member allowed to see the channel.
    pub owner: UserId,
    /// Staff role granted visibility alongside the owner, if any.
    pub staff_role: Option<u64>,
}

/// Capabilities the core consumes from the chat platform.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Posts a notice and returns the id of the created message.
    async fn send_notice(&self, channel: ChannelId, notice: &Notice) -> BotResult<MessageId>;

    /// Replaces the content of a previously posted notice.
    async fn edit_notice(
        &self,
        channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> BotResult<()>;

    /// Creates a text channel visible only to the owner, the bot and staff.
    async fn create_private_channel(&self, request: &PrivateChannelRequest)
        -> BotResult<ChannelId>;

    async fn delete_channel(&self, channel: ChannelId) -> BotResult<()>;

    /// When the member joined the guild, or `None` if they are not a member.
    async fn member_joined_at(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> BotResult<Option<DateTime<Utc>>>;

    /// External authorization check for admin-only commands.
    async fn is_administrator(&self, guild: GuildId, user: UserId) -> BotResult<bool>;
}

/// A successful verification, kept for operator review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub user: UserId,
    pub app_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Receives terminal verification outcomes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> BotResult<()>;
}

/// Audit sink that posts a "ticket verified" notice into a log channel.
pub struct ChannelAuditLog {
    platform: Arc<dyn MessagingPlatform>,
    channel: ChannelId,
}

impl ChannelAuditLog {
    pub fn new(platform: Arc<dyn MessagingPlatform>, channel: ChannelId) -> Self {
        Self { platform, channel }
    }
}

#[async_trait]
impl AuditSink for ChannelAuditLog {
    async fn record(&self, record: &AuditRecord) -> BotResult<()> {
        let notice = Notice::ticket_verified(record);
        self.platform.send_notice(self.channel, &notice).await?;
        tracing::info!(
            user = %record.user,
            app = %record.app_name,
            "Audit record posted to log channel {}",
            self.channel
        );
        Ok(())
    }
}
