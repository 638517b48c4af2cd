//! Messaging platform backed by the Discord HTTP API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use ticketbot_core::{
    BotError, BotResult, ChannelId, GuildId, MessageId, MessagingPlatform, Notice,
    PrivateChannelRequest, UserId,
};

const ADMINISTRATOR: u64 = 1 << 3;
const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const ATTACH_FILES: u64 = 1 << 15;

const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct Member {
    joined_at: DateTime<Utc>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct Guild {
    owner_id: String,
}

#[derive(Deserialize)]
struct Role {
    id: String,
    permissions: String,
}

pub struct DiscordRest {
    client: reqwest::Client,
    api_base: String,
    token: String,
    bot_user: UserId,
}

impl DiscordRest {
    /// Builds the client and resolves the bot's own user id.
    pub async fn connect(api_base: &str, token: &str) -> anyhow::Result<Self> {
        let api_base = api_base.trim_end_matches('/');
        let client = reqwest::Client::new();
        let response = client
            .get(format!("{api_base}/users/@me"))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Discord token rejected: {}",
                response.status()
            ));
        }
        let me: Created = response.json().await?;
        let bot_user = UserId(me.id.parse()?);
        tracing::info!("Authenticated as bot user {bot_user}");
        Ok(Self {
            client,
            api_base: api_base.to_string(),
            token: token.to_string(),
            bot_user,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> BotResult<reqwest::Response> {
        let mut request = self
            .client
            .request(method.clone(), format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| BotError::Platform(format!("{method} {path}: {e}")))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> BotResult<T> {
        let response = self.send(method.clone(), path, body).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Platform(format!("{method} {path}: {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| BotError::Platform(format!("{method} {path}: {e}")))
    }

    async fn member(&self, guild: GuildId, user: UserId) -> BotResult<Option<Member>> {
        let path = format!("/guilds/{guild}/members/{user}");
        let response = self.send(Method::GET, &path, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| BotError::Platform(format!("GET {path}: {e}"))),
            status => Err(BotError::Platform(format!("GET {path}: {status}"))),
        }
    }
}

fn parse_id(raw: &str) -> BotResult<u64> {
    raw.parse()
        .map_err(|_| BotError::Platform(format!("malformed snowflake: {raw}")))
}

/// Discord embed object for a notice.
pub fn embed(notice: &Notice) -> Value {
    let mut embed = json!({
        "title": notice.title,
        "description": notice.description,
        "color": notice.tone.rgb(),
    });
    if !notice.fields.is_empty() {
        embed["fields"] = notice
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": true }))
            .collect();
    }
    if let Some(timestamp) = notice.timestamp {
        embed["timestamp"] = json!(timestamp.to_rfc3339());
    }
    embed
}

/// Request body creating a text channel hidden from everyone but the owner,
/// the bot and staff.
pub fn private_channel_body(request: &PrivateChannelRequest, bot_user: UserId) -> Value {
    // The @everyone role shares the guild's id.
    let mut overwrites = vec![
        json!({
            "id": request.guild_id.to_string(),
            "type": OVERWRITE_ROLE,
            "deny": VIEW_CHANNEL.to_string(),
        }),
        json!({
            "id": request.owner.to_string(),
            "type": OVERWRITE_MEMBER,
            "allow": (VIEW_CHANNEL | SEND_MESSAGES | ATTACH_FILES).to_string(),
        }),
        json!({
            "id": bot_user.to_string(),
            "type": OVERWRITE_MEMBER,
            "allow": VIEW_CHANNEL.to_string(),
        }),
    ];
    if let Some(role) = request.staff_role {
        overwrites.push(json!({
            "id": role.to_string(),
            "type": OVERWRITE_ROLE,
            "allow": (VIEW_CHANNEL | SEND_MESSAGES).to_string(),
        }));
    }
    json!({
        "name": request.name.to_lowercase(),
        "type": 0,
        "permission_overwrites": overwrites,
    })
}

#[async_trait]
impl MessagingPlatform for DiscordRest {
    async fn send_notice(&self, channel: ChannelId, notice: &Notice) -> BotResult<MessageId> {
        let body = json!({ "embeds": [embed(notice)] });
        let created: Created = self
            .call(Method::POST, &format!("/channels/{channel}/messages"), Some(&body))
            .await?;
        Ok(MessageId(parse_id(&created.id)?))
    }

    async fn edit_notice(
        &self,
        channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> BotResult<()> {
        let body = json!({ "embeds": [embed(notice)] });
        let _: Value = self
            .call(
                Method::PATCH,
                &format!("/channels/{channel}/messages/{message}"),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn create_private_channel(
        &self,
        request: &PrivateChannelRequest,
    ) -> BotResult<ChannelId> {
        let body = private_channel_body(request, self.bot_user);
        let created: Created = self
            .call(
                Method::POST,
                &format!("/guilds/{}/channels", request.guild_id),
                Some(&body),
            )
            .await
            .map_err(|e| BotError::Provisioning(e.to_string()))?;
        Ok(ChannelId(parse_id(&created.id)?))
    }

    async fn delete_channel(&self, channel: ChannelId) -> BotResult<()> {
        let path = format!("/channels/{channel}");
        let response = self.send(Method::DELETE, &path, None).await?;
        // Already gone is as good as deleted.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(BotError::Platform(format!("DELETE {path}: {}", response.status())))
        }
    }

    async fn member_joined_at(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> BotResult<Option<DateTime<Utc>>> {
        Ok(self.member(guild, user).await?.map(|m| m.joined_at))
    }

    async fn is_administrator(&self, guild: GuildId, user: UserId) -> BotResult<bool> {
        let Some(member) = self.member(guild, user).await? else {
            return Ok(false);
        };
        let info: Guild = self
            .call(Method::GET, &format!("/guilds/{guild}"), None)
            .await?;
        if info.owner_id == user.to_string() {
            return Ok(true);
        }
        let roles: Vec<Role> = self
            .call(Method::GET, &format!("/guilds/{guild}/roles"), None)
            .await?;
        Ok(has_administrator(guild, &member.roles, &roles))
    }
}

/// Whether any role the member holds (or @everyone) grants ADMINISTRATOR.
fn has_administrator(guild: GuildId, member_roles: &[String], roles: &[Role]) -> bool {
    let everyone = guild.to_string();
    roles
        .iter()
        .filter(|role| role.id == everyone || member_roles.contains(&role.id))
        .filter_map(|role| role.permissions.parse::<u64>().ok())
        .any(|bits| bits & ADMINISTRATOR != 0)
}
