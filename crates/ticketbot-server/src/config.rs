use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Bot policy file (cooldowns, auto-close, app catalog).
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Channel receiving "ticket verified" audit notices.
    #[serde(default)]
    pub log_channel_id: Option<u64>,
}

/// Gateway relay posting events to `/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            log_channel_id: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            policy_path: default_policy_path(),
            discord: DiscordConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_policy_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Reads the file named by `TICKETBOT_CONFIG` (defaults when unset),
    /// then applies the environment overrides and validates.
    pub fn load_with<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("TICKETBOT_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => ServerConfig::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read server config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse server config {}", path.display()))
    }

    /// Overrides file values with environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(id) = lookup("LOG_CHANNEL_ID") {
            self.discord.log_channel_id = Some(id.trim().parse()?);
        }
        if let Some(base) = lookup("TICKETBOT_API_BASE") {
            self.discord.api_base = base;
        }
        if let Some(path) = lookup("TICKETBOT_POLICY") {
            self.policy_path = PathBuf::from(path);
        }
        if let Some(token) = lookup("TICKETBOT_RELAY_TOKEN") {
            self.relay.token = Some(token);
        }
        if let Some(addr) = lookup("TICKETBOT_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(port) = lookup("PORT") {
            self.bind_addr.set_port(port.trim().parse()?);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.discord.token.trim().is_empty() {
            anyhow::bail!("No bot token configured. Set DISCORD_TOKEN.");
        }
        if self.discord.log_channel_id.is_none() {
            tracing::warn!("LOG_CHANNEL_ID not set; verification audit records will only be logged");
        }
        if self.relay.token.is_none() && self.bind_addr.ip().is_unspecified() {
            tracing::warn!(
                "No relay token configured. Anyone reaching {} can inject events. \
                 Set TICKETBOT_RELAY_TOKEN.",
                self.bind_addr
            );
        }
        Ok(())
    }
}
