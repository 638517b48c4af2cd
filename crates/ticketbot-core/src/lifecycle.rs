//! Ticket creation, cooldown countdowns and inactivity auto-close.
//!
//! Background work (countdown presenters, auto-close timers) is spawned with
//! an explicit snapshot of everything it needs: channel, message, expiry,
//! timer generation. Nothing a task reads later can be changed under it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::{AppCatalog, BotConfig};
use crate::cooldown::{ActiveCooldown, CooldownRegistry};
use crate::error::{BotError, BotResult};
use crate::notice::Notice;
use crate::platform::{
    Author, ChannelId, GuildId, MessageId, MessagingPlatform, PrivateChannelRequest, UserId,
};
use crate::tickets::TicketRegistry;

/// Fixed parameters read from the policy at startup.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub cooldown: Duration,
    pub auto_close: Duration,
    pub countdown_interval: StdDuration,
    pub brand_name: String,
    pub staff_role: Option<u64>,
}

impl LifecycleSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            cooldown: delta_secs(config.cooldown_hours.saturating_mul(3600)),
            auto_close: delta_secs(config.auto_close_minutes.saturating_mul(60)),
            countdown_interval: StdDuration::from_secs(config.countdown_interval_secs),
            brand_name: config.brand_name.clone(),
            staff_role: config.staff_role_id,
        }
    }
}

pub(crate) fn delta_secs(secs: u64) -> Duration {
    Duration::from_std(StdDuration::from_secs(secs)).unwrap_or(Duration::MAX)
}

/// Result of a `/ticket create` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { channel: ChannelId },
    CoolingDown { remaining: Duration },
}

pub struct TicketLifecycle {
    platform: Arc<dyn MessagingPlatform>,
    clock: Arc<dyn Clock>,
    cooldowns: Arc<CooldownRegistry>,
    tickets: Arc<TicketRegistry>,
    /// At most one live countdown per user; a newer one replaces it.
    presenters: DashMap<UserId, JoinHandle<()>>,
    catalog: Arc<AppCatalog>,
    settings: LifecycleSettings,
}

impl TicketLifecycle {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        clock: Arc<dyn Clock>,
        catalog: Arc<AppCatalog>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            platform,
            clock,
            cooldowns: Arc::new(CooldownRegistry::new()),
            tickets: Arc::new(TicketRegistry::new()),
            presenters: DashMap::new(),
            catalog,
            settings,
        }
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    pub fn tickets(&self) -> &TicketRegistry {
        &self.tickets
    }

    /// Handles a create-ticket request from `author`, answering in `origin`.
    ///
    /// The cooldown is reserved before the channel is requested so that two
    /// rapid requests can never both pass, and released again if
    /// provisioning fails.
    ///
    /// # Errors
    ///
    /// - [`BotError::Provisioning`] if the channel could not be created.
    /// - [`BotError::Platform`] if a notice could not be posted.
    pub async fn request_create(
        &self,
        author: &Author,
        guild: GuildId,
        origin: ChannelId,
    ) -> BotResult<CreateOutcome> {
        let now = self.clock.now();
        let expires_at = match self.cooldowns.try_start(author.id, now, self.settings.cooldown) {
            Ok(expires_at) => expires_at,
            Err(active) => return self.report_cooldown(author.id, origin, active).await,
        };

        let request = PrivateChannelRequest {
            guild_id: guild,
            name: format!("ticket-{}", author.name),
            owner: author.id,
            staff_role: self.settings.staff_role,
        };
        let channel = match self.platform.create_private_channel(&request).await {
            Ok(channel) => channel,
            Err(e) => {
                self.cooldowns.release(author.id, expires_at);
                tracing::warn!("Ticket channel provisioning failed for user {}: {e}", author.id);
                if let Err(notify) = self
                    .platform
                    .send_notice(origin, &Notice::ticket_creation_failed())
                    .await
                {
                    tracing::warn!("Failed to report provisioning failure: {notify}");
                }
                return Err(match e {
                    BotError::Provisioning(_) => e,
                    other => BotError::Provisioning(other.to_string()),
                });
            }
        };

        self.tickets
            .register(channel, author.id, |generation| self.spawn_auto_close(channel, generation));
        tracing::info!("Ticket created: channel={channel}, owner={}", author.id);

        let welcome = Notice::ticket_created(
            author.id,
            &self.settings.brand_name,
            self.settings.auto_close.num_minutes(),
        );
        self.platform.send_notice(channel, &welcome).await?;
        self.platform
            .send_notice(channel, &Notice::app_list(&self.catalog, &self.settings.brand_name))
            .await?;

        Ok(CreateOutcome::Created { channel })
    }

    async fn report_cooldown(
        &self,
        user: UserId,
        origin: ChannelId,
        active: ActiveCooldown,
    ) -> BotResult<CreateOutcome> {
        tracing::debug!(
            "Ticket refused, cooldown active: user={user}, remaining={}s",
            active.remaining.num_seconds()
        );
        let notice = Notice::cooldown_active(active.remaining.num_seconds());
        let message = self.platform.send_notice(origin, &notice).await?;

        let presenter = CountdownPresenter {
            platform: Arc::clone(&self.platform),
            clock: Arc::clone(&self.clock),
            channel: origin,
            message,
            expires_at: active.expires_at,
            interval: self.settings.countdown_interval,
        };
        if let Some(previous) = self.presenters.insert(user, tokio::spawn(presenter.run())) {
            previous.abort();
        }

        Ok(CreateOutcome::CoolingDown {
            remaining: active.remaining,
        })
    }

    /// Resets the inactivity timer of a tracked channel.
    ///
    /// Returns `false` when the channel is not an open ticket.
    pub fn on_activity(&self, channel: ChannelId) -> bool {
        self.tickets
            .rearm(channel, |generation| self.spawn_auto_close(channel, generation))
            .is_some()
    }

    /// Forgets a ticket whose channel was deleted outside the bot.
    pub fn on_channel_deleted(&self, channel: ChannelId) {
        if let Some(owner) = self.tickets.remove(channel) {
            tracing::info!("Ticket channel {channel} of user {owner} deleted externally");
        }
    }

    /// Clears `target`'s cooldown on behalf of an administrator.
    ///
    /// # Errors
    ///
    /// [`BotError::PermissionDenied`] if `actor` is not an administrator.
    pub async fn remove_cooldown(
        &self,
        actor: UserId,
        guild: GuildId,
        target: UserId,
        reply_to: ChannelId,
    ) -> BotResult<()> {
        if !self.platform.is_administrator(guild, actor).await? {
            tracing::warn!("User {actor} attempted to remove a cooldown without permission");
            return Err(BotError::PermissionDenied(format!(
                "user {actor} is not an administrator"
            )));
        }
        self.cooldowns.clear(target);
        if let Some((_, presenter)) = self.presenters.remove(&target) {
            presenter.abort();
        }
        tracing::info!("Cooldown of user {target} removed by {actor}");
        self.platform
            .send_notice(reply_to, &Notice::cooldown_removed(target))
            .await?;
        Ok(())
    }

    fn spawn_auto_close(&self, channel: ChannelId, generation: u64) -> JoinHandle<()> {
        let timer = AutoCloseTimer {
            platform: Arc::clone(&self.platform),
            clock: Arc::clone(&self.clock),
            tickets: Arc::clone(&self.tickets),
            channel,
            generation,
            delay: self.settings.auto_close.to_std().unwrap_or_default(),
        };
        tokio::spawn(timer.run())
    }
}

/// Edits a cooldown notice once per interval until the cooldown runs out.
struct CountdownPresenter {
    platform: Arc<dyn MessagingPlatform>,
    clock: Arc<dyn Clock>,
    channel: ChannelId,
    message: MessageId,
    expires_at: DateTime<Utc>,
    interval: StdDuration,
}

impl CountdownPresenter {
    async fn run(self) {
        loop {
            self.clock.sleep(self.interval).await;
            let remaining = (self.expires_at - self.clock.now()).num_seconds();
            let (notice, done) = if remaining <= 0 {
                (Notice::cooldown_expired(), true)
            } else {
                (Notice::cooldown_active(remaining), false)
            };
            if let Err(e) = self
                .platform
                .edit_notice(self.channel, self.message, &notice)
                .await
            {
                tracing::warn!("Countdown for message {} stopped: {e}", self.message);
                return;
            }
            if done {
                tracing::debug!("Countdown for message {} finished", self.message);
                return;
            }
        }
    }
}

/// Closes a ticket channel unless its generation was superseded.
struct AutoCloseTimer {
    platform: Arc<dyn MessagingPlatform>,
    clock: Arc<dyn Clock>,
    tickets: Arc<TicketRegistry>,
    channel: ChannelId,
    generation: u64,
    delay: StdDuration,
}

impl AutoCloseTimer {
    async fn run(self) {
        self.clock.sleep(self.delay).await;

        let Some(owner) = self.tickets.claim_expired(self.channel, self.generation) else {
            tracing::debug!(
                "Stale auto-close ignored: channel={}, generation={}",
                self.channel,
                self.generation
            );
            return;
        };
        tracing::info!("Auto-closing idle ticket: channel={}, owner={owner}", self.channel);

        let minutes = i64::try_from(self.delay.as_secs() / 60).unwrap_or(i64::MAX);
        if let Err(e) = self
            .platform
            .send_notice(self.channel, &Notice::auto_closed(minutes))
            .await
        {
            tracing::warn!("Failed to post auto-close notice in {}: {e}", self.channel);
        }
        if let Err(e) = self.platform.delete_channel(self.channel).await {
            tracing::error!("Failed to delete ticket channel {}: {e}", self.channel);
        }
    }
}
