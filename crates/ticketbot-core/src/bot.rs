//! Inbound event dispatcher.
//!
//! Every message from the platform goes through [`TicketBot::handle_message`]:
//! it is offered to waiting verification sessions, parsed for commands,
//! counted as activity in ticket channels and checked for app names.

use std::sync::Arc;

use crate::bus::MessageBus;
use crate::clock::Clock;
use crate::command::Command;
use crate::config::{AppCatalog, BotConfig};
use crate::error::{BotError, BotResult};
use crate::lifecycle::{LifecycleSettings, TicketLifecycle};
use crate::notice::Notice;
use crate::platform::{AuditSink, ChannelId, InboundMessage, MessagingPlatform};
use crate::verification::{VerificationFlow, VerificationSettings};

pub struct TicketBot {
    platform: Arc<dyn MessagingPlatform>,
    lifecycle: TicketLifecycle,
    verification: Arc<VerificationFlow>,
    catalog: Arc<AppCatalog>,
    bus: MessageBus,
}

impl TicketBot {
    pub fn new(
        config: &BotConfig,
        platform: Arc<dyn MessagingPlatform>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = Arc::new(config.catalog());
        let lifecycle = TicketLifecycle::new(
            Arc::clone(&platform),
            Arc::clone(&clock),
            Arc::clone(&catalog),
            LifecycleSettings::from_config(config),
        );
        let verification = VerificationFlow::new(
            Arc::clone(&platform),
            clock,
            audit,
            Arc::clone(&catalog),
            VerificationSettings::from_config(config),
        );
        tracing::info!(
            "Ticket bot ready: {} apps, cooldown {}h, auto-close {}m",
            catalog.len(),
            config.cooldown_hours,
            config.auto_close_minutes
        );
        Self {
            platform,
            lifecycle,
            verification: Arc::new(verification),
            catalog,
            bus: MessageBus::new(),
        }
    }

    pub fn lifecycle(&self) -> &TicketLifecycle {
        &self.lifecycle
    }

    /// Dispatches one inbound message.
    ///
    /// Commands run first; activity and app triggers are still processed
    /// when a command fails, and the command's error is returned afterwards.
    pub async fn handle_message(&self, message: InboundMessage) -> BotResult<()> {
        if message.author.bot {
            return Ok(());
        }
        // Decided before publishing: the session may end as soon as it sees
        // the reply, and the reply must not then count as a new trigger.
        let answers_session = self.verification.answers_pending(&message);
        self.bus.publish(&message);

        let command_result = match Command::parse(&message.content) {
            Some(command) => self.handle_command(command, &message).await,
            None => Ok(()),
        };

        if self.lifecycle.on_activity(message.channel_id) && !answers_session {
            let app = message.folded_content();
            if self.catalog.contains(&app) {
                self.start_verification(&message, &app).await?;
            }
        }

        command_result
    }

    /// Forgets a ticket whose channel disappeared.
    pub fn handle_channel_deleted(&self, channel: ChannelId) {
        self.lifecycle.on_channel_deleted(channel);
    }

    async fn handle_command(&self, command: Command, message: &InboundMessage) -> BotResult<()> {
        let Some(guild) = message.guild_id else {
            tracing::debug!("Ignoring {command:?} outside a guild");
            return Ok(());
        };
        match command {
            Command::TicketCreate => {
                self.lifecycle
                    .request_create(&message.author, guild, message.channel_id)
                    .await?;
            }
            Command::CooldownRemove { target: None } => {}
            Command::CooldownRemove {
                target: Some(target),
            } => {
                match self
                    .lifecycle
                    .remove_cooldown(message.author.id, guild, target, message.channel_id)
                    .await
                {
                    Err(BotError::PermissionDenied(reason)) => {
                        tracing::warn!("Cooldown removal refused: {reason}");
                    }
                    other => other?,
                }
            }
        }
        Ok(())
    }

    async fn start_verification(&self, trigger: &InboundMessage, app: &str) -> BotResult<()> {
        let Some(session) = self.verification.try_open(trigger, app) else {
            self.platform
                .send_notice(trigger.channel_id, &Notice::verification_in_progress())
                .await?;
            return Ok(());
        };
        // Subscribe before spawning so no reply can slip past the session.
        let replies = self.bus.subscribe();
        let flow = Arc::clone(&self.verification);
        let channel = trigger.channel_id;
        tokio::spawn(async move {
            match flow.run(session, replies).await {
                Ok(outcome) => tracing::debug!("Verification in {channel} ended: {outcome:?}"),
                Err(e) => tracing::error!("Verification in {channel} aborted: {e}"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::platform::UserId;
    use crate::testing::{message, FakeAudit, FakePlatform};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration as StdDuration;

    const LOBBY: u64 = 1;
    const USER: u64 = 7;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn setup() -> (Arc<FakePlatform>, Arc<FakeAudit>, TicketBot) {
        let platform = Arc::new(FakePlatform::new());
        let audit = Arc::new(FakeAudit::default());
        let mut apps = BTreeMap::new();
        apps.insert("spotify".to_string(), "https://dl.example/spotify".to_string());
        apps.insert("capcut".to_string(), "https://dl.example/capcut".to_string());
        let config = BotConfig {
            apps,
            ..BotConfig::default()
        };
        let bot = TicketBot::new(
            &config,
            platform.clone(),
            audit.clone(),
            Arc::new(TokioClock::starting_at(t0())),
        );
        (platform, audit, bot)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn open_ticket(platform: &FakePlatform, bot: &TicketBot) -> ChannelId {
        bot.handle_message(message(USER, LOBBY, "/ticket create", false))
            .await
            .unwrap();
        *platform.created_channels().last().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_repeat_hits_cooldown() {
        let (platform, _, bot) = setup();

        let ticket = open_ticket(&platform, &bot).await;
        assert_eq!(
            platform.titles_in(ticket),
            vec!["🎫 Ticket Created Successfully!", "💎 Premium Apps List"]
        );
        assert!(bot.lifecycle().cooldowns().check(UserId(USER), t0()).is_active());

        bot.handle_message(message(USER, LOBBY, "/ticket create", false))
            .await
            .unwrap();

        assert_eq!(platform.created_channels(), vec![ticket]);
        let lobby = platform.sent_to(ChannelId(LOBBY));
        assert_eq!(lobby.len(), 1);
        assert_eq!(lobby[0].title, "⏳ Cooldown Active");
        assert!(lobby[0].description.contains("24h 0m 0s"));
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_without_screenshot_gets_no_second_chance() {
        let (platform, audit, bot) = setup();
        platform.set_joined_at(UserId(USER), t0() - Duration::days(3));
        let ticket = open_ticket(&platform, &bot).await;

        bot.handle_message(message(USER, ticket.0, "  Spotify ", false))
            .await
            .unwrap();
        settle().await;
        bot.handle_message(message(USER, ticket.0, "submitted", false))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_secs(5)).await;
        settle().await;
        bot.handle_message(message(USER, ticket.0, "here", true))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_secs(5)).await;
        settle().await;

        let titles = platform.titles_in(ticket);
        assert_eq!(
            &titles[2..],
            &["🔍 Verification Required", "❌ Verification Failed"]
        );
        assert!(audit.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn verified_member_receives_link_and_audit() {
        let (platform, audit, bot) = setup();
        platform.set_joined_at(UserId(USER), t0() - Duration::days(3));
        let ticket = open_ticket(&platform, &bot).await;

        bot.handle_message(message(USER, ticket.0, "capcut", false))
            .await
            .unwrap();
        bot.handle_message(message(USER, ticket.0, "proof attached", true))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_secs(3)).await;
        settle().await;

        let sent = platform.sent_to(ticket);
        assert_eq!(sent.last().unwrap().title, "📥 Here's your download link!");
        assert!(sent.last().unwrap().description.contains("https://dl.example/capcut"));
        assert_eq!(audit.records().len(), 1);
        assert_eq!(audit.records()[0].app_name, "capcut");
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_while_pending_is_refused() {
        let (platform, _, bot) = setup();
        let ticket = open_ticket(&platform, &bot).await;

        bot.handle_message(message(USER, ticket.0, "spotify", false))
            .await
            .unwrap();
        bot.handle_message(message(USER, ticket.0, "capcut", false))
            .await
            .unwrap();
        settle().await;

        let titles = platform.titles_in(ticket);
        assert!(titles.contains(&"⌛ Verification In Progress".to_string()));
        assert_eq!(
            titles
                .iter()
                .filter(|t| t.as_str() == "🔍 Verification Required")
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn app_name_sent_as_proof_only_answers_the_session() {
        let (platform, audit, bot) = setup();
        platform.set_joined_at(UserId(USER), t0() - Duration::days(3));
        let ticket = open_ticket(&platform, &bot).await;

        bot.handle_message(message(USER, ticket.0, "spotify", false))
            .await
            .unwrap();
        settle().await;
        bot.handle_message(message(USER, ticket.0, "spotify", true))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_secs(3)).await;
        settle().await;

        assert_eq!(
            &platform.titles_in(ticket)[2..],
            &[
                "🔍 Verification Required",
                "✅ Verification Successful",
                "📥 Here's your download link!",
            ]
        );
        assert_eq!(audit.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn app_name_outside_ticket_is_ignored() {
        let (platform, _, bot) = setup();

        bot.handle_message(message(USER, LOBBY, "spotify", false))
            .await
            .unwrap();
        settle().await;

        assert!(platform.sent_to(ChannelId(LOBBY)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bot_messages_are_ignored() {
        let (platform, _, bot) = setup();
        let mut from_bot = message(USER, LOBBY, "/ticket create", false);
        from_bot.author.bot = true;

        bot.handle_message(from_bot).await.unwrap();

        assert!(platform.created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn messages_keep_ticket_open() {
        let (platform, _, bot) = setup();
        let ticket = open_ticket(&platform, &bot).await;

        for _ in 0..3 {
            tokio::time::sleep(StdDuration::from_secs(10 * 60)).await;
            bot.handle_message(message(USER, ticket.0, "still here", false))
                .await
                .unwrap();
        }
        settle().await;
        assert!(platform.deleted().is_empty());

        tokio::time::sleep(StdDuration::from_secs(16 * 60)).await;
        settle().await;
        assert_eq!(platform.deleted(), vec![ticket]);
    }

    #[tokio::test(start_paused = true)]
    async fn admin_command_clears_cooldown() {
        let (platform, _, bot) = setup();
        platform.add_admin(UserId(2));
        open_ticket(&platform, &bot).await;

        bot.handle_message(message(3, LOBBY, "/cooldown remove <@7>", false))
            .await
            .unwrap();
        assert!(bot.lifecycle().cooldowns().check(UserId(USER), t0()).is_active());

        bot.handle_message(message(2, LOBBY, "/cooldown remove <@7>", false))
            .await
            .unwrap();
        assert!(!bot.lifecycle().cooldowns().check(UserId(USER), t0()).is_active());

        open_ticket(&platform, &bot).await;
        assert_eq!(platform.created_channels().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_channel_stops_tracking() {
        let (platform, _, bot) = setup();
        let ticket = open_ticket(&platform, &bot).await;

        bot.handle_channel_deleted(ticket);
        bot.handle_message(message(USER, ticket.0, "spotify", false))
            .await
            .unwrap();
        settle().await;

        assert!(!bot.lifecycle().tickets().contains(ticket));
        assert_eq!(platform.sent_to(ticket).len(), 2);
    }
}
