//! App verification: challenge, wait for proof, check eligibility, fulfil.
//!
//! One run is an explicit state machine:
//!
//! ```text
//! AwaitingResponse ──reply──▶ Evaluating ──eligible──▶ Succeeded
//!        │                        └──────ineligible──▶ Failed(reason)
//!        └──────deadline────────▶ TimedOut
//! ```
//!
//! Eligibility is checked in a fixed order, membership age before the
//! screenshot, so the failure message a user sees is deterministic.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::bus::Subscription;
use crate::clock::Clock;
use crate::config::{AppCatalog, BotConfig};
use crate::error::BotResult;
use crate::lifecycle::delta_secs;
use crate::notice::Notice;
use crate::platform::{
    AuditRecord, AuditSink, ChannelId, GuildId, InboundMessage, MessagingPlatform, UserId,
};

/// Why a qualifying reply did not earn the download link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MembershipTooShort,
    MissingScreenshot,
    MemberNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    AwaitingResponse,
    Evaluating(InboundMessage),
    Succeeded,
    Failed(FailureReason),
    TimedOut,
}

/// Terminal result of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Succeeded,
    Failed(FailureReason),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub response_timeout: StdDuration,
    pub min_membership: Duration,
    /// Pause between the success notice and the download link.
    pub pacing: StdDuration,
    pub subscribe_url: String,
    pub brand_name: String,
}

impl VerificationSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            response_timeout: StdDuration::from_secs(config.verification_timeout_secs),
            min_membership: delta_secs(config.min_membership_hours.saturating_mul(3600)),
            pacing: StdDuration::from_secs(2),
            subscribe_url: config.subscribe_url.clone(),
            brand_name: config.brand_name.clone(),
        }
    }
}

/// Checks a reply against the membership and screenshot requirements.
///
/// A member exactly `min_membership` old qualifies.
pub fn check_eligibility(
    joined_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_membership: Duration,
    has_attachment: bool,
) -> Result<(), FailureReason> {
    let joined_at = joined_at.ok_or(FailureReason::MemberNotFound)?;
    if now - joined_at < min_membership {
        return Err(FailureReason::MembershipTooShort);
    }
    if !has_attachment {
        return Err(FailureReason::MissingScreenshot);
    }
    Ok(())
}

/// Marks a channel as having a pending verification for as long as it lives.
struct ChannelClaim {
    channel: ChannelId,
    active: Arc<DashMap<ChannelId, UserId>>,
}

impl Drop for ChannelClaim {
    fn drop(&mut self) {
        self.active.remove(&self.channel);
    }
}

/// One verification attempt. Dropping it frees the channel for a new one.
pub struct VerificationSession {
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub user: UserId,
    pub app_name: String,
    pub deadline: DateTime<Utc>,
    link: String,
    _claim: ChannelClaim,
}

impl VerificationSession {
    /// First reply from the requesting user in this channel carrying an
    /// attachment or saying "done"/"submitted".
    pub fn accepts(&self, message: &InboundMessage) -> bool {
        message.author.id == self.user && message.channel_id == self.channel_id && is_proof(message)
    }
}

fn is_proof(message: &InboundMessage) -> bool {
    message.has_attachments() || matches!(message.folded_content().as_str(), "done" | "submitted")
}

pub struct VerificationFlow {
    platform: Arc<dyn MessagingPlatform>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    catalog: Arc<AppCatalog>,
    settings: VerificationSettings,
    /// Channels with a pending session, mapped to the user being verified.
    active: Arc<DashMap<ChannelId, UserId>>,
}

impl VerificationFlow {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        catalog: Arc<AppCatalog>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            platform,
            clock,
            audit,
            catalog,
            settings,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Opens a session for `app` triggered by `trigger`.
    ///
    /// Returns `None` if the app is not in the catalog or a verification is
    /// already pending in the channel.
    pub fn try_open(&self, trigger: &InboundMessage, app: &str) -> Option<VerificationSession> {
        let link = self.catalog.link(app)?.to_string();
        let channel = trigger.channel_id;
        match self.active.entry(channel) {
            Entry::Occupied(_) => {
                tracing::debug!("Verification already pending in channel {channel}");
                return None;
            }
            Entry::Vacant(slot) => {
                slot.insert(trigger.author.id);
            }
        }
        let claim = ChannelClaim {
            channel,
            active: Arc::clone(&self.active),
        };
        let timeout =
            Duration::from_std(self.settings.response_timeout).unwrap_or(Duration::MAX);
        let deadline = self
            .clock
            .now()
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(VerificationSession {
            channel_id: channel,
            guild_id: trigger.guild_id,
            user: trigger.author.id,
            app_name: app.to_string(),
            deadline,
            link,
            _claim: claim,
        })
    }

    pub fn is_pending(&self, channel: ChannelId) -> bool {
        self.active.contains_key(&channel)
    }

    /// Whether `message` is the proof reply a pending session in its channel
    /// is waiting for.
    pub fn answers_pending(&self, message: &InboundMessage) -> bool {
        self.active
            .get(&message.channel_id)
            .is_some_and(|user| *user == message.author.id)
            && is_proof(message)
    }

    /// Drives `session` to a terminal state, reading replies from `replies`.
    ///
    /// `replies` must have been subscribed before the trigger's successors
    /// were published, or an early reply may be missed.
    ///
    /// # Errors
    ///
    /// [`BotError::Platform`](crate::BotError::Platform) if a notice cannot be
    /// posted or the member cannot be looked up.
    pub async fn run(
        &self,
        session: VerificationSession,
        mut replies: Subscription,
    ) -> BotResult<VerificationOutcome> {
        tracing::info!(
            user = %session.user,
            app = %session.app_name,
            "Verification started in channel {}",
            session.channel_id
        );
        let requirements = Notice::verification_required(
            &session.app_name,
            &self.settings.subscribe_url,
            self.settings.min_membership.num_hours(),
        );
        self.platform
            .send_notice(session.channel_id, &requirements)
            .await?;

        let mut state = VerificationState::AwaitingResponse;
        loop {
            tracing::debug!("Verification in {}: {state:?}", session.channel_id);
            state = match state {
                VerificationState::AwaitingResponse => {
                    let wait = (session.deadline - self.clock.now())
                        .to_std()
                        .unwrap_or_default();
                    match replies.next_matching(wait, |m| session.accepts(m)).await {
                        Some(reply) => VerificationState::Evaluating(reply),
                        None => VerificationState::TimedOut,
                    }
                }
                VerificationState::Evaluating(reply) => {
                    let joined_at = match session.guild_id {
                        Some(guild) => {
                            match self.platform.member_joined_at(guild, session.user).await {
                                Ok(joined_at) => joined_at,
                                Err(e) => {
                                    self.report_lookup_failure(&session).await;
                                    return Err(e);
                                }
                            }
                        }
                        None => None,
                    };
                    match check_eligibility(
                        joined_at,
                        self.clock.now(),
                        self.settings.min_membership,
                        reply.has_attachments(),
                    ) {
                        Ok(()) => VerificationState::Succeeded,
                        Err(reason) => VerificationState::Failed(reason),
                    }
                }
                VerificationState::Succeeded => {
                    self.fulfil(&session).await?;
                    return Ok(VerificationOutcome::Succeeded);
                }
                VerificationState::Failed(reason) => {
                    tracing::info!(user = %session.user, "Verification failed: {reason:?}");
                    let notice = match reason {
                        FailureReason::MembershipTooShort => {
                            Notice::membership_too_short(self.settings.min_membership.num_hours())
                        }
                        FailureReason::MissingScreenshot => Notice::missing_screenshot(),
                        FailureReason::MemberNotFound => Notice::member_unknown(),
                    };
                    self.platform.send_notice(session.channel_id, &notice).await?;
                    return Ok(VerificationOutcome::Failed(reason));
                }
                VerificationState::TimedOut => {
                    tracing::info!(user = %session.user, "Verification timed out");
                    self.platform
                        .send_notice(session.channel_id, &Notice::verification_timeout())
                        .await?;
                    return Ok(VerificationOutcome::TimedOut);
                }
            };
        }
    }

    async fn report_lookup_failure(&self, session: &VerificationSession) {
        if let Err(e) = self
            .platform
            .send_notice(session.channel_id, &Notice::verification_unavailable())
            .await
        {
            tracing::warn!("Failed to report member lookup failure: {e}");
        }
    }

    async fn fulfil(&self, session: &VerificationSession) -> BotResult<()> {
        self.platform
            .send_notice(
                session.channel_id,
                &Notice::verification_successful(session.user, &session.app_name),
            )
            .await?;
        self.clock.sleep(self.settings.pacing).await;
        self.platform
            .send_notice(
                session.channel_id,
                &Notice::download_link(&session.app_name, &session.link, &self.settings.brand_name),
            )
            .await?;

        let record = AuditRecord {
            user: session.user,
            app_name: session.app_name.clone(),
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.audit.record(&record).await {
            tracing::warn!("Audit record for user {} not delivered: {e}", record.user);
        }
        tracing::info!(user = %session.user, app = %session.app_name, "Verification succeeded");
        Ok(())
    }
}
