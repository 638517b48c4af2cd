//! Ticket bot core library: platform-agnostic support ticket logic.
//!
//! `ticketbot-core` owns every decision the bot makes: who may open a ticket,
//! when an idle ticket closes, and whether a member has earned a premium app
//! download link. It talks to the chat platform only through the
//! [`MessagingPlatform`] trait so the same logic runs against Discord or a
//! recording fake in tests.
//!
//! # Modules
//!
//! - [`clock`]: Wall-clock source that follows tokio's (pausable) timer.
//! - [`cooldown`]: Per-user ticket cooldowns ([`CooldownRegistry`]).
//! - [`tickets`]: Open ticket channels and their inactivity timers ([`TicketRegistry`]).
//! - [`lifecycle`]: Ticket creation, countdown presenter, auto-close ([`TicketLifecycle`]).
//! - [`verification`]: App verification state machine ([`VerificationFlow`]).
//! - [`config`]: Bot policy file and the [`AppCatalog`].
//! - [`notice`]: Platform-neutral embeds posted by the bot.
//! - [`platform`]: Identifiers, inbound messages and the platform contract.
//! - [`bus`]: Fan-out of inbound messages to waiting verification sessions.
//! - [`command`]: Prefix command parsing.
//! - [`bot`]: Event dispatcher tying everything together ([`TicketBot`]).
//! - [`error`]: Unified error type ([`BotError`]) and result alias ([`BotResult`]).

pub mod bot;
pub mod bus;
pub mod clock;
pub mod command;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod lifecycle;
pub mod notice;
pub mod platform;
pub mod tickets;
pub mod verification;

#[cfg(test)]
pub(crate) mod testing;

pub use bot::TicketBot;
pub use bus::MessageBus;
pub use clock::{Clock, TokioClock};
pub use command::Command;
pub use config::{AppCatalog, BotConfig};
pub use cooldown::{ActiveCooldown, CooldownRegistry, CooldownStatus};
pub use error::{BotError, BotResult};
pub use lifecycle::{CreateOutcome, LifecycleSettings, TicketLifecycle};
pub use notice::{Notice, NoticeField, Tone};
pub use platform::{
    Attachment, AuditRecord, AuditSink, Author, ChannelAuditLog, ChannelId, GuildId,
    InboundMessage, MessageId, MessagingPlatform, PrivateChannelRequest, UserId,
};
pub use tickets::TicketRegistry;
pub use verification::{
    check_eligibility, FailureReason, VerificationFlow, VerificationOutcome, VerificationSession,
    VerificationSettings, VerificationState,
};
