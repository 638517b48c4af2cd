//! Error types for `ticketbot-core`.
//!
//! All fallible operations in the core library return [`BotResult<T>`],
//! which is an alias for `Result<T, BotError>`.

use std::path::PathBuf;

/// Unified error type for all core operations.
///
/// Every failure is scoped to a single user's request; none of these is
/// meant to bring the process down.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// A messaging platform call (send, edit, lookup) failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// The platform refused or failed to create a ticket channel.
    #[error("channel provisioning failed: {0}")]
    Provisioning(String),

    /// The acting user lacks the permission an admin command requires.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The policy file does not exist.
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    /// Failed to parse the policy file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `ticketbot-core`.
pub type BotResult<T> = Result<T, BotError>;
