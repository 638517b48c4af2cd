//! Per-user ticket cooldowns.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::platform::UserId;

/// A running cooldown: no ticket may be created until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCooldown {
    pub expires_at: DateTime<Utc>,
    pub remaining: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Active(ActiveCooldown),
    Inactive,
}

impl CooldownStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, CooldownStatus::Active(_))
    }
}

/// Maps a user to the moment their next ticket is allowed.
///
/// Expired entries are never swept; they simply compare as inactive.
/// Each operation locks only the user's shard, so two requests for the same
/// user are serialized.
pub struct CooldownRegistry {
    expiries: DashMap<UserId, DateTime<Utc>>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self {
            expiries: DashMap::new(),
        }
    }

    pub fn check(&self, user: UserId, now: DateTime<Utc>) -> CooldownStatus {
        match self.expiries.get(&user) {
            Some(expiry) => status_at(*expiry, now),
            None => CooldownStatus::Inactive,
        }
    }

    /// Sets the expiry to `now + duration`, overwriting any prior entry.
    pub fn start(&self, user: UserId, now: DateTime<Utc>, duration: Duration) {
        let expires_at = now + duration;
        self.expiries.insert(user, expires_at);
        tracing::debug!("Cooldown started: user={user}, expires_at={expires_at}");
    }

    /// Starts a cooldown only if none is active, atomically with the check.
    ///
    /// Returns the running cooldown when the user is still cooling down.
    pub fn try_start(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<DateTime<Utc>, ActiveCooldown> {
        let expires_at = now + duration;
        match self.expiries.entry(user) {
            Entry::Occupied(mut entry) => {
                if let CooldownStatus::Active(active) = status_at(*entry.get(), now) {
                    return Err(active);
                }
                entry.insert(expires_at);
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
            }
        }
        tracing::debug!("Cooldown started: user={user}, expires_at={expires_at}");
        Ok(expires_at)
    }

    /// Removes the entry. Absent users are fine.
    pub fn clear(&self, user: UserId) {
        if self.expiries.remove(&user).is_some() {
            tracing::debug!("Cooldown cleared: user={user}");
        }
    }

    /// Undoes a [`try_start`](Self::try_start) if the entry still holds `expires_at`.
    pub fn release(&self, user: UserId, expires_at: DateTime<Utc>) {
        if self
            .expiries
            .remove_if(&user, |_, expiry| *expiry == expires_at)
            .is_some()
        {
            tracing::debug!("Cooldown released: user={user}");
        }
    }
}

impl Default for CooldownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn status_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> CooldownStatus {
    if expires_at > now {
        CooldownStatus::Active(ActiveCooldown {
            expires_at,
            remaining: expires_at - now,
        })
    } else {
        CooldownStatus::Inactive
    }
}
