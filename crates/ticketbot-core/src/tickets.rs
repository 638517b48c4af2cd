//! Open ticket channels and their inactivity timers.
//!
//! Every (re)armed timer receives a fresh generation number. A timer that
//! wakes up must [`claim`](TicketRegistry::claim_expired) its ticket with that
//! number, so a timer superseded by activity can never close the channel even
//! if its cancellation lost the race against its wake-up.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::platform::{ChannelId, UserId};

struct TicketEntry {
    owner: UserId,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl TicketEntry {
    fn replace_timer(&mut self, generation: u64, timer: JoinHandle<()>) {
        self.generation = generation;
        if let Some(old) = self.timer.replace(timer) {
            old.abort();
        }
    }
}

pub struct TicketRegistry {
    tickets: DashMap<ChannelId, TicketEntry>,
    next_generation: AtomicU64,
}

impl TicketRegistry {
    pub fn new() -> Self {
        Self {
            tickets: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    fn bump(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Tracks `channel` for `owner` and arms its first timer.
    ///
    /// `spawn_timer` receives the generation the timer must claim with. It
    /// runs under the entry lock, so even a timer that fires at once finds
    /// the ticket in place. Registering an already tracked channel replaces
    /// the old ticket.
    pub fn register<F>(&self, channel: ChannelId, owner: UserId, spawn_timer: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let generation = self.bump();
        match self.tickets.entry(channel) {
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                entry.owner = owner;
                entry.replace_timer(generation, spawn_timer(generation));
            }
            Entry::Vacant(slot) => {
                slot.insert(TicketEntry {
                    owner,
                    generation,
                    timer: Some(spawn_timer(generation)),
                });
            }
        }
        tracing::debug!("Ticket registered: channel={channel}, owner={owner}, generation={generation}");
        generation
    }

    /// Cancels the current timer of a tracked channel and arms a new one.
    ///
    /// Returns the new generation, or `None` if the channel is not a ticket.
    pub fn rearm<F>(&self, channel: ChannelId, spawn_timer: F) -> Option<u64>
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let mut entry = self.tickets.get_mut(&channel)?;
        let generation = self.bump();
        entry.replace_timer(generation, spawn_timer(generation));
        tracing::debug!("Ticket timer reset: channel={channel}, generation={generation}");
        Some(generation)
    }

    /// Removes the ticket if `generation` is still its current timer.
    ///
    /// Returns the owner when the caller won the claim.
    pub fn claim_expired(&self, channel: ChannelId, generation: u64) -> Option<UserId> {
        self.tickets
            .remove_if(&channel, |_, entry| entry.generation == generation)
            .map(|(_, entry)| entry.owner)
    }

    /// Forgets a ticket closed elsewhere and cancels its timer.
    pub fn remove(&self, channel: ChannelId) -> Option<UserId> {
        let (_, entry) = self.tickets.remove(&channel)?;
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        tracing::debug!("Ticket removed: channel={channel}");
        Some(entry.owner)
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.tickets.contains_key(&channel)
    }

    pub fn owner(&self, channel: ChannelId) -> Option<UserId> {
        self.tickets.get(&channel).map(|entry| entry.owner)
    }

    pub fn generation(&self, channel: ChannelId) -> Option<u64> {
        self.tickets.get(&channel).map(|entry| entry.generation)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for TicketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
