//! Fan-out of inbound messages to sessions waiting for a reply.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::platform::InboundMessage;

const BUS_CAPACITY: usize = 256;

/// Broadcasts every inbound message to all live subscriptions.
#[derive(Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<InboundMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, message: &InboundMessage) {
        // No receivers just means nobody is waiting.
        let _ = self.tx.send(message.clone());
    }

    /// Starts buffering messages published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<InboundMessage>,
}

impl Subscription {
    /// Waits for the first message satisfying `accept`, up to `timeout`.
    ///
    /// Returns `None` on timeout or when the bus is gone.
    pub async fn next_matching<P>(&mut self, timeout: Duration, accept: P) -> Option<InboundMessage>
    where
        P: Fn(&InboundMessage) -> bool,
    {
        let wait = async {
            loop {
                match self.rx.recv().await {
                    Ok(message) if accept(&message) => return Some(message),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Reply subscription lagged, skipped {skipped} messages");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }
}
