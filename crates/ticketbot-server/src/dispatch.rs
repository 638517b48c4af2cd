//! Serial hand-off of relayed gateway events to the bot.
//!
//! HTTP handlers run concurrently, but the bot must see events one at a time
//! in arrival order: a verification session subscribes to replies while its
//! trigger is handled, so a reply processed ahead of its trigger would be
//! lost. Handlers therefore only enqueue; a single worker task drains the
//! queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ticketbot_core::{ChannelId, InboundMessage, TicketBot};

use crate::error::AppError;

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum BotEvent {
    Message(InboundMessage),
    ChannelDeleted(ChannelId),
}

#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<BotEvent>,
}

impl EventQueue {
    /// Starts the worker feeding `bot` and returns the queue that feeds it.
    pub fn spawn(bot: Arc<TicketBot>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(drain(bot, rx));
        (Self { tx }, worker)
    }

    /// Enqueues `event`, waiting for room when the worker is behind.
    pub async fn push(&self, event: BotEvent) -> Result<(), AppError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| AppError::Unavailable("Event worker has stopped".to_string()))
    }
}

async fn drain(bot: Arc<TicketBot>, mut rx: mpsc::Receiver<BotEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            BotEvent::Message(message) => {
                let channel = message.channel_id;
                // Request-scoped failures are logged; the relay must not retry
                // an event the bot may already have acted on.
                if let Err(e) = bot.handle_message(message).await {
                    tracing::warn!("Message in channel {channel} not fully handled: {e}");
                }
            }
            BotEvent::ChannelDeleted(channel) => bot.handle_channel_deleted(channel),
        }
    }
    tracing::info!("Event queue closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use ticketbot_core::{
        Attachment, AuditRecord, AuditSink, Author, BotConfig, BotResult, GuildId, MessageId,
        MessagingPlatform, Notice, PrivateChannelRequest, TokioClock, UserId,
    };

    use super::*;

    const TICKET: ChannelId = ChannelId(100);

    #[derive(Default)]
    struct Recorder {
        titles: Mutex<Vec<String>>,
        audits: Mutex<Vec<AuditRecord>>,
    }

    impl Recorder {
        fn titles(&self) -> Vec<String> {
            self.titles.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPlatform for Recorder {
        async fn send_notice(&self, _: ChannelId, notice: &Notice) -> BotResult<MessageId> {
            let mut titles = self.titles.lock().unwrap();
            titles.push(notice.title.clone());
            Ok(MessageId(titles.len() as u64))
        }
        async fn edit_notice(&self, _: ChannelId, _: MessageId, _: &Notice) -> BotResult<()> {
            Ok(())
        }
        async fn create_private_channel(&self, _: &PrivateChannelRequest) -> BotResult<ChannelId> {
            Ok(TICKET)
        }
        async fn delete_channel(&self, _: ChannelId) -> BotResult<()> {
            Ok(())
        }
        async fn member_joined_at(
            &self,
            _: GuildId,
            _: UserId,
        ) -> BotResult<Option<DateTime<Utc>>> {
            Ok(Some(Utc::now() - Duration::days(30)))
        }
        async fn is_administrator(&self, _: GuildId, _: UserId) -> BotResult<bool> {
            Ok(false)
        }
    }

    #[async_trait]
    impl AuditSink for Recorder {
        async fn record(&self, record: &AuditRecord) -> BotResult<()> {
            self.audits.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn message(id: u64, channel: ChannelId, content: &str, with_attachment: bool) -> BotEvent {
        let attachments = if with_attachment {
            vec![Attachment {
                filename: "proof.png".to_string(),
                url: "https://cdn.test/proof.png".to_string(),
            }]
        } else {
            Vec::new()
        };
        BotEvent::Message(InboundMessage {
            id: MessageId(id),
            channel_id: channel,
            guild_id: Some(GuildId(1)),
            author: Author {
                id: UserId(7),
                name: "ana".to_string(),
                bot: false,
            },
            content: content.to_string(),
            attachments,
        })
    }

    fn queue(recorder: &Arc<Recorder>) -> EventQueue {
        let mut config = BotConfig::default();
        config
            .apps
            .insert("spotify".to_string(), "https://dl.test/spotify".to_string());
        let bot = TicketBot::new(
            &config,
            Arc::clone(recorder) as Arc<dyn MessagingPlatform>,
            Arc::clone(recorder) as Arc<dyn AuditSink>,
            Arc::new(TokioClock::new()),
        );
        EventQueue::spawn(Arc::new(bot)).0
    }

    async fn wait_for_title(recorder: &Recorder, title: &str) -> bool {
        tokio::time::timeout(StdDuration::from_secs(10), async {
            while !recorder.titles().iter().any(|t| t == title) {
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trigger_and_reply_pushed_together_are_handled_in_order() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        queue
            .push(message(1, ChannelId(1), "/ticket create", false))
            .await
            .unwrap();
        let (trigger, reply) = tokio::join!(
            queue.push(message(2, TICKET, "spotify", false)),
            queue.push(message(3, TICKET, "done", true)),
        );
        trigger.unwrap();
        reply.unwrap();

        assert!(wait_for_title(&recorder, "📥 Here's your download link!").await);
        let titles = recorder.titles();
        assert!(!titles.iter().any(|t| t == "⏰ Verification Timeout"));
        assert!(!titles.iter().any(|t| t == "⌛ Verification In Progress"));
        assert_eq!(recorder.audits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn push_fails_once_worker_is_gone() {
        let recorder = Arc::new(Recorder::default());
        let bot = TicketBot::new(
            &BotConfig::default(),
            Arc::clone(&recorder) as Arc<dyn MessagingPlatform>,
            Arc::clone(&recorder) as Arc<dyn AuditSink>,
            Arc::new(TokioClock::new()),
        );
        let (queue, worker) = EventQueue::spawn(Arc::new(bot));
        worker.abort();
        let _ = worker.await;

        let result = queue.push(BotEvent::ChannelDeleted(TICKET)).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }
}
