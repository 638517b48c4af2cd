//! Recording fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{BotError, BotResult};
use crate::notice::Notice;
use crate::platform::{
    Attachment, AuditRecord, AuditSink, Author, ChannelId, GuildId, InboundMessage, MessageId,
    MessagingPlatform, PrivateChannelRequest, UserId,
};

pub const GUILD: GuildId = GuildId(1);

/// Builds a guild message from `user` in `channel`.
pub fn message(user: u64, channel: u64, content: &str, with_attachment: bool) -> InboundMessage {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    let attachments = if with_attachment {
        vec![Attachment {
            filename: "proof.png".to_string(),
            url: "https://cdn.example/proof.png".to_string(),
        }]
    } else {
        Vec::new()
    };
    InboundMessage {
        id: MessageId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        channel_id: ChannelId(channel),
        guild_id: Some(GUILD),
        author: Author {
            id: UserId(user),
            name: format!("user{user}"),
            bot: false,
        },
        content: content.to_string(),
        attachments,
    }
}

#[derive(Default)]
pub struct FakePlatform {
    next_id: AtomicU64,
    fail_provisioning: AtomicBool,
    fail_member_lookup: AtomicBool,
    sent: Mutex<Vec<(ChannelId, MessageId, Notice)>>,
    edits: Mutex<Vec<(ChannelId, MessageId, Notice)>>,
    created: Mutex<Vec<(PrivateChannelRequest, ChannelId)>>,
    deleted: Mutex<Vec<ChannelId>>,
    joined: Mutex<HashMap<UserId, DateTime<Utc>>>,
    admins: Mutex<HashSet<UserId>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(5000),
            ..Self::default()
        }
    }

    pub fn set_joined_at(&self, user: UserId, joined_at: DateTime<Utc>) {
        self.joined.lock().unwrap().insert(user, joined_at);
    }

    pub fn add_admin(&self, user: UserId) {
        self.admins.lock().unwrap().insert(user);
    }

    pub fn fail_provisioning(&self) {
        self.fail_provisioning.store(true, Ordering::SeqCst);
    }

    pub fn fail_member_lookup(&self) {
        self.fail_member_lookup.store(true, Ordering::SeqCst);
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<Notice> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| *c == channel)
            .map(|(_, _, n)| n.clone())
            .collect()
    }

    pub fn message_ids_in(&self, channel: ChannelId) -> Vec<MessageId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| *c == channel)
            .map(|(_, id, _)| *id)
            .collect()
    }

    pub fn titles_in(&self, channel: ChannelId) -> Vec<String> {
        self.sent_to(channel).into_iter().map(|n| n.title).collect()
    }

    pub fn edits(&self) -> Vec<(MessageId, Notice)> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m, n)| (*m, n.clone()))
            .collect()
    }

    pub fn created(&self) -> Vec<PrivateChannelRequest> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn created_channels(&self) -> Vec<ChannelId> {
        self.created.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn deleted(&self) -> Vec<ChannelId> {
        self.deleted.lock().unwrap().clone()
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl MessagingPlatform for FakePlatform {
    async fn send_notice(&self, channel: ChannelId, notice: &Notice) -> BotResult<MessageId> {
        let id = MessageId(self.id());
        self.sent.lock().unwrap().push((channel, id, notice.clone()));
        Ok(id)
    }

    async fn edit_notice(
        &self,
        channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> BotResult<()> {
        self.edits
            .lock()
            .unwrap()
            .push((channel, message, notice.clone()));
        Ok(())
    }

    async fn create_private_channel(
        &self,
        request: &PrivateChannelRequest,
    ) -> BotResult<ChannelId> {
        if self.fail_provisioning.load(Ordering::SeqCst) {
            return Err(BotError::Provisioning("403 Missing Permissions".to_string()));
        }
        let channel = ChannelId(self.id());
        self.created.lock().unwrap().push((request.clone(), channel));
        Ok(channel)
    }

    async fn delete_channel(&self, channel: ChannelId) -> BotResult<()> {
        self.deleted.lock().unwrap().push(channel);
        Ok(())
    }

    async fn member_joined_at(
        &self,
        _guild: GuildId,
        user: UserId,
    ) -> BotResult<Option<DateTime<Utc>>> {
        if self.fail_member_lookup.load(Ordering::SeqCst) {
            return Err(BotError::Platform("GET member: 503 Service Unavailable".to_string()));
        }
        Ok(self.joined.lock().unwrap().get(&user).copied())
    }

    async fn is_administrator(&self, _guild: GuildId, user: UserId) -> BotResult<bool> {
        Ok(self.admins.lock().unwrap().contains(&user))
    }
}

#[derive(Default)]
pub struct FakeAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl FakeAudit {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for FakeAudit {
    async fn record(&self, record: &AuditRecord) -> BotResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
