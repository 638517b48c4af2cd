//! Platform-neutral notices (embeds) posted by the bot.
//!
//! Notices only carry text and a tone; the platform adapter decides how a
//! tone maps to a colour on the wire.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppCatalog;
use crate::platform::{AuditRecord, UserId};

/// Visual intent of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tone {
    Info,
    Warning,
    Success,
    Danger,
    Catalog,
    Attention,
    Brand,
}

impl Tone {
    /// RGB colour as a 24-bit integer.
    pub fn rgb(self) -> u32 {
        match self {
            Tone::Info => 0x3498db,
            Tone::Warning => 0xfee75c,
            Tone::Success => 0x2ecc71,
            Tone::Danger => 0xe74c3c,
            Tone::Catalog => 0x1abc9c,
            Tone::Attention => 0xe67e22,
            Tone::Brand => 0x5865f2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub tone: Tone,
    pub fields: Vec<NoticeField>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, tone: Tone) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tone,
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(NoticeField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn cooldown_active(remaining_secs: i64) -> Self {
        Self::new(
            "⏳ Cooldown Active",
            format!(
                "You can create a new ticket in **{}**.",
                format_time_left(remaining_secs)
            ),
            Tone::Warning,
        )
    }

    pub fn cooldown_expired() -> Self {
        Self::new(
            "✅ Cooldown Expired",
            "You can now create a new ticket!",
            Tone::Success,
        )
    }

    pub fn ticket_creation_failed() -> Self {
        Self::new(
            "❌ Ticket Not Created",
            "We couldn't open your ticket channel. Your cooldown was not used, please try again.",
            Tone::Danger,
        )
    }

    pub fn ticket_created(owner: UserId, brand: &str, auto_close_minutes: i64) -> Self {
        Self::new(
            "🎫 Ticket Created Successfully!",
            format!(
                "Hello {}, welcome to **{brand} Support!**\n\
                 Please describe your issue or choose a premium app below.\n\n\
                 ⏱️ *This ticket will auto-close after {auto_close_minutes} minutes of inactivity.*",
                owner.mention()
            ),
            Tone::Info,
        )
    }

    pub fn app_list(catalog: &AppCatalog, brand: &str) -> Self {
        let list = catalog
            .names()
            .map(|name| format!("- 🔹 **{}**", title_case(name)))
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(
            "💎 Premium Apps List",
            format!(
                "Here are the premium apps we currently offer:\n\n{list}\n\n\
                 🆕 New apps will come soon!\n\n💖 Thank you for being a part of **{brand}**."
            ),
            Tone::Catalog,
        )
    }

    pub fn auto_closed(auto_close_minutes: i64) -> Self {
        Self::new(
            "⚠️ Ticket Auto-Closed",
            format!(
                "This ticket has been closed due to {auto_close_minutes} minutes of inactivity."
            ),
            Tone::Danger,
        )
    }

    pub fn verification_required(app: &str, subscribe_url: &str, min_hours: i64) -> Self {
        Self::new(
            "🔍 Verification Required",
            format!(
                "Before we can give you **{}**, please make sure you meet the following:\n\n\
                 1️⃣ Subscribe to our [YouTube channel]({subscribe_url})\n\
                 2️⃣ Post a screenshot showing you're subscribed\n\
                 3️⃣ You've been in this server for **at least {min_hours} hours**\n\n\
                 Once you've met these, our staff will verify and approve your request.",
                title_case(app)
            ),
            Tone::Attention,
        )
    }

    pub fn verification_in_progress() -> Self {
        Self::new(
            "⌛ Verification In Progress",
            "Please finish the verification that is already running in this ticket first.",
            Tone::Warning,
        )
    }

    pub fn membership_too_short(min_hours: i64) -> Self {
        Self::verification_failed(format!(
            "You must be in this server for at least {min_hours} hours."
        ))
    }

    pub fn missing_screenshot() -> Self {
        Self::verification_failed("You must upload a screenshot showing your subscription.")
    }

    pub fn member_unknown() -> Self {
        Self::verification_failed("We couldn't find your membership in this server.")
    }

    fn verification_failed(description: impl Into<String>) -> Self {
        Self::new("❌ Verification Failed", description, Tone::Danger)
    }

    pub fn verification_successful(user: UserId, app: &str) -> Self {
        Self::new(
            "✅ Verification Successful",
            format!(
                "Awesome {}! Verification for **{}** complete.\nPlease wait...",
                user.mention(),
                title_case(app)
            ),
            Tone::Success,
        )
    }

    pub fn download_link(app: &str, link: &str, brand: &str) -> Self {
        let app = title_case(app);
        Self::new(
            "📥 Here's your download link!",
            format!(
                "Here is your download link for **{app}**, enjoy!\n\n\
                 🔗 [**Click here to download {app}**]({link})\n\n\
                 Thank you for being a valued member of **{brand}** ❤️"
            ),
            Tone::Brand,
        )
    }

    pub fn verification_unavailable() -> Self {
        Self::verification_failed(
            "We couldn't check your membership right now. Please try again in a moment.",
        )
    }

    pub fn verification_timeout() -> Self {
        Self::new(
            "⏰ Verification Timeout",
            "You took too long to respond. Please try again later.",
            Tone::Danger,
        )
    }

    pub fn cooldown_removed(target: UserId) -> Self {
        Self::new(
            "🕓 Cooldown Removed",
            format!("Removed cooldown for {}.", target.mention()),
            Tone::Success,
        )
    }

    pub fn ticket_verified(record: &AuditRecord) -> Self {
        Self::new("🗃️ Ticket Verified", "", Tone::Success)
            .with_field("User", record.user.mention())
            .with_field("App", title_case(&record.app_name))
            .with_timestamp(record.timestamp)
    }
}

/// Formats a second count as `"{h}h {m}m {s}s"`. Negative input reads as zero.
pub fn format_time_left(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{h}h {m}m {s}s")
}

/// Uppercases the first letter of every word, lowercasing the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
