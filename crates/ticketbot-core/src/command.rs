//! Prefix commands typed into chat.

use crate::platform::UserId;

pub const PREFIX: char = '/';

/// A command the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/ticket create`
    TicketCreate,
    /// `/cooldown remove <member>`; admin only.
    CooldownRemove { target: Option<UserId> },
}

impl Command {
    /// Parses a message body. Unknown commands and actions yield `None`.
    pub fn parse(content: &str) -> Option<Self> {
        let rest = content.trim().strip_prefix(PREFIX)?;
        let mut words = rest.split_whitespace();
        match (words.next()?, words.next()) {
            ("ticket", Some("create")) => Some(Command::TicketCreate),
            ("cooldown", Some("remove")) => Some(Command::CooldownRemove {
                target: words.next().and_then(parse_member),
            }),
            _ => None,
        }
    }
}

/// Accepts `<@id>`, `<@!id>` or a bare id.
pub fn parse_member(token: &str) -> Option<UserId> {
    let id = match token.strip_prefix("<@") {
        Some(inner) => {
            let inner = inner.strip_suffix('>')?;
            inner.strip_prefix('!').unwrap_or(inner)
        }
        None => token,
    };
    id.parse().ok().map(UserId)
}
