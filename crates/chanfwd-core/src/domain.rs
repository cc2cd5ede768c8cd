use std::{fmt, sync::OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Id of a message we sent through the messenger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Id of a post inside a watched channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A watched channel: `@handle`, bare handle, or numeric id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Channel(String);

fn tme_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.)?t\.me/(?:s/)?([A-Za-z0-9_]+)/?$").expect("valid regex")
    })
}

impl Channel {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse one line of the channel file.
    ///
    /// Blank lines and `#` comments yield `None`; `t.me` links become `@name`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        if let Some(caps) = tme_link_re().captures(line) {
            return Some(Self(format!("@{}", &caps[1])));
        }
        Some(Self(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier without the leading `@`.
    pub fn handle(&self) -> &str {
        self.0.strip_prefix('@').unwrap_or(&self.0)
    }

    pub fn numeric_id(&self) -> Option<i64> {
        self.0.parse::<i64>().ok()
    }

    /// Public link to a post of this channel.
    ///
    /// Numeric ids use the `t.me/c/<internal id>` form, which only resolves for members.
    pub fn permalink(&self, post: PostId) -> String {
        if self.numeric_id().is_some() {
            let internal = self
                .0
                .strip_prefix("-100")
                .unwrap_or_else(|| self.0.trim_start_matches('-'));
            return format!("https://t.me/c/{internal}/{post}");
        }
        format!("https://t.me/{}/{post}", self.handle())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lowercase keyword matched as a substring of lowercased message text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(word: &str) -> Self {
        Self(word.trim().to_lowercase())
    }

    /// Parse one line of the keyword file. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let kw = Self::new(line);
        if kw.0.is_empty() {
            None
        } else {
            Some(kw)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hashtag attached to forwarded posts.
    pub fn tag(&self) -> String {
        let body: String = self
            .0
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("#{body}")
    }

    pub fn matches(&self, lowered_text: &str) -> bool {
        lowered_text.contains(self.0.as_str())
    }
}

/// First keyword (in list order) contained in `lowered_text`.
pub fn first_match<'a>(keywords: &'a [Keyword], lowered_text: &str) -> Option<&'a Keyword> {
    keywords.iter().find(|k| k.matches(lowered_text))
}

/// A post fetched from a watched channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceMessage {
    pub id: PostId,
    pub text: Option<String>,
    /// Join/leave/pin notices and other non-user records.
    pub is_service: bool,
    pub posted_at: Option<DateTime<Utc>>,
}

impl SourceMessage {
    pub fn text(id: i64, text: &str) -> Self {
        Self {
            id: PostId(id),
            text: Some(text.to_string()),
            is_service: false,
            posted_at: None,
        }
    }

    pub fn service(id: i64) -> Self {
        Self {
            id: PostId(id),
            text: None,
            is_service: true,
            posted_at: None,
        }
    }

    pub fn lowered_text(&self) -> String {
        self.text.as_deref().unwrap_or("").to_lowercase()
    }
}
