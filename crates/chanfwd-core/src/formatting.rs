//! Formatting of forwarded posts (Telegram HTML parse mode).

use crate::domain::{Channel, Keyword, PostId};

const ATTRIBUTION_PREFIX: &str = "\n\nForwarded from ";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Build the forwarded post: keyword tag, original text, attribution link.
///
/// `max_len` bounds the rendered (entity-free) length in UTF-16 code units, the
/// unit Telegram counts in; the original text is cut with an ellipsis when the
/// whole message would not fit.
pub fn forward_html(
    keyword: &Keyword,
    text: &str,
    channel: &Channel,
    post: PostId,
    max_len: usize,
) -> String {
    let tag = keyword.tag();
    let name = channel.handle();
    let link = channel.permalink(post);

    let overhead = utf16_len(&tag) + 1 + utf16_len(ATTRIBUTION_PREFIX) + utf16_len(name);
    let body = truncate_utf16(text, max_len.saturating_sub(overhead));

    format!(
        "{} {}{ATTRIBUTION_PREFIX}<a href='{}'>{}</a>",
        escape_html(&tag),
        escape_html(&body),
        escape_html(&link),
        escape_html(name)
    )
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn truncate_utf16(text: &str, limit: usize) -> String {
    if utf16_len(text) <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    // One unit is reserved for the ellipsis.
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        if used + c.len_utf16() > limit - 1 {
            break;
        }
        used += c.len_utf16();
        out.push(c);
    }
    out.push('…');
    out
}
