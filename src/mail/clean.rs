//! Body cleaning: turn an HTML email body into the snippet the model sees.
//!
//! Best-effort heuristics, no LLM calls:
//! 1. drop `<blockquote>` elements (nested ones included)
//! 2. render the remaining HTML as plain text
//! 3. drop `>` quoted lines; stop at reply attributions, forwarded headers
//!    and signature blocks
//! 4. collapse blank-line runs and cap the length

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Character budget for a cleaned body.
pub const MAX_BODY_CHARS: usize = 8000;

/// Render width for html2text. Wide enough that paragraphs are not re-wrapped.
const RENDER_WIDTH: usize = 400;

static BLOCKQUOTE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)blockquote\b[^>]*>").expect("valid regex"));

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Lines that open a signature block.
const SIGNATURE_OPENERS: &[&str] = &[
    "sent from my iphone",
    "sent from my android",
    "best regards,",
    "kind regards,",
    "cu stima,",
    "cu stimă,",
];

/// Lines that open an embedded header block of the message being replied to.
const HEADER_OPENERS: &[&str] = &["from:", "de la:"];

/// Clean an HTML body for summarization. Never returns more than
/// [`MAX_BODY_CHARS`] characters.
pub fn trim_email_body(raw_html: &str) -> String {
    let without_quotes = remove_blockquotes(raw_html);
    let text = html_to_text(&without_quotes);
    let kept = strip_quoted_text(&text);
    let collapsed = collapse_blank_lines(&kept);
    truncate_chars(collapsed.trim(), MAX_BODY_CHARS)
}

/// Remove every `<blockquote>…</blockquote>` region. An unclosed blockquote
/// swallows the rest of the document.
pub fn remove_blockquotes(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut depth = 0usize;
    let mut last = 0usize;

    for caps in BLOCKQUOTE_TAG.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if depth == 0 {
            out.push_str(&html[last..tag.start()]);
        }
        if closing {
            depth = depth.saturating_sub(1);
        } else {
            depth += 1;
        }
        last = tag.end();
    }
    if depth == 0 {
        out.push_str(&html[last..]);
    }
    out
}

/// Render HTML as plain text. Falls back to tag stripping if rendering fails.
pub fn html_to_text(html: &str) -> String {
    match html2text::config::plain().string_from_read(html.as_bytes(), RENDER_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "html2text failed, stripping tags instead");
            strip_html(html)
        }
    }
}

/// Strip HTML tags from content (basic), keeping line structure.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}

/// Strip quoted text and signatures from a plain-text body.
///
/// Removes lines starting with `>`. Everything from the first reply
/// attribution (`On … wrote:`), `Original Message` separator, embedded
/// `From:` header or signature opener onwards is dropped.
pub fn strip_quoted_text(body: &str) -> String {
    let mut result = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('>') {
            continue;
        }
        if ends_kept_text(trimmed) {
            break;
        }
        result.push(line.trim_end());
    }

    while result.last().is_some_and(|l| l.is_empty()) {
        result.pop();
    }

    result.join("\n")
}

fn ends_kept_text(trimmed: &str) -> bool {
    if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
        return true;
    }
    if trimmed.starts_with("---") && trimmed.contains("Original Message") {
        return true;
    }
    // "-- " signature delimiter; html2text drops the trailing space.
    if trimmed == "--" {
        return true;
    }
    let lower = trimmed.to_lowercase();
    HEADER_OPENERS.iter().any(|h| lower.starts_with(h))
        || SIGNATURE_OPENERS.iter().any(|s| lower.starts_with(s))
}

/// Collapse three or more consecutive newlines into one blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").into_owned()
}

/// First `max` characters of `text`, respecting UTF-8 boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
