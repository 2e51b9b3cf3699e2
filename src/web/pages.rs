//! HTML rendering for the local web UI.
//!
//! Plain string templates. Everything that came from the user, the mailbox
//! or an error message goes through [`escape`]; the model's draft HTML is
//! inserted as-is.

use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::digest::{Digest, DraftOutcome};
use crate::summary::{DEFAULT_TONE, TONES};

pub const APP_TITLE: &str = "Mail Brief";

/// Default `last` for sender/domain digests.
pub const DEFAULT_RUN_LAST: usize = 5;
/// Default `last` for phrase searches.
pub const DEFAULT_SEARCH_LAST: usize = 20;

const BASE_CSS: &str = r#"<style>
  :root { font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Ubuntu, Arial; }
  body { max-width: 980px; margin: 32px auto; padding: 0 16px; }
  header { display: flex; align-items: center; justify-content: space-between; gap: 12px; }
  h1 { font-size: 20px; margin: 0; }
  .right { display: flex; gap: 8px; align-items: center; }
  form { display: grid; gap: 12px; border: 1px solid #eee; padding: 16px; border-radius: 12px; background: #fff; }
  fieldset { border: 0; padding: 0; margin: 0; display: grid; gap: 8px; }
  .row { display: grid; grid-template-columns: 1fr 2fr; gap: 12px; align-items: center; }
  input[type=text], input[type=number], select { width: 100%; padding: 8px 10px; border-radius: 8px; border: 1px solid #ddd; }
  .actions { display: flex; gap: 12px; align-items: center; }
  button { padding: 10px 14px; border: 0; border-radius: 10px; cursor: pointer; }
  .primary { background: #0b5; color: white; }
  .danger { background: #d33; color: white; }
  .muted { color: #666; font-size: 13px; }
  .card { border: 1px solid #eee; padding: 16px; border-radius: 12px; margin-top: 16px; background: #fcfcfc; }
  pre { white-space: pre-wrap; word-break: break-word; }
  .mono { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 13px; }
  .ok { color: #090; }
  .warn { color: #b50; }
  .err { color: #d00; }
  .inline-form { display: inline; margin: 0; padding: 0; }
  .grid { display: grid; gap: 16px; grid-template-columns: 1fr 1fr; }
</style>"#;

const SHUTDOWN_FORM: &str = r#"<form class="inline-form" method="post" action="/shutdown" onsubmit="return confirm('Stop the server?');">
      <button class="danger" type="submit">Stop server</button>
    </form>"#;

/// Escape text for HTML element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn tone_options() -> String {
    TONES.iter().fold(String::new(), |mut out, tone| {
        let selected = if *tone == DEFAULT_TONE { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{tone}"{selected}>{tone}</option>"#);
        out
    })
}

/// The two forms, without the page chrome.
static HOME_FORMS: LazyLock<String> = LazyLock::new(|| {
    let tones = tone_options();
    format!(
        r#"<div class="grid">
  <form method="post" action="/run">
    <h3>Summarize &amp; Draft (by sender/domain)</h3>
    <fieldset>
      <div class="row"><label>Login</label><input type="text" name="login" placeholder="you@outlook.com"></div>
      <div class="row">
        <label>Mode</label>
        <div style="display:flex; gap:16px; align-items:center;">
          <label><input type="radio" name="mode" value="domain" checked> Domain</label>
          <label><input type="radio" name="mode" value="sender"> Sender</label>
        </div>
      </div>
      <div class="row"><label>Value</label><input type="text" name="value" placeholder="firma.com or ana@firma.com" required></div>
      <div class="row"><label>Last</label><input type="number" name="last" value="{run_last}" min="1" max="50"></div>
      <div class="row"><label>Last N days</label><input type="number" name="days" placeholder="e.g. 30 (optional)" min="1"></div>
      <div class="row"><label>Tone</label><select name="tone">{tones}</select></div>
      <div class="row"><label>Propose slot</label><input type="text" name="slot" placeholder="Thu 14:00-15:00 Europe/Bucharest"></div>
      <div class="row"><label>Create reply draft</label><label><input type="checkbox" name="create_draft" checked> yes</label></div>
    </fieldset>
    <div class="actions"><button class="primary" type="submit">Run</button></div>
  </form>

  <form method="post" action="/search">
    <h3>Search (by keyword/phrase)</h3>
    <fieldset>
      <div class="row"><label>Login</label><input type="text" name="login" placeholder="you@outlook.com"></div>
      <div class="row"><label>Phrase</label><input type="text" name="q" placeholder="e.g. contract cadru, oferta 12.3k" required></div>
      <div class="row"><label>Max results</label><input type="number" name="last" value="{search_last}" min="1" max="100"></div>
      <div class="row"><label>Last N days</label><input type="number" name="days" placeholder="e.g. 60 (optional)" min="1"></div>
      <div class="row"><label>Tone</label><select name="tone">{tones}</select></div>
      <div class="row"><label>Create reply draft</label><label><input type="checkbox" name="create_draft" checked> yes</label></div>
    </fieldset>
    <div class="actions"><button class="primary" type="submit">Search</button></div>
  </form>
</div>"#,
        run_last = DEFAULT_RUN_LAST,
        search_last = DEFAULT_SEARCH_LAST,
    )
});

/// `GET /`.
pub fn home_page() -> String {
    format!(
        r#"<!doctype html><meta charset="utf-8"><title>{APP_TITLE}</title>
{BASE_CSS}
<header>
  <h1>{APP_TITLE}</h1>
  <div class="right">
    <span class="muted">local-only</span>
    {SHUTDOWN_FORM}
  </div>
</header>
{forms}
"#,
        forms = HOME_FORMS.as_str()
    )
}

/// A result page. `me_line` and `body` must already be HTML.
pub fn page(title: &str, me_line: &str, body: &str) -> String {
    let title = escape(title);
    format!(
        r#"<!doctype html><meta charset="utf-8"><title>{title}</title>
{BASE_CSS}
<header>
  <h1>{title}</h1>
  <div class="right">
    <a class="muted" href="/">&larr; Back</a>
    {SHUTDOWN_FORM}
  </div>
</header>
<div class="card mono">{me_line}</div>
{body}
"#
    )
}

/// Result page showing a single notice above the home forms.
pub fn notice_page(me_line: &str, class: &str, message_html: &str) -> String {
    let body = format!(
        r#"<p class="{class}">{message_html}</p>{forms}"#,
        forms = HOME_FORMS.as_str()
    );
    page(APP_TITLE, me_line, &body)
}

/// Escaped identity line: `[ME] ...` or a warning span.
pub fn me_line(identity: &Result<String, String>) -> String {
    match identity {
        Ok(line) => escape(line),
        Err(warning) => format!(r#"<span class="warn">{}</span>"#, escape(warning)),
    }
}

pub fn shutdown_page() -> String {
    format!(
        r#"<!doctype html><meta charset="utf-8"><title>{APP_TITLE}</title>
{BASE_CSS}
<p class="ok">Server is shutting down. You can close this window.</p>
"#
    )
}

fn card(inner: &str) -> String {
    format!("<div class='card'>{inner}</div>")
}

fn draft_notice(draft: &DraftOutcome) -> String {
    match draft {
        DraftOutcome::Created {
            web_link: Some(link),
            ..
        } => {
            let link = escape(link);
            format!(r#"<p class="ok">Draft created: <a href="{link}">{link}</a></p>"#)
        }
        DraftOutcome::Created { web_link: None, .. } => {
            r#"<p class="warn">Draft created, but no webLink was returned.</p>"#.to_string()
        }
        DraftOutcome::Failed(e) => format!(
            r#"<p class="err">Draft creation failed: {}</p>"#,
            escape(&e.to_string())
        ),
    }
}

fn participants_list(participants: &[String]) -> String {
    let items: String = participants
        .iter()
        .map(|a| format!("<li>{}</li>", escape(a)))
        .collect();
    format!("<ul>{items}</ul>")
}

fn timeline(digest: &Digest) -> String {
    let items: String = digest
        .messages
        .iter()
        .map(|m| {
            format!(
                "<li>{} &mdash; <span class='mono'>{}</span> &mdash; {}</li>",
                escape(m.received_date_time.as_deref().unwrap_or("")),
                escape(m.sender_address().unwrap_or("")),
                escape(m.subject_or_empty()),
            )
        })
        .collect();
    format!("<ol>{items}</ol>")
}

/// Body of a `POST /run` result.
pub fn run_result(digest: &Digest) -> String {
    let mut body = card(&format!(
        "<h3>Summary</h3><pre>{}</pre>",
        escape(&digest.summary.summary)
    ));
    body.push_str(&card(&format!("<h3>Draft</h3>{}", digest.summary.draft_html)));
    if let Some(draft) = &digest.draft {
        body.push_str(&card(&draft_notice(draft)));
    }
    body
}

/// Body of a `POST /search` result.
pub fn search_result(query: &str, digest: &Digest) -> String {
    let mut body = card(&format!(
        "<h3>Search query</h3><div class='mono'>{}</div>",
        escape(query)
    ));
    body.push_str(&card(&format!(
        "<h3>Summary</h3><pre>{}</pre>",
        escape(&digest.summary.summary)
    )));
    body.push_str(&card(&format!(
        "<h3>Participants</h3>{}",
        participants_list(&digest.participants)
    )));
    body.push_str(&card(&format!("<h3>Timeline</h3>{}", timeline(digest))));
    body.push_str(&card(&format!("<h3>Draft</h3>{}", digest.summary.draft_html)));
    if let Some(draft) = &digest.draft {
        body.push_str(&card(&draft_notice(draft)));
    }
    body
}
