//! Summarizer: one LLM call per digest, returning a Markdown summary and an
//! HTML reply draft.

pub mod prompts;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::SummaryError;
use crate::graph::Message;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::trim_email_body;

pub use prompts::{DEFAULT_TONE, TONES};

/// Sampling temperature for digests.
pub const DIGEST_TEMPERATURE: f32 = 0.2;

/// Which digest to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestKind {
    /// Latest mail from a sender or domain.
    Sender {
        hint: String,
        /// Meeting slot to propose, e.g. `Thu 14:00-15:00 Europe/Bucharest`.
        propose_slot: Option<String>,
    },
    /// Results of a phrase search.
    Search { query: String },
}

impl DigestKind {
    fn task(&self) -> &'static str {
        match self {
            DigestKind::Sender { .. } => "summarize_and_draft",
            DigestKind::Search { .. } => "search_summarize_and_draft",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            DigestKind::Sender { .. } => prompts::SENDER_DIGEST_SYSTEM,
            DigestKind::Search { .. } => prompts::SEARCH_DIGEST_SYSTEM,
        }
    }
}

/// Model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Markdown.
    pub summary: String,
    /// HTML reply body.
    pub draft_html: String,
}

/// Produces summaries through an optional LLM provider.
#[derive(Clone)]
pub struct Summarizer {
    llm: Option<Arc<dyn LlmProvider>>,
    timezone: String,
}

impl Summarizer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, timezone: impl Into<String>) -> Self {
        Self {
            llm,
            timezone: timezone.into(),
        }
    }

    /// Summarize `emails` (newest first) and draft a reply.
    pub async fn summarize(
        &self,
        emails: &[Message],
        kind: &DigestKind,
        tone: &str,
    ) -> Result<Summary, SummaryError> {
        let llm = self.llm.as_ref().ok_or(SummaryError::NotConfigured)?;

        let payload = build_payload(emails, kind, tone, &self.timezone);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(kind.system_prompt()),
            ChatMessage::user(payload.to_string()),
        ])
        .with_temperature(DIGEST_TEMPERATURE);

        info!(
            task = kind.task(),
            emails = emails.len(),
            model = llm.model_name(),
            "Requesting digest"
        );
        let response = llm.complete(request).await?;

        parse_summary(&response.content).inspect_err(|e| {
            warn!(error = %e, response = %response.content, "Failed to parse digest response");
        })
    }
}

/// The JSON user message sent with a digest request.
pub fn build_payload(emails: &[Message], kind: &DigestKind, tone: &str, timezone: &str) -> Value {
    let items: Vec<Value> = emails
        .iter()
        .enumerate()
        .map(|(i, m)| {
            json!({
                "i": i + 1,
                "subject": m.subject_or_empty(),
                "from": m.sender_address().unwrap_or(""),
                "to": m.to_addresses(),
                "cc": m.cc_addresses(),
                "received": m.received_date_time.as_deref().unwrap_or(""),
                "snippet": trim_email_body(m.body_content()),
            })
        })
        .collect();

    let mut payload = json!({
        "task": kind.task(),
        "tone": tone,
        "timezone": timezone,
        "emails": items,
    });
    match kind {
        DigestKind::Sender { hint, propose_slot } => {
            payload["sender_hint"] = json!(hint);
            payload["propose_slot"] = json!(propose_slot);
        }
        DigestKind::Search { query } => {
            payload["query"] = json!(query);
        }
    }
    payload
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    summary: Option<Value>,
    draft_html: Option<Value>,
}

/// Parse a model response into a [`Summary`].
pub fn parse_summary(content: &str) -> Result<Summary, SummaryError> {
    let json_str = extract_json_object(content);
    let raw: RawSummary = serde_json::from_str(&json_str)?;
    let field = |value: Option<Value>, name: &'static str| match value {
        Some(Value::String(s)) => Ok(s),
        _ => Err(SummaryError::MissingField(name)),
    };
    Ok(Summary {
        summary: field(raw.summary, "summary")?,
        draft_html: field(raw.draft_html, "draft_html")?,
    })
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    // Give up, return as-is
    trimmed.to_string()
}
