//! One digest run: retrieve, summarize, optionally draft a reply.
//!
//! Shared by the CLI and the web UI. Every remote call is awaited in order.

use tracing::{info, warn};

use crate::error::{Error, GraphError};
use crate::graph::{self, GraphClient, Message, MessageQuery, QueryFilter};
use crate::mail::extract_participants;
use crate::summary::{DigestKind, Summarizer, Summary};

/// What to digest and how.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub query: MessageQuery,
    pub tone: String,
    /// Meeting slot to propose in sender digests.
    pub propose_slot: Option<String>,
    /// Create a reply draft to the newest message.
    pub create_draft: bool,
}

impl DigestRequest {
    pub fn new(query: MessageQuery, tone: impl Into<String>) -> Self {
        Self {
            query,
            tone: tone.into(),
            propose_slot: None,
            create_draft: false,
        }
    }

    pub fn with_slot(mut self, slot: Option<String>) -> Self {
        self.propose_slot = slot.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_draft(mut self, create_draft: bool) -> Self {
        self.create_draft = create_draft;
        self
    }

    /// Phrase queries get a search digest, everything else a sender digest.
    pub fn kind(&self) -> DigestKind {
        match &self.query.filter {
            QueryFilter::Phrase(query) => DigestKind::Search {
                query: query.clone(),
            },
            QueryFilter::Sender(hint) | QueryFilter::Domain(hint) => DigestKind::Sender {
                hint: hint.clone(),
                propose_slot: self.propose_slot.clone(),
            },
            QueryFilter::None => DigestKind::Sender {
                hint: String::new(),
                propose_slot: self.propose_slot.clone(),
            },
        }
    }
}

/// Result of the optional draft step.
#[derive(Debug)]
pub enum DraftOutcome {
    Created { id: String, web_link: Option<String> },
    Failed(GraphError),
}

/// A completed digest.
#[derive(Debug)]
pub struct Digest {
    /// Newest first.
    pub messages: Vec<Message>,
    /// Sorted, lower-cased, unique.
    pub participants: Vec<String>,
    pub summary: Summary,
    pub draft: Option<DraftOutcome>,
}

#[derive(Debug)]
pub enum DigestOutcome {
    /// The query matched nothing; not an error.
    NoMessages,
    Ready(Digest),
}

/// Runs digests against one mailbox.
#[derive(Clone)]
pub struct DigestService {
    summarizer: Summarizer,
}

impl DigestService {
    pub fn new(summarizer: Summarizer) -> Self {
        Self { summarizer }
    }

    pub async fn run(&self, client: &GraphClient, request: &DigestRequest) -> Result<DigestOutcome, Error> {
        let messages = graph::fetch_messages(client, &request.query).await?;
        if messages.is_empty() {
            info!(query = %request.query.filter.describe(), "No messages matched");
            return Ok(DigestOutcome::NoMessages);
        }

        let participants = extract_participants(&messages);
        let summary = self
            .summarizer
            .summarize(&messages, &request.kind(), &request.tone)
            .await?;

        let draft = if request.create_draft {
            Some(create_draft(client, &messages[0], &summary.draft_html).await)
        } else {
            None
        };

        Ok(DigestOutcome::Ready(Digest {
            messages,
            participants,
            summary,
            draft,
        }))
    }
}

async fn create_draft(client: &GraphClient, newest: &Message, draft_html: &str) -> DraftOutcome {
    let id = match graph::create_reply_draft(client, &newest.id, draft_html).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, message_id = %newest.id, "Reply draft failed");
            return DraftOutcome::Failed(e);
        }
    };
    match graph::web_link(client, &id).await {
        Ok(web_link) => DraftOutcome::Created { id, web_link },
        Err(e) => {
            warn!(error = %e, draft_id = %id, "Draft created but web link lookup failed");
            DraftOutcome::Created { id, web_link: None }
        }
    }
}

/// `[ME] ...` line for the signed-in user, or a warning when `/me` fails.
pub async fn identity_line(client: &GraphClient) -> Result<String, String> {
    match client.me().await {
        Ok(me) => Ok(format!("[ME] {}", me.summary_line())),
        Err(e) => {
            warn!(error = %e, "/me check failed");
            Err(format!("[WARN] /me check failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_query_is_search_digest() {
        let request = DigestRequest::new(
            MessageQuery::new(QueryFilter::Phrase("oferta".into()), 20),
            "brief-firm",
        )
        .with_slot(Some("Thu 14:00".into()));
        assert_eq!(
            request.kind(),
            DigestKind::Search {
                query: "oferta".into()
            }
        );
    }

    #[test]
    fn domain_query_is_sender_digest_with_slot() {
        let request = DigestRequest::new(
            MessageQuery::new(QueryFilter::Domain("firma.com".into()), 5),
            "brief-firm",
        )
        .with_slot(Some("Thu 14:00".into()))
        .with_draft(true);
        assert!(request.create_draft);
        assert_eq!(
            request.kind(),
            DigestKind::Sender {
                hint: "firma.com".into(),
                propose_slot: Some("Thu 14:00".into())
            }
        );
    }

    #[test]
    fn blank_slot_is_dropped() {
        let request = DigestRequest::new(MessageQuery::new(QueryFilter::None, 5), "x")
            .with_slot(Some("  ".into()));
        assert_eq!(request.propose_slot, None);
    }
}
