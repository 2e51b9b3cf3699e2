//! Message retrieval: sender / domain / phrase queries over `/me/messages`.
//!
//! `$search` cannot be combined with `$orderby` or `$filter`, so search-mode
//! queries over-fetch and apply the day window, ordering and cap locally.
//! Without a search term the server filters and orders directly.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::GraphError;

use super::client::GraphClient;
use super::types::{Message, MessagePage};

/// Fields requested for every message.
pub const MESSAGE_SELECT: &str =
    "id,subject,from,toRecipients,ccRecipients,receivedDateTime,body,bodyPreview,conversationId,webLink";

/// Search multiplier applied to the requested count.
pub const OVERSAMPLE_FACTOR: usize = 5;
/// Minimum `$top` for sender/domain searches.
pub const MIN_ADDRESS_SEARCH_TOP: usize = 25;
/// Minimum `$top` for free-text searches.
pub const MIN_PHRASE_SEARCH_TOP: usize = 50;
/// Largest `$top` the service accepts on a message collection.
pub const MAX_PAGE_TOP: usize = 1000;

/// What to match messages on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Exact sender address.
    Sender(String),
    /// Sender domain, e.g. `firma.com`.
    Domain(String),
    /// Free-text phrase over subject, body and addresses.
    Phrase(String),
    /// Latest messages, no search term.
    None,
}

impl QueryFilter {
    /// The quoted `$search` expression, if this filter needs the search endpoint.
    pub fn search_term(&self) -> Option<String> {
        match self {
            QueryFilter::Sender(value) | QueryFilter::Domain(value) => {
                Some(format!("\"from:{}\"", value.trim().replace('"', "")))
            }
            QueryFilter::Phrase(phrase) => Some(format!("\"{}\"", phrase.trim().replace('"', ""))),
            QueryFilter::None => None,
        }
    }

    /// `$top` for a search-mode request returning at most `top` messages.
    /// Never above [`MAX_PAGE_TOP`].
    pub fn oversample(&self, top: usize) -> usize {
        let floor = match self {
            QueryFilter::Phrase(_) => MIN_PHRASE_SEARCH_TOP,
            _ => MIN_ADDRESS_SEARCH_TOP,
        };
        top.saturating_mul(OVERSAMPLE_FACTOR)
            .max(floor)
            .min(MAX_PAGE_TOP)
    }

    /// Short label for logs and page headings.
    pub fn describe(&self) -> String {
        match self {
            QueryFilter::Sender(v) => format!("Sender: {v}"),
            QueryFilter::Domain(v) => format!("Domain: {v}"),
            QueryFilter::Phrase(v) => format!("Search: {v}"),
            QueryFilter::None => "Latest messages".to_string(),
        }
    }
}

/// A retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub filter: QueryFilter,
    /// Maximum number of messages returned.
    pub top: usize,
    /// Only messages received within this many days.
    pub days: Option<u32>,
    /// Restrict to one mail folder.
    pub folder_id: Option<String>,
}

impl MessageQuery {
    pub fn new(filter: QueryFilter, top: usize) -> Self {
        Self {
            filter,
            top,
            days: None,
            folder_id: None,
        }
    }

    pub fn with_days(mut self, days: Option<u32>) -> Self {
        self.days = days;
        self
    }

    pub fn with_folder(mut self, folder_id: Option<String>) -> Self {
        self.folder_id = folder_id.filter(|f| !f.trim().is_empty());
        self
    }

    /// `/me/messages` or `/me/mailFolders/{id}/messages`.
    pub fn path(&self) -> String {
        match &self.folder_id {
            Some(folder) => format!("/me/mailFolders/{folder}/messages"),
            None => "/me/messages".to_string(),
        }
    }

    /// Earliest accepted receipt time, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days.map(|d| {
            now.checked_sub_signed(Duration::days(i64::from(d)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
    }

    /// Query parameters for the request, computed against `now`.
    pub fn params(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut params = vec![("$select", MESSAGE_SELECT.to_string())];
        match self.filter.search_term() {
            Some(term) => {
                params.push(("$search", term));
                params.push(("$top", self.filter.oversample(self.top).to_string()));
            }
            None => {
                if let Some(cutoff) = self.cutoff(now) {
                    params.push((
                        "$filter",
                        format!("receivedDateTime ge {}", cutoff.format("%Y-%m-%dT%H:%M:%SZ")),
                    ));
                }
                params.push(("$orderby", "receivedDateTime desc".to_string()));
                params.push(("$top", self.top.min(MAX_PAGE_TOP).to_string()));
            }
        }
        params
    }

    pub fn uses_search(&self) -> bool {
        self.filter.search_term().is_some()
    }
}

/// Keep messages inside the window, newest first, at most `top`.
///
/// With a cutoff, messages without a parsable receipt time are dropped.
/// Without one they are kept and sort after every dated message.
pub fn window_and_order(
    mut messages: Vec<Message>,
    cutoff: Option<DateTime<Utc>>,
    top: usize,
) -> Vec<Message> {
    if let Some(cutoff) = cutoff {
        messages.retain(|m| m.received_at().is_some_and(|at| at >= cutoff));
    }
    // Option orders None < Some, so reversing puts undated messages last.
    messages.sort_by(|a, b| b.received_at().cmp(&a.received_at()));
    messages.truncate(top);
    messages
}

/// Run a query against the mailbox, evaluating the day window at `Utc::now()`.
pub async fn fetch_messages(
    client: &GraphClient,
    query: &MessageQuery,
) -> Result<Vec<Message>, GraphError> {
    fetch_messages_at(client, query, Utc::now()).await
}

/// Run a query with an explicit reference time for the day window.
pub async fn fetch_messages_at(
    client: &GraphClient,
    query: &MessageQuery,
    now: DateTime<Utc>,
) -> Result<Vec<Message>, GraphError> {
    if query.top == 0 {
        return Ok(Vec::new());
    }

    let path = query.path();
    let params = query.params(now);
    let page: MessagePage = if query.uses_search() {
        client.search(&path, &params).await?
    } else {
        client.get(&path, &params).await?
    };

    let fetched = page.value.len();
    let messages = window_and_order(page.value, query.cutoff(now), query.top);
    debug!(fetched, kept = messages.len(), "Applied local window and ordering");
    info!(
        query = %query.filter.describe(),
        count = messages.len(),
        days = ?query.days,
        "Fetched messages"
    );
    Ok(messages)
}
