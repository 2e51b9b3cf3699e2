//! Local web UI: two forms, a result page per run, and a stop button.

pub mod pages;

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::AccessTokenSource;
use crate::config::AppConfig;
use crate::digest::{DigestOutcome, DigestRequest, DigestService, identity_line};
use crate::error::Error;
use crate::graph::{GraphClient, MessageQuery, QueryFilter};
use crate::summary::DEFAULT_TONE;

use pages::{DEFAULT_RUN_LAST, DEFAULT_SEARCH_LAST, escape};

/// Shared state for the UI handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<dyn AccessTokenSource>,
    pub digests: DigestService,
    /// Signalled by `POST /shutdown`.
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, tokens: Arc<dyn AccessTokenSource>, digests: DigestService) -> Self {
        Self {
            config,
            tokens,
            digests,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Build the UI router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/run", post(run))
        .route("/search", post(search))
        .route("/shutdown", post(shutdown))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `POST /shutdown` or Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = routes(state);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Web UI listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.notified() => info!("Shutdown requested from the UI"),
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
            }
        })
        .await
}

// ── Forms ───────────────────────────────────────────────────────────────

/// `POST /run` fields. Everything is optional so bad input degrades to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunForm {
    pub login: String,
    pub mode: String,
    pub value: String,
    pub last: String,
    pub days: String,
    pub tone: String,
    pub slot: String,
    /// Present (any value) when the checkbox is ticked.
    pub create_draft: Option<String>,
}

/// `POST /search` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub login: String,
    pub q: String,
    pub last: String,
    pub days: String,
    pub tone: String,
    pub create_draft: Option<String>,
}

/// Parse `last`, falling back to `default` when blank or unparsable.
pub fn parse_last(raw: &str, default: usize) -> usize {
    raw.trim().parse().unwrap_or(default)
}

/// Parse `days`; blank or unparsable means no window.
pub fn parse_days(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

fn non_blank(raw: &str) -> Option<&str> {
    Some(raw.trim()).filter(|s| !s.is_empty())
}

fn tone_or_default(raw: &str) -> String {
    non_blank(raw).unwrap_or(DEFAULT_TONE).to_string()
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn home() -> Html<String> {
    Html(pages::home_page())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mail-brief"
    }))
}

async fn shutdown(State(state): State<AppState>) -> Html<String> {
    state.shutdown.notify_one();
    Html(pages::shutdown_page())
}

async fn run(State(state): State<AppState>, Form(form): Form<RunForm>) -> Html<String> {
    let Some(value) = non_blank(&form.value) else {
        return Html(pages::notice_page("", "err", "The value is empty."));
    };
    let (filter, label) = if form.mode.trim() == "sender" {
        (QueryFilter::Sender(value.to_string()), format!("Sender: {}", escape(value)))
    } else {
        (QueryFilter::Domain(value.to_string()), format!("Domain: {}", escape(value)))
    };

    let query = MessageQuery::new(filter, parse_last(&form.last, DEFAULT_RUN_LAST))
        .with_days(parse_days(&form.days));
    let request = DigestRequest::new(query, tone_or_default(&form.tone))
        .with_slot(Some(form.slot.clone()))
        .with_draft(form.create_draft.is_some());

    let client = match connect(&state, &form.login).await {
        Ok(client) => client,
        Err(e) => return Html(failure_page("", "Sign-in failed", &e)),
    };
    let me_line = pages::me_line(&identity_line(&client).await);

    match state.digests.run(&client, &request).await {
        Ok(DigestOutcome::Ready(digest)) => {
            Html(pages::page(pages::APP_TITLE, &me_line, &pages::run_result(&digest)))
        }
        Ok(DigestOutcome::NoMessages) => Html(pages::notice_page(
            &me_line,
            "warn",
            &format!("No messages found for <b>{label}</b>."),
        )),
        Err(e) => Html(failure_page(&me_line, "Digest failed", &e)),
    }
}

async fn search(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Html<String> {
    let Some(phrase) = non_blank(&form.q) else {
        return Html(pages::notice_page("", "err", "The search phrase is empty."));
    };

    let query = MessageQuery::new(
        QueryFilter::Phrase(phrase.to_string()),
        parse_last(&form.last, DEFAULT_SEARCH_LAST),
    )
    .with_days(parse_days(&form.days));
    let request = DigestRequest::new(query, tone_or_default(&form.tone))
        .with_draft(form.create_draft.is_some());

    let client = match connect(&state, &form.login).await {
        Ok(client) => client,
        Err(e) => return Html(failure_page("", "Sign-in failed", &e)),
    };
    let me_line = pages::me_line(&identity_line(&client).await);

    match state.digests.run(&client, &request).await {
        Ok(DigestOutcome::Ready(digest)) => Html(pages::page(
            &format!("{} - Search", pages::APP_TITLE),
            &me_line,
            &pages::search_result(phrase, &digest),
        )),
        Ok(DigestOutcome::NoMessages) => Html(pages::notice_page(
            &me_line,
            "warn",
            &format!("No messages found for <b>{}</b>.", escape(phrase)),
        )),
        Err(e) => Html(failure_page(&me_line, "Search failed", &e)),
    }
}

/// Acquire a token for `login` and build a Graph client.
async fn connect(state: &AppState, login: &str) -> Result<GraphClient, Error> {
    let token = state.tokens.access_token(non_blank(login)).await?;
    Ok(GraphClient::new(state.config.graph_base_url.clone(), token)?)
}

fn failure_page(me_line: &str, what: &str, error: &Error) -> String {
    warn!(error = %error, "{what}");
    pages::notice_page(me_line, "err", &format!("{what}: {}", escape(&error.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_falls_back_to_default() {
        assert_eq!(parse_last("12", DEFAULT_RUN_LAST), 12);
        assert_eq!(parse_last(" 7 ", DEFAULT_RUN_LAST), 7);
        assert_eq!(parse_last("", DEFAULT_RUN_LAST), 5);
        assert_eq!(parse_last("lots", DEFAULT_SEARCH_LAST), 20);
        assert_eq!(parse_last("-3", DEFAULT_SEARCH_LAST), 20);
    }

    #[test]
    fn days_blank_or_bad_is_none() {
        assert_eq!(parse_days("30"), Some(30));
        assert_eq!(parse_days(""), None);
        assert_eq!(parse_days("   "), None);
        assert_eq!(parse_days("soon"), None);
    }

    #[test]
    fn tone_defaults_when_blank() {
        assert_eq!(tone_or_default(""), DEFAULT_TONE);
        assert_eq!(tone_or_default("very-concise"), "very-concise");
    }
}
