//! Web UI routes driven through the router, backed by a mock Graph server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use tower::ServiceExt;

use common::{DRAFT_LINK, MockGraph, StubLlm, TOKEN, message};
use mail_brief::auth::StaticToken;
use mail_brief::config::AppConfig;
use mail_brief::digest::DigestService;
use mail_brief::llm::LlmProvider;
use mail_brief::summary::Summarizer;
use mail_brief::web::{AppState, routes};

fn state(mock: &MockGraph, llm: Option<Arc<dyn LlmProvider>>) -> AppState {
    let config = AppConfig {
        graph_base_url: mock.base_url.clone(),
        ..AppConfig::default()
    };
    AppState::new(
        Arc::new(config),
        Arc::new(StaticToken::new(SecretString::from(TOKEN))),
        DigestService::new(Summarizer::new(llm, "Europe/Bucharest")),
    )
}

fn stub() -> Option<Arc<dyn LlmProvider>> {
    Some(StubLlm::new() as Arc<dyn LlmProvider>)
}

async fn mailbox() -> MockGraph {
    MockGraph::start(
        vec![
            message("m1", "2026-03-01T09:00:00Z", "ana@firma.com", "Oferta <v1>"),
            message("m2", "2026-03-02T09:00:00Z", "ion@firma.com", "Oferta v2"),
        ],
        0,
    )
    .await
}

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(state, request).await
}

async fn post_form(state: AppState, uri: &str, form: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(state, request).await
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, String) {
    let response = routes(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn home_page_has_both_forms() {
    let mock = mailbox().await;
    let (status, html) = get(state(&mock, stub()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(r#"action="/run""#));
    assert!(html.contains(r#"action="/search""#));
    assert!(html.contains(r#"action="/shutdown""#));
}

#[tokio::test]
async fn health_reports_ok() {
    let mock = mailbox().await;
    let (status, body) = get(state(&mock, stub()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn run_renders_summary_draft_and_link() {
    let mock = mailbox().await;
    let (status, html) = post_form(
        state(&mock, stub()),
        "/run",
        "login=me%40outlook.com&mode=domain&value=firma.com&last=5&days=&tone=brief-firm&slot=&create_draft=on",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("[ME] me@outlook.com"));
    assert!(html.contains("- Price is &lt;12.3k&gt;"));
    assert!(html.contains(StubLlm::DRAFT_HTML));
    assert!(html.contains("Draft created"));
    assert!(html.contains(&DRAFT_LINK.replace('&', "&amp;")));

    let search = &mock.list_requests()[0];
    assert_eq!(search.query["$search"], "\"from:firma.com\"");
    assert_eq!(search.query["$top"], "25");
    assert!(mock.requests().iter().any(|r| r.path == "/me/messages/m2/createReply"));
}

#[tokio::test]
async fn run_without_checkbox_creates_no_draft() {
    let mock = mailbox().await;
    let (_, html) = post_form(state(&mock, stub()), "/run", "mode=sender&value=ana%40firma.com").await;
    assert!(html.contains(StubLlm::DRAFT_HTML));
    assert!(!html.contains("Draft created"));
    assert!(!mock.requests().iter().any(|r| r.method == "POST"));
}

#[tokio::test]
async fn empty_value_is_rejected_before_sign_in() {
    let mock = mailbox().await;
    let (status, html) = post_form(state(&mock, stub()), "/run", "mode=domain&value=++").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("The value is empty."));
    assert!(html.contains(r#"action="/run""#));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn search_renders_participants_and_timeline() {
    let mock = mailbox().await;
    let (_, html) = post_form(state(&mock, stub()), "/search", "q=oferta&last=abc&days=soon").await;
    assert!(html.contains("<li>ana@firma.com</li>"));
    assert!(html.contains("<li>ion@firma.com</li>"));
    assert!(html.contains("Oferta &lt;v1&gt;"));
    // Newest first in the timeline.
    let v2 = html.find("Oferta v2").unwrap();
    let v1 = html.find("Oferta &lt;v1&gt;").unwrap();
    assert!(v2 < v1);

    let search = &mock.list_requests()[0];
    assert_eq!(search.query["$search"], "\"oferta\"");
    assert_eq!(search.query["$top"], "100");
}

#[tokio::test]
async fn huge_last_is_capped_at_page_limit() {
    let mock = mailbox().await;
    let (status, html) = post_form(
        state(&mock, stub()),
        "/search",
        "q=oferta&last=18446744073709551615",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<li>ana@firma.com</li>"));
    assert_eq!(mock.list_requests()[0].query["$top"], "1000");

    let mock = mailbox().await;
    let (status, _) = post_form(
        state(&mock, stub()),
        "/run",
        "mode=sender&value=ana%40firma.com&last=18446744073709551615",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.list_requests()[0].query["$top"], "1000");
}

#[tokio::test]
async fn search_without_results_warns() {
    let mock = MockGraph::start(Vec::new(), 0).await;
    let (status, html) = post_form(state(&mock, stub()), "/search", "q=%3Cnothing%3E").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(r#"class="warn""#));
    assert!(html.contains("No messages found for <b>&lt;nothing&gt;</b>."));
}

#[tokio::test]
async fn missing_llm_is_reported_inline() {
    let mock = mailbox().await;
    let (_, html) = post_form(state(&mock, None), "/search", "q=oferta").await;
    assert!(html.contains("Search failed"));
    assert!(html.contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn shutdown_signals_the_server() {
    let mock = mailbox().await;
    let state = state(&mock, stub());
    let notify = state.shutdown.clone();

    let (status, html) = post_form(state, "/shutdown", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("shutting down"));
    tokio::time::timeout(Duration::from_secs(1), notify.notified())
        .await
        .expect("shutdown was not signalled");
}
