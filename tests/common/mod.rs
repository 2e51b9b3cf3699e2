//! Shared fixtures: an in-process Graph mock and a stub LLM.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use mail_brief::error::LlmError;
use mail_brief::llm::{CompletionRequest, CompletionResponse, LlmProvider};

pub const TOKEN: &str = "test-token";
pub const DRAFT_ID: &str = "draft-1";
pub const DRAFT_LINK: &str = "https://outlook.live.com/owa/?ItemID=draft-1&exvsurl=1";

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub consistency: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct MockState {
    messages: Arc<Vec<Value>>,
    log: Arc<Mutex<Vec<Recorded>>>,
    throttles_left: Arc<AtomicUsize>,
}

/// Handle to a running mock Graph server.
pub struct MockGraph {
    pub base_url: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockGraph {
    /// Serve `messages` from every `.../messages` list endpoint, answering the
    /// first `throttles` list requests with 429 and `Retry-After: 0`.
    pub async fn start(messages: Vec<Value>, throttles: usize) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            messages: Arc::new(messages),
            log: Arc::clone(&log),
            throttles_left: Arc::new(AtomicUsize::new(throttles)),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/v1.0"),
            log,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// Requests whose path ends in `/messages`.
    pub fn list_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with("/messages"))
            .collect()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().trim_start_matches("/v1.0").to_string();
    state.log.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query,
        consistency: headers
            .get("ConsistencyLevel")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).ok(),
    });

    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, r#"{"error":{"code":"InvalidAuthenticationToken"}}"#)
            .into_response();
    }

    let draft_path = format!("/me/messages/{DRAFT_ID}");
    match (method, path.as_str()) {
        (Method::GET, "/me") => axum::Json(json!({
            "userPrincipalName": "me@outlook.com",
            "mail": null,
            "id": "user-1",
            "displayName": "Me"
        }))
        .into_response(),
        (Method::GET, p) if p.ends_with("/messages") => {
            let throttled = state
                .throttles_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if throttled {
                return (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "0")], "slow down")
                    .into_response();
            }
            axum::Json(json!({ "value": state.messages.as_slice() })).into_response()
        }
        (Method::POST, p) if p.ends_with("/createReply") => {
            axum::Json(json!({ "id": DRAFT_ID })).into_response()
        }
        (Method::PATCH, p) if p == draft_path => StatusCode::OK.into_response(),
        (Method::GET, p) if p == draft_path => {
            axum::Json(json!({ "webLink": DRAFT_LINK })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A Graph message resource.
pub fn message(id: &str, received: &str, from: &str, subject: &str) -> Value {
    json!({
        "id": id,
        "subject": subject,
        "from": { "emailAddress": { "name": "", "address": from } },
        "toRecipients": [ { "emailAddress": { "address": "Me@Outlook.com" } } ],
        "ccRecipients": [],
        "receivedDateTime": received,
        "body": { "contentType": "html", "content": format!("<p>{subject}</p>") },
        "bodyPreview": subject,
        "conversationId": "conv-1"
    })
}

/// LLM stub returning a fixed digest and counting calls.
pub struct StubLlm {
    pub calls: AtomicUsize,
}

impl StubLlm {
    pub const SUMMARY: &'static str = "- Price is <12.3k>";
    pub const DRAFT_HTML: &'static str = "<p>Thanks, we accept.</p>";

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: json!({ "summary": Self::SUMMARY, "draft_html": Self::DRAFT_HTML }).to_string(),
        })
    }
}
