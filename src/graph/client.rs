//! Thin authenticated HTTP wrapper over the Graph REST API.
//!
//! Every call goes through [`GraphClient::execute`], which retries exactly once
//! when the service answers 429, after sleeping for `Retry-After` seconds.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::GraphError;

use super::types::Me;

/// Delay used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(3);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated Graph client for one access token.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET path?query`, decoded as `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GraphError> {
        let text = self.execute(Method::GET, path, query, false, None).await?;
        decode(path, &text)
    }

    /// `GET` with `ConsistencyLevel: eventual`, required by `$search`.
    pub async fn search<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GraphError> {
        let text = self.execute(Method::GET, path, query, true, None).await?;
        decode(path, &text)
    }

    /// `POST path` with a JSON body.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, GraphError> {
        let text = self.execute(Method::POST, path, &[], false, Some(body)).await?;
        decode(path, &text)
    }

    /// `PATCH path` with a JSON body. An empty response decodes as `{}`.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, GraphError> {
        let text = self.execute(Method::PATCH, path, &[], false, Some(body)).await?;
        decode(path, &text)
    }

    /// Identity of the signed-in user.
    pub async fn me(&self) -> Result<Me, GraphError> {
        self.get(
            "/me",
            &[("$select", "userPrincipalName,mail,id,displayName".to_string())],
        )
        .await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        eventual_consistency: bool,
        body: Option<&Value>,
    ) -> Result<String, GraphError> {
        let url = format!("{}{}", self.base_url, path);
        let build = || {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(self.token.expose_secret())
                .query(query);
            if eventual_consistency {
                request = request.header("ConsistencyLevel", "eventual");
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request
        };

        debug!(method = %method, path = path, "Graph request");
        let mut response = build().send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after(response.headers());
            warn!(method = %method, path = path, delay_secs = delay.as_secs(), "Graph rate limited, retrying once");
            tokio::time::sleep(delay).await;
            response = build().send().await?;
        }

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GraphError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn decode<T: DeserializeOwned>(path: &str, text: &str) -> Result<T, GraphError> {
    let text = if text.trim().is_empty() { "{}" } else { text };
    serde_json::from_str(text)
        .map_err(|e| GraphError::InvalidResponse(format!("{path}: {e}")))
}

/// Seconds from `Retry-After`, falling back to [`DEFAULT_RETRY_AFTER`].
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn retry_after_reads_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Duration::from_secs(7));
    }

    #[test]
    fn retry_after_defaults_when_missing_or_http_date() {
        assert_eq!(retry_after(&HeaderMap::new()), DEFAULT_RETRY_AFTER);

        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn decode_treats_empty_body_as_object() {
        let value: Value = decode("/me/messages/x", "").unwrap();
        assert!(value.as_object().is_some_and(|o| o.is_empty()));
    }

    #[test]
    fn decode_reports_path_on_bad_json() {
        let err = decode::<Value>("/me", "<html>").unwrap_err();
        assert!(err.to_string().contains("/me"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = GraphClient::new("http://localhost:1/v1.0/", SecretString::from("t")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/v1.0");
    }
}
