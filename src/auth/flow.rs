//! OAuth2 authorization-code flow with PKCE for a public client.
//!
//! Opens the Microsoft sign-in page in a browser and waits for the redirect on
//! a loopback listener, then exchanges the code at the token endpoint.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::GRAPH_SCOPES;
use crate::error::AuthError;

/// How long to wait for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Scopes beyond the Graph ones: a refresh token and an id token.
const IDENTITY_SCOPES: &[&str] = &["offline_access", "openid", "profile"];

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// `preferred_username` (or `email`) from the unverified id token payload.
    pub fn username(&self) -> Option<String> {
        let payload = self.id_token.as_deref()?.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        claims
            .get("preferred_username")
            .or_else(|| claims.get("email"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// PKCE code verifier and challenge
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn new() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut verifier_bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(verifier_bytes))
    }

    /// S256 challenge for a known verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// Public-client OAuth against one authority.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    authority: String,
}

impl OAuthClient {
    /// `authority` is `https://login.microsoftonline.com/{tenant}`.
    pub fn new(client_id: &str, authority: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            authority: authority.trim_end_matches('/').to_string(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    fn scope() -> String {
        GRAPH_SCOPES
            .iter()
            .chain(IDENTITY_SCOPES)
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Browser URL for the authorization request.
    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        pkce: &PkceChallenge,
        state: &str,
        login_hint: Option<&str>,
    ) -> Result<Url, AuthError> {
        let base = format!("{}/oauth2/v2.0/authorize", self.authority);
        let mut params = vec![
            ("client_id", self.client_id.clone()),
            ("response_type", "code".to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("response_mode", "query".to_string()),
            ("scope", Self::scope()),
            ("code_challenge", pkce.challenge.clone()),
            ("code_challenge_method", "S256".to_string()),
            ("state", state.to_string()),
            ("prompt", "login".to_string()),
        ];
        if let Some(hint) = login_hint.filter(|h| !h.trim().is_empty()) {
            params.push(("login_hint", hint.trim().to_string()));
        }
        Url::parse_with_params(&base, &params).map_err(|e| AuthError::Denied {
            error: "invalid_authority".into(),
            description: e.to_string(),
        })
    }

    /// Run the interactive flow: open the browser, wait for the redirect,
    /// exchange the code.
    pub async fn interactive(&self, login_hint: Option<&str>) -> Result<TokenResponse, AuthError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}");

        let pkce = PkceChallenge::new();
        let state = random_state();
        let url = self.authorize_url(&redirect_uri, &pkce, &state, login_hint)?;

        eprintln!("Sign in to continue: {url}");
        if let Err(e) = open::that(url.as_str()) {
            warn!(error = %e, "Could not open a browser; open the URL manually");
        }

        let code = tokio::time::timeout(CALLBACK_TIMEOUT, wait_for_callback(&listener, &state))
            .await
            .map_err(|_| AuthError::CallbackTimeout(CALLBACK_TIMEOUT))??;

        info!("Authorization code received");
        self.exchange_code(&code, &redirect_uri, &pkce.verifier).await
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let scope = Self::scope();
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", pkce_verifier),
            ("scope", scope.as_str()),
        ];
        self.token_request(&params).await
    }

    /// Refresh an access token using a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let scope = Self::scope();
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.http.post(self.token_url()).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| AuthError::TokenEndpoint {
            status: status.as_u16(),
            body: format!("unparsable token response: {e}"),
        })
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Accept loopback connections until one carries the OAuth redirect.
async fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let mut reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;
        debug!(peer = %peer, line = request_line.trim(), "Loopback request");

        // Browsers also ask for /favicon.ico; ignore anything without a query.
        if !request_line.contains('?') {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await;
            continue;
        }

        let result = parse_callback(&request_line, expected_state);
        let page = match &result {
            Ok(_) => "<h1>Authorization successful!</h1><p>You can close this window.</p>".to_string(),
            Err(e) => format!(
                "<h1>Authorization failed</h1><p>{}</p>",
                crate::web::pages::escape(&e.to_string())
            ),
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            page.len(),
            page
        );
        let _ = stream.write_all(response.as_bytes()).await;
        return result;
    }
}

/// Extract the authorization code from `GET /?code=...&state=... HTTP/1.1`.
pub fn parse_callback(request_line: &str, expected_state: &str) -> Result<String, AuthError> {
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let url = Url::parse(&format!("http://localhost{target}")).map_err(|_| AuthError::MissingCode)?;
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(AuthError::Denied {
            error,
            description: param("error_description").unwrap_or_default(),
        });
    }
    if param("state").as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    param("code").ok_or(AuthError::MissingCode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_matches_rfc7636_example() {
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn random_pkce_verifiers_differ() {
        assert_ne!(PkceChallenge::new().verifier, PkceChallenge::new().verifier);
    }

    #[test]
    fn authorize_url_carries_flow_parameters() {
        let client = OAuthClient::new("client-1", "https://login.microsoftonline.com/consumers/").unwrap();
        let pkce = PkceChallenge::from_verifier("v".into());
        let url = client
            .authorize_url("http://localhost:5555", &pkce, "st", Some("me@outlook.com"))
            .unwrap();

        assert_eq!(
            url.as_str().split('?').next(),
            Some("https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize")
        );
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(pairs["redirect_uri"], "http://localhost:5555");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["prompt"], "login");
        assert_eq!(pairs["login_hint"], "me@outlook.com");
        assert!(pairs["scope"].contains("Mail.ReadWrite"));
        assert!(pairs["scope"].contains("offline_access"));
    }

    #[test]
    fn authorize_url_omits_blank_hint() {
        let client = OAuthClient::new("c", "https://login.microsoftonline.com/common").unwrap();
        let url = client
            .authorize_url("http://localhost:1", &PkceChallenge::new(), "s", Some(" "))
            .unwrap();
        assert!(!url.as_str().contains("login_hint"));
    }

    #[test]
    fn parse_callback_returns_code() {
        let line = "GET /?code=M.C123%2Fabc&state=xyz HTTP/1.1\r\n";
        assert_eq!(parse_callback(line, "xyz").unwrap(), "M.C123/abc");
    }

    #[test]
    fn parse_callback_rejects_state_mismatch() {
        let line = "GET /?code=abc&state=evil HTTP/1.1";
        assert!(matches!(parse_callback(line, "xyz"), Err(AuthError::StateMismatch)));
    }

    #[test]
    fn parse_callback_reports_denial() {
        let line = "GET /?error=access_denied&error_description=User+cancelled HTTP/1.1";
        match parse_callback(line, "xyz") {
            Err(AuthError::Denied { error, description }) => {
                assert_eq!(error, "access_denied");
                assert_eq!(description, "User cancelled");
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn parse_callback_without_code() {
        let line = "GET /?state=xyz HTTP/1.1";
        assert!(matches!(parse_callback(line, "xyz"), Err(AuthError::MissingCode)));
    }

    #[test]
    fn username_from_id_token() {
        let claims = URL_SAFE_NO_PAD.encode(r#"{"preferred_username":"me@outlook.com"}"#);
        let response = TokenResponse {
            access_token: "at".into(),
            refresh_token: None,
            expires_in: Some(3600),
            id_token: Some(format!("eyJhbGciOiJub25lIn0.{claims}.sig")),
        };
        assert_eq!(response.username().as_deref(), Some("me@outlook.com"));

        let without = TokenResponse {
            id_token: None,
            ..response
        };
        assert_eq!(without.username(), None);
    }
}
