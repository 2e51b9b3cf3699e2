//! Access-token acquisition for the Graph API.
//!
//! Order: unexpired cached token, then refresh-token grant, then the
//! interactive browser flow. The cache file is rewritten after every
//! successful acquisition.

pub mod flow;
pub mod token_cache;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AuthError, ConfigError};

pub use flow::{OAuthClient, TokenResponse};
pub use token_cache::{CachedAccount, FileTokenCache, TokenCache};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
const MAX_EXPIRES_IN_SECS: u64 = 86_400;

/// Something that can hand out a Graph access token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, login_hint: Option<&str>) -> Result<SecretString, AuthError>;
}

/// A fixed, pre-acquired token.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self, _login_hint: Option<&str>) -> Result<SecretString, AuthError> {
        Ok(self.0.clone())
    }
}

/// OAuth public client backed by the file token cache.
pub struct CachedOAuth {
    oauth: OAuthClient,
    cache: FileTokenCache,
}

impl CachedOAuth {
    pub fn new(oauth: OAuthClient, cache: FileTokenCache) -> Self {
        Self { oauth, cache }
    }

    async fn store(
        &self,
        mut cache: TokenCache,
        response: TokenResponse,
        previous_refresh: Option<String>,
        fallback_username: &str,
    ) -> Result<SecretString, AuthError> {
        let username = response
            .username()
            .unwrap_or_else(|| fallback_username.to_string());
        let expires_in = response
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .min(MAX_EXPIRES_IN_SECS);
        let expires_at = Utc::now() + Duration::seconds(expires_in as i64);

        let access_token = response.access_token.clone();
        cache.upsert(CachedAccount {
            username,
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at,
        });
        self.cache.persist(&cache).await?;
        Ok(SecretString::from(access_token))
    }
}

#[async_trait]
impl AccessTokenSource for CachedOAuth {
    async fn access_token(&self, login_hint: Option<&str>) -> Result<SecretString, AuthError> {
        let cache = self.cache.load().await?;
        let fallback_username = login_hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or("default")
            .to_string();

        if let Some(account) = cache.select(login_hint).cloned() {
            if account.is_fresh(Utc::now()) {
                info!(account = %account.username, "Using cached access token");
                let token = SecretString::from(account.access_token.clone());
                self.cache.persist(&cache).await?;
                return Ok(token);
            }
            if let Some(refresh_token) = account.refresh_token.clone() {
                match self.oauth.refresh(&refresh_token).await {
                    Ok(response) => {
                        info!(account = %account.username, "Access token refreshed");
                        return self
                            .store(cache, response, Some(refresh_token), &account.username)
                            .await;
                    }
                    Err(e) => warn!(error = %e, "Token refresh failed, falling back to interactive sign-in"),
                }
            }
        }

        let response = self.oauth.interactive(login_hint).await?;
        self.store(cache, response, None, &fallback_username).await
    }
}

/// The token source the configuration asks for.
pub fn token_source(config: &AppConfig) -> Result<Arc<dyn AccessTokenSource>, ConfigError> {
    if let Some(token) = &config.access_token {
        info!("Using GRAPH_ACCESS_TOKEN from the environment");
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }
    let client_id = config.require_client_id()?;
    let oauth = OAuthClient::new(client_id, &config.authority()).map_err(|e| {
        ConfigError::InvalidValue {
            key: "TENANT_ID".into(),
            message: e.to_string(),
        }
    })?;
    Ok(Arc::new(CachedOAuth::new(
        oauth,
        FileTokenCache::new(config.token_cache_path.clone()),
    )))
}
