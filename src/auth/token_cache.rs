//! Flat-file token cache.
//!
//! One JSON document holding every signed-in account. It is read before each
//! acquisition and rewritten after each successful one.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Access tokens this close to expiry are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default)]
    pub accounts: Vec<CachedAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccount {
    pub username: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CachedAccount {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now
    }
}

impl TokenCache {
    /// The account matching `login_hint` (case-insensitive), else the first one.
    pub fn select(&self, login_hint: Option<&str>) -> Option<&CachedAccount> {
        login_hint
            .and_then(|hint| {
                self.accounts
                    .iter()
                    .find(|a| a.username.eq_ignore_ascii_case(hint.trim()))
            })
            .or_else(|| self.accounts.first())
    }

    /// Insert or replace the account with the same username.
    pub fn upsert(&mut self, account: CachedAccount) {
        match self
            .accounts
            .iter_mut()
            .find(|a| a.username.eq_ignore_ascii_case(&account.username))
        {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }
}

/// The cache file on disk.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the cache. A missing file is an empty cache.
    pub async fn load(&self) -> Result<TokenCache, AuthError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TokenCache::default()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(TokenCache::default());
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Cache {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Rewrite the whole cache file.
    pub async fn persist(&self, cache: &TokenCache) -> Result<(), AuthError> {
        let text = serde_json::to_string_pretty(cache).map_err(|e| AuthError::Cache {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&self.path, text).await?;
        debug!(path = %self.path.display(), accounts = cache.accounts.len(), "Token cache persisted");
        Ok(())
    }
}
