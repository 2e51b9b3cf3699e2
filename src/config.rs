//! Configuration types, built from environment variables (and `.env`).

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_TENANT: &str = "consumers";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TIMEZONE: &str = "Europe/Bucharest";
pub const DEFAULT_TOKEN_CACHE_FILE: &str = ".token_cache.json";
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Delegated Graph scopes requested at sign-in.
pub const GRAPH_SCOPES: &[&str] = &["Mail.Read", "Mail.ReadWrite", "User.Read"];

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Azure app registration (public client). Only needed for the OAuth flow.
    pub client_id: Option<String>,
    /// Tenant segment of the authority URL.
    pub tenant_id: String,
    pub openai_api_key: Option<SecretString>,
    pub model: String,
    /// IANA zone name handed to the model for date phrasing.
    pub timezone: String,
    pub token_cache_path: PathBuf,
    pub graph_base_url: String,
    /// Pre-acquired bearer token; skips OAuth when set.
    pub access_token: Option<SecretString>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            tenant_id: DEFAULT_TENANT.to_string(),
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE_FILE),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            access_token: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` from the working directory, then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_env()
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let graph_base_url = get("GRAPH_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !graph_base_url.starts_with("http://") && !graph_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "GRAPH_BASE_URL".into(),
                message: format!("expected an http(s) URL, got {graph_base_url}"),
            });
        }

        Ok(Self {
            client_id: get("CLIENT_ID"),
            tenant_id: get("TENANT_ID").unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            openai_api_key: get("OPENAI_API_KEY").map(SecretString::from),
            model: get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timezone: get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            token_cache_path: get("TOKEN_CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_CACHE_FILE)),
            graph_base_url,
            access_token: get("GRAPH_ACCESS_TOKEN").map(SecretString::from),
        })
    }

    /// The client id, or the error the interactive flow reports without it.
    pub fn require_client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CLIENT_ID".into()))
    }

    /// `https://login.microsoftonline.com/{tenant}`
    pub fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tenant_id, "consumers");
        assert_eq!(config.model, "gpt-4.1-mini");
        assert_eq!(config.timezone, "Europe/Bucharest");
        assert_eq!(config.token_cache_path, PathBuf::from(".token_cache.json"));
        assert_eq!(config.graph_base_url, "https://graph.microsoft.com/v1.0");
        assert!(config.client_id.is_none());
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn reads_overrides_and_trims_trailing_slash() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "abc-123"),
            ("TENANT_ID", "common"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GRAPH_BASE_URL", "http://127.0.0.1:9000/v1.0/"),
        ]))
        .unwrap();
        assert_eq!(config.client_id.as_deref(), Some("abc-123"));
        assert_eq!(config.authority(), "https://login.microsoftonline.com/common");
        assert_eq!(
            config.openai_api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.graph_base_url, "http://127.0.0.1:9000/v1.0");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[("CLIENT_ID", "  "), ("TIMEZONE", "")])).unwrap();
        assert!(config.client_id.is_none());
        assert_eq!(config.timezone, DEFAULT_TIMEZONE);
        assert!(matches!(
            config.require_client_id(),
            Err(ConfigError::MissingEnvVar(key)) if key == "CLIENT_ID"
        ));
    }

    #[test]
    fn rejects_non_http_graph_url() {
        let err = AppConfig::from_lookup(lookup(&[("GRAPH_BASE_URL", "graph.microsoft.com")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "GRAPH_BASE_URL"));
    }
}
