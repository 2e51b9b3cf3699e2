//! Error types for mail-brief.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure came back from the mail API as an HTTP status.
    pub fn is_http(&self) -> bool {
        matches!(self, Error::Graph(GraphError::Status { .. }))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail API (Microsoft Graph) errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// OAuth and token cache errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization failed: {error} {description}")]
    Denied { error: String, description: String },

    #[error("State parameter mismatch in OAuth callback")]
    StateMismatch,

    #[error("Timed out after {0:?} waiting for the OAuth callback")]
    CallbackTimeout(Duration),

    #[error("OAuth callback did not carry an authorization code")]
    MissingCode,

    #[error("Token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token cache at {path} is unreadable: {reason}")]
    Cache { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors turning a model response into a summary and draft.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("LLM client is not configured. Set OPENAI_API_KEY in .env")]
    NotConfigured,

    #[error("Model output is not a JSON object: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Model output is missing the \"{0}\" string")]
    MissingField(&'static str),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
