mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{AnswerSubmission, Outcome, QuestionLookup};

pub use http::HttpTriviaApi;

/// Result type for trivia backend operations
pub type TriviaResult<T> = Result<T, TriviaError>;

/// Errors that can occur talking to the trivia backend
#[derive(Debug, thiserror::Error)]
pub enum TriviaError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// The trivia backend: questions, answers and the global app switch
#[async_trait]
pub trait TriviaApi: Send + Sync {
    /// Question for a totem, or why the player can't get one right now
    async fn fetch_question(&self, user_id: &str, totem_code: &str) -> TriviaResult<QuestionLookup>;

    async fn submit_answer(&self, answer: &AnswerSubmission) -> TriviaResult<Outcome>;

    /// Whether gameplay is enabled
    async fn app_status(&self) -> TriviaResult<bool>;

    /// Enable or disable gameplay; returns the stored value
    async fn set_app_status(&self, active: bool) -> TriviaResult<bool>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}

/// Configuration for the trivia backend
#[derive(Debug, Clone)]
pub struct TriviaConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// App-active value assumed until the backend has been asked
    pub app_active_default: bool,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(10),
            app_active_default: true,
        }
    }
}

impl TriviaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("TRIVIA_API_BASE_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.base_url);

        let timeout = std::env::var("TRIVIA_API_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let app_active_default = std::env::var("APP_ACTIVE_DEFAULT")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.app_active_default);

        tracing::info!(%base_url, ?timeout, app_active_default, "Trivia backend config loaded");

        Self {
            base_url,
            timeout,
            app_active_default,
        }
    }
}
