use super::*;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Instant;

use crate::types::{AppStatus, Question, SpecialState};

/// Trivia backend reached over its REST API
pub struct HttpTriviaApi {
    base_url: Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTriviaApi {
    pub fn new(config: &TriviaConfig) -> TriviaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TriviaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            TriviaError::ConfigError(format!("Invalid base URL {:?}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TriviaError::ConfigError(format!(
                "Base URL {:?} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            timeout: config.timeout,
            client,
        })
    }

    /// Base URL extended by the given path segments, each percent-encoded
    /// as a single segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> TriviaResult<(StatusCode, String)> {
        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| TriviaError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    TriviaError::Timeout(self.timeout)
                } else {
                    TriviaError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TriviaError::RequestFailed(format!("Failed to read body: {}", e)))?;

        tracing::debug!(
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Trivia backend responded"
        );
        Ok((status, body))
    }
}

/// Error body used by the backend for the non-question states
#[derive(Debug, Default, Deserialize)]
struct BackendError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> TriviaResult<T> {
    serde_json::from_str(body).map_err(|e| TriviaError::ParseError(e.to_string()))
}

fn unexpected(status: StatusCode, body: String) -> TriviaError {
    TriviaError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
}

/// Map a question lookup response onto a question or special state
///
/// - 200: question
/// - 403: gameplay disabled
/// - 404: no question for this totem
/// - 409: already played
/// - 429: cooldown, `retry_after` seconds in the body
pub(crate) fn question_lookup_from_response(
    status: StatusCode,
    body: String,
) -> TriviaResult<QuestionLookup> {
    let backend_error = || serde_json::from_str::<BackendError>(&body).unwrap_or_default();
    match status {
        StatusCode::OK => Ok(QuestionLookup::Question(parse_json::<Question>(&body)?)),
        StatusCode::FORBIDDEN => Ok(QuestionLookup::Special(SpecialState::AppInactive)),
        StatusCode::NOT_FOUND => Ok(QuestionLookup::Special(SpecialState::NotFound)),
        StatusCode::CONFLICT => Ok(QuestionLookup::Special(SpecialState::AlreadyPlayed {
            message: backend_error().message,
        })),
        StatusCode::TOO_MANY_REQUESTS => Ok(QuestionLookup::Special(SpecialState::Cooldown {
            seconds: backend_error().retry_after.unwrap_or(0),
        })),
        _ => Err(unexpected(status, body)),
    }
}

#[async_trait]
impl TriviaApi for HttpTriviaApi {
    async fn fetch_question(&self, user_id: &str, totem_code: &str) -> TriviaResult<QuestionLookup> {
        let url = self.endpoint(&["trivia", user_id, totem_code]);
        let (status, body) = self.send(self.client.get(url)).await?;
        question_lookup_from_response(status, body)
    }

    async fn submit_answer(&self, answer: &AnswerSubmission) -> TriviaResult<Outcome> {
        let url = self.endpoint(&["trivia", "answer"]);
        let (status, body) = self.send(self.client.post(url).json(answer)).await?;
        if !status.is_success() {
            return Err(unexpected(status, body));
        }
        parse_json(&body)
    }

    async fn app_status(&self) -> TriviaResult<bool> {
        let url = self.endpoint(&["app", "status"]);
        let (status, body) = self.send(self.client.get(url)).await?;
        if !status.is_success() {
            return Err(unexpected(status, body));
        }
        Ok(parse_json::<AppStatus>(&body)?.active)
    }

    async fn set_app_status(&self, active: bool) -> TriviaResult<bool> {
        let url = self.endpoint(&["app", "status"]);
        let (status, body) = self
            .send(self.client.put(url).json(&AppStatus { active }))
            .await?;
        if !status.is_success() {
            return Err(unexpected(status, body));
        }
        Ok(parse_json::<AppStatus>(&body)?.active)
    }

    fn name(&self) -> &str {
        "http"
    }
}
