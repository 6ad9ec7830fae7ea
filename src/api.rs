//! HTTP API endpoints.
//!
//! The trivia view the AR handoff navigates to reads its question and posts
//! answers through here; the admin panel flips the app-active switch.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::{self, AuthConfig};
use crate::state::AppState;
use crate::trivia::TriviaError;
use crate::types::{
    is_valid_totem_code, AnswerSubmission, AppStatus, ArVisit, Outcome, QuestionLookup,
    SpecialState,
};
use crate::ws;

/// JSON error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                msg: msg.into(),
            },
        }
    }
}

impl From<TriviaError> for ApiError {
    fn from(e: TriviaError) -> Self {
        tracing::error!("Trivia backend error: {}", e);
        match e {
            TriviaError::Timeout(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "TRIVIA_TIMEOUT", e.to_string())
            }
            TriviaError::ConfigError(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "TRIVIA_MISCONFIGURED",
                e.to_string(),
            ),
            TriviaError::RequestFailed(_)
            | TriviaError::UnexpectedStatus { .. }
            | TriviaError::ParseError(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "TRIVIA_UNAVAILABLE", e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the HTTP router: REST API, AR WebSocket and static files
pub fn router(state: Arc<AppState>, auth_config: Arc<AuthConfig>) -> Router {
    let admin_routes = Router::new()
        .route("/api/admin/app-status", post(set_app_status))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/api/app-status", get(get_app_status))
        .route("/api/trivia/answer", post(submit_answer))
        .route("/api/trivia/{totem}", get(fetch_question))
        .route("/api/ar/visits", get(list_visits))
        .route("/ws", get(ws::ws_handler))
        .merge(admin_routes)
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/app-status
pub async fn get_app_status(State(state): State<Arc<AppState>>) -> Json<AppStatus> {
    Json(AppStatus {
        active: state.is_app_active().await,
    })
}

/// POST /api/admin/app-status
pub async fn set_app_status(
    State(state): State<Arc<AppState>>,
    Json(status): Json<AppStatus>,
) -> ApiResult<AppStatus> {
    let active = state.set_app_active(status.active).await?;
    Ok(Json(AppStatus { active }))
}

#[derive(Debug, Deserialize)]
pub struct TriviaQuery {
    pub user: Option<String>,
}

/// GET /api/trivia/{totem}?user=
///
/// Question for the totem the player activated in AR, or the special state
/// explaining why there is none (already played, cooldown, not found,
/// gameplay disabled).
pub async fn fetch_question(
    State(state): State<Arc<AppState>>,
    Path(totem): Path<String>,
    Query(query): Query<TriviaQuery>,
) -> ApiResult<QuestionLookup> {
    if !is_valid_totem_code(&totem) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_TOTEM",
            format!("Invalid totem code: {:?}", totem),
        ));
    }
    let user = query
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "MISSING_USER", "A user id is required")
        })?;

    if !state.is_app_active().await {
        return Ok(Json(QuestionLookup::Special(SpecialState::AppInactive)));
    }

    let lookup = state.trivia.fetch_question(user, &totem).await?;
    if let QuestionLookup::Special(special) = &lookup {
        tracing::info!(totem_code = %totem, user, ?special, "No question for player");
    }
    Ok(Json(lookup))
}

/// POST /api/trivia/answer
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Json(answer): Json<AnswerSubmission>,
) -> ApiResult<Outcome> {
    if !state.is_app_active().await {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "APP_INACTIVE",
            "Gameplay is currently disabled",
        ));
    }

    let outcome = state.trivia.submit_answer(&answer).await?;
    tracing::info!(
        user_id = %answer.user_id,
        trivia_id = %answer.trivia_id,
        correct = outcome.correct,
        points = outcome.points,
        "Answer submitted"
    );
    Ok(Json(outcome))
}

/// GET /api/ar/visits
pub async fn list_visits(State(state): State<Arc<AppState>>) -> Json<Vec<ArVisit>> {
    Json(state.list_visits().await)
}
