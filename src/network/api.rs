//! Solo HTTP API
//!
//! Request/response surface for solo runs, the leaderboard and health.
//! Handlers only translate between JSON and [`SessionStore`]; rejected
//! actions come back as `valid: false` bodies rather than HTTP errors.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::persistence::{ScoreRecord, SPEEDCLICK_GAME};
use crate::solo::{SessionStore, SubmitError};

/// Longest accepted nickname, in bytes after trimming.
pub const MAX_NICKNAME_LEN: usize = 20;

const DEFAULT_RANKING_LIMIT: usize = 10;
const MAX_RANKING_LIMIT: usize = 100;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Solo session registry.
    pub sessions: Arc<SessionStore>,
}

/// HTTP API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request is missing or has an invalid field.
    #[error("{0}")]
    BadRequest(&'static str),

    /// Leaderboard could not be read.
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(%status, message = %self, "request failed");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// REQUEST / RESPONSE BODIES
// =============================================================================

/// `start` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    /// New session id.
    pub session_id: String,
    /// Ball generation seed.
    pub seed: i64,
    /// Unix ms at creation.
    pub start_time: i64,
}

/// `click` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    /// Session the click belongs to.
    #[serde(default)]
    pub session_id: String,
    /// Index of the clicked ball.
    pub ball_index: i64,
    /// Click time in ms since the session started.
    pub click_time_ms: i64,
}

/// `click` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    /// Whether the click was accepted.
    pub valid: bool,
    /// Points awarded.
    pub points: i64,
    /// Score after the click.
    pub score: i64,
    /// Lives after the click.
    pub lives: i32,
    /// The click ended the run.
    pub game_over: bool,
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `miss` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissRequest {
    /// Session the miss belongs to.
    #[serde(default)]
    pub session_id: String,
    /// Index of the missed ball.
    pub ball_index: i64,
}

/// `miss` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissResponse {
    /// Whether the miss was accepted.
    pub valid: bool,
    /// Lives after the miss.
    pub lives: i32,
    /// The miss ended the run.
    pub game_over: bool,
}

/// Body of `end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndRequest {
    /// Session to end.
    #[serde(default)]
    pub session_id: String,
}

/// `end` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndResponse {
    /// Score at the end of the run.
    pub final_score: i64,
    /// Whether `submit` would be accepted.
    pub can_submit: bool,
}

/// `submit` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Session whose score is submitted.
    #[serde(default)]
    pub session_id: String,
    /// Leaderboard name.
    #[serde(default)]
    pub nickname: String,
}

/// `submit` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Whether the score was stored.
    pub success: bool,
    /// Leaderboard row id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_id: Option<i64>,
}

/// Query of `GET /api/ranking`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingQuery {
    /// Game to rank; speed-click when absent.
    pub game: Option<String>,
    /// Row count, 1..=100. Anything else falls back to 10.
    pub limit: Option<String>,
}

impl RankingQuery {
    fn game(&self) -> &str {
        self.game
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or(SPEEDCLICK_GAME)
    }

    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| (1..=MAX_RANKING_LIMIT).contains(l))
            .unwrap_or(DEFAULT_RANKING_LIMIT)
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ranking", get(ranking))
        .route("/api/game/speedclick/start", post(start))
        .route("/api/game/speedclick/click", post(click))
        .route("/api/game/speedclick/miss", post(miss))
        .route("/api/game/speedclick/end", post(end))
        .route("/api/game/speedclick/submit", post(submit))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn require_session_id(session_id: &str) -> Result<(), ApiError> {
    if session_id.is_empty() {
        return Err(ApiError::BadRequest("Session ID required"));
    }
    Ok(())
}

/// Trim `nickname` and check its length.
pub fn validate_nickname(nickname: &str) -> Result<&str, ApiError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_NICKNAME_LEN {
        return Err(ApiError::BadRequest("Invalid nickname"));
    }
    Ok(trimmed)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<Vec<ScoreRecord>>, ApiError> {
    state
        .sessions
        .scores()
        .ranking(query.game(), query.limit())
        .await
        .map(Json)
        .map_err(|e| {
            warn!("Ranking query failed: {}", e);
            ApiError::Internal("Failed to get ranking")
        })
}

async fn start(State(state): State<AppState>) -> Json<StartResponse> {
    let started = state.sessions.start_session().await;
    Json(StartResponse {
        session_id: started.session_id,
        seed: started.seed,
        start_time: started.start_time,
    })
}

async fn click(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<ClickResponse>, ApiError> {
    require_session_id(&req.session_id)?;

    let response = match state
        .sessions
        .process_click(&req.session_id, req.ball_index, req.click_time_ms)
        .await
    {
        Ok(outcome) => ClickResponse {
            valid: true,
            points: outcome.points,
            score: outcome.score,
            lives: outcome.lives,
            game_over: outcome.game_over,
            message: None,
        },
        Err(e) => ClickResponse {
            message: Some(e.to_string()),
            ..ClickResponse::default()
        },
    };
    Ok(Json(response))
}

async fn miss(
    State(state): State<AppState>,
    Json(req): Json<MissRequest>,
) -> Result<Json<MissResponse>, ApiError> {
    require_session_id(&req.session_id)?;

    let response = match state.sessions.process_miss(&req.session_id, req.ball_index).await {
        Ok(outcome) => MissResponse {
            valid: true,
            lives: outcome.lives,
            game_over: outcome.game_over,
        },
        Err(_) => MissResponse::default(),
    };
    Ok(Json(response))
}

async fn end(
    State(state): State<AppState>,
    Json(req): Json<EndRequest>,
) -> Result<Json<EndResponse>, ApiError> {
    require_session_id(&req.session_id)?;

    let response = match state.sessions.end_session(&req.session_id).await {
        Ok(outcome) => EndResponse {
            final_score: outcome.final_score,
            can_submit: outcome.can_submit,
        },
        Err(_) => EndResponse::default(),
    };
    Ok(Json(response))
}

async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    require_session_id(&req.session_id)?;
    let nickname = validate_nickname(&req.nickname)?;

    let response = match state.sessions.submit_score(&req.session_id, nickname).await {
        Ok(id) => SubmitResponse {
            success: true,
            score_id: Some(id),
        },
        Err(SubmitError::Rejected(e)) => {
            debug!("Session {} submit rejected: {}", req.session_id, e);
            SubmitResponse::default()
        }
        Err(SubmitError::Store(_)) => SubmitResponse::default(),
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryScoreStore, ScoreStore, StoreError};
    use crate::solo::{generate_ball, SessionConfig};

    fn app_state() -> AppState {
        let scores = Arc::new(InMemoryScoreStore::new());
        AppState {
            sessions: Arc::new(SessionStore::new(SessionConfig::default(), scores)),
        }
    }

    async fn started(state: &AppState) -> StartResponse {
        start(State(state.clone())).await.0
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_click_on_generated_ball_is_accepted() {
        let state = app_state();
        let run = started(&state).await;
        // Ball times are relative to the session start.
        let ball = generate_ball(run.seed, 0, 0, 0);

        let Json(res) = click(
            State(state.clone()),
            Json(ClickRequest {
                session_id: run.session_id,
                ball_index: 0,
                click_time_ms: ball.spawn_time + 1,
            }),
        )
        .await
        .unwrap();

        assert!(res.valid);
        assert!(res.message.is_none());
        if ball.is_red {
            assert!(res.points > 0);
            assert_eq!(res.score, res.points);
            assert_eq!(res.lives, 3);
        } else {
            assert_eq!(res.lives, 2);
        }
    }

    #[tokio::test]
    async fn test_rejected_click_carries_message() {
        let state = app_state();
        let run = started(&state).await;

        let Json(res) = click(
            State(state.clone()),
            Json(ClickRequest {
                session_id: run.session_id,
                ball_index: 5,
                click_time_ms: 0,
            }),
        )
        .await
        .unwrap();

        assert!(!res.valid);
        assert_eq!(res.message.as_deref(), Some("invalid ball index"));

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["gameOver"], false);
        assert_eq!(json["message"], "invalid ball index");
    }

    #[tokio::test]
    async fn test_empty_session_id_is_bad_request() {
        let state = app_state();

        let err = miss(
            State(state),
            Json(MissRequest {
                session_id: String::new(),
                ball_index: 0,
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_end_unknown_session() {
        let state = app_state();

        let Json(res) = end(
            State(state),
            Json(EndRequest {
                session_id: "missing".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(res, EndResponse { final_score: 0, can_submit: false });
    }

    #[tokio::test]
    async fn test_submit_flow_and_ranking() {
        let state = app_state();
        let run = started(&state).await;
        let session_id = run.session_id.clone();

        end(State(state.clone()), Json(EndRequest { session_id: session_id.clone() }))
            .await
            .unwrap();

        let Json(first) = submit(
            State(state.clone()),
            Json(SubmitRequest {
                session_id: session_id.clone(),
                nickname: "  ann  ".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(first.success);
        assert!(first.score_id.is_some());

        let Json(second) = submit(
            State(state.clone()),
            Json(SubmitRequest {
                session_id,
                nickname: "ann".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(second, SubmitResponse::default());
        assert_eq!(serde_json::to_value(&second).unwrap(), serde_json::json!({ "success": false }));

        let Json(rows) = ranking(State(state), Query(RankingQuery::default())).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nickname, "ann");
        assert_eq!(rows[0].game, SPEEDCLICK_GAME);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_nickname() {
        let state = app_state();
        let run = started(&state).await;

        for nickname in ["", "   ", "abcdefghijklmnopqrstu"] {
            let err = submit(
                State(state.clone()),
                Json(SubmitRequest {
                    session_id: run.session_id.clone(),
                    nickname: nickname.to_string(),
                }),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ApiError::BadRequest("Invalid nickname")));
        }
    }

    #[test]
    fn test_ranking_limit_bounds() {
        let query = |limit: &str| RankingQuery {
            game: None,
            limit: Some(limit.to_string()),
        };

        assert_eq!(RankingQuery::default().limit(), 10);
        assert_eq!(query("25").limit(), 25);
        assert_eq!(query("100").limit(), 100);
        assert_eq!(query("0").limit(), 10);
        assert_eq!(query("101").limit(), 10);
        assert_eq!(query("abc").limit(), 10);
        assert_eq!(RankingQuery::default().game(), SPEEDCLICK_GAME);
    }

    struct UnreachableScores;

    #[async_trait::async_trait]
    impl ScoreStore for UnreachableScores {
        async fn save_score(&self, _: &str, _: &str, _: i64) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn ranking(&self, _: &str, _: usize) -> Result<Vec<ScoreRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ranking_store_failure_is_internal_error() {
        let state = AppState {
            sessions: Arc::new(SessionStore::new(
                SessionConfig::default(),
                Arc::new(UnreachableScores),
            )),
        };

        let err = ranking(State(state), Query(RankingQuery::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_nickname_is_trimmed() {
        assert_eq!(validate_nickname("  bob ").unwrap(), "bob");
        assert!(validate_nickname(&"x".repeat(MAX_NICKNAME_LEN)).is_ok());
    }
}
