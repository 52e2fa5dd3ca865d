use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::error::{TournamentError, TournamentResult};
use crate::session::TournamentSession;
use crate::types::*;

// ── Errors ─────────────────────────────────────────────────────────────

/// A `TournamentError` on its way out as `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError(pub TournamentError);

impl From<TournamentError> for ApiError {
    fn from(err: TournamentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ── Session access ─────────────────────────────────────────────────────

/// Session actions may block on the remote, so they run off the async
/// workers with the session lock held for the whole action.
async fn with_session<T, F>(session: SharedSession, action: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut TournamentSession) -> TournamentResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = session.lock().unwrap_or_else(|e| e.into_inner());
        action(&mut guard)
    })
    .await
    .map_err(|e| ApiError(TournamentError::persistence(format!("session task failed: {e}"))))?
    .map_err(ApiError)
}

fn respond(session: &TournamentSession, notices: Vec<Notice>) -> ActionResponse {
    ActionResponse {
        notices: notices.into_iter().map(NoticePayload::from).collect(),
        state: session.snapshot(),
    }
}

// ── Handlers ───────────────────────────────────────────────────────────

async fn get_state_json(AxumState(session): AxumState<SharedSession>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = with_session(session, |s| Ok(s.snapshot())).await?;
    Ok((
        [
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
            ("Expires", "0"),
        ],
        Json(snapshot),
    ))
}

async fn login(
    AxumState(session): AxumState<SharedSession>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_session(session, move |s| {
        s.login(&req.code)?;
        Ok(Json(respond(s, Vec::new())))
    })
    .await
}

async fn logout(AxumState(session): AxumState<SharedSession>) -> Result<Json<ActionResponse>, ApiError> {
    with_session(session, |s| {
        s.logout();
        Ok(Json(respond(s, Vec::new())))
    })
    .await
}

async fn generate(
    AxumState(session): AxumState<SharedSession>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_session(session, move |s| {
        let notices = s.generate(&req.participants_text)?;
        Ok(Json(respond(s, notices)))
    })
    .await
}

async fn advance(
    AxumState(session): AxumState<SharedSession>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    with_session(session, move |s| {
        let notices = s.advance_winner(req.round_index, req.match_index, req.slot_index)?;
        Ok(Json(respond(s, notices)))
    })
    .await
}

async fn clear(AxumState(session): AxumState<SharedSession>) -> Result<Json<ActionResponse>, ApiError> {
    with_session(session, |s| {
        let notices = s.clear()?;
        Ok(Json(respond(s, notices)))
    })
    .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeQuery {
    round_index: usize,
    match_index: usize,
}

async fn describe(
    AxumState(session): AxumState<SharedSession>,
    Query(query): Query<DescribeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_session(session, move |s| {
        let title = s
            .describe(query.round_index, query.match_index)
            .ok_or_else(|| TournamentError::invalid_move("That match does not exist."))?;
        Ok(Json(json!({ "title": title })))
    })
    .await
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn router(session: SharedSession, view_dir: PathBuf) -> Router {
    Router::new()
        .route("/state.json", get(get_state_json))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/generate", post(generate))
        .route("/api/advance", post(advance))
        .route("/api/clear", post(clear))
        .route("/api/describe", get(describe))
        .fallback_service(ServeDir::new(view_dir))
        .with_state(session)
}

pub async fn start_server(session: SharedSession, view_dir: PathBuf, addr: &str) {
    let app = router(session, view_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("bracket server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("bracket server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("bracket server error: {e}");
    }
}
