use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use buzzline_core::error::RoomError;
use buzzline_core::snapshot::RoomSnapshot;

use crate::commands::{self, MarkResult};
use crate::error::ApiError;
use crate::registry::{RoomListing, ShareClaim};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub code: String,
    pub host_secret: String,
}

/// POST /api/session — create a room, returning its code and host secret.
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let (code, host_secret) = commands::create_room(&state).await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { code, host_secret }),
    )
}

/// GET /api/rooms — public room list, newest first.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomListing>> {
    Json(state.registry.list().await)
}

/// GET /api/session/{code} — unauthenticated snapshot. Served as the player
/// role so spectators never see answers or share digits.
pub async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    Ok(Json(commands::room_snapshot(&state, &code).await?))
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub player_id: String,
}

/// POST /api/session/{code}/join
pub async fn join_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<JoinBody>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError> {
    let player_id = commands::join_room(&state, &code, &body.name).await?;
    Ok((StatusCode::CREATED, Json(JoinResponse { player_id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBody {
    pub player_id: String,
}

/// POST /api/session/{code}/leave
pub async fn leave_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<LeaveBody>,
) -> Result<StatusCode, ApiError> {
    commands::leave_room(&state, &code, &body.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBody {
    pub host_secret: String,
}

/// POST /api/session/{code}/destroy
pub async fn destroy_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<HostBody>,
) -> Result<StatusCode, ApiError> {
    commands::destroy_room(&state, &code, &body.host_secret).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub share_code: String,
    pub expires_at: u64,
}

/// POST /api/session/{code}/share — bind a second host device.
pub async fn share_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<HostBody>,
) -> Result<Json<ShareResponse>, ApiError> {
    let (share_code, expires_at) = commands::issue_share(&state, &code, &body.host_secret).await?;
    Ok(Json(ShareResponse {
        share_code,
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    pub share_code: String,
}

/// POST /api/share/claim
pub async fn claim_share(
    State(state): State<AppState>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<ShareClaim>, ApiError> {
    Ok(Json(commands::claim_share(&state, &body.share_code).await?))
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBody {
    pub host_secret: String,
    pub player_id: String,
}

/// POST /api/session/{code}/turn
pub async fn set_turn(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<OkResponse>, ApiError> {
    commands::set_turn(&state, &code, &body.host_secret, &body.player_id).await?;
    Ok(OkResponse::ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateBody {
    pub host_secret: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// POST /api/session/{code}/question/activate
pub async fn activate_question(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<ActivateBody>,
) -> Result<Json<OkResponse>, ApiError> {
    commands::activate_question(&state, &code, &body.host_secret, body.category, body.difficulty)
        .await?;
    Ok(OkResponse::ok())
}

/// POST /api/session/{code}/question/open
pub async fn open_buzzers(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<HostBody>,
) -> Result<Json<OkResponse>, ApiError> {
    commands::open_buzzers(&state, &code, &body.host_secret).await?;
    Ok(OkResponse::ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkBody {
    pub host_secret: String,
    pub result: String,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub open_buzzers: Option<bool>,
}

/// POST /api/session/{code}/question/mark
pub async fn mark_question(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<MarkBody>,
) -> Result<Json<OkResponse>, ApiError> {
    let result = match body.result.as_str() {
        "correct" => MarkResult::Correct,
        "incorrect" => MarkResult::Incorrect,
        _ => {
            return Err(ApiError(RoomError::Validation(
                "result must be correct or incorrect".into(),
            )));
        },
    };
    commands::mark_question(
        &state,
        &code,
        &body.host_secret,
        result,
        body.player_id,
        body.open_buzzers.unwrap_or(false),
    )
    .await?;
    Ok(OkResponse::ok())
}

/// POST /api/session/{code}/question/cancel
pub async fn cancel_question(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<HostBody>,
) -> Result<Json<OkResponse>, ApiError> {
    commands::cancel_question(&state, &code, &body.host_secret).await?;
    Ok(OkResponse::ok())
}

/// Structured health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub rooms: usize,
    pub players: usize,
    pub connections: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (rooms, players, connections) = state.registry.stats().await;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        rooms,
        players,
        connections,
    })
}
