use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::{Result as WebResult, WebError};
use crate::content::{ThemeSummary, WordSource};
use crate::game::{EliminationResult, HistoryEntry, PlayerId, PublicView, RoleCounts};
use crate::state::AppState;

pub const PLAYER_ID_HEADER: &str = "x-player-id";
const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

#[derive(Deserialize, Debug, Default)]
pub struct CreateGameRequest {
    pub theme_id: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct CreateGameResponse {
    pub game_id: String,
}

#[derive(Deserialize, Debug)]
pub struct AddPlayerRequest {
    pub name: String,
}

#[derive(Serialize, Debug)]
pub struct AddPlayerResponse {
    pub player_id: PlayerId,
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct AssignRolesRequest {
    pub undercover_count: usize,
    pub mr_white_count: usize,
    #[serde(default)]
    pub jester_count: usize,
    #[serde(default)]
    pub bodyguard_count: usize,
}

#[derive(Deserialize, Debug)]
pub struct VoteRequest {
    pub voter_id: PlayerId,
    pub target_player_id: PlayerId,
}

#[derive(Serialize, Debug)]
pub struct VoteResponse {
    pub success: bool,
    pub target_votes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<EliminationResult>,
}

#[derive(Deserialize, Debug)]
pub struct ProtectRequest {
    pub bodyguard_id: PlayerId,
    pub target_player_id: PlayerId,
}

#[derive(Deserialize, Debug)]
pub struct EliminateRequest {
    pub target_player_id: PlayerId,
    pub mr_white_guess: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize, Debug)]
pub struct HistoryResponse {
    pub games: Vec<HistoryEntry>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerateWordRequest {
    pub theme_id: Option<String>,
}

/// Identifies a drawn pair without giving away its words.
#[derive(Serialize, Debug)]
pub struct WordPairResponse {
    pub pair_id: String,
    pub theme_id: String,
}

fn viewer_from_headers(headers: &HeaderMap) -> WebResult<Option<PlayerId>> {
    let Some(raw) = headers.get(PLAYER_ID_HEADER) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| WebError::BadRequest("Invalid X-Player-ID header".to_string()))?;
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| WebError::BadRequest("Invalid X-Player-ID header".to_string()))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_game_handler(
    State(app_state): State<AppState>,
    payload: Option<Json<CreateGameRequest>>,
) -> WebResult<(StatusCode, Json<CreateGameResponse>)> {
    let Json(payload) = payload.unwrap_or_default();
    tracing::info!(theme.id = ?payload.theme_id, "HTTP: create game");

    let game_id = app_state
        .engine
        .create_game(payload.theme_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(CreateGameResponse { game_id })))
}

pub async fn get_game_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
) -> WebResult<Json<PublicView>> {
    let viewer = viewer_from_headers(&headers)?;
    Ok(Json(app_state.engine.view(&game_id, viewer).await?))
}

pub async fn delete_game_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
) -> WebResult<StatusCode> {
    if !app_state.engine.delete_game(&game_id).await? {
        return Err(WebError::NotFound(format!("Game {} not found", game_id)));
    }
    app_state.dispatcher.game_deleted(&game_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_player_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<AddPlayerRequest>,
) -> WebResult<(StatusCode, Json<AddPlayerResponse>)> {
    let player = app_state.engine.add_player(&game_id, &payload.name).await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok((
        StatusCode::CREATED,
        Json(AddPlayerResponse {
            player_id: player.id,
            name: player.name,
        }),
    ))
}

pub async fn kick_player_handler(
    State(app_state): State<AppState>,
    Path((game_id, player_id)): Path<(String, PlayerId)>,
) -> WebResult<Json<Value>> {
    let removed = app_state.engine.kick_player(&game_id, player_id).await?;
    if removed {
        app_state
            .dispatcher
            .player_removed(&game_id, player_id)
            .await;
        app_state.dispatcher.broadcast(&game_id).await;
    }
    Ok(Json(json!({ "removed": removed })))
}

pub async fn assign_roles_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<AssignRolesRequest>,
) -> WebResult<StatusCode> {
    let counts = RoleCounts {
        undercover: payload.undercover_count,
        mr_white: payload.mr_white_count,
        jester: payload.jester_count,
        bodyguard: payload.bodyguard_count,
    };
    app_state.engine.assign_roles(&game_id, counts).await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restart_game_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
) -> WebResult<StatusCode> {
    if !app_state.engine.restart_game(&game_id).await? {
        return Err(WebError::NotFound(format!("Game {} not found", game_id)));
    }
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn open_voting_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
) -> WebResult<StatusCode> {
    app_state.engine.open_voting(&game_id).await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn advance_turn_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
) -> WebResult<Json<Value>> {
    let current = app_state.engine.advance_turn(&game_id).await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(Json(json!({ "current_turn_player_id": current })))
}

pub async fn cast_vote_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> WebResult<Json<VoteResponse>> {
    let outcome = app_state
        .engine
        .cast_vote(&game_id, payload.voter_id, payload.target_player_id)
        .await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(Json(VoteResponse {
        success: true,
        target_votes: outcome.target_votes,
        round: outcome.round,
    }))
}

pub async fn protect_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<ProtectRequest>,
) -> WebResult<StatusCode> {
    app_state
        .engine
        .protect_player(&game_id, payload.bodyguard_id, payload.target_player_id)
        .await?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn eliminate_handler(
    State(app_state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<EliminateRequest>,
) -> WebResult<Json<EliminationResult>> {
    let result = app_state
        .engine
        .eliminate_player(
            &game_id,
            payload.target_player_id,
            payload.mr_white_guess.as_deref(),
        )
        .await?
        .ok_or_else(|| WebError::BadRequest("Cannot eliminate player".to_string()))?;
    app_state.dispatcher.broadcast(&game_id).await;
    Ok(Json(result))
}

pub async fn game_history_handler(
    State(app_state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> WebResult<Json<HistoryResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let games = app_state.engine.finished_games(limit).await?;
    Ok(Json(HistoryResponse { games }))
}

pub async fn list_themes_handler(State(app_state): State<AppState>) -> Json<Vec<ThemeSummary>> {
    Json(app_state.words.catalog().await.themes())
}

pub async fn generate_word_handler(
    State(app_state): State<AppState>,
    payload: Option<Json<GenerateWordRequest>>,
) -> WebResult<Json<WordPairResponse>> {
    let Json(payload) = payload.unwrap_or_default();
    let pair = app_state
        .engine
        .draw_pair(payload.theme_id.as_deref())
        .await?;
    Ok(Json(WordPairResponse {
        pair_id: pair.pair_id,
        theme_id: pair.theme_id,
    }))
}

pub async fn refresh_words_handler(
    State(app_state): State<AppState>,
) -> WebResult<Json<Vec<ThemeSummary>>> {
    tracing::info!("HTTP: refresh words");
    Ok(Json(app_state.words.refresh().await?))
}
