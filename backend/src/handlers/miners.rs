//! Miner registry handlers

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{Miner, MinerState, Position};

use crate::error::AppError;
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::miner::{FleetSummary, MinerSearchResult, RackSlot, SaveMinerInput};
use crate::services::MinerService;
use crate::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Full coordinates for placing a miner
#[derive(Deserialize)]
pub struct InsertRequest {
    pub wh: i32,
    pub rack: i32,
    pub fila: i32,
    pub columna: i32,
}

fn ensure_warehouse_access(user: &AuthUser, wh: i32) -> Result<(), AppError> {
    if user.has_warehouse_access(wh) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("No access to warehouse {}", wh),
            message_es: format!("Sin acceso al WH{}", wh),
        })
    }
}

pub async fn search_miners(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MinerSearchResult>>, AppError> {
    if query.q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.search(&query.q).await?))
}

pub async fn miners_by_state(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(estado): Path<String>,
) -> Result<Json<Vec<Miner>>, AppError> {
    let estado = MinerState::from_str(&estado)
        .ok_or_else(|| AppError::validation("estado", format!("Estado desconocido: {}", estado)))?;
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.by_state(estado).await?))
}

pub async fn get_miner_at(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path((wh, rack, fila, columna)): Path<(i32, i32, i32, i32)>,
) -> Result<Json<Miner>, AppError> {
    let service = MinerService::new(state.db.clone());
    let miner = service
        .get_by_position(Position::new(wh, rack, fila, columna))
        .await?;
    Ok(Json(miner))
}

pub async fn get_miner(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(miner_id): Path<Uuid>,
) -> Result<Json<Miner>, AppError> {
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.get_by_id(miner_id).await?))
}

/// Create or update the miner at a position
pub async fn save_miner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<SaveMinerInput>,
) -> Result<Json<Miner>, AppError> {
    ensure_warehouse_access(&user, input.wh)?;
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.save(user.user_id, input).await?))
}

pub async fn rack_grid(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((wh, rack)): Path<(i32, i32)>,
) -> Result<Json<BTreeMap<String, RackSlot>>, AppError> {
    ensure_warehouse_access(&user, wh)?;
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.rack_grid(wh, rack).await?))
}

pub async fn pending_placement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(wh): Path<i32>,
) -> Result<Json<Vec<Miner>>, AppError> {
    ensure_warehouse_access(&user, wh)?;
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.pending_placement(wh).await?))
}

pub async fn insert_miner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
    Json(body): Json<InsertRequest>,
) -> Result<Json<Miner>, AppError> {
    ensure_warehouse_access(&user, body.wh)?;
    let position = Position::from_parts(
        Some(body.wh),
        Some(body.rack),
        Some(body.fila),
        Some(body.columna),
    )
    .ok_or_else(|| AppError::validation("posicion", "Coordenadas incompletas"))?;

    let service = MinerService::new(state.db.clone());
    Ok(Json(service.insert(user.user_id, miner_id, position).await?))
}

pub async fn empty_position(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((wh, rack, fila, columna)): Path<(i32, i32, i32, i32)>,
) -> Result<StatusCode, AppError> {
    ensure_warehouse_access(&user, wh)?;
    let service = MinerService::new(state.db.clone());
    service
        .empty_position(user.user_id, Position::new(wh, rack, fila, columna))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Air vs hydro fleet counts
pub async fn fleet_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<FleetSummary>, AppError> {
    user.require_supervisor()?;
    let service = MinerService::new(state.db.clone());
    Ok(Json(service.summary().await?))
}
