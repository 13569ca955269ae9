//! Repair lab handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{LabStats, Miner, Sector};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::lab::{FinishRepairInput, ReinstallInput, ScrapInput};
use crate::services::LabService;
use crate::AppState;

#[derive(Deserialize)]
pub struct StockQuery {
    pub sector: Option<String>,
}

pub async fn lab_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<LabStats>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.stats().await?))
}

pub async fn lab_pending(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Miner>>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.pending().await?))
}

pub async fn lab_in_repair(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Miner>>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.in_repair().await?))
}

pub async fn lab_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StockQuery>,
) -> Result<Json<Vec<Miner>>, AppError> {
    user.require_lab()?;
    // Unknown sector values list everything
    let sector = query.sector.as_deref().and_then(Sector::from_str);
    let service = LabService::new(state.db.clone());
    Ok(Json(service.stock(sector).await?))
}

pub async fn lab_cemetery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Miner>>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.cemetery().await?))
}

pub async fn start_repair(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
) -> Result<Json<Miner>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.start_repair(user.user_id, miner_id).await?))
}

pub async fn finish_repair(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
    body: Option<Json<FinishRepairInput>>,
) -> Result<Json<Miner>, AppError> {
    user.require_lab()?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = LabService::new(state.db.clone());
    Ok(Json(
        service.finish_repair(user.user_id, miner_id, input).await?,
    ))
}

pub async fn scrap_miner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
    Json(input): Json<ScrapInput>,
) -> Result<Json<Miner>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.scrap(user.user_id, miner_id, input).await?))
}

pub async fn reinstall(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
    Json(input): Json<ReinstallInput>,
) -> Result<Json<Miner>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.reinstall(user.user_id, miner_id, input).await?))
}

pub async fn reinstall_origin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(miner_id): Path<Uuid>,
) -> Result<Json<Miner>, AppError> {
    user.require_lab()?;
    let service = LabService::new(state.db.clone());
    Ok(Json(service.reinstall_origin(user.user_id, miner_id).await?))
}
