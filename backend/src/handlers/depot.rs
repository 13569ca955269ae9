//! Depot handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{DepotPiece, DepotStats, StockLevel};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::conciliation::PartRequestView;
use crate::services::depot::{
    CreatePieceInput, DispatchInput, MovementEntry, PieceFilter, UpdatePieceInput,
};
use crate::services::DepotService;
use crate::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn list_pieces(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<PieceFilter>,
) -> Result<Json<Vec<DepotPiece>>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.list_pieces(filter).await?))
}

pub async fn create_piece(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreatePieceInput>,
) -> Result<(StatusCode, Json<DepotPiece>), AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    let piece = service.create_piece(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(piece)))
}

pub async fn get_piece(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pieza_id): Path<Uuid>,
) -> Result<Json<DepotPiece>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.get_piece(pieza_id).await?))
}

pub async fn update_piece(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pieza_id): Path<Uuid>,
    Json(input): Json<UpdatePieceInput>,
) -> Result<Json<DepotPiece>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.update_piece(user.user_id, pieza_id, input).await?))
}

pub async fn dispatch_piece(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<DispatchInput>,
) -> Result<Json<DepotPiece>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.dispatch(user.user_id, input).await?))
}

/// Part requests waiting for a piece
pub async fn pending_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PartRequestView>>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.pending_requests().await?))
}

pub async fn movement_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MovementEntry>>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.history(query.limit).await?))
}

pub async fn depot_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DepotStats>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.stats().await?))
}

pub async fn stock_levels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<StockLevel>>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.stock().await?))
}

pub async fn low_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<StockLevel>>, AppError> {
    user.require_depot()?;
    let service = DepotService::new(state.db.clone());
    Ok(Json(service.low_stock().await?))
}
