//! Transfer request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{PendingCounts, Sector, TransferRequest};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::transfer::{
    BulkApproveInput, BulkApproveResult, CreateTransferInput, LabRejectInput,
    ResolveTransferInput, TransferView,
};
use crate::services::TransferService;
use crate::AppState;

#[derive(Deserialize)]
pub struct PendingQuery {
    pub sector: Option<String>,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> Result<(StatusCode, Json<TransferRequest>), AppError> {
    let service = TransferService::new(state.db.clone());
    let request = service.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn pending_transfers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<TransferView>>, AppError> {
    user.require_supervisor()?;
    let sector = match query.sector.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            Sector::from_str(raw)
                .ok_or_else(|| AppError::validation("sector", format!("Sector desconocido: {}", raw)))?,
        ),
        None => None,
    };
    let service = TransferService::new(state.db.clone());
    Ok(Json(service.pending(sector).await?))
}

pub async fn pending_counts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PendingCounts>, AppError> {
    user.require_supervisor()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(service.counts().await?))
}

pub async fn transfer_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TransferView>>, AppError> {
    user.require_supervisor()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(service.history().await?))
}

pub async fn lab_pending_transfers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<TransferView>>, AppError> {
    user.require_lab()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(service.lab_pending().await?))
}

pub async fn lab_approve_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<TransferRequest>, AppError> {
    user.require_lab()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(service.lab_approve(user.user_id, transfer_id).await?))
}

pub async fn lab_reject_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Option<Json<LabRejectInput>>,
) -> Result<Json<TransferRequest>, AppError> {
    user.require_lab()?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = TransferService::new(state.db.clone());
    Ok(Json(
        service.lab_reject(user.user_id, transfer_id, input).await?,
    ))
}

/// Approve and execute
pub async fn approve_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Option<Json<ResolveTransferInput>>,
) -> Result<Json<TransferRequest>, AppError> {
    user.require_supervisor()?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = TransferService::new(state.db.clone());
    Ok(Json(
        service
            .approve(user.user_id, &user.profile(), transfer_id, input)
            .await?,
    ))
}

pub async fn approve_hydro_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<TransferRequest>, AppError> {
    user.require_supervisor()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(
        service
            .approve_hydro(user.user_id, &user.profile(), transfer_id)
            .await?,
    ))
}

pub async fn reject_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Option<Json<ResolveTransferInput>>,
) -> Result<Json<TransferRequest>, AppError> {
    user.require_supervisor()?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = TransferService::new(state.db.clone());
    Ok(Json(
        service
            .reject(user.user_id, &user.profile(), transfer_id, input)
            .await?,
    ))
}

pub async fn approve_bulk(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<BulkApproveInput>,
) -> Result<Json<BulkApproveResult>, AppError> {
    user.require_supervisor()?;
    let service = TransferService::new(state.db.clone());
    Ok(Json(
        service
            .approve_bulk(user.user_id, &user.profile(), input)
            .await?,
    ))
}
