//! Warranty handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::ImportSummary;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::warranty::WarrantyInfo;
use crate::services::WarrantyService;
use crate::AppState;

pub async fn warranty_status(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(miner_id): Path<Uuid>,
) -> Result<Json<WarrantyInfo>, AppError> {
    let service = WarrantyService::new(state.db.clone(), &state.config);
    Ok(Json(service.status(miner_id).await?))
}

/// Import expiry dates from a CSV request body
pub async fn import_warranties(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    user.require_supervisor()?;
    if body.trim().is_empty() {
        return Err(AppError::validation("archivo", "Archivo vacío"));
    }
    let service = WarrantyService::new(state.db.clone(), &state.config);
    Ok(Json(service.import_csv(user.user_id, &body).await?))
}
