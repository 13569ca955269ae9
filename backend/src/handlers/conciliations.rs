//! Conciliation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::PartRequest;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::conciliation::{CedeToLabInput, CreateConciliationInput, PartRequestView};
use crate::services::ConciliationService;
use crate::AppState;

pub async fn create_conciliation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateConciliationInput>,
) -> Result<(StatusCode, Json<PartRequest>), AppError> {
    let service = ConciliationService::new(state.db.clone());
    let request = service.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Open conciliations raised by the current user
pub async fn my_conciliations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PartRequestView>>, AppError> {
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(service.mine(user.user_id).await?))
}

pub async fn lab_pending_conciliations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PartRequestView>>, AppError> {
    user.require_lab()?;
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(service.lab_pending().await?))
}

pub async fn lab_approve_conciliation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PartRequest>, AppError> {
    user.require_lab()?;
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(service.lab_approve(user.user_id, request_id).await?))
}

pub async fn lab_reject_conciliation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PartRequest>, AppError> {
    user.require_lab()?;
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(service.lab_reject(user.user_id, request_id).await?))
}

pub async fn confirm_receipt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PartRequest>, AppError> {
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(service.confirm_receipt(user.user_id, request_id).await?))
}

pub async fn finish_conciliation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PartRequest>, AppError> {
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(
        service
            .finish(user.user_id, &user.profile(), request_id)
            .await?,
    ))
}

pub async fn cede_to_lab(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
    body: Option<Json<CedeToLabInput>>,
) -> Result<Json<PartRequest>, AppError> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = ConciliationService::new(state.db.clone());
    Ok(Json(
        service
            .cede_to_lab(user.user_id, &user.profile(), request_id, input)
            .await?,
    ))
}
