//! RMA handlers

use axum::{extract::State, http::StatusCode, Json};

use shared::Miner;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::rma::{CancelRmaInput, RegisterRmaInput};
use crate::services::RmaService;
use crate::AppState;

pub async fn register_rma(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<RegisterRmaInput>,
) -> Result<(StatusCode, Json<Miner>), AppError> {
    let service = RmaService::new(state.db.clone());
    let miner = service.register(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(miner)))
}

pub async fn cancel_rma(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CancelRmaInput>,
) -> Result<Json<Miner>, AppError> {
    let service = RmaService::new(state.db.clone());
    Ok(Json(service.cancel(user.user_id, input).await?))
}
