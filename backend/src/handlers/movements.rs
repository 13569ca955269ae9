//! Audit log handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::audit::Movement;
use crate::services::AuditService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportQuery {
    pub limit: Option<i64>,
}

pub async fn my_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Movement>>, AppError> {
    let service = AuditService::new(state.db.clone());
    Ok(Json(service.my_history(user.user_id).await?))
}

/// Recent movements as a CSV download
pub async fn export_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let service = AuditService::new(state.db.clone());
    let csv = service
        .export_csv(query.limit.unwrap_or(1000).clamp(1, 10_000))
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"movimientos.csv\"",
            ),
        ],
        csv,
    ))
}
