//! Diagnosis handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use shared::{history_warehouse_filter, Diagnostic, PaginatedResponse};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::diagnostic::{DiagnosticEntry, RecordDiagnosticInput};
use crate::services::DiagnosticService;
use crate::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    /// Warehouse number or "Hydro"
    pub wh: Option<String>,
    pub page: Option<u32>,
}

pub async fn record_diagnostic(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<RecordDiagnosticInput>,
) -> Result<(StatusCode, Json<Diagnostic>), AppError> {
    let service = DiagnosticService::new(state.db.clone());
    let diagnostic = service.record(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(diagnostic)))
}

pub async fn diagnostic_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PaginatedResponse<DiagnosticEntry>>, AppError> {
    user.require_admin()?;
    let service = DiagnosticService::new(state.db.clone());
    let history = service
        .history(
            history_warehouse_filter(query.wh.as_deref()),
            query.page.unwrap_or(1),
        )
        .await?;
    Ok(Json(history))
}
