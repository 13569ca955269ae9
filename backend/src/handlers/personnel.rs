//! Personnel and role handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use shared::Role;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::personnel::{
    PersonnelByLocation, PersonnelEntry, PersonnelSummary, UpdateAssignmentsInput,
};
use crate::services::{PersonnelService, RoleService};
use crate::AppState;

#[derive(Serialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}

pub async fn list_personnel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PersonnelEntry>>, AppError> {
    user.require_supervisor()?;
    let service = PersonnelService::new(state.db.clone());
    Ok(Json(service.list(&user.profile()).await?))
}

pub async fn personnel_by_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PersonnelByLocation>, AppError> {
    user.require_supervisor()?;
    let service = PersonnelService::new(state.db.clone());
    Ok(Json(service.by_location(&user.profile()).await?))
}

pub async fn personnel_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PersonnelSummary>, AppError> {
    user.require_supervisor()?;
    let service = PersonnelService::new(state.db.clone());
    Ok(Json(service.summary(&user.profile()).await?))
}

pub async fn update_assignments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<Uuid>,
    Json(input): Json<UpdateAssignmentsInput>,
) -> Result<Json<PersonnelEntry>, AppError> {
    let service = PersonnelService::new(state.db.clone());
    let entry = service
        .update_assignments(user.user_id, &user.profile(), target_id, input)
        .await?;
    Ok(Json(entry))
}

pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<RolesResponse>, AppError> {
    let service = RoleService::new(state.db.clone());
    let roles = service.list_roles().await?;
    Ok(Json(RolesResponse { roles }))
}

pub async fn get_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    user.require_admin()?;
    let service = RoleService::new(state.db.clone());
    Ok(Json(service.get_role(role_id).await?))
}
