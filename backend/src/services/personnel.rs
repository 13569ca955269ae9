//! Field staff and their warehouse / container assignments

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::{
    format_assignment, is_assignable_role, join_id_list, parse_id_list, RoleProfile, Sector,
};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PersonnelService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct StaffRow {
    id: Uuid,
    username: String,
    nombre_puesto: String,
    departamento: String,
    wh_asignados: Option<String>,
    containers_asignados: Option<String>,
}

impl StaffRow {
    fn is_supervisor(&self) -> bool {
        self.nombre_puesto.contains("Supervisor")
    }
}

/// A staff member as shown on the assignment panel
#[derive(Debug, Clone, Serialize)]
pub struct PersonnelEntry {
    pub id: Uuid,
    pub username: String,
    pub puesto: String,
    pub departamento: String,
    pub es_supervisor: bool,
    pub wh_asignados: Vec<i32>,
    pub containers_asignados: Vec<i32>,
    pub asignacion: String,
}

impl From<StaffRow> for PersonnelEntry {
    fn from(row: StaffRow) -> Self {
        let wh = parse_id_list(row.wh_asignados.as_deref());
        let containers = parse_id_list(row.containers_asignados.as_deref());
        let as_strings = |ids: &[i32]| ids.iter().map(i32::to_string).collect::<Vec<_>>();
        PersonnelEntry {
            es_supervisor: row.is_supervisor(),
            asignacion: format_assignment(&as_strings(&wh), &as_strings(&containers)),
            id: row.id,
            username: row.username,
            puesto: row.nombre_puesto,
            departamento: row.departamento,
            wh_asignados: wh,
            containers_asignados: containers,
        }
    }
}

/// Usernames grouped by warehouse and by Hydro container
#[derive(Debug, Default, Serialize)]
pub struct PersonnelByLocation {
    #[serde(rename = "WH")]
    pub wh: BTreeMap<i32, Vec<String>>,
    #[serde(rename = "Hydro")]
    pub hydro: BTreeMap<i32, Vec<String>>,
}

impl PersonnelByLocation {
    pub fn group(entries: &[PersonnelEntry]) -> Self {
        let mut grouped = Self::default();
        for entry in entries {
            for wh in &entry.wh_asignados {
                grouped.wh.entry(*wh).or_default().push(entry.username.clone());
            }
            for container in &entry.containers_asignados {
                grouped
                    .hydro
                    .entry(*container)
                    .or_default()
                    .push(entry.username.clone());
            }
        }
        grouped
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PersonnelSummary {
    pub supervisores: usize,
    pub tecnicos: usize,
    pub total: usize,
}

impl PersonnelSummary {
    pub fn tally(entries: &[PersonnelEntry]) -> Self {
        let supervisores = entries.iter().filter(|e| e.es_supervisor).count();
        Self {
            supervisores,
            tecnicos: entries.len() - supervisores,
            total: entries.len(),
        }
    }
}

/// New assignment lists. An absent list is left untouched; an empty one clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssignmentsInput {
    pub wh_asignados: Option<Vec<i32>>,
    pub containers_asignados: Option<Vec<i32>>,
}

/// Supervisors first, then by username
fn sort_entries(entries: &mut [PersonnelEntry]) {
    entries.sort_by(|a, b| {
        b.es_supervisor
            .cmp(&a.es_supervisor)
            .then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
    });
}

impl PersonnelService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Assignable staff visible to `viewer`
    pub async fn list(&self, viewer: &RoleProfile) -> AppResult<Vec<PersonnelEntry>> {
        let department = viewer.personnel_filter().map(|sector| match sector {
            Sector::Wh => "WH",
            Sector::Hydro => "Hydro",
        });

        let rows = sqlx::query_as::<_, StaffRow>(
            r#"
            SELECT u.id, u.username, r.nombre_puesto, r.departamento,
                   u.wh_asignados, u.containers_asignados
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.is_active
              AND ($1::TEXT IS NULL OR r.departamento = $1)
            "#,
        )
        .bind(department)
        .fetch_all(&self.db)
        .await?;

        let mut entries: Vec<PersonnelEntry> = rows
            .into_iter()
            .filter(|row| is_assignable_role(&row.nombre_puesto))
            .map(PersonnelEntry::from)
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    pub async fn by_location(&self, viewer: &RoleProfile) -> AppResult<PersonnelByLocation> {
        let entries = self.list(viewer).await?;
        Ok(PersonnelByLocation::group(&entries))
    }

    pub async fn summary(&self, viewer: &RoleProfile) -> AppResult<PersonnelSummary> {
        let entries = self.list(viewer).await?;
        Ok(PersonnelSummary::tally(&entries))
    }

    /// Change a staff member's assignments within the editor's scope
    pub async fn update_assignments(
        &self,
        editor_id: Uuid,
        editor: &RoleProfile,
        user_id: Uuid,
        input: UpdateAssignmentsInput,
    ) -> AppResult<PersonnelEntry> {
        let scope = editor.assignment_scope();
        if !scope.allows_any() {
            return Err(AppError::forbidden(
                "Solo coordinadores pueden modificar asignaciones",
            ));
        }
        let (wh_list, container_list) =
            scope.filter(input.wh_asignados, input.containers_asignados);

        let mut tx = self.db.begin().await?;

        let target = sqlx::query_as::<_, StaffRow>(
            r#"
            SELECT u.id, u.username, r.nombre_puesto, r.departamento,
                   u.wh_asignados, u.containers_asignados
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            FOR UPDATE OF u
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if !is_assignable_role(&target.nombre_puesto) {
            return Err(AppError::forbidden(format!(
                "El puesto '{}' no recibe asignaciones",
                target.nombre_puesto
            )));
        }

        let wh_asignados = match &wh_list {
            Some(ids) => join_id_list(ids),
            None => target.wh_asignados.clone(),
        };
        let containers_asignados = match &container_list {
            Some(ids) => join_id_list(ids),
            None => target.containers_asignados.clone(),
        };

        sqlx::query(
            "UPDATE users SET wh_asignados = $2, containers_asignados = $3 WHERE id = $1",
        )
        .bind(target.id)
        .bind(&wh_asignados)
        .bind(&containers_asignados)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %target.id,
            editor = %editor_id,
            wh = ?wh_asignados,
            containers = ?containers_asignados,
            "Assignments updated"
        );

        Ok(PersonnelEntry::from(StaffRow {
            wh_asignados,
            containers_asignados,
            ..target
        }))
    }
}
