//! Job roles

use sqlx::PgPool;
use uuid::Uuid;

use shared::{Role, RoleProfile};

use crate::error::{AppError, AppResult};

/// Role service for the seeded job roles
#[derive(Clone)]
pub struct RoleService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    nombre_puesto: String,
    departamento: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            nombre_puesto: row.nombre_puesto,
            departamento: row.departamento,
        }
    }
}

impl RoleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All roles, most privileged first
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, nombre_puesto, departamento FROM roles ORDER BY nombre_puesto",
        )
        .fetch_all(&self.db)
        .await?;

        let mut roles: Vec<Role> = rows.into_iter().map(Role::from).collect();
        roles.sort_by_key(|r| {
            std::cmp::Reverse(RoleProfile::new(r.nombre_puesto.clone(), r.departamento.clone()).level())
        });
        Ok(roles)
    }

    pub async fn get_role(&self, role_id: Uuid) -> AppResult<Role> {
        sqlx::query_as::<_, RoleRow>(
            "SELECT id, nombre_puesto, departamento FROM roles WHERE id = $1",
        )
        .bind(role_id)
        .fetch_optional(&self.db)
        .await?
        .map(Role::from)
        .ok_or_else(|| AppError::NotFound("Role".to_string()))
    }
}
