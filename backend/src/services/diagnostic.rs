//! Field diagnoses and their history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    diagnosis_outcome, require_text, Diagnostic, PaginatedResponse, Pagination, PaginationMeta,
    HISTORY_PAGE_SIZE,
};

use super::audit::{self, actions};
use super::miner::{lock_miner, set_miner_state};
use crate::error::AppResult;

#[derive(Clone)]
pub struct DiagnosticService {
    db: PgPool,
}

/// Input for recording a diagnosis
#[derive(Debug, Deserialize, Validate)]
pub struct RecordDiagnosticInput {
    #[validate(range(min = 1))]
    pub wh: i32,
    #[validate(range(min = 1))]
    pub rack: i32,
    #[validate(range(min = 1))]
    pub fila: i32,
    #[validate(range(min = 1))]
    pub columna: i32,
    pub miner_id: Uuid,
    pub ip: Option<String>,
    pub sn_fisica: Option<String>,
    pub sn_digital: Option<String>,
    pub falla: Option<String>,
    pub observacion: Option<String>,
    pub solucion: Option<String>,
    #[serde(default)]
    pub marcar_solucionado: bool,
}

#[derive(Debug, FromRow)]
struct DiagnosticRow {
    id: Uuid,
    fecha: DateTime<Utc>,
    usuario_id: Option<Uuid>,
    miner_id: Uuid,
    warehouse_id: i32,
    rack_id: i32,
    fila: i32,
    columna: i32,
    ip_address: Option<String>,
    sn_fisica: Option<String>,
    sn_digital: Option<String>,
    falla: String,
    observacion: Option<String>,
    solucion: String,
}

impl From<DiagnosticRow> for Diagnostic {
    fn from(row: DiagnosticRow) -> Self {
        Diagnostic {
            id: row.id,
            fecha: row.fecha,
            usuario_id: row.usuario_id,
            miner_id: row.miner_id,
            warehouse_id: row.warehouse_id,
            rack_id: row.rack_id,
            fila: row.fila,
            columna: row.columna,
            ip_address: row.ip_address,
            sn_fisica: row.sn_fisica,
            sn_digital: row.sn_digital,
            falla: row.falla,
            observacion: row.observacion,
            solucion: row.solucion,
        }
    }
}

#[derive(Debug, FromRow)]
struct DiagnosticHistoryRow {
    #[sqlx(flatten)]
    diagnostic: DiagnosticRow,
    username: Option<String>,
}

/// History entry with the technician name and location label
#[derive(Debug, Serialize)]
pub struct DiagnosticEntry {
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
    pub usuario: String,
    pub ubicacion: String,
}

impl DiagnosticService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Store a diagnosis snapshot and update the miner
    pub async fn record(&self, user_id: Uuid, input: RecordDiagnosticInput) -> AppResult<Diagnostic> {
        input.validate()?;
        let falla = require_text("falla", input.falla.as_deref())?;
        let solucion = require_text("solucion", input.solucion.as_deref())?;

        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, input.miner_id).await?;

        let row = sqlx::query_as::<_, DiagnosticRow>(
            r#"
            INSERT INTO diagnostics (
                usuario_id, miner_id, warehouse_id, rack_id, fila, columna,
                ip_address, sn_fisica, sn_digital, falla, observacion, solucion
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, fecha, usuario_id, miner_id, warehouse_id, rack_id, fila, columna,
                      ip_address, sn_fisica, sn_digital, falla, observacion, solucion
            "#,
        )
        .bind(user_id)
        .bind(miner.id)
        .bind(input.wh)
        .bind(input.rack)
        .bind(input.fila)
        .bind(input.columna)
        .bind(&input.ip)
        .bind(input.sn_fisica.as_deref().unwrap_or("N/A"))
        .bind(&input.sn_digital)
        .bind(&falla)
        .bind(&input.observacion)
        .bind(&solucion)
        .fetch_one(&mut *tx)
        .await?;

        let ip = input.ip.as_deref().filter(|ip| !ip.is_empty());
        let sn_digital = input.sn_digital.as_deref().filter(|sn| !sn.is_empty());
        sqlx::query(
            r#"
            UPDATE miners
            SET ip_address = COALESCE($2, ip_address),
                sn_digital = COALESCE($3, sn_digital)
            WHERE id = $1
            "#,
        )
        .bind(miner.id)
        .bind(ip)
        .bind(sn_digital)
        .execute(&mut *tx)
        .await?;

        let outcome = diagnosis_outcome(miner.proceso_estado, &falla, input.marcar_solucionado);
        sqlx::query("UPDATE miners SET diagnostico_detalle = $2 WHERE id = $1")
            .bind(miner.id)
            .bind(&outcome.diagnostico_detalle)
            .execute(&mut *tx)
            .await?;
        if outcome.proceso_estado != miner.proceso_estado {
            set_miner_state(&mut tx, miner.id, outcome.proceso_estado).await?;
        }

        audit::record(
            &mut tx,
            user_id,
            actions::DIAGNOSIS,
            miner.sn_fisica.as_deref(),
            format!("Falla: {} -> Solución: {}", falla, solucion),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            miner_id = %miner.id,
            falla = %falla,
            solved = input.marcar_solucionado,
            from = %miner.proceso_estado,
            to = %outcome.proceso_estado,
            "Diagnosis recorded"
        );

        Ok(row.into())
    }

    /// Newest first, 50 per page, optionally for one warehouse
    pub async fn history(
        &self,
        warehouse_id: Option<i32>,
        page: u32,
    ) -> AppResult<PaginatedResponse<DiagnosticEntry>> {
        let pagination = Pagination {
            page: page.max(1),
            per_page: HISTORY_PAGE_SIZE,
        };

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM diagnostics WHERE ($1::INT IS NULL OR warehouse_id = $1)",
        )
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, DiagnosticHistoryRow>(
            r#"
            SELECT d.id, d.fecha, d.usuario_id, d.miner_id, d.warehouse_id, d.rack_id,
                   d.fila, d.columna, d.ip_address, d.sn_fisica, d.sn_digital, d.falla,
                   d.observacion, d.solucion, u.username
            FROM diagnostics d
            LEFT JOIN users u ON u.id = d.usuario_id
            WHERE ($1::INT IS NULL OR d.warehouse_id = $1)
            ORDER BY d.fecha DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(warehouse_id)
        .bind(i64::from(pagination.per_page))
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(|row| {
                let diagnostic: Diagnostic = row.diagnostic.into();
                DiagnosticEntry {
                    ubicacion: diagnostic.location_label(),
                    usuario: row.username.unwrap_or_else(|| "Desconocido".to_string()),
                    diagnostic,
                }
            })
            .collect();

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }
}
