//! Audit log of state-changing operations

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Action labels written to the audit log
pub mod actions {
    pub const TRANSFER_APPROVED: &str = "TRASLADO APROBADO";
    pub const TRANSFER_LAB_PREAPPROVED: &str = "PRE-APROBACION LAB";
    pub const TRANSFER_HYDRO_APPROVED: &str = "APROBACION COORD. HYDRO";
    pub const TRANSFER_CANCELLED: &str = "TRASLADO CANCELADO";
    pub const TRANSFER_REQUESTED: &str = "SOLICITUD TRASLADO";
    pub const TRANSFER_REJECTED: &str = "TRASLADO RECHAZADO";

    pub const CONCILIATION_WH: &str = "SOLICITUD CONCILIACIÓN WH";
    pub const CONCILIATION_LAB: &str = "SOLICITUD CONCILIACIÓN LAB";
    pub const PART_LAB_APPROVED: &str = "APROBACIÓN PIEZA LAB";
    pub const LAB_TRANSFER_VALIDATED: &str = "VALIDACIÓN TRASLADO LAB";
    pub const PART_LAB_REJECTED: &str = "RECHAZO PIEZA LAB";
    pub const PART_RECEIVED: &str = "CONFIRMACIÓN RECEPCIÓN PIEZA";
    pub const CONCILIATION_SUCCESS: &str = "CONCILIACIÓN EXITOSA";
    pub const CEDED_TO_LAB: &str = "CEDIDO AL LAB";
    pub const CEDED_TO_LAB_ALREADY_THERE: &str = "CEDIDO AL LAB (YA EN LAB)";

    pub const PIECE_DISPATCHED: &str = "DESPACHO PIEZA";
    pub const PIECE_REGISTERED: &str = "PIEZA REGISTRADA DEPOSITO";

    pub const REPAIR_STARTED: &str = "INICIO REPARACIÓN";
    pub const REPAIR_FINISHED: &str = "REPARACIÓN FINALIZADA";
    pub const REINSTALLED: &str = "REINSTALACIÓN";
    pub const REINSTALLED_ORIGIN: &str = "REINSTALACIÓN ORIGEN";
    pub const RACK_INSERTION: &str = "INSERCIÓN EN RACK";

    pub const REGISTERED: &str = "REGISTRO";
    pub const EDITED: &str = "EDICIÓN";
    pub const RMA_REGISTERED: &str = "REGISTRO RMA";
    pub const RMA_CANCELLED: &str = "RMA CANCELADO";
    pub const EMPTIED: &str = "VACIADO";
    pub const DIAGNOSIS: &str = "DIAGNÓSTICO";
    pub const WARRANTY_IMPORT: &str = "IMPORTACION GARANTIAS";
}

/// An audit log row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Movement {
    pub id: Uuid,
    pub usuario_id: Option<Uuid>,
    pub accion: String,
    pub referencia_miner: Option<String>,
    pub datos_nuevos: Option<String>,
    pub fecha_hora: DateTime<Utc>,
}

/// Movement joined with the acting username, for exports
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MovementExportRow {
    pub fecha_hora: DateTime<Utc>,
    pub username: Option<String>,
    pub accion: String,
    pub referencia_miner: Option<String>,
    pub datos_nuevos: Option<String>,
}

/// Write an audit row on the caller's connection so it commits with the change
pub async fn record(
    conn: &mut PgConnection,
    usuario_id: Uuid,
    accion: &str,
    referencia_miner: Option<&str>,
    datos_nuevos: impl Into<String>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO movements (usuario_id, accion, referencia_miner, datos_nuevos)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(usuario_id)
    .bind(accion)
    .bind(referencia_miner)
    .bind(datos_nuevos.into())
    .execute(conn)
    .await?;

    Ok(())
}

/// Audit queries
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Latest 100 movements made by a user
    pub async fn my_history(&self, usuario_id: Uuid) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, Movement>(
            r#"
            SELECT id, usuario_id, accion, referencia_miner, datos_nuevos, fecha_hora
            FROM movements
            WHERE usuario_id = $1
            ORDER BY fecha_hora DESC
            LIMIT 100
            "#,
        )
        .bind(usuario_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Recent movements as CSV
    pub async fn export_csv(&self, limit: i64) -> AppResult<String> {
        let rows = sqlx::query_as::<_, MovementExportRow>(
            r#"
            SELECT m.fecha_hora, u.username, m.accion, m.referencia_miner, m.datos_nuevos
            FROM movements m
            LEFT JOIN users u ON u.id = m.usuario_id
            ORDER BY m.fecha_hora DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        movements_to_csv(&rows)
    }
}

/// Render movements with a fixed header row
pub fn movements_to_csv(rows: &[MovementExportRow]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_internal = |e: csv::Error| AppError::Internal(format!("CSV export failed: {}", e));

    writer
        .write_record(["fecha", "usuario", "accion", "referencia", "datos"])
        .map_err(to_internal)?;
    for row in rows {
        writer
            .write_record([
                row.fecha_hora.format("%Y-%m-%d %H:%M:%S").to_string().as_str(),
                row.username.as_deref().unwrap_or("Desconocido"),
                row.accion.as_str(),
                row.referencia_miner.as_deref().unwrap_or_default(),
                row.datos_nuevos.as_deref().unwrap_or_default(),
            ])
            .map_err(to_internal)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_csv_export_quotes_free_text() {
        let rows = vec![MovementExportRow {
            fecha_hora: Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap(),
            username: None,
            accion: actions::TRANSFER_REJECTED.to_string(),
            referencia_miner: Some("YN22A".to_string()),
            datos_nuevos: Some("Motivo: falla, sin repuesto".to_string()),
        }];
        let csv = movements_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("fecha,usuario,accion,referencia,datos"));
        assert_eq!(
            lines.next(),
            Some("2024-05-02 08:30:00,Desconocido,TRASLADO RECHAZADO,YN22A,\"Motivo: falla, sin repuesto\"")
        );
    }
}
