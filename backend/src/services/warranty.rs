//! Warranty status and CSV import of expiry dates

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::{
    detect_import_columns, parse_expiry_date, warranty_location_label, ImportSummary,
    WarrantyStatus,
};

use super::audit::{self, actions};
use super::miner::{MinerRow, MINER_COLUMNS};
use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct WarrantyService {
    db: PgPool,
    warning_days: i64,
}

/// Warranty view of one miner
#[derive(Debug, Serialize)]
pub struct WarrantyInfo {
    pub miner_id: Uuid,
    pub sn_fisica: Option<String>,
    pub modelo: Option<String>,
    pub garantia_vence: Option<NaiveDate>,
    pub estado: WarrantyStatus,
    pub dias_restantes: Option<i64>,
    pub ubicacion: String,
}

impl WarrantyService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            warning_days: config.workflow.warranty_warning_days,
        }
    }

    pub async fn status(&self, miner_id: Uuid) -> AppResult<WarrantyInfo> {
        let row = sqlx::query_as::<_, MinerRow>(&format!(
            "SELECT {} FROM miners WHERE id = $1",
            MINER_COLUMNS
        ))
        .bind(miner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Miner".to_string()))?;
        let miner: shared::Miner = row.try_into()?;

        let today = Utc::now().date_naive();
        Ok(WarrantyInfo {
            estado: WarrantyStatus::classify(miner.garantia_vence, today, self.warning_days),
            dias_restantes: miner.garantia_vence.map(|d| (d - today).num_days()),
            ubicacion: warranty_location_label(miner.warehouse_id, miner.proceso_estado),
            miner_id: miner.id,
            sn_fisica: miner.sn_fisica,
            modelo: miner.modelo,
            garantia_vence: miner.garantia_vence,
        })
    }

    /// Update expiry dates from a CSV with an SN column and a warranty column
    pub async fn import_csv(&self, user_id: Uuid, body: &str) -> AppResult<ImportSummary> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AppError::validation("archivo", format!("CSV inválido: {}", e)))?
            .clone();
        let columns = detect_import_columns(headers.iter()).ok_or_else(|| {
            AppError::validation(
                "archivo",
                "No se encontraron las columnas de SN y garantía en el archivo",
            )
        })?;

        let mut updates = Vec::new();
        let mut errors = Vec::new();
        for (index, record) in reader.records().enumerate() {
            // header is line 1
            let line = index + 2;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    errors.push(format!("Fila {}: {}", line, e));
                    continue;
                }
            };
            let sn = record.get(columns.sn).unwrap_or_default();
            if sn.is_empty() {
                continue;
            }
            let raw_date = record.get(columns.expiry).unwrap_or_default();
            match parse_expiry_date(raw_date) {
                Some(date) => updates.push((sn.to_string(), date)),
                None => errors.push(format!("Fila {}: fecha inválida '{}'", line, raw_date)),
            }
        }

        let mut tx = self.db.begin().await?;

        let mut updated = 0;
        for (sn, date) in &updates {
            let result = sqlx::query("UPDATE miners SET garantia_vence = $2 WHERE sn_fisica = $1")
                .bind(sn)
                .bind(date)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }

        audit::record(
            &mut tx,
            user_id,
            actions::WARRANTY_IMPORT,
            None,
            format!("Filas válidas: {}, equipos actualizados: {}", updates.len(), updated),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            rows = updates.len(),
            updated,
            skipped = errors.len(),
            user = %user_id,
            "Warranty import finished"
        );

        Ok(ImportSummary::new(updated, errors))
    }
}
