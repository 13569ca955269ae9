//! Repair lab: workbench, lab stock, cemetery and return to the warehouse

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{
    append_observation, append_scrap_note, lab_transition, plan_return, sector_from_model,
    LabAction, LabStats, Miner, MinerState, PartRequestStatus, ScrapKind, Sector,
    TransferStatus, DEFAULT_REPAIR_SOLUTION,
};

use super::audit::{self, actions};
use super::miner::{ensure_position_free, into_miners, lock_miner, MinerRow, MINER_COLUMNS};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct LabService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinishRepairInput {
    pub solucion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapInput {
    pub tipo: String,
    pub motivo: Option<String>,
}

/// Destination for a repaired unit
#[derive(Debug, Deserialize, Validate)]
pub struct ReinstallInput {
    #[validate(range(min = 1))]
    pub wh: i32,
    pub rack: Option<i32>,
    pub fila: Option<i32>,
    pub columna: Option<i32>,
}

impl LabService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> AppResult<LabStats> {
        let (pendientes, en_reparacion, stock, scrap) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE proceso_estado = 'en_laboratorio'),
                    COUNT(*) FILTER (WHERE proceso_estado = 'en_reparacion'),
                    COUNT(*) FILTER (WHERE proceso_estado = 'stock_lab'),
                    COUNT(*) FILTER (WHERE proceso_estado IN ('baja_definitiva', 'donante_piezas'))
                FROM miners
                "#,
            )
            .fetch_one(&self.db)
            .await?;

        let traslados_pendientes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transfer_requests WHERE estado = $1",
        )
        .bind(TransferStatus::PendienteLab.as_str())
        .fetch_one(&self.db)
        .await?;

        let piezas_pendientes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM part_requests WHERE estado = $1",
        )
        .bind(PartRequestStatus::PendienteAprobacionLab.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(LabStats {
            pendientes,
            en_reparacion,
            stock,
            scrap,
            traslados_pendientes,
            piezas_pendientes,
        })
    }

    async fn in_states(&self, states: &[MinerState]) -> AppResult<Vec<Miner>> {
        let states: Vec<&str> = states.iter().map(MinerState::as_str).collect();
        let rows = sqlx::query_as::<_, MinerRow>(&format!(
            r#"
            SELECT {} FROM miners
            WHERE proceso_estado = ANY($1)
            ORDER BY fecha_diagnostico DESC NULLS LAST, fecha_registro DESC
            "#,
            MINER_COLUMNS
        ))
        .bind(&states)
        .fetch_all(&self.db)
        .await?;

        into_miners(rows)
    }

    /// Units received and waiting for a technician
    pub async fn pending(&self) -> AppResult<Vec<Miner>> {
        self.in_states(&[MinerState::EnLaboratorio]).await
    }

    pub async fn in_repair(&self) -> AppResult<Vec<Miner>> {
        self.in_states(&[MinerState::EnReparacion]).await
    }

    /// Repaired units ready to go back, optionally for one sector
    pub async fn stock(&self, sector: Option<Sector>) -> AppResult<Vec<Miner>> {
        let miners = self.in_states(&[MinerState::StockLab]).await?;
        Ok(match sector {
            Some(sector) => miners
                .into_iter()
                .filter(|m| sector_from_model(m.modelo.as_deref()) == sector)
                .collect(),
            None => miners,
        })
    }

    pub async fn cemetery(&self) -> AppResult<Vec<Miner>> {
        self.in_states(&[MinerState::BajaDefinitiva, MinerState::DonantePiezas])
            .await
    }

    pub async fn start_repair(&self, user_id: Uuid, miner_id: Uuid) -> AppResult<Miner> {
        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        let next = lab_transition(miner.proceso_estado, LabAction::StartRepair)?;

        let updated = sqlx::query_as::<_, MinerRow>(&format!(
            "UPDATE miners SET proceso_estado = $2 WHERE id = $1 RETURNING {}",
            MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::REPAIR_STARTED,
            miner.sn_fisica.as_deref(),
            format!("{} -> {}", miner.proceso_estado, next),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, from = %miner.proceso_estado, to = %next, user = %user_id, "Repair started");

        updated.try_into()
    }

    pub async fn finish_repair(
        &self,
        user_id: Uuid,
        miner_id: Uuid,
        input: FinishRepairInput,
    ) -> AppResult<Miner> {
        let solucion = input
            .solucion
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REPAIR_SOLUTION);

        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        let next = lab_transition(miner.proceso_estado, LabAction::FinishRepair)?;
        let observaciones = append_observation(
            miner.observaciones.as_deref(),
            chrono::Utc::now().date_naive(),
            solucion,
        );

        let updated = sqlx::query_as::<_, MinerRow>(&format!(
            "UPDATE miners SET proceso_estado = $2, observaciones = $3 WHERE id = $1 RETURNING {}",
            MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(next.as_str())
        .bind(&observaciones)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::REPAIR_FINISHED,
            miner.sn_fisica.as_deref(),
            solucion.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, from = %miner.proceso_estado, to = %next, user = %user_id, "Repair finished");

        updated.try_into()
    }

    /// Retire a unit: thrown away or kept as a parts donor
    pub async fn scrap(&self, user_id: Uuid, miner_id: Uuid, input: ScrapInput) -> AppResult<Miner> {
        let kind = ScrapKind::parse(&input.tipo);
        let motivo = input
            .motivo
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("Sin motivo");

        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        let next = lab_transition(miner.proceso_estado, LabAction::Scrap(kind))?;
        let observaciones = append_scrap_note(
            miner.observaciones.as_deref(),
            chrono::Utc::now().date_naive(),
            motivo,
        );

        let updated = sqlx::query_as::<_, MinerRow>(&format!(
            "UPDATE miners SET proceso_estado = $2, observaciones = $3 WHERE id = $1 RETURNING {}",
            MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(next.as_str())
        .bind(&observaciones)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            kind.audit_action(),
            miner.sn_fisica.as_deref(),
            motivo.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, from = %miner.proceso_estado, to = %next, user = %user_id, "Miner scrapped");

        updated.try_into()
    }

    /// Send a repaired unit back to a warehouse
    pub async fn reinstall(
        &self,
        user_id: Uuid,
        miner_id: Uuid,
        input: ReinstallInput,
    ) -> AppResult<Miner> {
        input.validate()?;
        self.return_to_warehouse(
            user_id,
            miner_id,
            (input.wh, input.rack, input.fila, input.columna),
            actions::REINSTALLED,
        )
        .await
    }

    /// Send a repaired unit back to the slot it was taken from
    pub async fn reinstall_origin(&self, user_id: Uuid, miner_id: Uuid) -> AppResult<Miner> {
        let origin = sqlx::query_as::<_, (i32, i32, Option<i32>, Option<i32>)>(
            r#"
            SELECT origen_wh, origen_rack, origen_fila, origen_columna
            FROM transfer_requests
            WHERE miner_id = $1 AND estado = $2
              AND origen_wh IS NOT NULL AND origen_rack IS NOT NULL
            ORDER BY fecha_resolucion DESC NULLS LAST, fecha_solicitud DESC
            LIMIT 1
            "#,
        )
        .bind(miner_id)
        .bind(TransferStatus::Ejecutado.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            AppError::validation("miner_id", "No se encontró la ubicación de origen del equipo")
        })?;

        let (wh, rack, fila, columna) = origin;
        self.return_to_warehouse(
            user_id,
            miner_id,
            (wh, Some(rack), fila, columna),
            actions::REINSTALLED_ORIGIN,
        )
        .await
    }

    async fn return_to_warehouse(
        &self,
        user_id: Uuid,
        miner_id: Uuid,
        (wh, rack, fila, columna): (i32, Option<i32>, Option<i32>, Option<i32>),
        accion: &str,
    ) -> AppResult<Miner> {
        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        lab_transition(miner.proceso_estado, LabAction::Reinstall)?;

        let plan = plan_return(wh, rack, fila, columna);
        if let Some(position) = plan.position {
            ensure_position_free(&mut tx, position, miner.id).await?;
        }

        let updated = sqlx::query_as::<_, MinerRow>(&format!(
            r#"
            UPDATE miners SET
                warehouse_id = $2, rack_id = $3, fila = $4, columna = $5,
                proceso_estado = $6, diagnostico_detalle = NULL, log_detalle = NULL
            WHERE id = $1
            RETURNING {}
            "#,
            MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(plan.warehouse_id)
        .bind(plan.position.map(|p| p.rack))
        .bind(plan.position.map(|p| p.fila))
        .bind(plan.position.map(|p| p.columna))
        .bind(plan.state.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let destino = match plan.position {
            Some(position) => position.to_string(),
            None => format!("WH{} (pendiente de colocación)", plan.warehouse_id),
        };
        audit::record(
            &mut tx,
            user_id,
            accion,
            miner.sn_fisica.as_deref(),
            format!("LAB -> {}", destino),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            miner_id = %miner.id,
            from = %miner.proceso_estado,
            to = %plan.state,
            destino = %destino,
            user = %user_id,
            "Miner returned to warehouse"
        );

        updated.try_into()
    }
}
