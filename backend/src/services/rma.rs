//! RMA tickets raised against miners still in their rack

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{require_text, Miner, MinerState, Position};

use super::audit::{self, actions};
use super::miner::lock_miner_at;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RmaService {
    db: PgPool,
}

/// Input for registering an RMA
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRmaInput {
    #[validate(range(min = 1))]
    pub wh: i32,
    #[validate(range(min = 1))]
    pub rack: i32,
    #[validate(range(min = 1))]
    pub fila: i32,
    #[validate(range(min = 1))]
    pub columna: i32,
    pub diagnostico_detalle: Option<String>,
    pub log_detalle: Option<String>,
    /// IP of the port the unit is plugged into right now
    pub ip_rma: Option<String>,
    pub sn_digital: Option<String>,
    pub mac: Option<String>,
    pub psu_model: Option<String>,
    pub psu_sn: Option<String>,
    pub cb_sn: Option<String>,
    pub hb1_sn: Option<String>,
    pub hb2_sn: Option<String>,
    pub hb3_sn: Option<String>,
}

/// Position of the miner whose RMA is withdrawn
#[derive(Debug, Deserialize)]
pub struct CancelRmaInput {
    pub wh: i32,
    pub rack: i32,
    pub fila: i32,
    pub columna: i32,
}

impl RmaService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record the failure. The unit stays in its slot until a transfer moves it.
    pub async fn register(&self, user_id: Uuid, input: RegisterRmaInput) -> AppResult<Miner> {
        input.validate()?;
        let diagnostico = require_text("diagnostico_detalle", input.diagnostico_detalle.as_deref())?;
        let ip_rma = require_text("ip_rma", input.ip_rma.as_deref())?;
        let position = Position::new(input.wh, input.rack, input.fila, input.columna);

        let mut tx = self.db.begin().await?;

        let miner = lock_miner_at(&mut tx, position)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Miner at {}", position)))?;

        let updated = sqlx::query_as::<_, super::miner::MinerRow>(&format!(
            r#"
            UPDATE miners SET
                sn_digital = COALESCE($2, sn_digital),
                mac_address = COALESCE($3, mac_address),
                psu_model = COALESCE($4, psu_model),
                psu_sn = COALESCE($5, psu_sn),
                cb_sn = COALESCE($6, cb_sn),
                hb1_sn = COALESCE($7, hb1_sn),
                hb2_sn = COALESCE($8, hb2_sn),
                hb3_sn = COALESCE($9, hb3_sn),
                diagnostico_detalle = $10,
                log_detalle = $11,
                fecha_diagnostico = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            super::miner::MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(&input.sn_digital)
        .bind(&input.mac)
        .bind(&input.psu_model)
        .bind(&input.psu_sn)
        .bind(&input.cb_sn)
        .bind(&input.hb1_sn)
        .bind(&input.hb2_sn)
        .bind(&input.hb3_sn)
        .bind(&diagnostico)
        .bind(input.log_detalle.as_deref().unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::RMA_REGISTERED,
            Some(&position.to_string()),
            format!(
                "SN: {} -> Falla: {} (IP {})",
                miner.sn_fisica.as_deref().unwrap_or_default(),
                diagnostico,
                ip_rma
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, %position, falla = %diagnostico, "RMA registered");

        updated.try_into()
    }

    /// Withdraw the RMA and put the unit back in service
    pub async fn cancel(&self, user_id: Uuid, input: CancelRmaInput) -> AppResult<Miner> {
        let position = Position::new(input.wh, input.rack, input.fila, input.columna);

        let mut tx = self.db.begin().await?;

        let miner = lock_miner_at(&mut tx, position)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Miner at {}", position)))?;

        let updated = sqlx::query_as::<_, super::miner::MinerRow>(&format!(
            r#"
            UPDATE miners SET
                proceso_estado = $2,
                diagnostico_detalle = NULL,
                log_detalle = NULL,
                fecha_diagnostico = NULL
            WHERE id = $1
            RETURNING {}
            "#,
            super::miner::MINER_COLUMNS
        ))
        .bind(miner.id)
        .bind(MinerState::Operativo.as_str())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::RMA_CANCELLED,
            Some(&position.to_string()),
            format!(
                "SN: {} -> Diagnóstico limpiado",
                miner.sn_fisica.as_deref().unwrap_or_default()
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, %position, from = %miner.proceso_estado, "RMA cancelled");

        updated.try_into()
    }
}
