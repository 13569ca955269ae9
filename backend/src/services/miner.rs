//! Miner registry: positions, search, rack grid and placement

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    check_duplicate_serial, cooling_label, is_hydro_model, validate_miner_data, Miner, MinerState,
    Position,
};

use super::audit::{self, actions};
use super::decode;
use crate::error::{AppError, AppResult};

/// Miner service for the rack registry
#[derive(Clone)]
pub struct MinerService {
    db: PgPool,
}

pub(crate) const MINER_COLUMNS: &str = r#"
    id, warehouse_id, rack_id, fila, columna, modelo, ths, ip_address, mac_address,
    sn_fisica, sn_digital, sn_antiguo, garantia_vence, psu_model, psu_sn, cb_sn,
    hb1_sn, hb2_sn, hb3_sn, proceso_estado, responsable, fecha_diagnostico,
    diagnostico_detalle, log_detalle, observaciones, fecha_registro
"#;

/// Database row for a miner
#[derive(Debug, FromRow)]
pub(crate) struct MinerRow {
    id: Uuid,
    warehouse_id: Option<i32>,
    rack_id: Option<i32>,
    fila: Option<i32>,
    columna: Option<i32>,
    modelo: Option<String>,
    ths: Option<Decimal>,
    ip_address: Option<String>,
    mac_address: Option<String>,
    sn_fisica: Option<String>,
    sn_digital: Option<String>,
    sn_antiguo: Option<String>,
    garantia_vence: Option<NaiveDate>,
    psu_model: Option<String>,
    psu_sn: Option<String>,
    cb_sn: Option<String>,
    hb1_sn: Option<String>,
    hb2_sn: Option<String>,
    hb3_sn: Option<String>,
    proceso_estado: String,
    responsable: Option<String>,
    fecha_diagnostico: Option<DateTime<Utc>>,
    diagnostico_detalle: Option<String>,
    log_detalle: Option<String>,
    observaciones: Option<String>,
    fecha_registro: DateTime<Utc>,
}

impl TryFrom<MinerRow> for Miner {
    type Error = AppError;

    fn try_from(row: MinerRow) -> AppResult<Self> {
        Ok(Miner {
            id: row.id,
            warehouse_id: row.warehouse_id,
            rack_id: row.rack_id,
            fila: row.fila,
            columna: row.columna,
            modelo: row.modelo,
            ths: row.ths,
            ip_address: row.ip_address,
            mac_address: row.mac_address,
            sn_fisica: row.sn_fisica,
            sn_digital: row.sn_digital,
            sn_antiguo: row.sn_antiguo,
            garantia_vence: row.garantia_vence,
            psu_model: row.psu_model,
            psu_sn: row.psu_sn,
            cb_sn: row.cb_sn,
            hb1_sn: row.hb1_sn,
            hb2_sn: row.hb2_sn,
            hb3_sn: row.hb3_sn,
            proceso_estado: decode(&row.proceso_estado, MinerState::from_str, "miner state")?,
            responsable: row.responsable,
            fecha_diagnostico: row.fecha_diagnostico,
            diagnostico_detalle: row.diagnostico_detalle,
            log_detalle: row.log_detalle,
            observaciones: row.observaciones,
            fecha_registro: row.fecha_registro,
        })
    }
}

pub(crate) fn into_miners(rows: Vec<MinerRow>) -> AppResult<Vec<Miner>> {
    rows.into_iter().map(Miner::try_from).collect()
}

/// Load and lock a miner for the rest of the transaction
pub(crate) async fn lock_miner(conn: &mut PgConnection, miner_id: Uuid) -> AppResult<Miner> {
    let row = sqlx::query_as::<_, MinerRow>(&format!(
        "SELECT {} FROM miners WHERE id = $1 FOR UPDATE",
        MINER_COLUMNS
    ))
    .bind(miner_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Miner".to_string()))?;

    row.try_into()
}

/// Load and lock the miner at a rack position
pub(crate) async fn lock_miner_at(
    conn: &mut PgConnection,
    position: Position,
) -> AppResult<Option<Miner>> {
    let row = sqlx::query_as::<_, MinerRow>(&format!(
        r#"
        SELECT {} FROM miners
        WHERE warehouse_id = $1 AND rack_id = $2 AND fila = $3 AND columna = $4
        FOR UPDATE
        "#,
        MINER_COLUMNS
    ))
    .bind(position.wh)
    .bind(position.rack)
    .bind(position.fila)
    .bind(position.columna)
    .fetch_optional(conn)
    .await?;

    row.map(Miner::try_from).transpose()
}

/// Fail with the occupant's SN if another miner holds the position
pub(crate) async fn ensure_position_free(
    conn: &mut PgConnection,
    position: Position,
    exclude: Uuid,
) -> AppResult<()> {
    let occupant = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT sn_fisica FROM miners
        WHERE warehouse_id = $1 AND rack_id = $2 AND fila = $3 AND columna = $4
          AND id <> $5
        "#,
    )
    .bind(position.wh)
    .bind(position.rack)
    .bind(position.fila)
    .bind(position.columna)
    .bind(exclude)
    .fetch_optional(conn)
    .await?;

    match occupant {
        Some(sn) => Err(AppError::PositionOccupied {
            position: position.to_string(),
            occupant: sn.unwrap_or_else(|| "N/A".to_string()),
        }),
        None => Ok(()),
    }
}

/// Set a miner's process state
pub(crate) async fn set_miner_state(
    conn: &mut PgConnection,
    miner_id: Uuid,
    state: MinerState,
) -> AppResult<()> {
    sqlx::query("UPDATE miners SET proceso_estado = $2 WHERE id = $1")
        .bind(miner_id)
        .bind(state.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Serial of a miner, for audit references
pub(crate) async fn miner_sn(conn: &mut PgConnection, miner_id: Uuid) -> AppResult<Option<String>> {
    let sn = sqlx::query_scalar::<_, Option<String>>("SELECT sn_fisica FROM miners WHERE id = $1")
        .bind(miner_id)
        .fetch_optional(conn)
        .await?
        .flatten();
    Ok(sn)
}

/// Input for saving a miner at a position
#[derive(Debug, Deserialize, Validate)]
pub struct SaveMinerInput {
    #[validate(range(min = 1))]
    pub wh: i32,
    #[validate(range(min = 1))]
    pub rack: i32,
    #[validate(range(min = 1))]
    pub fila: i32,
    #[validate(range(min = 1))]
    pub columna: i32,
    pub modelo: Option<String>,
    pub sn_fisica: Option<String>,
    pub sn_digital: Option<String>,
    pub ths: Option<Decimal>,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub psu_model: Option<String>,
    pub psu_sn: Option<String>,
    pub cb_sn: Option<String>,
    pub hb1_sn: Option<String>,
    pub hb2_sn: Option<String>,
    pub hb3_sn: Option<String>,
}

impl SaveMinerInput {
    pub fn position(&self) -> Position {
        Position::new(self.wh, self.rack, self.fila, self.columna)
    }
}

/// Search hit
#[derive(Debug, Serialize)]
pub struct MinerSearchResult {
    pub id: Uuid,
    pub sn: Option<String>,
    pub modelo: Option<String>,
    pub wh: Option<i32>,
    pub rack: Option<i32>,
    pub fila: Option<i32>,
    pub columna: Option<i32>,
    pub estado: MinerState,
    pub tipo: &'static str,
}

impl From<Miner> for MinerSearchResult {
    fn from(m: Miner) -> Self {
        Self {
            tipo: cooling_label(m.modelo.as_deref()),
            id: m.id,
            sn: m.sn_fisica,
            modelo: m.modelo,
            wh: m.warehouse_id,
            rack: m.rack_id,
            fila: m.fila,
            columna: m.columna,
            estado: m.proceso_estado,
        }
    }
}

/// One slot of the rack grid
#[derive(Debug, Serialize)]
pub struct RackSlot {
    pub id: Uuid,
    pub modelo: Option<String>,
    pub sn_fisica: Option<String>,
    pub ths: Option<Decimal>,
    pub estado: MinerState,
    pub ip_address: Option<String>,
    pub diagnostico_detalle: Option<String>,
}

/// Counts for one cooling family
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct FamilyCounts {
    /// Units in their warehouse or plant
    pub en_sitio: i64,
    pub lab: i64,
    pub total: i64,
}

/// Fleet summary, air vs hydro
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct FleetSummary {
    pub aire: FamilyCounts,
    pub hydro: FamilyCounts,
    pub total_general: i64,
}

impl FleetSummary {
    /// Tally from (modelo, state) pairs
    pub fn tally<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Option<&'a str>, MinerState)>,
    {
        let mut summary = FleetSummary::default();
        for (modelo, state) in rows {
            let family = if is_hydro_model(modelo) {
                &mut summary.hydro
            } else {
                &mut summary.aire
            };
            if state.is_in_lab() {
                family.lab += 1;
            } else {
                family.en_sitio += 1;
            }
            family.total += 1;
            summary.total_general += 1;
        }
        summary
    }
}

impl MinerService {
    /// Create a new MinerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, miner_id: Uuid) -> AppResult<Miner> {
        let row = sqlx::query_as::<_, MinerRow>(&format!(
            "SELECT {} FROM miners WHERE id = $1",
            MINER_COLUMNS
        ))
        .bind(miner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Miner".to_string()))?;

        row.try_into()
    }

    pub async fn get_by_position(&self, position: Position) -> AppResult<Miner> {
        let row = sqlx::query_as::<_, MinerRow>(&format!(
            r#"
            SELECT {} FROM miners
            WHERE warehouse_id = $1 AND rack_id = $2 AND fila = $3 AND columna = $4
            "#,
            MINER_COLUMNS
        ))
        .bind(position.wh)
        .bind(position.rack)
        .bind(position.fila)
        .bind(position.columna)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Miner at {}", position)))?;

        row.try_into()
    }

    /// Create or update the miner at a position
    pub async fn save(&self, user_id: Uuid, input: SaveMinerInput) -> AppResult<Miner> {
        input.validate()?;
        validate_miner_data(input.sn_fisica.as_deref(), input.ths)?;
        let position = input.position();
        let sn = input.sn_fisica.as_deref().unwrap_or_default().trim().to_string();

        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, (Uuid, Option<i32>)>(
            "SELECT id, warehouse_id FROM miners WHERE sn_fisica = $1",
        )
        .bind(&sn)
        .fetch_optional(&mut *tx)
        .await?;
        check_duplicate_serial(&sn, existing.map(|(_, wh)| wh), position.wh)?;

        let current = lock_miner_at(&mut tx, position).await?;
        let is_new = current.is_none();

        if let Some((holder, _)) = existing {
            if current.as_ref().map(|m| m.id) != Some(holder) {
                return Err(AppError::DuplicateEntry("sn_fisica".to_string()));
            }
        }

        let miner_id = match current {
            Some(miner) => {
                sqlx::query(
                    r#"
                    UPDATE miners SET
                        modelo = COALESCE($2, modelo),
                        sn_fisica = $3,
                        sn_digital = COALESCE($4, sn_digital),
                        ths = COALESCE($5, ths),
                        ip_address = COALESCE($6, ip_address),
                        mac_address = COALESCE($7, mac_address),
                        psu_model = COALESCE($8, psu_model),
                        psu_sn = COALESCE($9, psu_sn),
                        cb_sn = COALESCE($10, cb_sn),
                        hb1_sn = COALESCE($11, hb1_sn),
                        hb2_sn = COALESCE($12, hb2_sn),
                        hb3_sn = COALESCE($13, hb3_sn)
                    WHERE id = $1
                    "#,
                )
                .bind(miner.id)
                .bind(&input.modelo)
                .bind(&sn)
                .bind(&input.sn_digital)
                .bind(input.ths)
                .bind(&input.ip)
                .bind(&input.mac)
                .bind(&input.psu_model)
                .bind(&input.psu_sn)
                .bind(&input.cb_sn)
                .bind(&input.hb1_sn)
                .bind(&input.hb2_sn)
                .bind(&input.hb3_sn)
                .execute(&mut *tx)
                .await?;
                miner.id
            }
            None => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO miners (
                        warehouse_id, rack_id, fila, columna, modelo, sn_fisica, sn_digital,
                        ths, ip_address, mac_address, psu_model, psu_sn, cb_sn,
                        hb1_sn, hb2_sn, hb3_sn
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    RETURNING id
                    "#,
                )
                .bind(position.wh)
                .bind(position.rack)
                .bind(position.fila)
                .bind(position.columna)
                .bind(&input.modelo)
                .bind(&sn)
                .bind(&input.sn_digital)
                .bind(input.ths)
                .bind(&input.ip)
                .bind(&input.mac)
                .bind(&input.psu_model)
                .bind(&input.psu_sn)
                .bind(&input.cb_sn)
                .bind(&input.hb1_sn)
                .bind(&input.hb2_sn)
                .bind(&input.hb3_sn)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let accion = if is_new {
            actions::REGISTERED
        } else {
            actions::EDITED
        };
        audit::record(
            &mut tx,
            user_id,
            accion,
            Some(&position.to_string()),
            format!("SN:{}", sn),
        )
        .await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, %position, is_new, "Miner saved");

        Ok(miner)
    }

    /// Substring search over SN, IP and MAC
    pub async fn search(&self, query: &str) -> AppResult<Vec<MinerSearchResult>> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query_as::<_, MinerRow>(&format!(
            r#"
            SELECT {} FROM miners
            WHERE sn_fisica LIKE $1 OR ip_address LIKE $1 OR mac_address LIKE $1
            ORDER BY sn_fisica
            LIMIT 200
            "#,
            MINER_COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(into_miners(rows)?
            .into_iter()
            .map(MinerSearchResult::from)
            .collect())
    }

    /// Rack grid keyed by "fila-columna"
    pub async fn rack_grid(&self, wh: i32, rack: i32) -> AppResult<BTreeMap<String, RackSlot>> {
        let rows = sqlx::query_as::<_, MinerRow>(&format!(
            "SELECT {} FROM miners WHERE warehouse_id = $1 AND rack_id = $2",
            MINER_COLUMNS
        ))
        .bind(wh)
        .bind(rack)
        .fetch_all(&self.db)
        .await?;

        let grid = into_miners(rows)?
            .into_iter()
            .map(|m| {
                let key = format!(
                    "{}-{}",
                    m.fila.map(|f| f.to_string()).unwrap_or_default(),
                    m.columna.map(|c| c.to_string()).unwrap_or_default()
                );
                let slot = RackSlot {
                    id: m.id,
                    modelo: m.modelo,
                    sn_fisica: m.sn_fisica,
                    ths: m.ths,
                    estado: m.proceso_estado,
                    ip_address: m.ip_address,
                    diagnostico_detalle: m.diagnostico_detalle,
                };
                (key, slot)
            })
            .collect();

        Ok(grid)
    }

    pub async fn by_state(&self, state: MinerState) -> AppResult<Vec<Miner>> {
        let rows = sqlx::query_as::<_, MinerRow>(&format!(
            "SELECT {} FROM miners WHERE proceso_estado = $1 ORDER BY fecha_registro DESC",
            MINER_COLUMNS
        ))
        .bind(state.as_str())
        .fetch_all(&self.db)
        .await?;

        into_miners(rows)
    }

    /// Units parked in a warehouse waiting for a slot
    pub async fn pending_placement(&self, wh: i32) -> AppResult<Vec<Miner>> {
        let rows = sqlx::query_as::<_, MinerRow>(&format!(
            r#"
            SELECT {} FROM miners
            WHERE warehouse_id = $1 AND proceso_estado = $2
            ORDER BY fecha_registro
            "#,
            MINER_COLUMNS
        ))
        .bind(wh)
        .bind(MinerState::PendienteColocacion.as_str())
        .fetch_all(&self.db)
        .await?;

        into_miners(rows)
    }

    /// Place a miner at full coordinates
    pub async fn insert(
        &self,
        user_id: Uuid,
        miner_id: Uuid,
        position: Position,
    ) -> AppResult<Miner> {
        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, miner_id).await?;
        ensure_position_free(&mut tx, position, miner.id).await?;

        sqlx::query(
            r#"
            UPDATE miners
            SET warehouse_id = $2, rack_id = $3, fila = $4, columna = $5, proceso_estado = $6
            WHERE id = $1
            "#,
        )
        .bind(miner.id)
        .bind(position.wh)
        .bind(position.rack)
        .bind(position.fila)
        .bind(position.columna)
        .bind(MinerState::Operativo.as_str())
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::RACK_INSERTION,
            Some(&format!("SN: {}", miner.sn_fisica.as_deref().unwrap_or_default())),
            format!(
                "Ubicado en WH{}-R{}-F{}-C{}",
                position.wh, position.rack, position.fila, position.columna
            ),
        )
        .await?;

        let miner = lock_miner(&mut tx, miner.id).await?;
        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, %position, "Miner inserted in rack");

        Ok(miner)
    }

    /// Remove the miner at a position from the registry
    pub async fn empty_position(&self, user_id: Uuid, position: Position) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let miner = lock_miner_at(&mut tx, position)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Miner at {}", position)))?;

        sqlx::query("DELETE FROM miners WHERE id = $1")
            .bind(miner.id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::EMPTIED,
            Some(&position.to_string()),
            format!("SN:{}", miner.sn_fisica.as_deref().unwrap_or_default()),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(miner_id = %miner.id, %position, "Position emptied");

        Ok(())
    }

    /// Air vs hydro counts, on site vs in the lab
    pub async fn summary(&self) -> AppResult<FleetSummary> {
        let rows = sqlx::query_as::<_, (Option<String>, String)>(
            "SELECT modelo, proceso_estado FROM miners",
        )
        .fetch_all(&self.db)
        .await?;

        let pairs = rows
            .iter()
            .map(|(modelo, estado)| {
                decode(estado, MinerState::from_str, "miner state")
                    .map(|state| (modelo.as_deref(), state))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(FleetSummary::tally(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_summary_splits_families() {
        let summary = FleetSummary::tally([
            (Some("S21 Hyd"), MinerState::Operativo),
            (Some("M53S"), MinerState::EnReparacion),
            (Some("S19"), MinerState::StockLab),
            (None, MinerState::PendienteTraslado),
        ]);
        assert_eq!(summary.hydro.en_sitio, 1);
        assert_eq!(summary.hydro.lab, 1);
        assert_eq!(summary.aire.lab, 1);
        assert_eq!(summary.aire.en_sitio, 1);
        assert_eq!(summary.total_general, 4);
    }

    #[test]
    fn test_save_input_rejects_zero_coordinates() {
        let input = SaveMinerInput {
            wh: 1,
            rack: 0,
            fila: 1,
            columna: 1,
            modelo: None,
            sn_fisica: Some("YN22A".to_string()),
            sn_digital: None,
            ths: None,
            ip: None,
            mac: None,
            psu_model: None,
            psu_sn: None,
            cb_sn: None,
            hb1_sn: None,
            hb2_sn: None,
            hb3_sn: None,
        };
        assert!(input.validate().is_err());
    }
}
