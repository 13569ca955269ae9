//! Miner models, process states and sector rules

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Position, Sector, HYDRO_WAREHOUSE_ID};

/// A physical ASIC mining unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Miner {
    pub id: Uuid,
    /// Location is empty while the unit is in the lab
    pub warehouse_id: Option<i32>,
    pub rack_id: Option<i32>,
    pub fila: Option<i32>,
    pub columna: Option<i32>,
    pub modelo: Option<String>,
    pub ths: Option<Decimal>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub sn_fisica: Option<String>,
    pub sn_digital: Option<String>,
    pub sn_antiguo: Option<String>,
    pub garantia_vence: Option<NaiveDate>,
    pub psu_model: Option<String>,
    pub psu_sn: Option<String>,
    pub cb_sn: Option<String>,
    pub hb1_sn: Option<String>,
    pub hb2_sn: Option<String>,
    pub hb3_sn: Option<String>,
    pub proceso_estado: MinerState,
    pub responsable: Option<String>,
    pub fecha_diagnostico: Option<DateTime<Utc>>,
    pub diagnostico_detalle: Option<String>,
    pub log_detalle: Option<String>,
    pub observaciones: Option<String>,
    pub fecha_registro: DateTime<Utc>,
}

impl Miner {
    pub fn position(&self) -> Option<Position> {
        Position::from_parts(self.warehouse_id, self.rack_id, self.fila, self.columna)
    }

    pub fn sector(&self) -> Sector {
        sector_for(self.modelo.as_deref(), self.warehouse_id)
    }

    pub fn location_label(&self) -> String {
        location_label(self.warehouse_id, self.rack_id, self.fila, self.columna)
    }
}

/// Process state of a miner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum MinerState {
    #[default]
    #[serde(rename = "operativo")]
    Operativo,
    #[serde(rename = "en_laboratorio")]
    EnLaboratorio,
    #[serde(rename = "en_reparacion")]
    EnReparacion,
    #[serde(rename = "stock_lab")]
    StockLab,
    #[serde(rename = "pendiente_colocacion")]
    PendienteColocacion,
    #[serde(rename = "baja_definitiva")]
    BajaDefinitiva,
    #[serde(rename = "donante_piezas")]
    DonantePiezas,
    #[serde(rename = "pendiente_traslado")]
    PendienteTraslado,
    #[serde(rename = "Conciliando")]
    Conciliando,
    #[serde(rename = "vacio")]
    Vacio,
}

impl MinerState {
    pub const ALL: [MinerState; 10] = [
        MinerState::Operativo,
        MinerState::EnLaboratorio,
        MinerState::EnReparacion,
        MinerState::StockLab,
        MinerState::PendienteColocacion,
        MinerState::BajaDefinitiva,
        MinerState::DonantePiezas,
        MinerState::PendienteTraslado,
        MinerState::Conciliando,
        MinerState::Vacio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MinerState::Operativo => "operativo",
            MinerState::EnLaboratorio => "en_laboratorio",
            MinerState::EnReparacion => "en_reparacion",
            MinerState::StockLab => "stock_lab",
            MinerState::PendienteColocacion => "pendiente_colocacion",
            MinerState::BajaDefinitiva => "baja_definitiva",
            MinerState::DonantePiezas => "donante_piezas",
            MinerState::PendienteTraslado => "pendiente_traslado",
            MinerState::Conciliando => "Conciliando",
            MinerState::Vacio => "vacio",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s)
    }

    /// Scrapped units live in the cemetery and never return to service
    pub fn is_scrapped(&self) -> bool {
        matches!(self, MinerState::BajaDefinitiva | MinerState::DonantePiezas)
    }

    /// States counted as "in the lab" by the fleet summary
    pub fn is_in_lab(&self) -> bool {
        matches!(
            self,
            MinerState::EnLaboratorio | MinerState::EnReparacion | MinerState::StockLab
        )
    }
}

impl std::fmt::Display for MinerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooling type from the model catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoolingType {
    Aire,
    Hydro,
}

/// Catalog entry for a miner model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerModel {
    pub id: Uuid,
    pub name: String,
    pub cooling_type: CoolingType,
}

const HYDRO_MODEL_MARKERS: [&str; 3] = ["hyd", "m33", "m53"];

/// True when the model name marks an immersion-cooled unit
pub fn is_hydro_model(modelo: Option<&str>) -> bool {
    let lower = modelo.unwrap_or_default().to_lowercase();
    HYDRO_MODEL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Sector by model only, used when a transfer request is raised
pub fn sector_from_model(modelo: Option<&str>) -> Sector {
    if is_hydro_model(modelo) {
        Sector::Hydro
    } else {
        Sector::Wh
    }
}

/// Sector by warehouse only, used by lab conciliation
pub fn sector_from_warehouse(warehouse_id: Option<i32>) -> Sector {
    if warehouse_id == Some(HYDRO_WAREHOUSE_ID) {
        Sector::Hydro
    } else {
        Sector::Wh
    }
}

/// Sector by model or warehouse; either marker makes it Hydro
pub fn sector_for(modelo: Option<&str>, warehouse_id: Option<i32>) -> Sector {
    if is_hydro_model(modelo) || warehouse_id == Some(HYDRO_WAREHOUSE_ID) {
        Sector::Hydro
    } else {
        Sector::Wh
    }
}

/// Search result cooling label. Only the literal "hydro" counts here.
pub fn cooling_label(modelo: Option<&str>) -> &'static str {
    if modelo.unwrap_or_default().to_lowercase().contains("hydro") {
        "HYDRO"
    } else {
        "AIRE"
    }
}

/// Hydro container number for a rack: racks 1 and 2 form container 1
pub fn hydro_container(rack: i32) -> i32 {
    (rack + 1) / 2
}

/// Side of the container a rack sits on
pub fn hydro_rack_side(rack: i32) -> char {
    if rack % 2 != 0 {
        'A'
    } else {
        'B'
    }
}

/// Origin label for a transfer snapshot
pub fn origin_label(
    sector: Sector,
    wh: Option<i32>,
    rack: Option<i32>,
    fila: Option<i32>,
    columna: Option<i32>,
) -> String {
    let Some(wh) = wh else {
        return "Desconocido".to_string();
    };
    let rack = rack.unwrap_or_default();
    if wh == HYDRO_WAREHOUSE_ID || sector == Sector::Hydro {
        format!(
            "C{}-{}-{}-{}",
            hydro_container(rack),
            hydro_rack_side(rack),
            fila.map(|f| f.to_string()).unwrap_or_default(),
            columna.map(|c| c.to_string()).unwrap_or_default(),
        )
    } else {
        format!("WH{}-R{}", wh, rack)
    }
}

/// Human label for a miner location
pub fn location_label(
    wh: Option<i32>,
    rack: Option<i32>,
    fila: Option<i32>,
    columna: Option<i32>,
) -> String {
    match (wh, Position::from_parts(wh, rack, fila, columna)) {
        (_, Some(position)) => position.to_string(),
        (Some(wh), None) => format!("WH{}", wh),
        (None, None) => "Sin ubicación".to_string(),
    }
}
