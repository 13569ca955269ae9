//! Field diagnosis records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::miner::MinerState;
use crate::types::HYDRO_WAREHOUSE_ID;

/// Snapshot of a diagnosis taken at the rack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: Uuid,
    pub fecha: DateTime<Utc>,
    pub usuario_id: Option<Uuid>,
    pub miner_id: Uuid,
    pub warehouse_id: i32,
    pub rack_id: i32,
    pub fila: i32,
    pub columna: i32,
    pub ip_address: Option<String>,
    pub sn_fisica: Option<String>,
    pub sn_digital: Option<String>,
    pub falla: String,
    pub observacion: Option<String>,
    pub solucion: String,
}

impl Diagnostic {
    pub fn location_label(&self) -> String {
        format!(
            "WH{}-R{} (F{}-C{})",
            self.warehouse_id, self.rack_id, self.fila, self.columna
        )
    }
}

/// Miner fields after a diagnosis is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisOutcome {
    pub diagnostico_detalle: Option<String>,
    pub proceso_estado: MinerState,
}

/// Apply a diagnosis to a miner.
///
/// A solved diagnosis clears the label and puts the unit back in service unless
/// it has been scrapped. An unsolved one tags it with the failure.
pub fn diagnosis_outcome(current: MinerState, falla: &str, solved: bool) -> DiagnosisOutcome {
    if solved {
        DiagnosisOutcome {
            diagnostico_detalle: None,
            proceso_estado: if current.is_scrapped() {
                current
            } else {
                MinerState::Operativo
            },
        }
    } else {
        DiagnosisOutcome {
            diagnostico_detalle: Some(format!("DIAGNOSTICADO: {}", falla)),
            proceso_estado: current,
        }
    }
}

/// Filter for the diagnosis history: a warehouse number or "Hydro"
pub fn history_warehouse_filter(raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    if raw == "Hydro" {
        return Some(HYDRO_WAREHOUSE_ID);
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok();
    }
    None
}

pub const HISTORY_PAGE_SIZE: u32 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solved_returns_to_service() {
        let outcome = diagnosis_outcome(MinerState::PendienteTraslado, "Fuente", true);
        assert_eq!(outcome.proceso_estado, MinerState::Operativo);
        assert_eq!(outcome.diagnostico_detalle, None);
    }

    #[test]
    fn test_solved_keeps_scrapped_state() {
        let outcome = diagnosis_outcome(MinerState::DonantePiezas, "CB", true);
        assert_eq!(outcome.proceso_estado, MinerState::DonantePiezas);
    }

    #[test]
    fn test_unsolved_tags_failure() {
        let outcome = diagnosis_outcome(MinerState::Operativo, "Frecuencia", false);
        assert_eq!(
            outcome.diagnostico_detalle.as_deref(),
            Some("DIAGNOSTICADO: Frecuencia")
        );
        assert_eq!(outcome.proceso_estado, MinerState::Operativo);
    }

    #[test]
    fn test_history_filter() {
        assert_eq!(history_warehouse_filter(Some("Hydro")), Some(100));
        assert_eq!(history_warehouse_filter(Some("3")), Some(3));
        assert_eq!(history_warehouse_filter(Some("-3")), None);
        assert_eq!(history_warehouse_filter(None), None);
    }
}
