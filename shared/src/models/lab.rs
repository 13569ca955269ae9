//! Repair lab workflow: workbench, stock and cemetery

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::miner::MinerState;
use crate::types::Position;

pub const DEFAULT_REPAIR_SOLUTION: &str = "Reparación estándar";

/// Lab counters for the dashboard
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabStats {
    pub pendientes: i64,
    pub en_reparacion: i64,
    pub stock: i64,
    pub scrap: i64,
    pub traslados_pendientes: i64,
    pub piezas_pendientes: i64,
}

/// How a unit leaves service for good
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScrapKind {
    /// Thrown away
    Basura,
    /// Kept to harvest parts from
    Donante,
}

impl ScrapKind {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("basura") {
            ScrapKind::Basura
        } else {
            ScrapKind::Donante
        }
    }

    pub fn target_state(&self) -> MinerState {
        match self {
            ScrapKind::Basura => MinerState::BajaDefinitiva,
            ScrapKind::Donante => MinerState::DonantePiezas,
        }
    }

    pub fn audit_action(&self) -> &'static str {
        match self {
            ScrapKind::Basura => "BAJA (DESECHO)",
            ScrapKind::Donante => "BAJA (DESGUACE)",
        }
    }
}

/// Workbench actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabAction {
    StartRepair,
    FinishRepair,
    Scrap(ScrapKind),
    Reinstall,
}

impl LabAction {
    pub fn verb(&self) -> &'static str {
        match self {
            LabAction::StartRepair => "start repair",
            LabAction::FinishRepair => "finish repair",
            LabAction::Scrap(_) => "scrap",
            LabAction::Reinstall => "reinstall",
        }
    }
}

/// Next state of a miner on the workbench.
///
/// `Reinstall` only checks the source state; the destination depends on the
/// coordinates, see [`plan_return`].
pub fn lab_transition(current: MinerState, action: LabAction) -> WorkflowResult<MinerState> {
    let next = match (action, current) {
        (LabAction::StartRepair, MinerState::EnLaboratorio) => MinerState::EnReparacion,
        (LabAction::FinishRepair, MinerState::EnReparacion) => MinerState::StockLab,
        (LabAction::Scrap(kind), _) => kind.target_state(),
        (LabAction::Reinstall, MinerState::StockLab) => MinerState::StockLab,
        (action, from) => {
            return Err(WorkflowError::InvalidTransition {
                entity: "miner",
                from: from.as_str().to_string(),
                action: action.verb(),
            })
        }
    };
    Ok(next)
}

/// Append a dated line to the observations log
pub fn append_observation(existing: Option<&str>, date: NaiveDate, text: &str) -> String {
    append_line(existing, format!("[{}] {}", date.format("%Y-%m-%d"), text))
}

/// Append a dated scrap note to the observations log
pub fn append_scrap_note(existing: Option<&str>, date: NaiveDate, motivo: &str) -> String {
    append_line(
        existing,
        format!("[BAJA {}] {}", date.format("%Y-%m-%d"), motivo),
    )
}

fn append_line(existing: Option<&str>, line: String) -> String {
    match existing.filter(|e| !e.is_empty()) {
        Some(existing) => format!("{}\n{}", existing, line),
        None => line,
    }
}

/// Where a unit lands when it leaves lab stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnPlan {
    pub warehouse_id: i32,
    pub position: Option<Position>,
    pub state: MinerState,
}

/// Full coordinates put the unit back in service; anything less parks it
/// in the warehouse awaiting placement.
pub fn plan_return(wh: i32, rack: Option<i32>, fila: Option<i32>, columna: Option<i32>) -> ReturnPlan {
    match Position::from_parts(Some(wh), rack, fila, columna) {
        Some(position) => ReturnPlan {
            warehouse_id: wh,
            position: Some(position),
            state: MinerState::Operativo,
        },
        None => ReturnPlan {
            warehouse_id: wh,
            position: None,
            state: MinerState::PendienteColocacion,
        },
    }
}
