//! Transfer request workflow
//!
//! ```text
//! pendiente_lab ──lab_approve──▶ pendiente_coordinador ─────────┐
//!      │              (Hydro) ─▶ pendiente_coordinador_hydro ───┤ approve
//!      └─lab_reject─▶ rechazado_lab                             ▼
//!                                      rechazado ◀─reject─   aprobado ──execute──▶ ejecutado
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::miner::{origin_label, MinerState};
use crate::models::user::RoleProfile;
use crate::types::Sector;

/// A request to move a miner out of its rack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: Uuid,
    pub miner_id: Uuid,
    pub origen_wh: Option<i32>,
    pub origen_rack: Option<i32>,
    pub origen_fila: Option<i32>,
    pub origen_columna: Option<i32>,
    pub destino: String,
    pub sector: Sector,
    pub estado: TransferStatus,
    pub motivo: String,
    pub solicitante_id: Uuid,
    pub fecha_solicitud: DateTime<Utc>,
    pub aprobador_id: Option<Uuid>,
    pub fecha_resolucion: Option<DateTime<Utc>>,
    pub comentario_resolucion: Option<String>,
}

impl TransferRequest {
    pub fn origin_label(&self) -> String {
        origin_label(
            self.sector,
            self.origen_wh,
            self.origen_rack,
            self.origen_fila,
            self.origen_columna,
        )
    }
}

/// Status of a transfer request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    PendienteLab,
    PendienteCoordinador,
    PendienteCoordinadorHydro,
    /// Legacy pending state, treated as `PendienteCoordinador`
    Pendiente,
    Aprobado,
    Rechazado,
    RechazadoLab,
    Ejecutado,
}

/// Actions that move a transfer request through its workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    LabApprove,
    LabReject,
    HydroCoordinatorApprove,
    Approve,
    Reject,
    Execute,
}

impl TransferAction {
    pub const ALL: [TransferAction; 6] = [
        TransferAction::LabApprove,
        TransferAction::LabReject,
        TransferAction::HydroCoordinatorApprove,
        TransferAction::Approve,
        TransferAction::Reject,
        TransferAction::Execute,
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            TransferAction::LabApprove => "lab-approve",
            TransferAction::LabReject => "lab-reject",
            TransferAction::HydroCoordinatorApprove => "approve as Hydro coordinator",
            TransferAction::Approve => "approve",
            TransferAction::Reject => "reject",
            TransferAction::Execute => "execute",
        }
    }
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 8] = [
        TransferStatus::PendienteLab,
        TransferStatus::PendienteCoordinador,
        TransferStatus::PendienteCoordinadorHydro,
        TransferStatus::Pendiente,
        TransferStatus::Aprobado,
        TransferStatus::Rechazado,
        TransferStatus::RechazadoLab,
        TransferStatus::Ejecutado,
    ];

    /// States shown on the coordinator panel
    pub const AWAITING_COORDINATOR: [TransferStatus; 3] = [
        TransferStatus::PendienteCoordinador,
        TransferStatus::PendienteCoordinadorHydro,
        TransferStatus::Pendiente,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::PendienteLab => "pendiente_lab",
            TransferStatus::PendienteCoordinador => "pendiente_coordinador",
            TransferStatus::PendienteCoordinadorHydro => "pendiente_coordinador_hydro",
            TransferStatus::Pendiente => "pendiente",
            TransferStatus::Aprobado => "aprobado",
            TransferStatus::Rechazado => "rechazado",
            TransferStatus::RechazadoLab => "rechazado_lab",
            TransferStatus::Ejecutado => "ejecutado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Rechazado | TransferStatus::RechazadoLab | TransferStatus::Ejecutado
        )
    }

    pub fn awaits_coordinator(&self) -> bool {
        Self::AWAITING_COORDINATOR.contains(self)
    }

    /// Apply an action, returning the next status
    pub fn apply(self, action: TransferAction, sector: Sector) -> WorkflowResult<Self> {
        use TransferAction as A;
        use TransferStatus as S;

        let next = match (action, self) {
            (A::LabApprove, S::PendienteLab) => match sector {
                Sector::Hydro => S::PendienteCoordinadorHydro,
                Sector::Wh => S::PendienteCoordinador,
            },
            (A::LabReject, S::PendienteLab) => S::RechazadoLab,
            (A::HydroCoordinatorApprove, S::PendienteCoordinadorHydro) => S::Aprobado,
            (A::Approve, s) if s.awaits_coordinator() => S::Aprobado,
            (A::Reject, S::PendienteCoordinador | S::Pendiente) => S::Rechazado,
            (A::Execute, S::Aprobado) => S::Ejecutado,
            (action, from) => {
                return Err(WorkflowError::InvalidTransition {
                    entity: "transfer request",
                    from: from.as_str().to_string(),
                    action: action.verb(),
                })
            }
        };
        Ok(next)
    }

    /// Coordinator approval followed by execution, as the approval endpoints do it.
    /// `action` is `Approve` or `HydroCoordinatorApprove`.
    pub fn approve_and_execute(self, action: TransferAction, sector: Sector) -> WorkflowResult<Self> {
        match action {
            TransferAction::Approve | TransferAction::HydroCoordinatorApprove => {
                self.apply(action, sector)?.apply(TransferAction::Execute, sector)
            }
            other => Err(WorkflowError::InvalidTransition {
                entity: "transfer request",
                from: self.as_str().to_string(),
                action: other.verb(),
            }),
        }
    }

    /// Whether this status counts toward the pending badge of a sector
    pub fn counts_as_pending_for(&self, sector: Sector) -> bool {
        match sector {
            Sector::Wh => matches!(
                self,
                TransferStatus::PendienteCoordinador | TransferStatus::Pendiente
            ),
            Sector::Hydro => matches!(
                self,
                TransferStatus::PendienteCoordinador | TransferStatus::PendienteCoordinadorHydro
            ),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending coordinator approvals per sector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingCounts {
    #[serde(rename = "WH")]
    pub wh: i64,
    #[serde(rename = "Hydro")]
    pub hydro: i64,
    pub total: i64,
}

impl PendingCounts {
    pub fn new(wh: i64, hydro: i64) -> Self {
        Self {
            wh,
            hydro,
            total: wh + hydro,
        }
    }

    /// Tally from (sector, status) pairs
    pub fn tally<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Sector, TransferStatus)>,
    {
        let (mut wh, mut hydro) = (0, 0);
        for (sector, status) in rows {
            if status.counts_as_pending_for(sector) {
                match sector {
                    Sector::Wh => wh += 1,
                    Sector::Hydro => hydro += 1,
                }
            }
        }
        Self::new(wh, hydro)
    }
}

/// Whether a coordinator-level user may approve or reject this request
pub fn can_user_approve(role: &RoleProfile, sector: Sector, status: TransferStatus) -> bool {
    if role.is_site_manager() {
        return true;
    }
    if role.is_hydro_coordinator() {
        return sector == Sector::Hydro && status == TransferStatus::PendienteCoordinadorHydro;
    }
    if role.is_coordinator() {
        return status != TransferStatus::PendienteCoordinadorHydro;
    }
    false
}

/// Only the Hydro coordinator or the site manager sign off Hydro transfers
pub fn can_approve_as_hydro_coordinator(role: &RoleProfile) -> bool {
    role.is_hydro_coordinator() || role.is_site_manager()
}

/// Destination "LAB" in any case
pub fn is_lab_destination(destino: &str) -> bool {
    destino.trim().eq_ignore_ascii_case("LAB")
}

/// Miner state once the transfer executes, if the miner is affected
pub fn state_after_execution(destino: &str) -> Option<MinerState> {
    is_lab_destination(destino).then_some(MinerState::EnLaboratorio)
}

/// Miner state while a transfer request is open
pub const MINER_STATE_ON_REQUEST: MinerState = MinerState::PendienteTraslado;

/// Miner state after the lab turns a transfer down; the RMA diagnosis stays
pub const MINER_STATE_ON_LAB_REJECT: MinerState = MinerState::Operativo;

/// Motive used when the lab rejects without giving one
pub const LAB_REJECT_DEFAULT_MOTIVE: &str = "Rechazado por Laboratorio";

/// Resolution comment stamped on bulk approvals
pub const BULK_APPROVAL_COMMENT: &str = "Aprobación masiva";

pub fn lab_reject_motive(motivo: Option<&str>) -> String {
    motivo
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(LAB_REJECT_DEFAULT_MOTIVE)
        .to_string()
}

/// Audit detail for a workflow step, tagged with the request it belongs to
pub fn request_note(request_id: Uuid, detail: &str) -> String {
    if detail.is_empty() {
        format!("Solicitud {}", request_id)
    } else {
        format!("Solicitud {}: {}", request_id, detail)
    }
}

/// Default resolution comment for each resolving action
pub fn default_resolution_comment(action: TransferAction) -> &'static str {
    match action {
        TransferAction::Approve => "Aprobado",
        TransferAction::Reject => "Rechazado",
        TransferAction::HydroCoordinatorApprove => "Aprobado por Coordinador Hydro",
        TransferAction::LabReject => "Rechazado por LAB",
        TransferAction::LabApprove | TransferAction::Execute => "",
    }
}
