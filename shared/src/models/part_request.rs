//! Part request (conciliation) workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::miner::{is_hydro_model, sector_from_warehouse, MinerState};
use crate::models::transfer::{TransferAction, TransferStatus};
use crate::types::{Sector, HYDRO_WAREHOUSE_ID};

/// A request for a replacement part to resolve an RMA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRequest {
    pub id: Uuid,
    pub miner_id: Uuid,
    pub ubicacion_reparacion: ConciliationType,
    pub tipo_pieza: String,
    pub wh_origen: Option<i32>,
    pub tipo_conciliacion: ConciliationType,
    pub solicitud_traslado_id: Option<Uuid>,
    pub comentario: Option<String>,
    pub estado: PartRequestStatus,
    pub solicitante_id: Uuid,
    pub fecha_solicitud: DateTime<Utc>,
    pub aprobador_lab_id: Option<Uuid>,
    pub fecha_aprobacion_lab: Option<DateTime<Utc>>,
    pub despachador_id: Option<Uuid>,
    pub fecha_despacho: Option<DateTime<Utc>>,
    pub fecha_recepcion: Option<DateTime<Utc>>,
    pub producto_sn: Option<String>,
    pub producto_modelo: Option<String>,
    pub producto_cantidad: i32,
    pub notas_deposito: Option<String>,
}

/// Where the conciliation happens: in the rack or in the lab
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConciliationType {
    Wh,
    Lab,
}

impl ConciliationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConciliationType::Wh => "WH",
            ConciliationType::Lab => "LAB",
        }
    }

    /// Case-insensitive parse of "WH" / "LAB"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WH" => Some(ConciliationType::Wh),
            "LAB" => Some(ConciliationType::Lab),
            _ => None,
        }
    }
}

/// Status of a part request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartRequestStatus {
    PendienteAprobacionLab,
    PendienteDeposito,
    EnCamino,
    Recibido,
    Finalizado,
    Rechazado,
    CedidoLab,
}

/// Actions on a part request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartRequestAction {
    LabApprove,
    LabReject,
    Dispatch,
    ConfirmReceipt,
    FinishSuccess,
    CedeToLab,
}

impl PartRequestAction {
    pub const ALL: [PartRequestAction; 6] = [
        PartRequestAction::LabApprove,
        PartRequestAction::LabReject,
        PartRequestAction::Dispatch,
        PartRequestAction::ConfirmReceipt,
        PartRequestAction::FinishSuccess,
        PartRequestAction::CedeToLab,
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            PartRequestAction::LabApprove => "lab-approve",
            PartRequestAction::LabReject => "lab-reject",
            PartRequestAction::Dispatch => "dispatch",
            PartRequestAction::ConfirmReceipt => "confirm receipt of",
            PartRequestAction::FinishSuccess => "finish",
            PartRequestAction::CedeToLab => "cede to lab",
        }
    }
}

impl PartRequestStatus {
    pub const ALL: [PartRequestStatus; 7] = [
        PartRequestStatus::PendienteAprobacionLab,
        PartRequestStatus::PendienteDeposito,
        PartRequestStatus::EnCamino,
        PartRequestStatus::Recibido,
        PartRequestStatus::Finalizado,
        PartRequestStatus::Rechazado,
        PartRequestStatus::CedidoLab,
    ];

    /// Hidden from the requester's dashboard
    pub const CLOSED: [PartRequestStatus; 3] = [
        PartRequestStatus::Finalizado,
        PartRequestStatus::CedidoLab,
        PartRequestStatus::Rechazado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartRequestStatus::PendienteAprobacionLab => "pendiente_aprobacion_lab",
            PartRequestStatus::PendienteDeposito => "pendiente_deposito",
            PartRequestStatus::EnCamino => "en_camino",
            PartRequestStatus::Recibido => "recibido",
            PartRequestStatus::Finalizado => "finalizado",
            PartRequestStatus::Rechazado => "rechazado",
            PartRequestStatus::CedidoLab => "cedido_lab",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_closed(&self) -> bool {
        Self::CLOSED.contains(self)
    }

    pub fn apply(self, action: PartRequestAction) -> WorkflowResult<Self> {
        use PartRequestAction as A;
        use PartRequestStatus as S;

        let next = match (action, self) {
            (A::LabApprove, S::PendienteAprobacionLab) => S::PendienteDeposito,
            (A::LabReject, S::PendienteAprobacionLab) => S::Rechazado,
            (A::Dispatch, S::PendienteDeposito) => S::EnCamino,
            (A::ConfirmReceipt, S::EnCamino) => S::Recibido,
            (A::FinishSuccess, S::EnCamino | S::Recibido) => S::Finalizado,
            (A::CedeToLab, S::EnCamino | S::Recibido) => S::CedidoLab,
            (action, from) => {
                return Err(WorkflowError::InvalidTransition {
                    entity: "part request",
                    from: from.as_str().to_string(),
                    action: action.verb(),
                })
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for PartRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What opening a conciliation does to the miner and whether a transfer is raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConciliationPlan {
    pub kind: ConciliationType,
    /// New miner state, if it changes
    pub miner_state: Option<MinerState>,
    /// Sector of the transfer to LAB, when one must be created
    pub transfer_sector: Option<Sector>,
}

/// Decide how a conciliation opens for a miner at `warehouse_id`
pub fn plan_conciliation(
    kind: ConciliationType,
    modelo: Option<&str>,
    warehouse_id: Option<i32>,
) -> WorkflowResult<ConciliationPlan> {
    if warehouse_id.is_none() {
        return Err(WorkflowError::validation(
            "miner_id",
            "El minero no está en un warehouse. La conciliación es solo para equipos en WH.",
        ));
    }
    match kind {
        ConciliationType::Wh => {
            if is_hydro_model(modelo) || warehouse_id == Some(HYDRO_WAREHOUSE_ID) {
                return Err(WorkflowError::validation(
                    "tipo",
                    "Hydro no permite conciliación in-situ. Use la opción de Traslado a LAB.",
                ));
            }
            Ok(ConciliationPlan {
                kind,
                miner_state: Some(MinerState::Conciliando),
                transfer_sector: None,
            })
        }
        ConciliationType::Lab => Ok(ConciliationPlan {
            kind,
            miner_state: None,
            transfer_sector: Some(sector_from_warehouse(warehouse_id)),
        }),
    }
}

/// Motive recorded on the transfer raised by a lab conciliation
pub fn lab_conciliation_motive(pieza: &str, comentario: &str) -> String {
    format!("CONCILIACIÓN LAB: Prueba de pieza {}. {}", pieza, comentario)
}

/// Motive recorded on the transfer raised when an in-situ test fails
pub fn failed_in_situ_motive(comentario: &str) -> String {
    format!(
        "FALLO CONCILIACIÓN IN-SITU: {}. Se deriva a Lab.",
        comentario
    )
}

pub const LINKED_TRANSFER_REJECT_COMMENT: &str =
    "Rechazo automático por rechazo de pieza de conciliación.";

/// Next status of the linked transfer when the lab approves the part.
///
/// Only a transfer still waiting on the lab advances; one the lab already
/// handled from the transfer panel is left alone.
pub fn linked_transfer_on_approve(
    kind: ConciliationType,
    transfer_status: TransferStatus,
    sector: Sector,
) -> Option<TransferStatus> {
    if kind != ConciliationType::Lab {
        return None;
    }
    transfer_status
        .apply(TransferAction::LabApprove, sector)
        .ok()
}

/// Next status of the linked transfer when the lab rejects the part
pub fn linked_transfer_on_reject(transfer_status: TransferStatus) -> Option<TransferStatus> {
    (transfer_status == TransferStatus::PendienteLab || transfer_status.awaits_coordinator())
        .then_some(TransferStatus::RechazadoLab)
}

/// Whether ceding to the lab must raise a fresh transfer request
pub fn cede_requires_transfer(kind: ConciliationType) -> bool {
    kind == ConciliationType::Wh
}

/// Model label stored on the request when a piece is dispatched
pub fn dispatched_product_model(modelo_equipo: &str, modelo_pieza: Option<&str>, tipo: &str) -> String {
    let pieza = modelo_pieza.filter(|m| !m.trim().is_empty()).unwrap_or(tipo);
    format!("{} {}", modelo_equipo, pieza)
}
