//! Conciliation: replacement part requests tested in the rack or in the lab

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    cede_requires_transfer, failed_in_situ_motive, lab_conciliation_motive,
    linked_transfer_on_approve, linked_transfer_on_reject, plan_conciliation, ConciliationType,
    request_note, PartRequest, PartRequestAction, PartRequestStatus, RoleProfile, Sector,
    TransferStatus, LINKED_TRANSFER_REJECT_COMMENT, MINER_STATE_ON_REQUEST,
};

use super::audit::{self, actions};
use super::decode;
use super::miner::{lock_miner, miner_sn, set_miner_state};
use super::transfer::{insert_transfer, lock_transfer, resolve_transfer, set_transfer_status};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ConciliationService {
    db: PgPool,
}

pub(crate) const PART_REQUEST_COLUMNS: &str = r#"
    id, miner_id, ubicacion_reparacion, tipo_pieza, wh_origen, tipo_conciliacion,
    solicitud_traslado_id, comentario, estado, solicitante_id, fecha_solicitud,
    aprobador_lab_id, fecha_aprobacion_lab, despachador_id, fecha_despacho, fecha_recepcion,
    producto_sn, producto_modelo, producto_cantidad, notas_deposito
"#;

#[derive(Debug, FromRow)]
pub(crate) struct PartRequestRow {
    id: Uuid,
    miner_id: Uuid,
    ubicacion_reparacion: String,
    tipo_pieza: String,
    wh_origen: Option<i32>,
    tipo_conciliacion: String,
    solicitud_traslado_id: Option<Uuid>,
    comentario: Option<String>,
    estado: String,
    solicitante_id: Uuid,
    fecha_solicitud: DateTime<Utc>,
    aprobador_lab_id: Option<Uuid>,
    fecha_aprobacion_lab: Option<DateTime<Utc>>,
    despachador_id: Option<Uuid>,
    fecha_despacho: Option<DateTime<Utc>>,
    fecha_recepcion: Option<DateTime<Utc>>,
    producto_sn: Option<String>,
    producto_modelo: Option<String>,
    producto_cantidad: i32,
    notas_deposito: Option<String>,
}

impl TryFrom<PartRequestRow> for PartRequest {
    type Error = AppError;

    fn try_from(row: PartRequestRow) -> AppResult<Self> {
        Ok(PartRequest {
            id: row.id,
            miner_id: row.miner_id,
            ubicacion_reparacion: decode(
                &row.ubicacion_reparacion,
                ConciliationType::parse,
                "repair location",
            )?,
            tipo_pieza: row.tipo_pieza,
            wh_origen: row.wh_origen,
            tipo_conciliacion: decode(
                &row.tipo_conciliacion,
                ConciliationType::parse,
                "conciliation type",
            )?,
            solicitud_traslado_id: row.solicitud_traslado_id,
            comentario: row.comentario,
            estado: decode(&row.estado, PartRequestStatus::from_str, "part request status")?,
            solicitante_id: row.solicitante_id,
            fecha_solicitud: row.fecha_solicitud,
            aprobador_lab_id: row.aprobador_lab_id,
            fecha_aprobacion_lab: row.fecha_aprobacion_lab,
            despachador_id: row.despachador_id,
            fecha_despacho: row.fecha_despacho,
            fecha_recepcion: row.fecha_recepcion,
            producto_sn: row.producto_sn,
            producto_modelo: row.producto_modelo,
            producto_cantidad: row.producto_cantidad,
            notas_deposito: row.notas_deposito,
        })
    }
}

/// Part request with the miner and requester details shown on dashboards
#[derive(Debug, Serialize)]
pub struct PartRequestView {
    #[serde(flatten)]
    pub request: PartRequest,
    pub sn_fisica: Option<String>,
    pub modelo: Option<String>,
    pub warehouse_id: Option<i32>,
    pub solicitante: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct PartRequestViewRow {
    #[sqlx(flatten)]
    request: PartRequestRow,
    sn_fisica: Option<String>,
    modelo: Option<String>,
    warehouse_id: Option<i32>,
    solicitante: Option<String>,
}

impl TryFrom<PartRequestViewRow> for PartRequestView {
    type Error = AppError;

    fn try_from(row: PartRequestViewRow) -> AppResult<Self> {
        Ok(PartRequestView {
            request: row.request.try_into()?,
            sn_fisica: row.sn_fisica,
            modelo: row.modelo,
            warehouse_id: row.warehouse_id,
            solicitante: row.solicitante,
        })
    }
}

pub(crate) const PART_REQUEST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.miner_id, p.ubicacion_reparacion, p.tipo_pieza, p.wh_origen,
           p.tipo_conciliacion, p.solicitud_traslado_id, p.comentario, p.estado,
           p.solicitante_id, p.fecha_solicitud, p.aprobador_lab_id, p.fecha_aprobacion_lab,
           p.despachador_id, p.fecha_despacho, p.fecha_recepcion, p.producto_sn,
           p.producto_modelo, p.producto_cantidad, p.notas_deposito,
           m.sn_fisica, m.modelo, m.warehouse_id, u.username AS solicitante
    FROM part_requests p
    JOIN miners m ON m.id = p.miner_id
    LEFT JOIN users u ON u.id = p.solicitante_id
"#;

/// Load and lock a part request
pub(crate) async fn lock_part_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> AppResult<PartRequest> {
    let row = sqlx::query_as::<_, PartRequestRow>(&format!(
        "SELECT {} FROM part_requests WHERE id = $1 FOR UPDATE",
        PART_REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Part request".to_string()))?;

    row.try_into()
}

async fn set_part_request_status(
    conn: &mut PgConnection,
    request_id: Uuid,
    status: PartRequestStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE part_requests SET estado = $2 WHERE id = $1")
        .bind(request_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Input for opening a conciliation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConciliationInput {
    pub miner_id: Uuid,
    pub tipo: String,
    #[validate(length(max = 50))]
    pub tipo_pieza: Option<String>,
    pub comentario: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CedeToLabInput {
    pub comentario: Option<String>,
}

impl ConciliationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a conciliation. WH keeps the unit in its rack; LAB also raises a transfer.
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateConciliationInput,
    ) -> AppResult<PartRequest> {
        input.validate()?;
        let kind = ConciliationType::parse(&input.tipo)
            .ok_or_else(|| AppError::validation("tipo", "Tipo de conciliación inválido"))?;
        let tipo_pieza = input
            .tipo_pieza
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("GENERAL")
            .to_uppercase();
        let comentario = input.comentario.as_deref().map(str::trim).unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, input.miner_id).await?;
        let plan = plan_conciliation(kind, miner.modelo.as_deref(), miner.warehouse_id)?;

        let transfer = match plan.transfer_sector {
            Some(sector) => Some(
                insert_transfer(
                    &mut tx,
                    &miner,
                    "LAB",
                    sector,
                    &lab_conciliation_motive(&tipo_pieza, comentario),
                    user_id,
                )
                .await?,
            ),
            None => None,
        };

        let row = sqlx::query_as::<_, PartRequestRow>(&format!(
            r#"
            INSERT INTO part_requests (
                miner_id, ubicacion_reparacion, tipo_pieza, wh_origen, tipo_conciliacion,
                solicitud_traslado_id, comentario, estado, solicitante_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PART_REQUEST_COLUMNS
        ))
        .bind(miner.id)
        .bind(kind.as_str())
        .bind(&tipo_pieza)
        .bind(miner.warehouse_id)
        .bind(kind.as_str())
        .bind(transfer.as_ref().map(|t| t.id))
        .bind(comentario)
        .bind(PartRequestStatus::PendienteAprobacionLab.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(state) = plan.miner_state {
            set_miner_state(&mut tx, miner.id, state).await?;
        }

        let accion = match kind {
            ConciliationType::Wh => actions::CONCILIATION_WH,
            ConciliationType::Lab => actions::CONCILIATION_LAB,
        };
        audit::record(
            &mut tx,
            user_id,
            accion,
            miner.sn_fisica.as_deref(),
            format!("Pieza: {} ({})", tipo_pieza, miner.location_label()),
        )
        .await?;

        tx.commit().await?;

        let request = PartRequest::try_from(row)?;
        tracing::info!(
            request_id = %request.id,
            miner_id = %miner.id,
            tipo = kind.as_str(),
            transfer_id = ?transfer.as_ref().map(|t| t.id),
            user = %user_id,
            "Conciliation opened"
        );

        Ok(request)
    }

    /// Open requests raised by this user, newest first
    pub async fn mine(&self, user_id: Uuid) -> AppResult<Vec<PartRequestView>> {
        let closed: Vec<&str> = PartRequestStatus::CLOSED
            .iter()
            .map(PartRequestStatus::as_str)
            .collect();

        let rows = sqlx::query_as::<_, PartRequestViewRow>(&format!(
            r#"
            {}
            WHERE p.solicitante_id = $1 AND NOT (p.estado = ANY($2))
            ORDER BY p.fecha_solicitud DESC
            "#,
            PART_REQUEST_VIEW_SELECT
        ))
        .bind(user_id)
        .bind(&closed)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PartRequestView::try_from).collect()
    }

    /// Requests waiting for the lab to validate the part, oldest first
    pub async fn lab_pending(&self) -> AppResult<Vec<PartRequestView>> {
        let rows = sqlx::query_as::<_, PartRequestViewRow>(&format!(
            "{} WHERE p.estado = $1 ORDER BY p.fecha_solicitud ASC",
            PART_REQUEST_VIEW_SELECT
        ))
        .bind(PartRequestStatus::PendienteAprobacionLab.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PartRequestView::try_from).collect()
    }

    /// Lab validates the part. A LAB conciliation also advances its transfer.
    pub async fn lab_approve(&self, user_id: Uuid, request_id: Uuid) -> AppResult<PartRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, request_id).await?;
        let next = request.estado.apply(PartRequestAction::LabApprove)?;

        sqlx::query(
            r#"
            UPDATE part_requests
            SET estado = $2, aprobador_lab_id = $3, fecha_aprobacion_lab = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(next.as_str())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let mut transfer_advanced = None;
        if let Some(transfer_id) = request.solicitud_traslado_id {
            let transfer = lock_transfer(&mut tx, transfer_id).await?;
            if let Some(status) =
                linked_transfer_on_approve(request.tipo_conciliacion, transfer.estado, transfer.sector)
            {
                set_transfer_status(&mut tx, transfer.id, status).await?;
                transfer_advanced = Some((transfer.id, transfer.estado, status));
            }
        }

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        for (accion, datos) in lab_approval_entries(&request, transfer_advanced) {
            audit::record(&mut tx, user_id, accion, sn.as_deref(), datos).await?;
        }

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %next,
            transfer_advanced = transfer_advanced.is_some(),
            user = %user_id,
            "Part request approved by lab"
        );

        Ok(PartRequest {
            estado: next,
            aprobador_lab_id: Some(user_id),
            ..request
        })
    }

    /// Lab rejects the part. A linked transfer still in flight is rejected too.
    pub async fn lab_reject(&self, user_id: Uuid, request_id: Uuid) -> AppResult<PartRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, request_id).await?;
        let next = request.estado.apply(PartRequestAction::LabReject)?;
        set_part_request_status(&mut tx, request.id, next).await?;

        if let Some(transfer_id) = request.solicitud_traslado_id {
            let transfer = lock_transfer(&mut tx, transfer_id).await?;
            if let Some(status) = linked_transfer_on_reject(transfer.estado) {
                resolve_transfer(
                    &mut tx,
                    transfer.id,
                    status,
                    Some(user_id),
                    LINKED_TRANSFER_REJECT_COMMENT,
                )
                .await?;
            }
        }

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::PART_LAB_REJECTED,
            sn.as_deref(),
            request_note(request.id, &format!("Pieza {} rechazada", request.tipo_pieza)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %next,
            user = %user_id,
            "Part request rejected by lab"
        );

        Ok(PartRequest { estado: next, ..request })
    }

    /// The requester confirms the dispatched piece arrived
    pub async fn confirm_receipt(&self, user_id: Uuid, request_id: Uuid) -> AppResult<PartRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, request_id).await?;
        if request.solicitante_id != user_id {
            return Err(AppError::forbidden(
                "Solo el solicitante puede confirmar la recepción",
            ));
        }
        let next = request.estado.apply(PartRequestAction::ConfirmReceipt)?;

        sqlx::query("UPDATE part_requests SET estado = $2, fecha_recepcion = NOW() WHERE id = $1")
            .bind(request.id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::PART_RECEIVED,
            sn.as_deref(),
            request_note(
                request.id,
                &format!("Producto: {}", request.producto_sn.as_deref().unwrap_or("N/A")),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(request_id = %request.id, from = %request.estado, to = %next, "Part received");

        Ok(PartRequest {
            estado: next,
            fecha_recepcion: Some(Utc::now()),
            ..request
        })
    }

    /// The new part fixed the unit: back in service, diagnosis cleared
    pub async fn finish(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        request_id: Uuid,
    ) -> AppResult<PartRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, request_id).await?;
        ensure_requester_or_supervisor(&request, user_id, role)?;
        let next = request.estado.apply(PartRequestAction::FinishSuccess)?;
        set_part_request_status(&mut tx, request.id, next).await?;

        let miner = lock_miner(&mut tx, request.miner_id).await?;
        sqlx::query(
            r#"
            UPDATE miners
            SET proceso_estado = $2, diagnostico_detalle = NULL, fecha_diagnostico = NULL
            WHERE id = $1
            "#,
        )
        .bind(miner.id)
        .bind(shared::MinerState::Operativo.as_str())
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::CONCILIATION_SUCCESS,
            miner.sn_fisica.as_deref(),
            format!(
                "Pieza {} instalada ({})",
                request.producto_sn.as_deref().unwrap_or(&request.tipo_pieza),
                request.tipo_conciliacion.as_str()
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            miner_id = %miner.id,
            from = %miner.proceso_estado,
            to = "operativo",
            user = %user_id,
            "Conciliation finished"
        );

        Ok(PartRequest { estado: next, ..request })
    }

    /// The part did not fix the unit; hand it over to the lab
    pub async fn cede_to_lab(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        request_id: Uuid,
        input: CedeToLabInput,
    ) -> AppResult<PartRequest> {
        let comentario = input
            .comentario
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("Sin comentario");

        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, request_id).await?;
        ensure_requester_or_supervisor(&request, user_id, role)?;
        let next = request.estado.apply(PartRequestAction::CedeToLab)?;
        set_part_request_status(&mut tx, request.id, next).await?;

        let miner = lock_miner(&mut tx, request.miner_id).await?;
        let accion = if cede_requires_transfer(request.tipo_conciliacion) {
            let transfer = insert_transfer(
                &mut tx,
                &miner,
                "LAB",
                Sector::Wh,
                &failed_in_situ_motive(comentario),
                user_id,
            )
            .await?;
            set_miner_state(&mut tx, miner.id, MINER_STATE_ON_REQUEST).await?;
            tracing::debug!(transfer_id = %transfer.id, "Transfer raised for failed in-situ test");
            actions::CEDED_TO_LAB
        } else {
            actions::CEDED_TO_LAB_ALREADY_THERE
        };

        audit::record(
            &mut tx,
            user_id,
            accion,
            miner.sn_fisica.as_deref(),
            comentario.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            miner_id = %miner.id,
            from = %request.estado,
            to = %next,
            user = %user_id,
            "Conciliation ceded to lab"
        );

        Ok(PartRequest { estado: next, ..request })
    }
}

/// Audit rows for a lab part approval. The part approval is always logged; an
/// advanced transfer adds its own row.
fn lab_approval_entries(
    request: &PartRequest,
    transfer_advanced: Option<(Uuid, TransferStatus, TransferStatus)>,
) -> Vec<(&'static str, String)> {
    let mut entries = vec![(
        actions::PART_LAB_APPROVED,
        request_note(request.id, &format!("Pieza {} aprobada", request.tipo_pieza)),
    )];
    if let Some((transfer_id, from, to)) = transfer_advanced {
        entries.push((
            actions::LAB_TRANSFER_VALIDATED,
            request_note(transfer_id, &format!("{} -> {}", from, to)),
        ));
    }
    entries
}

fn ensure_requester_or_supervisor(
    request: &PartRequest,
    user_id: Uuid,
    role: &RoleProfile,
) -> AppResult<()> {
    if request.solicitante_id == user_id || role.is_supervisor() {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "Solo el solicitante o un supervisor puede cerrar la conciliación",
        ))
    }
}
