//! Transfer request workflow: lab pre-approval, coordinator sign-off, execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    can_approve_as_hydro_coordinator, can_user_approve, default_resolution_comment,
    lab_reject_motive, request_note, require_text, state_after_execution, Miner,
    PendingCounts, RoleProfile, Sector, TransferAction, TransferRequest, TransferStatus,
    BULK_APPROVAL_COMMENT, MINER_STATE_ON_LAB_REJECT, MINER_STATE_ON_REQUEST,
};

use super::audit::{self, actions};
use super::decode;
use super::miner::{lock_miner, miner_sn, set_miner_state};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

pub(crate) const TRANSFER_COLUMNS: &str = r#"
    id, miner_id, origen_wh, origen_rack, origen_fila, origen_columna, destino, sector,
    estado, motivo, solicitante_id, fecha_solicitud, aprobador_id, fecha_resolucion,
    comentario_resolucion
"#;

#[derive(Debug, FromRow)]
pub(crate) struct TransferRow {
    id: Uuid,
    miner_id: Uuid,
    origen_wh: Option<i32>,
    origen_rack: Option<i32>,
    origen_fila: Option<i32>,
    origen_columna: Option<i32>,
    destino: String,
    sector: String,
    estado: String,
    motivo: String,
    solicitante_id: Uuid,
    fecha_solicitud: DateTime<Utc>,
    aprobador_id: Option<Uuid>,
    fecha_resolucion: Option<DateTime<Utc>>,
    comentario_resolucion: Option<String>,
}

impl TryFrom<TransferRow> for TransferRequest {
    type Error = AppError;

    fn try_from(row: TransferRow) -> AppResult<Self> {
        Ok(TransferRequest {
            id: row.id,
            miner_id: row.miner_id,
            origen_wh: row.origen_wh,
            origen_rack: row.origen_rack,
            origen_fila: row.origen_fila,
            origen_columna: row.origen_columna,
            destino: row.destino,
            sector: decode(&row.sector, Sector::from_str, "sector")?,
            estado: decode(&row.estado, TransferStatus::from_str, "transfer status")?,
            motivo: row.motivo,
            solicitante_id: row.solicitante_id,
            fecha_solicitud: row.fecha_solicitud,
            aprobador_id: row.aprobador_id,
            fecha_resolucion: row.fecha_resolucion,
            comentario_resolucion: row.comentario_resolucion,
        })
    }
}

fn into_transfers(rows: Vec<TransferRow>) -> AppResult<Vec<TransferRequest>> {
    rows.into_iter().map(TransferRequest::try_from).collect()
}

/// Transfer plus the miner fields the approval panels show
#[derive(Debug, Serialize)]
pub struct TransferView {
    #[serde(flatten)]
    pub request: TransferRequest,
    pub origen: String,
    pub sn_fisica: Option<String>,
    pub modelo: Option<String>,
    pub diagnostico_detalle: Option<String>,
    pub solicitante: Option<String>,
}

#[derive(Debug, FromRow)]
struct TransferViewRow {
    #[sqlx(flatten)]
    transfer: TransferRow,
    sn_fisica: Option<String>,
    modelo: Option<String>,
    diagnostico_detalle: Option<String>,
    solicitante: Option<String>,
}

impl TryFrom<TransferViewRow> for TransferView {
    type Error = AppError;

    fn try_from(row: TransferViewRow) -> AppResult<Self> {
        let request = TransferRequest::try_from(row.transfer)?;
        Ok(TransferView {
            origen: request.origin_label(),
            request,
            sn_fisica: row.sn_fisica,
            modelo: row.modelo,
            diagnostico_detalle: row.diagnostico_detalle,
            solicitante: row.solicitante,
        })
    }
}

const VIEW_SELECT: &str = r#"
    SELECT t.id, t.miner_id, t.origen_wh, t.origen_rack, t.origen_fila, t.origen_columna,
           t.destino, t.sector, t.estado, t.motivo, t.solicitante_id, t.fecha_solicitud,
           t.aprobador_id, t.fecha_resolucion, t.comentario_resolucion,
           m.sn_fisica, m.modelo, m.diagnostico_detalle, u.username AS solicitante
    FROM transfer_requests t
    JOIN miners m ON m.id = t.miner_id
    LEFT JOIN users u ON u.id = t.solicitante_id
"#;

/// Input for requesting a transfer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub miner_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub destino: String,
    pub motivo: Option<String>,
}

/// Optional resolution comment
#[derive(Debug, Default, Deserialize)]
pub struct ResolveTransferInput {
    pub comentario: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabRejectInput {
    pub motivo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkApproveInput {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkApproveResult {
    pub aprobados: usize,
    pub solicitados: usize,
}

/// Insert a `pendiente_lab` transfer that snapshots the miner's position
pub(crate) async fn insert_transfer(
    conn: &mut PgConnection,
    miner: &Miner,
    destino: &str,
    sector: Sector,
    motivo: &str,
    solicitante_id: Uuid,
) -> AppResult<TransferRequest> {
    let row = sqlx::query_as::<_, TransferRow>(&format!(
        r#"
        INSERT INTO transfer_requests (
            miner_id, origen_wh, origen_rack, origen_fila, origen_columna,
            destino, sector, estado, motivo, solicitante_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        TRANSFER_COLUMNS
    ))
    .bind(miner.id)
    .bind(miner.warehouse_id)
    .bind(miner.rack_id)
    .bind(miner.fila)
    .bind(miner.columna)
    .bind(destino)
    .bind(sector.as_str())
    .bind(TransferStatus::PendienteLab.as_str())
    .bind(motivo)
    .bind(solicitante_id)
    .fetch_one(conn)
    .await?;

    row.try_into()
}

/// Load and lock a transfer request
pub(crate) async fn lock_transfer(
    conn: &mut PgConnection,
    transfer_id: Uuid,
) -> AppResult<TransferRequest> {
    let row = sqlx::query_as::<_, TransferRow>(&format!(
        "SELECT {} FROM transfer_requests WHERE id = $1 FOR UPDATE",
        TRANSFER_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Transfer request".to_string()))?;

    row.try_into()
}

/// Move a transfer to a new status without touching its resolution fields
pub(crate) async fn set_transfer_status(
    conn: &mut PgConnection,
    transfer_id: Uuid,
    status: TransferStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE transfer_requests SET estado = $2 WHERE id = $1")
        .bind(transfer_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Move a transfer to a resolved status, stamping approver, date and comment
pub(crate) async fn resolve_transfer(
    conn: &mut PgConnection,
    transfer_id: Uuid,
    status: TransferStatus,
    aprobador_id: Option<Uuid>,
    comentario: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE transfer_requests
        SET estado = $2,
            aprobador_id = COALESCE($3, aprobador_id),
            fecha_resolucion = NOW(),
            comentario_resolucion = $4
        WHERE id = $1
        "#,
    )
    .bind(transfer_id)
    .bind(status.as_str())
    .bind(aprobador_id)
    .bind(comentario)
    .execute(conn)
    .await?;
    Ok(())
}

/// Carry out an approved transfer. A LAB destination pulls the miner off its rack.
async fn execute_transfer(conn: &mut PgConnection, request: &TransferRequest) -> AppResult<()> {
    let next = TransferStatus::Aprobado.apply(TransferAction::Execute, request.sector)?;
    set_transfer_status(conn, request.id, next).await?;

    if let Some(state) = state_after_execution(&request.destino) {
        sqlx::query(
            r#"
            UPDATE miners
            SET warehouse_id = NULL, rack_id = NULL, fila = NULL, columna = NULL,
                proceso_estado = $2
            WHERE id = $1
            "#,
        )
        .bind(request.miner_id)
        .bind(state.as_str())
        .execute(conn)
        .await?;
    }

    Ok(())
}

fn approval_denied(role: &RoleProfile, request: &TransferRequest) -> AppError {
    AppError::Forbidden {
        message: format!(
            "Role '{}' cannot resolve a {} request in state {}",
            role.role_name, request.sector, request.estado
        ),
        message_es: format!(
            "El puesto '{}' no puede resolver una solicitud {} en estado {}",
            role.role_name, request.sector, request.estado
        ),
    }
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Ask for a miner to be moved. Starts at `pendiente_lab`.
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateTransferInput,
    ) -> AppResult<TransferRequest> {
        input.validate()?;
        let motivo = require_text("motivo", input.motivo.as_deref())?;

        let mut tx = self.db.begin().await?;

        let miner = lock_miner(&mut tx, input.miner_id).await?;
        let sector = miner.sector();
        let request = insert_transfer(
            &mut tx,
            &miner,
            input.destino.trim(),
            sector,
            &motivo,
            user_id,
        )
        .await?;
        set_miner_state(&mut tx, miner.id, MINER_STATE_ON_REQUEST).await?;

        audit::record(
            &mut tx,
            user_id,
            actions::TRANSFER_REQUESTED,
            miner.sn_fisica.as_deref(),
            format!("{} -> {}: {}", request.origin_label(), request.destino, motivo),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            miner_id = %miner.id,
            %sector,
            destino = %request.destino,
            user = %user_id,
            "Transfer requested"
        );

        Ok(request)
    }

    /// Requests waiting for the lab, newest first
    pub async fn lab_pending(&self) -> AppResult<Vec<TransferView>> {
        let rows = sqlx::query_as::<_, TransferViewRow>(&format!(
            "{} WHERE t.estado = $1 ORDER BY t.fecha_solicitud DESC",
            VIEW_SELECT
        ))
        .bind(TransferStatus::PendienteLab.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TransferView::try_from).collect()
    }

    /// Requests waiting for a coordinator, optionally for one sector
    pub async fn pending(&self, sector: Option<Sector>) -> AppResult<Vec<TransferView>> {
        let states: Vec<&str> = TransferStatus::AWAITING_COORDINATOR
            .iter()
            .map(TransferStatus::as_str)
            .collect();

        let rows = sqlx::query_as::<_, TransferViewRow>(&format!(
            r#"
            {}
            WHERE t.estado = ANY($1)
              AND ($2::TEXT IS NULL OR t.sector = $2)
            ORDER BY t.fecha_solicitud DESC
            "#,
            VIEW_SELECT
        ))
        .bind(&states)
        .bind(sector.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TransferView::try_from).collect()
    }

    /// Badge counts for the coordinator panel
    pub async fn counts(&self) -> AppResult<PendingCounts> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT sector, estado FROM transfer_requests
            WHERE estado IN ('pendiente_coordinador', 'pendiente_coordinador_hydro', 'pendiente')
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let pairs = rows
            .iter()
            .map(|(sector, estado)| {
                Ok((
                    decode(sector, Sector::from_str, "sector")?,
                    decode(estado, TransferStatus::from_str, "transfer status")?,
                ))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PendingCounts::tally(pairs))
    }

    /// Latest 100 requests
    pub async fn history(&self) -> AppResult<Vec<TransferView>> {
        let rows = sqlx::query_as::<_, TransferViewRow>(&format!(
            "{} ORDER BY t.fecha_solicitud DESC LIMIT 100",
            VIEW_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TransferView::try_from).collect()
    }

    /// Lab accepts the unit; the request moves on to the sector's coordinator
    pub async fn lab_approve(&self, user_id: Uuid, transfer_id: Uuid) -> AppResult<TransferRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_transfer(&mut tx, transfer_id).await?;
        let next = request.estado.apply(TransferAction::LabApprove, request.sector)?;
        set_transfer_status(&mut tx, request.id, next).await?;

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::TRANSFER_LAB_PREAPPROVED,
            sn.as_deref(),
            request_note(request.id, &format!("{} -> {}", request.estado, next)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %next,
            user = %user_id,
            "Transfer pre-approved by lab"
        );

        Ok(TransferRequest { estado: next, ..request })
    }

    /// Lab turns the unit down; the miner goes back in service with its diagnosis kept
    pub async fn lab_reject(
        &self,
        user_id: Uuid,
        transfer_id: Uuid,
        input: LabRejectInput,
    ) -> AppResult<TransferRequest> {
        let motivo = lab_reject_motive(input.motivo.as_deref());

        let mut tx = self.db.begin().await?;

        let request = lock_transfer(&mut tx, transfer_id).await?;
        let next = request.estado.apply(TransferAction::LabReject, request.sector)?;
        let comentario = format!(
            "{}: {}",
            default_resolution_comment(TransferAction::LabReject),
            motivo
        );
        resolve_transfer(&mut tx, request.id, next, Some(user_id), &comentario).await?;
        set_miner_state(&mut tx, request.miner_id, MINER_STATE_ON_LAB_REJECT).await?;

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::TRANSFER_CANCELLED,
            sn.as_deref(),
            request_note(request.id, &format!("Motivo: {}", motivo)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %next,
            user = %user_id,
            "Transfer rejected by lab"
        );

        Ok(TransferRequest {
            estado: next,
            aprobador_id: Some(user_id),
            comentario_resolucion: Some(comentario),
            ..request
        })
    }

    /// Approve and execute in one step
    pub async fn approve(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        transfer_id: Uuid,
        input: ResolveTransferInput,
    ) -> AppResult<TransferRequest> {
        let mut tx = self.db.begin().await?;
        let request = self
            .approve_in(&mut tx, user_id, role, transfer_id, input.comentario.as_deref())
            .await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn approve_in(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        role: &RoleProfile,
        transfer_id: Uuid,
        comentario: Option<&str>,
    ) -> AppResult<TransferRequest> {
        let request = lock_transfer(conn, transfer_id).await?;
        if !can_user_approve(role, request.sector, request.estado) {
            return Err(approval_denied(role, &request));
        }

        let executed = request
            .estado
            .approve_and_execute(TransferAction::Approve, request.sector)?;
        let approved = request.estado.apply(TransferAction::Approve, request.sector)?;
        let comentario = comentario
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_resolution_comment(TransferAction::Approve))
            .to_string();
        resolve_transfer(conn, request.id, approved, Some(user_id), &comentario).await?;
        execute_transfer(conn, &request).await?;

        let sn = miner_sn(conn, request.miner_id).await?;
        audit::record(
            conn,
            user_id,
            actions::TRANSFER_APPROVED,
            sn.as_deref(),
            request_note(
                request.id,
                &format!("{} -> {}: {}", request.origin_label(), request.destino, comentario),
            ),
        )
        .await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %executed,
            destino = %request.destino,
            user = %user_id,
            "Transfer approved and executed"
        );

        Ok(TransferRequest {
            estado: executed,
            aprobador_id: Some(user_id),
            comentario_resolucion: Some(comentario),
            ..request
        })
    }

    /// Hydro coordinator sign-off, executed in the same transaction
    pub async fn approve_hydro(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        transfer_id: Uuid,
    ) -> AppResult<TransferRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_transfer(&mut tx, transfer_id).await?;
        if !can_approve_as_hydro_coordinator(role) {
            return Err(approval_denied(role, &request));
        }

        let executed = request
            .estado
            .approve_and_execute(TransferAction::HydroCoordinatorApprove, request.sector)?;
        let approved = request
            .estado
            .apply(TransferAction::HydroCoordinatorApprove, request.sector)?;
        let comentario = default_resolution_comment(TransferAction::HydroCoordinatorApprove);
        resolve_transfer(&mut tx, request.id, approved, Some(user_id), comentario).await?;
        execute_transfer(&mut tx, &request).await?;

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::TRANSFER_HYDRO_APPROVED,
            sn.as_deref(),
            request_note(
                request.id,
                &format!("{} -> {}", request.origin_label(), request.destino),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %executed,
            destino = %request.destino,
            user = %user_id,
            "Transfer approved by Hydro coordinator and executed"
        );

        Ok(TransferRequest {
            estado: executed,
            aprobador_id: Some(user_id),
            comentario_resolucion: Some(comentario.to_string()),
            ..request
        })
    }

    pub async fn reject(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        transfer_id: Uuid,
        input: ResolveTransferInput,
    ) -> AppResult<TransferRequest> {
        let mut tx = self.db.begin().await?;

        let request = lock_transfer(&mut tx, transfer_id).await?;
        if !can_user_approve(role, request.sector, request.estado) {
            return Err(approval_denied(role, &request));
        }

        let next = request.estado.apply(TransferAction::Reject, request.sector)?;
        let comentario = input
            .comentario
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_resolution_comment(TransferAction::Reject))
            .to_string();
        resolve_transfer(&mut tx, request.id, next, Some(user_id), &comentario).await?;

        let sn = miner_sn(&mut tx, request.miner_id).await?;
        audit::record(
            &mut tx,
            user_id,
            actions::TRANSFER_REJECTED,
            sn.as_deref(),
            request_note(request.id, &comentario),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            from = %request.estado,
            to = %next,
            user = %user_id,
            "Transfer rejected"
        );

        Ok(TransferRequest {
            estado: next,
            aprobador_id: Some(user_id),
            comentario_resolucion: Some(comentario),
            ..request
        })
    }

    /// Approve each id in its own transaction. Failures are skipped.
    pub async fn approve_bulk(
        &self,
        user_id: Uuid,
        role: &RoleProfile,
        input: BulkApproveInput,
    ) -> AppResult<BulkApproveResult> {
        let mut approved = 0;

        for id in &input.ids {
            let mut tx = self.db.begin().await?;
            match self
                .approve_in(&mut tx, user_id, role, *id, Some(BULK_APPROVAL_COMMENT))
                .await {
                Ok(_) => {
                    tx.commit().await?;
                    approved += 1;
                }
                Err(e) => {
                    tx.rollback().await?;
                    tracing::debug!(request_id = %id, error = %e, "Skipping transfer in bulk approval");
                }
            }
        }

        Ok(BulkApproveResult {
            aprobados: approved,
            solicitados: input.ids.len(),
        })
    }
}
