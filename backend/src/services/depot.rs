//! Spare-parts depot: serialized pieces, dispatch to conciliations, stock levels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    dispatched_product_model, listing_limit, normalize_piece_type, require_text, DepotPiece,
    DepotStats, MovementKind, PartRequestAction, PartRequestStatus, PieceLocation, PieceMovement,
    PieceStatus, StockLevel, TypeCount,
};

use super::audit::{self, actions};
use super::conciliation::{
    lock_part_request, PartRequestView, PartRequestViewRow, PART_REQUEST_VIEW_SELECT,
};
use super::decode;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct DepotService {
    db: PgPool,
}

const PIECE_COLUMNS: &str = r#"
    id, sn, tipo, modelo_equipo, modelo_pieza, ubicacion, caja_numero, pallet_numero,
    estante, es_reparado, estado, notas, fecha_ingreso, fecha_salida, solicitud_id,
    registrado_por, modificado_por
"#;

#[derive(Debug, FromRow)]
struct PieceRow {
    id: Uuid,
    sn: String,
    tipo: String,
    modelo_equipo: String,
    modelo_pieza: Option<String>,
    ubicacion: String,
    caja_numero: Option<String>,
    pallet_numero: Option<String>,
    estante: Option<String>,
    es_reparado: bool,
    estado: String,
    notas: Option<String>,
    fecha_ingreso: DateTime<Utc>,
    fecha_salida: Option<DateTime<Utc>>,
    solicitud_id: Option<Uuid>,
    registrado_por: Option<Uuid>,
    modificado_por: Option<Uuid>,
}

impl TryFrom<PieceRow> for DepotPiece {
    type Error = AppError;

    fn try_from(row: PieceRow) -> AppResult<Self> {
        Ok(DepotPiece {
            id: row.id,
            sn: row.sn,
            tipo: row.tipo,
            modelo_equipo: row.modelo_equipo,
            modelo_pieza: row.modelo_pieza,
            ubicacion: decode(&row.ubicacion, PieceLocation::from_str, "piece location")?,
            caja_numero: row.caja_numero,
            pallet_numero: row.pallet_numero,
            estante: row.estante,
            es_reparado: row.es_reparado,
            estado: decode(&row.estado, PieceStatus::from_str, "piece status")?,
            notas: row.notas,
            fecha_ingreso: row.fecha_ingreso,
            fecha_salida: row.fecha_salida,
            solicitud_id: row.solicitud_id,
            registrado_por: row.registrado_por,
            modificado_por: row.modificado_por,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    pieza_id: Uuid,
    tipo_movimiento: String,
    ubicacion_origen: Option<String>,
    ubicacion_destino: Option<String>,
    destino_wh: Option<i32>,
    solicitud_id: Option<Uuid>,
    usuario_id: Option<Uuid>,
    notas: Option<String>,
    fecha: DateTime<Utc>,
}

impl TryFrom<MovementRow> for PieceMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(PieceMovement {
            id: row.id,
            pieza_id: row.pieza_id,
            tipo_movimiento: decode(&row.tipo_movimiento, MovementKind::from_str, "movement kind")?,
            ubicacion_origen: row.ubicacion_origen,
            ubicacion_destino: row.ubicacion_destino,
            destino_wh: row.destino_wh,
            solicitud_id: row.solicitud_id,
            usuario_id: row.usuario_id,
            notas: row.notas,
            fecha: row.fecha,
        })
    }
}

/// Movement with the piece SN for the history table
#[derive(Debug, Serialize)]
pub struct MovementEntry {
    #[serde(flatten)]
    pub movement: PieceMovement,
    pub sn: String,
    pub tipo: String,
    pub usuario: Option<String>,
}

#[derive(Debug, FromRow)]
struct MovementEntryRow {
    #[sqlx(flatten)]
    movement: MovementRow,
    sn: String,
    tipo: String,
    usuario: Option<String>,
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    modelo_equipo: String,
    tipo_pieza: String,
    cantidad: i32,
    stock_minimo: i32,
    ubicacion_deposito: Option<String>,
    ultima_actualizacion: DateTime<Utc>,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        StockLevel {
            id: row.id,
            modelo_equipo: row.modelo_equipo,
            tipo_pieza: row.tipo_pieza,
            cantidad: row.cantidad,
            stock_minimo: row.stock_minimo,
            ubicacion_deposito: row.ubicacion_deposito,
            ultima_actualizacion: row.ultima_actualizacion,
        }
    }
}

/// Input for registering a piece
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePieceInput {
    #[validate(length(max = 100))]
    pub sn: Option<String>,
    #[validate(length(max = 30))]
    pub tipo: Option<String>,
    #[validate(length(max = 50))]
    pub modelo_equipo: Option<String>,
    pub modelo_pieza: Option<String>,
    pub caja_numero: Option<String>,
    pub pallet_numero: Option<String>,
    pub estante: Option<String>,
    #[serde(default)]
    pub es_reparado: bool,
    pub notas: Option<String>,
}

/// Fields a depot operator may change on a piece
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePieceInput {
    pub ubicacion: Option<PieceLocation>,
    pub estado: Option<PieceStatus>,
    pub caja_numero: Option<String>,
    pub notas: Option<String>,
}

/// Listing filters
#[derive(Debug, Default, Deserialize)]
pub struct PieceFilter {
    pub sn: Option<String>,
    pub tipo: Option<String>,
    pub modelo: Option<String>,
    pub ubicacion: Option<PieceLocation>,
    pub estado: Option<PieceStatus>,
}

/// Input for dispatching a piece against a part request
#[derive(Debug, Deserialize)]
pub struct DispatchInput {
    pub solicitud_id: Uuid,
    pub pieza_id: Uuid,
    pub notas: Option<String>,
}

#[allow(clippy::too_many_arguments)]
async fn log_movement(
    conn: &mut PgConnection,
    pieza_id: Uuid,
    kind: MovementKind,
    origen: Option<PieceLocation>,
    destino: Option<PieceLocation>,
    destino_wh: Option<i32>,
    solicitud_id: Option<Uuid>,
    usuario_id: Uuid,
    notas: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO depot_piece_movements (
            pieza_id, tipo_movimiento, ubicacion_origen, ubicacion_destino,
            destino_wh, solicitud_id, usuario_id, notas
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(pieza_id)
    .bind(kind.as_str())
    .bind(origen.map(|l| l.as_str()))
    .bind(destino.map(|l| l.as_str()))
    .bind(destino_wh)
    .bind(solicitud_id)
    .bind(usuario_id)
    .bind(notas)
    .execute(conn)
    .await?;
    Ok(())
}

async fn lock_piece(conn: &mut PgConnection, pieza_id: Uuid) -> AppResult<DepotPiece> {
    let row = sqlx::query_as::<_, PieceRow>(&format!(
        "SELECT {} FROM depot_pieces WHERE id = $1 FOR UPDATE",
        PIECE_COLUMNS
    ))
    .bind(pieza_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Depot piece".to_string()))?;

    row.try_into()
}

impl DepotService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a piece into stock
    pub async fn create_piece(&self, user_id: Uuid, input: CreatePieceInput) -> AppResult<DepotPiece> {
        input.validate()?;
        let sn = require_text("sn", input.sn.as_deref())?;
        let tipo = normalize_piece_type(&require_text("tipo", input.tipo.as_deref())?);
        let modelo_equipo = require_text("modelo_equipo", input.modelo_equipo.as_deref())?;

        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM depot_pieces WHERE sn = $1)",
        )
        .bind(&sn)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(AppError::DuplicateEntry(format!("sn {}", sn)));
        }

        let row = sqlx::query_as::<_, PieceRow>(&format!(
            r#"
            INSERT INTO depot_pieces (
                sn, tipo, modelo_equipo, modelo_pieza, ubicacion, caja_numero, pallet_numero,
                estante, es_reparado, estado, notas, registrado_por
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            PIECE_COLUMNS
        ))
        .bind(&sn)
        .bind(&tipo)
        .bind(&modelo_equipo)
        .bind(&input.modelo_pieza)
        .bind(PieceLocation::Stock.as_str())
        .bind(&input.caja_numero)
        .bind(&input.pallet_numero)
        .bind(&input.estante)
        .bind(input.es_reparado)
        .bind(PieceStatus::Disponible.as_str())
        .bind(&input.notas)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        log_movement(
            &mut tx,
            row.id,
            MovementKind::Ingreso,
            None,
            Some(PieceLocation::Stock),
            None,
            None,
            user_id,
            Some("Ingreso a depósito"),
        )
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::PIECE_REGISTERED,
            Some(&sn),
            format!("{} {} ({})", tipo, modelo_equipo, input.modelo_pieza.as_deref().unwrap_or("-")),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(sn = %sn, tipo = %tipo, modelo = %modelo_equipo, user = %user_id, "Depot piece registered");

        row.try_into()
    }

    pub async fn get_piece(&self, pieza_id: Uuid) -> AppResult<DepotPiece> {
        let row = sqlx::query_as::<_, PieceRow>(&format!(
            "SELECT {} FROM depot_pieces WHERE id = $1",
            PIECE_COLUMNS
        ))
        .bind(pieza_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Depot piece".to_string()))?;

        row.try_into()
    }

    /// Update a piece; a location change is logged as a transfer
    pub async fn update_piece(
        &self,
        user_id: Uuid,
        pieza_id: Uuid,
        input: UpdatePieceInput,
    ) -> AppResult<DepotPiece> {
        let mut tx = self.db.begin().await?;

        let piece = lock_piece(&mut tx, pieza_id).await?;

        let row = sqlx::query_as::<_, PieceRow>(&format!(
            r#"
            UPDATE depot_pieces SET
                ubicacion = COALESCE($2, ubicacion),
                estado = COALESCE($3, estado),
                caja_numero = COALESCE($4, caja_numero),
                notas = COALESCE($5, notas),
                modificado_por = $6
            WHERE id = $1
            RETURNING {}
            "#,
            PIECE_COLUMNS
        ))
        .bind(piece.id)
        .bind(input.ubicacion.map(|l| l.as_str()))
        .bind(input.estado.map(|s| s.as_str()))
        .bind(&input.caja_numero)
        .bind(&input.notas)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(destino) = input.ubicacion.filter(|l| *l != piece.ubicacion) {
            log_movement(
                &mut tx,
                piece.id,
                MovementKind::Transferencia,
                Some(piece.ubicacion),
                Some(destino),
                None,
                None,
                user_id,
                input.notas.as_deref(),
            )
            .await?;
            tracing::info!(
                sn = %piece.sn,
                from = piece.ubicacion.as_str(),
                to = destino.as_str(),
                "Depot piece moved"
            );
        }

        tx.commit().await?;

        row.try_into()
    }

    pub async fn list_pieces(&self, filter: PieceFilter) -> AppResult<Vec<DepotPiece>> {
        let sn_pattern = filter
            .sn
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let limit = listing_limit(sn_pattern.is_some());

        let rows = sqlx::query_as::<_, PieceRow>(&format!(
            r#"
            SELECT {} FROM depot_pieces
            WHERE ($1::TEXT IS NULL OR sn ILIKE $1)
              AND ($2::TEXT IS NULL OR tipo = $2)
              AND ($3::TEXT IS NULL OR modelo_equipo = $3)
              AND ($4::TEXT IS NULL OR ubicacion = $4)
              AND ($5::TEXT IS NULL OR estado = $5)
            ORDER BY fecha_ingreso DESC
            LIMIT $6
            "#,
            PIECE_COLUMNS
        ))
        .bind(sn_pattern)
        .bind(filter.tipo.as_deref().map(normalize_piece_type))
        .bind(filter.modelo)
        .bind(filter.ubicacion.map(|l| l.as_str()))
        .bind(filter.estado.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(DepotPiece::try_from).collect()
    }

    /// Send a stocked piece to the conciliation that asked for it
    pub async fn dispatch(&self, user_id: Uuid, input: DispatchInput) -> AppResult<DepotPiece> {
        let mut tx = self.db.begin().await?;

        let request = lock_part_request(&mut tx, input.solicitud_id).await?;
        let next = request.estado.apply(PartRequestAction::Dispatch)?;

        let piece = lock_piece(&mut tx, input.pieza_id).await?;
        if piece.estado != PieceStatus::Disponible {
            return Err(AppError::Conflict {
                resource: "depot_piece".to_string(),
                message: format!("Piece {} is not available ({})", piece.sn, piece.estado.as_str()),
                message_es: format!("La pieza {} no está disponible ({})", piece.sn, piece.estado.as_str()),
            });
        }

        let destino = PieceLocation::for_repair(request.ubicacion_reparacion);
        let row = sqlx::query_as::<_, PieceRow>(&format!(
            r#"
            UPDATE depot_pieces SET
                ubicacion = $2,
                estado = $3,
                solicitud_id = $4,
                fecha_salida = NOW(),
                modificado_por = $5
            WHERE id = $1
            RETURNING {}
            "#,
            PIECE_COLUMNS
        ))
        .bind(piece.id)
        .bind(destino.as_str())
        .bind(PieceStatus::EnUso.as_str())
        .bind(request.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let producto_modelo =
            dispatched_product_model(&piece.modelo_equipo, piece.modelo_pieza.as_deref(), &piece.tipo);
        sqlx::query(
            r#"
            UPDATE part_requests SET
                estado = $2,
                producto_sn = $3,
                producto_modelo = $4,
                despachador_id = $5,
                fecha_despacho = NOW(),
                notas_deposito = $6
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(next.as_str())
        .bind(&piece.sn)
        .bind(&producto_modelo)
        .bind(user_id)
        .bind(&input.notas)
        .execute(&mut *tx)
        .await?;

        let destino_wh = match request.wh_origen {
            Some(wh) => Some(wh),
            None => {
                sqlx::query_scalar::<_, Option<i32>>("SELECT warehouse_id FROM miners WHERE id = $1")
                    .bind(request.miner_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .flatten()
            }
        };

        log_movement(
            &mut tx,
            piece.id,
            MovementKind::Salida,
            Some(piece.ubicacion),
            Some(destino),
            destino_wh,
            Some(request.id),
            user_id,
            input.notas.as_deref(),
        )
        .await?;

        audit::record(
            &mut tx,
            user_id,
            actions::PIECE_DISPATCHED,
            Some(&piece.sn),
            format!(
                "{} -> {} (solicitud {})",
                producto_modelo,
                destino.as_str(),
                request.id
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            sn = %piece.sn,
            from = %request.estado,
            to = %next,
            destino = destino.as_str(),
            user = %user_id,
            "Depot piece dispatched"
        );

        row.try_into()
    }

    /// Part requests cleared by the lab and waiting for a piece, oldest first
    pub async fn pending_requests(&self) -> AppResult<Vec<PartRequestView>> {
        let rows = sqlx::query_as::<_, PartRequestViewRow>(&format!(
            "{} WHERE p.estado = $1 ORDER BY p.fecha_solicitud ASC",
            PART_REQUEST_VIEW_SELECT
        ))
        .bind(PartRequestStatus::PendienteDeposito.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PartRequestView::try_from).collect()
    }

    pub async fn history(&self, limit: Option<i64>) -> AppResult<Vec<MovementEntry>> {
        let rows = sqlx::query_as::<_, MovementEntryRow>(
            r#"
            SELECT mv.id, mv.pieza_id, mv.tipo_movimiento, mv.ubicacion_origen,
                   mv.ubicacion_destino, mv.destino_wh, mv.solicitud_id, mv.usuario_id,
                   mv.notas, mv.fecha, p.sn, p.tipo, u.username AS usuario
            FROM depot_piece_movements mv
            JOIN depot_pieces p ON p.id = mv.pieza_id
            LEFT JOIN users u ON u.id = mv.usuario_id
            ORDER BY mv.fecha DESC
            LIMIT $1
            "#,
        )
        .bind(limit.unwrap_or(50).clamp(1, 500))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MovementEntry {
                    movement: row.movement.try_into()?,
                    sn: row.sn,
                    tipo: row.tipo,
                    usuario: row.usuario,
                })
            })
            .collect()
    }

    pub async fn stats(&self) -> AppResult<DepotStats> {
        let (total, disponibles, en_lab, reparados, cajas) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE estado = 'DISPONIBLE' AND ubicacion = 'STOCK'),
                    COUNT(*) FILTER (WHERE ubicacion = 'LAB'),
                    COUNT(*) FILTER (WHERE es_reparado),
                    COUNT(DISTINCT caja_numero)
                FROM depot_pieces
                "#,
            )
            .fetch_one(&self.db)
            .await?;

        let solicitudes_pendientes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM part_requests WHERE estado = $1",
        )
        .bind(PartRequestStatus::PendienteDeposito.as_str())
        .fetch_one(&self.db)
        .await?;

        let por_tipo = sqlx::query_as::<_, (String, i64)>(
            "SELECT tipo, COUNT(*) FROM depot_pieces GROUP BY tipo ORDER BY tipo",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(tipo, cantidad)| TypeCount { tipo, cantidad })
        .collect();

        Ok(DepotStats {
            total,
            disponibles,
            en_lab,
            reparados,
            solicitudes_pendientes,
            cajas,
            por_tipo,
        })
    }

    pub async fn stock(&self) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, modelo_equipo, tipo_pieza, cantidad, stock_minimo,
                   ubicacion_deposito, ultima_actualizacion
            FROM part_stock
            ORDER BY modelo_equipo, tipo_pieza
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockLevel::from).collect())
    }

    pub async fn low_stock(&self) -> AppResult<Vec<StockLevel>> {
        Ok(self
            .stock()
            .await?
            .into_iter()
            .filter(StockLevel::is_low)
            .collect())
    }
}
