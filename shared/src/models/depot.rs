//! Spare-parts depot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::part_request::ConciliationType;

/// A serialized spare part held by the depot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotPiece {
    pub id: Uuid,
    pub sn: String,
    pub tipo: String,
    pub modelo_equipo: String,
    pub modelo_pieza: Option<String>,
    pub ubicacion: PieceLocation,
    pub caja_numero: Option<String>,
    pub pallet_numero: Option<String>,
    pub estante: Option<String>,
    pub es_reparado: bool,
    pub estado: PieceStatus,
    pub notas: Option<String>,
    pub fecha_ingreso: DateTime<Utc>,
    pub fecha_salida: Option<DateTime<Utc>>,
    pub solicitud_id: Option<Uuid>,
    pub registrado_por: Option<Uuid>,
    pub modificado_por: Option<Uuid>,
}

impl DepotPiece {
    pub fn is_available(&self) -> bool {
        is_available(self.estado, self.ubicacion)
    }
}

/// Piece types handled by the depot
pub const PIECE_TYPES: [&str; 7] = [
    "PSU",
    "FAN",
    "CB",
    "CALENTADOR",
    "DISTRIBUIDOR",
    "PDU",
    "HASHBOARD",
];

/// Equipment models the depot stocks parts for
pub const EQUIPMENT_MODELS: [&str; 4] = ["S21+", "S21hyd", "Avalon", "Buzzminer"];

/// Where a piece currently sits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceLocation {
    Stock,
    Lab,
    Wh,
    Reparacion,
    Baja,
    ADeterminar,
}

impl PieceLocation {
    pub const ALL: [PieceLocation; 6] = [
        PieceLocation::Stock,
        PieceLocation::Lab,
        PieceLocation::Wh,
        PieceLocation::Reparacion,
        PieceLocation::Baja,
        PieceLocation::ADeterminar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PieceLocation::Stock => "STOCK",
            PieceLocation::Lab => "LAB",
            PieceLocation::Wh => "WH",
            PieceLocation::Reparacion => "REPARACION",
            PieceLocation::Baja => "BAJA",
            PieceLocation::ADeterminar => "A_DETERMINAR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|loc| loc.as_str() == s)
    }

    /// Destination of a dispatched piece
    pub fn for_repair(ubicacion_reparacion: ConciliationType) -> Self {
        match ubicacion_reparacion {
            ConciliationType::Wh => PieceLocation::Wh,
            ConciliationType::Lab => PieceLocation::Lab,
        }
    }
}

/// Condition of a piece
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceStatus {
    Disponible,
    EnUso,
    Reservado,
    Defectuoso,
}

impl PieceStatus {
    pub const ALL: [PieceStatus; 4] = [
        PieceStatus::Disponible,
        PieceStatus::EnUso,
        PieceStatus::Reservado,
        PieceStatus::Defectuoso,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PieceStatus::Disponible => "DISPONIBLE",
            PieceStatus::EnUso => "EN_USO",
            PieceStatus::Reservado => "RESERVADO",
            PieceStatus::Defectuoso => "DEFECTUOSO",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// Kind of a depot movement record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Ingreso,
    Salida,
    Transferencia,
    Reparacion,
    Baja,
}

impl MovementKind {
    pub const ALL: [MovementKind; 5] = [
        MovementKind::Ingreso,
        MovementKind::Salida,
        MovementKind::Transferencia,
        MovementKind::Reparacion,
        MovementKind::Baja,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Ingreso => "INGRESO",
            MovementKind::Salida => "SALIDA",
            MovementKind::Transferencia => "TRANSFERENCIA",
            MovementKind::Reparacion => "REPARACION",
            MovementKind::Baja => "BAJA",
        }
    }
}

/// A logged depot movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceMovement {
    pub id: Uuid,
    pub pieza_id: Uuid,
    pub tipo_movimiento: MovementKind,
    pub ubicacion_origen: Option<String>,
    pub ubicacion_destino: Option<String>,
    pub destino_wh: Option<i32>,
    pub solicitud_id: Option<Uuid>,
    pub usuario_id: Option<Uuid>,
    pub notas: Option<String>,
    pub fecha: DateTime<Utc>,
}

/// Aggregate stock per (equipment model, piece type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: Uuid,
    pub modelo_equipo: String,
    pub tipo_pieza: String,
    pub cantidad: i32,
    pub stock_minimo: i32,
    pub ubicacion_deposito: Option<String>,
    pub ultima_actualizacion: DateTime<Utc>,
}

pub const DEFAULT_MINIMUM_STOCK: i32 = 5;

impl StockLevel {
    pub fn is_low(&self) -> bool {
        self.cantidad < self.stock_minimo
    }
}

/// Depot dashboard counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepotStats {
    pub total: i64,
    pub disponibles: i64,
    pub en_lab: i64,
    pub reparados: i64,
    pub solicitudes_pendientes: i64,
    pub cajas: i64,
    pub por_tipo: Vec<TypeCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCount {
    pub tipo: String,
    pub cantidad: i64,
}

/// A piece is dispatchable only from stock
pub fn is_available(estado: PieceStatus, ubicacion: PieceLocation) -> bool {
    estado == PieceStatus::Disponible && ubicacion == PieceLocation::Stock
}

/// Piece types are stored upper-cased
pub fn normalize_piece_type(tipo: &str) -> String {
    tipo.trim().to_uppercase()
}

/// Row cap for piece listings
pub fn listing_limit(searching_by_sn: bool) -> i64 {
    if searching_by_sn {
        500
    } else {
        200
    }
}
