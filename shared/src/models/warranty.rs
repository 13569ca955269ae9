//! Warranty windows and import helpers

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::miner::MinerState;

pub const DEFAULT_WARNING_DAYS: i64 = 30;

/// Warranty state of a miner relative to a reference day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarrantyStatus {
    SinDato,
    Vencida,
    PorVencer,
    Activa,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::SinDato => "sin_dato",
            WarrantyStatus::Vencida => "vencida",
            WarrantyStatus::PorVencer => "por_vencer",
            WarrantyStatus::Activa => "activa",
        }
    }

    /// Classify an expiry date. The warning window includes its last day.
    pub fn classify(expiry: Option<NaiveDate>, today: NaiveDate, warning_days: i64) -> Self {
        let Some(expiry) = expiry else {
            return WarrantyStatus::SinDato;
        };
        if expiry < today {
            WarrantyStatus::Vencida
        } else if expiry <= today + Duration::days(warning_days) {
            WarrantyStatus::PorVencer
        } else {
            WarrantyStatus::Activa
        }
    }
}

impl std::fmt::Display for WarrantyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location shown on the warranty list
pub fn warranty_location_label(warehouse_id: Option<i32>, state: MinerState) -> String {
    match warehouse_id {
        Some(wh) => format!("WH {}", wh),
        None if state.is_in_lab() => "LABORATORIO".to_string(),
        None => "Desconocida".to_string(),
    }
}

/// Indices of the SN and expiry columns in an import header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportColumns {
    pub sn: usize,
    pub expiry: usize,
}

/// Find the SN and expiry columns. The first matching header wins.
pub fn detect_import_columns<'a, I>(headers: I) -> Option<ImportColumns>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized: Vec<String> = headers
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let sn = normalized
        .iter()
        .position(|h| h.contains("sn") || h.contains("serial"))?;
    let expiry = normalized
        .iter()
        .position(|h| h.contains("garant") || h.contains("warranty"))?;
    Some(ImportColumns { sn, expiry })
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse an expiry date in any accepted format. A trailing time part is ignored.
pub fn parse_expiry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    let date_part = date_part.split('T').next().unwrap_or(date_part);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Outcome status of an import run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Ok,
    Warning,
}

/// Result returned by the warranty import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub status: ImportStatus,
    pub updated: u64,
    pub errors: Vec<String>,
}

pub const MAX_REPORTED_ERRORS: usize = 10;

impl ImportSummary {
    pub fn new(updated: u64, mut errors: Vec<String>) -> Self {
        let status = if updated == 0 {
            errors.insert(
                0,
                "Se leyó el archivo pero ningún SN coincidió con la base de datos.".to_string(),
            );
            ImportStatus::Warning
        } else {
            ImportStatus::Ok
        };
        errors.truncate(MAX_REPORTED_ERRORS);
        Self {
            status,
            updated,
            errors,
        }
    }
}
