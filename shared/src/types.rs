//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Warehouse id of the immersion-cooled Hydro facility
pub const HYDRO_WAREHOUSE_ID: i32 = 100;

/// Administrative grouping of physical locations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sector {
    /// Air-cooled warehouses
    #[serde(rename = "WH")]
    Wh,
    /// Immersion-cooled containers (warehouse 100)
    #[serde(rename = "Hydro")]
    Hydro,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Wh => "WH",
            Sector::Hydro => "Hydro",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "WH" => Some(Sector::Wh),
            "Hydro" => Some(Sector::Hydro),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A full rack slot: warehouse, rack, row and column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub wh: i32,
    pub rack: i32,
    pub fila: i32,
    pub columna: i32,
}

impl Position {
    pub fn new(wh: i32, rack: i32, fila: i32, columna: i32) -> Self {
        Self {
            wh,
            rack,
            fila,
            columna,
        }
    }

    /// Build a position only when every coordinate is present and non-zero
    pub fn from_parts(
        wh: Option<i32>,
        rack: Option<i32>,
        fila: Option<i32>,
        columna: Option<i32>,
    ) -> Option<Self> {
        match (wh, rack, fila, columna) {
            (Some(wh), Some(rack), Some(fila), Some(columna))
                if wh != 0 && rack != 0 && fila != 0 && columna != 0 =>
            {
                Some(Self::new(wh, rack, fila, columna))
            }
            _ => None,
        }
    }

    /// Rack grid key, e.g. "3-7"
    pub fn grid_key(&self) -> String {
        format!("{}-{}", self.fila, self.columna)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WH{}-R{}-{}:{}",
            self.wh, self.rack, self.fila, self.columna
        )
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        Self {
            page: pagination.page.max(1),
            per_page: pagination.per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}
