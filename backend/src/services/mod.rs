//! Business logic services for the ASIC lab server

pub mod audit;
pub mod auth;
pub mod conciliation;
pub mod depot;
pub mod diagnostic;
pub mod lab;
pub mod miner;
pub mod personnel;
pub mod rma;
pub mod role;
pub mod transfer;
pub mod warranty;

pub use audit::AuditService;
pub use auth::AuthService;
pub use conciliation::ConciliationService;
pub use depot::DepotService;
pub use diagnostic::DiagnosticService;
pub use lab::LabService;
pub use miner::MinerService;
pub use personnel::PersonnelService;
pub use rma::RmaService;
pub use role::RoleService;
pub use transfer::TransferService;
pub use warranty::WarrantyService;

use crate::error::{AppError, AppResult};

/// Parse a stored status string into its enum
pub(crate) fn decode<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> AppResult<T> {
    parse(raw).ok_or_else(|| AppError::Internal(format!("Unknown {} '{}' in database", what, raw)))
}
