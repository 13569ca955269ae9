//! HTTP handlers, one module per area

pub mod auth;
pub mod conciliations;
pub mod depot;
pub mod diagnostics;
pub mod health;
pub mod lab;
pub mod miners;
pub mod movements;
pub mod personnel;
pub mod rma;
pub mod transfers;
pub mod warranty;

pub use auth::{login, refresh};
pub use conciliations::{
    cede_to_lab, confirm_receipt, create_conciliation, finish_conciliation,
    lab_approve_conciliation, lab_pending_conciliations, lab_reject_conciliation,
    my_conciliations,
};
pub use depot::{
    create_piece, depot_stats, dispatch_piece, get_piece, list_pieces, low_stock,
    movement_history, pending_requests, stock_levels, update_piece,
};
pub use diagnostics::{diagnostic_history, record_diagnostic};
pub use health::health_check;
pub use lab::{
    finish_repair, lab_cemetery, lab_in_repair, lab_pending, lab_stats, lab_stock, reinstall,
    reinstall_origin, scrap_miner, start_repair,
};
pub use miners::{
    empty_position, fleet_summary, get_miner, get_miner_at, insert_miner, miners_by_state,
    pending_placement, rack_grid, save_miner, search_miners,
};
pub use movements::{export_movements, my_movements};
pub use personnel::{
    get_role, list_personnel, list_roles, personnel_by_location, personnel_summary,
    update_assignments,
};
pub use rma::{cancel_rma, register_rma};
pub use transfers::{
    approve_bulk, approve_hydro_transfer, approve_transfer, create_transfer,
    lab_approve_transfer, lab_pending_transfers, lab_reject_transfer, pending_counts,
    pending_transfers, reject_transfer, transfer_history,
};
pub use warranty::{import_warranties, warranty_status};
