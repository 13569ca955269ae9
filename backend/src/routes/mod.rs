//! Route definitions for the ASIC lab server

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        // Protected routes - rack registry
        .nest("/miners", miner_routes())
        .nest("/rma", rma_routes())
        .nest("/diagnostics", diagnostic_routes())
        // Protected routes - workflows
        .nest("/transfers", transfer_routes())
        .nest("/conciliations", conciliation_routes())
        .nest("/depot", depot_routes())
        .nest("/lab", lab_routes())
        .nest("/warranty", warranty_routes())
        // Protected routes - staff and audit
        .nest("/personnel", personnel_routes())
        .nest("/roles", role_routes())
        .nest("/movements", movement_routes())
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

fn miner_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::save_miner))
        .route("/search", get(handlers::search_miners))
        .route("/summary", get(handlers::fleet_summary))
        .route("/state/:estado", get(handlers::miners_by_state))
        .route(
            "/position/:wh/:rack/:fila/:columna",
            get(handlers::get_miner_at).delete(handlers::empty_position),
        )
        .route("/rack/:wh/:rack", get(handlers::rack_grid))
        .route("/pending-placement/:wh", get(handlers::pending_placement))
        .route("/:miner_id", get(handlers::get_miner))
        .route("/:miner_id/insert", post(handlers::insert_miner))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn rma_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::register_rma))
        .route("/cancel", post(handlers::cancel_rma))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn diagnostic_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::diagnostic_history).post(handlers::record_diagnostic),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_transfer))
        .route("/pending", get(handlers::pending_transfers))
        .route("/counts", get(handlers::pending_counts))
        .route("/history", get(handlers::transfer_history))
        .route("/lab-pending", get(handlers::lab_pending_transfers))
        .route("/approve-bulk", post(handlers::approve_bulk))
        .route("/:transfer_id/lab-approve", post(handlers::lab_approve_transfer))
        .route("/:transfer_id/lab-reject", post(handlers::lab_reject_transfer))
        .route("/:transfer_id/approve", post(handlers::approve_transfer))
        .route("/:transfer_id/approve-hydro", post(handlers::approve_hydro_transfer))
        .route("/:transfer_id/reject", post(handlers::reject_transfer))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn conciliation_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_conciliation))
        .route("/mine", get(handlers::my_conciliations))
        .route("/lab-pending", get(handlers::lab_pending_conciliations))
        .route("/:request_id/lab-approve", post(handlers::lab_approve_conciliation))
        .route("/:request_id/lab-reject", post(handlers::lab_reject_conciliation))
        .route("/:request_id/confirm-receipt", post(handlers::confirm_receipt))
        .route("/:request_id/finish", post(handlers::finish_conciliation))
        .route("/:request_id/cede-to-lab", post(handlers::cede_to_lab))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn depot_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/pieces",
            get(handlers::list_pieces).post(handlers::create_piece),
        )
        .route(
            "/pieces/:pieza_id",
            get(handlers::get_piece).put(handlers::update_piece),
        )
        .route("/dispatch", post(handlers::dispatch_piece))
        .route("/requests", get(handlers::pending_requests))
        .route("/history", get(handlers::movement_history))
        .route("/stats", get(handlers::depot_stats))
        .route("/stock", get(handlers::stock_levels))
        .route("/stock/low", get(handlers::low_stock))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn lab_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::lab_stats))
        .route("/pending", get(handlers::lab_pending))
        .route("/in-repair", get(handlers::lab_in_repair))
        .route("/stock", get(handlers::lab_stock))
        .route("/cemetery", get(handlers::lab_cemetery))
        .route("/:miner_id/start", post(handlers::start_repair))
        .route("/:miner_id/finish", post(handlers::finish_repair))
        .route("/:miner_id/scrap", post(handlers::scrap_miner))
        .route("/:miner_id/reinstall", post(handlers::reinstall))
        .route("/:miner_id/reinstall-origin", post(handlers::reinstall_origin))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn warranty_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(handlers::import_warranties))
        .route("/:miner_id", get(handlers::warranty_status))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn personnel_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_personnel))
        .route("/by-location", get(handlers::personnel_by_location))
        .route("/summary", get(handlers::personnel_summary))
        .route("/:user_id/assignments", put(handlers::update_assignments))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn role_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_roles))
        .route("/:role_id", get(handlers::get_role))
        .route_layer(middleware::from_fn(auth_middleware))
}

fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/mine", get(handlers::my_movements))
        .route("/export", get(handlers::export_movements))
        .route_layer(middleware::from_fn(auth_middleware))
}
