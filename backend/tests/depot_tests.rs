//! Depot and repair lab tests
//!
//! Property-based and unit tests for:
//! - Piece availability and dispatch destinations
//! - Workbench transitions and return plans
//! - Diagnosis outcomes

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{
    append_observation, append_scrap_note, diagnosis_outcome, is_available, lab_transition,
    listing_limit, normalize_piece_type, plan_return, ConciliationType, LabAction, MinerState,
    PieceLocation, PieceStatus, Position, ScrapKind, DEFAULT_MINIMUM_STOCK, PIECE_TYPES,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn miner_state_strategy() -> impl Strategy<Value = MinerState> {
    proptest::sample::select(MinerState::ALL.to_vec())
}

fn piece_status_strategy() -> impl Strategy<Value = PieceStatus> {
    proptest::sample::select(PieceStatus::ALL.to_vec())
}

fn piece_location_strategy() -> impl Strategy<Value = PieceLocation> {
    proptest::sample::select(PieceLocation::ALL.to_vec())
}

fn scrap_kind_strategy() -> impl Strategy<Value = ScrapKind> {
    prop_oneof![Just(ScrapKind::Basura), Just(ScrapKind::Donante)]
}

fn falla_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("PSU quemada".to_string()),
        Just("Hashboard 2 sin chips".to_string()),
        Just("Ventilador".to_string()),
        "[A-Za-z ]{1,30}",
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Only available stock can be dispatched
    #[test]
    fn test_availability(
        estado in piece_status_strategy(),
        ubicacion in piece_location_strategy(),
    ) {
        prop_assert_eq!(
            is_available(estado, ubicacion),
            estado == PieceStatus::Disponible && ubicacion == PieceLocation::Stock
        );
    }

    /// Piece types are trimmed and upper-cased
    #[test]
    fn test_piece_type_normalized(tipo in proptest::sample::select(PIECE_TYPES.to_vec()), pad in " {0,3}") {
        let raw = format!("{}{}{}", pad, tipo.to_lowercase(), pad);
        prop_assert_eq!(normalize_piece_type(&raw), tipo);
    }

    /// Scrapping works from any state and lands in the cemetery
    #[test]
    fn test_scrap_from_any_state(
        state in miner_state_strategy(),
        kind in scrap_kind_strategy(),
    ) {
        let next = lab_transition(state, LabAction::Scrap(kind)).unwrap();
        prop_assert!(next.is_scrapped());
        prop_assert_eq!(next, kind.target_state());
    }

    /// Starting a repair needs a unit waiting in the lab
    #[test]
    fn test_start_repair_source(state in miner_state_strategy()) {
        let result = lab_transition(state, LabAction::StartRepair);
        prop_assert_eq!(result.is_ok(), state == MinerState::EnLaboratorio);
    }

    /// Only lab stock goes back to a warehouse
    #[test]
    fn test_reinstall_source(state in miner_state_strategy()) {
        let result = lab_transition(state, LabAction::Reinstall);
        prop_assert_eq!(result.is_ok(), state == MinerState::StockLab);
    }

    /// Full coordinates return the unit to service
    #[test]
    fn test_return_with_position(
        wh in 1i32..=100,
        rack in 1i32..=40,
        fila in 1i32..=10,
        columna in 1i32..=10,
    ) {
        let plan = plan_return(wh, Some(rack), Some(fila), Some(columna));
        prop_assert_eq!(plan.state, MinerState::Operativo);
        prop_assert_eq!(plan.position, Some(Position::new(wh, rack, fila, columna)));
    }

    /// Missing coordinates park the unit awaiting placement
    #[test]
    fn test_return_without_position(wh in 1i32..=100, rack in prop::option::of(1i32..=40)) {
        let plan = plan_return(wh, rack, None, None);
        prop_assert_eq!(plan.state, MinerState::PendienteColocacion);
        prop_assert_eq!(plan.position, None);
        prop_assert_eq!(plan.warehouse_id, wh);
    }

    /// A solved diagnosis never revives a scrapped unit
    #[test]
    fn test_solved_diagnosis(state in miner_state_strategy(), falla in falla_strategy()) {
        let outcome = diagnosis_outcome(state, &falla, true);
        prop_assert_eq!(outcome.diagnostico_detalle, None);
        if state.is_scrapped() {
            prop_assert_eq!(outcome.proceso_estado, state);
        } else {
            prop_assert_eq!(outcome.proceso_estado, MinerState::Operativo);
        }
    }

    /// An open diagnosis tags the unit and keeps its state
    #[test]
    fn test_open_diagnosis(state in miner_state_strategy(), falla in falla_strategy()) {
        let outcome = diagnosis_outcome(state, &falla, false);
        prop_assert_eq!(outcome.proceso_estado, state);
        prop_assert_eq!(outcome.diagnostico_detalle, Some(format!("DIAGNOSTICADO: {}", falla)));
    }
}

// ============================================================================
// Unit Tests: Depot
// ============================================================================

#[cfg(test)]
mod depot_unit_tests {
    use super::*;

    #[test]
    fn test_dispatch_destination() {
        assert_eq!(
            PieceLocation::for_repair(ConciliationType::Wh),
            PieceLocation::Wh
        );
        assert_eq!(
            PieceLocation::for_repair(ConciliationType::Lab),
            PieceLocation::Lab
        );
    }

    #[test]
    fn test_location_strings() {
        assert_eq!(PieceLocation::ADeterminar.as_str(), "A_DETERMINAR");
        assert_eq!(
            PieceLocation::from_str("REPARACION"),
            Some(PieceLocation::Reparacion)
        );
        assert_eq!(PieceLocation::from_str("stock"), None);
        assert_eq!(
            serde_json::to_string(&PieceStatus::EnUso).unwrap(),
            "\"EN_USO\""
        );
    }

    #[test]
    fn test_listing_limits() {
        assert_eq!(listing_limit(true), 500);
        assert_eq!(listing_limit(false), 200);
    }

    #[test]
    fn test_default_minimum_stock() {
        assert_eq!(DEFAULT_MINIMUM_STOCK, 5);
    }
}

// ============================================================================
// Unit Tests: Workbench
// ============================================================================

#[cfg(test)]
mod workbench_tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_repair_cycle() {
        let state = tokio_test::assert_ok!(lab_transition(
            MinerState::EnLaboratorio,
            LabAction::StartRepair
        ));
        assert_eq!(state, MinerState::EnReparacion);
        let state = tokio_test::assert_ok!(lab_transition(state, LabAction::FinishRepair));
        assert_eq!(state, MinerState::StockLab);
    }

    #[test]
    fn test_finish_requires_repair_in_progress() {
        tokio_test::assert_err!(lab_transition(
            MinerState::EnLaboratorio,
            LabAction::FinishRepair
        ));
    }

    #[test]
    fn test_scrap_kind_parse() {
        assert_eq!(ScrapKind::parse("BASURA"), ScrapKind::Basura);
        assert_eq!(ScrapKind::parse("donante"), ScrapKind::Donante);
        assert_eq!(ScrapKind::parse("otro"), ScrapKind::Donante);
        assert_eq!(ScrapKind::Basura.audit_action(), "BAJA (DESECHO)");
    }

    #[test]
    fn test_observation_log() {
        assert_eq!(
            append_observation(None, day(), "Cambio de PSU"),
            "[2024-03-09] Cambio de PSU"
        );
        assert_eq!(
            append_observation(Some("previo"), day(), "Cambio de PSU"),
            "previo\n[2024-03-09] Cambio de PSU"
        );
        assert_eq!(
            append_scrap_note(Some(""), day(), "Placa quemada"),
            "[BAJA 2024-03-09] Placa quemada"
        );
    }

    #[test]
    fn test_zero_coordinate_parks_unit() {
        let plan = plan_return(3, Some(2), Some(0), Some(4));
        assert_eq!(plan.state, MinerState::PendienteColocacion);
    }
}
