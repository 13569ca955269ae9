//! Transfer request workflow tests
//!
//! Property-based and unit tests for:
//! - Status transitions for each action and sector
//! - Coordinator approval rights
//! - Pending badge counts
//! - End-to-end paths from lab review to execution

use proptest::prelude::*;
use shared::{
    can_approve_as_hydro_coordinator, can_user_approve, default_resolution_comment,
    is_lab_destination, lab_reject_motive, request_note, state_after_execution, MinerState,
    PendingCounts, RoleProfile, Sector, TransferAction, TransferStatus, WorkflowError,
    BULK_APPROVAL_COMMENT, LAB_REJECT_DEFAULT_MOTIVE,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn status_strategy() -> impl Strategy<Value = TransferStatus> {
    proptest::sample::select(TransferStatus::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = TransferAction> {
    proptest::sample::select(TransferAction::ALL.to_vec())
}

fn sector_strategy() -> impl Strategy<Value = Sector> {
    prop_oneof![Just(Sector::Wh), Just(Sector::Hydro)]
}

/// Seeded role names with their department
fn role_strategy() -> impl Strategy<Value = RoleProfile> {
    proptest::sample::select(shared::default_roles())
        .prop_map(|(name, dept)| RoleProfile::new(name, dept))
}

/// "LAB" in random casing with optional padding
fn lab_destination_strategy() -> impl Strategy<Value = String> {
    ("[lL][aA][bB]", " {0,2}", " {0,2}").prop_map(|(lab, pre, post)| format!("{pre}{lab}{post}"))
}

/// The sign-off a coordinator gives once the lab has approved
fn sign_off_for(sector: Sector) -> TransferAction {
    match sector {
        Sector::Wh => TransferAction::Approve,
        Sector::Hydro => TransferAction::HydroCoordinatorApprove,
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Terminal requests never move again
    #[test]
    fn test_terminal_status_rejects_every_action(
        status in status_strategy(),
        action in action_strategy(),
        sector in sector_strategy(),
    ) {
        prop_assume!(status.is_terminal());
        let result = status.apply(action, sector);
        let is_invalid_transition = matches!(result, Err(WorkflowError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);
    }

    /// Any successful transition leaves a status different from the one it started in
    #[test]
    fn test_successful_transition_changes_status(
        status in status_strategy(),
        action in action_strategy(),
        sector in sector_strategy(),
    ) {
        if let Ok(next) = status.apply(action, sector) {
            prop_assert_ne!(next, status);
        }
    }

    /// Lab approval routes by sector
    #[test]
    fn test_lab_approve_routes_by_sector(sector in sector_strategy()) {
        let next = TransferStatus::PendienteLab
            .apply(TransferAction::LabApprove, sector)
            .unwrap();
        let expected = match sector {
            Sector::Wh => TransferStatus::PendienteCoordinador,
            Sector::Hydro => TransferStatus::PendienteCoordinadorHydro,
        };
        prop_assert_eq!(next, expected);
    }

    /// Every status on the coordinator panel can be approved
    #[test]
    fn test_approve_from_coordinator_states(
        status in proptest::sample::select(TransferStatus::AWAITING_COORDINATOR.to_vec()),
        sector in sector_strategy(),
    ) {
        prop_assert_eq!(
            status.apply(TransferAction::Approve, sector).unwrap(),
            TransferStatus::Aprobado
        );
    }

    /// Only an approved request executes
    #[test]
    fn test_execute_requires_approval(
        status in status_strategy(),
        sector in sector_strategy(),
    ) {
        let result = status.apply(TransferAction::Execute, sector);
        prop_assert_eq!(result.is_ok(), status == TransferStatus::Aprobado);
    }

    /// The site manager can act on anything
    #[test]
    fn test_site_manager_always_approves(
        status in status_strategy(),
        sector in sector_strategy(),
    ) {
        let manager = RoleProfile::new("Site Manager", "Global");
        prop_assert!(can_user_approve(&manager, sector, status));
    }

    /// Technicians and supervisors never approve transfers
    #[test]
    fn test_non_coordinators_never_approve(
        role in role_strategy(),
        status in status_strategy(),
        sector in sector_strategy(),
    ) {
        prop_assume!(!role.is_coordinator() && !role.is_site_manager());
        prop_assert!(!can_user_approve(&role, sector, status));
    }

    /// The Hydro coordinator only signs off Hydro requests at their own stage
    #[test]
    fn test_hydro_coordinator_scope(
        status in status_strategy(),
        sector in sector_strategy(),
    ) {
        let hydro = RoleProfile::new("Coordinador Hydro", "Hydro");
        let allowed = can_user_approve(&hydro, sector, status);
        prop_assert_eq!(
            allowed,
            sector == Sector::Hydro && status == TransferStatus::PendienteCoordinadorHydro
        );
    }

    /// Pending totals are the sum of both sectors
    #[test]
    fn test_pending_counts_total(
        rows in prop::collection::vec((sector_strategy(), status_strategy()), 0..60),
    ) {
        let counts = PendingCounts::tally(rows.clone());
        prop_assert_eq!(counts.total, counts.wh + counts.hydro);
        prop_assert!(counts.total <= rows.len() as i64);
    }

    /// Lab approval followed by the sector's sign-off always ends executed
    #[test]
    fn test_lab_to_execution_path(sector in sector_strategy()) {
        let status = TransferStatus::PendienteLab
            .apply(TransferAction::LabApprove, sector)
            .unwrap();
        prop_assert!(status.awaits_coordinator());
        let executed = status.approve_and_execute(sign_off_for(sector), sector).unwrap();
        prop_assert_eq!(executed, TransferStatus::Ejecutado);
        prop_assert!(executed.is_terminal());
    }

    /// Approve-and-execute only succeeds from a coordinator stage
    #[test]
    fn test_approve_and_execute_source(
        status in status_strategy(),
        sector in sector_strategy(),
    ) {
        let result = status.approve_and_execute(TransferAction::Approve, sector);
        prop_assert_eq!(result.is_ok(), status.awaits_coordinator());
    }

    /// Destination "LAB" is matched regardless of case and padding
    #[test]
    fn test_lab_destination_any_case(destino in lab_destination_strategy()) {
        prop_assert!(is_lab_destination(&destino));
        prop_assert_eq!(state_after_execution(&destino), Some(MinerState::EnLaboratorio));
    }
}

// ============================================================================
// Unit Tests: Transitions
// ============================================================================

#[cfg(test)]
mod transition_tests {
    use super::*;

    #[test]
    fn test_full_wh_path() {
        let status = TransferStatus::PendienteLab;
        let status = status.apply(TransferAction::LabApprove, Sector::Wh).unwrap();
        let status = status.apply(TransferAction::Approve, Sector::Wh).unwrap();
        let status = status.apply(TransferAction::Execute, Sector::Wh).unwrap();
        assert_eq!(status, TransferStatus::Ejecutado);
    }

    #[test]
    fn test_hydro_coordinator_step() {
        let status = TransferStatus::PendienteLab
            .apply(TransferAction::LabApprove, Sector::Hydro)
            .unwrap();
        assert_eq!(status, TransferStatus::PendienteCoordinadorHydro);
        let status = status
            .apply(TransferAction::HydroCoordinatorApprove, Sector::Hydro)
            .unwrap();
        assert_eq!(status, TransferStatus::Aprobado);
    }

    #[test]
    fn test_hydro_sign_off_reaches_execution() {
        let status = TransferStatus::PendienteLab
            .apply(TransferAction::LabApprove, Sector::Hydro)
            .unwrap();
        let status = status
            .approve_and_execute(TransferAction::HydroCoordinatorApprove, Sector::Hydro)
            .unwrap();
        assert_eq!(status, TransferStatus::Ejecutado);
    }

    #[test]
    fn test_site_manager_approves_hydro_stage_to_execution() {
        let status = TransferStatus::PendienteCoordinadorHydro
            .approve_and_execute(TransferAction::Approve, Sector::Hydro)
            .unwrap();
        assert_eq!(status, TransferStatus::Ejecutado);
    }

    #[test]
    fn test_wh_path_to_lab_pulls_miner_into_lab() {
        let status = TransferStatus::PendienteLab
            .apply(TransferAction::LabApprove, Sector::Wh)
            .unwrap();
        let status = status
            .approve_and_execute(TransferAction::Approve, Sector::Wh)
            .unwrap();
        assert_eq!(status, TransferStatus::Ejecutado);
        assert_eq!(state_after_execution("LAB"), Some(MinerState::EnLaboratorio));
    }

    #[test]
    fn test_approve_and_execute_rejects_other_actions() {
        tokio_test::assert_err!(TransferStatus::PendienteCoordinador
            .approve_and_execute(TransferAction::Reject, Sector::Wh));
        tokio_test::assert_err!(TransferStatus::Aprobado
            .approve_and_execute(TransferAction::Execute, Sector::Wh));
    }

    #[test]
    fn test_lab_reject_only_from_lab_stage() {
        tokio_test::assert_ok!(
            TransferStatus::PendienteLab.apply(TransferAction::LabReject, Sector::Wh)
        );
        tokio_test::assert_err!(
            TransferStatus::PendienteCoordinador.apply(TransferAction::LabReject, Sector::Wh)
        );
    }

    #[test]
    fn test_reject_not_allowed_at_hydro_stage() {
        tokio_test::assert_err!(TransferStatus::PendienteCoordinadorHydro
            .apply(TransferAction::Reject, Sector::Hydro));
    }

    #[test]
    fn test_legacy_pending_behaves_like_coordinator_stage() {
        assert!(TransferStatus::Pendiente.awaits_coordinator());
        assert_eq!(
            TransferStatus::Pendiente
                .apply(TransferAction::Reject, Sector::Wh)
                .unwrap(),
            TransferStatus::Rechazado
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = TransferStatus::Ejecutado
            .apply(TransferAction::Approve, Sector::Wh)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot approve while transfer request is 'ejecutado'"
        );
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in TransferStatus::ALL {
            assert_eq!(TransferStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::from_str("PENDIENTE"), None);
    }
}

// ============================================================================
// Unit Tests: Approval Rights and Counters
// ============================================================================

#[cfg(test)]
mod approval_tests {
    use super::*;

    #[test]
    fn test_wh_coordinator_cannot_take_hydro_stage() {
        let wh = RoleProfile::new("Coordinador WH", "WH");
        assert!(!can_user_approve(
            &wh,
            Sector::Hydro,
            TransferStatus::PendienteCoordinadorHydro
        ));
        assert!(can_user_approve(
            &wh,
            Sector::Hydro,
            TransferStatus::PendienteCoordinador
        ));
    }

    #[test]
    fn test_hydro_sign_off_roles() {
        assert!(can_approve_as_hydro_coordinator(&RoleProfile::new(
            "Coordinador Hydro",
            "Hydro"
        )));
        assert!(can_approve_as_hydro_coordinator(&RoleProfile::new(
            "Site Manager",
            "Global"
        )));
        assert!(!can_approve_as_hydro_coordinator(&RoleProfile::new(
            "Coordinador WH",
            "WH"
        )));
    }

    #[test]
    fn test_pending_badges() {
        let counts = PendingCounts::tally([
            (Sector::Wh, TransferStatus::PendienteCoordinador),
            (Sector::Wh, TransferStatus::Pendiente),
            (Sector::Wh, TransferStatus::PendienteLab),
            (Sector::Hydro, TransferStatus::PendienteCoordinadorHydro),
            (Sector::Hydro, TransferStatus::Pendiente),
            (Sector::Hydro, TransferStatus::Aprobado),
        ]);
        assert_eq!(counts, PendingCounts::new(2, 1));
        assert_eq!(counts.total, 3);
    }

    #[test]
    fn test_pending_counts_serialize_with_sector_keys() {
        let json = serde_json::to_value(PendingCounts::new(4, 2)).unwrap();
        assert_eq!(json["WH"], 4);
        assert_eq!(json["Hydro"], 2);
        assert_eq!(json["total"], 6);
    }

    #[test]
    fn test_resolution_comments() {
        assert_eq!(default_resolution_comment(TransferAction::Approve), "Aprobado");
        assert_eq!(
            default_resolution_comment(TransferAction::LabReject),
            "Rechazado por LAB"
        );
        assert_eq!(
            default_resolution_comment(TransferAction::HydroCoordinatorApprove),
            "Aprobado por Coordinador Hydro"
        );
    }

    #[test]
    fn test_lab_reject_without_motive() {
        assert_eq!(lab_reject_motive(None), LAB_REJECT_DEFAULT_MOTIVE);
        assert_eq!(lab_reject_motive(Some("")), "Rechazado por Laboratorio");
        assert_eq!(lab_reject_motive(Some("Equipo sano")), "Equipo sano");
    }

    #[test]
    fn test_bulk_approval_comment() {
        assert_eq!(BULK_APPROVAL_COMMENT, "Aprobación masiva");
        assert_ne!(
            BULK_APPROVAL_COMMENT,
            default_resolution_comment(TransferAction::Approve)
        );
    }

    #[test]
    fn test_request_note_carries_request_id() {
        let id = Uuid::new_v4();
        assert_eq!(request_note(id, "WH3-R7-2:4 -> LAB"), format!("Solicitud {}: WH3-R7-2:4 -> LAB", id));
        assert_eq!(request_note(id, ""), format!("Solicitud {}", id));
    }

    #[test]
    fn test_non_lab_destination_leaves_state() {
        assert!(!is_lab_destination("WH3"));
        assert_eq!(state_after_execution("WH3"), None);
    }
}
