//! Part request (conciliation) workflow tests
//!
//! Property-based and unit tests for:
//! - Part request status transitions
//! - Conciliation planning per miner location
//! - Linked transfer cascades on lab approval and rejection

use proptest::prelude::*;
use shared::{
    cede_requires_transfer, dispatched_product_model, failed_in_situ_motive,
    lab_conciliation_motive, linked_transfer_on_approve, linked_transfer_on_reject,
    plan_conciliation, ConciliationType, MinerState, PartRequestAction, PartRequestStatus,
    Sector, TransferStatus, WorkflowError, HYDRO_WAREHOUSE_ID,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn part_status_strategy() -> impl Strategy<Value = PartRequestStatus> {
    proptest::sample::select(PartRequestStatus::ALL.to_vec())
}

fn part_action_strategy() -> impl Strategy<Value = PartRequestAction> {
    proptest::sample::select(PartRequestAction::ALL.to_vec())
}

fn transfer_status_strategy() -> impl Strategy<Value = TransferStatus> {
    proptest::sample::select(TransferStatus::ALL.to_vec())
}

fn sector_strategy() -> impl Strategy<Value = Sector> {
    prop_oneof![Just(Sector::Wh), Just(Sector::Hydro)]
}

/// Air-cooled model names
fn air_model_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("S19j Pro".to_string()),
        Just("S21+".to_string()),
        Just("Avalon 1366".to_string()),
        Just("M30S".to_string()),
    ]
}

/// Regular (non-Hydro) warehouse numbers
fn regular_warehouse_strategy() -> impl Strategy<Value = i32> {
    (1i32..=99).prop_filter("not hydro", |wh| *wh != HYDRO_WAREHOUSE_ID)
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Closed requests accept no further action
    #[test]
    fn test_closed_requests_are_final(
        status in part_status_strategy(),
        action in part_action_strategy(),
    ) {
        prop_assume!(status.is_closed());
        prop_assert!(status.apply(action).is_err());
    }

    /// A request can only be finished or ceded once the part left the depot
    #[test]
    fn test_finish_and_cede_need_dispatched_part(status in part_status_strategy()) {
        let dispatched = matches!(status, PartRequestStatus::EnCamino | PartRequestStatus::Recibido);
        prop_assert_eq!(status.apply(PartRequestAction::FinishSuccess).is_ok(), dispatched);
        prop_assert_eq!(status.apply(PartRequestAction::CedeToLab).is_ok(), dispatched);
    }

    /// In-situ conciliation parks an air-cooled unit in "Conciliando"
    #[test]
    fn test_in_situ_plan_for_air_units(
        modelo in air_model_strategy(),
        wh in regular_warehouse_strategy(),
    ) {
        let plan = plan_conciliation(ConciliationType::Wh, Some(&modelo), Some(wh)).unwrap();
        prop_assert_eq!(plan.miner_state, Some(MinerState::Conciliando));
        prop_assert_eq!(plan.transfer_sector, None);
    }

    /// Lab conciliation raises a transfer and keeps the miner state
    #[test]
    fn test_lab_plan_raises_transfer(
        modelo in air_model_strategy(),
        wh in regular_warehouse_strategy(),
    ) {
        let plan = plan_conciliation(ConciliationType::Lab, Some(&modelo), Some(wh)).unwrap();
        prop_assert_eq!(plan.miner_state, None);
        prop_assert_eq!(plan.transfer_sector, Some(Sector::Wh));
    }

    /// In-situ requests never touch a linked transfer on approval
    #[test]
    fn test_wh_approval_leaves_transfer(
        status in transfer_status_strategy(),
        sector in sector_strategy(),
    ) {
        prop_assert_eq!(linked_transfer_on_approve(ConciliationType::Wh, status, sector), None);
    }

    /// Lab approval advances the transfer only from the lab stage
    #[test]
    fn test_lab_approval_advances_only_pending_lab(
        status in transfer_status_strategy(),
        sector in sector_strategy(),
    ) {
        let next = linked_transfer_on_approve(ConciliationType::Lab, status, sector);
        prop_assert_eq!(next.is_some(), status == TransferStatus::PendienteLab);
    }

    /// Rejection closes any open linked transfer as lab-rejected
    #[test]
    fn test_rejection_cascade(status in transfer_status_strategy()) {
        let next = linked_transfer_on_reject(status);
        if status == TransferStatus::PendienteLab || status.awaits_coordinator() {
            prop_assert_eq!(next, Some(TransferStatus::RechazadoLab));
        } else {
            prop_assert_eq!(next, None);
        }
    }

    /// The lab motive always names the piece
    #[test]
    fn test_lab_motive_mentions_piece(
        pieza in "[A-Z]{3,12}",
        comentario in "[a-z ]{0,30}",
    ) {
        let motive = lab_conciliation_motive(&pieza, &comentario);
        prop_assert!(motive.starts_with("CONCILIACIÓN LAB"));
        prop_assert!(motive.contains(&pieza));
    }
}

// ============================================================================
// Unit Tests: Part Request Lifecycle
// ============================================================================

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let status = PartRequestStatus::PendienteAprobacionLab;
        let status = status.apply(PartRequestAction::LabApprove).unwrap();
        assert_eq!(status, PartRequestStatus::PendienteDeposito);
        let status = status.apply(PartRequestAction::Dispatch).unwrap();
        assert_eq!(status, PartRequestStatus::EnCamino);
        let status = status.apply(PartRequestAction::ConfirmReceipt).unwrap();
        assert_eq!(status, PartRequestStatus::Recibido);
        let status = status.apply(PartRequestAction::FinishSuccess).unwrap();
        assert_eq!(status, PartRequestStatus::Finalizado);
        assert!(status.is_closed());
    }

    #[test]
    fn test_finish_straight_from_transit() {
        assert_eq!(
            PartRequestStatus::EnCamino
                .apply(PartRequestAction::FinishSuccess)
                .unwrap(),
            PartRequestStatus::Finalizado
        );
    }

    #[test]
    fn test_dispatch_requires_lab_approval() {
        tokio_test::assert_err!(
            PartRequestStatus::PendienteAprobacionLab.apply(PartRequestAction::Dispatch)
        );
        tokio_test::assert_ok!(
            PartRequestStatus::PendienteDeposito.apply(PartRequestAction::Dispatch)
        );
    }

    #[test]
    fn test_receipt_only_once() {
        tokio_test::assert_err!(
            PartRequestStatus::Recibido.apply(PartRequestAction::ConfirmReceipt)
        );
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(
            PartRequestStatus::PendienteAprobacionLab.as_str(),
            "pendiente_aprobacion_lab"
        );
        assert_eq!(
            PartRequestStatus::from_str("cedido_lab"),
            Some(PartRequestStatus::CedidoLab)
        );
        assert_eq!(PartRequestStatus::from_str("unknown"), None);
    }
}

// ============================================================================
// Unit Tests: Planning and Cascades
// ============================================================================

#[cfg(test)]
mod planning_tests {
    use super::*;

    #[test]
    fn test_unplaced_miner_cannot_conciliate() {
        let err = plan_conciliation(ConciliationType::Lab, Some("S21+"), None).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { field: "miner_id", .. }));
    }

    #[test]
    fn test_hydro_model_rejects_in_situ() {
        let err = plan_conciliation(ConciliationType::Wh, Some("S21 Hyd"), Some(3)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { field: "tipo", .. }));
    }

    #[test]
    fn test_hydro_warehouse_rejects_in_situ() {
        tokio_test::assert_err!(plan_conciliation(
            ConciliationType::Wh,
            Some("S19"),
            Some(HYDRO_WAREHOUSE_ID)
        ));
    }

    #[test]
    fn test_lab_plan_sector_follows_warehouse() {
        let plan = plan_conciliation(
            ConciliationType::Lab,
            Some("S19"),
            Some(HYDRO_WAREHOUSE_ID),
        )
        .unwrap();
        assert_eq!(plan.transfer_sector, Some(Sector::Hydro));
    }

    #[test]
    fn test_hydro_lab_approval_goes_to_hydro_coordinator() {
        assert_eq!(
            linked_transfer_on_approve(
                ConciliationType::Lab,
                TransferStatus::PendienteLab,
                Sector::Hydro
            ),
            Some(TransferStatus::PendienteCoordinadorHydro)
        );
    }

    #[test]
    fn test_cede_raises_transfer_only_for_in_situ() {
        assert!(cede_requires_transfer(ConciliationType::Wh));
        assert!(!cede_requires_transfer(ConciliationType::Lab));
    }

    #[test]
    fn test_conciliation_type_parse() {
        assert_eq!(ConciliationType::parse(" lab "), Some(ConciliationType::Lab));
        assert_eq!(ConciliationType::parse("Wh"), Some(ConciliationType::Wh));
        assert_eq!(ConciliationType::parse("HYDRO"), None);
    }

    #[test]
    fn test_failed_in_situ_motive() {
        assert_eq!(
            failed_in_situ_motive("sigue sin hashear"),
            "FALLO CONCILIACIÓN IN-SITU: sigue sin hashear. Se deriva a Lab."
        );
    }

    #[test]
    fn test_dispatched_model_label() {
        assert_eq!(
            dispatched_product_model("S21+", Some("APW12"), "PSU"),
            "S21+ APW12"
        );
        assert_eq!(dispatched_product_model("S21+", Some("  "), "PSU"), "S21+ PSU");
        assert_eq!(dispatched_product_model("S21+", None, "HASHBOARD"), "S21+ HASHBOARD");
    }
}
