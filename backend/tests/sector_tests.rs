//! Sector and location label tests
//!
//! Property-based and unit tests for:
//! - Sector detection from model names and warehouses
//! - Hydro container numbering
//! - Origin and location labels

use proptest::prelude::*;
use shared::{
    cooling_label, history_warehouse_filter, hydro_container, hydro_rack_side, is_hydro_model,
    location_label, origin_label, sector_for, sector_from_model, sector_from_warehouse,
    Position, Sector, HYDRO_WAREHOUSE_ID,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn hydro_model_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("S21 Hyd".to_string()),
        Just("S21hyd".to_string()),
        Just("Whatsminer M33S++".to_string()),
        Just("M53S".to_string()),
        Just("S19 XP HYD".to_string()),
    ]
}

fn air_model_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("S19j Pro".to_string()),
        Just("S21+".to_string()),
        Just("Avalon A1366".to_string()),
        Just("Buzzminer".to_string()),
    ]
}

fn coordinate_strategy() -> impl Strategy<Value = i32> {
    1i32..=40
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Hydro markers win regardless of warehouse
    #[test]
    fn test_hydro_model_is_hydro_anywhere(
        modelo in hydro_model_strategy(),
        wh in prop::option::of(1i32..=120),
    ) {
        prop_assert!(is_hydro_model(Some(&modelo)));
        prop_assert_eq!(sector_from_model(Some(&modelo)), Sector::Hydro);
        prop_assert_eq!(sector_for(Some(&modelo), wh), Sector::Hydro);
    }

    /// An air-cooled unit is Hydro only when it sits in the Hydro facility
    #[test]
    fn test_air_model_sector_follows_warehouse(
        modelo in air_model_strategy(),
        wh in prop::option::of(1i32..=120),
    ) {
        let expected = if wh == Some(HYDRO_WAREHOUSE_ID) { Sector::Hydro } else { Sector::Wh };
        prop_assert_eq!(sector_for(Some(&modelo), wh), expected);
        prop_assert_eq!(sector_from_warehouse(wh), expected);
        prop_assert_eq!(sector_from_model(Some(&modelo)), Sector::Wh);
    }

    /// Two consecutive racks share a container, odd on side A
    #[test]
    fn test_container_pairs(container in 1i32..=60) {
        let a = container * 2 - 1;
        let b = container * 2;
        prop_assert_eq!(hydro_container(a), container);
        prop_assert_eq!(hydro_container(b), container);
        prop_assert_eq!(hydro_rack_side(a), 'A');
        prop_assert_eq!(hydro_rack_side(b), 'B');
    }

    /// Full coordinates always yield a slot label
    #[test]
    fn test_full_coordinates_label(
        wh in coordinate_strategy(),
        rack in coordinate_strategy(),
        fila in coordinate_strategy(),
        columna in coordinate_strategy(),
    ) {
        let label = location_label(Some(wh), Some(rack), Some(fila), Some(columna));
        prop_assert_eq!(label, format!("WH{}-R{}-{}:{}", wh, rack, fila, columna));
    }

    /// A zero coordinate means "not placed"
    #[test]
    fn test_zero_coordinate_is_unplaced(
        wh in coordinate_strategy(),
        rack in coordinate_strategy(),
        fila in coordinate_strategy(),
    ) {
        prop_assert_eq!(Position::from_parts(Some(wh), Some(rack), Some(fila), Some(0)), None);
        prop_assert_eq!(
            location_label(Some(wh), Some(rack), Some(fila), Some(0)),
            format!("WH{}", wh)
        );
    }

    /// Numeric history filters parse as warehouse numbers
    #[test]
    fn test_history_filter_numeric(wh in 1i32..=999) {
        prop_assert_eq!(history_warehouse_filter(Some(&wh.to_string())), Some(wh));
    }
}

// ============================================================================
// Unit Tests: Labels
// ============================================================================

#[cfg(test)]
mod label_tests {
    use super::*;

    #[test]
    fn test_origin_label_hydro() {
        assert_eq!(
            origin_label(Sector::Hydro, Some(HYDRO_WAREHOUSE_ID), Some(3), Some(2), Some(5)),
            "C2-A-2-5"
        );
        assert_eq!(
            origin_label(Sector::Hydro, Some(HYDRO_WAREHOUSE_ID), Some(4), None, None),
            "C2-B--"
        );
    }

    #[test]
    fn test_origin_label_wh() {
        assert_eq!(
            origin_label(Sector::Wh, Some(3), Some(7), Some(1), Some(2)),
            "WH3-R7"
        );
        assert_eq!(origin_label(Sector::Wh, None, Some(7), None, None), "Desconocido");
    }

    #[test]
    fn test_unplaced_label() {
        assert_eq!(location_label(None, None, None, None), "Sin ubicación");
    }

    #[test]
    fn test_grid_key() {
        assert_eq!(Position::new(1, 2, 3, 7).grid_key(), "3-7");
    }

    #[test]
    fn test_cooling_label_needs_literal_hydro() {
        assert_eq!(cooling_label(Some("Antminer S21 Hydro")), "HYDRO");
        assert_eq!(cooling_label(Some("S21 Hyd")), "AIRE");
        assert_eq!(cooling_label(None), "AIRE");
    }

    #[test]
    fn test_history_filter_values() {
        assert_eq!(history_warehouse_filter(Some("Hydro")), Some(HYDRO_WAREHOUSE_ID));
        assert_eq!(history_warehouse_filter(Some("all")), None);
        assert_eq!(history_warehouse_filter(Some("")), None);
        assert_eq!(history_warehouse_filter(None), None);
    }

    #[test]
    fn test_sector_strings() {
        assert_eq!(Sector::from_str("WH"), Some(Sector::Wh));
        assert_eq!(Sector::from_str("Hydro"), Some(Sector::Hydro));
        assert_eq!(Sector::from_str("hydro"), None);
        assert_eq!(serde_json::to_string(&Sector::Wh).unwrap(), "\"WH\"");
    }
}
