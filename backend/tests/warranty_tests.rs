//! Warranty tests
//!
//! Property-based and unit tests for:
//! - Warranty classification around the warning window
//! - CSV header detection and date parsing for the import
//! - Import summaries

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use shared::{
    detect_import_columns, parse_expiry_date, warranty_location_label, ImportColumns,
    ImportStatus, ImportSummary, MinerState, WarrantyStatus, DEFAULT_WARNING_DAYS,
    MAX_REPORTED_ERRORS,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Dates within a few years of 2024
fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..2000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn warning_days_strategy() -> impl Strategy<Value = i64> {
    1i64..=120
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Classification follows the distance between expiry and today
    #[test]
    fn test_classification_by_distance(
        today in date_strategy(),
        delta in -400i64..400,
        warning in warning_days_strategy(),
    ) {
        let expiry = today + Duration::days(delta);
        let status = WarrantyStatus::classify(Some(expiry), today, warning);
        let expected = if delta < 0 {
            WarrantyStatus::Vencida
        } else if delta <= warning {
            WarrantyStatus::PorVencer
        } else {
            WarrantyStatus::Activa
        };
        prop_assert_eq!(status, expected);
    }

    /// No date, no status
    #[test]
    fn test_missing_date(today in date_strategy(), warning in warning_days_strategy()) {
        prop_assert_eq!(WarrantyStatus::classify(None, today, warning), WarrantyStatus::SinDato);
    }

    /// All accepted formats parse to the same day
    #[test]
    fn test_date_formats_agree(date in date_strategy()) {
        let iso = date.format("%Y-%m-%d").to_string();
        let latin = date.format("%d/%m/%Y").to_string();
        let slashed = date.format("%Y/%m/%d").to_string();
        let with_time = format!("{} 00:00:00", iso);
        prop_assert_eq!(parse_expiry_date(&iso), Some(date));
        prop_assert_eq!(parse_expiry_date(&latin), Some(date));
        prop_assert_eq!(parse_expiry_date(&slashed), Some(date));
        prop_assert_eq!(parse_expiry_date(&with_time), Some(date));
    }

    /// Reported errors are capped
    #[test]
    fn test_error_cap(updated in 0u64..50, error_count in 0usize..40) {
        let errors: Vec<String> = (0..error_count).map(|i| format!("Fila {}", i + 2)).collect();
        let summary = ImportSummary::new(updated, errors);
        prop_assert!(summary.errors.len() <= MAX_REPORTED_ERRORS);
        prop_assert_eq!(summary.status == ImportStatus::Warning, updated == 0);
    }
}

// ============================================================================
// Unit Tests: Classification
// ============================================================================

#[cfg(test)]
mod classification_tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_warning_window_is_inclusive() {
        let today = day(2024, 6, 1);
        let last_day = today + Duration::days(DEFAULT_WARNING_DAYS);
        assert_eq!(
            WarrantyStatus::classify(Some(last_day), today, DEFAULT_WARNING_DAYS),
            WarrantyStatus::PorVencer
        );
        assert_eq!(
            WarrantyStatus::classify(
                Some(last_day + Duration::days(1)),
                today,
                DEFAULT_WARNING_DAYS
            ),
            WarrantyStatus::Activa
        );
    }

    #[test]
    fn test_expires_today_is_not_expired() {
        let today = day(2024, 6, 1);
        assert_eq!(
            WarrantyStatus::classify(Some(today), today, DEFAULT_WARNING_DAYS),
            WarrantyStatus::PorVencer
        );
        assert_eq!(
            WarrantyStatus::classify(Some(day(2024, 5, 31)), today, DEFAULT_WARNING_DAYS),
            WarrantyStatus::Vencida
        );
    }

    #[test]
    fn test_location_labels() {
        assert_eq!(warranty_location_label(Some(4), MinerState::Operativo), "WH 4");
        assert_eq!(
            warranty_location_label(None, MinerState::EnReparacion),
            "LABORATORIO"
        );
        assert_eq!(
            warranty_location_label(None, MinerState::BajaDefinitiva),
            "Desconocida"
        );
    }
}

// ============================================================================
// Unit Tests: Import
// ============================================================================

#[cfg(test)]
mod import_tests {
    use super::*;

    #[test]
    fn test_detect_columns() {
        let headers = ["Modelo", " Serial Number ", "Fecha Garantía"];
        assert_eq!(
            detect_import_columns(headers),
            Some(ImportColumns { sn: 1, expiry: 2 })
        );
    }

    #[test]
    fn test_detect_english_headers() {
        assert_eq!(
            detect_import_columns(["warranty_end", "SN"]),
            Some(ImportColumns { sn: 1, expiry: 0 })
        );
    }

    #[test]
    fn test_missing_column() {
        assert_eq!(detect_import_columns(["sn", "modelo"]), None);
        assert_eq!(detect_import_columns(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(parse_expiry_date("31-12-2025"), None);
        assert_eq!(parse_expiry_date(""), None);
        assert_eq!(parse_expiry_date("mañana"), None);
        assert_eq!(
            parse_expiry_date("2025-12-31T10:00:00"),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
    }

    #[test]
    fn test_nothing_matched_warns_first() {
        let summary = ImportSummary::new(0, vec!["Fila 3: fecha inválida 'x'".to_string()]);
        assert_eq!(summary.status, ImportStatus::Warning);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].contains("ningún SN coincidió"));
    }

    #[test]
    fn test_successful_import() {
        let summary = ImportSummary::new(12, Vec::new());
        assert_eq!(summary.status, ImportStatus::Ok);
        assert!(summary.errors.is_empty());
    }
}
