//! Validation utilities for miner registry and workflow input

use rust_decimal::Decimal;

use crate::error::{WorkflowError, WorkflowResult};

// ============================================================================
// Miner Registry Validations
// ============================================================================

/// TH/s must fall inside the range any current unit can report
pub fn validate_hashrate(ths: Decimal) -> Result<(), &'static str> {
    if ths < Decimal::ZERO || ths > Decimal::from(1000) {
        return Err("TH/s debe estar entre 0 y 1000");
    }
    Ok(())
}

/// A physical serial number is required on every save
pub fn validate_serial(sn_fisica: Option<&str>) -> Result<(), &'static str> {
    match sn_fisica {
        Some(sn) if !sn.trim().is_empty() => Ok(()),
        _ => Err("SN Físico es obligatorio"),
    }
}

/// An SN may only be reused inside the warehouse that already holds it
pub fn check_duplicate_serial(
    sn_fisica: &str,
    existing_warehouse: Option<Option<i32>>,
    target_warehouse: i32,
) -> WorkflowResult<()> {
    match existing_warehouse {
        Some(existing) if existing != Some(target_warehouse) => Err(WorkflowError::validation(
            "sn_fisica",
            format!(
                "SN {} ya existe en WH{}",
                sn_fisica,
                existing.map(|wh| wh.to_string()).unwrap_or_default()
            ),
        )),
        _ => Ok(()),
    }
}

/// Field-level checks run before a miner is saved
pub fn validate_miner_data(sn_fisica: Option<&str>, ths: Option<Decimal>) -> WorkflowResult<()> {
    validate_serial(sn_fisica).map_err(|m| WorkflowError::validation("sn_fisica", m))?;
    if let Some(ths) = ths {
        validate_hashrate(ths).map_err(|m| WorkflowError::validation("ths", m))?;
    }
    Ok(())
}

// ============================================================================
// Workflow Input Validations
// ============================================================================

/// Free-text fields that must carry something besides whitespace
pub fn require_text(field: &'static str, value: Option<&str>) -> WorkflowResult<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WorkflowError::validation(field, "Campo obligatorio"))
}

/// Rack coordinates are 1-based
pub fn validate_coordinate(value: i32) -> Result<(), &'static str> {
    if value < 1 {
        return Err("Las coordenadas deben ser mayores a cero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Miner Registry Validation Tests
    // ========================================================================

    #[test]
    fn test_hashrate_bounds() {
        assert!(validate_hashrate(Decimal::ZERO).is_ok());
        assert!(validate_hashrate(Decimal::from(1000)).is_ok());
        assert!(validate_hashrate(Decimal::new(2345, 1)).is_ok());
        assert!(validate_hashrate(Decimal::from(-1)).is_err());
        assert!(validate_hashrate(Decimal::new(10001, 1)).is_err());
    }

    #[test]
    fn test_serial_required() {
        assert!(validate_serial(Some("YN22A")).is_ok());
        assert!(validate_serial(Some("  ")).is_err());
        assert!(validate_serial(None).is_err());
    }

    #[test]
    fn test_duplicate_serial_in_other_warehouse() {
        let err = check_duplicate_serial("YN22A", Some(Some(3)), 1).unwrap_err();
        assert_eq!(err.to_string(), "sn_fisica: SN YN22A ya existe en WH3");
        assert!(check_duplicate_serial("YN22A", Some(Some(1)), 1).is_ok());
        assert!(check_duplicate_serial("YN22A", None, 1).is_ok());
    }

    #[test]
    fn test_unplaced_serial_counts_as_other_warehouse() {
        let err = check_duplicate_serial("YN22A", Some(None), 1).unwrap_err();
        assert_eq!(err.to_string(), "sn_fisica: SN YN22A ya existe en WH");
    }

    #[test]
    fn test_validate_miner_data() {
        assert!(validate_miner_data(Some("A1"), Some(Decimal::from(200))).is_ok());
        assert!(validate_miner_data(Some("A1"), None).is_ok());
        assert!(matches!(
            validate_miner_data(Some("A1"), Some(Decimal::from(1200))),
            Err(WorkflowError::Validation { field: "ths", .. })
        ));
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("motivo", Some(" falla PSU ")).unwrap(), "falla PSU");
        assert!(require_text("motivo", Some("")).is_err());
        assert!(require_text("motivo", None).is_err());
    }
}
