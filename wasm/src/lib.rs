//! WebAssembly module for the ASIC lab frontend
//!
//! Provides client-side checks for:
//! - Sector and location labels
//! - Warranty classification
//! - Workflow transition previews
//! - Offline form validation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("asic-lab-wasm ready"));
}

/// Sector of a miner ("WH" or "Hydro") from its model and warehouse
#[wasm_bindgen]
pub fn miner_sector(modelo: Option<String>, warehouse_id: Option<i32>) -> String {
    sector_for(modelo.as_deref(), warehouse_id).to_string()
}

/// Cooling label shown next to search results
#[wasm_bindgen]
pub fn miner_cooling_label(modelo: Option<String>) -> String {
    cooling_label(modelo.as_deref()).to_string()
}

/// Slot label, e.g. "WH3-R7-2:4"
#[wasm_bindgen]
pub fn miner_location_label(
    wh: Option<i32>,
    rack: Option<i32>,
    fila: Option<i32>,
    columna: Option<i32>,
) -> String {
    location_label(wh, rack, fila, columna)
}

/// Hydro container label for a rack, e.g. "C2-A"
#[wasm_bindgen]
pub fn hydro_container_label(rack: i32) -> String {
    format!("C{}-{}", hydro_container(rack), hydro_rack_side(rack))
}

/// Warranty state of an expiry date (YYYY-MM-DD) against `today`
#[wasm_bindgen]
pub fn classify_warranty(expiry: Option<String>, today: &str, warning_days: i32) -> Result<String, JsValue> {
    let today = NaiveDate::parse_from_str(today, "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid date: {}", e)))?;
    let expiry = expiry.as_deref().and_then(parse_expiry_date);
    Ok(WarrantyStatus::classify(expiry, today, i64::from(warning_days)).to_string())
}

/// Next transfer status after `action`, or an error describing why it is not allowed
#[wasm_bindgen]
pub fn preview_transfer_action(status: &str, action_json: &str, sector: &str) -> Result<String, JsValue> {
    let status = TransferStatus::from_str(status)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown status: {}", status)))?;
    let action: TransferAction = serde_json::from_str(action_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid action JSON: {}", e)))?;
    let sector = Sector::from_str(sector)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown sector: {}", sector)))?;

    status
        .apply(action, sector)
        .map(|next| next.to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Actions the transfer panel should offer for a request
#[wasm_bindgen]
pub fn available_transfer_actions(status: &str, sector: &str) -> js_sys::Array {
    let actions = js_sys::Array::new();
    if let (Some(status), Some(sector)) = (TransferStatus::from_str(status), Sector::from_str(sector)) {
        for action in allowed_transfer_actions(status, sector) {
            if let Ok(name) = serde_json::to_string(&action) {
                actions.push(&JsValue::from_str(name.trim_matches('"')));
            }
        }
    }
    actions
}

fn allowed_transfer_actions(status: TransferStatus, sector: Sector) -> Vec<TransferAction> {
    TransferAction::ALL
        .into_iter()
        .filter(|action| status.apply(*action, sector).is_ok())
        .collect()
}

/// Whether a role may approve a transfer in the given sector and status
#[wasm_bindgen]
pub fn can_approve_transfer(role_name: &str, department: &str, sector: &str, status: &str) -> bool {
    let role = RoleProfile::new(role_name, department);
    match (Sector::from_str(sector), TransferStatus::from_str(status)) {
        (Some(sector), Some(status)) => can_user_approve(&role, sector, status),
        _ => false,
    }
}

/// Validate the miner form before it is sent
#[wasm_bindgen]
pub fn validate_miner_form(sn_fisica: Option<String>, ths: Option<f64>) -> Result<(), JsValue> {
    let ths = ths
        .map(|value| {
            Decimal::try_from(value).map_err(|_| JsValue::from_str("TH/s inválido"))
        })
        .transpose()?;
    validate_miner_data(sn_fisica.as_deref(), ths).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Rack coordinates are 1-based
#[wasm_bindgen]
pub fn is_valid_coordinate(value: i32) -> bool {
    validate_coordinate(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miner_sector() {
        assert_eq!(miner_sector(Some("S21 Hyd".to_string()), Some(2)), "Hydro");
        assert_eq!(miner_sector(Some("S19".to_string()), Some(HYDRO_WAREHOUSE_ID)), "Hydro");
        assert_eq!(miner_sector(Some("S19".to_string()), Some(2)), "WH");
        assert_eq!(miner_sector(None, None), "WH");
    }

    #[test]
    fn test_hydro_container_label() {
        assert_eq!(hydro_container_label(1), "C1-A");
        assert_eq!(hydro_container_label(4), "C2-B");
    }

    #[test]
    fn test_location_label() {
        assert_eq!(miner_location_label(Some(3), Some(7), Some(2), Some(4)), "WH3-R7-2:4");
        assert_eq!(miner_location_label(Some(3), None, None, None), "WH3");
    }

    #[test]
    fn test_classify_warranty() {
        let status = classify_warranty(Some("2024-06-20".to_string()), "2024-06-01", 30).unwrap();
        assert_eq!(status, "por_vencer");
        let status = classify_warranty(None, "2024-06-01", 30).unwrap();
        assert_eq!(status, "sin_dato");
    }

    #[test]
    fn test_can_approve_transfer() {
        assert!(can_approve_transfer("Coordinador WH", "WH", "WH", "pendiente_coordinador"));
        assert!(!can_approve_transfer("Supervisor WH", "WH", "WH", "pendiente_coordinador"));
        assert!(!can_approve_transfer("Site Manager", "Global", "WH", "bogus"));
    }

    #[test]
    fn test_allowed_transfer_actions() {
        assert_eq!(
            allowed_transfer_actions(TransferStatus::PendienteLab, Sector::Wh),
            vec![TransferAction::LabApprove, TransferAction::LabReject]
        );
        assert!(allowed_transfer_actions(TransferStatus::Ejecutado, Sector::Hydro).is_empty());
    }

    #[test]
    fn test_coordinates() {
        assert!(is_valid_coordinate(1));
        assert!(!is_valid_coordinate(0));
    }
}
