//! Shared types and rules for the ASIC lab inventory and RMA workflow
//!
//! Everything here is pure: state enums, transition functions, role
//! capabilities and sector rules. The backend persists the results and the
//! WASM crate exposes the same rules to the browser.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
