//! Domain models for the ASIC lab inventory and RMA workflow

mod depot;
mod diagnostic;
mod lab;
mod miner;
mod part_request;
mod transfer;
mod user;
mod warranty;

pub use depot::*;
pub use diagnostic::*;
pub use lab::*;
pub use miner::*;
pub use part_request::*;
pub use transfer::*;
pub use user::*;
pub use warranty::*;
