//! Service layer
//!
//! Business logic between the broker adapter and whatever front end drives
//! the crate: bulk order rotation and realized-PnL reporting.

pub mod pnl_service;
pub mod rotation_service;

pub use pnl_service::PnlService;
pub use rotation_service::RotationService;
