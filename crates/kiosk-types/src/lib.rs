//! Kiosk shared types.
//!
//! Plain data shared by the storage layer (kiosk-db) and the services
//! (kiosk-core). No I/O lives here.

pub mod models;
pub mod money;
pub mod status;

pub use models::*;
pub use money::Money;
pub use status::*;
