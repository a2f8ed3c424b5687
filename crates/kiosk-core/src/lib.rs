//! Kiosk core: verification codes and cart checkout.
//!
//! - [`codes`]: issue and consume single-use verification codes
//! - [`cart`]: per-user cart lines
//! - [`checkout`]: atomic cart to order conversion with price snapshots
//! - [`orders`]: append-only order storage
//! - [`catalog`], [`notify`]: the external collaborators (prices, delivery)
//!
//! [`Storefront`] wires all of them to one database.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod codes;
pub mod config;
pub mod error;
pub mod notify;
pub mod orders;
pub mod storefront;
pub mod telemetry;

pub use error::{Error, Result};
pub use storefront::{Storefront, StorefrontBuilder};
