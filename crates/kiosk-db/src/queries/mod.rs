//! Query functions take a `&Connection` so they compose inside a caller's
//! transaction (`&Transaction` derefs to `&Connection`). Convenience methods
//! on [`crate::Database`] wrap the common single-statement reads.

pub mod cart;
pub mod codes;
pub mod orders;
pub mod products;
pub mod users;
