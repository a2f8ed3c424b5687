use std::sync::Arc;

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use kiosk_db::{Database, cart, users};
use kiosk_types::CartItem;

use crate::catalog::ProductCatalog;
use crate::clock::Clock;
use crate::error::{Error, Result};

/// Per-user cart lines. No row locking: concurrent edits to the same cart are
/// last-write-wins.
pub struct CartStore {
    db: Arc<Database>,
    catalog: Arc<dyn ProductCatalog>,
    clock: Arc<dyn Clock>,
}

impl CartStore {
    pub fn new(db: Arc<Database>, catalog: Arc<dyn ProductCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { db, catalog, clock }
    }

    /// Add `quantity` units of a product, merging with an existing line.
    /// The merged quantity may not exceed the product's stock. The current
    /// catalog price is recorded for display only.
    pub fn add_item(&self, user_id: &Uuid, product_id: &Uuid, quantity: u32) -> Result<CartItem> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        let now = self.clock.now();

        let item = self.db.with_transaction(|tx| -> Result<CartItem> {
            if !users::exists(tx, user_id)? {
                return Err(Error::UserNotFound(*user_id));
            }
            let price = self.catalog.current_price(tx, product_id)?;

            let in_cart = cart::get(tx, user_id, product_id)?.map_or(0, |line| line.quantity);
            self.check_stock(tx, product_id, in_cart.saturating_add(quantity))?;

            Ok(cart::upsert(tx, user_id, product_id, quantity, price, now)?)
        })?;

        debug!(user_id = %user_id, product_id = %product_id, quantity = item.quantity, "Cart line added");
        Ok(item)
    }

    /// Set a line's quantity outright.
    pub fn update_quantity(&self, user_id: &Uuid, product_id: &Uuid, quantity: u32) -> Result<CartItem> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        let now = self.clock.now();

        self.db.with_transaction(|tx| -> Result<CartItem> {
            if cart::get(tx, user_id, product_id)?.is_none() {
                return Err(Error::CartItemNotFound(*product_id));
            }
            self.check_stock(tx, product_id, quantity)?;

            cart::set_quantity(tx, user_id, product_id, quantity, now)?
                .ok_or(Error::CartItemNotFound(*product_id))
        })
    }

    /// Advisory only: checkout takes stock for real.
    fn check_stock(&self, conn: &Connection, product_id: &Uuid, wanted: u32) -> Result<()> {
        match self.catalog.stock(conn, product_id)? {
            Some(available) if available < wanted => Err(Error::InsufficientStock {
                product_id: *product_id,
                requested: wanted,
                available,
            }),
            _ => Ok(()),
        }
    }

    /// Returns whether the line existed.
    pub fn remove_item(&self, user_id: &Uuid, product_id: &Uuid) -> Result<bool> {
        let removed = self.db.with_conn(|conn| cart::remove(conn, user_id, product_id))?;
        if removed {
            debug!(user_id = %user_id, product_id = %product_id, "Cart line removed");
        }
        Ok(removed)
    }

    pub fn clear(&self, user_id: &Uuid) -> Result<usize> {
        Ok(self.db.with_conn(|conn| cart::clear(conn, user_id))?)
    }

    /// Lines in the order they were first added.
    pub fn list(&self, user_id: &Uuid) -> Result<Vec<CartItem>> {
        Ok(self.db.get_cart(user_id)?)
    }
}
