use std::collections::HashMap;
use std::sync::RwLock;

use rusqlite::Connection;
use uuid::Uuid;

use kiosk_db::products;
use kiosk_types::Money;

use crate::error::{Error, Result};

/// Authoritative source of current unit prices.
///
/// `conn` is the caller's open connection; during checkout it is the
/// checkout transaction, so a SQL-backed catalog reads within it.
pub trait ProductCatalog: Send + Sync {
    /// Current price of `product_id`, or `Error::ProductUnavailable` if the
    /// product is unknown or not for sale.
    fn current_price(&self, conn: &Connection, product_id: &Uuid) -> Result<Money>;

    /// Units on hand, or `None` if this catalog does not track stock.
    fn stock(&self, _conn: &Connection, _product_id: &Uuid) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Take `quantity` units out of stock as part of the caller's
    /// transaction. Fails with `Error::InsufficientStock` and changes nothing
    /// when fewer are on hand.
    fn reserve(&self, _conn: &Connection, _product_id: &Uuid, _quantity: u32) -> Result<()> {
        Ok(())
    }
}

/// Catalog backed by the `products` table: sale price if set, else list price.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlCatalog;

impl ProductCatalog for SqlCatalog {
    fn current_price(&self, conn: &Connection, product_id: &Uuid) -> Result<Money> {
        match products::get(conn, product_id)? {
            Some(product) if product.active => Ok(product.effective_price()),
            _ => Err(Error::ProductUnavailable(*product_id)),
        }
    }

    fn stock(&self, conn: &Connection, product_id: &Uuid) -> Result<Option<u32>> {
        match products::get(conn, product_id)? {
            Some(product) if product.active => Ok(Some(product.stock)),
            _ => Err(Error::ProductUnavailable(*product_id)),
        }
    }

    fn reserve(&self, conn: &Connection, product_id: &Uuid, quantity: u32) -> Result<()> {
        if products::take_stock(conn, product_id, quantity)? {
            return Ok(());
        }
        let available = self.stock(conn, product_id)?.unwrap_or(0);
        Err(Error::InsufficientStock {
            product_id: *product_id,
            requested: quantity,
            available,
        })
    }
}

/// In-memory price list for catalogs that live outside the database.
#[derive(Debug, Default)]
pub struct PriceList {
    prices: RwLock<HashMap<Uuid, Money>>,
}

impl PriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, product_id: Uuid, price: Money) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.insert(product_id, price);
    }

    pub fn remove(&self, product_id: &Uuid) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.remove(product_id);
    }
}

impl ProductCatalog for PriceList {
    fn current_price(&self, _conn: &Connection, product_id: &Uuid) -> Result<Money> {
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        prices
            .get(product_id)
            .copied()
            .ok_or(Error::ProductUnavailable(*product_id))
    }
}
