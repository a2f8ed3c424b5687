use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kiosk_types::{Money, Product};

use crate::models::{ProductRow, to_millis};

pub fn insert(conn: &Connection, product: &Product, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO products (id, name, price, sale_price, active, stock, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            product.id.to_string(),
            product.name,
            product.price.minor(),
            product.sale_price.map(Money::minor),
            product.active,
            product.stock,
            to_millis(now),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", ProductRow::COLUMNS);
    conn.query_row(&sql, [id.to_string()], ProductRow::from_row)
        .optional()?
        .map(ProductRow::into_model)
        .transpose()
}

/// Catalog maintenance. Prices here never reach existing orders.
pub fn set_price(conn: &Connection, id: &Uuid, price: Money, sale_price: Option<Money>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE products SET price = ?2, sale_price = ?3 WHERE id = ?1",
        rusqlite::params![id.to_string(), price.minor(), sale_price.map(Money::minor)],
    )?;
    Ok(changed == 1)
}

pub fn set_active(conn: &Connection, id: &Uuid, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE products SET active = ?2 WHERE id = ?1",
        rusqlite::params![id.to_string(), active],
    )?;
    Ok(changed == 1)
}

pub fn set_stock(conn: &Connection, id: &Uuid, stock: u32) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE products SET stock = ?2 WHERE id = ?1",
        rusqlite::params![id.to_string(), stock],
    )?;
    Ok(changed == 1)
}

/// Take `quantity` units of an active product out of stock. Returns `false`
/// and changes nothing when fewer units are on hand.
pub fn take_stock(conn: &Connection, id: &Uuid, quantity: u32) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE products SET stock = stock - ?2 WHERE id = ?1 AND active = 1 AND stock >= ?2",
        rusqlite::params![id.to_string(), quantity],
    )?;
    Ok(changed == 1)
}
