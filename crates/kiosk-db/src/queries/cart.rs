use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kiosk_types::{CartItem, Money};

use crate::Database;
use crate::models::{CartItemRow, to_millis};

/// Insert a line, or add `quantity` to the existing line for the same product.
/// The display price is refreshed either way.
pub fn upsert(
    conn: &Connection,
    user_id: &Uuid,
    product_id: &Uuid,
    quantity: u32,
    display_price: Money,
    now: DateTime<Utc>,
) -> Result<CartItem> {
    let sql = format!(
        "INSERT INTO cart_items (id, user_id, product_id, quantity, display_price, added_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(user_id, product_id) DO UPDATE SET
             quantity = quantity + excluded.quantity,
             display_price = excluded.display_price,
             updated_at = excluded.updated_at
         RETURNING {}",
        CartItemRow::COLUMNS
    );

    let row = conn.query_row(
        &sql,
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            product_id.to_string(),
            quantity,
            display_price.minor(),
            to_millis(now),
        ],
        CartItemRow::from_row,
    )?;
    row.into_model()
}

pub fn set_quantity(
    conn: &Connection,
    user_id: &Uuid,
    product_id: &Uuid,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<Option<CartItem>> {
    let sql = format!(
        "UPDATE cart_items SET quantity = ?3, updated_at = ?4
         WHERE user_id = ?1 AND product_id = ?2
         RETURNING {}",
        CartItemRow::COLUMNS
    );

    conn.query_row(
        &sql,
        rusqlite::params![user_id.to_string(), product_id.to_string(), quantity, to_millis(now)],
        CartItemRow::from_row,
    )
    .optional()?
    .map(CartItemRow::into_model)
    .transpose()
}

pub fn get(conn: &Connection, user_id: &Uuid, product_id: &Uuid) -> Result<Option<CartItem>> {
    let sql = format!(
        "SELECT {} FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
        CartItemRow::COLUMNS
    );
    conn.query_row(&sql, [user_id.to_string(), product_id.to_string()], CartItemRow::from_row)
        .optional()?
        .map(CartItemRow::into_model)
        .transpose()
}

pub fn remove(conn: &Connection, user_id: &Uuid, product_id: &Uuid) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
        [user_id.to_string(), product_id.to_string()],
    )?;
    Ok(removed > 0)
}

/// Delete every line of the user's cart; returns how many were removed.
pub fn clear(conn: &Connection, user_id: &Uuid) -> Result<usize> {
    let removed = conn.execute("DELETE FROM cart_items WHERE user_id = ?1", [user_id.to_string()])?;
    Ok(removed)
}

/// Lines in the order they were first added.
pub fn list(conn: &Connection, user_id: &Uuid) -> Result<Vec<CartItem>> {
    let sql = format!(
        "SELECT {} FROM cart_items WHERE user_id = ?1 ORDER BY added_at ASC, rowid ASC",
        CartItemRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], CartItemRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(CartItemRow::into_model).collect()
}

impl Database {
    pub fn get_cart(&self, user_id: &Uuid) -> Result<Vec<CartItem>> {
        self.with_conn(|conn| list(conn, user_id))
    }
}
