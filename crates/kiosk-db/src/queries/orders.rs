use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kiosk_types::{Order, OrderItem, OrderStatus};

use crate::Database;
use crate::models::{OrderItemRow, OrderRow, to_millis};

/// Insert an order row and all of its items.
///
/// Callers run this inside a transaction; the order and its items become
/// visible together or not at all.
pub fn insert(conn: &Connection, order: &Order) -> Result<()> {
    conn.execute(
        "INSERT INTO orders (id, user_id, total, status, payment_method, shipping_partner, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            order.id.to_string(),
            order.user_id.to_string(),
            order.total.minor(),
            order.status.as_str(),
            order.payment_method.as_str(),
            order.shipping_partner.as_str(),
            to_millis(order.created_at),
            to_millis(order.updated_at),
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO order_items (id, order_id, position, product_id, quantity, unit_price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, item) in order.items.iter().enumerate() {
        stmt.execute(rusqlite::params![
            item.id.to_string(),
            order.id.to_string(),
            position as i64,
            item.product_id.to_string(),
            item.quantity,
            item.unit_price.minor(),
        ])?;
    }

    Ok(())
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?1", OrderRow::COLUMNS);
    let Some(row) = conn
        .query_row(&sql, [id.to_string()], OrderRow::from_row)
        .optional()?
    else {
        return Ok(None);
    };

    let items = query_items(conn, &row.id)?;
    row.into_model(items).map(Some)
}

/// A user's orders, newest first.
pub fn list_for_user(conn: &Connection, user_id: &Uuid) -> Result<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        OrderRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], OrderRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| {
            let items = query_items(conn, &row.id)?;
            row.into_model(items)
        })
        .collect()
}

/// Move an order from `from` to `to`. Conditional on the current status, so
/// returns `false` if another writer changed it first.
pub fn update_status(
    conn: &Connection,
    id: &Uuid,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        rusqlite::params![id.to_string(), from.as_str(), to.as_str(), to_millis(now)],
    )?;
    Ok(changed == 1)
}

fn query_items(conn: &Connection, order_id: &str) -> Result<Vec<OrderItem>> {
    let sql = format!(
        "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position ASC",
        OrderItemRow::COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map([order_id], OrderItemRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(OrderItemRow::into_model).collect()
}

impl Database {
    pub fn get_order(&self, id: &Uuid) -> Result<Option<Order>> {
        self.with_conn(|conn| get(conn, id))
    }

    pub fn list_orders(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        self.with_conn(|conn| list_for_user(conn, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users;
    use kiosk_types::{Money, PaymentMethod, ShippingPartner};

    fn placed_order(user_id: Uuid) -> Order {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let items = vec![
            OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: Money::from_minor(500),
            },
            OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: Money::from_minor(1200),
            },
        ];
        Order {
            id,
            user_id,
            items,
            total: Money::from_minor(2200),
            status: OrderStatus::Placed,
            payment_method: PaymentMethod::JazzCash,
            shipping_partner: ShippingPartner::Leopard,
            created_at: now,
            updated_at: now,
        }
    }

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        db.with_conn(|c| users::insert(c, &user, "orders@example.com", Utc::now()))
            .unwrap();
        (db, user)
    }

    #[test]
    fn items_come_back_in_order() {
        let (db, user) = setup();
        let order = placed_order(user);
        db.with_conn(|c| insert(c, &order)).unwrap();

        let stored = db.get_order(&order.id).unwrap().unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].quantity, 2);
        assert_eq!(stored.items[1].unit_price, Money::from_minor(1200));
        assert_eq!(stored.items_total(), Some(stored.total));
        assert_eq!(stored.payment_method, PaymentMethod::JazzCash);
    }

    #[test]
    fn only_status_may_change() {
        let (db, user) = setup();
        let order = placed_order(user);
        db.with_conn(|c| insert(c, &order)).unwrap();
        let id = order.id.to_string();

        let total = db.with_conn(|c| {
            Ok(c.execute("UPDATE orders SET total = 1 WHERE id = ?1", [&id])?)
        });
        assert!(total.is_err());

        let price = db.with_conn(|c| {
            Ok(c.execute("UPDATE order_items SET unit_price = 1 WHERE order_id = ?1", [&id])?)
        });
        assert!(price.is_err());

        let dropped = db.with_conn(|c| {
            Ok(c.execute("DELETE FROM order_items WHERE order_id = ?1", [&id])?)
        });
        assert!(dropped.is_err());

        let moved = db
            .with_conn(|c| update_status(c, &order.id, OrderStatus::Placed, OrderStatus::Paid, Utc::now()))
            .unwrap();
        assert!(moved);

        // Stale `from` no longer matches.
        let stale = db
            .with_conn(|c| update_status(c, &order.id, OrderStatus::Placed, OrderStatus::Cancelled, Utc::now()))
            .unwrap();
        assert!(!stale);
    }
}
