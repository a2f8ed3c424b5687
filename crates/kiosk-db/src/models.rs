//! Database row types. These map directly to SQLite rows and are converted
//! into kiosk-types models at the edge of this crate.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use kiosk_types::{
    CartItem, Money, Order, OrderItem, Product, User, VerificationCode,
};

/// Timestamps are stored as Unix milliseconds so range checks stay in SQL.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {}", ms))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt {} '{}'", what, raw))
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub verified: bool,
    pub created_at: i64,
}

impl UserRow {
    pub const COLUMNS: &'static str = "id, email, verified, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            verified: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id, "user id")?,
            email: self.email,
            verified: self.verified,
            created_at: from_millis(self.created_at)?,
        })
    }
}

pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub active: bool,
    pub stock: u32,
}

impl ProductRow {
    pub const COLUMNS: &'static str = "id, name, price, sale_price, active, stock";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            sale_price: row.get(3)?,
            active: row.get(4)?,
            stock: row.get(5)?,
        })
    }

    pub fn into_model(self) -> Result<Product> {
        Ok(Product {
            id: parse_id(&self.id, "product id")?,
            name: self.name,
            price: Money::from_minor(self.price),
            sale_price: self.sale_price.map(Money::from_minor),
            active: self.active,
            stock: self.stock,
        })
    }
}

pub struct CodeRow {
    pub id: String,
    pub user_id: String,
    pub code: String,
    pub purpose: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub used: bool,
    pub used_at: Option<i64>,
}

impl CodeRow {
    pub const COLUMNS: &'static str =
        "id, user_id, code, purpose, issued_at, expires_at, used, used_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            code: row.get(2)?,
            purpose: row.get(3)?,
            issued_at: row.get(4)?,
            expires_at: row.get(5)?,
            used: row.get(6)?,
            used_at: row.get(7)?,
        })
    }

    pub fn into_model(self) -> Result<VerificationCode> {
        Ok(VerificationCode {
            id: parse_id(&self.id, "code id")?,
            user_id: parse_id(&self.user_id, "user id")?,
            purpose: self.purpose.parse()?,
            code: self.code,
            issued_at: from_millis(self.issued_at)?,
            expires_at: from_millis(self.expires_at)?,
            used: self.used,
            used_at: self.used_at.map(from_millis).transpose()?,
        })
    }
}

pub struct CartItemRow {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub display_price: i64,
    pub added_at: i64,
    pub updated_at: i64,
}

impl CartItemRow {
    pub const COLUMNS: &'static str =
        "id, user_id, product_id, quantity, display_price, added_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            product_id: row.get(2)?,
            quantity: row.get(3)?,
            display_price: row.get(4)?,
            added_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<CartItem> {
        Ok(CartItem {
            id: parse_id(&self.id, "cart item id")?,
            user_id: parse_id(&self.user_id, "user id")?,
            product_id: parse_id(&self.product_id, "product id")?,
            quantity: self.quantity,
            display_price: Money::from_minor(self.display_price),
            added_at: from_millis(self.added_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

pub struct OrderRow {
    pub id: String,
    pub user_id: String,
    pub total: i64,
    pub status: String,
    pub payment_method: String,
    pub shipping_partner: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderRow {
    pub const COLUMNS: &'static str =
        "id, user_id, total, status, payment_method, shipping_partner, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            total: row.get(2)?,
            status: row.get(3)?,
            payment_method: row.get(4)?,
            shipping_partner: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub fn into_model(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: parse_id(&self.id, "order id")?,
            user_id: parse_id(&self.user_id, "user id")?,
            items,
            total: Money::from_minor(self.total),
            status: self.status.parse()?,
            payment_method: self.payment_method.parse()?,
            shipping_partner: self.shipping_partner.parse()?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

pub struct OrderItemRow {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl OrderItemRow {
    pub const COLUMNS: &'static str = "id, order_id, product_id, quantity, unit_price";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
        })
    }

    pub fn into_model(self) -> Result<OrderItem> {
        Ok(OrderItem {
            id: parse_id(&self.id, "order item id")?,
            order_id: parse_id(&self.order_id, "order id")?,
            product_id: parse_id(&self.product_id, "product id")?,
            quantity: self.quantity,
            unit_price: Money::from_minor(self.unit_price),
        })
    }
}
