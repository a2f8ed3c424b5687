use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kiosk_types::User;

use crate::Database;
use crate::models::{UserRow, to_millis};

pub fn insert(conn: &Connection, id: &Uuid, email: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, verified, created_at) VALUES (?1, ?2, 0, ?3)",
        rusqlite::params![id.to_string(), email, to_millis(now)],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    conn.query_row(&sql, [id.to_string()], UserRow::from_row)
        .optional()?
        .map(UserRow::into_model)
        .transpose()
}

pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS);
    conn.query_row(&sql, [email], UserRow::from_row)
        .optional()?
        .map(UserRow::into_model)
        .transpose()
}

pub fn exists(conn: &Connection, id: &Uuid) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Returns `true` if the flag changed.
pub fn mark_verified(conn: &Connection, id: &Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET verified = 1 WHERE id = ?1 AND verified = 0",
        [id.to_string()],
    )?;
    Ok(changed == 1)
}

impl Database {
    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| get(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_by_email(conn, email))
    }
}
