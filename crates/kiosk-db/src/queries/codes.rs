use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kiosk_types::{Purpose, VerificationCode};

use crate::models::{CodeRow, to_millis};

/// Why a submitted code could not be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// No code of this user and purpose carries the submitted value.
    NoMatch,
    /// A matching code is still unused but past its expiry.
    Expired,
    /// Every matching code has already been consumed.
    Used,
}

pub fn insert(conn: &Connection, code: &VerificationCode) -> Result<()> {
    conn.execute(
        "INSERT INTO verification_codes (id, user_id, code, purpose, issued_at, expires_at, used, used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            code.id.to_string(),
            code.user_id.to_string(),
            code.code,
            code.purpose.as_str(),
            to_millis(code.issued_at),
            to_millis(code.expires_at),
            code.used,
            code.used_at.map(to_millis),
        ],
    )?;
    Ok(())
}

/// Number of codes issued to `user_id` at or after `since`, any purpose.
pub fn count_issued_since(conn: &Connection, user_id: &Uuid, since: DateTime<Utc>) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM verification_codes WHERE user_id = ?1 AND issued_at >= ?2",
        rusqlite::params![user_id.to_string(), to_millis(since)],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Atomically mark the newest unused, unexpired code of `(user, purpose)`
/// whose value equals `code` as used, and return it.
///
/// This is one conditional `UPDATE ... WHERE used = 0`, so when several
/// callers race on the same code exactly one of them gets `Some`.
pub fn consume(
    conn: &Connection,
    user_id: &Uuid,
    purpose: Purpose,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<VerificationCode>> {
    let sql = format!(
        "UPDATE verification_codes
         SET used = 1, used_at = ?4
         WHERE id = (
             SELECT id FROM verification_codes
             WHERE user_id = ?1 AND purpose = ?2 AND code = ?3
               AND used = 0 AND expires_at > ?4
             ORDER BY issued_at DESC, rowid DESC
             LIMIT 1
         )
         AND used = 0
         RETURNING {}",
        CodeRow::COLUMNS
    );

    conn.query_row(
        &sql,
        rusqlite::params![user_id.to_string(), purpose.as_str(), code, to_millis(now)],
        CodeRow::from_row,
    )
    .optional()?
    .map(CodeRow::into_model)
    .transpose()
}

/// Explain a failed [`consume`]. Read-only.
pub fn classify_miss(
    conn: &Connection,
    user_id: &Uuid,
    purpose: Purpose,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Miss> {
    let (unused_expired, used): (i64, i64) = conn.query_row(
        "SELECT
             COALESCE(SUM(used = 0 AND expires_at <= ?4), 0),
             COALESCE(SUM(used = 1), 0)
         FROM verification_codes
         WHERE user_id = ?1 AND purpose = ?2 AND code = ?3",
        rusqlite::params![user_id.to_string(), purpose.as_str(), code, to_millis(now)],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    Ok(if unused_expired > 0 {
        Miss::Expired
    } else if used > 0 {
        Miss::Used
    } else {
        Miss::NoMatch
    })
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Option<VerificationCode>> {
    let sql = format!("SELECT {} FROM verification_codes WHERE id = ?1", CodeRow::COLUMNS);
    conn.query_row(&sql, [id.to_string()], CodeRow::from_row)
        .optional()?
        .map(CodeRow::into_model)
        .transpose()
}

/// Audit view: every code issued to a user, newest first.
pub fn list_for_user(conn: &Connection, user_id: &Uuid) -> Result<Vec<VerificationCode>> {
    let sql = format!(
        "SELECT {} FROM verification_codes WHERE user_id = ?1 ORDER BY issued_at DESC, rowid DESC",
        CodeRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], CodeRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(CodeRow::into_model).collect()
}
