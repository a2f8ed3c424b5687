use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                verified    INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE products (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                price       INTEGER NOT NULL CHECK (price >= 0),
                sale_price  INTEGER CHECK (sale_price IS NULL OR sale_price >= 0),
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  INTEGER NOT NULL
            );

            -- Codes are an audit trail: never deleted, frozen once used.
            CREATE TABLE verification_codes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                code        TEXT NOT NULL,
                purpose     TEXT NOT NULL
                            CHECK (purpose IN ('signup', 'login', 'password_reset', 'promotion')),
                issued_at   INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL,
                used        INTEGER NOT NULL DEFAULT 0,
                used_at     INTEGER,
                CHECK (expires_at > issued_at)
            );

            CREATE INDEX idx_codes_lookup
                ON verification_codes(user_id, purpose, code);

            CREATE INDEX idx_codes_user_issued
                ON verification_codes(user_id, issued_at);

            CREATE TRIGGER verification_codes_frozen_once_used
                BEFORE UPDATE ON verification_codes
                WHEN OLD.used = 1
            BEGIN
                SELECT RAISE(ABORT, 'verification code already used');
            END;

            CREATE TRIGGER verification_codes_identity_fixed
                BEFORE UPDATE OF id, user_id, code, purpose, issued_at, expires_at
                ON verification_codes
            BEGIN
                SELECT RAISE(ABORT, 'verification code fields are immutable');
            END;

            CREATE TRIGGER verification_codes_never_deleted
                BEFORE DELETE ON verification_codes
            BEGIN
                SELECT RAISE(ABORT, 'verification codes are never deleted');
            END;

            -- product_id is an opaque catalog reference, not a foreign key.
            CREATE TABLE cart_items (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL REFERENCES users(id),
                product_id    TEXT NOT NULL,
                quantity      INTEGER NOT NULL CHECK (quantity >= 1),
                display_price INTEGER NOT NULL,
                added_at      INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL,
                UNIQUE(user_id, product_id)
            );

            CREATE TABLE orders (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL REFERENCES users(id),
                total             INTEGER NOT NULL CHECK (total >= 0),
                status            TEXT NOT NULL
                                  CHECK (status IN ('placed', 'paid', 'shipped', 'delivered', 'cancelled')),
                payment_method    TEXT NOT NULL,
                shipping_partner  TEXT NOT NULL,
                created_at        INTEGER NOT NULL,
                updated_at        INTEGER NOT NULL
            );

            CREATE INDEX idx_orders_user
                ON orders(user_id, created_at);

            CREATE TABLE order_items (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL REFERENCES orders(id),
                position    INTEGER NOT NULL,
                product_id  TEXT NOT NULL,
                quantity    INTEGER NOT NULL CHECK (quantity >= 1),
                unit_price  INTEGER NOT NULL CHECK (unit_price >= 0),
                UNIQUE(order_id, position)
            );

            -- Only status (and its updated_at) may change after checkout.
            CREATE TRIGGER orders_totals_frozen
                BEFORE UPDATE OF id, user_id, total, payment_method, shipping_partner, created_at
                ON orders
            BEGIN
                SELECT RAISE(ABORT, 'order fields other than status are immutable');
            END;

            CREATE TRIGGER orders_never_deleted
                BEFORE DELETE ON orders
            BEGIN
                SELECT RAISE(ABORT, 'orders are never deleted');
            END;

            CREATE TRIGGER order_items_frozen
                BEFORE UPDATE ON order_items
            BEGIN
                SELECT RAISE(ABORT, 'order items are immutable');
            END;

            CREATE TRIGGER order_items_never_deleted
                BEFORE DELETE ON order_items
            BEGIN
                SELECT RAISE(ABORT, 'order items are immutable');
            END;

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (product stock)");
        conn.execute_batch(
            "
            BEGIN;

            ALTER TABLE products
                ADD COLUMN stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0);

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
