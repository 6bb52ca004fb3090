//! SQL schema for the Polymyr SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Customers and makers. Never hard-deleted.
CREATE TABLE IF NOT EXISTS accounts (
    account_id        TEXT PRIMARY KEY,
    kind              TEXT NOT NULL,               -- 'customer' | 'maker'
    email             TEXT NOT NULL COLLATE NOCASE,
    name              TEXT NOT NULL,
    password_hash     TEXT,                        -- argon2 PHC; NULL if federated-only
    processor_id      TEXT,
    federated_subject TEXT,
    created_at        TEXT NOT NULL,
    maker_cut         REAL,                        -- makers only
    secret_key        TEXT,                        -- makers only
    publishable_key   TEXT,                        -- makers only
    UNIQUE (kind, email),
    UNIQUE (kind, federated_subject)
);

-- Only the SHA-256 digest of a bearer token is stored.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    account_kind TEXT NOT NULL,
    account_id   TEXT NOT NULL REFERENCES accounts(account_id),
    created_at   TEXT NOT NULL,
    expires_at   TEXT
);

CREATE TABLE IF NOT EXISTS products (
    product_id  TEXT PRIMARY KEY,
    maker_id    TEXT NOT NULL REFERENCES accounts(account_id),
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price_cents INTEGER NOT NULL CHECK (price_cents > 0),
    created_at  TEXT NOT NULL
);

-- At most one campaign per product; units can never be oversold.
CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id      TEXT PRIMARY KEY,
    product_id       TEXT NOT NULL UNIQUE REFERENCES products(product_id) ON DELETE CASCADE,
    maker_id         TEXT NOT NULL REFERENCES accounts(account_id),
    units            INTEGER NOT NULL CHECK (units >= 0),
    purchased_units  INTEGER NOT NULL DEFAULT 0,
    end_date         TEXT NOT NULL,
    amount_off_cents INTEGER NOT NULL CHECK (amount_off_cents >= 0),
    created_at       TEXT NOT NULL,
    CHECK (purchased_units BETWEEN 0 AND units)
);

CREATE TABLE IF NOT EXISTS customer_addresses (
    address_id  TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL REFERENCES accounts(account_id),
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    address     TEXT NOT NULL,
    apartment   TEXT,
    city        TEXT NOT NULL,
    state       TEXT NOT NULL,
    zip         TEXT NOT NULL,
    phone       TEXT
);

-- A customer's processor sub-account on a maker's connected account.
CREATE TABLE IF NOT EXISTS payment_links (
    link_id               TEXT PRIMARY KEY,
    maker_id              TEXT NOT NULL REFERENCES accounts(account_id),
    customer_id           TEXT NOT NULL REFERENCES accounts(account_id),
    processor_customer_id TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    UNIQUE (maker_id, customer_id)
);

-- Written only after the charge succeeded, so charge_id is never NULL.
CREATE TABLE IF NOT EXISTS orders (
    order_id    TEXT PRIMARY KEY,
    product_id  TEXT NOT NULL REFERENCES products(product_id),
    campaign_id TEXT NOT NULL REFERENCES campaigns(campaign_id),
    maker_id    TEXT NOT NULL REFERENCES accounts(account_id),
    customer_id TEXT NOT NULL REFERENCES accounts(account_id),
    address_id  TEXT NOT NULL REFERENCES customer_addresses(address_id),
    card        TEXT NOT NULL,
    charge_id   TEXT NOT NULL,
    fulfilled   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_account_idx  ON sessions(account_id);
CREATE INDEX IF NOT EXISTS products_maker_idx    ON products(maker_id);
CREATE INDEX IF NOT EXISTS addresses_customer_idx ON customer_addresses(customer_id);
CREATE INDEX IF NOT EXISTS orders_customer_idx   ON orders(customer_id);
CREATE INDEX IF NOT EXISTS orders_maker_idx      ON orders(maker_id);

PRAGMA user_version = 1;
";
