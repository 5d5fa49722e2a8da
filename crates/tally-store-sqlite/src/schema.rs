//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per owner with a merged dataset. Absence means nothing has been
-- merged since the last reset.
CREATE TABLE IF NOT EXISTS datasets (
    owner        TEXT PRIMARY KEY,
    merged_at    TEXT NOT NULL,      -- RFC 3339 UTC
    record_count INTEGER NOT NULL
);

-- Canonical records. Never updated; replaced wholesale per owner.
-- Decimals are stored as their exact string form.
CREATE TABLE IF NOT EXISTS sale_records (
    owner              TEXT NOT NULL REFERENCES datasets(owner) ON DELETE CASCADE,
    seq                INTEGER NOT NULL,   -- merge order within the owner's set
    customer_code      TEXT,
    customer_name      TEXT,
    customer_place     TEXT,
    location_of_supply TEXT,
    transaction_date   TEXT,               -- YYYY-MM-DD
    product            TEXT,
    tax_rate           TEXT,
    quantity           TEXT,
    unit_of_quantity   TEXT,
    sale_value         TEXT,
    tax_value          TEXT,
    invoice_value      TEXT,
    month_name         TEXT,
    calendar_year      INTEGER,
    financial_year     TEXT,
    PRIMARY KEY (owner, seq)
);

PRAGMA user_version = 1;
";
