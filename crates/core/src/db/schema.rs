//! Embedded schema migration, run idempotently at startup (§10).

use rusqlite::Connection;

pub fn migrate_coordinator(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS hospitals (
            hospital_id TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            cert_serial TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS referrals (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            origin       TEXT NOT NULL,
            destination  TEXT NOT NULL,
            department   TEXT NOT NULL,
            reason       TEXT NOT NULL,
            citizen_id   TEXT NOT NULL,
            prefix       TEXT NOT NULL,
            first_name   TEXT NOT NULL,
            last_name    TEXT NOT NULL,
            birth_date   TEXT NOT NULL,
            address      TEXT NOT NULL,
            gender       TEXT NOT NULL,
            telephone    TEXT NOT NULL,
            email        TEXT NOT NULL,
            status       TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            payload_key  TEXT
        );

        CREATE TABLE IF NOT EXISTS files (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            referral_id   INTEGER NOT NULL REFERENCES referrals(id),
            name          TEXT NOT NULL,
            checksum      TEXT NOT NULL,
            upload_status TEXT NOT NULL,
            parent_path   TEXT NOT NULL,
            UNIQUE(referral_id, name)
        );

        CREATE TABLE IF NOT EXISTS patient_accounts (
            username      TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            citizen_id    TEXT NOT NULL,
            is_verified   INTEGER NOT NULL DEFAULT 0
        );
        ",
    )
}

pub fn migrate_node(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS receipts (
            referral_id INTEGER PRIMARY KEY,
            doctor_id   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS node_files (
            referral_id INTEGER NOT NULL,
            name        TEXT NOT NULL,
            checksum    TEXT NOT NULL,
            downloaded  INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (referral_id, name)
        );

        CREATE TABLE IF NOT EXISTS notified (
            referral_id INTEGER NOT NULL,
            kind        TEXT NOT NULL,
            PRIMARY KEY (referral_id, kind)
        );
        ",
    )
}
