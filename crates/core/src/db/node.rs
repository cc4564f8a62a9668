//! Hospital-node sqlite repository (§11): receipts, local download tracking,
//! and the "notified once" table the polling engine uses to avoid re-firing
//! consent/grant prompts on every tick.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::receipt::ReferralReceipt;
use crate::error::{ReferralError, ReferralResult};

#[derive(Clone)]
pub struct NodeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NodeRepository {
    pub fn open(path: &std::path::Path) -> ReferralResult<Self> {
        let conn = Connection::open(path)?;
        super::schema::migrate_node(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Not `#[cfg(test)]`: downstream crates' own test suites (the polling
    /// engine, the HTTP handler tests) build one as a normal dependency, where
    /// a test-only gate on this crate would make it invisible to them.
    pub fn open_in_memory() -> ReferralResult<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::migrate_node(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn assign_receipt(&self, referral_id: i64, doctor_id: &str) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO receipts (referral_id, doctor_id) VALUES (?1, ?2)
             ON CONFLICT(referral_id) DO UPDATE SET doctor_id = excluded.doctor_id",
            params![referral_id, doctor_id],
        )?;
        Ok(())
    }

    pub fn receipt(&self, referral_id: i64) -> ReferralResult<Option<ReferralReceipt>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT referral_id, doctor_id FROM receipts WHERE referral_id = ?1",
            params![referral_id],
            |row| {
                Ok(ReferralReceipt {
                    referral_id: row.get(0)?,
                    doctor_id: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(ReferralError::from)
    }

    /// Records that a file's decrypted bytes have landed on disk. Idempotent:
    /// re-downloading the same file after a restart just overwrites the row.
    pub fn mark_file_downloaded(
        &self,
        referral_id: i64,
        name: &str,
        checksum: &str,
    ) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO node_files (referral_id, name, checksum, downloaded)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(referral_id, name) DO UPDATE SET checksum = excluded.checksum, downloaded = 1",
            params![referral_id, name, checksum],
        )?;
        Ok(())
    }

    pub fn is_file_downloaded(&self, referral_id: i64, name: &str) -> ReferralResult<bool> {
        let conn = self.conn.lock().unwrap();
        let downloaded: Option<i64> = conn
            .query_row(
                "SELECT downloaded FROM node_files WHERE referral_id = ?1 AND name = ?2",
                params![referral_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(downloaded.unwrap_or(0) != 0)
    }

    /// True the first time this (referral, kind) pair is seen; false on every
    /// later poll tick, so the polling engine fires a notification exactly
    /// once per state change (§4.5, redesign note on removing `tickerPaused`).
    pub fn mark_notified_once(&self, referral_id: i64, kind: &str) -> ReferralResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO notified (referral_id, kind) VALUES (?1, ?2)",
            params![referral_id, kind],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_fetch_receipt() {
        let repo = NodeRepository::open_in_memory().unwrap();
        assert!(repo.receipt(1).unwrap().is_none());
        repo.assign_receipt(1, "dr-smith").unwrap();
        let receipt = repo.receipt(1).unwrap().unwrap();
        assert_eq!(receipt.doctor_id, "dr-smith");
        // Reassignment overwrites rather than erroring.
        repo.assign_receipt(1, "dr-jones").unwrap();
        assert_eq!(repo.receipt(1).unwrap().unwrap().doctor_id, "dr-jones");
    }

    #[test]
    fn file_download_tracking_round_trips() {
        let repo = NodeRepository::open_in_memory().unwrap();
        assert!(!repo.is_file_downloaded(1, "scan.pdf").unwrap());
        repo.mark_file_downloaded(1, "scan.pdf", "cafebabe").unwrap();
        assert!(repo.is_file_downloaded(1, "scan.pdf").unwrap());
    }

    #[test]
    fn notified_once_fires_a_single_time_per_kind() {
        let repo = NodeRepository::open_in_memory().unwrap();
        assert!(repo.mark_notified_once(1, "consent").unwrap());
        assert!(!repo.mark_notified_once(1, "consent").unwrap());
        assert!(repo.mark_notified_once(1, "grant").unwrap());
    }
}
