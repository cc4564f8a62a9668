//! Coordinator-side sqlite repository.
//!
//! Grounded on `examples/original_source/lib/database/database.go`'s method
//! shapes: every state-transition is one `UPDATE … WHERE id = ? AND status = ?`
//! whose effect is conditioned on the changed row count, exactly as §5
//! requires ("every state-transition operation is a single update whose
//! success is conditioned on `RowsAffected>0`"). A zero-row update means the
//! precondition didn't hold, and the caller turns that into the right
//! `ReferralError` variant (illegal state vs. authorization vs. not-found).

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::file::{FileUploadStatus, ReferralFile};
use crate::domain::hospital::Hospital;
use crate::domain::patient_account::PatientAccount;
use crate::domain::referral::{PatientFields, Referral, ReferralStatus};
use crate::error::{ReferralError, ReferralResult};

#[derive(Clone)]
pub struct CoordinatorRepository {
    conn: Arc<Mutex<Connection>>,
}

fn row_to_referral(row: &rusqlite::Row) -> rusqlite::Result<Referral> {
    let status_str: String = row.get("status")?;
    Ok(Referral {
        id: row.get("id")?,
        origin: row.get("origin")?,
        destination: row.get("destination")?,
        department: row.get("department")?,
        reason: row.get("reason")?,
        patient: PatientFields {
            citizen_id: row.get("citizen_id")?,
            prefix: row.get("prefix")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            birth_date: row.get("birth_date")?,
            address: row.get("address")?,
            gender: row.get("gender")?,
            telephone: row.get("telephone")?,
            email: row.get("email")?,
        },
        status: ReferralStatus::parse(&status_str).unwrap_or(ReferralStatus::Created),
        created_at: row.get("created_at")?,
        payload_key: row.get("payload_key")?,
    })
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<ReferralFile> {
    let status_str: String = row.get("upload_status")?;
    Ok(ReferralFile {
        id: row.get("id")?,
        referral_id: row.get("referral_id")?,
        name: row.get("name")?,
        checksum: row.get("checksum")?,
        upload_status: FileUploadStatus::parse(&status_str)
            .unwrap_or(FileUploadStatus::UploadIncomplete),
        parent_path: row.get("parent_path")?,
    })
}

impl CoordinatorRepository {
    pub fn open(path: &std::path::Path) -> ReferralResult<Self> {
        let conn = Connection::open(path)?;
        super::schema::migrate_coordinator(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Not `#[cfg(test)]`: the coordinator-api crate's own integration tests
    /// build one as a normal dependency, where a test-only gate on this crate
    /// would make it invisible to them.
    pub fn open_in_memory() -> ReferralResult<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::migrate_coordinator(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert_hospital(&self, hospital: &Hospital) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO hospitals (hospital_id, name, cert_serial) VALUES (?1, ?2, ?3)
             ON CONFLICT(hospital_id) DO UPDATE SET name = excluded.name, cert_serial = excluded.cert_serial",
            params![hospital.hospital_id, hospital.name, hospital.cert_serial],
        )?;
        Ok(())
    }

    pub fn hospital_by_cert_serial(&self, cert_serial: &str) -> ReferralResult<Option<Hospital>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT hospital_id, name, cert_serial FROM hospitals WHERE cert_serial = ?1",
            params![cert_serial],
            |row| {
                Ok(Hospital {
                    hospital_id: row.get(0)?,
                    name: row.get(1)?,
                    cert_serial: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(ReferralError::from)
    }

    pub fn list_hospitals(&self) -> ReferralResult<Vec<Hospital>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT hospital_id, name, cert_serial FROM hospitals")?;
        let rows = stmt.query_map([], |row| {
            Ok(Hospital {
                hospital_id: row.get(0)?,
                name: row.get(1)?,
                cert_serial: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ReferralError::from)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_referral(
        &self,
        origin: &str,
        destination: &str,
        department: &str,
        reason: &str,
        patient: &PatientFields,
        created_at: &str,
    ) -> ReferralResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO referrals
                (origin, destination, department, reason, citizen_id, prefix, first_name,
                 last_name, birth_date, address, gender, telephone, email, status, created_at, payload_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'Created', ?14, NULL)",
            params![
                origin,
                destination,
                department,
                reason,
                patient.citizen_id,
                patient.prefix,
                patient.first_name,
                patient.last_name,
                patient.birth_date,
                patient.address,
                patient.gender,
                patient.telephone,
                patient.email,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_referral(&self, id: i64) -> ReferralResult<Referral> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM referrals WHERE id = ?1",
            params![id],
            row_to_referral,
        )
        .optional()?
        .ok_or(ReferralError::NotFound(id))
    }

    pub fn list_incoming(&self, hospital_id: &str) -> ReferralResult<Vec<Referral>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM referrals WHERE destination = ?1")?;
        let rows = stmt.query_map(params![hospital_id], row_to_referral)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ReferralError::from)
    }

    pub fn list_outgoing(&self, hospital_id: &str) -> ReferralResult<Vec<Referral>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM referrals WHERE origin = ?1")?;
        let rows = stmt.query_map(params![hospital_id], row_to_referral)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ReferralError::from)
    }

    /// Referrals naming this citizenId as the patient, for the patient-facing
    /// frontend's own-referrals view (§6, §11).
    pub fn list_by_citizen(&self, citizen_id: &str) -> ReferralResult<Vec<Referral>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM referrals WHERE citizen_id = ?1")?;
        let rows = stmt.query_map(params![citizen_id], row_to_referral)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ReferralError::from)
    }

    /// Created -> Consented, conditioned on the patient's citizenId matching.
    pub fn consent(&self, id: i64, citizen_id: &str) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE referrals SET status = 'Consented'
             WHERE id = ?1 AND status = 'Created' AND citizen_id = ?2",
            params![id, citizen_id],
        )?;
        if rows == 0 {
            return Err(illegal_state_or_not_found(&conn, id, "Consented")?);
        }
        Ok(())
    }

    /// Consented -> Granted | NotGranted, conditioned on caller being the destination.
    pub fn grant(&self, id: i64, destination_hospital_id: &str, granted: bool) -> ReferralResult<()> {
        let new_status = if granted { "Granted" } else { "NotGranted" };
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE referrals SET status = ?1
             WHERE id = ?2 AND status = 'Consented' AND destination = ?3",
            params![new_status, id, destination_hospital_id],
        )?;
        if rows == 0 {
            return Err(authorization_or_illegal_state(
                &conn,
                id,
                destination_hospital_id,
                |r| r.destination == destination_hospital_id,
                "Destination mismatch: client does not have permission to grant referral",
            )?);
        }
        Ok(())
    }

    /// Granted -> UploadIncomplete; persists the manifest and payload key.
    pub fn initiate_upload(
        &self,
        id: i64,
        origin_hospital_id: &str,
        payload_key: &str,
        files: &[(String, String)],
    ) -> ReferralResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE referrals SET status = 'UploadIncomplete', payload_key = ?1
             WHERE id = ?2 AND status = 'Granted' AND origin = ?3",
            params![payload_key, id, origin_hospital_id],
        )?;
        if rows == 0 {
            let failure = authorization_or_illegal_state(
                &tx,
                id,
                origin_hospital_id,
                |r| r.origin == origin_hospital_id,
                "Origin needs to be client",
            )?;
            drop(tx);
            return Err(failure);
        }
        for (name, checksum) in files {
            tx.execute(
                "INSERT INTO files (referral_id, name, checksum, upload_status, parent_path)
                 VALUES (?1, ?2, ?3, 'UploadIncomplete', '')",
                params![id, name, checksum],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_files(&self, referral_id: i64) -> ReferralResult<Vec<ReferralFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM files WHERE referral_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![referral_id], row_to_file)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ReferralError::from)
    }

    /// Flips one file's `upload_status` to `UploadComplete`, freezing its
    /// checksum. Monotonic: a file already `UploadComplete` is never matched.
    pub fn mark_file_upload_complete(
        &self,
        referral_id: i64,
        name: &str,
        checksum: &str,
    ) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE files SET checksum = ?1, upload_status = 'UploadComplete'
             WHERE referral_id = ?2 AND name = ?3 AND upload_status = 'UploadIncomplete'",
            params![checksum, referral_id, name],
        )?;
        if rows == 0 {
            return Err(ReferralError::AlreadyUploaded(name.to_string()));
        }
        Ok(())
    }

    /// UploadIncomplete -> UploadComplete, conditioned on every file row
    /// already being `UploadComplete` (§4.3's "every file under the referral").
    pub fn try_complete_upload(&self, id: i64, origin_hospital_id: &str) -> ReferralResult<bool> {
        let conn = self.conn.lock().unwrap();
        let incomplete: i64 = conn.query_row(
            "SELECT COUNT(*) FROM files WHERE referral_id = ?1 AND upload_status = 'UploadIncomplete'",
            params![id],
            |row| row.get(0),
        )?;
        if incomplete > 0 {
            return Ok(false);
        }
        let rows = conn.execute(
            "UPDATE referrals SET status = 'UploadComplete'
             WHERE id = ?1 AND status = 'UploadIncomplete' AND origin = ?2",
            params![id, origin_hospital_id],
        )?;
        if rows == 0 {
            return Err(authorization_or_illegal_state(
                &conn,
                id,
                origin_hospital_id,
                |r| r.origin == origin_hospital_id,
                "Origin needs to be client",
            )?);
        }
        Ok(true)
    }

    /// UploadComplete -> Complete, conditioned on caller being the destination.
    pub fn mark_complete(&self, id: i64, destination_hospital_id: &str) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE referrals SET status = 'Complete'
             WHERE id = ?1 AND status = 'UploadComplete' AND destination = ?2",
            params![id, destination_hospital_id],
        )?;
        if rows == 0 {
            return Err(authorization_or_illegal_state(
                &conn,
                id,
                destination_hospital_id,
                |r| r.destination == destination_hospital_id,
                "Hospital mismatch: client does not have permission to view referral",
            )?);
        }
        Ok(())
    }

    pub fn create_patient_account(
        &self,
        username: &str,
        password_hash: &str,
        citizen_id: &str,
    ) -> ReferralResult<()> {
        let conn = self.conn.lock().unwrap();
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM patient_accounts WHERE username = ?1 OR citizen_id = ?2",
            params![username, citizen_id],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(ReferralError::Validation(
                "username or citizenId already registered".into(),
            ));
        }
        conn.execute(
            "INSERT INTO patient_accounts (username, password_hash, citizen_id, is_verified)
             VALUES (?1, ?2, ?3, 1)",
            params![username, password_hash, citizen_id],
        )?;
        Ok(())
    }

    pub fn patient_account_by_username(
        &self,
        username: &str,
    ) -> ReferralResult<Option<PatientAccount>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT username, password_hash, citizen_id, is_verified FROM patient_accounts WHERE username = ?1",
            params![username],
            |row| {
                Ok(PatientAccount {
                    username: row.get(0)?,
                    password_hash: row.get(1)?,
                    citizen_id: row.get(2)?,
                    is_verified: row.get::<_, i64>(3)? != 0,
                })
            },
        )
        .optional()
        .map_err(ReferralError::from)
    }
}

fn illegal_state_or_not_found(
    conn: &Connection,
    id: i64,
    _attempted: &str,
) -> ReferralResult<ReferralError> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM referrals WHERE id = ?1", params![id], |r| r.get(0))
        .optional()?;
    Ok(match status {
        Some(s) => ReferralError::IllegalState(s),
        None => ReferralError::NotFound(id),
    })
}

fn authorization_or_illegal_state(
    conn: &Connection,
    id: i64,
    _caller: &str,
    caller_matches: impl Fn(&Referral) -> bool,
    auth_message: &str,
) -> ReferralResult<ReferralError> {
    let referral = conn
        .query_row(
            "SELECT * FROM referrals WHERE id = ?1",
            params![id],
            row_to_referral,
        )
        .optional()?;
    Ok(match referral {
        None => ReferralError::NotFound(id),
        Some(r) if !caller_matches(&r) => ReferralError::Authorization(auth_message.to_string()),
        Some(r) => ReferralError::IllegalState(r.status.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_patient() -> PatientFields {
        PatientFields {
            citizen_id: "c".into(),
            prefix: "mr".into(),
            first_name: "d".into(),
            last_name: "e".into(),
            birth_date: "2006-02-01".into(),
            address: "f".into(),
            gender: "male".into(),
            telephone: "0000000000".into(),
            email: "b@a.b".into(),
        }
    }

    #[test]
    fn create_and_fetch_referral() {
        let repo = CoordinatorRepository::open_in_memory().unwrap();
        let id = repo
            .create_referral("1111", "2222", "a", "b", &fixture_patient(), "2026-01-01")
            .unwrap();
        let referral = repo.get_referral(id).unwrap();
        assert_eq!(referral.status, ReferralStatus::Created);
        assert_eq!(referral.origin, "1111");
    }

    #[test]
    fn grant_requires_consented_state_and_destination_match() {
        let repo = CoordinatorRepository::open_in_memory().unwrap();
        let id = repo
            .create_referral("1111", "2222", "a", "b", &fixture_patient(), "2026-01-01")
            .unwrap();

        // S4: illegal transition, still Created.
        let err = repo.grant(id, "2222", true).unwrap_err();
        assert!(matches!(err, ReferralError::IllegalState(s) if s == "Created"));

        repo.consent(id, "c").unwrap();

        // S5: cross-hospital authorization failure.
        let err = repo.grant(id, "3333", true).unwrap_err();
        assert!(matches!(err, ReferralError::Authorization(_)));

        repo.grant(id, "2222", true).unwrap();
        let referral = repo.get_referral(id).unwrap();
        assert_eq!(referral.status, ReferralStatus::Granted);
    }

    #[test]
    fn upload_complete_requires_every_file_complete() {
        let repo = CoordinatorRepository::open_in_memory().unwrap();
        let id = repo
            .create_referral("1111", "2222", "a", "b", &fixture_patient(), "2026-01-01")
            .unwrap();
        repo.consent(id, "c").unwrap();
        repo.grant(id, "2222", true).unwrap();
        repo.initiate_upload(
            id,
            "1111",
            "deadbeef",
            &[("a".to_string(), "checksum-a".to_string())],
        )
        .unwrap();

        assert!(!repo.try_complete_upload(id, "1111").unwrap());
        repo.mark_file_upload_complete(id, "a", "checksum-a").unwrap();
        assert!(repo.try_complete_upload(id, "1111").unwrap());

        let referral = repo.get_referral(id).unwrap();
        assert_eq!(referral.status, ReferralStatus::UploadComplete);
    }

    #[test]
    fn double_mark_file_complete_is_rejected() {
        let repo = CoordinatorRepository::open_in_memory().unwrap();
        let id = repo
            .create_referral("1111", "2222", "a", "b", &fixture_patient(), "2026-01-01")
            .unwrap();
        repo.consent(id, "c").unwrap();
        repo.grant(id, "2222", true).unwrap();
        repo.initiate_upload(id, "1111", "deadbeef", &[("a".to_string(), "cs".to_string())])
            .unwrap();
        repo.mark_file_upload_complete(id, "a", "cs").unwrap();
        let err = repo.mark_file_upload_complete(id, "a", "cs").unwrap_err();
        assert!(matches!(err, ReferralError::AlreadyUploaded(_)));
    }
}
