//! Hospital identity record (§3).

#[derive(Debug, Clone)]
pub struct Hospital {
    pub hospital_id: String,
    pub name: String,
    pub cert_serial: String,
}
