//! The referral status enum and its transition graph.
//!
//! Per the redesign note: the state machine is a first-class value. Every
//! handler precondition reduces to `ReferralStatus::can_transition(from, to)`
//! rather than a scattered `if status != X`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralStatus {
    Created,
    Consented,
    NotGranted,
    Granted,
    UploadIncomplete,
    UploadComplete,
    Complete,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Created => "Created",
            ReferralStatus::Consented => "Consented",
            ReferralStatus::NotGranted => "NotGranted",
            ReferralStatus::Granted => "Granted",
            ReferralStatus::UploadIncomplete => "UploadIncomplete",
            ReferralStatus::UploadComplete => "UploadComplete",
            ReferralStatus::Complete => "Complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "Created" => ReferralStatus::Created,
            "Consented" => ReferralStatus::Consented,
            "NotGranted" => ReferralStatus::NotGranted,
            "Granted" => ReferralStatus::Granted,
            "UploadIncomplete" => ReferralStatus::UploadIncomplete,
            "UploadComplete" => ReferralStatus::UploadComplete,
            "Complete" => ReferralStatus::Complete,
            _ => return None,
        })
    }

    /// Is `to` an adjacent, legal transition from `self`?
    ///
    /// `Created -> Consented -> {NotGranted | Granted -> UploadIncomplete ->
    /// UploadComplete -> Complete}`. `NotGranted` and `Complete` are terminal.
    pub fn can_transition(&self, to: ReferralStatus) -> bool {
        use ReferralStatus::*;
        matches!(
            (self, to),
            (Created, Consented)
                | (Consented, NotGranted)
                | (Consented, Granted)
                | (Granted, UploadIncomplete)
                | (UploadIncomplete, UploadComplete)
                | (UploadComplete, Complete)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReferralStatus::NotGranted | ReferralStatus::Complete)
    }
}

impl std::fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PatientFields {
    pub citizen_id: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub address: String,
    pub gender: String,
    pub telephone: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Referral {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub department: String,
    pub reason: String,
    pub patient: PatientFields,
    pub status: ReferralStatus,
    pub created_at: String,
    pub payload_key: Option<String>,
}

impl Referral {
    pub fn involves_hospital(&self, hospital_id: &str) -> bool {
        self.origin == hospital_id || self.destination == hospital_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_chain_is_legal() {
        assert!(ReferralStatus::Created.can_transition(ReferralStatus::Consented));
        assert!(ReferralStatus::Consented.can_transition(ReferralStatus::Granted));
        assert!(ReferralStatus::Granted.can_transition(ReferralStatus::UploadIncomplete));
        assert!(ReferralStatus::UploadIncomplete.can_transition(ReferralStatus::UploadComplete));
        assert!(ReferralStatus::UploadComplete.can_transition(ReferralStatus::Complete));
    }

    #[test]
    fn deny_path_is_legal_and_terminal() {
        assert!(ReferralStatus::Consented.can_transition(ReferralStatus::NotGranted));
        assert!(ReferralStatus::NotGranted.is_terminal());
    }

    #[test]
    fn non_adjacent_transitions_are_illegal() {
        assert!(!ReferralStatus::Created.can_transition(ReferralStatus::Granted));
        assert!(!ReferralStatus::Created.can_transition(ReferralStatus::UploadComplete));
        assert!(!ReferralStatus::Complete.can_transition(ReferralStatus::Created));
    }

    #[test]
    fn parse_round_trips_every_variant() {
        for s in [
            ReferralStatus::Created,
            ReferralStatus::Consented,
            ReferralStatus::NotGranted,
            ReferralStatus::Granted,
            ReferralStatus::UploadIncomplete,
            ReferralStatus::UploadComplete,
            ReferralStatus::Complete,
        ] {
            assert_eq!(ReferralStatus::parse(s.as_str()), Some(s));
        }
    }
}
