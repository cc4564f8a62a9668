//! Patient-field admission checks (§4.2).
//!
//! Guard-clause validators in the reference crate's style: one function per
//! field, returning a typed error with a field-named message rather than a
//! generic validator-derive.

use crate::domain::referral::PatientFields;
use crate::error::ReferralError;

pub fn validate_prefix(prefix: &str) -> Result<(), ReferralError> {
    match prefix {
        "mr" | "mrs" | "ms" => Ok(()),
        _ => Err(ReferralError::Validation(
            "prefix should be mr, mrs, ms".into(),
        )),
    }
}

pub fn validate_gender(gender: &str) -> Result<(), ReferralError> {
    match gender {
        "male" | "female" => Ok(()),
        _ => Err(ReferralError::Validation(
            "gender should be male or female".into(),
        )),
    }
}

pub fn validate_telephone(telephone: &str) -> Result<(), ReferralError> {
    if telephone.len() == 10 && telephone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ReferralError::Validation(
            "telephone should have 10 digits".into(),
        ))
    }
}

pub fn validate_birth_date(birth_date: &str) -> Result<(), ReferralError> {
    let parts: Vec<&str> = birth_date.split('-').collect();
    let valid = parts.len() == 3
        && parts[0].len() == 4
        && parts[1].len() == 2
        && parts[2].len() == 2
        && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(ReferralError::Validation(
            "birthDate should be YYYY-MM-DD".into(),
        ))
    }
}

pub fn validate_email(email: &str) -> Result<(), ReferralError> {
    let at = email.find('@');
    match at {
        Some(pos) if pos > 0 && email[pos + 1..].contains('.') && !email.ends_with('.') => Ok(()),
        _ => Err(ReferralError::Validation("email is not well-formed".into())),
    }
}

/// Run every admission check against a referral-create request's patient
/// fields, returning the first failure.
pub fn validate_patient_fields(patient: &PatientFields) -> Result<(), ReferralError> {
    validate_prefix(&patient.prefix)?;
    validate_gender(&patient.gender)?;
    validate_telephone(&patient.telephone)?;
    validate_birth_date(&patient.birth_date)?;
    validate_email(&patient.email)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_accepts_known_values() {
        assert!(validate_prefix("mr").is_ok());
        assert!(validate_prefix("mrs").is_ok());
        assert!(validate_prefix("ms").is_ok());
        assert!(validate_prefix("dr").is_err());
    }

    #[test]
    fn telephone_requires_exactly_ten_digits() {
        assert!(validate_telephone("0000000000").is_ok());
        assert!(validate_telephone("000000000").is_err());
        assert!(validate_telephone("00000000000").is_err());
        assert!(validate_telephone("000000000a").is_err());
    }

    #[test]
    fn birth_date_requires_iso_shape() {
        assert!(validate_birth_date("2006-02-01").is_ok());
        assert!(validate_birth_date("2006-2-01").is_err());
        assert!(validate_birth_date("01-02-2006").is_err());
    }

    #[test]
    fn email_requires_at_and_dot() {
        assert!(validate_email("b@a.b").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@a.b").is_err());
    }
}
