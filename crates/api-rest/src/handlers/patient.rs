//! Patient-facing coordinator endpoints (§11). Not mTLS — these sit on the
//! coordinator's plain frontend listener, reached directly by a patient's
//! browser rather than by a hospital node.

use axum::extract::{Query, State};
use axum::Json;
use referral_core::crypto::password;
use referral_core::error::ReferralError;
use referral_wire::{LoginRequest, LoginResponse, ReferralListResponse, RegisterRequest};

use crate::error_response::ApiError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    let hash = password::hash(&body.password)?;
    state
        .repo
        .create_patient_account(&body.username, &hash, &body.citizen_id)?;
    Ok(axum::http::StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let account = state
        .repo
        .patient_account_by_username(&body.username)?
        .ok_or_else(|| ReferralError::Authorization("invalid username or password".into()))?;

    // The result of `verify` must be inspected — an earlier version of this
    // handler (fixed per the design notes) logged in on any password.
    let ok = password::verify(&body.password, &account.password_hash)?;
    if !ok {
        return Err(ReferralError::Authorization("invalid username or password".into()).into());
    }

    Ok(Json(LoginResponse {
        username: account.username,
        citizen_id: account.citizen_id,
    }))
}

#[derive(serde::Deserialize)]
pub struct PatientReferralsQuery {
    pub username: String,
}

/// Not mTLS — a patient's own referrals, by username (§6).
pub async fn list_referrals(
    State(state): State<AppState>,
    Query(query): Query<PatientReferralsQuery>,
) -> Result<Json<ReferralListResponse>, ApiError> {
    let account = state
        .repo
        .patient_account_by_username(&query.username)?
        .ok_or_else(|| ReferralError::Authorization("unknown patient session".into()))?;
    let referrals = state
        .repo
        .list_by_citizen(&account.citizen_id)?
        .into_iter()
        .map(super::referral::to_dto)
        .collect();
    Ok(Json(ReferralListResponse { referrals }))
}
