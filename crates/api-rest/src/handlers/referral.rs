//! Referral lifecycle handlers (§4.2, §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use referral_core::domain::referral::{PatientFields, Referral};
use referral_core::error::ReferralError;
use referral_core::validation::validate_patient_fields;
use referral_wire::{
    CreateReferralRequest, CreateReferralResponse, GrantRequest, ReferralDto,
    ReferralListResponse,
};

use crate::error_response::ApiError;
use crate::identity::AuthenticatedHospital;
use crate::state::AppState;

pub(crate) fn to_dto(referral: Referral) -> ReferralDto {
    ReferralDto {
        id: referral.id,
        origin: referral.origin,
        destination: referral.destination,
        department: referral.department,
        reason: referral.reason,
        citizen_id: referral.patient.citizen_id,
        prefix: referral.patient.prefix,
        first_name: referral.patient.first_name,
        last_name: referral.patient.last_name,
        birth_date: referral.patient.birth_date,
        address: referral.patient.address,
        gender: referral.patient.gender,
        telephone: referral.patient.telephone,
        email: referral.patient.email,
        status: referral.status.as_str().to_string(),
        created_at: referral.created_at,
    }
}

pub async fn create(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Json(body): Json<CreateReferralRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateReferralResponse>), ApiError> {
    if body.origin != caller.hospital_id {
        return Err(ReferralError::Authorization(
            "origin must equal the authenticated hospital".into(),
        )
        .into());
    }
    if body.origin == body.destination {
        return Err(ReferralError::Validation(
            "origin and destination must differ".into(),
        )
        .into());
    }
    let patient = PatientFields {
        citizen_id: body.citizen_id,
        prefix: body.prefix,
        first_name: body.first_name,
        last_name: body.last_name,
        birth_date: body.birth_date,
        address: body.address,
        gender: body.gender,
        telephone: body.telephone,
        email: body.email,
    };
    validate_patient_fields(&patient)?;

    let created_at = chrono::Utc::now().to_rfc3339();
    let id = state.repo.create_referral(
        &body.origin,
        &body.destination,
        &body.department,
        &body.reason,
        &patient,
        &created_at,
    )?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateReferralResponse { id }),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
) -> Result<Json<ReferralDto>, ApiError> {
    let referral = state.repo.get_referral(id)?;
    if !referral.involves_hospital(&caller.hospital_id) {
        return Err(ReferralError::Authorization(
            "client is neither origin nor destination of referral".into(),
        )
        .into());
    }
    Ok(Json(to_dto(referral)))
}

pub async fn incoming(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
) -> Result<Json<ReferralListResponse>, ApiError> {
    let referrals = state
        .repo
        .list_incoming(&caller.hospital_id)?
        .into_iter()
        .map(to_dto)
        .collect();
    Ok(Json(ReferralListResponse { referrals }))
}

pub async fn outgoing(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
) -> Result<Json<ReferralListResponse>, ApiError> {
    let referrals = state
        .repo
        .list_outgoing(&caller.hospital_id)?
        .into_iter()
        .map(to_dto)
        .collect();
    Ok(Json(ReferralListResponse { referrals }))
}

#[derive(serde::Deserialize)]
pub struct ConsentQuery {
    pub username: String,
}

/// Not mTLS — reached via the patient-facing frontend (§6).
pub async fn consent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ConsentQuery>,
) -> Result<axum::http::StatusCode, ApiError> {
    let account = state
        .repo
        .patient_account_by_username(&query.username)?
        .ok_or_else(|| ReferralError::Authorization("unknown patient session".into()))?;
    state.repo.consent(id, &account.citizen_id)?;
    Ok(axum::http::StatusCode::OK)
}

pub async fn grant(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
    Json(body): Json<GrantRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.repo.grant(id, &caller.hospital_id, body.granted)?;
    Ok(axum::http::StatusCode::OK)
}

pub async fn mark_complete(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.repo.mark_complete(id, &caller.hospital_id)?;
    Ok(axum::http::StatusCode::OK)
}
