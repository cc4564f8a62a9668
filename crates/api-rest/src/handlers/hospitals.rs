//! Hospital directory (§11 supplemented feature — needed so a node can learn
//! the set of valid destination hospitalIds before creating a referral).

use axum::extract::State;
use axum::Json;
use referral_wire::HospitalDto;

use crate::error_response::ApiError;
use crate::identity::AuthenticatedHospital;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/hospitals",
    responses((status = 200, description = "Registered hospitals", body = [HospitalDto]))
)]
pub async fn list(
    State(state): State<AppState>,
    _caller: AuthenticatedHospital,
) -> Result<Json<Vec<HospitalDto>>, ApiError> {
    list_dtos(&state).await
}

/// Same directory, reachable from the patient-facing listener (§6), which
/// has no client certificate to authenticate against.
pub async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<HospitalDto>>, ApiError> {
    list_dtos(&state).await
}

async fn list_dtos(state: &AppState) -> Result<Json<Vec<HospitalDto>>, ApiError> {
    let hospitals = state
        .repo
        .list_hospitals()?
        .into_iter()
        .map(|h| HospitalDto {
            hospital_id: h.hospital_id,
            name: h.name,
        })
        .collect();
    Ok(Json(hospitals))
}
