//! Download-side handlers (§4.2, §6). Requires `status == UploadComplete`
//! and the caller to be the referral's destination.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::Json;
use referral_core::domain::referral::ReferralStatus;
use referral_core::error::ReferralError;
use referral_wire::{DownloadListResponse, FileManifestEntry};

use crate::error_response::ApiError;
use crate::identity::AuthenticatedHospital;
use crate::state::AppState;

fn require_destination_and_upload_complete(
    state: &AppState,
    caller: &AuthenticatedHospital,
    id: i64,
) -> Result<(), ApiError> {
    let referral = state.repo.get_referral(id)?;
    if referral.destination != caller.hospital_id {
        return Err(ReferralError::Authorization(
            "Hospital mismatch: client does not have permission to view referral".into(),
        )
        .into());
    }
    if referral.status != ReferralStatus::UploadComplete {
        return Err(ReferralError::IllegalState(referral.status.as_str().to_string()).into());
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
) -> Result<Json<DownloadListResponse>, ApiError> {
    require_destination_and_upload_complete(&state, &caller, id)?;
    let referral = state.repo.get_referral(id)?;
    let files = state
        .repo
        .list_files(id)?
        .into_iter()
        .map(|f| FileManifestEntry {
            name: f.name,
            checksum: f.checksum,
        })
        .collect();
    let payload_key = referral
        .payload_key
        .ok_or_else(|| ReferralError::Validation("referral has no payload key".into()))?;
    Ok(Json(DownloadListResponse { files, payload_key }))
}

pub async fn file(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path((id, filename)): Path<(i64, String)>,
) -> Result<Body, ApiError> {
    require_destination_and_upload_complete(&state, &caller, id)?;
    let files = state.repo.list_files(id)?;
    if !files.iter().any(|f| f.name == filename) {
        return Err(ReferralError::UnknownFile(filename).into());
    }
    let path = state
        .payload_dir
        .join(format!("referral-{id}"))
        .join(&filename);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(ReferralError::from)?;
    Ok(Body::from(bytes))
}
