//! Chunked upload protocol handlers (§4.3).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use referral_core::crypto::sha256_hex;
use referral_core::error::ReferralError;
use referral_wire::{ChunkBeginRequest, UploadInitiateRequest};

use crate::error_response::ApiError;
use crate::identity::AuthenticatedHospital;
use crate::state::AppState;

pub async fn initiate(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
    Json(body): Json<UploadInitiateRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    let mut seen = std::collections::HashSet::new();
    for file in &body.files {
        if !seen.insert(file.name.clone()) {
            return Err(
                ReferralError::Validation(format!("duplicate file name: {}", file.name)).into(),
            );
        }
    }
    let files: Vec<(String, String)> = body
        .files
        .into_iter()
        .map(|f| (f.name, f.checksum))
        .collect();
    state
        .repo
        .initiate_upload(id, &caller.hospital_id, &body.payload_key, &files)?;
    Ok(axum::http::StatusCode::CREATED)
}

pub async fn begin(
    State(state): State<AppState>,
    _caller: AuthenticatedHospital,
    Path(id): Path<i64>,
    Json(body): Json<ChunkBeginRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    // chunkBegin only makes sense once initiate has put the referral into
    // UploadIncomplete; reject explicitly rather than letting a Granted-state
    // referral surface as "unknown file" (§4.2).
    let referral = state.repo.get_referral(id)?;
    if referral.status != referral_core::domain::ReferralStatus::UploadIncomplete {
        return Err(ReferralError::NotAcceptingChunks(id).into());
    }
    let persisted = state.repo.list_files(id)?;
    for spec in &body.chunk_files {
        let file = persisted
            .iter()
            .find(|f| f.name == spec.name)
            .ok_or_else(|| ReferralError::UnknownFile(spec.name.clone()))?;
        if file.upload_status == referral_core::domain::FileUploadStatus::UploadComplete {
            return Err(ReferralError::AlreadyUploaded(spec.name.clone()).into());
        }
    }
    let files = body
        .chunk_files
        .into_iter()
        .map(|spec| {
            (
                spec.name,
                spec.chunks
                    .into_iter()
                    .map(|c| (c.checksum, c.size_kb))
                    .collect(),
            )
        })
        .collect();
    state.tracking.begin(id, files)?;
    Ok(axum::http::StatusCode::CREATED)
}

pub async fn upload_chunk(
    State(state): State<AppState>,
    _caller: AuthenticatedHospital,
    Path((id, filename, chunk_index)): Path<(i64, String, usize)>,
    body: Bytes,
) -> Result<axum::http::StatusCode, ApiError> {
    let checksum = sha256_hex(&body);
    state
        .tracking
        .validate_chunk(id, &filename, chunk_index, &checksum)?;

    let dir = state
        .chunk_dir
        .join(format!("referral-{id}"))
        .join(&filename);
    std::fs::create_dir_all(&dir).map_err(ReferralError::from)?;
    std::fs::write(dir.join(format!("chunk-{chunk_index}")), &body)
        .map_err(ReferralError::from)?;

    state
        .tracking
        .mark_chunk_complete(id, &filename, chunk_index)?;

    Ok(axum::http::StatusCode::OK)
}

pub async fn complete(
    State(state): State<AppState>,
    caller: AuthenticatedHospital,
    Path(id): Path<i64>,
) -> Result<axum::http::StatusCode, ApiError> {
    let ready = state.tracking.complete_files_snapshot(id);
    for tracked in ready {
        let chunk_dir = state
            .chunk_dir
            .join(format!("referral-{id}"))
            .join(&tracked.name);
        let mut assembled = Vec::new();
        for index in 0..tracked.chunks.len() {
            let bytes = std::fs::read(chunk_dir.join(format!("chunk-{index}")))
                .map_err(ReferralError::from)?;
            assembled.extend_from_slice(&bytes);
        }
        let checksum = sha256_hex(&assembled);
        let persisted = state.repo.list_files(id)?;
        let manifest_checksum = persisted
            .iter()
            .find(|f| f.name == tracked.name)
            .map(|f| f.checksum.clone())
            .ok_or_else(|| ReferralError::UnknownFile(tracked.name.clone()))?;
        if manifest_checksum != checksum {
            return Err(ReferralError::ChecksumMismatch.into());
        }

        let out_dir = state.payload_dir.join(format!("referral-{id}"));
        std::fs::create_dir_all(&out_dir).map_err(ReferralError::from)?;
        std::fs::write(out_dir.join(&tracked.name), &assembled).map_err(ReferralError::from)?;

        state
            .repo
            .mark_file_upload_complete(id, &tracked.name, &checksum)?;
    }

    let all_complete = state.repo.try_complete_upload(id, &caller.hospital_id)?;
    if all_complete {
        state.tracking.drop_referral(id);
        Ok(axum::http::StatusCode::OK)
    } else {
        Err(ReferralError::IncompleteFiles.into())
    }
}
