//! Hospital-node frontend API (§4.6) — the surface a hospital's own UI talks
//! to. Create-referral accepts multipart form data; everything else is a
//! thin passthrough to the coordinator or a local receipt lookup.

use axum::extract::{Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use referral_core::error::ReferralError;
use referral_wire::{
    AssignReceiptRequest, CreateReferralResponse, GrantRequest, HospitalDto, ReferralDto,
    ReferralReceiptDto,
};

use crate::client::Requester;

const RESERVED_FILENAME: &str = "ReferralData.json";

#[derive(Clone)]
pub struct FrontendState<R: Requester + Clone + 'static> {
    pub requester: R,
    pub repo: referral_core::db::NodeRepository,
    pub upload_dir: std::path::PathBuf,
}

/// The node's own UI-facing surface (§4.6, §6) — not mTLS, local to the
/// hospital's network. `/` is multipart create-referral; everything else is
/// a thin passthrough to the coordinator or a local receipt lookup.
pub fn router<R: Requester + Clone + 'static>(state: FrontendState<R>) -> Router {
    Router::new()
        .route("/", post(create_referral::<R>))
        .route("/referrals", get(list_incoming::<R>))
        .route("/referrals/:id", get(view_referral::<R>))
        .route("/referrals/:id/assign", post(assign_receipt::<R>))
        .route("/referrals/:id/receipt", get(get_receipt::<R>))
        .route("/referrals/:id/grant", post(grant_passthrough::<R>))
        .route("/hospitals", get(hospitals_passthrough::<R>))
        .with_state(state)
}

async fn create_referral<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
    mut multipart: Multipart,
) -> Result<Json<CreateReferralResponse>, crate::error_response::ApiError> {
    let mut fields = serde_json::Map::new();
    let mut seen_filenames = std::collections::HashSet::new();
    let mut staged_files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ReferralError::Validation(e.to_string()))?
    {
        if let Some(filename) = field.file_name().map(str::to_string) {
            if filename == RESERVED_FILENAME {
                return Err(ReferralError::Validation(format!(
                    "{RESERVED_FILENAME} is a reserved filename"
                ))
                .into());
            }
            if !seen_filenames.insert(filename.clone()) {
                return Err(ReferralError::Validation(format!(
                    "duplicate file name: {filename}"
                ))
                .into());
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ReferralError::Validation(e.to_string()))?;
            staged_files.push((filename, bytes.to_vec()));
            continue;
        }
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ReferralError::Validation(e.to_string()))?;
        fields.insert(name, serde_json::Value::String(value));
    }

    let id = state
        .requester
        .create_referral(serde_json::Value::Object(fields.clone()))
        .await?;

    let referral_dir = state.upload_dir.join(id.to_string()).join("files");
    tokio::fs::create_dir_all(&referral_dir)
        .await
        .map_err(ReferralError::from)?;
    for (filename, bytes) in staged_files {
        tokio::fs::write(referral_dir.join(&filename), &bytes)
            .await
            .map_err(ReferralError::from)?;
    }
    let referral_json = serde_json::to_vec_pretty(&serde_json::Value::Object(fields))
        .map_err(|e| ReferralError::Validation(e.to_string()))?;
    tokio::fs::write(referral_dir.join(RESERVED_FILENAME), referral_json)
        .await
        .map_err(ReferralError::from)?;

    Ok(Json(CreateReferralResponse { id }))
}

async fn list_incoming<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
) -> Result<Json<Vec<ReferralDto>>, crate::error_response::ApiError> {
    Ok(Json(state.requester.list_incoming().await?))
}

async fn view_referral<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
    Path(id): Path<i64>,
) -> Result<Json<ReferralDto>, crate::error_response::ApiError> {
    Ok(Json(state.requester.get_referral(id).await?))
}

async fn assign_receipt<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
    Path(id): Path<i64>,
    Json(body): Json<AssignReceiptRequest>,
) -> Result<axum::http::StatusCode, crate::error_response::ApiError> {
    state.repo.assign_receipt(id, &body.doctor_id)?;
    Ok(axum::http::StatusCode::CREATED)
}

async fn get_receipt<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
    Path(id): Path<i64>,
) -> Result<Json<Option<ReferralReceiptDto>>, crate::error_response::ApiError> {
    let receipt = state
        .repo
        .receipt(id)?
        .map(|r| ReferralReceiptDto {
            referral_id: r.referral_id,
            doctor_id: r.doctor_id,
        });
    Ok(Json(receipt))
}

async fn grant_passthrough<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
    Path(id): Path<i64>,
    Json(body): Json<GrantRequest>,
) -> Result<axum::http::StatusCode, crate::error_response::ApiError> {
    state.requester.grant(id, body.granted).await?;
    Ok(axum::http::StatusCode::OK)
}

async fn hospitals_passthrough<R: Requester + Clone + 'static>(
    State(state): State<FrontendState<R>>,
) -> Result<Json<Vec<HospitalDto>>, crate::error_response::ApiError> {
    Ok(Json(state.requester.list_hospitals().await?))
}
