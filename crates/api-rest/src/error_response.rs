use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use referral_core::error::ReferralError;
use referral_wire::ErrorEnvelope;

/// `{"message": "…"}` on every non-2xx response (§6, §7).
pub struct ApiError(pub ReferralError);

impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorEnvelope::new(self.0.to_string()))).into_response()
    }
}
