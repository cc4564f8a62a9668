use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{download, hospitals, patient, referral, upload};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(hospitals::list))]
struct ApiDoc;

/// Every mTLS-authenticated endpoint (§6's coordinator HTTP API table).
pub fn mtls_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(referral::create))
        .route("/incoming", get(referral::incoming))
        .route("/outgoing", get(referral::outgoing))
        .route("/hospitals", get(hospitals::list))
        .route("/:id", get(referral::get))
        .route("/:id/grant", post(referral::grant))
        .route("/:id/upload", post(upload::initiate))
        .route("/:id/upload/begin", post(upload::begin))
        .route(
            "/:id/upload/file/:filename/:chunk_index",
            post(upload::upload_chunk),
        )
        .route("/:id/upload/complete", post(upload::complete))
        .route("/:id/download", get(download::list))
        .route("/:id/download/:filename", get(download::file))
        .route("/:id/complete", post(referral::mark_complete))
        .merge(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

/// Patient-facing endpoints (§6) — no client certificate required.
pub fn frontend_router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(patient::register))
        .route("/login", post(patient::login))
        .route("/:id/consent", post(referral::consent))
        .route("/patient/referrals", get(patient::list_referrals))
        .route("/hospitals", get(hospitals::list_public))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
