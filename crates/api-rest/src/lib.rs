//! HTTP surface for the referral coordinator: an mTLS-authenticated API for
//! hospital nodes and a plain API for patients.

pub mod chunk_tracking;
pub mod error_response;
pub mod handlers;
pub mod identity;
pub mod router;
pub mod state;
pub mod tls;

pub use router::{frontend_router, mtls_router};
pub use state::AppState;
