//! Coordinator binary: the mTLS hospital-facing API and the plain
//! patient-facing API, served concurrently.

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use coordinator_api::identity::ClientCertInfo;
use coordinator_api::{tls, AppState};
use referral_core::config::CoordinatorConfig;
use referral_core::db::CoordinatorRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("referral_coordinator=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoordinatorConfig::from_env()?;
    tracing::info!(mtls_addr = %config.mtls_addr, frontend_addr = %config.frontend_addr, "starting coordinator");

    let repo = CoordinatorRepository::open(&config.db_path)?;
    let state = AppState::new(repo, config.chunk_dir.clone(), config.payload_dir.clone());

    let rustls_config = tls::mtls_config(&config.cert_file, &config.key_file, &config.ca_file).await?;
    let mtls_app: IntoMakeServiceWithConnectInfo<_, ClientCertInfo> = coordinator_api::mtls_router(state.clone())
        .into_make_service_with_connect_info::<ClientCertInfo>();

    let frontend_app = coordinator_api::frontend_router(state);

    let mtls_server = axum_server::bind_rustls(config.mtls_addr, rustls_config).serve(mtls_app);

    let frontend_server = async {
        let listener = tokio::net::TcpListener::bind(config.frontend_addr).await?;
        axum::serve(listener, frontend_app).await
    };

    let (mtls_result, frontend_result) = tokio::join!(mtls_server, frontend_server);
    mtls_result?;
    frontend_result?;

    Ok(())
}
