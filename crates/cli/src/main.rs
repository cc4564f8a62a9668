//! Hospital node agent: runs the polling engine and the node's own frontend
//! API concurrently.

mod client;
mod error_response;
mod frontend;
mod polling;

use std::time::Duration;

use referral_core::config::NodeConfig;
use referral_core::db::NodeRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client::ReqwestRequester;
use frontend::FrontendState;
use polling::PollingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("node_agent=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env()?;
    tracing::info!(hospital_id = %config.hospital_id, "starting node agent");

    let cert_pem = std::fs::read(&config.cert_file)?;
    let key_pem = std::fs::read(&config.key_file)?;
    let ca_pem = std::fs::read(&config.ca_file)?;

    let polling_requester = ReqwestRequester::new(
        config.coordinator_base_url.clone(),
        &cert_pem,
        &key_pem,
        &ca_pem,
    )?;
    let repo = NodeRepository::open(&config.db_path)?;

    // A failed reachability probe is logged and the node still starts —
    // the polling loop will simply keep failing and retrying on its own
    // schedule rather than the process refusing to come up (§9, §11).
    match polling_requester.list_incoming().await {
        Ok(_) => tracing::info!("coordinator reachable at startup"),
        Err(err) => tracing::warn!(error = %err, "coordinator unreachable at startup, continuing"),
    }

    let engine = PollingEngine::new(
        polling_requester,
        repo.clone(),
        config.upload_dir.clone(),
        config.origin_payload_dir.clone(),
        config.dest_payload_dir.clone(),
        config.result_dir.clone(),
    );
    if let Err(err) = engine.warm_up_notifications().await {
        tracing::warn!(error = %err, "notification warm-up failed");
    }

    let polling_task =
        tokio::spawn(engine.run_forever(Duration::from_secs(config.poll_interval_secs)));

    let frontend_requester = ReqwestRequester::new(
        config.coordinator_base_url.clone(),
        &cert_pem,
        &key_pem,
        &ca_pem,
    )?;
    let frontend_state = FrontendState {
        requester: frontend_requester,
        repo,
        upload_dir: config.upload_dir.clone(),
    };
    let app = frontend::router(frontend_state);
    let listener = tokio::net::TcpListener::bind(config.frontend_addr).await?;
    tracing::info!(addr = %config.frontend_addr, "node frontend API listening");
    let frontend_task = axum::serve(listener, app);

    tokio::select! {
        result = polling_task => {
            if let Err(err) = result {
                tracing::error!(error = %err, "polling engine task panicked");
            }
        }
        result = frontend_task => {
            if let Err(err) = result {
                tracing::error!(error = %err, "frontend server failed");
            }
        }
    }

    Ok(())
}
