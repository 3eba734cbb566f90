// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use jobflex_server::{
    api::router,
    config::GatewayConfig,
    idp::CredentialRefresher,
    logging::init_tracing,
    state::AppState,
    storage::RecordDatabase,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    init_tracing(config.log_format);

    // Must happen before any TLS operation, including outbound reqwest calls.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!(path = %config.database_path.display(), "Opening record database");
    let records = Arc::new(RecordDatabase::open(&config.database_path)?);
    let state = AppState::from_config(&config.idp, records)?;

    let shutdown = CancellationToken::new();

    if !state.credentials.initialize().await {
        warn!("Starting without a service credential; management calls will fail until it is acquired");
    }
    let refresher = CredentialRefresher::new(Arc::clone(&state.credentials))
        .with_retry_interval(config.idp.credential_retry);
    let refresher_task = tokio::spawn(refresher.run(shutdown.clone()));

    let gate = Arc::clone(&state.gate);
    tokio::spawn(async move {
        gate.reconcile_pending().await;
    });

    if let Err(e) = state.keys.refresh().await {
        warn!(error = %e, "Initial key set fetch failed; retrying on first request");
    }

    let addr: SocketAddr = config.bind_address().parse()?;
    let app = router(state);

    let handle = Handle::new();
    let signal_handle = handle.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal_shutdown.cancel();
        signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            info!("JobFlex server listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("JobFlex server listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    let _ = refresher_task.await;
    info!("Server stopped");
    Ok(())
}
