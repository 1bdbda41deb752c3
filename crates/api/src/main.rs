use std::net::SocketAddr;

use anyhow::Context;

use jobexport_api::app::{build_app, AppServices};
use jobexport_infra::config::ServiceConfig;
use jobexport_infra::db::connect_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobexport_observability::init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    tracing::info!(config = ?config, "configuration loaded");

    tokio::fs::create_dir_all(&config.export.export_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create export directory {}",
                config.export.export_dir.display()
            )
        })?;

    let pool = connect_pool(&config.database).context("invalid database settings")?;
    let app = build_app(AppServices::postgres(pool.clone(), &config), &config.http);

    let addr = config.http.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
