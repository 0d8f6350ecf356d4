use std::time::Duration;

use anyhow::Context;

use supplydesk_api::app::{build_app, build_services};
use supplydesk_infra::config::AppConfig;
use supplydesk_infra::jobs::{SweepJob, SweepJobConfig};
use supplydesk_observability::tracing::{init_with, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_with(LogFormat::from_json_flag(config.log.json));

    let (jwt_secret, is_dev) = config.auth.secret_or_dev();
    if is_dev {
        tracing::warn!("auth.jwt_secret not set; using insecure dev default");
    }

    let services = build_services(&config).await?;
    services
        .desk
        .rebuild_analytics()
        .await
        .context("failed to populate analytics")?;

    let sweep = (config.sweep.interval_secs > 0).then(|| {
        tracing::info!(interval_secs = config.sweep.interval_secs, "periodic sweep enabled");
        SweepJob::spawn(
            services.desk.clone(),
            SweepJobConfig {
                interval: Duration::from_secs(config.sweep.interval_secs),
                ..SweepJobConfig::default()
            },
        )
    });

    let backend = services.backend;
    let app = build_app(services, jwt_secret);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!(addr = %listener.local_addr()?, backend = backend.as_str(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    if let Some(handle) = sweep {
        handle.shutdown().await;
    }
    Ok(())
}
