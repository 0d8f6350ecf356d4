//! Service wiring: storage backend selection and the shared `SupplyDesk`.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use supplydesk_infra::config::AppConfig;
use supplydesk_infra::media::MediaStore;
use supplydesk_infra::store::{InMemoryStore, PostgresStore, SupplyDeskStore};
use supplydesk_infra::SupplyDesk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    InMemory,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::InMemory => "in_memory",
            Backend::Postgres => "postgres",
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub desk: Arc<SupplyDesk>,
    pub backend: Backend,
}

impl AppServices {
    /// In-memory services, as used by tests and local runs without a database.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), Backend::InMemory, config)
    }

    fn with_store(store: Arc<dyn SupplyDeskStore>, backend: Backend, config: &AppConfig) -> Self {
        let desk = SupplyDesk::new(
            store,
            MediaStore::new(&config.media.root),
            config.borrowing.clone(),
        );
        Self {
            desk: Arc::new(desk),
            backend,
        }
    }
}

/// Postgres when `database.url` is set, otherwise the in-memory store.
///
/// Migrations run here when `database.run_migrations` is enabled.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database.url.as_deref().filter(|u| !u.is_empty()) else {
        warn!("database.url not set; using the in-memory store (data is lost on restart)");
        return Ok(AppServices::in_memory(config));
    };

    let store = PostgresStore::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to postgres")?;
    if config.database.run_migrations {
        store.migrate().await.context("failed to apply migrations")?;
        info!("database migrations applied");
    }
    Ok(AppServices::with_store(Arc::new(store), Backend::Postgres, config))
}
