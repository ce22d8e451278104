//! Process lifecycle: logging and engine startup.

use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::service::AuditEngine;

/// Initialize logging with tracing_subscriber. `log::` macro records are
/// bridged in through the `tracing-log` feature.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sqlx=warn".parse().unwrap())
                .add_directive("barrierefrei_core=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .compact()
        .with_target(false)
        .with_ansi(true)
        .init();
}

/// Bind configuration, open the store, and return a ready engine.
pub async fn start(config: Config) -> Result<Arc<AuditEngine>> {
    let pool = db::init_db(&config.database_url).await?;
    let engine = AuditEngine::new(pool, config)?;
    Ok(Arc::new(engine))
}
