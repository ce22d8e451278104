use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Connect to the store and run embedded migrations.
///
/// Accepts any sqlite URL; a bare path is wrapped into `sqlite://<path>?mode=rwc`
/// so the file is created on first run.
pub async fn init_db(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}?mode=rwc", database_url)
    };

    log::info!("Database URL: {}", url);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .with_context(|| format!("failed to connect to database at {}", url))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    log::info!("Database initialized successfully");

    Ok(pool)
}
