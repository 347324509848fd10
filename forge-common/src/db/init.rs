//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently;
//! safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys; task rows are removed by cascade when their
    // owning asset row is deleted
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while the reconciler writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Idempotent schema creation
    create_assets_table(&pool).await?;
    create_generation_tasks_table(&pool).await?;

    Ok(pool)
}

/// Create the assets table
///
/// One row per generated artifact at any tier. `parent_id` links a row to
/// the asset it was refined or converted from; artifact columns hold bare
/// filenames resolved against the per-tier storage directories.
async fn create_assets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            prompt TEXT,
            asset_type TEXT NOT NULL CHECK (asset_type IN ('image_2d', 'prototype', 'final_model')),
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
            image_path TEXT,
            gif_path TEXT,
            obj_path TEXT,
            fbx_path TEXT,
            texture_path TEXT,
            parent_id TEXT,
            remote_image_url TEXT,
            task_id TEXT,
            error_detail TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_parent ON assets(parent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_type_status ON assets(asset_type, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_created ON assets(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the generation_tasks table
///
/// One row per external asynchronous job, keyed by the provider's opaque
/// task id. Mutated only by the task reconciler; deleted only by the
/// cascade from its owning asset row.
async fn create_generation_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generation_tasks (
            task_id TEXT PRIMARY KEY,
            asset_id TEXT NOT NULL REFERENCES assets(guid) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending',
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress >= 0 AND progress <= 100),
            result_url TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_generation_tasks_asset ON generation_tasks(asset_id)")
        .execute(pool)
        .await?;

    Ok(())
}
