//! External generation task database operations
//!
//! The task row mirrors the provider's view of a job. Progress is merged
//! monotonically (`MAX(progress, ?)`) so a delayed or out-of-order
//! notification can never roll it backward.

use chrono::Utc;
use forge_common::db::models::GenerationTask;
use forge_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn hydrate(row: &sqlx::sqlite::SqliteRow) -> Result<GenerationTask> {
    let asset_id: String = row.get("asset_id");
    let asset_id = Uuid::parse_str(&asset_id)
        .map_err(|e| Error::Internal(format!("Failed to parse asset_id: {e}")))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {e}")))?
        .with_timezone(&Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {e}")))?
        .with_timezone(&Utc);

    Ok(GenerationTask {
        task_id: row.get("task_id"),
        asset_id,
        status: row.get("status"),
        progress: row.get("progress"),
        result_url: row.get("result_url"),
        error_message: row.get("error_message"),
        created_at,
        updated_at,
    })
}

/// Insert a fresh task row for a newly created external job.
pub async fn insert(pool: &SqlitePool, task: &GenerationTask) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO generation_tasks (
            task_id, asset_id, status, progress, result_url, error_message,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.task_id)
    .bind(task.asset_id.to_string())
    .bind(&task.status)
    .bind(task.progress)
    .bind(&task.result_url)
    .bind(&task.error_message)
    .bind(task.created_at.to_rfc3339())
    .bind(task.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a task by its provider-native id.
pub async fn get(pool: &SqlitePool, task_id: &str) -> Result<Option<GenerationTask>> {
    let row = sqlx::query(
        "SELECT task_id, asset_id, status, progress, result_url, error_message, \
         created_at, updated_at FROM generation_tasks WHERE task_id = ?",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(hydrate).transpose()
}

/// Merge an in-progress observation: record the provider status string
/// for observability and raise progress monotonically.
pub async fn merge_progress(
    pool: &SqlitePool,
    task_id: &str,
    status: &str,
    progress: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE generation_tasks SET status = ?, progress = MAX(progress, ?), updated_at = ? \
         WHERE task_id = ?",
    )
    .bind(status)
    .bind(progress.clamp(0, 100))
    .bind(Utc::now().to_rfc3339())
    .bind(task_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a succeeded job: terminal status string, full progress, and the
/// primary result reference.
pub async fn record_success(
    pool: &SqlitePool,
    task_id: &str,
    status: &str,
    result_url: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE generation_tasks SET status = ?, progress = 100, result_url = ?, updated_at = ? \
         WHERE task_id = ?",
    )
    .bind(status)
    .bind(result_url)
    .bind(Utc::now().to_rfc3339())
    .bind(task_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a failed job with the provider's error detail.
pub async fn record_failure(
    pool: &SqlitePool,
    task_id: &str,
    status: &str,
    error_message: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE generation_tasks SET status = ?, error_message = ?, updated_at = ? \
         WHERE task_id = ?",
    )
    .bind(status)
    .bind(error_message)
    .bind(Utc::now().to_rfc3339())
    .bind(task_id)
    .execute(pool)
    .await?;

    Ok(())
}
