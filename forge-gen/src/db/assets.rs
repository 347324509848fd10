//! Asset record database operations
//!
//! All writes are single-statement updates; terminal transitions are
//! guarded compare-and-swap updates (`WHERE status IN
//! ('pending','processing')`) whose row count tells the caller whether it
//! won the transition. No read-modify-write gap is visible to a
//! concurrent reconciler.

use chrono::Utc;
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType};
use forge_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Optional filters for listing assets.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
}

const SELECT_COLUMNS: &str = "guid, name, prompt, asset_type, status, \
     image_path, gif_path, obj_path, fbx_path, texture_path, \
     parent_id, remote_image_url, task_id, error_detail, created_at, updated_at";

fn hydrate(row: &sqlx::sqlite::SqliteRow) -> Result<AssetRecord> {
    let guid: String = row.get("guid");
    let guid = Uuid::parse_str(&guid)
        .map_err(|e| Error::Internal(format!("Failed to parse asset guid: {e}")))?;

    let parent_id: Option<String> = row.get("parent_id");
    let parent_id = parent_id
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse parent_id: {e}")))?;

    let asset_type: String = row.get("asset_type");
    let asset_type = AssetType::parse(&asset_type)
        .ok_or_else(|| Error::Internal(format!("Unknown asset_type: {asset_type}")))?;

    let status: String = row.get("status");
    let status = AssetStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown status: {status}")))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {e}")))?
        .with_timezone(&Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {e}")))?
        .with_timezone(&Utc);

    Ok(AssetRecord {
        guid,
        name: row.get("name"),
        prompt: row.get("prompt"),
        asset_type,
        status,
        image_path: row.get("image_path"),
        gif_path: row.get("gif_path"),
        obj_path: row.get("obj_path"),
        fbx_path: row.get("fbx_path"),
        texture_path: row.get("texture_path"),
        parent_id,
        remote_image_url: row.get("remote_image_url"),
        task_id: row.get("task_id"),
        error_detail: row.get("error_detail"),
        created_at,
        updated_at,
    })
}

/// Insert a new asset record.
pub async fn insert(pool: &SqlitePool, record: &AssetRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assets (
            guid, name, prompt, asset_type, status,
            image_path, gif_path, obj_path, fbx_path, texture_path,
            parent_id, remote_image_url, task_id, error_detail,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.guid.to_string())
    .bind(&record.name)
    .bind(&record.prompt)
    .bind(record.asset_type.as_str())
    .bind(record.status.as_str())
    .bind(&record.image_path)
    .bind(&record.gif_path)
    .bind(&record.obj_path)
    .bind(&record.fbx_path)
    .bind(&record.texture_path)
    .bind(record.parent_id.map(|id| id.to_string()))
    .bind(&record.remote_image_url)
    .bind(&record.task_id)
    .bind(&record.error_detail)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one asset by id.
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<AssetRecord>> {
    let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM assets WHERE guid = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(hydrate).transpose()
}

/// Load one asset by id, requiring a specific type.
pub async fn get_typed(
    pool: &SqlitePool,
    id: Uuid,
    asset_type: AssetType,
) -> Result<Option<AssetRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM assets WHERE guid = ? AND asset_type = ?"
    ))
    .bind(id.to_string())
    .bind(asset_type.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(hydrate).transpose()
}

/// List assets newest-first with optional filters; returns the page and
/// the total row count for the filter.
pub async fn list(
    pool: &SqlitePool,
    filter: &AssetFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AssetRecord>, i64)> {
    let mut where_clause = String::from("WHERE 1 = 1");
    if filter.asset_type.is_some() {
        where_clause.push_str(" AND asset_type = ?");
    }
    if filter.status.is_some() {
        where_clause.push_str(" AND status = ?");
    }

    let total_sql = format!("SELECT COUNT(*) FROM assets {where_clause}");
    let mut total_query = sqlx::query_scalar::<_, i64>(&total_sql);
    if let Some(asset_type) = filter.asset_type {
        total_query = total_query.bind(asset_type.as_str());
    }
    if let Some(status) = filter.status {
        total_query = total_query.bind(status.as_str());
    }
    let total = total_query.fetch_one(pool).await?;

    let page_sql = format!(
        "SELECT {SELECT_COLUMNS} FROM assets {where_clause} \
         ORDER BY created_at DESC, guid DESC LIMIT ? OFFSET ?"
    );
    let mut page_query = sqlx::query(&page_sql);
    if let Some(asset_type) = filter.asset_type {
        page_query = page_query.bind(asset_type.as_str());
    }
    if let Some(status) = filter.status {
        page_query = page_query.bind(status.as_str());
    }
    let rows = page_query.bind(limit).bind(offset).fetch_all(pool).await?;

    let items = rows.iter().map(hydrate).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

/// All direct children of an asset, oldest first (lineage order).
pub async fn children(pool: &SqlitePool, parent_id: Uuid) -> Result<Vec<AssetRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM assets WHERE parent_id = ? \
         ORDER BY created_at ASC, guid ASC"
    ))
    .bind(parent_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(hydrate).collect()
}

/// Whether another child of the given type is still in flight for this
/// parent. Used to reject duplicate concurrent submissions.
pub async fn has_processing_child(
    pool: &SqlitePool,
    parent_id: Uuid,
    asset_type: AssetType,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM assets \
         WHERE parent_id = ? AND asset_type = ? AND status = 'processing'",
    )
    .bind(parent_id.to_string())
    .bind(asset_type.as_str())
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Rename an asset (gallery save). Returns false when the row is missing.
pub async fn rename(pool: &SqlitePool, id: Uuid, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE assets SET name = ?, updated_at = ? WHERE guid = ?")
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Record the external task id on the asset once the job is accepted.
pub async fn set_task_id(pool: &SqlitePool, id: Uuid, task_id: &str) -> Result<()> {
    sqlx::query("UPDATE assets SET task_id = ?, updated_at = ? WHERE guid = ?")
        .bind(task_id)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Complete a 2D concept: attach the image and flip to completed.
/// Returns false when the row was already terminal.
pub async fn mark_image_completed(
    pool: &SqlitePool,
    id: Uuid,
    image_path: &str,
    remote_image_url: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE assets SET status = 'completed', image_path = ?, remote_image_url = ?, \
         updated_at = ? WHERE guid = ? AND status IN ('pending', 'processing')",
    )
    .bind(image_path)
    .bind(remote_image_url)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Complete a prototype: attach mesh + preview and flip to completed.
pub async fn mark_prototype_completed(
    pool: &SqlitePool,
    id: Uuid,
    obj_path: &str,
    gif_path: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE assets SET status = 'completed', obj_path = ?, gif_path = ?, \
         updated_at = ? WHERE guid = ? AND status IN ('pending', 'processing')",
    )
    .bind(obj_path)
    .bind(gif_path)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Complete a final model: attach whichever files the job produced and
/// flip to completed.
pub async fn mark_model_completed(
    pool: &SqlitePool,
    id: Uuid,
    obj_path: Option<&str>,
    fbx_path: Option<&str>,
    texture_path: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE assets SET status = 'completed', obj_path = ?, fbx_path = ?, texture_path = ?, \
         updated_at = ? WHERE guid = ? AND status IN ('pending', 'processing')",
    )
    .bind(obj_path)
    .bind(fbx_path)
    .bind(texture_path)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Flip an asset to failed with a detail message. Returns false when the
/// row was already terminal; terminal states never regress.
pub async fn mark_failed(pool: &SqlitePool, id: Uuid, detail: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE assets SET status = 'failed', error_detail = ?, updated_at = ? \
         WHERE guid = ? AND status IN ('pending', 'processing')",
    )
    .bind(detail)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an asset row (task rows cascade). Returns false when missing.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM assets WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Row counts grouped by asset type.
pub async fn counts_by_type(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query("SELECT asset_type, COUNT(*) AS n FROM assets GROUP BY asset_type")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| (r.get("asset_type"), r.get("n"))).collect())
}

/// Row counts grouped by status.
pub async fn counts_by_status(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM assets GROUP BY status")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| (r.get("status"), r.get("n"))).collect())
}
