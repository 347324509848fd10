//! Lineage resolution
//!
//! Reconstructs the full refinement chain for any asset: walk parent
//! pointers up to the root, then flatten the whole tree depth-first with
//! children in creation order. The walk is cycle-guarded so it terminates
//! even over a malformed store (self-parenting included).

use crate::db::assets;
use forge_common::db::models::AssetRecord;
use forge_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// Ordered version history for one refinement tree.
#[derive(Debug, Clone)]
pub struct LineageChain {
    pub root_id: Uuid,
    pub requested_id: Uuid,
    /// Depth-first, children by ascending creation time; the root is
    /// always first
    pub history: Vec<AssetRecord>,
    pub version_count: usize,
}

/// Resolve the lineage chain containing `id`.
pub async fn resolve_lineage(pool: &SqlitePool, id: Uuid) -> Result<LineageChain> {
    let requested = assets::get(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {id}")))?;

    // Walk up to the root, guarding against cycles
    let mut visited = HashSet::new();
    visited.insert(requested.guid);
    let mut root = requested;
    while let Some(parent_id) = root.parent_id {
        if !visited.insert(parent_id) {
            warn!(asset_id = %root.guid, parent_id = %parent_id, "lineage cycle detected, treating current node as root");
            break;
        }
        match assets::get(pool, parent_id).await? {
            Some(parent) => root = parent,
            None => {
                // Dangling pointer: recoverable data-integrity warning
                warn!(asset_id = %root.guid, parent_id = %parent_id, "dangling parent pointer, treating current node as root");
                break;
            }
        }
    }

    // Depth-first flatten from the root; children are fetched in
    // ascending creation order and pushed in reverse so the stack pops
    // them oldest-first
    let root_id = root.guid;
    let mut seen = HashSet::new();
    let mut history = Vec::new();
    let mut stack = vec![root];
    while let Some(record) = stack.pop() {
        if !seen.insert(record.guid) {
            warn!(asset_id = %record.guid, "repeated node in lineage tree, skipping");
            continue;
        }
        let guid = record.guid;
        history.push(record);
        let mut child_rows = assets::children(pool, guid).await?;
        child_rows.reverse();
        stack.extend(child_rows);
    }

    let version_count = history.len();
    Ok(LineageChain { root_id, requested_id: id, history, version_count })
}
