//! Tier controller behavior: fallback guarantee, preconditions, prompt
//! audit contract, and conflict rejection.

mod helpers;

use forge_common::db::models::{AssetRecord, AssetStatus, AssetType};
use forge_common::Error;
use forge_gen::db::{assets, tasks};
use forge_gen::services::StorageTier;
use helpers::*;
use uuid::Uuid;

#[tokio::test]
async fn failing_primary_still_completes_via_fallback() {
    let ctx = setup().await;

    // The primary generator in the test chain always fails
    let record = ctx.tiers.generate_concept("a red sword", None).await.unwrap();

    assert_eq!(record.status, AssetStatus::Completed);
    assert_eq!(record.asset_type, AssetType::Image2d);
    let image_path = record.image_path.expect("completed concept must carry an image");
    assert!(ctx.storage.read(StorageTier::Images, &image_path).await.is_ok());
    assert!(record.remote_image_url.is_some(), "stored concepts are externally reachable");
}

#[tokio::test]
async fn empty_prompt_is_rejected_without_creating_rows() {
    let ctx = setup().await;

    let err = ctx.tiers.generate_concept("   ", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(row_count(&ctx.db, "assets").await, 0);
}

#[tokio::test]
async fn refinement_concatenates_prompts_and_links_parent() {
    let ctx = setup().await;

    let source = ctx.tiers.generate_concept("a red sword", None).await.unwrap();
    let refined = ctx.tiers.refine_concept(source.guid, "make it bigger").await.unwrap();

    assert_eq!(refined.parent_id, Some(source.guid));
    assert_eq!(refined.prompt.as_deref(), Some("a red sword\n\nRefinement: make it bigger"));
    assert!(refined.name.starts_with("Refined - "));
    assert_eq!(refined.status, AssetStatus::Completed);
}

#[tokio::test]
async fn refining_a_missing_image_is_not_found() {
    let ctx = setup().await;

    let err = ctx.tiers.refine_concept(Uuid::new_v4(), "anything").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(row_count(&ctx.db, "assets").await, 0);
}

#[tokio::test]
async fn prototype_generation_attaches_mesh_and_preview() {
    let ctx = setup().await;

    let source = ctx.tiers.generate_concept("a blue orb", None).await.unwrap();
    let prototype = ctx.tiers.generate_prototype(source.guid).await.unwrap();

    assert_eq!(prototype.asset_type, AssetType::Prototype);
    assert_eq!(prototype.status, AssetStatus::Completed);
    assert_eq!(prototype.parent_id, Some(source.guid));

    let obj = ctx
        .storage
        .read(StorageTier::Prototypes, prototype.obj_path.as_deref().unwrap())
        .await
        .unwrap();
    assert!(String::from_utf8(obj).unwrap().contains("\nv "));
    assert!(prototype.gif_path.is_some());
}

#[tokio::test]
async fn prototype_from_missing_source_is_not_found() {
    let ctx = setup().await;

    let err = ctx.tiers.generate_prototype(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(row_count(&ctx.db, "assets").await, 0);
}

#[tokio::test]
async fn duplicate_in_flight_prototype_is_a_conflict() {
    let ctx = setup().await;

    let source = ctx.tiers.generate_concept("a wooden crate", None).await.unwrap();

    // Another prototype for the same parent is still processing
    let in_flight = AssetRecord::new(
        "Prototype - in flight".to_string(),
        None,
        AssetType::Prototype,
        AssetStatus::Processing,
        Some(source.guid),
    );
    assets::insert(&ctx.db, &in_flight).await.unwrap();

    let err = ctx.tiers.generate_prototype(source.guid).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn final_model_job_creation_returns_immediately() {
    let ctx = setup().await;

    let source = ctx.tiers.generate_concept("a golden shield", None).await.unwrap();
    let prototype = ctx.tiers.generate_prototype(source.guid).await.unwrap();

    let (record, task) = ctx.tiers.generate_final_model(prototype.guid).await.unwrap();

    // Fire-and-forget: the asset is still processing, the task is queued
    assert_eq!(record.asset_type, AssetType::FinalModel);
    assert_eq!(record.status, AssetStatus::Processing);
    assert_eq!(record.parent_id, Some(prototype.guid));
    assert_eq!(record.task_id.as_deref(), Some(task.task_id.as_str()));

    let stored = tasks::get(&ctx.db, &task.task_id).await.unwrap().unwrap();
    assert_eq!(stored.asset_id, record.guid);
    assert_eq!(stored.progress, 0);
}

#[tokio::test]
async fn final_model_against_missing_prototype_creates_nothing() {
    let ctx = setup().await;

    let err = ctx.tiers.generate_final_model(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(row_count(&ctx.db, "assets").await, 0);
    assert_eq!(row_count(&ctx.db, "generation_tasks").await, 0);
}

#[tokio::test]
async fn final_model_against_wrong_type_creates_nothing() {
    let ctx = setup().await;

    let image = ctx.tiers.generate_concept("a silver coin", None).await.unwrap();
    let before = row_count(&ctx.db, "assets").await;

    // A 2D image is not a prototype
    let err = ctx.tiers.generate_final_model(image.guid).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(row_count(&ctx.db, "assets").await, before);
    assert_eq!(row_count(&ctx.db, "generation_tasks").await, 0);
}

#[tokio::test]
async fn final_model_requires_reachable_source_image() {
    let ctx = setup().await;

    // Hand-build a lineage whose 2D image has no external URL
    let image = AssetRecord::new(
        "2D Concept - opaque".to_string(),
        Some("opaque".to_string()),
        AssetType::Image2d,
        AssetStatus::Completed,
        None,
    );
    assets::insert(&ctx.db, &image).await.unwrap();

    let prototype = AssetRecord::new(
        "Prototype - opaque".to_string(),
        None,
        AssetType::Prototype,
        AssetStatus::Completed,
        Some(image.guid),
    );
    assets::insert(&ctx.db, &prototype).await.unwrap();

    let before = row_count(&ctx.db, "assets").await;
    let err = ctx.tiers.generate_final_model(prototype.guid).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // Fail fast: no partial state
    assert_eq!(row_count(&ctx.db, "assets").await, before);
    assert_eq!(row_count(&ctx.db, "generation_tasks").await, 0);
    assert_eq!(ctx.model_client.created_jobs.load(std::sync::atomic::Ordering::SeqCst), 0);
}
