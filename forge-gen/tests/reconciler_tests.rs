//! Reconciler behavior under replays, races, stale data, and partial
//! failure.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use forge_common::db::models::AssetStatus;
use forge_gen::db::{assets, tasks};
use forge_gen::services::reconciler::ReconcileOutcome;
use forge_gen::services::StorageTier;
use helpers::*;

#[tokio::test]
async fn progress_is_monotonic_under_out_of_order_updates() {
    let ctx = setup().await;
    seed_final_model_task(&ctx, "task-mono").await;

    let outcome = ctx.reconciler.reconcile(progress_observation("task-mono", 10)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InProgress { progress: 10 });

    let outcome = ctx.reconciler.reconcile(progress_observation("task-mono", 45)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InProgress { progress: 45 });

    // A delayed notification with stale progress must not roll back
    let outcome = ctx.reconciler.reconcile(progress_observation("task-mono", 30)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InProgress { progress: 45 });

    let task = tasks::get(&ctx.db, "task-mono").await.unwrap().unwrap();
    assert_eq!(task.progress, 45);
}

#[tokio::test]
async fn succeeded_reconcile_is_idempotent() {
    let ctx = setup().await;
    let asset_id = seed_final_model_task(&ctx, "task-idem").await;

    let outcome = ctx.reconciler.reconcile(succeeded_observation("task-idem")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Completed);
    assert_eq!(ctx.model_client.fetches(), 3);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Completed);
    assert_eq!(asset.obj_path.as_deref(), Some("task-idem.obj"));
    assert_eq!(asset.fbx_path.as_deref(), Some("task-idem.fbx"));
    assert_eq!(asset.texture_path.as_deref(), Some("task-idem_texture.png"));

    // Replaying the identical payload is a no-op with zero new downloads
    let outcome = ctx.reconciler.reconcile(succeeded_observation("task-idem")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyTerminal);
    assert_eq!(ctx.model_client.fetches(), 3);

    let after = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(after.status, AssetStatus::Completed);
    assert_eq!(after.obj_path, asset.obj_path);
}

#[tokio::test]
async fn poll_and_webhook_race_commits_exactly_once() {
    // Slow artifact fetches widen the race window
    let client = Arc::new(FakeModelClient::with_fetch_delay(Duration::from_millis(50)));
    let ctx = setup_with_model_client(client).await;
    let asset_id = seed_final_model_task(&ctx, "task-race").await;

    let (first, second) = tokio::join!(
        ctx.reconciler.reconcile(succeeded_observation("task-race")),
        ctx.reconciler.reconcile(succeeded_observation("task-race")),
    );
    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|o| o.label());

    assert_eq!(outcomes, vec![ReconcileOutcome::AlreadyTerminal, ReconcileOutcome::Completed]);

    // Exactly one set of downloads and one terminal transition
    assert_eq!(ctx.model_client.fetches(), 3);
    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Completed);
    assert!(ctx.storage.read(StorageTier::Models, "task-race.obj").await.is_ok());
}

#[tokio::test]
async fn failed_asset_never_regresses_on_late_success() {
    let ctx = setup().await;
    let asset_id = seed_final_model_task(&ctx, "task-final").await;

    let outcome = ctx
        .reconciler
        .reconcile(failed_observation("task-final", "provider exploded"))
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Failed);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Failed);
    assert_eq!(asset.error_detail.as_deref(), Some("provider exploded"));
    let task = tasks::get(&ctx.db, "task-final").await.unwrap().unwrap();
    assert_eq!(task.error_message.as_deref(), Some("provider exploded"));

    // A late success must be discarded, with zero artifact fetches
    let outcome = ctx.reconciler.reconcile(succeeded_observation("task-final")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyTerminal);
    assert_eq!(ctx.model_client.fetches(), 0);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Failed);
}

#[tokio::test]
async fn unknown_task_is_acknowledged_without_state_change() {
    let ctx = setup().await;

    let outcome = ctx.reconciler.reconcile(succeeded_observation("ghost-task")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::UnknownTask);

    assert_eq!(row_count(&ctx.db, "assets").await, 0);
    assert_eq!(row_count(&ctx.db, "generation_tasks").await, 0);
    assert_eq!(ctx.model_client.fetches(), 0);
}

#[tokio::test]
async fn unrecognized_status_is_treated_as_in_progress() {
    let ctx = setup().await;
    let asset_id = seed_final_model_task(&ctx, "task-weird").await;

    let mut observation = progress_observation("task-weird", 55);
    observation.status = "SOME_NEW_PROVIDER_STATE".to_string();

    let outcome = ctx.reconciler.reconcile(observation).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InProgress { progress: 55 });

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Processing);
    let task = tasks::get(&ctx.db, "task-weird").await.unwrap().unwrap();
    assert_eq!(task.status, "SOME_NEW_PROVIDER_STATE");
}

#[tokio::test]
async fn fetch_failure_leaves_asset_processing_for_retry() {
    let ctx = setup().await;
    let asset_id = seed_final_model_task(&ctx, "task-retry").await;

    ctx.model_client.fail_fetches.store(true, Ordering::SeqCst);
    let outcome = ctx.reconciler.reconcile(succeeded_observation("task-retry")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::RetryLater);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Processing, "no partial completion");
    assert!(asset.obj_path.is_none());

    // The next delivery completes the job (at-least-once materialization)
    ctx.model_client.fail_fetches.store(false, Ordering::SeqCst);
    let outcome = ctx.reconciler.reconcile(succeeded_observation("task-retry")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Completed);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Completed);
}

#[tokio::test]
async fn success_without_result_payload_waits_for_urls() {
    let ctx = setup().await;
    let asset_id = seed_final_model_task(&ctx, "task-terse").await;

    let mut observation = succeeded_observation("task-terse");
    observation.result = None;

    let outcome = ctx.reconciler.reconcile(observation).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::RetryLater);

    let asset = assets::get(&ctx.db, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Processing);
    let task = tasks::get(&ctx.db, "task-terse").await.unwrap().unwrap();
    assert_eq!(task.progress, 100);
}
