//! Service layer: storage, providers, lineage, tier orchestration, and
//! task reconciliation

pub mod lineage;
pub mod providers;
pub mod reconciler;
pub mod storage;
pub mod tiers;

pub use lineage::{resolve_lineage, LineageChain};
pub use reconciler::{ReconcileOutcome, TaskObservation, TaskReconciler};
pub use storage::{Storage, StorageTier};
pub use tiers::TierController;
