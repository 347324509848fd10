//! Database access layer: initialization, schema, and entity models

pub mod init;
pub mod models;

pub use init::init_database;
pub use models::{AssetRecord, AssetStatus, AssetType, GenerationTask};
