//! Domain database operations for the generation service

pub mod assets;
pub mod tasks;
