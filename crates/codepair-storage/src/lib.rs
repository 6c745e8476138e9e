// Postgres storage layer with sqlx
//
// This crate provides the database side of codepair:
// - Database: repository methods for catalog, sessions, model configs and runs
// - DbPipelineStore: implements the core PipelineStore trait for the run pipeline

pub mod models;
pub mod pipeline_store;
pub mod repositories;

pub use models::*;
pub use pipeline_store::{create_db_pipeline_store, DbPipelineStore};
pub use repositories::*;
