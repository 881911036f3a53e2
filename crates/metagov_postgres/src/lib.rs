//! PostgreSQL adapter for the local metadata store.

pub mod sqlx_types;
pub mod store;

pub use store::PgLocalStore;

/// Schema for every entity table. Idempotent.
pub const SCHEMA_SQL: &str = include_str!("../migrations/001_metadata_tables.sql");
