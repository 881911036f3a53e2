//! metagov_core: pure domain logic for metadata governance sync.
//!
//! Entity types, the three-way reconciler, staged-change (MCP) generation and
//! the port traits implemented by `metagov_client` (remote backend) and
//! `metagov_postgres` (local store). No HTTP, no sqlx.

pub mod bulk;
pub mod error;
pub mod listing;
pub mod memory;
pub mod normalize;
pub mod ports;
pub mod proto;
pub mod reconcile;
pub mod service;
pub mod staging;
pub mod sync_status;
pub mod types;
pub mod urn;
