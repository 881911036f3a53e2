//! metagov_server: REST surface over `SyncService`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
