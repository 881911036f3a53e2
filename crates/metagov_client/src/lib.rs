//! Remote side of the sync: a `MetadataBackend` that speaks the governance
//! server's GraphQL API over HTTP.
//!
//! The server depends on this crate for its backend; core logic never does.

pub mod config;
pub mod graphql;
pub mod http;

pub use config::BackendConfig;
pub use http::GraphQlBackend;
