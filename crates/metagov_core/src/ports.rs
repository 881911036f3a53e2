//! Port traits. Implemented by `metagov_postgres` (local store) and
//! `metagov_client` (remote backend); core logic depends only on these.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GovError;
use crate::types::{Entity, EntityKind, LocalId};
use crate::urn::Urn;

pub type Result<T> = std::result::Result<T, GovError>;

/// Outcome of a delete. Deleting something already gone is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Local relational copy, one table per entity kind.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All rows of a kind.
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    async fn get(&self, kind: EntityKind, id: LocalId) -> Result<Option<Entity>>;

    async fn find_by_urn(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>>;

    /// Insert a new row. Returns it with `local_id` assigned.
    /// A row with the same URN already present is a `Conflict`.
    async fn insert(&self, entity: &Entity) -> Result<Entity>;

    /// Overwrite an existing row identified by `entity.local_id`.
    async fn update(&self, entity: &Entity) -> Result<Entity>;

    async fn delete(&self, kind: EntityKind, id: LocalId) -> Result<DeleteOutcome>;
}

/// The governance server, reached over its GraphQL API.
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    async fn get(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>>;

    /// Create or update the remote entity from local state.
    async fn upsert(&self, entity: &Entity) -> Result<Urn>;

    async fn delete(&self, kind: EntityKind, urn: &Urn) -> Result<DeleteOutcome>;
}
