pub mod actions;
pub mod bulk;
pub mod entities;
pub mod health;
pub mod listing;
pub mod staging;

use metagov_core::error::GovError;
use metagov_core::types::EntityKind;

/// Resolve the `/{kind}/` path segment.
pub(crate) fn parse_kind(segment: &str) -> Result<EntityKind, GovError> {
    EntityKind::from_path_segment(segment)
        .ok_or_else(|| GovError::NotFound(format!("unknown entity kind {segment:?}")))
}
