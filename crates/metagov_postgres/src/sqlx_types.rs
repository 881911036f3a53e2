//! Row types and their conversion into core entities.

use chrono::{DateTime, Utc};
use metagov_core::sync_status::SyncStatus;
use metagov_core::types::{Entity, EntityBody, EntityKind, LocalId, OwnershipRecord};
use metagov_core::urn::Urn;
use serde_json::Value;

/// One row of any `metadata_*` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgEntityRow {
    pub id: i64,
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
    pub owners: Value,
    pub attributes: Value,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl PgEntityRow {
    /// Decode into an `Entity`, checking the stored body matches `kind`.
    pub fn into_entity(self, kind: EntityKind) -> Result<Entity, String> {
        let urn = Urn::parse(&self.urn).map_err(|e| format!("row {}: {e}", self.id))?;
        let owners: Vec<OwnershipRecord> = serde_json::from_value(self.owners)
            .map_err(|e| format!("row {} owners: {e}", self.id))?;
        let body: EntityBody = serde_json::from_value(self.attributes)
            .map_err(|e| format!("row {} attributes: {e}", self.id))?;
        if body.kind() != kind {
            return Err(format!(
                "row {} holds a {} body in the {kind} table",
                self.id,
                body.kind()
            ));
        }
        let sync_status = SyncStatus::parse(&self.sync_status)
            .ok_or_else(|| format!("row {} has unknown status {:?}", self.id, self.sync_status))?;

        Ok(Entity {
            urn,
            local_id: Some(LocalId(self.id)),
            name: self.name,
            description: self.description,
            owners,
            body,
            sync_status,
            last_synced_at: self.last_synced_at,
        })
    }
}

/// Column values for an insert or update.
pub struct PgEntityParams {
    pub urn: String,
    pub name: String,
    pub description: Option<String>,
    pub owners: Value,
    pub attributes: Value,
    pub sync_status: &'static str,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<&Entity> for PgEntityParams {
    type Error = serde_json::Error;

    fn try_from(e: &Entity) -> Result<Self, Self::Error> {
        Ok(Self {
            urn: e.urn.as_str().to_string(),
            name: e.display_name().to_string(),
            description: e.description.clone(),
            owners: serde_json::to_value(&e.owners)?,
            attributes: serde_json::to_value(&e.body)?,
            sync_status: e.sync_status.as_str(),
            last_synced_at: e.last_synced_at,
        })
    }
}
