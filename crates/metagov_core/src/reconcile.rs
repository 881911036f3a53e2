//! Three-way reconciliation of local against remote records.
//!
//! Records are matched by URN. Present on both sides → `synced` bucket with a
//! field-level diff (SYNCED when empty, MODIFIED otherwise); local only →
//! `local_only`; remote only → `remote_only`. Pure: nothing is persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sync_status::SyncStatus;
use crate::types::{Entity, EntityBody};
use crate::urn::Urn;

/// One tracked field whose local and remote values differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub local: Value,
    pub remote: Value,
}

/// Merged view of an entity present on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedEntity {
    pub urn: Urn,
    pub local: Entity,
    pub remote: Entity,
    pub sync_status: SyncStatus,
    pub differences: Vec<FieldDiff>,
}

impl CombinedEntity {
    pub fn display_name(&self) -> &str {
        self.local.display_name()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub synced: Vec<CombinedEntity>,
    pub local_only: Vec<Entity>,
    pub remote_only: Vec<Entity>,
}

impl Reconciliation {
    pub fn len(&self) -> usize {
        self.synced.len() + self.local_only.len() + self.remote_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `local` and `remote` records of one kind into the three buckets.
pub fn reconcile(local: Vec<Entity>, remote: Vec<Entity>) -> Reconciliation {
    let local = index_by_urn(local, "local");
    let mut remote = index_by_urn(remote, "remote");

    let mut out = Reconciliation::default();
    for (urn, mut local_entity) in local {
        match remote.remove(&urn) {
            Some(mut remote_entity) => {
                remote_entity.local_id = None;
                remote_entity.sync_status = SyncStatus::RemoteOnly;
                let differences = diff_entities(&local_entity, &remote_entity);
                let sync_status = if differences.is_empty() {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Modified
                };
                local_entity.sync_status = sync_status;
                out.synced.push(CombinedEntity {
                    urn,
                    local: local_entity,
                    remote: remote_entity,
                    sync_status,
                    differences,
                });
            }
            None => {
                local_entity.sync_status = SyncStatus::LocalOnly;
                out.local_only.push(local_entity);
            }
        }
    }
    out.remote_only = remote
        .into_values()
        .map(|mut e| {
            e.local_id = None;
            e.sync_status = SyncStatus::RemoteOnly;
            e
        })
        .collect();

    tracing::debug!(
        synced = out.synced.len(),
        local_only = out.local_only.len(),
        remote_only = out.remote_only.len(),
        "reconciled"
    );
    out
}

fn index_by_urn(entities: Vec<Entity>, side: &str) -> BTreeMap<Urn, Entity> {
    let mut index = BTreeMap::new();
    for entity in entities {
        if index.contains_key(&entity.urn) {
            tracing::warn!(urn = %entity.urn, side, "duplicate urn dropped");
            continue;
        }
        index.insert(entity.urn.clone(), entity);
    }
    index
}

/// Compare tracked fields of two records of the same entity.
pub fn diff_entities(local: &Entity, remote: &Entity) -> Vec<FieldDiff> {
    let remote_fields: BTreeMap<&'static str, Value> = tracked_fields(remote).into_iter().collect();
    let mut diffs: Vec<FieldDiff> = tracked_fields(local)
        .into_iter()
        .filter_map(|(field, local_value)| {
            let remote_value = remote_fields.get(field).cloned().unwrap_or(Value::Null);
            (local_value != remote_value).then(|| FieldDiff {
                field: field.to_string(),
                local: local_value,
                remote: remote_value,
            })
        })
        .collect();

    if local.kind() != remote.kind() {
        diffs.push(FieldDiff {
            field: "kind".into(),
            local: json!(local.kind()),
            remote: json!(remote.kind()),
        });
    }
    diffs
}

/// Canonical values of the fields that decide SYNCED vs MODIFIED.
///
/// Blank descriptions equal absent ones, colors compare case-insensitively,
/// and list-valued fields compare as sets.
pub fn tracked_fields(entity: &Entity) -> Vec<(&'static str, Value)> {
    let mut owners: Vec<String> = entity
        .owners
        .iter()
        .map(|o| format!("{}|{}", o.owner_urn, o.ownership_type_urn))
        .collect();
    owners.sort();
    owners.dedup();

    let mut fields = vec![
        ("name", json!(entity.display_name())),
        ("description", json!(blank_to_none(entity.description.as_deref()))),
    ];
    if entity.kind().syncs_owners() {
        fields.push(("owners", json!(owners)));
    }

    match &entity.body {
        EntityBody::Tag(a) => {
            let color = blank_to_none(a.color_hex.as_deref()).map(|c| c.to_ascii_lowercase());
            fields.push(("color_hex", json!(color)));
        }
        EntityBody::Domain(a) => fields.push(("parent_domain", json!(a.parent_domain))),
        EntityBody::GlossaryNode(a) => fields.push(("parent_node", json!(a.parent_node))),
        EntityBody::GlossaryTerm(a) => {
            fields.push(("parent_node", json!(a.parent_node)));
            fields.push(("term_source", json!(blank_to_none(a.term_source.as_deref()))));
            fields.push(("source_ref", json!(blank_to_none(a.source_ref.as_deref()))));
            fields.push(("source_url", json!(blank_to_none(a.source_url.as_deref()))));
        }
        EntityBody::StructuredProperty(a) => {
            let mut allowed: Vec<String> = a
                .allowed_values
                .iter()
                .map(|v| {
                    let desc = blank_to_none(v.description.as_deref()).unwrap_or_default();
                    format!("{}|{}", v.value.canonical(), desc)
                })
                .collect();
            allowed.sort();
            let mut entity_types: Vec<&str> = a.entity_types.iter().map(Urn::as_str).collect();
            entity_types.sort_unstable();
            entity_types.dedup();

            fields.push(("qualified_name", json!(a.qualified_name.trim())));
            fields.push(("value_type", json!(a.value_type)));
            fields.push(("cardinality", json!(a.cardinality)));
            fields.push(("allowed_values", json!(allowed)));
            fields.push(("entity_types", json!(entity_types)));
            fields.push(("immutable", json!(a.immutable)));
        }
    }
    fields
}

fn blank_to_none(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
