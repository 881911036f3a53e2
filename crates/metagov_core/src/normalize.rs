//! Ingestion-time normalization.
//!
//! Callers hand us entity payloads in several shapes: flat form posts, the
//! combined `{local, remote}` view, and raw GraphQL objects with nested
//! `properties` / `definition` blocks. Everything is turned into canonical
//! types here, once, so the rest of the crate never re-derives identifiers.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::GovError;
use crate::sync_status::SyncStatus;
use crate::types::*;
use crate::urn::{Urn, URN_PREFIX};

/// Fallback value type for structured properties that do not declare one.
pub const DEFAULT_VALUE_TYPE: &str = "urn:li:dataType:datahub.string";

// ── EntityRef ─────────────────────────────────────────────────

/// Target of an action: a local row or a remote URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Local(LocalId),
    Remote(Urn),
}

impl EntityRef {
    /// Parse a path segment. Digits are a local id, `urn:li:` is a URN,
    /// anything else is a missing identifier.
    pub fn parse(segment: &str) -> Result<Self, GovError> {
        let segment = segment.trim();
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            let id = segment
                .parse::<i64>()
                .map_err(|e| GovError::InvalidInput(format!("bad id {segment:?}: {e}")))?;
            return Ok(Self::Local(LocalId(id)));
        }
        if segment.starts_with(URN_PREFIX) {
            return Ok(Self::Remote(Urn::parse(segment)?));
        }
        Err(GovError::MissingId(format!(
            "expected a database id or urn, got {segment:?}"
        )))
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::Remote(urn) => write!(f, "{urn}"),
        }
    }
}

// ── Local id fallback chain ───────────────────────────────────

/// Resolve the local id from a loosely shaped payload:
/// `database_id` → `local.database_id` → `local.id` → `id`.
pub fn resolve_local_id(payload: &Value) -> Option<LocalId> {
    let local = payload.get("local");
    [
        payload.get("database_id"),
        local.and_then(|l| l.get("database_id")),
        local.and_then(|l| l.get("id")),
        payload.get("id"),
    ]
    .into_iter()
    .flatten()
    .find_map(as_local_id)
}

fn as_local_id(v: &Value) -> Option<LocalId> {
    match v {
        Value::Number(n) => n.as_i64().map(LocalId),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok().map(LocalId)
        }
        _ => None,
    }
}

// ── Payload → Entity ──────────────────────────────────────────

/// Build an `Entity` of `kind` from a raw payload.
pub fn entity_from_payload(kind: EntityKind, payload: &Value) -> Result<Entity, GovError> {
    let source = payload
        .get("remote")
        .filter(|v| v.is_object())
        .unwrap_or(payload);

    let urn = [source.get("urn"), payload.get("urn"), payload.pointer("/local/urn")]
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .ok_or_else(|| GovError::MissingId(format!("{kind} payload has no urn")))
        .and_then(Urn::parse)?;

    if let Some(urn_kind) = urn.kind() {
        if urn_kind != kind {
            return Err(GovError::InvalidInput(format!(
                "urn {urn} is a {urn_kind}, expected {kind}"
            )));
        }
    }

    let name = lookup_str(source, &["name", "displayName", "display_name"])
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| urn.display_name().to_string());

    let description = lookup_str(source, &["description", "definition"])
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let owners = dedup_owners(parse_owners(source));
    let body = parse_body(kind, source, &urn)?;
    let local_id = resolve_local_id(payload);

    let sync_status = lookup_str(payload, &["sync_status"])
        .and_then(|s| SyncStatus::parse(&s))
        .unwrap_or(if local_id.is_some() {
            SyncStatus::LocalOnly
        } else {
            SyncStatus::RemoteOnly
        });

    Ok(Entity {
        urn,
        local_id,
        name: name.trim().to_string(),
        description,
        owners,
        body,
        sync_status,
        last_synced_at: None,
    })
}

/// Reject drafts carrying the same allowed value twice.
pub fn check_allowed_values(values: &[AllowedValue]) -> Result<(), GovError> {
    let mut seen = HashSet::new();
    for v in values {
        if !seen.insert(v.value.canonical()) {
            return Err(GovError::InvalidInput(format!(
                "duplicate allowed value {:?}",
                v.value
            )));
        }
    }
    Ok(())
}

fn parse_body(kind: EntityKind, source: &Value, urn: &Urn) -> Result<EntityBody, GovError> {
    let body = match kind {
        EntityKind::Tag => EntityBody::Tag(TagAttrs {
            color_hex: lookup_str(source, &["color_hex", "colorHex"]).filter(|c| !c.is_empty()),
        }),
        EntityKind::Domain => EntityBody::Domain(DomainAttrs {
            parent_domain: lookup_urn(source, &["parent_domain", "parentDomain"])
                .or_else(|| first_urn_in(source, "/parentDomains/domains")),
        }),
        EntityKind::GlossaryNode => EntityBody::GlossaryNode(GlossaryNodeAttrs {
            parent_node: lookup_urn(source, &["parent_node", "parentNode"])
                .or_else(|| first_urn_in(source, "/parentNodes/nodes")),
        }),
        EntityKind::GlossaryTerm => EntityBody::GlossaryTerm(GlossaryTermAttrs {
            parent_node: lookup_urn(source, &["parent_node", "parentNode"])
                .or_else(|| first_urn_in(source, "/parentNodes/nodes")),
            term_source: lookup_str(source, &["term_source", "termSource"]),
            source_ref: lookup_str(source, &["source_ref", "sourceRef"]),
            source_url: lookup_str(source, &["source_url", "sourceUrl"]),
        }),
        EntityKind::StructuredProperty => {
            let allowed_values: Vec<AllowedValue> = lookup(source, &["allowed_values", "allowedValues"])
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(parse_allowed_value).collect())
                .unwrap_or_default();
            check_allowed_values(&allowed_values)?;

            let value_type = match lookup_urn(source, &["value_type", "valueType"]) {
                Some(u) => u,
                None => Urn::parse(DEFAULT_VALUE_TYPE)?,
            };

            let cardinality = match lookup_str(source, &["cardinality"]).as_deref() {
                Some(c) if c.eq_ignore_ascii_case("MULTIPLE") => Cardinality::Multiple,
                _ => Cardinality::Single,
            };

            let mut seen = HashSet::new();
            let entity_types: Vec<Urn> = lookup(source, &["entity_types", "entityTypes"])
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(as_urn_like)
                        .filter(|u| seen.insert(u.clone()))
                        .collect()
                })
                .unwrap_or_default();

            EntityBody::StructuredProperty(StructuredPropertyAttrs {
                qualified_name: lookup_str(source, &["qualified_name", "qualifiedName"])
                    .unwrap_or_else(|| urn.id().to_string()),
                value_type,
                cardinality,
                allowed_values,
                entity_types,
                immutable: lookup(source, &["immutable"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        }
    };
    Ok(body)
}

/// Owners in any of: `{owner_urn, ownership_type_urn}`, `{owner, ownershipType}`
/// with string or `{urn}` values, or GraphQL `ownership.owners`.
fn parse_owners(source: &Value) -> Vec<OwnershipRecord> {
    let items = source
        .get("owners")
        .or_else(|| source.pointer("/ownership/owners"))
        .and_then(Value::as_array);
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let owner = lookup_urn(item, &["owner_urn", "owner", "ownerUrn"]);
            let kind = lookup_urn(item, &["ownership_type_urn", "ownershipType", "typeUrn"]);
            match (owner, kind) {
                (Some(owner_urn), Some(ownership_type_urn)) => Some(OwnershipRecord {
                    owner_urn,
                    ownership_type_urn,
                }),
                _ => {
                    tracing::warn!(owner = %item, "skipping owner entry without valid urns");
                    None
                }
            }
        })
        .collect()
}

fn parse_allowed_value(item: &Value) -> Option<AllowedValue> {
    let raw = item.get("value").unwrap_or(item);
    let value = match raw {
        Value::String(s) => PropertyValue::String(s.clone()),
        Value::Number(n) => PropertyValue::Number(n.as_f64()?),
        Value::Object(_) => {
            if let Some(s) = raw.get("stringValue").and_then(Value::as_str) {
                PropertyValue::String(s.to_string())
            } else {
                PropertyValue::Number(raw.get("numberValue").and_then(Value::as_f64)?)
            }
        }
        _ => return None,
    };
    Some(AllowedValue {
        value,
        description: item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Look a key up in the nested aspect blocks first, then on the object
/// itself. Top-level `name` on a backend object is the URN id, so aspect
/// data must win. The first value accepted by `accept` wins.
fn lookup_by<'a>(
    source: &'a Value,
    keys: &[&str],
    accept: impl Fn(&Value) -> bool,
) -> Option<&'a Value> {
    let containers = [
        source.get("properties"),
        source.get("definition").filter(|d| d.is_object()),
        source.get("info"),
        Some(source),
    ];
    containers
        .into_iter()
        .flatten()
        .find_map(|c| keys.iter().find_map(|k| c.get(*k).filter(|v| accept(v))))
}

fn lookup<'a>(source: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    lookup_by(source, keys, |v| !v.is_null())
}

fn lookup_str(source: &Value, keys: &[&str]) -> Option<String> {
    lookup_by(source, keys, Value::is_string)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn lookup_urn(source: &Value, keys: &[&str]) -> Option<Urn> {
    lookup_by(source, keys, |v| as_urn_like(v).is_some()).and_then(as_urn_like)
}

fn as_urn_like(v: &Value) -> Option<Urn> {
    let s = match v {
        Value::String(s) => s.as_str(),
        Value::Object(_) => v.get("urn")?.as_str()?,
        _ => return None,
    };
    Urn::parse(s).ok()
}

fn first_urn_in(source: &Value, pointer: &str) -> Option<Urn> {
    source
        .pointer(pointer)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(as_urn_like)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_ref_parse() {
        assert_eq!(EntityRef::parse("42").unwrap(), EntityRef::Local(LocalId(42)));
        assert_eq!(
            EntityRef::parse("urn:li:tag:B").unwrap(),
            EntityRef::Remote(Urn::parse("urn:li:tag:B").unwrap())
        );
        assert!(matches!(EntityRef::parse("undefined"), Err(GovError::MissingId(_))));
        assert!(matches!(EntityRef::parse(""), Err(GovError::MissingId(_))));
    }

    #[test]
    fn id_fallback_chain_priority() {
        let p = json!({"database_id": 1, "local": {"database_id": 2, "id": 3}, "id": 4});
        assert_eq!(resolve_local_id(&p), Some(LocalId(1)));
        let p = json!({"local": {"database_id": 2, "id": 3}, "id": 4});
        assert_eq!(resolve_local_id(&p), Some(LocalId(2)));
        let p = json!({"local": {"id": "3"}, "id": 4});
        assert_eq!(resolve_local_id(&p), Some(LocalId(3)));
        let p = json!({"id": 4});
        assert_eq!(resolve_local_id(&p), Some(LocalId(4)));
        let p = json!({"id": "urn:li:tag:x"});
        assert_eq!(resolve_local_id(&p), None);
    }

    #[test]
    fn null_entries_fall_through() {
        let p = json!({"database_id": null, "local": null, "id": 9});
        assert_eq!(resolve_local_id(&p), Some(LocalId(9)));
    }

    #[test]
    fn graphql_tag_payload() {
        let p = json!({
            "urn": "urn:li:tag:pii",
            "properties": {"name": "PII", "description": " personal ", "colorHex": "#f00"},
            "ownership": {"owners": [
                {"owner": {"urn": "urn:li:corpuser:alice"},
                 "ownershipType": {"urn": "urn:li:ownershipType:__system__technical_owner"}},
                {"owner": {"urn": "urn:li:corpuser:alice"},
                 "ownershipType": {"urn": "urn:li:ownershipType:__system__technical_owner"}}
            ]}
        });
        let e = entity_from_payload(EntityKind::Tag, &p).unwrap();
        assert_eq!(e.name, "PII");
        assert_eq!(e.description.as_deref(), Some("personal"));
        assert_eq!(e.owners.len(), 1);
        assert_eq!(e.sync_status, SyncStatus::RemoteOnly);
        assert_eq!(
            e.body,
            EntityBody::Tag(TagAttrs {
                color_hex: Some("#f00".into())
            })
        );
    }

    #[test]
    fn aspect_name_wins_over_top_level_id() {
        let p = json!({
            "urn": "urn:li:tag:8f1e2c",
            "name": "8f1e2c",
            "description": "stale",
            "properties": {"name": "PII", "description": "Personal data"}
        });
        let e = entity_from_payload(EntityKind::Tag, &p).unwrap();
        assert_eq!(e.name, "PII");
        assert_eq!(e.description.as_deref(), Some("Personal data"));

        let flat = json!({"urn": "urn:li:tag:8f1e2c", "name": "Flat"});
        assert_eq!(entity_from_payload(EntityKind::Tag, &flat).unwrap().name, "Flat");
    }

    #[test]
    fn repeated_entity_types_keep_first_occurrence() {
        let p = json!({
            "urn": "urn:li:structuredProperty:p",
            "entityTypes": [
                "urn:li:entityType:datahub.dataset",
                "urn:li:entityType:datahub.chart",
                {"urn": "urn:li:entityType:datahub.dataset"}
            ]
        });
        let e = entity_from_payload(EntityKind::StructuredProperty, &p).unwrap();
        let EntityBody::StructuredProperty(attrs) = e.body else {
            panic!("wrong body");
        };
        let types: Vec<&str> = attrs.entity_types.iter().map(Urn::as_str).collect();
        assert_eq!(
            types,
            vec!["urn:li:entityType:datahub.dataset", "urn:li:entityType:datahub.chart"]
        );
    }

    #[test]
    fn nameless_payload_uses_urn_tail() {
        let p = json!({"urn": "urn:li:tag:Legacy"});
        let e = entity_from_payload(EntityKind::Tag, &p).unwrap();
        assert_eq!(e.name, "Legacy");
    }

    #[test]
    fn combined_payload_reads_remote_side_and_local_id() {
        let p = json!({
            "local": {"id": 5, "urn": "urn:li:domain:d1"},
            "remote": {"urn": "urn:li:domain:d1", "properties": {"name": "Finance"},
                       "parentDomains": {"domains": [{"urn": "urn:li:domain:root"}]}}
        });
        let e = entity_from_payload(EntityKind::Domain, &p).unwrap();
        assert_eq!(e.local_id, Some(LocalId(5)));
        assert_eq!(e.sync_status, SyncStatus::LocalOnly);
        assert_eq!(
            e.body,
            EntityBody::Domain(DomainAttrs {
                parent_domain: Some(Urn::parse("urn:li:domain:root").unwrap())
            })
        );
    }

    #[test]
    fn structured_property_definition_block() {
        let p = json!({
            "urn": "urn:li:structuredProperty:io.retention",
            "definition": {
                "qualifiedName": "io.retention",
                "displayName": "Retention",
                "cardinality": "MULTIPLE",
                "valueType": {"urn": "urn:li:dataType:datahub.number"},
                "entityTypes": [{"urn": "urn:li:entityType:datahub.dataset"}],
                "allowedValues": [
                    {"value": {"numberValue": 30.0}, "description": "month"},
                    {"value": {"numberValue": 365.0}}
                ],
                "immutable": true
            }
        });
        let e = entity_from_payload(EntityKind::StructuredProperty, &p).unwrap();
        assert_eq!(e.name, "Retention");
        let EntityBody::StructuredProperty(attrs) = e.body else {
            panic!("wrong body");
        };
        assert_eq!(attrs.cardinality, Cardinality::Multiple);
        assert_eq!(attrs.allowed_values.len(), 2);
        assert_eq!(attrs.value_type.as_str(), "urn:li:dataType:datahub.number");
        assert!(attrs.immutable);
    }

    #[test]
    fn duplicate_allowed_values_rejected() {
        let p = json!({
            "urn": "urn:li:structuredProperty:p",
            "allowed_values": [{"value": "a"}, {"value": "a "}]
        });
        let err = entity_from_payload(EntityKind::StructuredProperty, &p).unwrap_err();
        assert!(matches!(err, GovError::InvalidInput(_)));
    }

    #[test]
    fn kind_mismatch_rejected() {
        let p = json!({"urn": "urn:li:domain:x"});
        assert!(entity_from_payload(EntityKind::Tag, &p).is_err());
    }

    #[test]
    fn missing_urn_is_missing_id() {
        let p = json!({"name": "x"});
        assert!(matches!(
            entity_from_payload(EntityKind::Tag, &p),
            Err(GovError::MissingId(_))
        ));
    }
}
