//! Staged changes: MetadataChangeProposal (MCP) files for GitOps review.
//!
//! One file per entity and target:
//! `<root>/<environment>/<mutation>/<kind path>/<slug>.json`, holding a JSON
//! array of MCPs. Writing the same target again replaces the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::GovError;
use crate::types::*;
use crate::urn::Urn;

pub const DEFAULT_MUTATION: &str = "default";

const SYSTEM_OWNERSHIP_PREFIX: &str = "urn:li:ownershipType:__system__";

// ── MCP model ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Upsert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectPayload {
    pub json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataChangeProposal {
    pub entity_type: String,
    pub entity_urn: Urn,
    pub change_type: ChangeType,
    pub aspect_name: String,
    pub aspect: AspectPayload,
}

impl MetadataChangeProposal {
    fn upsert(entity: &Entity, aspect_name: &str, json: Value) -> Self {
        Self {
            entity_type: entity.kind().urn_type().to_string(),
            entity_urn: entity.urn.clone(),
            change_type: ChangeType::Upsert,
            aspect_name: aspect_name.to_string(),
            aspect: AspectPayload { json },
        }
    }
}

// ── Requests / results ────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    #[default]
    Upsert,
    /// Soft delete: stages `status {removed: true}`.
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRequest {
    pub environment: String,
    #[serde(default)]
    pub mutation: Option<String>,
    #[serde(default)]
    pub action: StageAction,
}

impl StageRequest {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            mutation: None,
            action: StageAction::Upsert,
        }
    }

    pub fn mutation(&self) -> &str {
        self.mutation
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MUTATION)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub success: bool,
    pub files_created: Vec<String>,
    pub content_hash: String,
    pub message: String,
}

// ── MCP construction ──────────────────────────────────────────

/// Build the MCPs describing `entity`'s desired state.
pub fn build_mcps(entity: &Entity, action: StageAction) -> Vec<MetadataChangeProposal> {
    if action == StageAction::Delete {
        return vec![MetadataChangeProposal::upsert(
            entity,
            "status",
            json!({ "removed": true }),
        )];
    }

    let name = entity.display_name();
    let description = entity
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let (aspect_name, aspect) = match &entity.body {
        EntityBody::Tag(a) => {
            let mut m = Map::new();
            m.insert("name".into(), json!(name));
            put_opt(&mut m, "description", description);
            put_opt(&mut m, "colorHex", a.color_hex.as_deref());
            ("tagProperties", m)
        }
        EntityBody::Domain(a) => {
            let mut m = Map::new();
            m.insert("name".into(), json!(name));
            put_opt(&mut m, "description", description);
            put_opt(&mut m, "parentDomain", a.parent_domain.as_ref().map(Urn::as_str));
            ("domainProperties", m)
        }
        EntityBody::GlossaryNode(a) => {
            let mut m = Map::new();
            m.insert("name".into(), json!(name));
            m.insert("definition".into(), json!(description.unwrap_or_default()));
            put_opt(&mut m, "parentNode", a.parent_node.as_ref().map(Urn::as_str));
            ("glossaryNodeInfo", m)
        }
        EntityBody::GlossaryTerm(a) => {
            let mut m = Map::new();
            m.insert("name".into(), json!(name));
            m.insert("definition".into(), json!(description.unwrap_or_default()));
            m.insert(
                "termSource".into(),
                json!(a.term_source.as_deref().unwrap_or("INTERNAL")),
            );
            put_opt(&mut m, "sourceRef", a.source_ref.as_deref());
            put_opt(&mut m, "sourceUrl", a.source_url.as_deref());
            put_opt(&mut m, "parentNode", a.parent_node.as_ref().map(Urn::as_str));
            ("glossaryTermInfo", m)
        }
        EntityBody::StructuredProperty(a) => {
            let mut m = Map::new();
            m.insert("qualifiedName".into(), json!(a.qualified_name));
            m.insert("displayName".into(), json!(name));
            m.insert("valueType".into(), json!(a.value_type));
            m.insert("cardinality".into(), json!(a.cardinality.as_str()));
            m.insert("entityTypes".into(), json!(a.entity_types));
            m.insert("immutable".into(), json!(a.immutable));
            put_opt(&mut m, "description", description);
            if !a.allowed_values.is_empty() {
                let values: Vec<Value> = a.allowed_values.iter().map(allowed_value_json).collect();
                m.insert("allowedValues".into(), Value::Array(values));
            }
            ("propertyDefinition", m)
        }
    };

    let mut mcps = vec![MetadataChangeProposal::upsert(
        entity,
        aspect_name,
        Value::Object(aspect),
    )];

    if !entity.owners.is_empty() {
        let owners: Vec<Value> = entity
            .owners
            .iter()
            .map(|o| {
                json!({
                    "owner": o.owner_urn,
                    "type": ownership_type_name(&o.ownership_type_urn),
                    "typeUrn": o.ownership_type_urn,
                })
            })
            .collect();
        mcps.push(MetadataChangeProposal::upsert(
            entity,
            "ownership",
            json!({ "owners": owners }),
        ));
    }
    mcps
}

/// `__system__technical_owner` → `TECHNICAL_OWNER`; custom types → `CUSTOM`.
pub fn ownership_type_name(type_urn: &Urn) -> String {
    match type_urn.as_str().strip_prefix(SYSTEM_OWNERSHIP_PREFIX) {
        Some(system) if !system.is_empty() => system.to_ascii_uppercase(),
        _ => "CUSTOM".to_string(),
    }
}

fn allowed_value_json(v: &AllowedValue) -> Value {
    let value = match &v.value {
        PropertyValue::String(s) => json!({ "string": s }),
        PropertyValue::Number(n) => json!({ "double": n }),
    };
    let mut m = Map::new();
    m.insert("value".into(), value);
    put_opt(&mut m, "description", v.description.as_deref());
    Value::Object(m)
}

fn put_opt(m: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        m.insert(key.to_string(), json!(v));
    }
}

// ── Writer ────────────────────────────────────────────────────

/// Writes MCP files under a fixed root directory.
#[derive(Debug, Clone)]
pub struct StagingWriter {
    root: PathBuf,
}

impl StagingWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that staging `urn` for this target writes to.
    pub fn target_path(
        &self,
        kind: EntityKind,
        urn: &Urn,
        req: &StageRequest,
    ) -> Result<PathBuf, GovError> {
        let environment = validate_segment("environment", req.environment.trim())?;
        let mutation = validate_segment("mutation", req.mutation())?;
        Ok(self
            .root
            .join(environment)
            .join(mutation)
            .join(kind.path_segment())
            .join(format!("{}.json", file_slug(urn))))
    }

    /// Serialize `entity` and write it, replacing any previous file for the
    /// same target.
    pub async fn write(&self, entity: &Entity, req: &StageRequest) -> Result<StageResult, GovError> {
        let path = self.target_path(entity.kind(), &entity.urn, req)?;
        let mcps = build_mcps(entity, req.action);
        let bytes = serde_json::to_vec_pretty(&mcps).map_err(|e| GovError::Internal(e.into()))?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| GovError::Staging(format!("create {}: {e}", dir.display())))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| GovError::Staging(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| GovError::Staging(format!("rename to {}: {e}", path.display())))?;

        tracing::info!(
            urn = %entity.urn,
            path = %path.display(),
            mcps = mcps.len(),
            "staged change written"
        );

        Ok(StageResult {
            success: true,
            files_created: vec![path.display().to_string()],
            content_hash,
            message: format!(
                "Staged {} change(s) for {} in {}/{}",
                mcps.len(),
                entity.display_name(),
                req.environment.trim(),
                req.mutation()
            ),
        })
    }
}

fn validate_segment<'a>(what: &str, value: &'a str) -> Result<&'a str, GovError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(value)
    } else {
        Err(GovError::InvalidInput(format!(
            "{what} must match [A-Za-z0-9_-]+, got {value:?}"
        )))
    }
}

/// Percent-encoded URN id. Injective, so distinct URNs never share a file.
fn file_slug(urn: &Urn) -> String {
    urlencoding::encode(urn.id()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(s: &str) -> Urn {
        Urn::parse(s).unwrap()
    }

    fn tag() -> Entity {
        let mut e = Entity::remote(
            urn("urn:li:tag:pii"),
            "PII",
            EntityBody::Tag(TagAttrs {
                color_hex: Some("#ff0000".into()),
            }),
        );
        e.description = Some("Personal data".into());
        e.owners = vec![OwnershipRecord {
            owner_urn: urn("urn:li:corpuser:alice"),
            ownership_type_urn: urn("urn:li:ownershipType:__system__technical_owner"),
        }];
        e
    }

    #[test]
    fn tag_mcps_have_properties_and_ownership() {
        let mcps = build_mcps(&tag(), StageAction::Upsert);
        assert_eq!(mcps.len(), 2);
        assert_eq!(mcps[0].aspect_name, "tagProperties");
        assert_eq!(mcps[0].aspect.json["colorHex"], "#ff0000");
        assert_eq!(mcps[1].aspect_name, "ownership");
        assert_eq!(mcps[1].aspect.json["owners"][0]["type"], "TECHNICAL_OWNER");

        let v = serde_json::to_value(&mcps[0]).unwrap();
        assert_eq!(v["entityType"], "tag");
        assert_eq!(v["entityUrn"], "urn:li:tag:pii");
        assert_eq!(v["changeType"], "UPSERT");
    }

    #[test]
    fn delete_action_stages_status_removed() {
        let mcps = build_mcps(&tag(), StageAction::Delete);
        assert_eq!(mcps.len(), 1);
        assert_eq!(mcps[0].aspect_name, "status");
        assert_eq!(mcps[0].aspect.json, json!({"removed": true}));
    }

    #[test]
    fn structured_property_definition() {
        let e = Entity::remote(
            urn("urn:li:structuredProperty:io.retention"),
            "Retention",
            EntityBody::StructuredProperty(StructuredPropertyAttrs {
                qualified_name: "io.retention".into(),
                value_type: urn("urn:li:dataType:datahub.number"),
                cardinality: Cardinality::Single,
                allowed_values: vec![AllowedValue {
                    value: PropertyValue::Number(30.0),
                    description: None,
                }],
                entity_types: vec![urn("urn:li:entityType:datahub.dataset")],
                immutable: false,
            }),
        );
        let mcps = build_mcps(&e, StageAction::Upsert);
        assert_eq!(mcps.len(), 1);
        let def = &mcps[0].aspect.json;
        assert_eq!(mcps[0].entity_type, "structuredProperty");
        assert_eq!(def["qualifiedName"], "io.retention");
        assert_eq!(def["cardinality"], "SINGLE");
        assert_eq!(def["allowedValues"][0]["value"]["double"], 30.0);
    }

    #[test]
    fn glossary_term_defaults_source() {
        let e = Entity::remote(
            urn("urn:li:glossaryTerm:t1"),
            "Term",
            EntityBody::GlossaryTerm(GlossaryTermAttrs::default()),
        );
        let mcps = build_mcps(&e, StageAction::Upsert);
        assert_eq!(mcps[0].aspect.json["termSource"], "INTERNAL");
        assert_eq!(mcps[0].aspect.json["definition"], "");
    }

    #[test]
    fn custom_ownership_type() {
        assert_eq!(
            ownership_type_name(&urn("urn:li:ownershipType:steward")),
            "CUSTOM"
        );
        assert_eq!(
            ownership_type_name(&urn("urn:li:ownershipType:__system__data_steward")),
            "DATA_STEWARD"
        );
    }

    #[test]
    fn lookalike_ids_get_distinct_files() {
        let w = StagingWriter::new("/stage");
        let req = StageRequest::new("dev");
        let paths: std::collections::BTreeSet<PathBuf> = ["a b", "a_b", "a/b", "a%20b"]
            .iter()
            .map(|id| {
                w.target_path(EntityKind::Tag, &urn(&format!("urn:li:tag:{id}")), &req)
                    .unwrap()
            })
            .collect();
        assert_eq!(paths.len(), 4);
        assert!(paths.contains(&PathBuf::from("/stage/dev/default/tags/a_b.json")));
    }

    #[test]
    fn target_path_layout() {
        let w = StagingWriter::new("/stage");
        let mut req = StageRequest::new("prod");
        req.mutation = Some("q3-cleanup".into());
        let p = w
            .target_path(EntityKind::Tag, &urn("urn:li:tag:a b/c"), &req)
            .unwrap();
        assert_eq!(p, PathBuf::from("/stage/prod/q3-cleanup/tags/a%20b%2Fc.json"));

        let req = StageRequest::new("prod");
        let p = w.target_path(EntityKind::Domain, &urn("urn:li:domain:d1"), &req).unwrap();
        assert_eq!(p, PathBuf::from("/stage/prod/default/domains/d1.json"));
    }

    #[test]
    fn rejects_traversal_in_environment() {
        let w = StagingWriter::new("/stage");
        for env in ["../etc", "", "a/b", "dev env"] {
            let req = StageRequest::new(env);
            assert!(w.target_path(EntityKind::Tag, &urn("urn:li:tag:x"), &req).is_err(), "{env}");
        }
    }

    #[tokio::test]
    async fn write_creates_then_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let w = StagingWriter::new(dir.path());
        let req = StageRequest::new("dev");

        let first = w.write(&tag(), &req).await.unwrap();
        assert!(first.success);
        assert_eq!(first.files_created.len(), 1);
        let path = PathBuf::from(&first.files_created[0]);
        assert!(path.ends_with("dev/default/tags/pii.json"));

        let mut changed = tag();
        changed.description = Some("Updated".into());
        let second = w.write(&changed, &req).await.unwrap();
        assert_eq!(second.files_created, first.files_created);
        assert_ne!(second.content_hash, first.content_hash);

        let written: Vec<MetadataChangeProposal> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written[0].aspect.json["description"], "Updated");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
