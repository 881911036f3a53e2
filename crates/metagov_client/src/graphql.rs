//! GraphQL documents and variable builders.
//!
//! Builders are pure so the request shapes can be tested without a server.

use metagov_core::types::{AllowedValue, Cardinality, Entity, EntityBody, EntityKind, PropertyValue};
use metagov_core::urn::Urn;
use serde_json::{json, Value};

/// Search page size used when listing a kind.
pub const PAGE_SIZE: u64 = 100;

const OWNERSHIP: &str = r#"
    ownership {
      owners {
        owner { ... on CorpUser { urn } ... on CorpGroup { urn } }
        ownershipType { urn }
      }
    }"#;

fn fragment(kind: EntityKind) -> String {
    let fields = match kind {
        EntityKind::Tag => r#"... on Tag {
    urn
    properties { name description colorHex }"#,
        EntityKind::Domain => r#"... on Domain {
    urn
    properties { name description }
    parentDomains { domains { urn } }"#,
        EntityKind::GlossaryNode => r#"... on GlossaryNode {
    urn
    properties { name definition }
    parentNodes { nodes { urn } }"#,
        EntityKind::GlossaryTerm => r#"... on GlossaryTerm {
    urn
    properties { name definition termSource sourceRef sourceUrl }
    parentNodes { nodes { urn } }"#,
        EntityKind::StructuredProperty => {
            return r#"... on StructuredPropertyEntity {
    urn
    definition {
      qualifiedName
      displayName
      description
      cardinality
      immutable
      valueType { urn }
      entityTypes { urn }
      allowedValues {
        value { ... on StringValue { stringValue } ... on NumberValue { numberValue } }
        description
      }
    }
  }"#
            .to_string()
        }
    };
    format!("{fields}{OWNERSHIP}\n  }}")
}

pub fn search_query(kind: EntityKind) -> String {
    format!(
        r#"query search($input: SearchInput!) {{
  search(input: $input) {{
    start
    count
    total
    searchResults {{
      entity {{
        urn
        type
        {}
      }}
    }}
  }}
}}"#,
        fragment(kind)
    )
}

pub fn search_variables(kind: EntityKind, start: u64) -> Value {
    json!({
        "input": {
            "type": kind.graphql_type(),
            "query": "*",
            "start": start,
            "count": PAGE_SIZE,
        }
    })
}

pub fn entity_query(kind: EntityKind) -> String {
    format!(
        r#"query entity($urn: String!) {{
  entity(urn: $urn) {{
    urn
    type
    {}
  }}
}}"#,
        fragment(kind)
    )
}

// ── Mutations ─────────────────────────────────────────────────

/// One mutation document with its variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub document: &'static str,
    pub variables: Value,
}

impl Mutation {
    fn new(document: &'static str, variables: Value) -> Self {
        Self { document, variables }
    }
}

pub const CREATE_TAG: &str =
    "mutation createTag($input: CreateTagInput!) { createTag(input: $input) }";
pub const CREATE_DOMAIN: &str =
    "mutation createDomain($input: CreateDomainInput!) { createDomain(input: $input) }";
pub const CREATE_GLOSSARY_NODE: &str =
    "mutation createGlossaryNode($input: CreateGlossaryEntityInput!) { createGlossaryNode(input: $input) }";
pub const CREATE_GLOSSARY_TERM: &str =
    "mutation createGlossaryTerm($input: CreateGlossaryEntityInput!) { createGlossaryTerm(input: $input) }";
pub const CREATE_STRUCTURED_PROPERTY: &str = "mutation createStructuredProperty($input: CreateStructuredPropertyInput!) { createStructuredProperty(input: $input) { urn } }";
pub const UPDATE_STRUCTURED_PROPERTY: &str = "mutation updateStructuredProperty($input: UpdateStructuredPropertyInput!) { updateStructuredProperty(input: $input) { urn } }";
pub const UPDATE_TAG: &str =
    "mutation updateTag($urn: String!, $input: TagUpdateInput!) { updateTag(urn: $urn, input: $input) { urn } }";
pub const UPDATE_NAME: &str =
    "mutation updateName($input: UpdateNameInput!) { updateName(input: $input) }";
pub const UPDATE_DESCRIPTION: &str =
    "mutation updateDescription($input: DescriptionUpdateInput!) { updateDescription(input: $input) }";
pub const SET_TAG_COLOR: &str =
    "mutation setTagColor($urn: String!, $colorHex: String!) { setTagColor(urn: $urn, colorHex: $colorHex) }";
pub const MOVE_DOMAIN: &str =
    "mutation moveDomain($input: MoveDomainInput!) { moveDomain(input: $input) }";
pub const UPDATE_PARENT_NODE: &str =
    "mutation updateParentNode($input: UpdateParentNodeInput!) { updateParentNode(input: $input) }";
pub const BATCH_ADD_OWNERS: &str =
    "mutation batchAddOwners($input: BatchAddOwnersInput!) { batchAddOwners(input: $input) }";

pub const DELETE_TAG: &str = "mutation deleteTag($urn: String!) { deleteTag(urn: $urn) }";
pub const DELETE_DOMAIN: &str = "mutation deleteDomain($urn: String!) { deleteDomain(urn: $urn) }";
pub const DELETE_GLOSSARY_ENTITY: &str =
    "mutation deleteGlossaryEntity($urn: String!) { deleteGlossaryEntity(urn: $urn) }";
pub const DELETE_STRUCTURED_PROPERTY: &str = "mutation deleteStructuredProperty($input: DeleteStructuredPropertyInput!) { deleteStructuredProperty(input: $input) }";

fn description(entity: &Entity) -> Option<&str> {
    entity
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
}

fn allowed_values(values: &[AllowedValue]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|v| {
                let mut item = match &v.value {
                    PropertyValue::String(s) => json!({ "stringValue": s }),
                    PropertyValue::Number(n) => json!({ "numberValue": n }),
                };
                if let Some(d) = v.description.as_deref() {
                    item["description"] = json!(d);
                }
                item
            })
            .collect(),
    )
}

/// The create mutation for an entity not yet known to the backend.
pub fn create_mutation(entity: &Entity) -> Mutation {
    let id = entity.urn.id();
    let name = entity.display_name();
    let desc = description(entity);
    match &entity.body {
        EntityBody::Tag(_) => Mutation::new(
            CREATE_TAG,
            json!({ "input": { "id": id, "name": name, "description": desc } }),
        ),
        EntityBody::Domain(a) => Mutation::new(
            CREATE_DOMAIN,
            json!({ "input": {
                "id": id,
                "name": name,
                "description": desc,
                "parentDomain": a.parent_domain,
            } }),
        ),
        EntityBody::GlossaryNode(a) => Mutation::new(
            CREATE_GLOSSARY_NODE,
            json!({ "input": {
                "id": id,
                "name": name,
                "description": desc,
                "parentNode": a.parent_node,
            } }),
        ),
        EntityBody::GlossaryTerm(a) => Mutation::new(
            CREATE_GLOSSARY_TERM,
            json!({ "input": {
                "id": id,
                "name": name,
                "description": desc,
                "parentNode": a.parent_node,
            } }),
        ),
        EntityBody::StructuredProperty(a) => Mutation::new(
            CREATE_STRUCTURED_PROPERTY,
            json!({ "input": {
                "id": id,
                "qualifiedName": a.qualified_name,
                "displayName": name,
                "description": desc,
                "immutable": a.immutable,
                "valueType": a.value_type,
                "cardinality": a.cardinality.as_str(),
                "entityTypes": a.entity_types,
                "allowedValues": allowed_values(&a.allowed_values),
            } }),
        ),
    }
}

/// Mutations bringing an existing remote entity in line with `entity`.
pub fn update_mutations(entity: &Entity) -> Vec<Mutation> {
    let urn = entity.urn.as_str();
    let name = entity.display_name();
    let desc = description(entity).unwrap_or_default();

    if let EntityBody::StructuredProperty(a) = &entity.body {
        return vec![Mutation::new(
            UPDATE_STRUCTURED_PROPERTY,
            json!({ "input": {
                "urn": urn,
                "displayName": name,
                "description": desc,
                "immutable": a.immutable,
                "newAllowedValues": allowed_values(&a.allowed_values),
                "newEntityTypes": a.entity_types,
                "setCardinalityAsMultiple": a.cardinality == Cardinality::Multiple,
            } }),
        )];
    }

    // updateName does not resolve tags.
    if let EntityBody::Tag(a) = &entity.body {
        let mut out = vec![Mutation::new(
            UPDATE_TAG,
            json!({ "urn": urn, "input": { "urn": urn, "name": name, "description": desc } }),
        )];
        if let Some(color) = a.color_hex.as_deref().filter(|c| !c.is_empty()) {
            out.push(Mutation::new(
                SET_TAG_COLOR,
                json!({ "urn": urn, "colorHex": color }),
            ));
        }
        return out;
    }

    let mut out = vec![
        Mutation::new(UPDATE_NAME, json!({ "input": { "urn": urn, "name": name } })),
        Mutation::new(
            UPDATE_DESCRIPTION,
            json!({ "input": { "resourceUrn": urn, "description": desc } }),
        ),
    ];
    match &entity.body {
        EntityBody::Domain(a) => out.push(Mutation::new(
            MOVE_DOMAIN,
            json!({ "input": { "resourceUrn": urn, "parentDomain": a.parent_domain } }),
        )),
        EntityBody::GlossaryNode(a) => out.push(Mutation::new(
            UPDATE_PARENT_NODE,
            json!({ "input": { "resourceUrn": urn, "parentNode": a.parent_node } }),
        )),
        EntityBody::GlossaryTerm(a) => out.push(Mutation::new(
            UPDATE_PARENT_NODE,
            json!({ "input": { "resourceUrn": urn, "parentNode": a.parent_node } }),
        )),
        EntityBody::Tag(_) | EntityBody::StructuredProperty(_) => {}
    }
    out
}

/// Colour is not part of `createTag`; it is set right after.
pub fn post_create_mutations(entity: &Entity, urn: &Urn) -> Vec<Mutation> {
    match &entity.body {
        EntityBody::Tag(a) => a
            .color_hex
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|color| {
                Mutation::new(
                    SET_TAG_COLOR,
                    json!({ "urn": urn.as_str(), "colorHex": color }),
                )
            })
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

/// `None` when there is nothing to add or the kind keeps owners local.
pub fn owners_mutation(entity: &Entity, urn: &Urn) -> Option<Mutation> {
    if entity.owners.is_empty() || !entity.kind().syncs_owners() {
        return None;
    }
    let owners: Vec<Value> = entity
        .owners
        .iter()
        .map(|o| {
            let entity_type = if o.owner_urn.entity_type() == "corpGroup" {
                "CORP_GROUP"
            } else {
                "CORP_USER"
            };
            json!({
                "ownerUrn": o.owner_urn,
                "ownerEntityType": entity_type,
                "ownershipTypeUrn": o.ownership_type_urn,
            })
        })
        .collect();
    Some(Mutation::new(
        BATCH_ADD_OWNERS,
        json!({ "input": { "owners": owners, "resources": [{ "resourceUrn": urn.as_str() }] } }),
    ))
}

/// Delete document plus the response field holding its boolean result.
pub fn delete_mutation(kind: EntityKind, urn: &Urn) -> (Mutation, &'static str) {
    match kind {
        EntityKind::Tag => (
            Mutation::new(DELETE_TAG, json!({ "urn": urn.as_str() })),
            "deleteTag",
        ),
        EntityKind::Domain => (
            Mutation::new(DELETE_DOMAIN, json!({ "urn": urn.as_str() })),
            "deleteDomain",
        ),
        EntityKind::GlossaryNode | EntityKind::GlossaryTerm => (
            Mutation::new(DELETE_GLOSSARY_ENTITY, json!({ "urn": urn.as_str() })),
            "deleteGlossaryEntity",
        ),
        EntityKind::StructuredProperty => (
            Mutation::new(
                DELETE_STRUCTURED_PROPERTY,
                json!({ "input": { "urn": urn.as_str() } }),
            ),
            "deleteStructuredProperty",
        ),
    }
}
