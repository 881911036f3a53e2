//! Core domain types: pure value types, no storage or transport concerns.

// `from_str() -> Option<Self>` returns None for unknown values rather than an error.
#![allow(clippy::should_implement_trait)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync_status::SyncStatus;
use crate::urn::Urn;

// ── EntityKind ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tag,
    Domain,
    GlossaryNode,
    GlossaryTerm,
    StructuredProperty,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Tag,
        Self::Domain,
        Self::GlossaryNode,
        Self::GlossaryTerm,
        Self::StructuredProperty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Domain => "domain",
            Self::GlossaryNode => "glossary_node",
            Self::GlossaryTerm => "glossary_term",
            Self::StructuredProperty => "structured_property",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// HTTP path segment (`/<segment>/...`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Domain => "domains",
            Self::GlossaryNode => "glossary-nodes",
            Self::GlossaryTerm => "glossary-terms",
            Self::StructuredProperty => "properties",
        }
    }

    pub fn from_path_segment(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == s)
    }

    /// Entity-type segment used inside URNs and MCPs.
    pub fn urn_type(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Domain => "domain",
            Self::GlossaryNode => "glossaryNode",
            Self::GlossaryTerm => "glossaryTerm",
            Self::StructuredProperty => "structuredProperty",
        }
    }

    pub fn from_urn_type(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.urn_type() == s)
    }

    /// GraphQL `EntityType` enum value.
    pub fn graphql_type(&self) -> &'static str {
        match self {
            Self::Tag => "TAG",
            Self::Domain => "DOMAIN",
            Self::GlossaryNode => "GLOSSARY_NODE",
            Self::GlossaryTerm => "GLOSSARY_TERM",
            Self::StructuredProperty => "STRUCTURED_PROPERTY",
        }
    }

    /// Whether owners round-trip through the remote backend. Structured
    /// property owners are kept locally and only staged.
    pub fn syncs_owners(&self) -> bool {
        !matches!(self, Self::StructuredProperty)
    }

    /// Local table holding rows of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Tag => "metadata_tags",
            Self::Domain => "metadata_domains",
            Self::GlossaryNode => "metadata_glossary_nodes",
            Self::GlossaryTerm => "metadata_glossary_terms",
            Self::StructuredProperty => "metadata_structured_properties",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Identifiers ───────────────────────────────────────────────

/// Canonical local database identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Ownership ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub owner_urn: Urn,
    pub ownership_type_urn: Urn,
}

/// Drop repeated (owner, type) pairs, keeping first occurrence order.
pub fn dedup_owners(owners: Vec<OwnershipRecord>) -> Vec<OwnershipRecord> {
    let mut seen = std::collections::HashSet::new();
    owners
        .into_iter()
        .filter(|o| seen.insert(o.clone()))
        .collect()
}

// ── Kind-specific attributes ──────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagAttrs {
    #[serde(default)]
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainAttrs {
    #[serde(default)]
    pub parent_domain: Option<Urn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlossaryNodeAttrs {
    #[serde(default)]
    pub parent_node: Option<Urn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTermAttrs {
    #[serde(default)]
    pub parent_node: Option<Urn>,
    #[serde(default)]
    pub term_source: Option<String>,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Multiple => "MULTIPLE",
        }
    }
}

/// Allowed value of a structured property: a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    String(String),
}

impl PropertyValue {
    /// Key used for duplicate detection and set comparison.
    pub fn canonical(&self) -> String {
        match self {
            Self::Number(n) => format!("n:{n}"),
            Self::String(s) => format!("s:{}", s.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowedValue {
    pub value: PropertyValue,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPropertyAttrs {
    pub qualified_name: String,
    pub value_type: Urn,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
    #[serde(default)]
    pub entity_types: Vec<Urn>,
    #[serde(default)]
    pub immutable: bool,
}

/// Attributes that vary per entity kind. The serde tag doubles as the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityBody {
    Tag(TagAttrs),
    Domain(DomainAttrs),
    GlossaryNode(GlossaryNodeAttrs),
    GlossaryTerm(GlossaryTermAttrs),
    StructuredProperty(StructuredPropertyAttrs),
}

impl EntityBody {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Tag(_) => EntityKind::Tag,
            Self::Domain(_) => EntityKind::Domain,
            Self::GlossaryNode(_) => EntityKind::GlossaryNode,
            Self::GlossaryTerm(_) => EntityKind::GlossaryTerm,
            Self::StructuredProperty(_) => EntityKind::StructuredProperty,
        }
    }
}

// ── Entity ────────────────────────────────────────────────────

/// One metadata entity as held locally or returned by the backend.
///
/// `local_id` is present only for rows in the local store. `sync_status` is the
/// stored status for local rows; remote records carry `RemoteOnly`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub urn: Urn,
    #[serde(rename = "database_id", default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owners: Vec<OwnershipRecord>,
    #[serde(flatten)]
    pub body: EntityBody,
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// A remote record as decoded from the backend.
    pub fn remote(urn: Urn, name: impl Into<String>, body: EntityBody) -> Self {
        Self {
            urn,
            local_id: None,
            name: name.into(),
            description: None,
            owners: Vec::new(),
            body,
            sync_status: SyncStatus::RemoteOnly,
            last_synced_at: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.body.kind()
    }

    /// Name, or the URN's trailing segment when the name is blank.
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            self.urn.display_name()
        } else {
            name
        }
    }

    /// Overwrite every tracked field from `source`, keeping local identity.
    pub fn overwrite_from(&mut self, source: &Entity) {
        self.name = source.display_name().to_string();
        self.description = source.description.clone();
        if source.kind().syncs_owners() {
            self.owners = source.owners.clone();
        }
        self.body = source.body.clone();
    }
}

/// User-submitted fields for creating or editing a local entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owners: Vec<OwnershipRecord>,
    #[serde(flatten)]
    pub body: EntityBody,
}
