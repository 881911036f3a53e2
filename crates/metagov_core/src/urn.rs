//! URN handling: `urn:li:<entityType>:<id>`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GovError;
use crate::types::EntityKind;

pub const URN_PREFIX: &str = "urn:li:";

/// Validated URN. Ordering is lexical, which keeps reconciliation output stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn(String);

impl Urn {
    pub fn parse(s: &str) -> Result<Self, GovError> {
        let s = s.trim();
        let rest = s
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| GovError::InvalidInput(format!("not a urn: {s:?}")))?;
        match rest.split_once(':') {
            Some((entity_type, id)) if !entity_type.is_empty() && !id.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(GovError::InvalidInput(format!("malformed urn: {s:?}"))),
        }
    }

    /// Build a URN for `kind` from an already-chosen id.
    pub fn new(kind: EntityKind, id: &str) -> Self {
        Self(format!("{URN_PREFIX}{}:{id}", kind.urn_type()))
    }

    /// Mint the URN for a newly created local entity.
    ///
    /// Tags and structured properties are keyed by name; domains and glossary
    /// entities get a UUIDv5 of the name so re-creating the same name yields
    /// the same URN.
    pub fn mint(kind: EntityKind, name: &str) -> Result<Self, GovError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GovError::InvalidInput("name is required".into()));
        }
        let id = match kind {
            EntityKind::Tag | EntityKind::StructuredProperty => name.to_string(),
            EntityKind::Domain | EntityKind::GlossaryNode | EntityKind::GlossaryTerm => {
                let seed = format!("{}:{}", kind.as_str(), name.to_lowercase());
                Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
            }
        };
        Ok(Self::new(kind, &id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<entityType>` segment.
    pub fn entity_type(&self) -> &str {
        let rest = &self.0[URN_PREFIX.len()..];
        rest.split_once(':').map(|(t, _)| t).unwrap_or(rest)
    }

    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_urn_type(self.entity_type())
    }

    /// Everything after `urn:li:<entityType>:`.
    pub fn id(&self) -> &str {
        let rest = &self.0[URN_PREFIX.len()..];
        rest.split_once(':').map(|(_, id)| id).unwrap_or("")
    }

    /// Trailing segment, used when an entity carries no name.
    pub fn display_name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for Urn {
    type Error = GovError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Urn::parse(&value)
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.0
    }
}

impl std::fmt::Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
