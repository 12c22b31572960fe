//! The snapshot document accepted by [`crate::sync`] and produced by
//! [`crate::export_resource`].
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "resource": "warehouse",
//!   "components": { "orders": { "type": "table", "properties": {...} } },
//!   "relationships": { "fk": { "start": "orders", "end": "customers" } }
//! }
//! ```
//!
//! Entries are kept as raw JSON until [`crate::validate`] checks them, so
//! that every problem in a document can be reported at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use origins_types::{Attributes, Dependence, Direction};

use crate::error::SyncResult;

/// Version written by the exporter and accepted by the validator.
pub const FORMAT_VERSION: &str = "1.0";

/// The resource a snapshot describes: a bare id, or attributes with an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(String),
    Attributes(Attributes),
}

impl ResourceRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Attributes(attrs) => attrs.id.as_deref(),
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Attributes> for ResourceRef {
    fn from(attrs: Attributes) -> Self {
        Self::Attributes(attrs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    pub resource: ResourceRef,
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new(resource: impl Into<ResourceRef>) -> Self {
        Self {
            version: Some(Value::String(FORMAT_VERSION.into())),
            resource: resource.into(),
            components: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn from_json(text: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_component(mut self, id: impl Into<String>, entry: Value) -> Self {
        self.components.insert(id.into(), entry);
        self
    }

    pub fn with_relationship(mut self, id: impl Into<String>, entry: Value) -> Self {
        self.relationships.insert(id.into(), entry);
        self
    }
}

/// A relationship entry after validation. Endpoints are still local ids.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipEntry {
    /// Attributes with `id` set to the entry's key.
    pub attrs: Attributes,
    pub start: String,
    pub end: String,
    pub direction: Option<Direction>,
    pub dependence: Option<Dependence>,
}

/// A snapshot that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidSnapshot {
    /// Resource attributes with `id` always set.
    pub resource: Attributes,
    /// `true` when the document described the resource with attributes
    /// rather than a bare id.
    pub describes_resource: bool,
    /// Component attributes by local id, each with `id` set to its key.
    pub components: BTreeMap<String, Attributes>,
    pub relationships: BTreeMap<String, RelationshipEntry>,
}

impl ValidSnapshot {
    pub fn resource_id(&self) -> &str {
        self.resource.id.as_deref().unwrap_or_default()
    }
}
