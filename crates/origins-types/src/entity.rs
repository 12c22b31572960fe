//! Versioned entities: nodes, edges, and the attribute sets used to create
//! and revise them.
//!
//! An [`Entity`] value is one immutable revision. Revising an entity never
//! mutates it; [`Entity::revise`] returns a brand-new revision that shares
//! the stable `id` but carries a fresh `uuid`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::ContentHash;
use crate::ident::RevisionId;
use crate::kind::{Dependence, Direction, Model};
use crate::reason::Reason;
use crate::time::Timestamp;

/// Open, ordered property map. Values may nest.
pub type Properties = BTreeMap<String, Value>;

/// Marks a revision as no longer current.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub reason: Reason,
    pub time: Timestamp,
    /// The revision whose change caused this invalidation, for cascades.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<RevisionId>,
}

/// Caller-supplied attributes for a new entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Stable id. Defaults to the uuid of the first revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A patch applied over an existing revision.
///
/// `None` leaves a first-class attribute untouched. Property entries are
/// merged over the existing map; a `null` value deletes the key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependence: Option<Dependence>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Mark a property for deletion.
    pub fn without_property(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into(), Value::Null);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_dependence(mut self, dependence: Dependence) -> Self {
        self.dependence = Some(dependence);
        self
    }

    /// Returns `true` if the patch touches edge-only attributes.
    pub fn touches_edge_attributes(&self) -> bool {
        self.direction.is_some() || self.dependence.is_some()
    }
}

/// One revision of a logical entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub uuid: RevisionId,
    pub time: Timestamp,
    pub model: Model,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    pub hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation: Option<Invalidation>,
}

impl Entity {
    /// Create the first revision of an entity.
    pub fn new(model: Model, attrs: Attributes) -> Self {
        let uuid = RevisionId::new();
        let properties = drop_nulls(attrs.properties);
        Self {
            id: attrs.id.unwrap_or_else(|| uuid.to_string()),
            uuid,
            time: Timestamp::now(),
            model,
            kind: attrs.kind,
            label: attrs.label,
            description: attrs.description,
            hash: ContentHash::of(&properties),
            properties,
            invalidation: None,
        }
    }

    /// Returns `true` if this revision is the latest one for its id.
    pub fn is_valid(&self) -> bool {
        self.invalidation.is_none()
    }

    /// Derive the next revision by applying a patch.
    ///
    /// The result keeps `id` and `model`, and gets a fresh `uuid` and
    /// `time`. Edge-only fields of the patch are ignored here.
    pub fn revise(&self, changes: &Changes) -> Self {
        let mut properties = self.properties.clone();
        for (key, value) in &changes.properties {
            if value.is_null() {
                properties.remove(key);
            } else {
                properties.insert(key.clone(), value.clone());
            }
        }
        Self {
            id: self.id.clone(),
            uuid: RevisionId::new(),
            time: Timestamp::now(),
            model: self.model,
            kind: changes.kind.clone().or_else(|| self.kind.clone()),
            label: changes.label.clone().or_else(|| self.label.clone()),
            description: changes
                .description
                .clone()
                .or_else(|| self.description.clone()),
            hash: ContentHash::of(&properties),
            properties,
            invalidation: None,
        }
    }

    /// A copy of this revision with a fresh uuid and time and nothing else
    /// changed.
    pub fn successor(&self) -> Self {
        Self {
            uuid: RevisionId::new(),
            time: Timestamp::now(),
            invalidation: None,
            ..self.clone()
        }
    }

    /// Returns `true` if `other` carries the same content hash and the same
    /// first-class attributes.
    pub fn same_content(&self, other: &Entity) -> bool {
        self.hash == other.hash
            && self.kind == other.kind
            && self.label == other.label
            && self.description == other.description
    }
}

fn drop_nulls(mut properties: Properties) -> Properties {
    properties.retain(|_, v| !v.is_null());
    properties
}

/// Access to the entity part of a node or edge.
pub trait Versioned {
    fn entity(&self) -> &Entity;

    fn uuid(&self) -> RevisionId {
        self.entity().uuid
    }

    fn id(&self) -> &str {
        &self.entity().id
    }

    fn is_valid(&self) -> bool {
        self.entity().is_valid()
    }
}

impl Versioned for Entity {
    fn entity(&self) -> &Entity {
        self
    }
}

/// A node revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub entity: Entity,
}

impl Node {
    pub fn new(model: Model, attrs: Attributes) -> Self {
        Self {
            entity: Entity::new(model, attrs),
        }
    }

    pub fn revise(&self, changes: &Changes) -> Self {
        Self {
            entity: self.entity.revise(changes),
        }
    }
}

impl Versioned for Node {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl From<Entity> for Node {
    fn from(entity: Entity) -> Self {
        Self { entity }
    }
}

/// An edge revision: an entity plus its two endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(flatten)]
    pub entity: Entity,
    pub start: RevisionId,
    pub end: RevisionId,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub dependence: Dependence,
}

impl Edge {
    pub fn new(
        model: Model,
        attrs: Attributes,
        start: RevisionId,
        end: RevisionId,
        direction: Direction,
        dependence: Dependence,
    ) -> Self {
        Self {
            entity: Entity::new(model, attrs),
            start,
            end,
            direction,
            dependence,
        }
    }

    /// Derive the next revision by applying a patch, including the
    /// edge-only direction and dependence fields.
    pub fn revise(&self, changes: &Changes) -> Self {
        Self {
            entity: self.entity.revise(changes),
            start: self.start,
            end: self.end,
            direction: changes.direction.unwrap_or(self.direction),
            dependence: changes.dependence.unwrap_or(self.dependence),
        }
    }

    /// Derive the next revision pointing at new endpoints.
    pub fn rewire(&self, start: RevisionId, end: RevisionId) -> Self {
        Self {
            entity: self.entity.successor(),
            start,
            end,
            direction: self.direction,
            dependence: self.dependence,
        }
    }

    /// Returns `true` if `other` differs from this revision in nothing but
    /// identity and time.
    pub fn same_content(&self, other: &Edge) -> bool {
        self.entity.same_content(&other.entity)
            && self.direction == other.direction
            && self.dependence == other.dependence
    }

    /// Returns `true` if `node` is either endpoint.
    pub fn touches(&self, node: RevisionId) -> bool {
        self.start == node || self.end == node
    }
}

impl Versioned for Edge {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        Node::new(
            Model::Node,
            Attributes::new()
                .with_id("n1")
                .with_type("table")
                .with_label("Users")
                .with_property("rows", 10)
                .with_property("schema", json!({"pk": "id"})),
        )
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    #[test]
    fn id_defaults_to_first_uuid() {
        let node = Node::new(Model::Node, Attributes::new());
        assert_eq!(node.id(), node.uuid().to_string());
    }

    #[test]
    fn new_entity_is_valid_and_hashed() {
        let node = sample();
        assert!(node.is_valid());
        assert_eq!(node.entity.hash, ContentHash::of(&node.entity.properties));
    }

    #[test]
    fn null_properties_are_dropped() {
        let node = Node::new(
            Model::Node,
            Attributes::new().with_property("gone", Value::Null),
        );
        assert!(node.entity.properties.is_empty());
    }

    // ---------------------------------------------------------------
    // Revision
    // ---------------------------------------------------------------

    #[test]
    fn revise_keeps_id_and_changes_uuid() {
        let node = sample();
        let next = node.revise(&Changes::new().with_property("rows", 11));
        assert_eq!(next.id(), node.id());
        assert_ne!(next.uuid(), node.uuid());
        assert_eq!(next.entity.properties["rows"], json!(11));
        assert_ne!(next.entity.hash, node.entity.hash);
    }

    #[test]
    fn revise_is_a_patch() {
        let node = sample();
        let next = node.revise(&Changes::new().with_property("owner", "ops"));
        assert_eq!(next.entity.properties.len(), 3);
        assert_eq!(next.entity.label.as_deref(), Some("Users"));
    }

    #[test]
    fn null_in_patch_deletes_key() {
        let node = sample();
        let next = node.revise(&Changes::new().without_property("rows"));
        assert!(!next.entity.properties.contains_key("rows"));
    }

    #[test]
    fn identical_patch_has_same_content() {
        let node = sample();
        let next = node.revise(&Changes::new().with_property("rows", 10));
        assert!(node.entity.same_content(&next.entity));
    }

    #[test]
    fn label_change_is_a_content_change() {
        let node = sample();
        let next = node.revise(&Changes::new().with_label("Accounts"));
        assert_eq!(node.entity.hash, next.entity.hash);
        assert!(!node.entity.same_content(&next.entity));
    }

    // ---------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------

    #[test]
    fn edge_rewire_keeps_attributes() {
        let a = RevisionId::new();
        let b = RevisionId::new();
        let c = RevisionId::new();
        let edge = Edge::new(
            Model::Edge,
            Attributes::new().with_type("fk").with_property("w", 1),
            a,
            b,
            Direction::Bidirected,
            Dependence::Mutual,
        );
        let next = edge.rewire(c, b);
        assert_eq!(next.start, c);
        assert_eq!(next.end, b);
        assert_eq!(next.id(), edge.id());
        assert_ne!(next.uuid(), edge.uuid());
        assert!(edge.same_content(&next));
    }

    #[test]
    fn edge_revise_applies_direction() {
        let edge = Edge::new(
            Model::Edge,
            Attributes::new(),
            RevisionId::new(),
            RevisionId::new(),
            Direction::Directed,
            Dependence::None,
        );
        let next = edge.revise(&Changes::new().with_direction(Direction::Reverse));
        assert_eq!(next.direction, Direction::Reverse);
        assert!(!edge.same_content(&next));
    }

    #[test]
    fn edge_serializes_flat() {
        let edge = Edge::new(
            Model::Edge,
            Attributes::new().with_id("e1"),
            RevisionId::new(),
            RevisionId::new(),
            Direction::default(),
            Dependence::default(),
        );
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["id"], json!("e1"));
        assert_eq!(json["direction"], json!("directed"));
        assert_eq!(json["dependence"], json!("none"));
        let back: Edge = serde_json::from_value(json).unwrap();
        assert_eq!(back, edge);
    }
}
