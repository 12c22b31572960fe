//! Attribute-level diff between a stored revision and a snapshot entry.
//!
//! Properties converge fully: a key missing from the snapshot is reported as
//! removed. First-class attributes are compared only when the snapshot
//! supplies them. Keys use the stored attribute names, so `origins:label`
//! is the label and a bare key is a property.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use origins_types::pack::attr;
use origins_types::{Attributes, Changes, Edge, Entity, Properties};

use crate::snapshot::RelationshipEntry;

/// The result of comparing a revision with a snapshot entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub changes: Vec<AttributeChange>,
}

impl AttributeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, AttributeChange::Added { .. }))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, AttributeChange::Removed { .. }))
            .count()
    }

    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, AttributeChange::Modified { .. }))
            .count()
    }

    /// The patch that applies this diff to the stored revision.
    pub fn to_changes(&self) -> Changes {
        let mut out = Changes::new();
        for change in &self.changes {
            let (key, value) = match change {
                AttributeChange::Added { key, value } => (key.as_str(), value),
                AttributeChange::Modified { key, new, .. } => (key.as_str(), new),
                AttributeChange::Removed { key, .. } => {
                    out.properties.insert(key.clone(), Value::Null);
                    continue;
                }
            };
            let text = value.as_str().map(str::to_owned);
            match key {
                attr::TYPE => out.kind = text,
                attr::LABEL => out.label = text,
                attr::DESCRIPTION => out.description = text,
                attr::DIRECTION => out.direction = text.and_then(|s| s.parse().ok()),
                attr::DEPENDENCE => out.dependence = text.and_then(|s| s.parse().ok()),
                _ => {
                    out.properties.insert(key.to_string(), value.clone());
                }
            }
        }
        out
    }

    fn compare(&mut self, key: &str, stored: Option<Value>, supplied: Option<Value>) {
        let Some(new) = supplied else {
            return;
        };
        match stored {
            None => self.changes.push(AttributeChange::Added {
                key: key.to_string(),
                value: new,
            }),
            Some(old) if old != new => self.changes.push(AttributeChange::Modified {
                key: key.to_string(),
                old,
                new,
            }),
            Some(_) => {}
        }
    }
}

/// A single change between a stored revision and its snapshot entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum AttributeChange {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
    Modified { key: String, old: Value, new: Value },
}

impl AttributeChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => key,
        }
    }
}

/// Compare two property maps. Keys only in `new` are added, keys only in
/// `old` are removed.
pub fn diff_properties(old: &Properties, new: &Properties) -> AttributeDiff {
    let mut diff = AttributeDiff::new();
    for (key, old_val) in old {
        match new.get(key) {
            Some(new_val) if new_val != old_val => diff.changes.push(AttributeChange::Modified {
                key: key.clone(),
                old: old_val.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => diff.changes.push(AttributeChange::Removed {
                key: key.clone(),
                value: old_val.clone(),
            }),
        }
    }
    for (key, new_val) in new {
        if !old.contains_key(key) {
            diff.changes.push(AttributeChange::Added {
                key: key.clone(),
                value: new_val.clone(),
            });
        }
    }
    diff
}

fn string(value: &Option<String>) -> Option<Value> {
    value.clone().map(Value::String)
}

fn first_class(diff: &mut AttributeDiff, stored: &Entity, local: &Attributes, with_type: bool) {
    if with_type {
        diff.compare(attr::TYPE, string(&stored.kind), string(&local.kind));
    }
    diff.compare(attr::LABEL, string(&stored.label), string(&local.label));
    diff.compare(
        attr::DESCRIPTION,
        string(&stored.description),
        string(&local.description),
    );
}

/// Diff a stored component (or resource) against snapshot attributes.
/// Identity and time never take part.
pub fn diff_attributes(stored: &Entity, local: &Attributes) -> AttributeDiff {
    let mut diff = AttributeDiff::new();
    first_class(&mut diff, stored, local, true);
    diff.changes
        .extend(diff_properties(&stored.properties, &local.properties).changes);
    diff
}

/// Diff a stored relationship against its snapshot entry. Endpoints and
/// type are not compared.
pub fn diff_relationship(stored: &Edge, local: &RelationshipEntry) -> AttributeDiff {
    let mut diff = AttributeDiff::new();
    first_class(&mut diff, &stored.entity, &local.attrs, false);
    diff.compare(
        attr::DIRECTION,
        Some(Value::String(stored.direction.as_str().into())),
        local.direction.map(|d| Value::String(d.as_str().into())),
    );
    diff.compare(
        attr::DEPENDENCE,
        Some(Value::String(stored.dependence.as_str().into())),
        local.dependence.map(|d| Value::String(d.as_str().into())),
    );
    diff.changes
        .extend(diff_properties(&stored.entity.properties, &local.attrs.properties).changes);
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use origins_types::{Dependence, Direction, Model, RevisionId};
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    // ---- properties ----

    #[test]
    fn identical_properties_no_diff() {
        let p = props(&[("a", json!(1)), ("b", json!({"x": [1, 2]}))]);
        assert!(diff_properties(&p, &p).is_empty());
    }

    #[test]
    fn property_changes_classified() {
        let old = props(&[("kept", json!(1)), ("changed", json!("a")), ("dropped", json!(true))]);
        let new = props(&[("kept", json!(1)), ("changed", json!("b")), ("fresh", json!(0))]);
        let diff = diff_properties(&old, &new);
        assert_eq!(diff.len(), 3);
        assert_eq!((diff.additions(), diff.removals(), diff.modifications()), (1, 1, 1));
    }

    // ---- first-class attributes ----

    #[test]
    fn unsupplied_attributes_are_ignored() {
        let stored = Entity::new(
            Model::Component,
            Attributes::new().with_id("a").with_label("A").with_type("table"),
        );
        let local = Attributes::new().with_id("a");
        assert!(diff_attributes(&stored, &local).is_empty());
    }

    #[test]
    fn supplied_attributes_compared() {
        let stored = Entity::new(
            Model::Component,
            Attributes::new()
                .with_id("a")
                .with_label("A")
                .with_property("rows", 1),
        );
        let local = Attributes::new()
            .with_id("a")
            .with_label("Renamed")
            .with_description("new")
            .with_property("rows", 2);
        let diff = diff_attributes(&stored, &local);
        let keys: Vec<&str> = diff.changes.iter().map(AttributeChange::key).collect();
        assert_eq!(keys, vec!["origins:label", "origins:description", "rows"]);

        let changes = diff.to_changes();
        assert_eq!(changes.label.as_deref(), Some("Renamed"));
        assert_eq!(changes.description.as_deref(), Some("new"));
        assert_eq!(changes.properties["rows"], json!(2));

        let revised = stored.revise(&changes);
        assert!(diff_attributes(&revised, &local).is_empty());
    }

    #[test]
    fn removed_property_becomes_deletion() {
        let stored = Entity::new(
            Model::Component,
            Attributes::new().with_id("a").with_property("old", 1),
        );
        let diff = diff_attributes(&stored, &Attributes::new().with_id("a"));
        assert_eq!(diff.removals(), 1);
        assert_eq!(diff.to_changes().properties["old"], Value::Null);
        assert!(stored.revise(&diff.to_changes()).properties.is_empty());
    }

    // ---- relationships ----

    #[test]
    fn relationship_ignores_type_and_endpoints() {
        let stored = Edge::new(
            Model::Relationship,
            Attributes::new().with_id("ab").with_type("feeds"),
            RevisionId::new(),
            RevisionId::new(),
            Direction::Bidirected,
            Dependence::None,
        );
        let local = RelationshipEntry {
            attrs: Attributes::new().with_id("ab").with_type("reads"),
            start: "x".into(),
            end: "y".into(),
            direction: None,
            dependence: None,
        };
        assert!(diff_relationship(&stored, &local).is_empty());

        let stricter = RelationshipEntry {
            dependence: Some(Dependence::Mutual),
            ..local
        };
        let diff = diff_relationship(&stored, &stricter);
        assert_eq!(diff.modifications(), 1);
        assert_eq!(diff.to_changes().dependence, Some(Dependence::Mutual));
        assert!(diff.to_changes().direction.is_none());
    }

    #[test]
    fn serialized_change_is_tagged() {
        let change = AttributeChange::Modified {
            key: "rows".into(),
            old: json!(1),
            new: json!(2),
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"change": "modified", "key": "rows", "old": 1, "new": 2})
        );
    }
}
