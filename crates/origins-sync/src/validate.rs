//! Format validation for snapshot documents.
//!
//! Validation never stops at the first problem: every violation found in
//! the document is collected into one [`FormatErrors`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use origins_types::{Attributes, PREFIX};

use crate::snapshot::{RelationshipEntry, ResourceRef, Snapshot, ValidSnapshot, FORMAT_VERSION};

const COMPONENT_KEYS: &[&str] = &["id", "type", "label", "description", "properties"];

const RELATIONSHIP_KEYS: &[&str] = &[
    "id",
    "type",
    "label",
    "description",
    "properties",
    "start",
    "end",
    "direction",
    "dependence",
];

/// One problem in a snapshot, located by a dotted path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatErrors {
    pub violations: Vec<Violation>,
}

impl FormatErrors {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    /// Returns `true` if some violation sits at exactly `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for FormatErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FormatErrors {}

/// Check a snapshot and resolve it into typed entries.
pub fn validate(snapshot: &Snapshot) -> Result<ValidSnapshot, FormatErrors> {
    let mut errors = FormatErrors::default();

    check_version(&mut errors, snapshot.version.as_ref());

    let (mut resource, describes_resource) = match &snapshot.resource {
        ResourceRef::Id(id) => (Attributes::new().with_id(id.clone()), false),
        ResourceRef::Attributes(attrs) => (attrs.clone(), true),
    };
    if resource.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
        errors.push("resource.id", "a non-empty resource id is required");
    }
    resource.properties.retain(|_, v| !v.is_null());
    for key in resource.properties.keys() {
        if key.starts_with(PREFIX) {
            errors.push(format!("resource.properties.{key}"), "reserved property key");
        }
    }

    let mut components = BTreeMap::new();
    for (key, value) in &snapshot.components {
        if let Some((attrs, _)) = entry(&mut errors, "components", key, value, COMPONENT_KEYS) {
            components.insert(key.clone(), attrs);
        }
    }

    let mut relationships = BTreeMap::new();
    for (key, value) in &snapshot.relationships {
        let Some((attrs, fields)) = entry(&mut errors, "relationships", key, value, RELATIONSHIP_KEYS)
        else {
            continue;
        };
        let path = format!("relationships.{key}");
        let start = endpoint(&mut errors, &path, fields, "start", snapshot);
        let end = endpoint(&mut errors, &path, fields, "end", snapshot);
        let direction = parsed(&mut errors, &path, fields, "direction");
        let dependence = parsed(&mut errors, &path, fields, "dependence");
        if let (Some(start), Some(end)) = (start, end) {
            relationships.insert(
                key.clone(),
                RelationshipEntry {
                    attrs,
                    start,
                    end,
                    direction,
                    dependence,
                },
            );
        }
    }

    if errors.is_empty() {
        Ok(ValidSnapshot {
            resource,
            describes_resource,
            components,
            relationships,
        })
    } else {
        Err(errors)
    }
}

fn check_version(errors: &mut FormatErrors, version: Option<&Value>) {
    let supported = match version {
        None => true,
        Some(Value::String(s)) => s == FORMAT_VERSION || s == "1",
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(_) => false,
    };
    if !supported {
        errors.push("version", format!("unsupported format version, expected {FORMAT_VERSION}"));
    }
}

/// Checks shared by components and relationships. Returns the entry's
/// attributes and raw fields when it is at least an object.
fn entry<'a>(
    errors: &mut FormatErrors,
    section: &str,
    key: &str,
    value: &'a Value,
    allowed: &[&str],
) -> Option<(Attributes, &'a Map<String, Value>)> {
    let path = format!("{section}.{key}");
    if key.trim().is_empty() {
        errors.push(&path, "local id must not be empty");
    }
    let Some(fields) = value.as_object() else {
        errors.push(path, "entry must be an object");
        return None;
    };
    for name in fields.keys() {
        if !allowed.contains(&name.as_str()) {
            errors.push(format!("{path}.{name}"), "unknown key");
        }
    }
    match fields.get("id") {
        None | Some(Value::Null) => {}
        Some(Value::String(id)) if id == key => {}
        Some(other) => errors.push(format!("{path}.id"), format!("{other} does not match key {key:?}")),
    }

    let mut attrs = Attributes::new().with_id(key);
    attrs.kind = text(errors, &path, fields, "type");
    attrs.label = text(errors, &path, fields, "label");
    attrs.description = text(errors, &path, fields, "description");
    match fields.get("properties") {
        None | Some(Value::Null) => {}
        Some(Value::Object(properties)) => {
            for (name, value) in properties {
                if name.starts_with(PREFIX) {
                    errors.push(format!("{path}.properties.{name}"), "reserved property key");
                } else if !value.is_null() {
                    attrs.properties.insert(name.clone(), value.clone());
                }
            }
        }
        Some(_) => errors.push(format!("{path}.properties"), "must be an object"),
    }
    Some((attrs, fields))
}

fn text(errors: &mut FormatErrors, path: &str, fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(format!("{path}.{key}"), "must be a string");
            None
        }
    }
}

fn parsed<T>(errors: &mut FormatErrors, path: &str, fields: &Map<String, Value>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = text(errors, path, fields, key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(format!("{path}.{key}"), e.to_string());
            None
        }
    }
}

fn endpoint(
    errors: &mut FormatErrors,
    path: &str,
    fields: &Map<String, Value>,
    key: &str,
    snapshot: &Snapshot,
) -> Option<String> {
    if !fields.contains_key(key) {
        errors.push(format!("{path}.{key}"), "required");
        return None;
    }
    let local = text(errors, path, fields, key)?;
    if !snapshot.components.contains_key(&local) {
        errors.push(
            format!("{path}.{key}"),
            format!("component {local:?} is not in the snapshot"),
        );
        return None;
    }
    Some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use origins_types::{Dependence, Direction};
    use serde_json::json;

    fn parse(doc: Value) -> Snapshot {
        serde_json::from_value(doc).unwrap()
    }

    // ---- accepted documents ----

    #[test]
    fn well_formed_snapshot_resolves() {
        let valid = validate(&parse(json!({
            "version": "1.0",
            "resource": "warehouse",
            "components": {
                "orders": {"id": "orders", "type": "table", "properties": {"rows": 10, "gone": null}},
                "customers": {"label": "Customers"}
            },
            "relationships": {
                "fk": {"start": "orders", "end": "customers", "type": "references",
                       "direction": "directed", "dependence": "forward"}
            }
        })))
        .unwrap();

        assert_eq!(valid.resource_id(), "warehouse");
        assert!(!valid.describes_resource);
        let orders = &valid.components["orders"];
        assert_eq!(orders.id.as_deref(), Some("orders"));
        assert_eq!(orders.kind.as_deref(), Some("table"));
        assert_eq!(orders.properties.len(), 1);
        assert_eq!(valid.components["customers"].id.as_deref(), Some("customers"));

        let fk = &valid.relationships["fk"];
        assert_eq!((fk.start.as_str(), fk.end.as_str()), ("orders", "customers"));
        assert_eq!(fk.direction, Some(Direction::Directed));
        assert_eq!(fk.dependence, Some(Dependence::Forward));
        assert_eq!(fk.attrs.kind.as_deref(), Some("references"));
    }

    #[test]
    fn numeric_version_and_resource_map() {
        let valid = validate(&parse(json!({
            "version": 1.0,
            "resource": {"id": "r", "label": "R", "properties": {"owner": "ops"}}
        })))
        .unwrap();
        assert!(valid.describes_resource);
        assert_eq!(valid.resource.label.as_deref(), Some("R"));
        assert_eq!(valid.resource.properties["owner"], json!("ops"));
    }

    // ---- rejected documents ----

    #[test]
    fn every_violation_is_reported() {
        let errors = validate(&parse(json!({
            "version": "2.0",
            "resource": {"label": "no id"},
            "components": {
                "a": {"id": "b", "colour": "red"},
                " ": {},
                "c": "not an object",
                "d": {"properties": {"origins:uuid": "x"}}
            },
            "relationships": {
                "r1": {"end": "a", "direction": "sideways"},
                "r2": {"start": "a", "end": "missing", "dependence": 3}
            }
        })))
        .unwrap_err();

        for path in [
            "version",
            "resource.id",
            "components.a.id",
            "components.a.colour",
            "components. ",
            "components.c",
            "components.d.properties.origins:uuid",
            "relationships.r1.start",
            "relationships.r1.direction",
            "relationships.r2.end",
            "relationships.r2.dependence",
        ] {
            assert!(errors.contains(path), "missing violation at {path}: {errors}");
        }
        assert_eq!(errors.len(), 11);
    }

    #[test]
    fn relationship_only_keys_rejected_on_components() {
        let errors = validate(&parse(json!({
            "resource": "r",
            "components": {"a": {"start": "a", "direction": "directed"}}
        })))
        .unwrap_err();
        assert!(errors.contains("components.a.start"));
        assert!(errors.contains("components.a.direction"));
    }

    #[test]
    fn display_lists_paths() {
        let errors = validate(&parse(json!({"resource": ""}))).unwrap_err();
        assert_eq!(
            errors.to_string(),
            "1 violation(s); resource.id: a non-empty resource id is required"
        );
    }
}
