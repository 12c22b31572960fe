//! Attribute packing for the graph store.
//!
//! The store only accepts flat maps of scalars and homogeneous scalar
//! arrays. Packing flattens an entity into such a map:
//!
//! - first-class attributes are written under the `origins:` prefix;
//! - properties are merged to the top level unprefixed;
//! - properties the store cannot hold natively (maps, nested or mixed
//!   arrays) are JSON-encoded to strings, and their keys are listed under
//!   `origins:encoded` so unpacking decodes exactly those keys.
//!
//! Unpacking inverts both steps.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::entity::{Edge, Entity, Node, Properties};
use crate::error::{TypeError, TypeResult};
use crate::hash::ContentHash;
use crate::ident::RevisionId;
use crate::kind::{Dependence, Direction, Model};
use crate::time::Timestamp;

/// Namespace prefix of first-class attributes.
pub const PREFIX: &str = "origins:";

/// A flattened, store-ready attribute map.
pub type Packed = Map<String, Value>;

/// Wire keys of first-class attributes.
pub mod attr {
    pub const ID: &str = "origins:id";
    pub const UUID: &str = "origins:uuid";
    pub const TIME: &str = "origins:time";
    pub const MODEL: &str = "origins:model";
    pub const TYPE: &str = "origins:type";
    pub const LABEL: &str = "origins:label";
    pub const DESCRIPTION: &str = "origins:description";
    pub const HASH: &str = "origins:hash";
    pub const DIRECTION: &str = "origins:direction";
    pub const DEPENDENCE: &str = "origins:dependence";
    pub const START: &str = "origins:start";
    pub const END: &str = "origins:end";
    pub const ENCODED: &str = "origins:encoded";
}

/// Returns `true` if the store can hold `value` without encoding.
fn is_native(value: &Value) -> bool {
    match value {
        Value::Null | Value::Object(_) => false,
        Value::Array(items) => {
            let mut kinds = items.iter().map(|v| match v {
                Value::Bool(_) => Some(0),
                Value::Number(_) => Some(1),
                Value::String(_) => Some(2),
                _ => None,
            });
            match kinds.next() {
                None => true,
                Some(None) => false,
                Some(first) => kinds.all(|k| k == first),
            }
        }
        _ => true,
    }
}

/// Merge `properties` into `out`, encoding values the store cannot hold.
///
/// Null values are skipped. Keys in the `origins:` namespace are rejected
/// since they would collide with first-class attributes.
pub fn pack_properties(properties: &Properties, out: &mut Packed) -> TypeResult<()> {
    let mut encoded = Vec::new();
    for (key, value) in properties {
        if key.starts_with(PREFIX) {
            return Err(TypeError::InvalidAttribute {
                key: key.clone(),
                reason: "property keys may not use the reserved namespace".into(),
            });
        }
        if value.is_null() {
            continue;
        }
        if is_native(value) {
            out.insert(key.clone(), value.clone());
        } else {
            let text =
                serde_json::to_string(value).map_err(|e| TypeError::Encoding(e.to_string()))?;
            out.insert(key.clone(), Value::String(text));
            encoded.push(Value::String(key.clone()));
        }
    }
    if !encoded.is_empty() {
        out.insert(attr::ENCODED.into(), Value::Array(encoded));
    }
    Ok(())
}

/// Extract the properties from a packed map, decoding encoded values.
pub fn unpack_properties(packed: &Packed) -> TypeResult<Properties> {
    let encoded: BTreeSet<&str> = match packed.get(attr::ENCODED) {
        Some(Value::Array(keys)) => keys.iter().filter_map(Value::as_str).collect(),
        Some(other) => {
            return Err(TypeError::InvalidAttribute {
                key: attr::ENCODED.into(),
                reason: format!("expected array, found {other}"),
            })
        }
        None => BTreeSet::new(),
    };

    let mut properties = Properties::new();
    for (key, value) in packed {
        if key.starts_with(PREFIX) {
            continue;
        }
        let value = if encoded.contains(key.as_str()) {
            let text = value.as_str().ok_or_else(|| TypeError::InvalidAttribute {
                key: key.clone(),
                reason: "encoded value is not a string".into(),
            })?;
            serde_json::from_str(text).map_err(|e| TypeError::Encoding(e.to_string()))?
        } else {
            value.clone()
        };
        properties.insert(key.clone(), value);
    }
    Ok(properties)
}

fn put_opt(out: &mut Packed, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        out.insert(key.into(), Value::String(v.clone()));
    }
}

fn get_str<'a>(packed: &'a Packed, key: &'static str) -> TypeResult<&'a str> {
    match packed.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(TypeError::InvalidAttribute {
            key: key.into(),
            reason: format!("expected string, found {other}"),
        }),
        None => Err(TypeError::MissingAttribute(key)),
    }
}

fn get_opt_str(packed: &Packed, key: &'static str) -> TypeResult<Option<String>> {
    match packed.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_str(packed, key).map(|s| Some(s.to_string())),
    }
}

fn get_uuid(packed: &Packed, key: &'static str) -> TypeResult<RevisionId> {
    get_str(packed, key)?.parse()
}

impl Entity {
    /// Flatten into a store-ready attribute map. Invalidation is stored
    /// separately and is not packed.
    pub fn pack(&self) -> TypeResult<Packed> {
        let mut out = Packed::new();
        out.insert(attr::ID.into(), Value::String(self.id.clone()));
        out.insert(attr::UUID.into(), Value::String(self.uuid.to_string()));
        out.insert(attr::TIME.into(), Value::from(self.time.as_millis()));
        out.insert(attr::MODEL.into(), Value::String(self.model.as_str().into()));
        out.insert(attr::HASH.into(), Value::String(self.hash.to_hex()));
        put_opt(&mut out, attr::TYPE, &self.kind);
        put_opt(&mut out, attr::LABEL, &self.label);
        put_opt(&mut out, attr::DESCRIPTION, &self.description);
        pack_properties(&self.properties, &mut out)?;
        Ok(out)
    }

    /// Rebuild an entity from a packed map. The result has no invalidation.
    pub fn unpack(packed: &Packed) -> TypeResult<Self> {
        let time = packed
            .get(attr::TIME)
            .and_then(Value::as_i64)
            .ok_or(TypeError::MissingAttribute(attr::TIME))?;
        let properties = unpack_properties(packed)?;
        let hash = match packed.get(attr::HASH) {
            Some(_) => get_str(packed, attr::HASH)?.parse()?,
            None => ContentHash::of(&properties),
        };
        Ok(Self {
            id: get_str(packed, attr::ID)?.to_string(),
            uuid: get_uuid(packed, attr::UUID)?,
            time: Timestamp::from_millis(time),
            model: get_str(packed, attr::MODEL)?.parse::<Model>()?,
            kind: get_opt_str(packed, attr::TYPE)?,
            label: get_opt_str(packed, attr::LABEL)?,
            description: get_opt_str(packed, attr::DESCRIPTION)?,
            properties,
            hash,
            invalidation: None,
        })
    }
}

impl Node {
    pub fn pack(&self) -> TypeResult<Packed> {
        self.entity.pack()
    }

    pub fn unpack(packed: &Packed) -> TypeResult<Self> {
        Entity::unpack(packed).map(Node::from)
    }
}

impl Edge {
    pub fn pack(&self) -> TypeResult<Packed> {
        let mut out = self.entity.pack()?;
        out.insert(attr::START.into(), Value::String(self.start.to_string()));
        out.insert(attr::END.into(), Value::String(self.end.to_string()));
        out.insert(
            attr::DIRECTION.into(),
            Value::String(self.direction.as_str().into()),
        );
        out.insert(
            attr::DEPENDENCE.into(),
            Value::String(self.dependence.as_str().into()),
        );
        Ok(out)
    }

    pub fn unpack(packed: &Packed) -> TypeResult<Self> {
        let direction = match get_opt_str(packed, attr::DIRECTION)? {
            Some(s) => s.parse::<Direction>()?,
            None => Direction::default(),
        };
        let dependence = match get_opt_str(packed, attr::DEPENDENCE)? {
            Some(s) => s.parse::<Dependence>()?,
            None => Dependence::default(),
        };
        Ok(Self {
            entity: Entity::unpack(packed)?,
            start: get_uuid(packed, attr::START)?,
            end: get_uuid(packed, attr::END)?,
            direction,
            dependence,
        })
    }
}
