use serde::{Deserialize, Serialize};
use serde_json::Value;

use origins_types::pack::attr;
use origins_types::{pack_properties, Packed, Properties, TypeResult};

/// Options for `set` operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    /// Create a new revision even if nothing changed.
    #[serde(default)]
    pub force: bool,
}

impl SetOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Equality filter over latest revisions.
///
/// Every supplied attribute and property must match exactly. Results are
/// ordered by revision time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub skip: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Predicate {
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

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The filter in stored form.
    pub(crate) fn packed(&self) -> TypeResult<Packed> {
        let mut out = Packed::new();
        let first_class = [
            (attr::ID, &self.id),
            (attr::TYPE, &self.kind),
            (attr::LABEL, &self.label),
        ];
        for (key, value) in first_class {
            if let Some(v) = value {
                out.insert(key.into(), Value::String(v.clone()));
            }
        }
        pack_properties(&self.properties, &mut out)?;
        // The encoded-key list is bookkeeping, not something to match on.
        out.remove(attr::ENCODED);
        Ok(out)
    }
}
