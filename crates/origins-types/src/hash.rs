use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::Properties;
use crate::error::TypeError;

/// Domain tag prepended to every property digest.
const DOMAIN: &str = "origins-properties-v1";

/// BLAKE3 digest of an entity's properties.
///
/// The properties map is ordered, so serializing it to JSON yields a
/// canonical byte string: two maps with the same entries always hash the
/// same regardless of insertion order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a properties map.
    pub fn of(properties: &Properties) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN.as_bytes());
        hasher.update(b":");
        // Serializing a map of JSON values cannot fail.
        let data = serde_json::to_vec(properties).unwrap_or_default();
        hasher.update(&data);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    pub fn short_hex(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl FromStr for ContentHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s)
            .map(|h| Self(*h.as_bytes()))
            .map_err(|e| TypeError::InvalidAttribute {
                key: "hash".into(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn hash_is_deterministic() {
        let p = props(&[("a", json!(1)), ("b", json!("x"))]);
        assert_eq!(ContentHash::of(&p), ContentHash::of(&p));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = Properties::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!(2));
        let mut b = Properties::new();
        b.insert("y".into(), json!(2));
        b.insert("x".into(), json!(1));
        assert_eq!(ContentHash::of(&a), ContentHash::of(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = props(&[("a", json!(1))]);
        let b = props(&[("a", json!(2))]);
        assert_ne!(ContentHash::of(&a), ContentHash::of(&b));
    }

    #[test]
    fn domain_separated_from_raw_blake3() {
        let p = Properties::new();
        let raw = blake3::hash(b"{}");
        assert_ne!(ContentHash::of(&p).as_bytes(), raw.as_bytes());
    }

    #[test]
    fn hex_roundtrip() {
        let h = ContentHash::of(&props(&[("k", json!({"nested": true}))]));
        let parsed: ContentHash = h.to_hex().parse().unwrap();
        assert_eq!(h, parsed);
        assert_eq!(h.short_hex().len(), 8);
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::of(&Properties::new());
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
