//! Provenance record and bundle types.
//!
//! A [`Record`] is one typed statement about a revision. Records are flat
//! (every field is a scalar) so a record serializes directly into the
//! parameter map of a store statement and back.

use std::fmt;

use serde::{Deserialize, Serialize};

use origins_types::{Reason, RevisionId, Timestamp};

/// Identifier of a provenance bundle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(uuid::Uuid);

impl BundleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BundleId({})", self.short_id())
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a derivation between two revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivationKind {
    /// The new revision supersedes the old one. Recorded by the engine.
    #[serde(rename = "prov:Revision")]
    Revision,
    #[serde(rename = "prov:PrimarySource")]
    PrimarySource,
    #[serde(rename = "prov:Quotation")]
    Quotation,
}

impl DerivationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revision => "prov:Revision",
            Self::PrimarySource => "prov:PrimarySource",
            Self::Quotation => "prov:Quotation",
        }
    }
}

impl fmt::Display for DerivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single provenance statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Record {
    /// A revision came into existence.
    #[serde(rename = "prov:Generation")]
    Generation {
        entity: RevisionId,
        /// Only set for brand-new entities.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<Timestamp>,
    },
    /// A revision ceased to be valid.
    #[serde(rename = "prov:Invalidation")]
    Invalidation {
        entity: RevisionId,
        reason: Reason,
        time: Timestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger: Option<RevisionId>,
    },
    /// `generated` was derived from `used`.
    #[serde(rename = "prov:Derivation")]
    Derivation {
        generated: RevisionId,
        used: RevisionId,
        #[serde(rename = "type")]
        derivation: DerivationKind,
    },
    /// A revision is a specialization of its stable id.
    #[serde(rename = "prov:Specialization")]
    Specialization { specific: RevisionId, general: String },
}

impl Record {
    /// Wire name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generation { .. } => "prov:Generation",
            Self::Invalidation { .. } => "prov:Invalidation",
            Self::Derivation { .. } => "prov:Derivation",
            Self::Specialization { .. } => "prov:Specialization",
        }
    }

    /// The revision this record is primarily about.
    pub fn subject(&self) -> RevisionId {
        match self {
            Self::Generation { entity, .. } | Self::Invalidation { entity, .. } => *entity,
            Self::Derivation { generated, .. } => *generated,
            Self::Specialization { specific, .. } => *specific,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation { entity, time: Some(t) } => {
                write!(f, "generated {} at {t}", entity.short_id())
            }
            Self::Generation { entity, time: None } => write!(f, "generated {}", entity.short_id()),
            Self::Invalidation {
                entity,
                reason,
                trigger,
                ..
            } => {
                write!(f, "invalidated {} ({reason})", entity.short_id())?;
                if let Some(t) = trigger {
                    write!(f, " triggered by {}", t.short_id())?;
                }
                Ok(())
            }
            Self::Derivation {
                generated,
                used,
                derivation: DerivationKind::Revision,
            } => write!(f, "{} revises {}", generated.short_id(), used.short_id()),
            Self::Derivation {
                generated,
                used,
                derivation,
            } => write!(
                f,
                "{} derives from {} ({derivation})",
                generated.short_id(),
                used.short_id()
            ),
            Self::Specialization { specific, general } => {
                write!(f, "{} specializes {general}", specific.short_id())
            }
        }
    }
}

/// The logical operation a bundle describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Set,
    Remove,
    Derive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Set => f.write_str("set"),
            Self::Remove => f.write_str("remove"),
            Self::Derive => f.write_str("derive"),
        }
    }
}

/// All provenance records produced by one logical operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub operation: Operation,
    pub time: Timestamp,
    pub records: Vec<Record>,
}

impl Bundle {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: BundleId::new(),
            operation,
            time: Timestamp::now(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Append the records of another bundle, so that cascaded effects are
    /// recorded under the operation that caused them.
    pub fn absorb(&mut self, other: Bundle) {
        self.records.extend(other.records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Revisions invalidated by this bundle, in record order.
    pub fn invalidated(&self) -> Vec<RevisionId> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Invalidation { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect()
    }

    /// Revisions generated by this bundle, in record order.
    pub fn generated(&self) -> Vec<RevisionId> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Generation { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect()
    }
}
