//! Timelines and impact reports assembled from stored provenance records.
//!
//! A [`Timeline`] answers "what happened to this entity, in order?" and an
//! [`Impact`] answers "what else changed because of this revision?".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use origins_types::{Reason, RevisionId, Timestamp};

use crate::record::{BundleId, DerivationKind, Operation, Record};

/// A record placed within its bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub bundle: BundleId,
    pub operation: Operation,
    pub time: Timestamp,
    /// Position of the record within its bundle.
    pub seq: usize,
    pub record: Record,
}

/// Ordered provenance history for one stable id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: String,
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Build a timeline, ordering entries by bundle time then record
    /// position. Duplicate entries (the same record reached through more
    /// than one revision) are dropped.
    pub fn new(id: impl Into<String>, entries: impl IntoIterator<Item = TimelineEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<TimelineEntry> = entries
            .into_iter()
            .filter(|e| seen.insert((e.bundle, e.seq)))
            .collect();
        entries.sort_by(|a, b| {
            (a.time, a.bundle, a.seq).cmp(&(b.time, b.bundle, b.seq))
        });
        Self {
            id: id.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Revisions in the order they were generated.
    pub fn revisions(&self) -> Vec<RevisionId> {
        self.entries
            .iter()
            .filter_map(|e| match e.record {
                Record::Generation { entity, .. } => Some(entity),
                _ => None,
            })
            .collect()
    }

    /// Distinct bundles in order.
    pub fn bundles(&self) -> Vec<BundleId> {
        let mut out: Vec<BundleId> = Vec::new();
        for e in &self.entries {
            if out.last() != Some(&e.bundle) {
                out.push(e.bundle);
            }
        }
        out
    }
}

/// One revision invalidated as a consequence of another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub entity: RevisionId,
    pub reason: Reason,
    /// The revision that replaced it, if it was carried forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<RevisionId>,
}

/// Downstream effects of a single revision change or removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub origin: RevisionId,
    pub affected: Vec<ImpactEntry>,
}

impl Impact {
    /// Assemble from records touching the cascade: invalidations whose
    /// trigger is `origin`, plus any derivations that replaced them.
    pub fn from_records<'a>(origin: RevisionId, records: impl IntoIterator<Item = &'a Record>) -> Self {
        let records: Vec<&Record> = records.into_iter().collect();
        let affected = records
            .iter()
            .filter_map(|r| match r {
                Record::Invalidation {
                    entity,
                    reason,
                    trigger: Some(t),
                    ..
                } if *t == origin => Some((*entity, reason.clone())),
                _ => None,
            })
            .map(|(entity, reason)| {
                let replacement = records.iter().find_map(|r| match r {
                    Record::Derivation {
                        generated,
                        used,
                        derivation: DerivationKind::Revision,
                    } if *used == entity => Some(*generated),
                    _ => None,
                });
                ImpactEntry {
                    entity,
                    reason,
                    replacement,
                }
            })
            .collect();
        Self { origin, affected }
    }

    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }

    /// Affected revisions that were removed without replacement.
    pub fn detached(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.affected.iter().filter(|e| e.replacement.is_none())
    }
}
