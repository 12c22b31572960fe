//! Snapshot reconciliation for Origins resources.
//!
//! A snapshot is a document listing everything a resource should contain:
//! components keyed by local id, and relationships between them. [`sync`]
//! diffs a snapshot against the live graph and converges the graph on it,
//! adding, revising, and removing entries through the regular versioned
//! operations so every change is recorded as provenance.
//!
//! # Design Rules
//!
//! 1. Validation runs before the store is touched and reports every
//!    violation at once.
//! 2. A pass runs in one transaction scope. A conflict rolls it all back.
//! 3. Properties converge fully; first-class attributes only when given.
//! 4. Relationships created by a sync follow both endpoints, so revising a
//!    component carries its relationships forward.

pub mod diff;
pub mod engine;
pub mod error;
pub mod export;
pub mod snapshot;
pub mod validate;

pub use diff::{diff_attributes, diff_properties, diff_relationship, AttributeChange, AttributeDiff};
pub use engine::{sync, Counts, EntityDiff, SyncOptions, SyncReport};
pub use error::{SyncError, SyncResult};
pub use export::{export_resource, ExportOptions, SourceComponent, SourceGraph, SourceRelationship};
pub use snapshot::{RelationshipEntry, ResourceRef, Snapshot, ValidSnapshot, FORMAT_VERSION};
pub use validate::{validate, FormatErrors, Violation};
