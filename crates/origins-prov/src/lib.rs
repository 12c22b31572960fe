//! Provenance for the Origins graph.
//!
//! Every add, set, and remove produces a [`Bundle`] of typed [`Record`]s:
//! generations, invalidations, derivations, and specializations. The
//! [`recorder`] functions are pure; they describe what happened and leave
//! emission to the store layer.
//!
//! Stored records can be read back into a [`Timeline`] (the ordered
//! history of one stable id) or an [`Impact`] (everything invalidated
//! because of one revision).

pub mod audit;
pub mod record;
pub mod recorder;

pub use audit::{Impact, ImpactEntry, Timeline, TimelineEntry};
pub use record::{Bundle, BundleId, DerivationKind, Operation, Record};
