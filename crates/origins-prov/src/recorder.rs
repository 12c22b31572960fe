//! The provenance recorder.
//!
//! Pure functions from entity revisions to [`Bundle`]s. Nothing here
//! touches the store: emitting a bundle is the caller's job.

use origins_types::{Entity, Reason, RevisionId, Timestamp};

use crate::record::{Bundle, DerivationKind, Operation, Record};

/// Bundle for a brand-new entity: a timed generation and its
/// specialization of the stable id.
pub fn added(entity: &Entity) -> Bundle {
    let mut bundle = Bundle::new(Operation::Add);
    bundle.push(Record::Generation {
        entity: entity.uuid,
        time: Some(entity.time),
    });
    bundle.push(Record::Specialization {
        specific: entity.uuid,
        general: entity.id.clone(),
    });
    bundle
}

/// Bundle for a revision superseding `previous`.
///
/// `trigger` names the revision whose change caused this one, when the
/// revision is a cascade effect rather than a direct edit.
pub fn revised(
    previous: &Entity,
    next: &Entity,
    reason: Reason,
    trigger: Option<RevisionId>,
) -> Bundle {
    let mut bundle = Bundle::new(Operation::Set);
    bundle.push(Record::Invalidation {
        entity: previous.uuid,
        reason,
        time: next.time,
        trigger,
    });
    bundle.push(Record::Generation {
        entity: next.uuid,
        time: None,
    });
    bundle.push(Record::Derivation {
        generated: next.uuid,
        used: previous.uuid,
        derivation: DerivationKind::Revision,
    });
    bundle.push(Record::Specialization {
        specific: next.uuid,
        general: next.id.clone(),
    });
    bundle
}

/// Bundle for a removal.
pub fn removed(entity: &Entity, reason: Reason, trigger: Option<RevisionId>) -> Bundle {
    let mut bundle = Bundle::new(Operation::Remove);
    bundle.push(Record::Invalidation {
        entity: entity.uuid,
        reason,
        time: Timestamp::now(),
        trigger,
    });
    bundle
}

/// Bundle declaring that `generated` was derived from `used`, for
/// lineage the engine cannot infer, such as a primary source.
pub fn derived(generated: RevisionId, used: RevisionId, derivation: DerivationKind) -> Bundle {
    let mut bundle = Bundle::new(Operation::Derive);
    bundle.push(Record::Derivation {
        generated,
        used,
        derivation,
    });
    bundle
}
