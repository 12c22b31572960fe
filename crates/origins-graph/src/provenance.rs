//! Provenance queries over stored bundles.

use tracing::debug;

use origins_prov::{recorder, Bundle, DerivationKind, Impact, Record, Timeline};
use origins_store::{cypher, Transaction};
use origins_types::RevisionId;

use crate::access;
use crate::emit::emit;
use crate::error::{GraphError, GraphResult};
use crate::rows;

fn ensure_exists(tx: &mut Transaction, uuid: RevisionId) -> GraphResult<()> {
    if access::fetch_node(tx, uuid)?.is_some() || access::fetch_edge(tx, uuid)?.is_some() {
        return Ok(());
    }
    Err(GraphError::NotFound(format!("revision {uuid}")))
}

/// Every provenance event recorded for any revision of `id`, in order.
pub fn timeline(tx: &mut Transaction, id: &str) -> GraphResult<Timeline> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::history(id))?;
        let entries = result
            .first_column()
            .map(rows::timeline_entry)
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Timeline::new(id, entries))
    })
}

/// Revisions invalidated because of `origin`, with their replacements.
pub fn impact(tx: &mut Transaction, origin: RevisionId) -> GraphResult<Impact> {
    tx.scope(|tx| {
        let result = tx.execute(cypher::triggered(origin))?;
        let mut records: Vec<Record> = Vec::with_capacity(result.len() * 2);
        for row in result.rows() {
            for value in row.iter().filter(|v| !v.is_null()) {
                records.push(rows::record(value)?);
            }
        }
        Ok(Impact::from_records(origin, &records))
    })
}

/// Record that `generated` was derived from `used`.
///
/// Both revisions must exist; neither has to be valid. Revision
/// derivations are written by the engine itself and cannot be declared.
pub fn derive(
    tx: &mut Transaction,
    generated: RevisionId,
    used: RevisionId,
    kind: DerivationKind,
) -> GraphResult<Bundle> {
    tx.scope(|tx| {
        if kind == DerivationKind::Revision {
            return Err(GraphError::Validation(
                "revision derivations are recorded by set".into(),
            ));
        }
        if generated == used {
            return Err(GraphError::Validation(format!("{used} cannot derive from itself")));
        }
        ensure_exists(tx, generated)?;
        ensure_exists(tx, used)?;
        let bundle = recorder::derived(generated, used, kind);
        emit(tx, &bundle)?;
        debug!(generated = %generated.short_id(), used = %used.short_id(), %kind, "recorded derivation");
        Ok(bundle)
    })
}
