//! Emission of provenance bundles as store statements.
//!
//! Each record becomes one statement attached to its subject revision, in
//! bundle order. Invalidation statements also flag the subject, and the
//! store answers them with no row if the subject was already invalidated.

use serde_json::Value;
use tracing::debug;

use origins_prov::{Bundle, Record};
use origins_store::{cypher, Statement, StoreError, Transaction};
use origins_types::Packed;

use crate::error::{GraphError, GraphResult};

fn packed(bundle: &Bundle, seq: usize, record: &Record) -> GraphResult<Packed> {
    let mut map = match serde_json::to_value(record).map_err(StoreError::from)? {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::Serialization(format!("record serialized as {other}")).into())
        }
    };
    map.insert("bundle".into(), Value::String(bundle.id.to_string()));
    map.insert("operation".into(), Value::String(bundle.operation.to_string()));
    map.insert("bundle_time".into(), Value::from(bundle.time.as_millis()));
    map.insert("seq".into(), Value::from(seq as u64));
    Ok(map)
}

fn statement(bundle: &Bundle, seq: usize, record: &Record) -> GraphResult<Statement> {
    let map = packed(bundle, seq, record)?;
    Ok(match record {
        Record::Invalidation { .. } => cypher::record_invalidation(record.subject(), map),
        _ => cypher::record(record.subject(), map),
    })
}

/// Write every record of `bundle`.
///
/// Fails with `InvalidState` if any invalidated subject was already
/// invalid; the caller's scope then rolls the whole operation back.
pub(crate) fn emit(tx: &mut Transaction, bundle: &Bundle) -> GraphResult<()> {
    if bundle.is_empty() {
        return Ok(());
    }
    let statements = bundle
        .records
        .iter()
        .enumerate()
        .map(|(seq, r)| statement(bundle, seq, r))
        .collect::<GraphResult<Vec<_>>>()?;
    let results = tx.send(statements)?;

    for (record, result) in bundle.records.iter().zip(&results) {
        if result.is_empty() {
            return Err(match record {
                Record::Invalidation { entity, .. } => GraphError::InvalidState(format!(
                    "revision {entity} is already invalidated"
                )),
                other => GraphError::NotFound(format!(
                    "subject {} of {} record",
                    other.subject(),
                    other.kind()
                )),
            });
        }
    }
    debug!(
        bundle = %bundle.id.short_id(),
        operation = %bundle.operation,
        records = bundle.len(),
        "emitted provenance"
    );
    Ok(())
}
