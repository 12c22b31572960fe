//! The statement vocabulary spoken to the graph store.
//!
//! Every statement is one of a fixed set of Cypher templates. Templates
//! never interpolate values: everything variable travels as a named
//! parameter, which also lets the in-memory store recognise a statement by
//! its text alone.
//!
//! Storage layout:
//!
//! - every revision is a node labelled `origins:Entity` whose properties
//!   are the packed attributes;
//! - edge revisions are reified as nodes linked to their endpoints with
//!   `origins:start` / `origins:end` relationships;
//! - invalidated revisions carry `origins:invalidated = true`;
//! - provenance records are `prov:Record` nodes pointing at their subject
//!   with `prov:entity`;
//! - resource membership uses `origins:manages` / `origins:includes`.

use serde_json::Value;

use origins_types::{Model, Packed, RevisionId};

use crate::protocol::Statement;

/// Every statement template the engine issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    CreateEntity,
    CreateEdge,
    GetEntity,
    GetLatest,
    MatchEntities,
    Revisions,
    IncidentEdges,
    Record,
    RecordInvalidation,
    LinkManaged,
    LinkIncluded,
    CopyManaged,
    CopyIncluded,
    Managed,
    Included,
    ManagedById,
    Owner,
    CountManaged,
    History,
    Triggered,
    CollectionResources,
    ConnectedComponents,
    UsedComponents,
    ConnectedResources,
    UsedResources,
    ComponentSources,
    CommonRelationships,
}

impl Query {
    pub const ALL: [Query; 27] = [
        Query::CreateEntity,
        Query::CreateEdge,
        Query::GetEntity,
        Query::GetLatest,
        Query::MatchEntities,
        Query::Revisions,
        Query::IncidentEdges,
        Query::Record,
        Query::RecordInvalidation,
        Query::LinkManaged,
        Query::LinkIncluded,
        Query::CopyManaged,
        Query::CopyIncluded,
        Query::Managed,
        Query::Included,
        Query::ManagedById,
        Query::Owner,
        Query::CountManaged,
        Query::History,
        Query::Triggered,
        Query::CollectionResources,
        Query::ConnectedComponents,
        Query::UsedComponents,
        Query::ConnectedResources,
        Query::UsedResources,
        Query::ComponentSources,
        Query::CommonRelationships,
    ];

    /// The Cypher text of this template.
    pub fn text(self) -> &'static str {
        match self {
            Self::CreateEntity => CREATE_ENTITY,
            Self::CreateEdge => CREATE_EDGE,
            Self::GetEntity => GET_ENTITY,
            Self::GetLatest => GET_LATEST,
            Self::MatchEntities => MATCH_ENTITIES,
            Self::Revisions => REVISIONS,
            Self::IncidentEdges => INCIDENT_EDGES,
            Self::Record => RECORD,
            Self::RecordInvalidation => RECORD_INVALIDATION,
            Self::LinkManaged => LINK_MANAGED,
            Self::LinkIncluded => LINK_INCLUDED,
            Self::CopyManaged => COPY_MANAGED,
            Self::CopyIncluded => COPY_INCLUDED,
            Self::Managed => MANAGED,
            Self::Included => INCLUDED,
            Self::ManagedById => MANAGED_BY_ID,
            Self::Owner => OWNER,
            Self::CountManaged => COUNT_MANAGED,
            Self::History => HISTORY,
            Self::Triggered => TRIGGERED,
            Self::CollectionResources => COLLECTION_RESOURCES,
            Self::ConnectedComponents => CONNECTED_COMPONENTS,
            Self::UsedComponents => USED_COMPONENTS,
            Self::ConnectedResources => CONNECTED_RESOURCES,
            Self::UsedResources => USED_RESOURCES,
            Self::ComponentSources => COMPONENT_SOURCES,
            Self::CommonRelationships => COMMON_RELATIONSHIPS,
        }
    }

    /// Recognise a statement by its text.
    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.text() == text)
    }

    fn statement(self) -> Statement {
        Statement::new(self.text())
    }
}

const CREATE_ENTITY: &str = r#"CREATE (n:`origins:Entity` $attrs)
RETURN n"#;

const CREATE_EDGE: &str = r#"MATCH (s:`origins:Entity` {`origins:uuid`: $start}), (t:`origins:Entity` {`origins:uuid`: $end})
WHERE s.`origins:invalidated` IS NULL AND t.`origins:invalidated` IS NULL
CREATE (s)<-[:`origins:start`]-(n:`origins:Entity` $attrs)-[:`origins:end`]->(t)
RETURN n"#;

const GET_ENTITY: &str = r#"MATCH (n:`origins:Entity` {`origins:uuid`: $uuid})
OPTIONAL MATCH (n)<-[:`prov:entity`]-(i:`prov:Record` {kind: 'prov:Invalidation'})
RETURN n, i"#;

const GET_LATEST: &str = r#"MATCH (n:`origins:Entity` {`origins:id`: $id, `origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
RETURN n"#;

const MATCH_ENTITIES: &str = r#"MATCH (n:`origins:Entity` {`origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
  AND all(k IN keys($predicate) WHERE n[k] = $predicate[k])
RETURN n
ORDER BY n.`origins:time`
SKIP $skip LIMIT $limit"#;

const REVISIONS: &str = r#"MATCH (n:`origins:Entity` {`origins:id`: $id, `origins:model`: $model})
OPTIONAL MATCH (n)<-[:`prov:entity`]-(i:`prov:Record` {kind: 'prov:Invalidation'})
RETURN n, i
ORDER BY n.`origins:time`"#;

const INCIDENT_EDGES: &str = r#"MATCH (e:`origins:Entity`)-[:`origins:start`|`origins:end`]->(:`origins:Entity` {`origins:uuid`: $uuid})
WHERE e.`origins:invalidated` IS NULL
RETURN DISTINCT e
ORDER BY e.`origins:time`"#;

const RECORD: &str = r#"MATCH (n:`origins:Entity` {`origins:uuid`: $uuid})
CREATE (n)<-[:`prov:entity`]-(r:`prov:Record` $record)
RETURN r"#;

const RECORD_INVALIDATION: &str = r#"MATCH (n:`origins:Entity` {`origins:uuid`: $uuid})
WHERE n.`origins:invalidated` IS NULL
SET n.`origins:invalidated` = true
CREATE (n)<-[:`prov:entity`]-(r:`prov:Record` $record)
RETURN r"#;

const LINK_MANAGED: &str = r#"MATCH (r:`origins:Entity` {`origins:uuid`: $resource}), (n:`origins:Entity` {`origins:uuid`: $uuid})
MERGE (r)-[:`origins:manages`]->(n)
RETURN n"#;

const LINK_INCLUDED: &str = r#"MATCH (r:`origins:Entity` {`origins:uuid`: $resource}), (n:`origins:Entity` {`origins:uuid`: $uuid})
MERGE (r)-[:`origins:includes`]->(n)
RETURN n"#;

const COPY_MANAGED: &str = r#"MATCH (r:`origins:Entity`)-[:`origins:manages`]->(:`origins:Entity` {`origins:uuid`: $previous}), (n:`origins:Entity` {`origins:uuid`: $next})
MERGE (r)-[:`origins:manages`]->(n)
RETURN r"#;

const COPY_INCLUDED: &str = r#"MATCH (r:`origins:Entity`)-[:`origins:includes`]->(:`origins:Entity` {`origins:uuid`: $previous}), (n:`origins:Entity` {`origins:uuid`: $next})
MERGE (r)-[:`origins:includes`]->(n)
RETURN r"#;

const MANAGED: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $resource, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(n:`origins:Entity` {`origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
RETURN DISTINCT n
ORDER BY n.`origins:time`"#;

const INCLUDED: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $resource, `origins:model`: 'origins:Resource'})-[:`origins:includes`]->(n:`origins:Entity` {`origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
RETURN DISTINCT n
ORDER BY n.`origins:time`"#;

const MANAGED_BY_ID: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $resource, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(n:`origins:Entity` {`origins:id`: $id, `origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
RETURN DISTINCT n"#;

const OWNER: &str = r#"MATCH (r:`origins:Entity`)-[:`origins:manages`]->(:`origins:Entity` {`origins:uuid`: $uuid})
RETURN r
ORDER BY r.`origins:time` DESC
LIMIT 1"#;

const COUNT_MANAGED: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $resource, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(n:`origins:Entity` {`origins:model`: $model})
WHERE n.`origins:invalidated` IS NULL
RETURN count(DISTINCT n)"#;

const HISTORY: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $id})<-[:`prov:entity`]-(r:`prov:Record`)
RETURN r
ORDER BY r.bundle_time, r.seq"#;

const TRIGGERED: &str = r#"MATCH (r:`prov:Record` {kind: 'prov:Invalidation', trigger: $uuid})
OPTIONAL MATCH (d:`prov:Record` {kind: 'prov:Derivation', type: 'prov:Revision', used: r.entity})
RETURN r, d"#;

const COLLECTION_RESOURCES: &str = r#"MATCH (:`origins:Entity` {`origins:id`: $collection, `origins:model`: 'origins:Collection'})-[:`origins:includes`]->(n:`origins:Entity` {`origins:model`: 'origins:Resource'})
WHERE n.`origins:invalidated` IS NULL
  AND all(k IN keys($predicate) WHERE n[k] = $predicate[k])
RETURN DISTINCT n
ORDER BY n.`origins:time`
SKIP $skip LIMIT $limit"#;

const CONNECTED_COMPONENTS: &str = r#"MATCH (c:`origins:Entity` {`origins:model`: 'origins:Component'})<-[:`origins:start`|`origins:end`]-(r:`origins:Entity` {`origins:model`: 'origins:Relationship'})
WHERE c.`origins:invalidated` IS NULL AND r.`origins:invalidated` IS NULL
WITH c, count(DISTINCT r) AS cnt
RETURN c, cnt
ORDER BY cnt DESC, c.`origins:time`
LIMIT $limit"#;

const USED_COMPONENTS: &str = r#"MATCH (res:`origins:Entity` {`origins:model`: 'origins:Resource'})-[:`origins:includes`]->(c:`origins:Entity` {`origins:model`: 'origins:Component'})
WHERE c.`origins:invalidated` IS NULL
  AND exists { MATCH (live:`origins:Entity` {`origins:id`: res.`origins:id`, `origins:model`: 'origins:Resource'}) WHERE live.`origins:invalidated` IS NULL }
  AND NOT exists { MATCH (:`origins:Entity` {`origins:id`: res.`origins:id`, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(c) }
WITH c, count(DISTINCT res.`origins:id`) AS cnt
RETURN c, cnt
ORDER BY cnt DESC, c.`origins:time`
LIMIT $limit"#;

const CONNECTED_RESOURCES: &str = r#"MATCH (res:`origins:Entity` {`origins:model`: 'origins:Resource'})
WHERE res.`origins:invalidated` IS NULL
MATCH (:`origins:Entity` {`origins:id`: res.`origins:id`, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(r:`origins:Entity` {`origins:model`: 'origins:Relationship'})
WHERE r.`origins:invalidated` IS NULL
WITH res, count(DISTINCT r) AS cnt
RETURN res, cnt
ORDER BY cnt DESC, res.`origins:time`
LIMIT $limit"#;

const USED_RESOURCES: &str = r#"MATCH (res:`origins:Entity` {`origins:model`: 'origins:Resource'})
WHERE res.`origins:invalidated` IS NULL
MATCH (:`origins:Entity` {`origins:id`: res.`origins:id`, `origins:model`: 'origins:Resource'})-[:`origins:manages`]->(c:`origins:Entity` {`origins:model`: 'origins:Component'})<-[:`origins:includes`]-(other:`origins:Entity` {`origins:model`: 'origins:Resource'})
WHERE c.`origins:invalidated` IS NULL
  AND other.`origins:id` <> res.`origins:id`
  AND exists { MATCH (live:`origins:Entity` {`origins:id`: other.`origins:id`, `origins:model`: 'origins:Resource'}) WHERE live.`origins:invalidated` IS NULL }
WITH res, count(DISTINCT c) AS cnt
RETURN res, cnt
ORDER BY cnt DESC, res.`origins:time`
LIMIT $limit"#;

const COMPONENT_SOURCES: &str = r#"MATCH (c:`origins:Entity` {`origins:model`: 'origins:Component'}), (d:`prov:Record` {kind: 'prov:Derivation', type: 'prov:PrimarySource'})
WHERE c.`origins:invalidated` IS NULL AND d.used = c.`origins:uuid`
WITH c, count(d) AS cnt
RETURN c, cnt
ORDER BY cnt DESC, c.`origins:time`
LIMIT $limit"#;

const COMMON_RELATIONSHIPS: &str = r#"MATCH (r:`origins:Entity` {`origins:model`: 'origins:Relationship'})
WHERE r.`origins:invalidated` IS NULL AND r.`origins:type` IS NOT NULL
RETURN r.`origins:type` AS type, count(r) AS cnt
ORDER BY cnt DESC, type
LIMIT $limit"#;

fn uuid(id: RevisionId) -> Value {
    Value::String(id.to_string())
}

fn model(m: Model) -> Value {
    Value::String(m.as_str().to_string())
}

pub fn create_entity(attrs: Packed) -> Statement {
    Query::CreateEntity.statement().param("attrs", attrs)
}

pub fn create_edge(attrs: Packed, start: RevisionId, end: RevisionId) -> Statement {
    Query::CreateEdge
        .statement()
        .param("attrs", attrs)
        .param("start", uuid(start))
        .param("end", uuid(end))
}

pub fn get_entity(id: RevisionId) -> Statement {
    Query::GetEntity.statement().param("uuid", uuid(id))
}

pub fn get_latest(id: &str, m: Model) -> Statement {
    Query::GetLatest
        .statement()
        .param("id", id)
        .param("model", model(m))
}

pub fn match_entities(m: Model, predicate: Packed, skip: usize, limit: usize) -> Statement {
    Query::MatchEntities
        .statement()
        .param("model", model(m))
        .param("predicate", predicate)
        .param("skip", skip as u64)
        .param("limit", limit as u64)
}

pub fn revisions(id: &str, m: Model) -> Statement {
    Query::Revisions
        .statement()
        .param("id", id)
        .param("model", model(m))
}

pub fn incident_edges(node: RevisionId) -> Statement {
    Query::IncidentEdges.statement().param("uuid", uuid(node))
}

/// Attach a provenance record to its subject.
pub fn record(subject: RevisionId, record: Packed) -> Statement {
    Query::Record
        .statement()
        .param("uuid", uuid(subject))
        .param("record", record)
}

/// Attach an invalidation record and mark the subject invalidated. Yields
/// no row if the subject is missing or already invalidated.
pub fn record_invalidation(subject: RevisionId, record: Packed) -> Statement {
    Query::RecordInvalidation
        .statement()
        .param("uuid", uuid(subject))
        .param("record", record)
}

pub fn link_managed(resource: RevisionId, member: RevisionId) -> Statement {
    Query::LinkManaged
        .statement()
        .param("resource", uuid(resource))
        .param("uuid", uuid(member))
}

pub fn link_included(resource: RevisionId, member: RevisionId) -> Statement {
    Query::LinkIncluded
        .statement()
        .param("resource", uuid(resource))
        .param("uuid", uuid(member))
}

pub fn copy_managed(previous: RevisionId, next: RevisionId) -> Statement {
    Query::CopyManaged
        .statement()
        .param("previous", uuid(previous))
        .param("next", uuid(next))
}

pub fn copy_included(previous: RevisionId, next: RevisionId) -> Statement {
    Query::CopyIncluded
        .statement()
        .param("previous", uuid(previous))
        .param("next", uuid(next))
}

pub fn managed(resource: &str, m: Model) -> Statement {
    Query::Managed
        .statement()
        .param("resource", resource)
        .param("model", model(m))
}

pub fn included(resource: &str, m: Model) -> Statement {
    Query::Included
        .statement()
        .param("resource", resource)
        .param("model", model(m))
}

pub fn managed_by_id(resource: &str, id: &str, m: Model) -> Statement {
    Query::ManagedById
        .statement()
        .param("resource", resource)
        .param("id", id)
        .param("model", model(m))
}

pub fn owner(member: RevisionId) -> Statement {
    Query::Owner.statement().param("uuid", uuid(member))
}

pub fn count_managed(resource: &str, m: Model) -> Statement {
    Query::CountManaged
        .statement()
        .param("resource", resource)
        .param("model", model(m))
}

pub fn history(id: &str) -> Statement {
    Query::History.statement().param("id", id)
}

pub fn triggered(origin: RevisionId) -> Statement {
    Query::Triggered.statement().param("uuid", uuid(origin))
}

pub fn collection_resources(collection: &str, predicate: Packed, skip: usize, limit: usize) -> Statement {
    Query::CollectionResources
        .statement()
        .param("collection", collection)
        .param("predicate", predicate)
        .param("skip", skip as u64)
        .param("limit", limit as u64)
}

/// One of the ranked trend queries, capped at `limit` rows.
pub fn trend(query: Query, limit: usize) -> Statement {
    query.statement().param("limit", limit as u64)
}
