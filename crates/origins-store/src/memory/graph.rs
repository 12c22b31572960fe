//! Arena-backed property graph used by [`MemoryStore`](super::MemoryStore).
//!
//! Entities live in a `Vec` and are addressed by [`Slot`] handles. Links
//! between entities are kept in an adjacency map keyed by
//! `(slot, link kind)` in both directions, so neighbourhood lookups never
//! scan the arena.

use std::collections::HashMap;

use serde_json::Value;

use origins_types::pack::attr;
use origins_types::Packed;

/// Marks an entity as no longer valid.
pub(crate) const INVALIDATED: &str = "origins:invalidated";

/// Opaque handle of an entity in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Slot(u32);

/// Kinds of structural link between stored entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Link {
    /// Edge revision to its start node.
    Start,
    /// Edge revision to its end node.
    End,
    /// Resource to a member it owns.
    Manages,
    /// Resource to a member it references.
    Includes,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct GraphState {
    entities: Vec<Packed>,
    by_uuid: HashMap<String, Slot>,
    outgoing: HashMap<(Slot, Link), Vec<Slot>>,
    incoming: HashMap<(Slot, Link), Vec<Slot>>,
    records: Vec<Packed>,
    subject_records: HashMap<Slot, Vec<usize>>,
}

impl GraphState {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Store a packed entity. Returns `None` if it has no uuid or the uuid
    /// is already taken.
    pub fn insert(&mut self, attrs: Packed) -> Option<Slot> {
        let uuid = attrs.get(attr::UUID)?.as_str()?.to_string();
        if self.by_uuid.contains_key(&uuid) {
            return None;
        }
        let slot = Slot(u32::try_from(self.entities.len()).ok()?);
        self.entities.push(attrs);
        self.by_uuid.insert(uuid, slot);
        Some(slot)
    }

    pub fn slot(&self, uuid: &str) -> Option<Slot> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn attrs(&self, slot: Slot) -> &Packed {
        &self.entities[slot.0 as usize]
    }

    pub fn is_valid(&self, slot: Slot) -> bool {
        self.attrs(slot).get(INVALIDATED) != Some(&Value::Bool(true))
    }

    /// Flag an entity invalidated. Returns `false` if it already was.
    pub fn invalidate(&mut self, slot: Slot) -> bool {
        if !self.is_valid(slot) {
            return false;
        }
        self.entities[slot.0 as usize].insert(INVALIDATED.into(), Value::Bool(true));
        true
    }

    pub fn str_attr(&self, slot: Slot, key: &str) -> Option<&str> {
        self.attrs(slot).get(key).and_then(Value::as_str)
    }

    pub fn time(&self, slot: Slot) -> i64 {
        self.attrs(slot)
            .get(attr::TIME)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    /// All slots, in insertion order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        (0..self.entities.len() as u32).map(Slot)
    }

    /// Slots carrying the given stable id and model.
    pub fn with_id<'a>(&'a self, id: &'a str, model: Option<&'a str>) -> impl Iterator<Item = Slot> + 'a {
        self.slots().filter(move |&s| {
            self.str_attr(s, attr::ID) == Some(id)
                && model.map_or(true, |m| self.str_attr(s, attr::MODEL) == Some(m))
        })
    }

    /// Create a link unless it already exists.
    pub fn link(&mut self, from: Slot, kind: Link, to: Slot) {
        let out = self.outgoing.entry((from, kind)).or_default();
        if out.contains(&to) {
            return;
        }
        out.push(to);
        self.incoming.entry((to, kind)).or_default().push(from);
    }

    pub fn targets(&self, from: Slot, kind: Link) -> &[Slot] {
        self.outgoing
            .get(&(from, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sources(&self, to: Slot, kind: Link) -> &[Slot] {
        self.incoming
            .get(&(to, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_record(&mut self, subject: Slot, record: Packed) {
        let index = self.records.len();
        self.records.push(record);
        self.subject_records.entry(subject).or_default().push(index);
    }

    pub fn records_of(&self, subject: Slot) -> impl Iterator<Item = &Packed> + '_ {
        self.subject_records
            .get(&subject)
            .into_iter()
            .flatten()
            .map(move |&i| &self.records[i])
    }

    pub fn records(&self) -> impl Iterator<Item = &Packed> + '_ {
        self.records.iter()
    }

    /// The invalidation record of an entity, if any.
    pub fn invalidation_of(&self, subject: Slot) -> Option<&Packed> {
        self.records_of(subject)
            .find(|r| r.get("kind").and_then(Value::as_str) == Some("prov:Invalidation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(uuid: &str, id: &str, time: i64) -> Packed {
        let mut p = Packed::new();
        p.insert(attr::UUID.into(), json!(uuid));
        p.insert(attr::ID.into(), json!(id));
        p.insert(attr::MODEL.into(), json!("origins:Node"));
        p.insert(attr::TIME.into(), json!(time));
        p
    }

    #[test]
    fn insert_and_lookup() {
        let mut g = GraphState::default();
        let s = g.insert(entity("u1", "a", 1)).unwrap();
        assert_eq!(g.slot("u1"), Some(s));
        assert_eq!(g.len(), 1);
        assert!(g.is_valid(s));
    }

    #[test]
    fn duplicate_uuid_rejected() {
        let mut g = GraphState::default();
        g.insert(entity("u1", "a", 1)).unwrap();
        assert!(g.insert(entity("u1", "b", 2)).is_none());
    }

    #[test]
    fn invalidate_once() {
        let mut g = GraphState::default();
        let s = g.insert(entity("u1", "a", 1)).unwrap();
        assert!(g.invalidate(s));
        assert!(!g.invalidate(s));
        assert!(!g.is_valid(s));
    }

    #[test]
    fn links_are_idempotent_and_bidirectional() {
        let mut g = GraphState::default();
        let r = g.insert(entity("r", "res", 1)).unwrap();
        let n = g.insert(entity("n", "comp", 2)).unwrap();
        g.link(r, Link::Manages, n);
        g.link(r, Link::Manages, n);
        assert_eq!(g.targets(r, Link::Manages), &[n]);
        assert_eq!(g.sources(n, Link::Manages), &[r]);
        assert!(g.targets(r, Link::Includes).is_empty());
    }

    #[test]
    fn with_id_filters_by_model() {
        let mut g = GraphState::default();
        g.insert(entity("u1", "a", 1)).unwrap();
        g.insert(entity("u2", "a", 2)).unwrap();
        g.insert(entity("u3", "b", 3)).unwrap();
        assert_eq!(g.with_id("a", Some("origins:Node")).count(), 2);
        assert_eq!(g.with_id("a", Some("origins:Edge")).count(), 0);
        assert_eq!(g.with_id("b", None).count(), 1);
    }
}
