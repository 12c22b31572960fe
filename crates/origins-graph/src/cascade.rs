//! Dependency cascades over edges.
//!
//! Two independent state machines decide how edges react to their
//! endpoints:
//!
//! - **Update propagation** looks only at [`Direction`]. When node `X` is
//!   superseded by `X'`, every valid edge touching `X` is either rewired to
//!   `X'` (if the touched side is watched) or detached.
//! - **Removal cascade** looks only at [`Dependence`]. Removing `X` removes
//!   every edge touching it, and dependent endpoints are pulled in until a
//!   fixpoint is reached.
//!
//! Both decisions are made by pure planners. The removal planner is generic
//! over a [`Neighbourhood`], so it runs against the store or against any
//! in-process adjacency.
//!
//! [`Direction`]: origins_types::Direction
//! [`Dependence`]: origins_types::Dependence

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use origins_prov::{recorder, Bundle, Operation};
use origins_store::{cypher, Transaction};
use origins_types::{Edge, Node, Reason, RevisionId, Versioned};

use crate::access;
use crate::emit::emit;
use crate::error::{GraphError, GraphResult};
use crate::rows;

/// What happens to an edge when one of its endpoints is superseded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeAction {
    /// The edge does not touch the superseded node.
    Keep,
    /// Replace the edge with a revision between these endpoints.
    Rewire { start: RevisionId, end: RevisionId },
    /// Invalidate the edge without replacement.
    Detach,
}

/// Decide how `edge` reacts to `previous` being superseded by `next`.
///
/// Each endpoint equal to `previous` is replaced only if its side is
/// watched. If any such endpoint is not watched the edge is detached.
pub fn plan_update(edge: &Edge, previous: RevisionId, next: RevisionId) -> EdgeAction {
    let start_hit = edge.start == previous;
    let end_hit = edge.end == previous;
    if !start_hit && !end_hit {
        return EdgeAction::Keep;
    }
    if (start_hit && !edge.direction.follows_start()) || (end_hit && !edge.direction.follows_end()) {
        return EdgeAction::Detach;
    }
    EdgeAction::Rewire {
        start: if start_hit { next } else { edge.start },
        end: if end_hit { next } else { edge.end },
    }
}

/// Read access to the neighbourhood of a node.
pub trait Neighbourhood {
    type Error;

    /// Valid edges with `node` as either endpoint.
    fn incident_edges(&mut self, node: RevisionId) -> Result<Vec<Edge>, Self::Error>;

    /// Any stored node revision.
    fn node(&mut self, uuid: RevisionId) -> Result<Option<Node>, Self::Error>;
}

impl Neighbourhood for Transaction {
    type Error = GraphError;

    fn incident_edges(&mut self, node: RevisionId) -> GraphResult<Vec<Edge>> {
        let result = self.execute(cypher::incident_edges(node))?;
        rows::edges(&result)
    }

    fn node(&mut self, uuid: RevisionId) -> GraphResult<Option<Node>> {
        access::fetch_node(self, uuid)
    }
}

/// Everything a removal takes down, in invalidation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemovalPlan {
    pub edges: Vec<Edge>,
    /// The removed node first, then its dependents in discovery order.
    pub nodes: Vec<Node>,
}

impl RemovalPlan {
    pub fn node_ids(&self) -> Vec<RevisionId> {
        self.nodes.iter().map(Versioned::uuid).collect()
    }

    pub fn edge_ids(&self) -> Vec<RevisionId> {
        self.edges.iter().map(Versioned::uuid).collect()
    }
}

/// Collect the edges and dependent nodes removed along with `origin`.
///
/// Breadth-first over a frontier of removed nodes. Each edge is resolved
/// once; already-invalidated nodes are skipped.
pub fn plan_removal<N: Neighbourhood>(lookup: &mut N, origin: &Node) -> Result<RemovalPlan, N::Error> {
    let mut plan = RemovalPlan::default();
    let mut seen_nodes: HashSet<RevisionId> = HashSet::new();
    let mut seen_edges: HashSet<RevisionId> = HashSet::new();
    let mut frontier: VecDeque<RevisionId> = VecDeque::new();

    seen_nodes.insert(origin.uuid());
    plan.nodes.push(origin.clone());
    frontier.push_back(origin.uuid());

    while let Some(current) = frontier.pop_front() {
        for edge in lookup.incident_edges(current)? {
            if !seen_edges.insert(edge.uuid()) {
                continue;
            }
            let mut dependents = Vec::with_capacity(2);
            if edge.start == current && edge.dependence.cascades_from_start() {
                dependents.push(edge.end);
            }
            if edge.end == current && edge.dependence.cascades_from_end() {
                dependents.push(edge.start);
            }
            plan.edges.push(edge);

            for dependent in dependents {
                if !seen_nodes.insert(dependent) {
                    continue;
                }
                match lookup.node(dependent)? {
                    Some(node) if node.is_valid() => {
                        plan.nodes.push(node);
                        frontier.push_back(dependent);
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(plan)
}

/// Carry the valid edges of `previous` over to `next` and record the
/// effects into `bundle`. Returns the new edge revisions.
pub(crate) fn propagate_update(
    tx: &mut Transaction,
    previous: &Node,
    next: &Node,
    bundle: &mut Bundle,
) -> GraphResult<Vec<Edge>> {
    let trigger = next.uuid();
    let mut revised = Vec::new();
    let mut detached = 0usize;

    for edge in tx.incident_edges(previous.uuid())? {
        match plan_update(&edge, previous.uuid(), next.uuid()) {
            EdgeAction::Keep => {}
            EdgeAction::Rewire { start, end } => {
                let replacement = edge.rewire(start, end);
                access::persist_edge(tx, &replacement)?;
                access::carry_links(tx, edge.uuid(), replacement.uuid());
                bundle.absorb(recorder::revised(
                    &edge.entity,
                    &replacement.entity,
                    Reason::NodeChange,
                    Some(trigger),
                ));
                revised.push(replacement);
            }
            EdgeAction::Detach => {
                bundle.absorb(recorder::removed(&edge.entity, Reason::NodeChange, Some(trigger)));
                detached += 1;
            }
        }
    }
    if !revised.is_empty() || detached > 0 {
        debug!(
            node = %next.uuid().short_id(),
            rewired = revised.len(),
            detached,
            "propagated node update"
        );
    }
    Ok(revised)
}

/// Remove `origin` with everything that depends on it, as one bundle.
///
/// `origin` is invalidated for `reason`, attributed to `cause` if given.
/// Everything pulled in by the cascade is attributed to `origin`.
pub(crate) fn remove_node(
    tx: &mut Transaction,
    origin: &Node,
    reason: Reason,
    cause: Option<RevisionId>,
) -> GraphResult<RemovalPlan> {
    let plan = plan_removal(tx, origin)?;
    let trigger = origin.uuid();

    let mut bundle = Bundle::new(Operation::Remove);
    for edge in &plan.edges {
        bundle.absorb(recorder::removed(&edge.entity, Reason::NodeRemoved, Some(trigger)));
    }
    for node in &plan.nodes {
        if node.uuid() == trigger {
            bundle.absorb(recorder::removed(&node.entity, reason.clone(), cause));
        } else {
            bundle.absorb(recorder::removed(&node.entity, Reason::NodeRemoved, Some(trigger)));
        }
    }
    emit(tx, &bundle)?;

    if plan.nodes.len() > 1 || !plan.edges.is_empty() {
        info!(
            node = %trigger.short_id(),
            nodes = plan.nodes.len(),
            edges = plan.edges.len(),
            "removal cascaded"
        );
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use origins_types::{Attributes, Dependence, Direction, Model};

    /// In-process adjacency standing in for the store.
    #[derive(Default)]
    struct Adjacency {
        nodes: HashMap<RevisionId, Node>,
        edges: Vec<Edge>,
        lookups: usize,
    }

    impl Adjacency {
        fn add_node(&mut self, id: &str) -> RevisionId {
            let n = Node::new(Model::Node, Attributes::new().with_id(id));
            let uuid = n.uuid();
            self.nodes.insert(uuid, n);
            uuid
        }

        fn add_edge(&mut self, start: RevisionId, end: RevisionId, dependence: Dependence) -> RevisionId {
            let e = edge(start, end, Direction::Directed, dependence);
            let uuid = e.uuid();
            self.edges.push(e);
            uuid
        }

        fn origin(&self, uuid: RevisionId) -> Node {
            self.nodes[&uuid].clone()
        }
    }

    impl Neighbourhood for Adjacency {
        type Error = std::convert::Infallible;

        fn incident_edges(&mut self, node: RevisionId) -> Result<Vec<Edge>, Self::Error> {
            self.lookups += 1;
            Ok(self.edges.iter().filter(|e| e.touches(node)).cloned().collect())
        }

        fn node(&mut self, uuid: RevisionId) -> Result<Option<Node>, Self::Error> {
            Ok(self.nodes.get(&uuid).cloned())
        }
    }

    fn edge(start: RevisionId, end: RevisionId, direction: Direction, dependence: Dependence) -> Edge {
        Edge::new(Model::Edge, Attributes::new(), start, end, direction, dependence)
    }

    fn sorted(mut ids: Vec<RevisionId>) -> Vec<RevisionId> {
        ids.sort();
        ids
    }

    // ---------------------------------------------------------------
    // Update propagation
    // ---------------------------------------------------------------

    #[test]
    fn update_follows_watched_side_only() {
        let (x, y, next) = (RevisionId::new(), RevisionId::new(), RevisionId::new());
        let cases = [
            // (direction, x is start, expected rewire)
            (Direction::Directed, true, true),
            (Direction::Directed, false, false),
            (Direction::Bidirected, true, true),
            (Direction::Bidirected, false, true),
            (Direction::Reverse, true, false),
            (Direction::Reverse, false, true),
            (Direction::Undirected, true, false),
            (Direction::Undirected, false, false),
        ];
        for (direction, x_is_start, rewires) in cases {
            let e = if x_is_start {
                edge(x, y, direction, Dependence::None)
            } else {
                edge(y, x, direction, Dependence::None)
            };
            let action = plan_update(&e, x, next);
            if rewires {
                let expected = if x_is_start {
                    EdgeAction::Rewire { start: next, end: y }
                } else {
                    EdgeAction::Rewire { start: y, end: next }
                };
                assert_eq!(action, expected, "{direction} start={x_is_start}");
            } else {
                assert_eq!(action, EdgeAction::Detach, "{direction} start={x_is_start}");
            }
        }
    }

    #[test]
    fn untouched_edge_is_kept() {
        let e = edge(RevisionId::new(), RevisionId::new(), Direction::Directed, Dependence::None);
        assert_eq!(plan_update(&e, RevisionId::new(), RevisionId::new()), EdgeAction::Keep);
    }

    #[test]
    fn self_loop_needs_both_sides_watched() {
        let (x, next) = (RevisionId::new(), RevisionId::new());
        let directed = edge(x, x, Direction::Directed, Dependence::None);
        assert_eq!(plan_update(&directed, x, next), EdgeAction::Detach);
        let both = edge(x, x, Direction::Bidirected, Dependence::None);
        assert_eq!(
            plan_update(&both, x, next),
            EdgeAction::Rewire { start: next, end: next }
        );
    }

    // ---------------------------------------------------------------
    // Removal cascade
    // ---------------------------------------------------------------

    #[test]
    fn dependence_table() {
        // (dependence, remove start?, other endpoint removed?)
        let cases = [
            (Dependence::None, true, false),
            (Dependence::None, false, false),
            (Dependence::Forward, true, false),
            (Dependence::Forward, false, true),
            (Dependence::Inverse, true, true),
            (Dependence::Inverse, false, false),
            (Dependence::Mutual, true, true),
            (Dependence::Mutual, false, true),
        ];
        for (dependence, remove_start, cascades) in cases {
            let mut g = Adjacency::default();
            let a = g.add_node("a");
            let b = g.add_node("b");
            let e = g.add_edge(a, b, dependence);
            let (removed, other) = if remove_start { (a, b) } else { (b, a) };
            let origin = g.origin(removed);
            let plan = plan_removal(&mut g, &origin).unwrap();
            assert_eq!(plan.edge_ids(), vec![e], "{dependence}");
            assert_eq!(
                plan.node_ids().contains(&other),
                cascades,
                "{dependence} remove_start={remove_start}"
            );
        }
    }

    #[test]
    fn ring_with_forward_dependence_removes_everything_once() {
        const N: usize = 6;
        let mut g = Adjacency::default();
        let nodes: Vec<RevisionId> = (0..N).map(|i| g.add_node(&format!("n{i}"))).collect();
        let edges: Vec<RevisionId> = (0..N)
            .map(|i| g.add_edge(nodes[i], nodes[(i + 1) % N], Dependence::Forward))
            .collect();

        let origin = g.origin(nodes[0]);
        let plan = plan_removal(&mut g, &origin).unwrap();
        assert_eq!(plan.nodes.len(), N);
        assert_eq!(plan.edges.len(), N);
        assert_eq!(sorted(plan.node_ids()), sorted(nodes.clone()));
        assert_eq!(sorted(plan.edge_ids()), sorted(edges));
        assert_eq!(plan.nodes[0].uuid(), nodes[0]);
        // Each node's neighbourhood is read exactly once.
        assert_eq!(g.lookups, N);
    }

    #[test]
    fn independent_neighbours_survive() {
        let mut g = Adjacency::default();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_edge(a, b, Dependence::None);
        g.add_edge(c, a, Dependence::Inverse);
        let origin = g.origin(a);
        let plan = plan_removal(&mut g, &origin).unwrap();
        assert_eq!(plan.nodes.len(), 1);
        assert_eq!(plan.edges.len(), 2);
    }

    #[test]
    fn invalidated_dependents_are_skipped() {
        let mut g = Adjacency::default();
        let a = g.add_node("a");
        let b = g.add_node("b");
        g.add_edge(a, b, Dependence::Mutual);
        g.nodes.get_mut(&b).unwrap().entity.invalidation = Some(origins_types::Invalidation {
            reason: Reason::RemovedByUser,
            time: origins_types::Timestamp::now(),
            trigger: None,
        });
        let origin = g.origin(a);
        let plan = plan_removal(&mut g, &origin).unwrap();
        assert_eq!(plan.node_ids(), vec![a]);
    }
}
