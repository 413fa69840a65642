//! Arena-allocated constraint graph with provenance edges.
//!
//! Nodes live in an append-only vector and are addressed by dense
//! [`NodeId`] handles; `children` point at the nodes whose combination
//! produced a derivation (empty for axioms) and `parents` point back at
//! everything derived from a node. Because a node can only reference
//! nodes that already exist at its creation time, every child index is
//! smaller than its parent's and the graph is a DAG by construction;
//! no cycle check is ever needed.
//!
//! Rollback is truncation: [`ConstraintGraph::mark`] captures the arena
//! length, and [`ConstraintGraph::rollback_to`] drops every younger node
//! and unwires the `parents` entries they left on survivors. The
//! surviving prefix is structurally identical to the graph at mark time.
//!
//! # Determinism
//! - `NodeId` ordering is by its inner `u32`, which is insertion order.
//! - All iteration is in insertion order.
//!
//! # Citations
//! - Arena allocation with dense handles: standard compiler-construction
//!   practice; see Muchnick, "Advanced Compiler Design and
//!   Implementation", Chapter 4 (1997)
//! - Reachability in DAGs: Cormen et al., "Introduction to Algorithms",
//!   Section 22.4 (2009)

use crate::constraint::{Constraint, SignatureHash};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Dense handle into a [`ConstraintGraph`] arena.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One constraint plus its provenance edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintNode {
    constraint: Constraint,
    signature: SignatureHash,
    children: Vec<NodeId>,
    parents: Vec<NodeId>,
}

impl ConstraintNode {
    /// The constraint this node carries.
    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Cached structural signature of the constraint.
    pub fn signature(&self) -> SignatureHash {
        self.signature
    }

    /// Nodes whose combination produced this node; empty for axioms.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Nodes derived using this node as a premise.
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Whether this node was injected directly (no provenance).
    pub fn is_axiom(&self) -> bool {
        self.children.is_empty()
    }
}

/// Opaque rollback point; see [`ConstraintGraph::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphMark(usize);

/// The working graph of axioms and derived facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintGraph {
    nodes: Vec<ConstraintNode>,
}

impl ConstraintGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops every node and all bookkeeping.
    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    /// Returns the node behind `id`, if the handle is live.
    pub fn get(&self, id: NodeId) -> Option<&ConstraintNode> {
        self.nodes.get(id.index())
    }

    /// Iterates `(id, node)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ConstraintNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx as u32), node))
    }

    /// Iterates live handles in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Injects an axiom (a candidate task; no provenance).
    pub fn insert_axiom(&mut self, constraint: Constraint) -> NodeId {
        self.push_node(constraint, Vec::new())
    }

    /// Inserts a derived fact wired to the combination that produced it.
    ///
    /// Every node in `premises` becomes a child of the new node, and the
    /// new node is recorded as a parent of each premise.
    pub fn insert_derived(&mut self, constraint: Constraint, premises: &[NodeId]) -> NodeId {
        let id = self.push_node(constraint, premises.to_vec());
        for &premise in premises {
            self.nodes[premise.index()].parents.push(id);
        }
        id
    }

    fn push_node(&mut self, constraint: Constraint, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let signature = constraint.signature();
        self.nodes.push(ConstraintNode {
            constraint,
            signature,
            children,
            parents: Vec::new(),
        });
        id
    }

    /// Finds the node structurally equal to `constraint`, skipping
    /// `excluding` (used while resolving a freshly inserted double).
    ///
    /// Signatures are compared first; equality is confirmed structurally.
    /// Scans in insertion order, so under the one-node-per-signature
    /// invariant the unique match is found deterministically.
    pub fn find_equal(
        &self,
        constraint: &Constraint,
        excluding: Option<NodeId>,
    ) -> Option<NodeId> {
        let signature = constraint.signature();
        for (id, node) in self.iter() {
            if Some(id) == excluding {
                continue;
            }
            if node.signature == signature && node.constraint.structurally_eq(constraint) {
                return Some(id);
            }
        }
        None
    }

    /// The descendant set of `id` as structural signatures: the
    /// transitive closure of `children`, including `id` itself.
    pub fn descendant_signatures(&self, id: NodeId) -> HashSet<SignatureHash> {
        let mut signatures = HashSet::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = &self.nodes[current.index()];
            signatures.insert(node.signature);
            stack.extend_from_slice(&node.children);
        }
        signatures
    }

    /// Whether the descendant set of `a` is a superset of `b`'s.
    ///
    /// Members are matched by structural signature, not handle identity.
    pub fn descendants_superset(&self, a: NodeId, b: NodeId) -> bool {
        let a_set = self.descendant_signatures(a);
        let b_set = self.descendant_signatures(b);
        b_set.is_subset(&a_set)
    }

    /// Captures the current arena length as a rollback point.
    pub fn mark(&self) -> GraphMark {
        GraphMark(self.nodes.len())
    }

    /// Removes every node inserted after `mark` and unwires the
    /// `parents` entries they left on surviving nodes.
    pub fn rollback_to(&mut self, mark: GraphMark) {
        for idx in mark.0..self.nodes.len() {
            let removed = NodeId(idx as u32);
            let children = std::mem::take(&mut self.nodes[idx].children);
            for child in children {
                if child.index() < mark.0 {
                    let parents = &mut self.nodes[child.index()].parents;
                    if let Some(pos) = parents.iter().rposition(|&p| p == removed) {
                        parents.remove(pos);
                    }
                }
            }
        }
        self.nodes.truncate(mark.0);
    }
}
