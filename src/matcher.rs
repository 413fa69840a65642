//! Anchored pattern matching of rule requirements against the graph.
//!
//! For one rule, the matcher finds every *new* combination of existing
//! nodes, one per requirement slot, whose constraints structurally
//! match the slot ids. Matching is anchored: a candidate node for slot 0
//! is fixed first, then the remaining slots are satisfied greedily
//! against the rest of the graph. Slot ids are materialized as
//! constraints of the slot's kind, so the single structural-equality
//! routine drives all matching.
//!
//! The scratch copy of the requirement slots is consumed destructively:
//! a satisfied slot is blanked to [`ConstraintKind::Invalid`], the one
//! place that sentinel is used. The search fails for an anchor as soon
//! as any remaining slot has no match.
//!
//! Combinations found earlier in the same sweep, under any rule, are
//! not reported again; the memo compares combinations as node *sets*,
//! ignoring slot order. The memo lives in a [`SweepContext`] constructed
//! fresh per sweep, so nothing about a sweep outlives it.
//!
//! # Determinism
//! - Anchors are tried in graph-insertion order.
//! - Each remaining slot takes the first matching node in insertion
//!   order that is not already part of the combination.
//!
//! # Citations
//! - Subgraph isomorphism search: Ullmann, "An algorithm for subgraph
//!   isomorphism" (1976)
//! - Many-pattern matching: Forgy, "Rete: a fast algorithm for the many
//!   pattern/many object pattern match problem" (1982)

use crate::constraint::{Constraint, ConstraintKind};
use crate::graph::{ConstraintGraph, NodeId};
use crate::rule::CompiledRule;
use std::collections::HashSet;

/// One matched combination: one existing node per requirement slot, in
/// slot order, paired with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    /// Matched nodes, one per requirement slot.
    pub nodes: Vec<NodeId>,
    /// Index of the producing rule in the rule table.
    pub rule_index: usize,
}

/// Per-sweep scratch: the combination memo and the pairs found so far.
///
/// Construct a fresh context at the start of every fixed-point sweep;
/// dropping it is the only "clear" operation.
#[derive(Debug, Default)]
pub struct SweepContext {
    seen: HashSet<Vec<NodeId>>,
    found: Vec<Combination>,
}

impl SweepContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// All combinations found this sweep, in discovery order.
    pub fn combinations(&self) -> &[Combination] {
        &self.found
    }

    /// Whether any combination was found this sweep.
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    fn record(&mut self, combination: Combination) {
        let mut key = combination.nodes.clone();
        key.sort();
        if self.seen.insert(key) {
            self.found.push(combination);
        }
    }
}

/// Finds every new combination satisfying `rule` and records it in `ctx`.
pub fn find_new_matches(
    rule_index: usize,
    rule: &CompiledRule,
    graph: &ConstraintGraph,
    ctx: &mut SweepContext,
) {
    let slots = rule.requirement_slots();
    // Slot ids as constraints, materialized once per rule.
    let templates: Vec<Constraint> = slots.iter().map(|slot| slot.to_constraint()).collect();

    for anchor in graph.node_ids() {
        if !node_matches(graph, anchor, &templates[0]) {
            continue;
        }
        let mut remaining: Vec<ConstraintKind> = slots.iter().map(|slot| slot.kind).collect();
        remaining[0] = ConstraintKind::Invalid;
        let mut nodes = vec![anchor];
        let mut satisfied = true;

        while let Some(pos) = remaining
            .iter()
            .position(|&kind| kind != ConstraintKind::Invalid)
        {
            let found = graph.node_ids().find(|&candidate| {
                !nodes.contains(&candidate) && node_matches(graph, candidate, &templates[pos])
            });
            match found {
                Some(node) => {
                    nodes.push(node);
                    remaining[pos] = ConstraintKind::Invalid;
                }
                None => {
                    satisfied = false;
                    break;
                }
            }
        }

        if satisfied {
            ctx.record(Combination { nodes, rule_index });
        }
    }
}

fn node_matches(graph: &ConstraintGraph, id: NodeId, template: &Constraint) -> bool {
    match graph.get(id) {
        Some(node) => node.constraint().structurally_eq(template),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, VehicleId};
    use crate::rule::{catalog, RuleTable};

    fn v(raw: u32) -> VehicleId {
        VehicleId::new(raw)
    }

    fn table() -> RuleTable {
        RuleTable::new(catalog::standard_rules(3)).unwrap()
    }

    #[test]
    fn monitor_rule_anchors_on_its_monitor_node() {
        let rules = table();
        let mut graph = ConstraintGraph::new();
        let m = graph.insert_axiom(Constraint::monitor(v(1), v(2), 100.0));

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut ctx);
        }
        // Exactly the monitor[1,2] → relative[1,2] rule fires.
        assert_eq!(ctx.combinations().len(), 1);
        assert_eq!(ctx.combinations()[0].nodes, vec![m]);
    }

    #[test]
    fn multi_slot_rule_matches_distinct_nodes_in_slot_order() {
        let rules = table();
        let mut graph = ConstraintGraph::new();
        let c = graph.insert_axiom(Constraint::centroid(vec![v(1), v(2)]));
        let r = graph.insert_axiom(Constraint::relative(v(2), v(3)));

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut ctx);
        }
        // centroid{1,2} + relative(2,3) → relative(1,2) needs both nodes;
        // the centroid-swap rule matches the centroid alone.
        assert!(ctx
            .combinations()
            .iter()
            .any(|combo| combo.nodes == vec![c, r]));
        assert!(ctx.combinations().iter().any(|combo| combo.nodes == vec![c]));
    }

    #[test]
    fn incomplete_requirements_fail_the_anchor() {
        let rules = table();
        let mut graph = ConstraintGraph::new();
        graph.insert_axiom(Constraint::centroid(vec![v(1), v(2)]));
        graph.insert_axiom(Constraint::relative(v(3), v(1)));

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut ctx);
        }
        // No relative(2,_) exists, so only the swap rule's single-slot
        // combination survives.
        assert_eq!(ctx.combinations().len(), 1);
    }

    #[test]
    fn combinations_deduplicate_as_node_sets_within_a_sweep() {
        let rules = table();
        let mut graph = ConstraintGraph::new();
        graph.insert_axiom(Constraint::centroid(vec![v(1), v(2)]));

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut ctx);
        }
        // Both centroid-swap rules (centroid[1,2] and centroid[2,1])
        // match the same node set; only the first is reported.
        assert_eq!(ctx.combinations().len(), 1);

        // A fresh context forgets the memo.
        let mut fresh = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut fresh);
        }
        assert_eq!(fresh.combinations().len(), 1);
    }

    #[test]
    fn centroid_slots_match_order_free() {
        let rules = table();
        let mut graph = ConstraintGraph::new();
        // Stored as {2,1}; the centroid[1,2] slot still matches.
        let c = graph.insert_axiom(Constraint::centroid(vec![v(2), v(1)]));
        let r = graph.insert_axiom(Constraint::relative(v(2), v(3)));

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, &graph, &mut ctx);
        }
        assert!(ctx
            .combinations()
            .iter()
            .any(|combo| combo.nodes == vec![c, r]));
    }
}
