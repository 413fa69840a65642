//! Derivation of result constraints and conflict resolution.
//!
//! Applying a matched combination decodes the rule's result pattern into
//! slots, builds one derived node per slot with the whole combination as
//! its provenance, and triages each new node against the graph:
//!
//! - **Accepted**: no structural double exists; the node stays.
//! - **Redundant**: a double exists and the new node's descendant set
//!   (transitive closure of `children`, including itself) is a superset
//!   of the double's: the new derivation adds no information not already
//!   captured, so it is unwired and discarded.
//! - **Contradiction**: the same fact was derived from two provenance
//!   sets neither of which subsumes the other. The antecedent
//!   combination is inconsistent with the graph's history; the caller
//!   must reject the whole candidate set.
//!
//! The superset rule is deliberately exactly this weak: it does not ask
//! whether the non-overlapping extra provenance is itself mutually
//! consistent with the rest of the graph, and so can under-reject in
//! some rule corpora. Strengthening it would change which candidate
//! sets are rejected, so it stays as is.
//!
//! # Citations
//! - Justification-based truth maintenance: Doyle, "A truth maintenance
//!   system" (1979)
//! - Assumption-based TMS (provenance environments): de Kleer, "An
//!   assumption-based TMS" (1986)

use crate::graph::{ConstraintGraph, NodeId};
use crate::matcher::Combination;
use crate::rule::CompiledRule;

/// Outcome of resolving one freshly derived node against the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No structural double; the node is new information.
    Accepted,
    /// Subsumed by an existing double; discard the new node.
    Redundant,
    /// Unreconcilable double; reject the candidate set.
    Contradiction,
}

/// Summary of applying one combination's result pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Nodes inserted and kept.
    pub accepted: u32,
    /// Nodes discarded as subsumed.
    pub redundant: u32,
    /// Whether a contradiction aborted the application.
    pub contradicted: bool,
}

/// Resolves a freshly inserted derived node against the rest of the graph.
///
/// `node` must be the most recently inserted node, at the one moment two
/// structurally-equal nodes may coexist in the graph.
pub fn resolve(node: NodeId, graph: &ConstraintGraph) -> Resolution {
    let constraint = match graph.get(node) {
        Some(n) => n.constraint(),
        None => return Resolution::Accepted,
    };
    match graph.find_equal(constraint, Some(node)) {
        None => Resolution::Accepted,
        Some(existing) => {
            if graph.descendants_superset(node, existing) {
                Resolution::Redundant
            } else {
                Resolution::Contradiction
            }
        }
    }
}

/// Builds and resolves every result node for one matched combination.
///
/// Redundant nodes are unwired immediately; on contradiction the
/// offending node is unwired and application stops, leaving the caller
/// to roll back the wider check.
pub fn apply_combination(
    combination: &Combination,
    rule: &CompiledRule,
    graph: &mut ConstraintGraph,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for slot in rule.result_slots() {
        let mark = graph.mark();
        let node = graph.insert_derived(slot.to_constraint(), &combination.nodes);
        match resolve(node, graph) {
            Resolution::Accepted => outcome.accepted += 1,
            Resolution::Redundant => {
                graph.rollback_to(mark);
                outcome.redundant += 1;
            }
            Resolution::Contradiction => {
                graph.rollback_to(mark);
                outcome.contradicted = true;
                return outcome;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, VehicleId};
    use crate::rule::{decode_slots, CompiledRule, InferenceRule, RuleTable};
    use crate::constraint::ConstraintKind::{Monitor, Relative};

    fn v(raw: u32) -> VehicleId {
        VehicleId::new(raw)
    }

    fn compiled(rule: InferenceRule) -> CompiledRule {
        let table = RuleTable::new(vec![rule]).unwrap();
        let compiled = table.iter().next().unwrap().clone();
        compiled
    }

    #[test]
    fn novel_facts_are_accepted_and_wired() {
        let mut graph = ConstraintGraph::new();
        let m = graph.insert_axiom(Constraint::monitor(v(1), v(2), 100.0));
        let rule = compiled(InferenceRule {
            requirement: vec![(Monitor, v(1)), (Monitor, v(2))],
            result: vec![(Relative, v(1)), (Relative, v(2))],
        });
        let combo = Combination {
            nodes: vec![m],
            rule_index: 0,
        };

        let outcome = apply_combination(&combo, &rule, &mut graph);
        assert_eq!(outcome.accepted, 1);
        assert!(!outcome.contradicted);
        assert_eq!(graph.len(), 2);
        let derived = graph
            .find_equal(&Constraint::relative(v(1), v(2)), None)
            .unwrap();
        assert_eq!(graph.get(derived).unwrap().children(), &[m]);
        assert_eq!(graph.get(m).unwrap().parents(), &[derived]);
    }

    #[test]
    fn subsumed_rederivation_is_redundant_and_leaves_no_trace() {
        let mut graph = ConstraintGraph::new();
        let m = graph.insert_axiom(Constraint::monitor(v(1), v(2), 100.0));
        let r = graph.insert_derived(Constraint::relative(v(1), v(2)), &[m]);
        let rule = compiled(InferenceRule {
            requirement: vec![(Relative, v(1)), (Relative, v(2))],
            result: vec![(Relative, v(1)), (Relative, v(2))],
        });
        // Re-derive relative(1,2) from itself: descendants of the new node
        // strictly contain those of the existing one.
        let combo = Combination {
            nodes: vec![r],
            rule_index: 0,
        };

        let before = graph.len();
        let outcome = apply_combination(&combo, &rule, &mut graph);
        assert_eq!(outcome.redundant, 1);
        assert!(!outcome.contradicted);
        assert_eq!(graph.len(), before);
        assert_eq!(graph.get(r).unwrap().parents(), &[] as &[crate::graph::NodeId]);
    }

    #[test]
    fn disjoint_provenance_contradicts() {
        let mut graph = ConstraintGraph::new();
        let g1 = graph.insert_axiom(Constraint::global(v(1)));
        let _r1 = graph.insert_derived(Constraint::relative(v(1), v(2)), &[g1]);
        let g2 = graph.insert_axiom(Constraint::global(v(2)));
        let rule = compiled(InferenceRule {
            requirement: vec![(crate::constraint::ConstraintKind::Global, v(2))],
            result: vec![(Relative, v(1)), (Relative, v(2))],
        });
        let combo = Combination {
            nodes: vec![g2],
            rule_index: 0,
        };

        let before = graph.len();
        let outcome = apply_combination(&combo, &rule, &mut graph);
        assert!(outcome.contradicted);
        assert_eq!(graph.len(), before);
        assert_eq!(graph.get(g2).unwrap().parents(), &[] as &[crate::graph::NodeId]);
    }

    #[test]
    fn resolve_is_accept_for_a_lone_node() {
        let mut graph = ConstraintGraph::new();
        let n = graph.insert_axiom(Constraint::global(v(1)));
        assert_eq!(resolve(n, &graph), Resolution::Accepted);
    }

    #[test]
    fn monitor_result_slots_decode_subject_then_targets() {
        let slots = decode_slots(&[(Monitor, v(3)), (Monitor, v(1))], 0).unwrap();
        match slots[0].to_constraint() {
            Constraint::Monitor {
                subject, targets, ..
            } => {
                assert_eq!(subject, v(3));
                assert_eq!(targets, vec![v(1)]);
            }
            other => panic!("expected monitor, got {}", other),
        }
    }
}
