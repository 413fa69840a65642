//! In-process engine facade: roster, rule table, working graph, counters.
//!
//! This is the surface the surrounding service drives once per
//! simulation tick: reset the graph, load a rule table, offer candidate
//! tasks one at a time, and read back the active assignment. All
//! failure modes are local and recoverable: a rejected candidate is a
//! normal outcome, a malformed rule table is refused at load without
//! touching the installed one, and a runaway derivation surfaces as a
//! distinguished error rather than a verdict.
//!
//! Instead of textual instrumentation the engine keeps structured
//! counters ([`EngineCounters`]) that the collaborator can export.

use crate::checker::{check_compatibility, CheckError, CheckLimits, Verdict};
use crate::constraint::{Constraint, VehicleId};
use crate::graph::ConstraintGraph;
use crate::rule::{InferenceRule, RuleError, RuleTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Recoverable failures of the engine surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// A candidate referenced a vehicle that is not in the roster.
    UnknownVehicle {
        /// The offending id.
        id: VehicleId,
    },
    /// A compatibility check exceeded its work caps.
    CapExceeded {
        /// Sweeps completed when the cap was hit.
        sweeps: u32,
        /// Live nodes when the cap was hit.
        nodes: usize,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownVehicle { id } => {
                write!(f, "candidate references unknown vehicle {}", id)
            }
            EngineError::CapExceeded { sweeps, nodes } => write!(
                f,
                "derivation cap exceeded after {} sweeps at {} nodes",
                sweeps, nodes
            ),
        }
    }
}

impl std::error::Error for EngineError {}

/// Structured event counters, cumulative until explicitly reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    /// Candidates accepted (including structural re-offers of an
    /// already-active task).
    pub candidates_accepted: u64,
    /// Candidates rejected by a compatibility check.
    pub candidates_rejected: u64,
    /// Candidates refused before insertion (unknown vehicle).
    pub invalid_candidates: u64,
    /// Derived facts accepted into the graph.
    pub nodes_derived: u64,
    /// Derivations discarded as redundant.
    pub redundant_discards: u64,
    /// Fixed-point sweeps run.
    pub sweeps_run: u64,
    /// Checks aborted on a work cap.
    pub cap_aborts: u64,
}

/// The constraint-inference engine.
pub struct Engine {
    roster: BTreeSet<VehicleId>,
    rules: RuleTable,
    graph: ConstraintGraph,
    limits: CheckLimits,
    counters: EngineCounters,
}

impl Engine {
    /// Creates an engine for the given vehicle roster with an empty rule
    /// table.
    pub fn new(roster: impl IntoIterator<Item = VehicleId>) -> Self {
        Self {
            roster: roster.into_iter().collect(),
            rules: RuleTable::default(),
            graph: ConstraintGraph::new(),
            limits: CheckLimits::default(),
            counters: EngineCounters::default(),
        }
    }

    /// The vehicle roster this engine validates candidates against.
    pub fn roster(&self) -> &BTreeSet<VehicleId> {
        &self.roster
    }

    /// Read access to the working graph.
    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// Current work caps.
    pub fn limits(&self) -> CheckLimits {
        self.limits
    }

    /// Replaces the work caps for subsequent checks.
    pub fn set_limits(&mut self, limits: CheckLimits) {
        self.limits = limits;
    }

    /// The cumulative counters.
    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Zeroes the counters.
    pub fn reset_counters(&mut self) {
        self.counters = EngineCounters::default();
    }

    /// Validates and installs a new rule table.
    ///
    /// Fails fast on the first malformed rule; the previously installed
    /// table stays active and the graph is untouched.
    pub fn load_rules(&mut self, rules: Vec<InferenceRule>) -> Result<(), RuleError> {
        self.rules = RuleTable::new(rules)?;
        Ok(())
    }

    /// Clears all nodes; called once per simulation tick or scenario.
    pub fn reset_graph(&mut self) {
        self.graph.reset();
    }

    /// Offers one candidate task: tentative insert, compatibility check,
    /// rollback on rejection.
    ///
    /// Returns `Ok(true)` when the candidate is (or already was) part of
    /// the active assignment, `Ok(false)` when the check rejected it.
    /// An unknown vehicle id or an exceeded work cap is an error; in
    /// both cases the graph is left exactly as it was.
    pub fn try_accept(&mut self, candidate: Constraint) -> Result<bool, EngineError> {
        for id in candidate.vehicle_ids() {
            if !self.roster.contains(&id) {
                self.counters.invalid_candidates += 1;
                return Err(EngineError::UnknownVehicle { id });
            }
        }

        // A structural double of a live node would break the
        // one-node-per-signature invariant; the task is already active.
        if self.graph.find_equal(&candidate, None).is_some() {
            self.counters.candidates_accepted += 1;
            return Ok(true);
        }

        let mark = self.graph.mark();
        self.graph.insert_axiom(candidate);
        match check_compatibility(&mut self.graph, &self.rules, self.limits) {
            Ok(report) => {
                self.counters.sweeps_run += u64::from(report.sweeps);
                self.counters.nodes_derived += u64::from(report.derived);
                self.counters.redundant_discards += u64::from(report.redundant);
                match report.verdict {
                    Verdict::Accepted => {
                        self.counters.candidates_accepted += 1;
                        Ok(true)
                    }
                    Verdict::Rejected => {
                        self.graph.rollback_to(mark);
                        self.counters.candidates_rejected += 1;
                        Ok(false)
                    }
                }
            }
            Err(CheckError::CapExceeded { sweeps, nodes }) => {
                self.graph.rollback_to(mark);
                self.counters.cap_aborts += 1;
                Err(EngineError::CapExceeded { sweeps, nodes })
            }
        }
    }

    /// Captures a rollback point spanning whole candidates.
    ///
    /// Lets a caller undo an acceptance whose own side conditions failed
    /// after the graph check passed (the assignor's centroid turn).
    pub fn checkpoint(&self) -> crate::graph::GraphMark {
        self.graph.mark()
    }

    /// Rolls the graph back to a previously captured checkpoint.
    pub fn rollback_to(&mut self, mark: crate::graph::GraphMark) {
        self.graph.rollback_to(mark);
    }

    /// The active assignment: accepted axioms plus every non-redundant
    /// derived fact, in insertion order.
    pub fn current_assignment(&self) -> Vec<Constraint> {
        self.graph
            .iter()
            .map(|(_, node)| node.constraint().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintKind::{Centroid, Global, Monitor, Relative};

    fn v(raw: u32) -> VehicleId {
        VehicleId::new(raw)
    }

    fn roster(n: u32) -> Vec<VehicleId> {
        (1..=n).map(VehicleId::new).collect()
    }

    #[test]
    fn unknown_vehicles_are_refused_before_insertion() {
        let mut engine = Engine::new(roster(3));
        let err = engine
            .try_accept(Constraint::monitor(v(1), v(9), 100.0))
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownVehicle { id: v(9) });
        assert!(engine.graph().is_empty());
        assert_eq!(engine.counters().invalid_candidates, 1);
    }

    #[test]
    fn accepted_candidates_join_the_assignment() {
        let mut engine = Engine::new(roster(3));
        assert!(engine
            .try_accept(Constraint::monitor(v(1), v(2), 150.0))
            .unwrap());
        let assignment = engine.current_assignment();
        assert_eq!(assignment.len(), 1);
        assert!(assignment[0].structurally_eq(&Constraint::monitor(v(1), v(2), 150.0)));
    }

    #[test]
    fn centroid_reoffers_in_either_order_share_one_node() {
        let mut engine = Engine::new(roster(2));
        assert!(engine
            .try_accept(Constraint::centroid(vec![v(1), v(2)]))
            .unwrap());
        assert!(engine
            .try_accept(Constraint::centroid(vec![v(2), v(1)]))
            .unwrap());
        assert_eq!(engine.graph().len(), 1);
    }

    #[test]
    fn centroid_then_monitor_accept_without_a_relative_premise() {
        // The propagation family alone cannot fire until some relative
        // fact exists, so both candidates stand on their own.
        let mut engine = Engine::new(roster(2));
        engine
            .load_rules(vec![InferenceRule {
                requirement: vec![
                    (Centroid, v(1)),
                    (Centroid, v(2)),
                    (Relative, v(2)),
                    (Relative, v(1)),
                ],
                result: vec![(Relative, v(1)), (Relative, v(2))],
            }])
            .unwrap();

        assert!(engine
            .try_accept(Constraint::centroid(vec![v(1), v(2)]))
            .unwrap());
        assert!(engine
            .try_accept(Constraint::monitor(v(1), v(2), 100.0))
            .unwrap());
        let assignment = engine.current_assignment();
        assert_eq!(assignment.len(), 2);
        assert!(!assignment
            .iter()
            .any(|c| c.kind() == crate::constraint::ConstraintKind::Relative));
    }

    #[test]
    fn second_derivation_path_rejects_and_restores_the_graph() {
        // Two rules derive the same relative fact from disjoint
        // provenance; the second candidate must bounce.
        let mut engine = Engine::new(roster(2));
        engine
            .load_rules(vec![
                InferenceRule {
                    requirement: vec![(Global, v(1))],
                    result: vec![(Relative, v(1)), (Relative, v(2))],
                },
                InferenceRule {
                    requirement: vec![(Global, v(2))],
                    result: vec![(Relative, v(1)), (Relative, v(2))],
                },
            ])
            .unwrap();

        assert!(engine.try_accept(Constraint::global(v(1))).unwrap());
        let before: Vec<_> = engine
            .graph()
            .iter()
            .map(|(_, n)| (n.signature(), n.children().to_vec(), n.parents().to_vec()))
            .collect();

        assert!(!engine.try_accept(Constraint::global(v(2))).unwrap());
        let after: Vec<_> = engine
            .graph()
            .iter()
            .map(|(_, n)| (n.signature(), n.children().to_vec(), n.parents().to_vec()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(engine.counters().candidates_rejected, 1);
    }

    #[test]
    fn failed_rule_load_keeps_the_active_table() {
        let mut engine = Engine::new(roster(2));
        engine
            .load_rules(vec![InferenceRule {
                requirement: vec![(Monitor, v(1)), (Monitor, v(2))],
                result: vec![(Relative, v(1)), (Relative, v(2))],
            }])
            .unwrap();

        let bad = vec![InferenceRule {
            requirement: vec![],
            result: vec![(Relative, v(1)), (Relative, v(2))],
        }];
        assert!(engine.load_rules(bad).is_err());

        // The previously loaded monitor rule still fires.
        assert!(engine
            .try_accept(Constraint::monitor(v(1), v(2), 100.0))
            .unwrap());
        assert_eq!(engine.graph().len(), 2);
    }

    #[test]
    fn reset_graph_clears_nodes_but_not_counters() {
        let mut engine = Engine::new(roster(2));
        engine
            .try_accept(Constraint::monitor(v(1), v(2), 100.0))
            .unwrap();
        engine.reset_graph();
        assert!(engine.graph().is_empty());
        assert_eq!(engine.counters().candidates_accepted, 1);
    }
}
