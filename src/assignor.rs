//! Incremental task assignment over candidate pools.
//!
//! The assignor holds two pools (monitor tasks and centroid tasks) with
//! independent cursors and alternates turns between them, round-robin by
//! pool. Each turn offers one candidate to the engine; accepted
//! candidates stay in the graph, rejected ones are rolled back and
//! marked tried for the rest of the scenario. The assignor also keeps
//! the monitoring-committed set: which vehicles already carry a
//! monitoring obligation.
//!
//! A monitor candidate whose subject is already committed is skipped
//! without a graph check. A centroid candidate that passes the graph
//! check must additionally have exactly one of its first two members
//! already committed: the rule corpus encodes "if all but one group
//! member is constrained, the last one becomes constrained too", and the
//! newly constrained member joins the committed set. When that side
//! condition fails the acceptance is undone.
//!
//! Engine-level errors on a candidate (unknown vehicle, cap abort) are
//! absorbed as rejections: the task is omitted and the run continues,
//! per the propagation policy that none of these failures is fatal.

use crate::constraint::{Constraint, SignatureHash, VehicleId};
use crate::engine::Engine;
use std::collections::{BTreeSet, HashSet};

/// The yield of one assignment run.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Active constraints: accepted axioms and derived facts, deduped
    /// by structural signature (defensive; a no-op under the graph
    /// invariant).
    pub constraints: Vec<Constraint>,
    /// Monitor candidates accepted.
    pub monitors_accepted: u32,
    /// Centroid candidates accepted.
    pub centroids_accepted: u32,
}

/// Round-robin assignor over monitor and centroid candidate pools.
#[derive(Debug)]
pub struct TaskAssignor {
    monitor_pool: Vec<Constraint>,
    centroid_pool: Vec<Constraint>,
    monitor_cursor: usize,
    centroid_cursor: usize,
    monitor_tried: Vec<bool>,
    centroid_tried: Vec<bool>,
    committed: BTreeSet<VehicleId>,
}

impl TaskAssignor {
    /// Creates an assignor over the given candidate pools.
    pub fn new(monitor_pool: Vec<Constraint>, centroid_pool: Vec<Constraint>) -> Self {
        let monitor_tried = vec![false; monitor_pool.len()];
        let centroid_tried = vec![false; centroid_pool.len()];
        Self {
            monitor_pool,
            centroid_pool,
            monitor_cursor: 0,
            centroid_cursor: 0,
            monitor_tried,
            centroid_tried,
            committed: BTreeSet::new(),
        }
    }

    /// Vehicles carrying a monitoring obligation after the last run.
    pub fn monitoring_committed(&self) -> &BTreeSet<VehicleId> {
        &self.committed
    }

    /// Drives the engine until both pools are exhausted and returns the
    /// final assignment.
    pub fn run(&mut self, engine: &mut Engine) -> Assignment {
        let mut monitors_accepted = 0u32;
        let mut centroids_accepted = 0u32;

        while !self.centroid_exhausted() || !self.monitor_exhausted() {
            if !self.centroid_exhausted() {
                centroids_accepted += u32::from(self.centroid_turn(engine));
            }
            if !self.monitor_exhausted() {
                monitors_accepted += u32::from(self.monitor_turn(engine));
            }
        }

        let mut seen: HashSet<SignatureHash> = HashSet::new();
        let constraints: Vec<Constraint> = engine
            .current_assignment()
            .into_iter()
            .filter(|constraint| seen.insert(constraint.signature()))
            .collect();

        Assignment {
            constraints,
            monitors_accepted,
            centroids_accepted,
        }
    }

    fn monitor_exhausted(&self) -> bool {
        self.monitor_cursor >= self.monitor_pool.len()
            || self.monitor_tried.iter().all(|&tried| tried)
    }

    fn centroid_exhausted(&self) -> bool {
        self.centroid_cursor >= self.centroid_pool.len()
            || self.centroid_tried.iter().all(|&tried| tried)
    }

    /// One centroid turn; returns whether the candidate was kept.
    fn centroid_turn(&mut self, engine: &mut Engine) -> bool {
        let index = self.centroid_cursor;
        self.centroid_cursor += 1;
        let candidate = self.centroid_pool[index].clone();
        let members = candidate.vehicle_ids();

        let mark = engine.checkpoint();
        let accepted = matches!(engine.try_accept(candidate), Ok(true));
        if !accepted {
            self.centroid_tried[index] = true;
            return false;
        }

        // Exactly one of the first two members may already be committed;
        // the other becomes the newly constrained vehicle.
        let first_committed = self.committed.contains(&members[0]);
        let second_committed = self.committed.contains(&members[1]);
        if first_committed != second_committed {
            let newly_constrained = if first_committed {
                members[1]
            } else {
                members[0]
            };
            self.committed.insert(newly_constrained);
            true
        } else {
            engine.rollback_to(mark);
            self.centroid_tried[index] = true;
            false
        }
    }

    /// One monitor turn; returns whether the candidate was kept.
    fn monitor_turn(&mut self, engine: &mut Engine) -> bool {
        let index = self.monitor_cursor;
        self.monitor_cursor += 1;
        let candidate = self.monitor_pool[index].clone();
        let subject = candidate.vehicle_ids()[0];

        if self.committed.contains(&subject) {
            self.monitor_tried[index] = true;
            return false;
        }
        if matches!(engine.try_accept(candidate), Ok(true)) {
            self.committed.insert(subject);
            true
        } else {
            self.monitor_tried[index] = true;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, VehicleId};
    use crate::rule::catalog;

    fn v(raw: u32) -> VehicleId {
        VehicleId::new(raw)
    }

    fn engine(n: u32) -> Engine {
        let mut engine = Engine::new((1..=n).map(VehicleId::new));
        engine.load_rules(catalog::standard_rules(n)).unwrap();
        engine
    }

    #[test]
    fn committed_subjects_are_skipped() {
        let mut engine = engine(4);
        let monitors = vec![
            Constraint::monitor(v(1), v(2), 100.0),
            Constraint::monitor(v(2), v(1), 100.0),
            Constraint::monitor(v(1), v(3), 100.0),
        ];
        let mut assignor = TaskAssignor::new(monitors, Vec::new());
        let assignment = assignor.run(&mut engine);

        assert_eq!(assignment.monitors_accepted, 2);
        assert_eq!(
            assignor.monitoring_committed().iter().copied().collect::<Vec<_>>(),
            vec![v(1), v(2)]
        );
        // Two axioms plus the two derived relatives.
        assert_eq!(assignment.constraints.len(), 4);
    }

    #[test]
    fn centroid_needs_exactly_one_committed_member() {
        let mut engine = engine(3);
        // First centroid arrives before any monitor commit and bounces;
        // the second arrives after vehicle 1 is committed and sticks.
        let monitors = vec![Constraint::monitor(v(1), v(2), 100.0)];
        let centroids = vec![
            Constraint::centroid(vec![v(3), v(2)]),
            Constraint::centroid(vec![v(1), v(3)]),
        ];
        let mut assignor = TaskAssignor::new(monitors, centroids);
        let assignment = assignor.run(&mut engine);

        assert_eq!(assignment.monitors_accepted, 1);
        assert_eq!(assignment.centroids_accepted, 1);
        assert_eq!(
            assignor.monitoring_committed().iter().copied().collect::<Vec<_>>(),
            vec![v(1), v(3)]
        );
        assert!(assignment
            .constraints
            .iter()
            .any(|c| c.structurally_eq(&Constraint::centroid(vec![v(1), v(3)]))));
        // The bounced centroid left nothing behind.
        assert!(!assignment
            .constraints
            .iter()
            .any(|c| c.structurally_eq(&Constraint::centroid(vec![v(2), v(3)]))));
    }

    #[test]
    fn rejected_centroid_restores_the_graph() {
        let mut engine = engine(3);
        let before = engine.graph().len();
        let centroids = vec![Constraint::centroid(vec![v(1), v(2)])];
        let mut assignor = TaskAssignor::new(Vec::new(), centroids);
        let assignment = assignor.run(&mut engine);

        assert_eq!(assignment.centroids_accepted, 0);
        assert_eq!(engine.graph().len(), before);
    }

    #[test]
    fn output_has_no_duplicate_signatures() {
        let mut engine = engine(4);
        let monitors = vec![
            Constraint::monitor(v(1), v(2), 100.0),
            Constraint::monitor(v(2), v(1), 100.0),
            Constraint::monitor(v(3), v(4), 100.0),
        ];
        let centroids = vec![
            Constraint::centroid(vec![v(1), v(3)]),
            Constraint::centroid(vec![v(2), v(4)]),
        ];
        let mut assignor = TaskAssignor::new(monitors, centroids);
        let assignment = assignor.run(&mut engine);

        let mut seen = HashSet::new();
        for constraint in &assignment.constraints {
            assert!(seen.insert(constraint.signature()));
        }
    }

    #[test]
    fn empty_pools_yield_an_empty_assignment() {
        let mut engine = engine(2);
        let mut assignor = TaskAssignor::new(Vec::new(), Vec::new());
        let assignment = assignor.run(&mut engine);
        assert!(assignment.constraints.is_empty());
        assert_eq!(assignment.monitors_accepted, 0);
        assert_eq!(assignment.centroids_accepted, 0);
    }
}
