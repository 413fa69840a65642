//! Synergy: a constraint-inference engine for multi-vehicle task
//! coordination.
//!
//! The crate decides which combination of spatial tasks (one vehicle
//! monitoring another at a standoff distance, a group of vehicles
//! holding a shared centroid) can be active simultaneously without
//! contradictory geometric constraints, and assigns as many compatible
//! tasks as possible. It implements:
//! - A typed constraint model with kind-dependent structural equality.
//! - A provenance graph of constraint nodes (arena-allocated DAG).
//! - Anchored pattern matching of flattened inference rules.
//! - Forward-chaining derivation to a fixed point, with redundancy
//!   subsumption and contradiction early-exit.
//! - An incremental task assignor alternating over candidate pools.
//! - A seeded scenario harness benchmarking the assignor against a
//!   greedy no-inference baseline.
//!
//! The engine is single-threaded and fully synchronous; every public
//! operation runs to completion, and all per-check scratch is scoped to
//! the check. Transport, configuration, and the downstream standoff
//! geometry stage are external collaborators reached only through the
//! types exposed here.
//!
//! # Example
//!
//! ```
//! use synergy::prelude::*;
//!
//! let roster: Vec<VehicleId> = (1..=3).map(VehicleId::new).collect();
//! let mut engine = Engine::new(roster);
//! engine.load_rules(catalog::standard_rules(3)).unwrap();
//!
//! assert!(engine
//!     .try_accept(Constraint::monitor(VehicleId::new(1), VehicleId::new(2), 150.0))
//!     .unwrap());
//! // The monitor task implies a relative-position fact.
//! assert_eq!(engine.current_assignment().len(), 2);
//! ```

pub mod assignor;
pub mod checker;
pub mod constraint;
pub mod derive;
pub mod engine;
pub mod graph;
pub mod matcher;
pub mod rule;
pub mod scenario;

pub use assignor::{Assignment, TaskAssignor};
pub use checker::{check_compatibility, CheckError, CheckLimits, CheckReport, Verdict};
pub use constraint::{Constraint, ConstraintKind, SignatureHash, VehicleId};
pub use derive::{apply_combination, resolve, ApplyOutcome, Resolution};
pub use engine::{Engine, EngineCounters, EngineError};
pub use graph::{ConstraintGraph, ConstraintNode, GraphMark, NodeId};
pub use matcher::{find_new_matches, Combination, SweepContext};
pub use rule::{catalog, CompiledRule, InferenceRule, RuleError, RuleSlot, RuleTable};
pub use scenario::{
    baseline_assign, generate_pools, run_trial, run_trials, CandidatePools, ScenarioConfig,
    ScenarioError, TrialLog, TrialRecord,
};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::assignor::{Assignment, TaskAssignor};
    pub use crate::checker::{CheckLimits, Verdict};
    pub use crate::constraint::{Constraint, ConstraintKind, VehicleId};
    pub use crate::engine::{Engine, EngineCounters, EngineError};
    pub use crate::rule::{catalog, InferenceRule, RuleTable};
    pub use crate::scenario::{run_trials, ScenarioConfig, TrialLog};
}
