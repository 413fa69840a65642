//! The compatibility checker: forward chaining to a fixed point.
//!
//! One check runs sweeps over the whole rule table. Each sweep matches
//! every rule against the current graph with a fresh [`SweepContext`],
//! then derives and resolves every combination found. A contradiction
//! aborts the check immediately with [`Verdict::Rejected`], rolling the
//! graph back to its state at check entry; quiescence (no combinations,
//! or no accepted derivation) terminates with [`Verdict::Accepted`].
//!
//! Chaining is monotone and the number of distinct structural signatures
//! is bounded by the roster, so the loop terminates for any sane rule
//! table. A malformed table can still blow up superlinearly, so every
//! check is bounded by [`CheckLimits`]. Exceeding a cap is a
//! distinguished failure ([`CheckError::CapExceeded`]), never silently
//! reported as a verdict, and also rolls the graph back.
//!
//! # Determinism
//! Rules are evaluated in table order; matches are discovered in
//! graph-insertion order. This affects which equal-signature node is
//! kept on a Redundant outcome, but the verdict depends only on the
//! reachable fixed point, not the sweep order.
//!
//! # Citations
//! - Fixed-point forward chaining: Russell & Norvig, "Artificial
//!   Intelligence: A Modern Approach", Section 9.3 (2010)
//! - Least fixed points of monotone operators: Tarski, "A lattice-
//!   theoretical fixpoint theorem and its applications" (1955)

use crate::derive::apply_combination;
use crate::graph::ConstraintGraph;
use crate::matcher::{find_new_matches, SweepContext};
use crate::rule::RuleTable;
use std::fmt;

/// Terminal state of one compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The graph reached a fixed point with no contradiction.
    Accepted,
    /// A contradiction surfaced; the graph was rolled back.
    Rejected,
}

/// Work bounds for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckLimits {
    /// Maximum fixed-point sweeps per check.
    pub max_sweeps: u32,
    /// Maximum live graph nodes during a check.
    pub max_nodes: usize,
}

impl Default for CheckLimits {
    fn default() -> Self {
        Self {
            max_sweeps: 64,
            max_nodes: 4096,
        }
    }
}

/// Distinguished failure: a work cap was exceeded.
///
/// Not a verdict: the candidate set is neither accepted nor rejected,
/// and callers must not treat it as either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    /// The sweep or node cap was hit; the graph was rolled back.
    CapExceeded {
        /// Sweeps completed when the cap was hit.
        sweeps: u32,
        /// Live nodes when the cap was hit.
        nodes: usize,
    },
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::CapExceeded { sweeps, nodes } => write!(
                f,
                "derivation cap exceeded after {} sweeps at {} nodes",
                sweeps, nodes
            ),
        }
    }
}

impl std::error::Error for CheckError {}

/// Outcome and work counters of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
    /// The terminal verdict.
    pub verdict: Verdict,
    /// Sweeps run (including the quiescent one).
    pub sweeps: u32,
    /// Derived nodes accepted across all sweeps.
    pub derived: u32,
    /// Derivations discarded as redundant.
    pub redundant: u32,
}

/// Runs the fixed-point check over `graph` with the given rule table.
///
/// On `Rejected` or `Err`, the graph is rolled back to its entry state;
/// on `Accepted`, every derived fact stays in the graph.
pub fn check_compatibility(
    graph: &mut ConstraintGraph,
    rules: &RuleTable,
    limits: CheckLimits,
) -> Result<CheckReport, CheckError> {
    let entry = graph.mark();
    let mut sweeps: u32 = 0;
    let mut derived: u32 = 0;
    let mut redundant: u32 = 0;

    loop {
        if sweeps >= limits.max_sweeps {
            let nodes = graph.len();
            graph.rollback_to(entry);
            return Err(CheckError::CapExceeded { sweeps, nodes });
        }
        sweeps += 1;

        let mut ctx = SweepContext::new();
        for (index, rule) in rules.iter().enumerate() {
            find_new_matches(index, rule, graph, &mut ctx);
        }
        if ctx.is_empty() {
            return Ok(CheckReport {
                verdict: Verdict::Accepted,
                sweeps,
                derived,
                redundant,
            });
        }

        let mut progressed = false;
        for combination in ctx.combinations() {
            // Combinations only reference rules the context saw.
            let rule = match rules.get(combination.rule_index) {
                Some(rule) => rule,
                None => continue,
            };
            let outcome = apply_combination(combination, rule, graph);
            derived += outcome.accepted;
            redundant += outcome.redundant;
            if outcome.contradicted {
                graph.rollback_to(entry);
                return Ok(CheckReport {
                    verdict: Verdict::Rejected,
                    sweeps,
                    derived,
                    redundant,
                });
            }
            progressed |= outcome.accepted > 0;
            if graph.len() > limits.max_nodes {
                let nodes = graph.len();
                graph.rollback_to(entry);
                return Err(CheckError::CapExceeded { sweeps, nodes });
            }
        }

        if !progressed {
            return Ok(CheckReport {
                verdict: Verdict::Accepted,
                sweeps,
                derived,
                redundant,
            });
        }
    }
}
