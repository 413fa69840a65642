//! Randomized scenario harness: generation, baseline, trial records.
//!
//! Each trial draws a roster size and two candidate pools, runs the
//! inference-backed assignor, runs a greedy baseline that packs
//! non-overlapping candidates by first fit with no inference at all, and
//! records both yields. The randomness source is injected so scenarios
//! are reproducible from a seed.
//!
//! Pool generation resamples structural duplicates with a bounded retry
//! budget: a small roster can have fewer distinct centroid member sets
//! than the pool asks for, and the generator then settles for a shorter
//! pool instead of spinning.

use crate::assignor::TaskAssignor;
use crate::constraint::{Constraint, VehicleId};
use crate::engine::Engine;
use crate::rule::{catalog, RuleError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Scenario generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Smallest roster drawn per trial.
    pub vehicle_min: u32,
    /// Largest roster drawn per trial.
    pub vehicle_max: u32,
    /// Candidates generated per pool, per roster vehicle.
    pub tasks_per_vehicle: u32,
    /// Largest centroid group generated.
    pub max_centroid_size: usize,
    /// Resample attempts before giving up on a unique candidate.
    pub dedup_retry_budget: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vehicle_min: 4,
            vehicle_max: 6,
            tasks_per_vehicle: 2,
            max_centroid_size: 2,
            dedup_retry_budget: 64,
        }
    }
}

/// Harness-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// Rule-table construction failed.
    Rules(RuleError),
    /// CBOR encode/decode failure.
    Encoding(String),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Rules(err) => write!(f, "scenario rules: {}", err),
            ScenarioError::Encoding(msg) => write!(f, "trial log encoding: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioError {}

impl From<RuleError> for ScenarioError {
    fn from(err: RuleError) -> Self {
        ScenarioError::Rules(err)
    }
}

impl From<serde_cbor::Error> for ScenarioError {
    fn from(err: serde_cbor::Error) -> Self {
        ScenarioError::Encoding(err.to_string())
    }
}

/// The candidate pools of one scenario.
#[derive(Debug, Clone)]
pub struct CandidatePools {
    /// Monitor task candidates.
    pub monitors: Vec<Constraint>,
    /// Centroid task candidates.
    pub centroids: Vec<Constraint>,
}

/// Generates structurally unique candidate pools for a roster.
pub fn generate_pools(
    vehicles: u32,
    config: &ScenarioConfig,
    rng: &mut impl Rng,
) -> CandidatePools {
    // Monitor and centroid tasks both need a second vehicle.
    if vehicles < 2 {
        return CandidatePools {
            monitors: Vec::new(),
            centroids: Vec::new(),
        };
    }
    let pool_size = (vehicles * config.tasks_per_vehicle) as usize;

    let mut monitors: Vec<Constraint> = Vec::with_capacity(pool_size);
    while monitors.len() < pool_size {
        let mut attempts = 0;
        let candidate = loop {
            let subject = VehicleId::new(rng.gen_range(1..=vehicles));
            let target = loop {
                let target = VehicleId::new(rng.gen_range(1..=vehicles));
                if target != subject {
                    break target;
                }
            };
            let candidate = Constraint::monitor(subject, target, 0.0);
            if !monitors.iter().any(|m| m.structurally_eq(&candidate)) {
                break Some(candidate);
            }
            attempts += 1;
            if attempts >= config.dedup_retry_budget {
                break None;
            }
        };
        match candidate {
            Some(candidate) => monitors.push(candidate),
            None => break,
        }
    }

    let mut centroids: Vec<Constraint> = Vec::with_capacity(pool_size);
    while centroids.len() < pool_size {
        let mut attempts = 0;
        let candidate = loop {
            let largest = config.max_centroid_size.max(2).min(vehicles as usize);
            let size = rng.gen_range(2..=largest);
            let mut members: Vec<VehicleId> = Vec::with_capacity(size);
            while members.len() < size {
                let id = VehicleId::new(rng.gen_range(1..=vehicles));
                if !members.contains(&id) {
                    members.push(id);
                }
            }
            let candidate = Constraint::centroid(members);
            if !centroids.iter().any(|c| c.structurally_eq(&candidate)) {
                break Some(candidate);
            }
            attempts += 1;
            if attempts >= config.dedup_retry_budget {
                break None;
            }
        };
        match candidate {
            Some(candidate) => centroids.push(candidate),
            None => break,
        }
    }

    CandidatePools {
        monitors,
        centroids,
    }
}

/// Greedy baseline: first-fit packing with no inference.
///
/// Alternates centroid and monitor steps. A centroid candidate fits when
/// enough unassigned vehicles remain and none of its members is taken; a
/// monitor candidate fits when its subject is free. Returns the number
/// of tasks packed.
pub fn baseline_assign(vehicles: u32, pools: &CandidatePools) -> u32 {
    let mut assigned: BTreeSet<VehicleId> = BTreeSet::new();
    let mut remaining = vehicles as usize;
    let mut tasks = 0u32;
    let mut centroid_cursor = 0;
    let mut monitor_cursor = 0;

    while remaining > 0
        && (centroid_cursor < pools.centroids.len() || monitor_cursor < pools.monitors.len())
    {
        if centroid_cursor < pools.centroids.len() {
            let members = pools.centroids[centroid_cursor].vehicle_ids();
            centroid_cursor += 1;
            if members.len() <= remaining && members.iter().all(|id| !assigned.contains(id)) {
                for id in members {
                    assigned.insert(id);
                    remaining -= 1;
                }
                tasks += 1;
            }
        }
        if remaining == 0 {
            break;
        }
        if monitor_cursor < pools.monitors.len() {
            let subject = pools.monitors[monitor_cursor].vehicle_ids()[0];
            monitor_cursor += 1;
            if !assigned.contains(&subject) {
                assigned.insert(subject);
                remaining -= 1;
                tasks += 1;
            }
        }
    }
    tasks
}

/// One trial's yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Roster size drawn for the trial.
    pub vehicles: u32,
    /// Tasks accepted by the inference-backed assignor.
    pub synergy_tasks: u32,
    /// Tasks packed by the greedy baseline.
    pub baseline_tasks: u32,
    /// Monitor tasks accepted.
    pub monitors_accepted: u32,
    /// Centroid tasks accepted.
    pub centroids_accepted: u32,
}

/// A batch of trial records with CBOR persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialLog {
    records: Vec<TrialRecord>,
}

impl TrialLog {
    /// The recorded trials, in run order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Total synergy yield across trials.
    pub fn synergy_total(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.synergy_tasks)).sum()
    }

    /// Total baseline yield across trials.
    pub fn baseline_total(&self) -> u64 {
        self.records
            .iter()
            .map(|r| u64::from(r.baseline_tasks))
            .sum()
    }

    /// Serializes the log to CBOR bytes.
    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>, ScenarioError> {
        let bytes = serde_cbor::to_vec(self)?;
        Ok(bytes)
    }

    /// Restores a log from CBOR bytes.
    pub fn from_cbor_bytes(bytes: &[u8]) -> Result<Self, ScenarioError> {
        let log: Self = serde_cbor::from_slice(bytes)?;
        Ok(log)
    }
}

/// Runs one randomized trial.
pub fn run_trial(
    config: &ScenarioConfig,
    rng: &mut impl Rng,
) -> Result<TrialRecord, ScenarioError> {
    let vehicles = rng.gen_range(config.vehicle_min..=config.vehicle_max);
    let pools = generate_pools(vehicles, config, rng);
    let baseline_tasks = baseline_assign(vehicles, &pools);

    let mut engine = Engine::new((1..=vehicles).map(VehicleId::new));
    engine.load_rules(catalog::standard_rules(vehicles))?;
    let mut assignor = TaskAssignor::new(pools.monitors, pools.centroids);
    let assignment = assignor.run(&mut engine);

    Ok(TrialRecord {
        vehicles,
        synergy_tasks: assignment.monitors_accepted + assignment.centroids_accepted,
        baseline_tasks,
        monitors_accepted: assignment.monitors_accepted,
        centroids_accepted: assignment.centroids_accepted,
    })
}

/// Runs a batch of trials into a log.
pub fn run_trials(
    config: &ScenarioConfig,
    trials: u32,
    rng: &mut impl Rng,
) -> Result<TrialLog, ScenarioError> {
    let mut log = TrialLog::default();
    for _ in 0..trials {
        log.records.push(run_trial(config, rng)?);
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generation_is_reproducible_from_a_seed() {
        let config = ScenarioConfig::default();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let record_a = run_trial(&config, &mut a).unwrap();
        let record_b = run_trial(&config, &mut b).unwrap();
        assert_eq!(record_a, record_b);
    }

    #[test]
    fn pools_are_structurally_unique() {
        let config = ScenarioConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let pools = generate_pools(5, &config, &mut rng);
        for (i, a) in pools.monitors.iter().enumerate() {
            for b in pools.monitors.iter().skip(i + 1) {
                assert!(!a.structurally_eq(b));
            }
        }
        for (i, a) in pools.centroids.iter().enumerate() {
            for b in pools.centroids.iter().skip(i + 1) {
                assert!(!a.structurally_eq(b));
            }
        }
    }

    #[test]
    fn tiny_rosters_settle_for_short_pools() {
        // Two vehicles admit one distinct centroid pair and two monitor
        // orderings; the retry budget stops generation from spinning.
        let config = ScenarioConfig {
            vehicle_min: 2,
            vehicle_max: 2,
            ..ScenarioConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let pools = generate_pools(2, &config, &mut rng);
        assert_eq!(pools.centroids.len(), 1);
        assert_eq!(pools.monitors.len(), 2);
    }

    #[test]
    fn baseline_never_double_books_a_vehicle() {
        let pools = CandidatePools {
            monitors: vec![
                Constraint::monitor(VehicleId::new(1), VehicleId::new(2), 0.0),
                Constraint::monitor(VehicleId::new(1), VehicleId::new(3), 0.0),
                Constraint::monitor(VehicleId::new(2), VehicleId::new(1), 0.0),
            ],
            centroids: vec![Constraint::centroid(vec![
                VehicleId::new(2),
                VehicleId::new(3),
            ])],
        };
        // Centroid {2,3} packs first, then only monitor (1,_) fits.
        assert_eq!(baseline_assign(3, &pools), 2);
    }

    #[test]
    fn trial_batches_round_trip_through_cbor() {
        let config = ScenarioConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let log = run_trials(&config, 5, &mut rng).unwrap();
        assert_eq!(log.records().len(), 5);
        let bytes = log.to_cbor_bytes().unwrap();
        let restored = TrialLog::from_cbor_bytes(&bytes).unwrap();
        assert_eq!(restored, log);
    }
}
