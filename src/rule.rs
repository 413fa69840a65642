//! Inference rules: flattened requirement/result patterns and the rule table.
//!
//! A rule is two ordered sequences of `(kind, id)` entries. Consecutive
//! entries sharing a kind form one *slot* (one constraint's worth of
//! ids), and a run boundary is any index where the kind changes. The flattened
//! encoding lets a single rule require or produce several constraints
//! without nesting: `[(Centroid, 1), (Centroid, 2), (Relative, 2),
//! (Relative, 3)]` is a two-slot pattern, `centroid{1,2}` plus
//! `relative(2,3)`.
//!
//! [`RuleTable::new`] is the fail-fast gate: every pattern is decoded and
//! shape-checked at load time, so the matcher and deriver can assume
//! well-formed slots. The table is immutable once built.
//!
//! # Citations
//! - Production systems: Forgy, "Rete: a fast algorithm for the many
//!   pattern/many object pattern match problem" (1982)
//! - Forward chaining: Russell & Norvig, "Artificial Intelligence: A
//!   Modern Approach", Chapter 9 (2010)

use crate::constraint::{Constraint, ConstraintKind, VehicleId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One production rule in the flattened `(kind, id)` encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRule {
    /// Premise pattern; each same-kind run is one required constraint.
    pub requirement: Vec<(ConstraintKind, VehicleId)>,
    /// Conclusion pattern; each same-kind run is one produced constraint.
    pub result: Vec<(ConstraintKind, VehicleId)>,
}

/// A decoded slot: one constraint's worth of pattern ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSlot {
    /// The slot's constraint kind (never `Invalid` after validation).
    pub kind: ConstraintKind,
    /// The slot's id sequence, in pattern order.
    pub ids: Vec<VehicleId>,
}

impl RuleSlot {
    /// Materializes the slot as a constraint for structural matching and
    /// derivation. Monitor slots decode as subject followed by monitored
    /// ids; the post-hoc payload fields stay empty.
    pub fn to_constraint(&self) -> Constraint {
        match self.kind {
            ConstraintKind::Centroid => Constraint::Centroid {
                members: self.ids.clone(),
                anchor: None,
            },
            ConstraintKind::Monitor => Constraint::Monitor {
                subject: self.ids[0],
                targets: self.ids[1..].to_vec(),
                standoffs: Vec::new(),
            },
            ConstraintKind::Global => Constraint::Global {
                vehicle: self.ids[0],
            },
            ConstraintKind::Relative => Constraint::Relative {
                lead: self.ids[0],
                follower: self.ids[1],
            },
            // Rejected by decode_slots; slots with this kind are never built.
            ConstraintKind::Invalid => unreachable!("Invalid sentinel in a decoded slot"),
        }
    }
}

/// Error raised while loading rules into a [`RuleTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A requirement or result pattern decoded to zero slots.
    EmptySlot {
        /// Index of the offending rule in the loaded list.
        rule: usize,
    },
    /// The `Invalid` sentinel appeared in a stored rule pattern.
    InvalidSentinel {
        /// Index of the offending rule in the loaded list.
        rule: usize,
    },
    /// A slot's id count does not fit its kind (e.g. a one-id Relative).
    SlotArity {
        /// Index of the offending rule in the loaded list.
        rule: usize,
        /// Kind of the malformed slot.
        kind: ConstraintKind,
        /// Number of ids the slot decoded to.
        len: usize,
    },
    /// CBOR encode/decode failure.
    Encoding(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::EmptySlot { rule } => {
                write!(f, "rule {} has an empty pattern", rule)
            }
            RuleError::InvalidSentinel { rule } => {
                write!(f, "rule {} contains the Invalid sentinel", rule)
            }
            RuleError::SlotArity { rule, kind, len } => {
                write!(f, "rule {}: {} slot with {} ids", rule, kind, len)
            }
            RuleError::Encoding(msg) => write!(f, "rule table encoding: {}", msg),
        }
    }
}

impl std::error::Error for RuleError {}

impl From<serde_cbor::Error> for RuleError {
    fn from(err: serde_cbor::Error) -> Self {
        RuleError::Encoding(err.to_string())
    }
}

/// Decodes a flattened pattern into slots by scanning same-kind runs.
///
/// Fails on an empty pattern, on the `Invalid` sentinel, and on a slot
/// whose id count does not fit its kind: Global takes exactly 1 id,
/// Relative exactly 2, Monitor and Centroid at least 2.
pub fn decode_slots(
    pattern: &[(ConstraintKind, VehicleId)],
    rule: usize,
) -> Result<Vec<RuleSlot>, RuleError> {
    if pattern.is_empty() {
        return Err(RuleError::EmptySlot { rule });
    }
    let mut slots: Vec<RuleSlot> = Vec::new();
    for &(kind, id) in pattern {
        if kind == ConstraintKind::Invalid {
            return Err(RuleError::InvalidSentinel { rule });
        }
        match slots.last_mut() {
            Some(slot) if slot.kind == kind => slot.ids.push(id),
            _ => slots.push(RuleSlot {
                kind,
                ids: vec![id],
            }),
        }
    }
    for slot in &slots {
        let fits = match slot.kind {
            ConstraintKind::Global => slot.ids.len() == 1,
            ConstraintKind::Relative => slot.ids.len() == 2,
            ConstraintKind::Monitor | ConstraintKind::Centroid => slot.ids.len() >= 2,
            ConstraintKind::Invalid => false,
        };
        if !fits {
            return Err(RuleError::SlotArity {
                rule,
                kind: slot.kind,
                len: slot.ids.len(),
            });
        }
    }
    Ok(slots)
}

/// A rule with both patterns pre-decoded at load time.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: InferenceRule,
    requirement_slots: Vec<RuleSlot>,
    result_slots: Vec<RuleSlot>,
}

impl CompiledRule {
    /// The rule as loaded.
    pub fn rule(&self) -> &InferenceRule {
        &self.rule
    }

    /// Decoded premise slots.
    pub fn requirement_slots(&self) -> &[RuleSlot] {
        &self.requirement_slots
    }

    /// Decoded conclusion slots.
    pub fn result_slots(&self) -> &[RuleSlot] {
        &self.result_slots
    }
}

/// The immutable catalog of production rules.
///
/// Built once, validated in full; rejecting any malformed rule rejects
/// the whole load and leaves the caller's engine state untouched.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Validates and compiles `rules` into a table.
    pub fn new(rules: Vec<InferenceRule>) -> Result<Self, RuleError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (index, rule) in rules.into_iter().enumerate() {
            let requirement_slots = decode_slots(&rule.requirement, index)?;
            let result_slots = decode_slots(&rule.result, index)?;
            compiled.push(CompiledRule {
                rule,
                requirement_slots,
                result_slots,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates rules in table order (the sweep evaluation order).
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    /// Returns the rule at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&CompiledRule> {
        self.rules.get(index)
    }

    /// Serializes the rule list to CBOR bytes.
    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>, RuleError> {
        let rules: Vec<&InferenceRule> = self.rules.iter().map(|c| &c.rule).collect();
        let bytes = serde_cbor::to_vec(&rules)?;
        Ok(bytes)
    }

    /// Deserializes and re-validates a rule list from CBOR bytes.
    pub fn from_cbor_bytes(bytes: &[u8]) -> Result<Self, RuleError> {
        let rules: Vec<InferenceRule> = serde_cbor::from_slice(bytes)?;
        Self::new(rules)
    }
}

/// The standard rule library, generated parametrically over the roster.
pub mod catalog {
    use super::InferenceRule;
    use crate::constraint::ConstraintKind::{Centroid, Monitor, Relative};
    use crate::constraint::VehicleId;

    /// Generates the standard library over vehicles `1..=vehicle_count`.
    ///
    /// Three families, each over every ordered pair `(i, j)` with
    /// `i != j`:
    ///
    /// 1. `monitor[i,j] → relative[i,j]`: monitoring constrains the
    ///    subject relative to its target;
    /// 2. `centroid[i,j] + relative[j,k] → relative[i,j]` for every
    ///    `k != j`: once all but one member of a centroid group is
    ///    constrained, the last member becomes constrained too;
    /// 3. `centroid[i,j] → centroid[j,i]`: membership carries no
    ///    orientation (redundant under set equality; retained from the
    ///    hand-maintained library).
    pub fn standard_rules(vehicle_count: u32) -> Vec<InferenceRule> {
        let v = VehicleId::new;
        let mut rules = Vec::new();
        for i in 1..=vehicle_count {
            for j in 1..=vehicle_count {
                if i == j {
                    continue;
                }
                rules.push(InferenceRule {
                    requirement: vec![(Monitor, v(i)), (Monitor, v(j))],
                    result: vec![(Relative, v(i)), (Relative, v(j))],
                });
            }
        }
        for i in 1..=vehicle_count {
            for j in 1..=vehicle_count {
                if i == j {
                    continue;
                }
                for k in 1..=vehicle_count {
                    if k == j {
                        continue;
                    }
                    rules.push(InferenceRule {
                        requirement: vec![
                            (Centroid, v(i)),
                            (Centroid, v(j)),
                            (Relative, v(j)),
                            (Relative, v(k)),
                        ],
                        result: vec![(Relative, v(i)), (Relative, v(j))],
                    });
                }
            }
        }
        for i in 1..=vehicle_count {
            for j in 1..=vehicle_count {
                if i == j {
                    continue;
                }
                rules.push(InferenceRule {
                    requirement: vec![(Centroid, v(i)), (Centroid, v(j))],
                    result: vec![(Centroid, v(j)), (Centroid, v(i))],
                });
            }
        }
        rules
    }
}
