//! Constraint model for multi-vehicle task coordination.
//!
//! A [`Constraint`] is one typed geometric fact about a group of vehicles:
//! a monitor task (one vehicle holding a standoff on another), a shared
//! centroid, a single-vehicle global fix, or a relative-position relation
//! between two vehicles. Structural equality over constraints is the
//! identity rule for the whole engine: the graph keeps at most one node
//! per distinct structural signature, and every dedup, redundancy, and
//! contradiction decision reduces to this equality.
//!
//! Identity is kind-dependent: id sequences compare **ordered** for every
//! kind except [`Constraint::Centroid`], whose membership is a set
//! (multiplicity-aware, order-free). Post-hoc numeric payload (standoff
//! distances, the computed centroid position) never participates in
//! identity.
//!
//! # Citations
//! - Constraint networks: Dechter, "Constraint Processing" (2003)
//! - Multi-robot task allocation: Gerkey & Matarić, "A formal analysis and
//!   taxonomy of task allocation in multi-robot systems" (2004)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identifier of a vehicle in the fleet roster.
///
/// Uses a transparent `u32` wrapper for efficient comparison and hashing.
/// Ids are assigned by the roster collaborator and are opaque here.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VehicleId(u32);

impl VehicleId {
    /// Creates a new `VehicleId` from a raw `u32`.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` representation.
    #[inline]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Kind discriminant for constraints and rule pattern entries.
///
/// `Invalid` is an internal sentinel that never appears in a stored
/// constraint or a loaded rule: the matcher uses it to blank
/// already-consumed slots in its scratch requirement list while
/// satisfying a rule (see `matcher`). Loading a rule that mentions
/// `Invalid` fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Group of vehicles holding a shared centroid.
    Centroid,
    /// One vehicle monitoring others at a standoff distance.
    Monitor,
    /// Single-vehicle global position fix.
    Global,
    /// Ordered relative-position relation between two vehicles.
    Relative,
    /// Sentinel for consumed pattern slots; never stored.
    Invalid,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Centroid => "centroid",
            ConstraintKind::Monitor => "monitor",
            ConstraintKind::Global => "global",
            ConstraintKind::Relative => "relative",
            ConstraintKind::Invalid => "invalid",
        };
        write!(f, "{}", name)
    }
}

/// One typed geometric fact about a group of vehicles.
///
/// The numeric payload fields (`standoffs`, `anchor`) are computed
/// post-hoc by the downstream geometry collaborator and are **not** part
/// of structural identity; two constraints over the same vehicles with
/// different standoff distances are the same fact to the engine.
///
/// # Invariant
/// - `Centroid` has ≥ 2 distinct members; membership order carries no
///   meaning.
/// - `Monitor` group order is `[subject, targets...]`; an axiom monitor
///   task has exactly one target and one standoff distance.
/// - `Relative` order is semantically significant: "A relative to B" is
///   a different fact from "B relative to A".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constraint {
    /// Vehicles jointly holding a shared centroid position.
    Centroid {
        /// Group membership, as a set.
        members: Vec<VehicleId>,
        /// Computed centroid position `(latitude, longitude)`, post-hoc.
        anchor: Option<(f64, f64)>,
    },
    /// `subject` monitoring each of `targets` at a standoff distance.
    Monitor {
        /// The vehicle performing the monitoring.
        subject: VehicleId,
        /// The vehicles being monitored.
        targets: Vec<VehicleId>,
        /// Standoff distance per target, post-hoc payload.
        standoffs: Vec<f64>,
    },
    /// A single vehicle constrained in the global frame.
    Global {
        /// The constrained vehicle.
        vehicle: VehicleId,
    },
    /// `follower` positioned relative to `lead` (ordered).
    Relative {
        /// The reference vehicle.
        lead: VehicleId,
        /// The vehicle constrained relative to `lead`.
        follower: VehicleId,
    },
}

impl Constraint {
    /// Creates an axiom monitor task: `subject` watching `target` at
    /// `standoff` distance.
    pub fn monitor(subject: VehicleId, target: VehicleId, standoff: f64) -> Self {
        Constraint::Monitor {
            subject,
            targets: vec![target],
            standoffs: vec![standoff],
        }
    }

    /// Creates a centroid task over `members` (no computed anchor yet).
    pub fn centroid(members: Vec<VehicleId>) -> Self {
        Constraint::Centroid {
            members,
            anchor: None,
        }
    }

    /// Creates a global position fix for `vehicle`.
    pub fn global(vehicle: VehicleId) -> Self {
        Constraint::Global { vehicle }
    }

    /// Creates a relative-position relation: `follower` relative to `lead`.
    pub fn relative(lead: VehicleId, follower: VehicleId) -> Self {
        Constraint::Relative { lead, follower }
    }

    /// Returns the kind discriminant.
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Centroid { .. } => ConstraintKind::Centroid,
            Constraint::Monitor { .. } => ConstraintKind::Monitor,
            Constraint::Global { .. } => ConstraintKind::Global,
            Constraint::Relative { .. } => ConstraintKind::Relative,
        }
    }

    /// Returns every vehicle id the constraint references, in group order.
    ///
    /// For monitors this is `[subject, targets...]`; for relatives
    /// `[lead, follower]`.
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        match self {
            Constraint::Centroid { members, .. } => members.clone(),
            Constraint::Monitor {
                subject, targets, ..
            } => {
                let mut ids = Vec::with_capacity(1 + targets.len());
                ids.push(*subject);
                ids.extend_from_slice(targets);
                ids
            }
            Constraint::Global { vehicle } => vec![*vehicle],
            Constraint::Relative { lead, follower } => vec![*lead, *follower],
        }
    }

    /// Structural equality: the engine-wide identity rule.
    ///
    /// Kinds must match. Id sequences compare ordered for every kind
    /// except `Centroid`, whose members compare as a multiplicity-aware
    /// set. Monitor targets compare ordered in addition to the subject.
    /// Post-hoc payload (`standoffs`, `anchor`) is ignored.
    pub fn structurally_eq(&self, other: &Constraint) -> bool {
        match (self, other) {
            (
                Constraint::Centroid { members: a, .. },
                Constraint::Centroid { members: b, .. },
            ) => multiset_eq(a, b),
            (
                Constraint::Monitor {
                    subject: sa,
                    targets: ta,
                    ..
                },
                Constraint::Monitor {
                    subject: sb,
                    targets: tb,
                    ..
                },
            ) => sa == sb && ta == tb,
            (Constraint::Global { vehicle: a }, Constraint::Global { vehicle: b }) => a == b,
            (
                Constraint::Relative {
                    lead: la,
                    follower: fa,
                },
                Constraint::Relative {
                    lead: lb,
                    follower: fb,
                },
            ) => la == lb && fa == fb,
            _ => false,
        }
    }

    /// Canonical structural signature.
    ///
    /// Two constraints are structurally equal iff their signatures are
    /// equal: the encoding normalizes centroid membership by sorting and
    /// excludes all post-hoc payload. Used as the fast key for sweep
    /// memos and dedup filters; correctness-bearing comparisons confirm
    /// with [`Constraint::structurally_eq`].
    pub fn signature(&self) -> SignatureHash {
        let mut data = Vec::with_capacity(16);
        match self {
            Constraint::Centroid { members, .. } => {
                data.push(0u8);
                let mut sorted = members.clone();
                sorted.sort();
                push_ids(&mut data, &sorted);
            }
            Constraint::Monitor {
                subject, targets, ..
            } => {
                data.push(1u8);
                push_ids(&mut data, std::slice::from_ref(subject));
                push_ids(&mut data, targets);
            }
            Constraint::Global { vehicle } => {
                data.push(2u8);
                push_ids(&mut data, std::slice::from_ref(vehicle));
            }
            Constraint::Relative { lead, follower } => {
                data.push(3u8);
                push_ids(&mut data, &[*lead, *follower]);
            }
        }
        SignatureHash::hash_with_domain(b"CONSTRAINT_SIG", &data)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Centroid { members, .. } => {
                write!(f, "centroid{{")?;
                for (i, id) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", id)?;
                }
                write!(f, "}}")
            }
            Constraint::Monitor {
                subject, targets, ..
            } => {
                write!(f, "monitor({}", subject)?;
                for id in targets {
                    write!(f, "→{}", id)?;
                }
                write!(f, ")")
            }
            Constraint::Global { vehicle } => write!(f, "global({})", vehicle),
            Constraint::Relative { lead, follower } => {
                write!(f, "relative({}, {})", lead, follower)
            }
        }
    }
}

/// Multiplicity-aware set equality over id sequences.
///
/// Same size, same members with the same multiplicities, no order
/// requirement. This is the Centroid identity rule.
fn multiset_eq(left: &[VehicleId], right: &[VehicleId]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut remaining: Vec<VehicleId> = right.to_vec();
    for id in left {
        match remaining.iter().position(|r| r == id) {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => return false,
        }
    }
    remaining.is_empty()
}

/// Appends a length-prefixed id sequence to a canonical encoding.
fn push_ids(out: &mut Vec<u8>, ids: &[VehicleId]) {
    out.extend_from_slice(&(ids.len() as u64).to_le_bytes());
    for id in ids {
        out.extend_from_slice(&id.get().to_le_bytes());
    }
}

/// A 256-bit structural signature.
///
/// Wraps a byte array for type safety; ordering and hashing are byte-wise.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SignatureHash([u8; 32]);

impl SignatureHash {
    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of `data` with domain separation.
    ///
    /// The domain tag is applied as `b"SYN:<domain>:v1"` followed by a
    /// 64-bit little-endian length prefix and the data itself, so
    /// signatures from different domains can never collide by
    /// construction.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SYN:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for SignatureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sig({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
