//! Pure, data-driven effect specifications.
//!
//! Effects are plain records resolved against a [`LedgerSnapshot`] and a
//! [`DeterministicRng`], producing a delta set that the executor applies.
//! Resolving never touches a live ledger, so every effect is testable in
//! isolation and its RNG consumption is explicit.

use serde::{Deserialize, Serialize};

use crate::ledger::{Attribute, LedgerSnapshot};
use crate::rng::DeterministicRng;

/// A resolved attribute delta, ready to be applied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Attribute to mutate.
    pub attribute: Attribute,
    /// Signed amount.
    pub amount: i64,
}

/// Declarative effect, expressible in scenario RON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectSpec {
    /// Fixed delta.
    Flat {
        /// Attribute to mutate.
        attribute: Attribute,
        /// Signed amount.
        amount: i64,
    },

    /// Uniform random delta in `[min, max]` (inclusive). Always consumes
    /// exactly one RNG draw so replay draw counts stay aligned.
    Range {
        /// Attribute to mutate.
        attribute: Attribute,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },

    /// Delta scaled by current staff count.
    PerStaff {
        /// Attribute to mutate.
        attribute: Attribute,
        /// Amount per staff member.
        amount_per_staff: i64,
    },

    /// Inner effect that fires with `percent`/100 probability.
    /// Consumes one RNG draw for the check regardless of outcome.
    Chance {
        /// Probability in percent.
        percent: u32,
        /// Effect applied when the check passes.
        effect: Box<EffectSpec>,
    },
}

impl EffectSpec {
    /// Resolve this effect to zero or more deltas.
    pub fn resolve(&self, snapshot: &LedgerSnapshot, rng: &mut DeterministicRng) -> Vec<Delta> {
        match self {
            Self::Flat { attribute, amount } => vec![Delta {
                attribute: *attribute,
                amount: *amount,
            }],
            Self::Range {
                attribute,
                min,
                max,
            } => vec![Delta {
                attribute: *attribute,
                amount: rng.draw_range(*min, *max),
            }],
            Self::PerStaff {
                attribute,
                amount_per_staff,
            } => vec![Delta {
                attribute: *attribute,
                amount: amount_per_staff.saturating_mul(snapshot.get(Attribute::Staff)),
            }],
            Self::Chance { percent, effect } => {
                if rng.percent_check(*percent) {
                    effect.resolve(snapshot, rng)
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Attributes this spec can touch (for load-time validation).
    pub fn attributes(&self, out: &mut Vec<Attribute>) {
        match self {
            Self::Flat { attribute, .. }
            | Self::Range { attribute, .. }
            | Self::PerStaff { attribute, .. } => out.push(*attribute),
            Self::Chance { effect, .. } => effect.attributes(out),
        }
    }
}

/// Resolve a list of effect specs in order.
pub fn resolve_all(
    specs: &[EffectSpec],
    snapshot: &LedgerSnapshot,
    rng: &mut DeterministicRng,
) -> Vec<Delta> {
    let mut deltas = Vec::new();
    for spec in specs {
        deltas.extend(spec.resolve(snapshot, rng));
    }
    deltas
}

/// Scale deltas by a percent multiplier, truncating toward zero.
///
/// Used for delegated actions (e.g. 80% effectiveness) and reduced
/// popup responses.
pub fn scale_deltas(deltas: &mut [Delta], percent: u32) {
    for delta in deltas {
        delta.amount = delta.amount.saturating_mul(i64::from(percent)) / 100;
    }
}
