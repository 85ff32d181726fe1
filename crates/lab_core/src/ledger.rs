//! Resource ledger: the single owner of mutable numeric game state.
//!
//! Every mutation goes through [`ResourceLedger::add`], which clamps to
//! per-attribute bounds, records a structured audit entry, accumulates the
//! per-turn spend counter, and pushes a mutation record for the milestone
//! engine to drain. The ledger never rejects an in-range-or-not value for
//! a known attribute: callers get a [`Adjustment`] describing what was
//! actually applied so they can log clamps, but the turn never aborts.
//!
//! All values are integers. Clamping rather than failing keeps invariants
//! true by construction: reputation and doom stay in `[0, 100]`, everything
//! else stays non-negative.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// A mutable resource tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    /// Cash on hand, in dollars.
    Money,
    /// Employee headcount.
    Staff,
    /// Public reputation, clamped to `[0, 100]`.
    Reputation,
    /// Catastrophic-risk metric, clamped to `[0, 100]`. 100 is game over.
    Doom,
    /// Compute units available for research.
    Compute,
    /// Accumulated research output.
    Research,
    /// Per-turn action budget.
    ActionPoints,
}

impl Attribute {
    /// All attributes in canonical (hashing/audit) order.
    pub const ALL: [Self; 7] = [
        Self::Money,
        Self::Staff,
        Self::Reputation,
        Self::Doom,
        Self::Compute,
        Self::Research,
        Self::ActionPoints,
    ];

    /// Canonical lowercase name, as used in data files and audit logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Money => "money",
            Self::Staff => "staff",
            Self::Reputation => "reputation",
            Self::Doom => "doom",
            Self::Compute => "compute",
            Self::Research => "research",
            Self::ActionPoints => "action_points",
        }
    }

    /// Parse a canonical attribute name.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidAttribute`] for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.name() == name)
            .ok_or_else(|| GameError::InvalidAttribute(name.to_string()))
    }

    /// Inclusive bounds for this attribute: `(min, max)`.
    const fn bounds(self) -> (i64, Option<i64>) {
        match self {
            Self::Reputation | Self::Doom => (0, Some(100)),
            _ => (0, None),
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Money => 0,
            Self::Staff => 1,
            Self::Reputation => 2,
            Self::Doom => 3,
            Self::Compute => 4,
            Self::Research => 5,
            Self::ActionPoints => 6,
        }
    }
}

/// Outcome of a single ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Attribute that was mutated.
    pub attribute: Attribute,
    /// Delta the caller asked for.
    pub requested: i64,
    /// Delta actually applied after clamping.
    pub applied: i64,
    /// Whether bounds intervened.
    pub clamped: bool,
}

/// Structured audit record for one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Turn the mutation happened on.
    pub turn: u32,
    /// Attribute that was mutated.
    pub attribute: Attribute,
    /// Requested delta.
    pub requested: i64,
    /// Applied delta after clamping.
    pub applied: i64,
    /// Caller-supplied reason tag, e.g. `"action:fundraise:upside"`.
    pub reason: String,
}

/// Mutation notification drained by the milestone engine.
///
/// The ledger pushes one of these per mutation; the engine drains them
/// after each pipeline stage. Push-based observation means a threshold
/// that is true for only a single batch is never missed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Attribute that changed.
    pub attribute: Attribute,
    /// Applied delta.
    pub applied: i64,
}

/// Immutable copy of all ledger values, handed to pure effect functions
/// and availability predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    values: [i64; 7],
}

impl LedgerSnapshot {
    /// Value of one attribute.
    #[must_use]
    pub const fn get(&self, attribute: Attribute) -> i64 {
        self.values[attribute.index()]
    }

    /// Build a snapshot from explicit values (mostly for tests/config).
    #[must_use]
    pub fn from_values(pairs: &[(Attribute, i64)]) -> Self {
        let mut snapshot = Self::default();
        for &(attribute, value) in pairs {
            snapshot.values[attribute.index()] = value;
        }
        snapshot
    }
}

/// The mutable numeric game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    values: [i64; 7],
    audit: Vec<AuditEntry>,
    pending: Vec<MutationRecord>,
    turn_spend: i64,
    turn: u32,
}

impl ResourceLedger {
    /// Create a ledger from starting values, clamping each to bounds.
    #[must_use]
    pub fn new(starting: &LedgerSnapshot) -> Self {
        let mut ledger = Self {
            values: [0; 7],
            audit: Vec::new(),
            pending: Vec::new(),
            turn_spend: 0,
            turn: 0,
        };
        for attribute in Attribute::ALL {
            ledger.values[attribute.index()] = clamp_value(attribute, starting.get(attribute));
        }
        ledger
    }

    /// Current value of an attribute.
    #[must_use]
    pub const fn get(&self, attribute: Attribute) -> i64 {
        self.values[attribute.index()]
    }

    /// Immutable snapshot of all values.
    #[must_use]
    pub const fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            values: self.values,
        }
    }

    /// Begin a new turn: stamps audit entries and resets the per-turn
    /// spend accumulator. Called by the phase controller only.
    pub fn begin_turn(&mut self, turn: u32) {
        self.turn = turn;
        self.turn_spend = 0;
    }

    /// Apply a delta to an attribute, clamping to bounds.
    ///
    /// Never fails: out-of-range results are clamped and reported via
    /// [`Adjustment::clamped`]. Negative money deltas accumulate into the
    /// per-turn spend counter read by milestone predicates.
    pub fn add(&mut self, attribute: Attribute, delta: i64, reason: &str) -> Adjustment {
        let before = self.values[attribute.index()];
        let after = clamp_value(attribute, before.saturating_add(delta));
        let applied = after - before;
        let clamped = applied != delta;

        self.values[attribute.index()] = after;

        if clamped {
            tracing::warn!(
                attribute = attribute.name(),
                requested = delta,
                applied,
                reason,
                "Ledger adjustment clamped"
            );
        }

        if attribute == Attribute::Money && applied < 0 {
            self.turn_spend += -applied;
        }

        self.audit.push(AuditEntry {
            turn: self.turn,
            attribute,
            requested: delta,
            applied,
            reason: reason.to_string(),
        });
        self.pending.push(MutationRecord { attribute, applied });

        Adjustment {
            attribute,
            requested: delta,
            applied,
            clamped,
        }
    }

    /// Apply a delta to an attribute looked up by name.
    ///
    /// Unknown attribute names are a programmer error: fatal in debug
    /// builds, logged and dropped in release builds.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidAttribute`] for unknown names.
    pub fn add_by_name(&mut self, name: &str, delta: i64, reason: &str) -> Result<Adjustment> {
        match Attribute::parse(name) {
            Ok(attribute) => Ok(self.add(attribute, delta, reason)),
            Err(err) => {
                debug_assert!(false, "unknown ledger attribute: {name}");
                tracing::error!(attribute = name, delta, reason, "Dropped mutation on unknown attribute");
                Err(err)
            }
        }
    }

    /// Set an attribute to an exact value (used for the per-turn action
    /// point refill). Clamps and audits like [`add`](Self::add).
    pub fn refill(&mut self, attribute: Attribute, value: i64, reason: &str) -> Adjustment {
        let delta = value - self.values[attribute.index()];
        self.add(attribute, delta, reason)
    }

    /// Total money spent (negative deltas) so far this turn.
    #[must_use]
    pub const fn turn_spend(&self) -> i64 {
        self.turn_spend
    }

    /// Drain pending mutation records for milestone observation.
    pub fn drain_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Full audit log since game start.
    #[must_use]
    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    /// Verify bounds invariants hold for every attribute.
    ///
    /// True by construction; checked between pipeline phases as a
    /// stuck-turn tripwire.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        Attribute::ALL.into_iter().all(|attribute| {
            let value = self.get(attribute);
            let (min, max) = attribute.bounds();
            value >= min && max.map_or(true, |m| value <= m)
        })
    }
}

fn clamp_value(attribute: Attribute, value: i64) -> i64 {
    let (min, max) = attribute.bounds();
    let mut clamped = value.max(min);
    if let Some(max) = max {
        clamped = clamped.min(max);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ResourceLedger {
        ResourceLedger::new(&LedgerSnapshot::from_values(&[
            (Attribute::Money, 10_000),
            (Attribute::Staff, 3),
            (Attribute::Reputation, 50),
            (Attribute::Doom, 20),
            (Attribute::ActionPoints, 3),
        ]))
    }

    #[test]
    fn test_add_applies_delta() {
        let mut ledger = ledger();
        let adj = ledger.add(Attribute::Money, -5_000, "test");
        assert_eq!(adj.applied, -5_000);
        assert!(!adj.clamped);
        assert_eq!(ledger.get(Attribute::Money), 5_000);
    }

    #[test]
    fn test_clamps_to_floor_without_failing() {
        let mut ledger = ledger();
        let adj = ledger.add(Attribute::Money, -50_000, "overspend");
        assert!(adj.clamped);
        assert_eq!(adj.applied, -10_000);
        assert_eq!(ledger.get(Attribute::Money), 0);
    }

    #[test]
    fn test_doom_and_reputation_clamp_to_100() {
        let mut ledger = ledger();
        let adj = ledger.add(Attribute::Doom, 500, "spike");
        assert!(adj.clamped);
        assert_eq!(ledger.get(Attribute::Doom), 100);

        let adj = ledger.add(Attribute::Reputation, 60, "pr win");
        assert!(adj.clamped);
        assert_eq!(ledger.get(Attribute::Reputation), 100);
    }

    #[test]
    fn test_turn_spend_counts_only_negative_money() {
        let mut ledger = ledger();
        ledger.begin_turn(1);
        ledger.add(Attribute::Money, -2_000, "a");
        ledger.add(Attribute::Money, 500, "income");
        ledger.add(Attribute::Staff, -1, "departure");
        assert_eq!(ledger.turn_spend(), 2_000);

        ledger.begin_turn(2);
        assert_eq!(ledger.turn_spend(), 0);
    }

    #[test]
    fn test_turn_spend_uses_applied_not_requested() {
        let mut ledger = ledger();
        ledger.begin_turn(1);
        ledger.add(Attribute::Money, -50_000, "overspend");
        // Only 10_000 could actually leave the ledger.
        assert_eq!(ledger.turn_spend(), 10_000);
    }

    #[test]
    fn test_audit_records_reason_and_turn() {
        let mut ledger = ledger();
        ledger.begin_turn(4);
        ledger.add(Attribute::Compute, 10, "action:buy_compute:upside");

        let entry = ledger.audit().last().unwrap();
        assert_eq!(entry.turn, 4);
        assert_eq!(entry.attribute, Attribute::Compute);
        assert_eq!(entry.reason, "action:buy_compute:upside");
    }

    #[test]
    fn test_drain_mutations_empties_queue() {
        let mut ledger = ledger();
        ledger.add(Attribute::Doom, 1, "tick");
        ledger.add(Attribute::Doom, 1, "tick");

        let drained = ledger.drain_mutations();
        assert_eq!(drained.len(), 2);
        assert!(ledger.drain_mutations().is_empty());
    }

    #[test]
    fn test_unknown_attribute_name_is_error() {
        let mut ledger = ledger();
        // debug_assert fires in debug builds; release drops the mutation.
        if cfg!(debug_assertions) {
            return;
        }
        let result = ledger.add_by_name("mana", 5, "typo");
        assert!(matches!(result, Err(GameError::InvalidAttribute(_))));
    }

    #[test]
    fn test_invariants_hold_after_arbitrary_mutations() {
        let mut ledger = ledger();
        for delta in [-1_000_000, 1_000_000, -3, 77] {
            for attribute in Attribute::ALL {
                ledger.add(attribute, delta, "fuzz");
            }
        }
        assert!(ledger.invariants_hold());
    }
}
