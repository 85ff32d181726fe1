//! Event triggering, popups, and deferral.
//!
//! Events trigger during the event phase of each turn. Immediate events
//! resolve on the spot; popups block turn completion until the player
//! responds (and may be pushed to a later turn with `Defer`); deferred
//! events skip the popup entirely and enter the decision queue on trigger,
//! auto-executing at full strength when their window expires unless the
//! player settles them early. When the `enhanced_events` config flag is
//! off, every event resolves immediately and none of this machinery runs.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::data::{all_satisfied, EvalContext, EventDef, EventKind, Scenario, TriggerSpec};
use crate::effects::resolve_all;
use crate::error::{GameError, Result};
use crate::ledger::{Adjustment, ResourceLedger};
use crate::rng::DeterministicRng;

/// Player response to a blocking popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopupResponse {
    /// Apply the event's effects at full strength.
    Accept,
    /// Apply the reduced effect set (or half-strength effects when the
    /// definition has none).
    Reduce,
    /// Apply nothing now. Sets the event's hidden-consequence flag,
    /// if it has one.
    Dismiss,
    /// Push the decision to a later turn, using the event's window or the
    /// configured default when it has none.
    Defer,
}

/// A deferred decision waiting to expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredEntry {
    /// Event awaiting a decision.
    pub event_id: String,
    /// Turn at which the event auto-executes at full strength.
    pub expires_at_turn: u32,
}

/// How one event left the scheduler this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReport {
    /// Event ID.
    pub event_id: String,
    /// Response that resolved it, if the player was involved.
    pub response: Option<PopupResponse>,
    /// Whether expiry or a queue overflow forced the resolution.
    pub forced: bool,
    /// Ledger adjustments made.
    pub adjustments: Vec<Adjustment>,
}

/// Event state machine for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScheduler {
    fired: BTreeSet<String>,
    flags: BTreeSet<String>,
    pending: VecDeque<String>,
    deferred: Vec<DeferredEntry>,
}

impl EventScheduler {
    /// Hidden-consequence flags set so far.
    #[must_use]
    pub const fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// The popup currently blocking turn completion, if any.
    #[must_use]
    pub fn pending_popup(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    /// Currently deferred decisions.
    #[must_use]
    pub fn deferred(&self) -> &[DeferredEntry] {
        &self.deferred
    }

    /// Run the event phase: expire due deferrals, then evaluate triggers.
    ///
    /// Chance triggers consume exactly one draw whether or not their gate
    /// requirements hold, so the draw stream stays aligned across runs
    /// that differ only in game state.
    pub fn trigger_phase(
        &mut self,
        scenario: &Scenario,
        ledger: &mut ResourceLedger,
        turn: u32,
        upgrades: &BTreeSet<String>,
        fired_milestones: &BTreeSet<String>,
        rng: &mut DeterministicRng,
    ) -> Vec<EventReport> {
        let mut reports = Vec::new();

        // Expired deferrals execute at full strength before new triggers.
        let due: Vec<DeferredEntry> = {
            let (due, keep) = std::mem::take(&mut self.deferred)
                .into_iter()
                .partition(|entry| entry.expires_at_turn <= turn);
            self.deferred = keep;
            due
        };
        for entry in due {
            if let Some(def) = scenario.event(&entry.event_id) {
                reports.push(self.resolve(def, &def.effects, ledger, rng, None, true));
            }
        }

        for def in &scenario.events {
            if self.fired.contains(&def.id) && !def.repeatable {
                continue;
            }
            if self.pending.contains(&def.id)
                || self.deferred.iter().any(|entry| entry.event_id == def.id)
            {
                continue;
            }

            let triggered = {
                let snapshot = ledger.snapshot();
                let ctx = EvalContext {
                    snapshot: &snapshot,
                    turn,
                    turn_spend: ledger.turn_spend(),
                    fired_milestones,
                    upgrades,
                    flags: &self.flags,
                };
                match &def.trigger {
                    TriggerSpec::Always => true,
                    TriggerSpec::Requirements(reqs) => all_satisfied(reqs, &ctx),
                    TriggerSpec::Chance {
                        percent,
                        requirements,
                    } => {
                        let roll = rng.percent_check(*percent);
                        roll && all_satisfied(requirements, &ctx)
                    }
                }
            };
            if !triggered {
                continue;
            }

            if !def.repeatable {
                self.fired.insert(def.id.clone());
            }

            match def.kind {
                EventKind::Popup if scenario.config.enhanced_events => {
                    tracing::debug!(event = %def.id, "Popup raised");
                    self.pending.push_back(def.id.clone());
                }
                EventKind::Deferred if scenario.config.enhanced_events => {
                    let expires_at_turn = turn + deferral_window(def, scenario);
                    tracing::debug!(event = %def.id, expires_at_turn, "Decision queued");
                    self.deferred.push(DeferredEntry {
                        event_id: def.id.clone(),
                        expires_at_turn,
                    });
                    reports.extend(self.enforce_queue_bound(scenario, ledger, rng));
                }
                _ => reports.push(self.resolve(def, &def.effects, ledger, rng, None, false)),
            }
        }

        reports
    }

    /// Resolve a queued deferred decision ahead of its expiry, at full
    /// strength. Returns `None` when `event_id` is not currently queued.
    pub fn resolve_early(
        &mut self,
        scenario: &Scenario,
        event_id: &str,
        ledger: &mut ResourceLedger,
        rng: &mut DeterministicRng,
    ) -> Option<EventReport> {
        let index = self
            .deferred
            .iter()
            .position(|entry| entry.event_id == event_id)?;
        self.deferred.remove(index);
        let def = scenario.event(event_id)?;
        Some(self.resolve(def, &def.effects, ledger, rng, Some(PopupResponse::Accept), false))
    }

    /// Resolve the front pending popup with the player's response.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoPendingPopup`] when `event_id` is not the
    /// popup currently awaiting a response.
    pub fn respond(
        &mut self,
        scenario: &Scenario,
        event_id: &str,
        response: PopupResponse,
        ledger: &mut ResourceLedger,
        turn: u32,
        rng: &mut DeterministicRng,
    ) -> Result<Vec<EventReport>> {
        if self.pending_popup() != Some(event_id) {
            return Err(GameError::NoPendingPopup(event_id.to_string()));
        }
        let def = scenario
            .event(event_id)
            .ok_or_else(|| GameError::InvalidState(format!("popup for unknown event '{event_id}'")))?;

        let mut reports = Vec::new();
        match response {
            PopupResponse::Accept => {
                reports.push(self.resolve(def, &def.effects, ledger, rng, Some(response), false));
            }
            PopupResponse::Reduce => {
                let snapshot = ledger.snapshot();
                let mut deltas = match &def.reduced_effects {
                    Some(reduced) => resolve_all(reduced, &snapshot, rng),
                    None => {
                        let mut deltas = resolve_all(&def.effects, &snapshot, rng);
                        crate::effects::scale_deltas(&mut deltas, 50);
                        deltas
                    }
                };
                let adjustments = deltas
                    .drain(..)
                    .map(|delta| {
                        ledger.add(delta.attribute, delta.amount, &format!("event:{event_id}:reduced"))
                    })
                    .collect();
                reports.push(EventReport {
                    event_id: event_id.to_string(),
                    response: Some(response),
                    forced: false,
                    adjustments,
                });
            }
            PopupResponse::Dismiss => {
                if let Some(flag) = &def.hidden_consequence {
                    tracing::debug!(event = %event_id, flag = %flag, "Dismissal flagged");
                    self.flags.insert(flag.clone());
                }
                reports.push(EventReport {
                    event_id: event_id.to_string(),
                    response: Some(response),
                    forced: false,
                    adjustments: Vec::new(),
                });
            }
            PopupResponse::Defer => {
                self.deferred.push(DeferredEntry {
                    event_id: event_id.to_string(),
                    expires_at_turn: turn + deferral_window(def, scenario),
                });
                reports.extend(self.enforce_queue_bound(scenario, ledger, rng));
            }
        }

        self.pending.pop_front();
        Ok(reports)
    }

    /// Bounded queue: overflow force-resolves the oldest entry rather
    /// than rejecting the newcomer.
    fn enforce_queue_bound(
        &mut self,
        scenario: &Scenario,
        ledger: &mut ResourceLedger,
        rng: &mut DeterministicRng,
    ) -> Option<EventReport> {
        if self.deferred.len() <= scenario.config.deferred_queue_bound {
            return None;
        }
        let oldest = self.deferred.remove(0);
        let def = scenario.event(&oldest.event_id)?;
        tracing::warn!(event = %oldest.event_id, "Deferred queue full, forcing oldest");
        Some(self.resolve(def, &def.effects, ledger, rng, None, true))
    }

    fn resolve(
        &mut self,
        def: &EventDef,
        effects: &[crate::effects::EffectSpec],
        ledger: &mut ResourceLedger,
        rng: &mut DeterministicRng,
        response: Option<PopupResponse>,
        forced: bool,
    ) -> EventReport {
        let snapshot = ledger.snapshot();
        let deltas = resolve_all(effects, &snapshot, rng);
        let adjustments = deltas
            .into_iter()
            .map(|delta| ledger.add(delta.attribute, delta.amount, &format!("event:{}", def.id)))
            .collect();
        EventReport {
            event_id: def.id.clone(),
            response,
            forced,
            adjustments,
        }
    }
}

/// How many turns a decision on this event may be pushed. Definitions
/// without an explicit window get the configured default.
fn deferral_window(def: &EventDef, scenario: &Scenario) -> u32 {
    def.max_deferred_turns
        .unwrap_or(scenario.config.default_deferral_turns)
        .max(1)
}
