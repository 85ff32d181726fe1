//! # Lab Core
//!
//! Deterministic turn engine for Frontier Lab, a resource-management
//! strategy game about steering a research organization while hidden
//! rivals race ahead.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (all draws come from seeded streams)
//!
//! This separation enables:
//! - Shareable seeds (weekly challenges play out identically everywhere)
//! - Headless batch simulation
//! - Replay capture and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`ledger`] - Resource state, clamping, auditing
//! - [`effects`] - Pure data-driven effect resolution
//! - [`data`] - Scenario definitions (actions, events, milestones, rivals)
//! - [`actions`] - Action queue execution
//! - [`events`] - Event triggers, popups, deferral
//! - [`milestones`] - One-shot thresholds and static effects
//! - [`opponents`] - Rival simulation and espionage
//! - [`turn`] - The turn pipeline and [`turn::GameSession`]
//! - [`snapshot`] - Versioned saves
//! - [`replay`] - Input recording and verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actions;
pub mod data;
pub mod effects;
pub mod error;
pub mod events;
pub mod ledger;
pub mod milestones;
pub mod opponents;
pub mod replay;
pub mod rng;
pub mod snapshot;
pub mod turn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actions::{ActionOutcome, PlannedAction, SkipReason};
    pub use crate::data::{GameConfig, Requirement, Scenario};
    pub use crate::effects::{Delta, EffectSpec};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventReport, PopupResponse};
    pub use crate::ledger::{Attribute, LedgerSnapshot, ResourceLedger};
    pub use crate::opponents::{EspionageReport, OpponentRoster};
    pub use crate::replay::Replay;
    pub use crate::rng::{DeterministicRng, Seed};
    pub use crate::snapshot::SaveGame;
    pub use crate::turn::{GameOver, GameSession, TurnAdvance, TurnPhase, TurnReport};
}
