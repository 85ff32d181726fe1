//! Rival organization definitions.

use serde::{Deserialize, Serialize};

use crate::data::validation;
use crate::error::Result;

/// A statistic of a rival organization that espionage can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpponentStat {
    /// Remaining budget.
    Budget,
    /// Researcher headcount.
    Researchers,
    /// Compute units.
    Compute,
    /// Lobbyist headcount.
    Lobbyists,
    /// Capability progress.
    Progress,
}

impl OpponentStat {
    /// All stats, in the order random espionage picks from.
    pub const ALL: [Self; 5] = [
        Self::Budget,
        Self::Researchers,
        Self::Compute,
        Self::Lobbyists,
        Self::Progress,
    ];

    /// Canonical lowercase name for reports and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Researchers => "researchers",
            Self::Compute => "compute",
            Self::Lobbyists => "lobbyists",
            Self::Progress => "progress",
        }
    }
}

/// Starting state for one rival organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentDef {
    /// Unique ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Starting budget.
    pub budget: i64,
    /// Starting researcher headcount.
    pub researchers: i64,
    /// Starting compute units.
    pub compute: i64,
    /// Starting lobbyist headcount.
    #[serde(default)]
    pub lobbyists: i64,
    /// Capability progress at which this rival triggers a loss.
    pub progress_max: i64,
    /// Share of research effort directed at raw capability (the rest is
    /// safety work). Higher focus means faster doom contribution.
    pub capability_focus_percent: u32,
}

impl OpponentDef {
    /// Shape checks run once at scenario load.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.progress_max <= 0 {
            return Err(validation(&self.id, "progress_max must be positive"));
        }
        if self.capability_focus_percent > 100 {
            return Err(validation(&self.id, "capability_focus_percent must be at most 100"));
        }
        if self.budget < 0 || self.researchers < 0 || self.compute < 0 || self.lobbyists < 0 {
            return Err(validation(&self.id, "starting stats must be non-negative"));
        }
        Ok(())
    }
}
