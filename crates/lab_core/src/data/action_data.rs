//! Player action definitions.

use serde::{Deserialize, Serialize};

use crate::data::{validation, Requirement};
use crate::effects::EffectSpec;
use crate::error::Result;

use super::opponent_data::OpponentStat;

/// Policy allowing staff to execute an action on the player's behalf.
///
/// Delegated execution trades effectiveness for action points: outcome
/// deltas are scaled down by `effectiveness_percent`, truncating toward
/// zero, and the listed staff are occupied for the turn (they produce no
/// research).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPolicy {
    /// Staff members tied up executing the action.
    pub staff_required: i64,
    /// Action point cost when delegated (usually lower than direct).
    pub ap_cost: i64,
    /// Outcome scaling in percent, `1..=100`.
    pub effectiveness_percent: u32,
}

/// Espionage payload attached to an intelligence-gathering action.
///
/// Executing the action samples one statistic of one rival with
/// configurable noise, recorded in the discovery log. Leaving `agent` or
/// `stat` unset means a random pick, drawn from the turn stream so
/// replays reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspionageSpec {
    /// Opponent to spy on; `None` picks one at random.
    #[serde(default)]
    pub agent: Option<String>,
    /// Statistic to sample; `None` picks one at random.
    #[serde(default)]
    pub stat: Option<OpponentStat>,
}

/// One player action.
///
/// # Example RON
///
/// ```ron
/// ActionDef(
///     id: "safety_research",
///     name: "Safety Research",
///     money_cost: 1000,
///     ap_cost: 1,
///     upside: [Range(attribute: Doom, min: -5, max: -2)],
///     downside: [],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Unique ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavor/description text.
    #[serde(default)]
    pub description: String,
    /// Money deducted up front. Unaffordable actions are skipped, never
    /// partially executed.
    #[serde(default)]
    pub money_cost: i64,
    /// Action points consumed on direct execution.
    #[serde(default)]
    pub ap_cost: i64,
    /// Availability requirements, all of which must hold.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Beneficial effects, resolved first.
    #[serde(default)]
    pub upside: Vec<EffectSpec>,
    /// Detrimental effects, resolved after the upside.
    #[serde(default)]
    pub downside: Vec<EffectSpec>,
    /// Optional staff delegation policy.
    #[serde(default)]
    pub delegation: Option<DelegationPolicy>,
    /// Upgrade granted on successful execution.
    #[serde(default)]
    pub grants_upgrade: Option<String>,
    /// Espionage payload, if this is an intelligence action.
    #[serde(default)]
    pub espionage: Option<EspionageSpec>,
}

impl ActionDef {
    /// Shape checks run once at scenario load.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.money_cost < 0 {
            return Err(validation(&self.id, "money_cost must be non-negative"));
        }
        if self.ap_cost < 0 {
            return Err(validation(&self.id, "ap_cost must be non-negative"));
        }
        if let Some(delegation) = &self.delegation {
            if delegation.staff_required <= 0 {
                return Err(validation(&self.id, "delegation staff_required must be positive"));
            }
            if delegation.ap_cost < 0 {
                return Err(validation(&self.id, "delegation ap_cost must be non-negative"));
            }
            if delegation.effectiveness_percent == 0 || delegation.effectiveness_percent > 100 {
                return Err(validation(
                    &self.id,
                    "delegation effectiveness_percent must be in 1..=100",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(id: &str) -> ActionDef {
        ActionDef {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            money_cost: 0,
            ap_cost: 1,
            requirements: Vec::new(),
            upside: Vec::new(),
            downside: Vec::new(),
            delegation: None,
            grants_upgrade: None,
            espionage: None,
        }
    }

    #[test]
    fn test_negative_costs_rejected() {
        let mut action = minimal("a");
        action.money_cost = -1;
        assert!(action.validate().is_err());

        let mut action = minimal("b");
        action.ap_cost = -1;
        assert!(action.validate().is_err());
    }

    #[test]
    fn test_delegation_bounds_checked() {
        let mut action = minimal("c");
        action.delegation = Some(DelegationPolicy {
            staff_required: 2,
            ap_cost: 0,
            effectiveness_percent: 101,
        });
        assert!(action.validate().is_err());

        action.delegation = Some(DelegationPolicy {
            staff_required: 2,
            ap_cost: 0,
            effectiveness_percent: 80,
        });
        assert!(action.validate().is_ok());
    }
}
