//! Built-in scenario used by the headless runner and as a test fixture.
//!
//! Constructed in code rather than parsed from RON so the compiler checks
//! it, but it goes through the same [`Scenario::validate`] gate as any
//! external file (see the tests in `data/mod.rs`).

use crate::data::{
    ActionDef, DelegationPolicy, EscalationDef, EspionageSpec, EventDef, EventKind, GameConfig,
    MilestoneDef, OpponentDef, Requirement, Scenario, StaticEffectDef, StaticRule, TriggerSpec,
    UpgradeDef,
};
use crate::effects::EffectSpec;
use crate::ledger::Attribute;

impl Scenario {
    /// The built-in "frontier lab" scenario.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn builtin() -> Self {
        let config = GameConfig::default();
        let milestones = builtin_milestones(&config);
        Self {
            id: "frontier_lab".to_string(),
            config,
            actions: builtin_actions(),
            events: builtin_events(),
            milestones,
            upgrades: builtin_upgrades(),
            opponents: builtin_opponents(),
        }
    }
}

fn flat(attribute: Attribute, amount: i64) -> EffectSpec {
    EffectSpec::Flat { attribute, amount }
}

fn range(attribute: Attribute, min: i64, max: i64) -> EffectSpec {
    EffectSpec::Range {
        attribute,
        min,
        max,
    }
}

fn builtin_actions() -> Vec<ActionDef> {
    let blank = |id: &str, name: &str| ActionDef {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        money_cost: 0,
        ap_cost: 1,
        requirements: Vec::new(),
        upside: Vec::new(),
        downside: Vec::new(),
        delegation: None,
        grants_upgrade: None,
        espionage: None,
    };

    vec![
        ActionDef {
            description: "Pitch investors for a funding round.".to_string(),
            upside: vec![range(Attribute::Money, 20_000, 60_000)],
            downside: vec![EffectSpec::Chance {
                percent: 25,
                effect: Box::new(flat(Attribute::Reputation, -2)),
            }],
            ..blank("fundraise", "Fundraise")
        },
        ActionDef {
            description: "Recruit a researcher.".to_string(),
            money_cost: 2_000,
            upside: vec![flat(Attribute::Staff, 1)],
            ..blank("hire_staff", "Hire Staff")
        },
        ActionDef {
            description: "Direct the team toward alignment work.".to_string(),
            money_cost: 1_000,
            upside: vec![range(Attribute::Doom, -5, -2), flat(Attribute::Reputation, 1)],
            delegation: Some(DelegationPolicy {
                staff_required: 3,
                ap_cost: 0,
                effectiveness_percent: 80,
            }),
            ..blank("safety_research", "Safety Research")
        },
        ActionDef {
            description: "Push raw capabilities forward.".to_string(),
            money_cost: 1_000,
            upside: vec![range(Attribute::Research, 3, 6)],
            downside: vec![range(Attribute::Doom, 1, 3)],
            ..blank("capability_research", "Capability Research")
        },
        ActionDef {
            description: "Expand the training cluster.".to_string(),
            money_cost: 6_000,
            upside: vec![flat(Attribute::Compute, 10)],
            ..blank("buy_compute", "Buy Compute")
        },
        ActionDef {
            description: "Publish, give talks, host open houses.".to_string(),
            money_cost: 500,
            upside: vec![range(Attribute::Reputation, 2, 4)],
            delegation: Some(DelegationPolicy {
                staff_required: 2,
                ap_cost: 0,
                effectiveness_percent: 75,
            }),
            ..blank("community_outreach", "Community Outreach")
        },
        ActionDef {
            description: "Bring in an experienced research manager.".to_string(),
            money_cost: 8_000,
            grants_upgrade: Some("manager".to_string()),
            requirements: vec![Requirement::UpgradeMissing {
                id: "manager".to_string(),
            }],
            ..blank("hire_manager", "Hire Manager")
        },
        ActionDef {
            description: "Stand up a compliance office for large outlays.".to_string(),
            money_cost: 10_000,
            grants_upgrade: Some("compliance_office".to_string()),
            requirements: vec![Requirement::UpgradeMissing {
                id: "compliance_office".to_string(),
            }],
            ..blank("compliance_office", "Compliance Office")
        },
        ActionDef {
            description: "Quietly sample a rival's internals.".to_string(),
            money_cost: 3_000,
            espionage: Some(EspionageSpec {
                agent: None,
                stat: None,
            }),
            downside: vec![EffectSpec::Chance {
                percent: 10,
                effect: Box::new(flat(Attribute::Reputation, -5)),
            }],
            ..blank("espionage_probe", "Espionage Probe")
        },
    ]
}

fn builtin_events() -> Vec<EventDef> {
    vec![
        EventDef {
            id: "compute_failure".to_string(),
            name: "Cluster Outage".to_string(),
            description: "A cooling failure takes nodes offline.".to_string(),
            kind: EventKind::Immediate,
            trigger: TriggerSpec::Chance {
                percent: 10,
                requirements: vec![Requirement::AtLeast {
                    attribute: Attribute::Compute,
                    value: 5,
                }],
            },
            effects: vec![range(Attribute::Compute, -5, -2)],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: true,
            max_deferred_turns: None,
        },
        EventDef {
            id: "funding_crisis".to_string(),
            name: "Funding Crisis".to_string(),
            description: "Runway is nearly gone; the board wants cuts.".to_string(),
            kind: EventKind::Popup,
            trigger: TriggerSpec::Requirements(vec![Requirement::AtMost {
                attribute: Attribute::Money,
                value: 2_000,
            }]),
            effects: vec![flat(Attribute::Staff, -2), flat(Attribute::Reputation, -5)],
            reduced_effects: Some(vec![flat(Attribute::Staff, -1), flat(Attribute::Reputation, -3)]),
            hidden_consequence: Some("board_distrust".to_string()),
            repeatable: true,
            max_deferred_turns: None,
        },
        EventDef {
            id: "regulatory_inquiry".to_string(),
            name: "Regulatory Inquiry".to_string(),
            description: "Regulators request an account of recent spending.".to_string(),
            kind: EventKind::Popup,
            trigger: TriggerSpec::Chance {
                percent: 15,
                requirements: vec![Requirement::TurnAtLeast { turn: 5 }],
            },
            effects: vec![flat(Attribute::Money, -5_000), flat(Attribute::Reputation, 2)],
            reduced_effects: Some(vec![flat(Attribute::Money, -2_000)]),
            hidden_consequence: Some("ignored_regulators".to_string()),
            repeatable: true,
            max_deferred_turns: Some(3),
        },
        EventDef {
            id: "safety_retrofit".to_string(),
            name: "Safety Retrofit".to_string(),
            description: "Auditors mandate cluster safety upgrades; the bill can wait, briefly."
                .to_string(),
            kind: EventKind::Deferred,
            trigger: TriggerSpec::Chance {
                percent: 10,
                requirements: vec![Requirement::AtLeast {
                    attribute: Attribute::Compute,
                    value: 30,
                }],
            },
            effects: vec![flat(Attribute::Money, -6_000), flat(Attribute::Doom, -2)],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: true,
            max_deferred_turns: Some(4),
        },
        EventDef {
            id: "media_expose".to_string(),
            name: "Media Exposé".to_string(),
            description: "A journalist runs with the story you brushed off.".to_string(),
            kind: EventKind::Immediate,
            trigger: TriggerSpec::Chance {
                percent: 40,
                requirements: vec![Requirement::FlagSet {
                    id: "ignored_regulators".to_string(),
                }],
            },
            effects: vec![range(Attribute::Reputation, -12, -6)],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: false,
            max_deferred_turns: None,
        },
        EventDef {
            id: "board_revolt".to_string(),
            name: "Board Revolt".to_string(),
            description: "The board moves against leadership.".to_string(),
            kind: EventKind::Popup,
            trigger: TriggerSpec::Chance {
                percent: 30,
                requirements: vec![
                    Requirement::FlagSet {
                        id: "board_distrust".to_string(),
                    },
                    Requirement::AtMost {
                        attribute: Attribute::Reputation,
                        value: 40,
                    },
                ],
            },
            effects: vec![flat(Attribute::Reputation, -8), flat(Attribute::Money, -10_000)],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: false,
            max_deferred_turns: None,
        },
    ]
}

fn builtin_milestones(config: &GameConfig) -> Vec<MilestoneDef> {
    vec![
        MilestoneDef {
            id: "compliance_audit".to_string(),
            name: "Compliance Audit".to_string(),
            description: "Heavy single-turn spending without oversight draws scrutiny."
                .to_string(),
            requirements: vec![
                Requirement::SpendAtLeast {
                    value: config.compliance_spend_threshold,
                },
                Requirement::UpgradeMissing {
                    id: "compliance_office".to_string(),
                },
            ],
            once_effects: vec![flat(Attribute::Reputation, -5)],
            static_effect: Some(StaticEffectDef {
                effects: Vec::new(),
                escalation: Some(EscalationDef {
                    attribute: Attribute::Doom,
                    base: 1,
                    step: 1,
                }),
                rule: None,
                countermand: vec![Requirement::UpgradeOwned {
                    id: "compliance_office".to_string(),
                }],
            }),
        },
        MilestoneDef {
            id: "growing_pains".to_string(),
            name: "Growing Pains".to_string(),
            description: "The team has outgrown flat management.".to_string(),
            requirements: vec![
                Requirement::AtLeast {
                    attribute: Attribute::Staff,
                    value: config.supervisor_capacity,
                },
                Requirement::UpgradeMissing {
                    id: "manager".to_string(),
                },
            ],
            once_effects: Vec::new(),
            static_effect: Some(StaticEffectDef {
                effects: Vec::new(),
                escalation: None,
                rule: Some(StaticRule::StaffRequireSupervision),
                countermand: vec![Requirement::UpgradeOwned {
                    id: "manager".to_string(),
                }],
            }),
        },
        MilestoneDef {
            id: "doom_warning".to_string(),
            name: "Doom Warning".to_string(),
            description: "Forecasters flag the trajectory.".to_string(),
            requirements: vec![Requirement::AtLeast {
                attribute: Attribute::Doom,
                value: 75,
            }],
            once_effects: vec![flat(Attribute::Reputation, -10)],
            static_effect: None,
        },
    ]
}

fn builtin_upgrades() -> Vec<UpgradeDef> {
    vec![
        UpgradeDef {
            id: "manager".to_string(),
            name: "Research Manager".to_string(),
            description: "Keeps a growing team productive.".to_string(),
        },
        UpgradeDef {
            id: "compliance_office".to_string(),
            name: "Compliance Office".to_string(),
            description: "Paperwork for big spending, before regulators ask.".to_string(),
        },
    ]
}

fn builtin_opponents() -> Vec<OpponentDef> {
    vec![
        OpponentDef {
            id: "nimbus".to_string(),
            name: "Nimbus Labs".to_string(),
            budget: 200_000,
            researchers: 6,
            compute: 20,
            lobbyists: 1,
            progress_max: 1_000,
            capability_focus_percent: 80,
        },
        OpponentDef {
            id: "vector".to_string(),
            name: "Vector Institute".to_string(),
            budget: 120_000,
            researchers: 4,
            compute: 12,
            lobbyists: 0,
            progress_max: 1_000,
            capability_focus_percent: 55,
        },
    ]
}
