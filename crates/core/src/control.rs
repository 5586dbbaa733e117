//! Derived system mode and the control-state singleton.
//!
//! The mode is never stored or set: it is recomputed each cycle as a pure
//! function of the current escalation, cooldown and degradation facts, in
//! strict priority order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::action::ActionId;
use crate::domain::decision::{ActionKind, ActionTarget};
use crate::domain::learning::LearningSummary;
use crate::domain::metrics::MetricsSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    Normal,
    Degraded,
    HumanApprovalRequired,
    CooldownActive,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Degraded => "degraded",
            Self::HumanApprovalRequired => "human_approval_required",
            Self::CooldownActive => "cooldown_active",
        }
    }
}

impl std::fmt::Display for SystemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Overall success rate below which the system reads as degraded.
    pub degraded_success_rate: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { degraded_success_rate: 0.78 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub action: ActionKind,
    pub target: ActionTarget,
    pub until: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationRef {
    pub action_id: ActionId,
    pub action: ActionKind,
    pub target: Option<ActionTarget>,
    pub risk: f64,
    pub reason: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub mode: SystemMode,
    pub cooldowns: Vec<CooldownEntry>,
    pub escalation: Option<EscalationRef>,
    pub learning: LearningSummary,
    pub recomputed_at: DateTime<Utc>,
}

impl ControlState {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            mode: SystemMode::Normal,
            cooldowns: Vec::new(),
            escalation: None,
            learning: LearningSummary::default(),
            recomputed_at: now,
        }
    }
}

/// Recompute the control state from current facts.
///
/// Priority: an unresolved escalation wins, then any live cooldown, then
/// metric degradation, then normal. Expired cooldown entries are kept in the
/// published list only while live; callers pass the already-pruned set.
pub fn recompute(
    escalation: Option<EscalationRef>,
    cooldowns: Vec<CooldownEntry>,
    metrics: Option<&MetricsSnapshot>,
    learning: LearningSummary,
    config: &ControlConfig,
    now: DateTime<Utc>,
) -> ControlState {
    let cooldown_live = cooldowns.iter().any(|entry| entry.until > now);
    let degraded = metrics
        .map(|snapshot| snapshot.overall_success_rate < config.degraded_success_rate)
        .unwrap_or(false);

    let mode = if escalation.is_some() {
        SystemMode::HumanApprovalRequired
    } else if cooldown_live {
        SystemMode::CooldownActive
    } else if degraded {
        SystemMode::Degraded
    } else {
        SystemMode::Normal
    };

    ControlState { mode, cooldowns, escalation, learning, recomputed_at: now }
}
