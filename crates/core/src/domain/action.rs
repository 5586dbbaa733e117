use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::decision::{ActionKind, ActionTarget, Decision};
use crate::domain::metrics::WindowId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed,
    Blocked,
    SkippedCooldown,
    PendingApproval,
    RolledBack,
    Failed,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Blocked => "blocked",
            Self::SkippedCooldown => "skipped_cooldown",
            Self::PendingApproval => "pending_approval",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "executed" => Some(Self::Executed),
            "blocked" => Some(Self::Blocked),
            "skipped_cooldown" => Some(Self::SkippedCooldown),
            "pending_approval" => Some(Self::PendingApproval),
            "rolled_back" => Some(Self::RolledBack),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Outcome state machine. PENDING_APPROVAL resolves to EXECUTED, BLOCKED
    /// or FAILED (apply errored during approval); EXECUTED may regress to
    /// ROLLED_BACK. Everything else is terminal.
    pub fn can_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::PendingApproval, Self::Executed)
                | (Self::PendingApproval, Self::Blocked)
                | (Self::PendingApproval, Self::Failed)
                | (Self::Executed, Self::RolledBack)
        )
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailFlag {
    ApprovalRequired,
    RiskCeiling,
    CooldownActive,
    EscalationOccupied,
    HumanDeclined,
    RegressionDetected,
    BackendFailure,
}

impl GuardrailFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequired => "approval_required",
            Self::RiskCeiling => "risk_ceiling",
            Self::CooldownActive => "cooldown_active",
            Self::EscalationOccupied => "escalation_occupied",
            Self::HumanDeclined => "human_declined",
            Self::RegressionDetected => "regression_detected",
            Self::BackendFailure => "backend_failure",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: ActionId,
    pub decision: Decision,
    pub outcome: ActionOutcome,
    pub guardrails: Vec<GuardrailFlag>,
    pub before_window: Option<WindowId>,
    pub after_window: Option<WindowId>,
    pub executed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(decision: Decision, outcome: ActionOutcome, now: DateTime<Utc>) -> Self {
        Self {
            id: ActionId::generate(),
            decision,
            outcome,
            guardrails: Vec::new(),
            before_window: None,
            after_window: None,
            executed_at: None,
            rolled_back_at: None,
            note: None,
            created_at: now,
        }
    }

    pub fn with_guardrail(mut self, flag: GuardrailFlag) -> Self {
        self.guardrails.push(flag);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Identity used by the history dedup rule: a repeat of the same
    /// (action, target, outcome) directly after the previous entry is noise,
    /// not a new fact.
    pub fn dedup_key(&self) -> (ActionKind, Option<&ActionTarget>, ActionOutcome) {
        (self.decision.action, self.decision.target.as_ref(), self.outcome)
    }
}
