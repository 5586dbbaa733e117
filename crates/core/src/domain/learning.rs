use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::action::ActionId;
use crate::domain::decision::ActionKind;
use crate::domain::hypothesis::RootCause;
use crate::domain::metrics::WindowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Helped,
    Hurt,
    Neutral,
}

impl OutcomeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helped => "helped",
            Self::Hurt => "hurt",
            Self::Neutral => "neutral",
        }
    }
}

/// One resolved action, classified. `success_delta` is an absolute rate
/// difference; `cost_delta` and `retry_delta` are normalized against the
/// pre-action baseline so small absolute drifts compare on one scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub action_id: ActionId,
    pub action: ActionKind,
    pub cause: RootCause,
    pub classification: OutcomeClass,
    pub success_delta: f64,
    pub cost_delta: f64,
    pub retry_delta: f64,
    pub confidence_adjustment: f64,
    pub before_window: WindowId,
    pub after_window: WindowId,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivenessStats {
    pub helped: u32,
    pub hurt: u32,
    pub neutral: u32,
}

impl EffectivenessStats {
    pub fn record(&mut self, class: OutcomeClass) {
        match class {
            OutcomeClass::Helped => self.helped += 1,
            OutcomeClass::Hurt => self.hurt += 1,
            OutcomeClass::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.helped + self.hurt + self.neutral
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessEntry {
    pub action: ActionKind,
    pub cause: RootCause,
    #[serde(flatten)]
    pub stats: EffectivenessStats,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CautionEntry {
    pub cause: RootCause,
    pub bias: f64,
    pub consecutive_hurt: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub totals: EffectivenessStats,
    pub effectiveness: Vec<EffectivenessEntry>,
    pub caution: Vec<CautionEntry>,
}

/// Advisory input to the decision engine, rebuilt from learner state each
/// cycle. Missing causes read as zero penalty and zero streak.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LearningBias {
    penalties: HashMap<RootCause, f64>,
    hurt_streaks: HashMap<RootCause, u32>,
}

impl LearningBias {
    pub fn set(&mut self, cause: RootCause, penalty: f64, consecutive_hurt: u32) {
        self.penalties.insert(cause, penalty);
        self.hurt_streaks.insert(cause, consecutive_hurt);
    }

    pub fn penalty(&self, cause: RootCause) -> f64 {
        self.penalties.get(&cause).copied().unwrap_or(0.0)
    }

    pub fn consecutive_hurt(&self, cause: RootCause) -> u32 {
        self.hurt_streaks.get(&cause).copied().unwrap_or(0)
    }
}
