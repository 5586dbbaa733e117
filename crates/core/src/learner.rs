//! Grades resolved actions against the metrics they were meant to move and
//! keeps a per-cause caution bias for the decision engine.
//!
//! Grading is harm-first: if any delta crosses its harm threshold the action
//! is HURT no matter what improved, and a rollback is HURT unconditionally
//! (the regression that forced it may live in a signal the deltas do not
//! cover, latency being the usual one). HELPED requires a clean improvement;
//! everything else is NEUTRAL.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::action::{ActionOutcome, ActionRecord};
use crate::domain::decision::ActionKind;
use crate::domain::hypothesis::RootCause;
use crate::domain::learning::{
    CautionEntry, EffectivenessEntry, EffectivenessStats, LearningBias, LearningRecord,
    LearningSummary, OutcomeClass,
};
use crate::domain::metrics::MetricsSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Absolute change in overall success rate that counts as an effect.
    pub min_success_effect: f64,
    /// Relative change in average cost that counts as an effect.
    pub min_cost_effect: f64,
    /// Relative change in retry amplification that counts as an effect.
    pub min_retry_effect: f64,
    /// Caution added per harmful outcome and removed per helpful one.
    pub bias_step: f64,
    /// Ceiling on the caution penalty for any single cause.
    pub bias_cap: f64,
    /// Per-cycle multiplier fading causes with no fresh observation.
    pub bias_decay: f64,
    /// Bound on the retained learning record history.
    pub max_records: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_success_effect: 0.03,
            min_cost_effect: 0.25,
            min_retry_effect: 0.15,
            bias_step: 0.08,
            bias_cap: 0.25,
            bias_decay: 0.85,
            max_records: 500,
        }
    }
}

pub struct Learner {
    config: LearnerConfig,
    records: VecDeque<LearningRecord>,
    effectiveness: BTreeMap<(ActionKind, RootCause), EffectivenessStats>,
    penalties: BTreeMap<RootCause, f64>,
    hurt_streaks: BTreeMap<RootCause, u32>,
    touched: HashSet<RootCause>,
}

impl Learner {
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            config,
            records: VecDeque::new(),
            effectiveness: BTreeMap::new(),
            penalties: BTreeMap::new(),
            hurt_streaks: BTreeMap::new(),
            touched: HashSet::new(),
        }
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Grade one resolved action. `before` is the snapshot the action was
    /// decided against, `after` the snapshot at monitor resolution.
    pub fn observe(
        &mut self,
        record: &ActionRecord,
        before: &MetricsSnapshot,
        after: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> LearningRecord {
        let success_delta = after.overall_success_rate - before.overall_success_rate;
        let cost_delta = relative(before.avg_estimated_cost, after.avg_estimated_cost);
        let retry_delta = relative(before.retry_amplification, after.retry_amplification);

        let classification = if record.outcome == ActionOutcome::RolledBack {
            OutcomeClass::Hurt
        } else {
            self.classify(success_delta, cost_delta, retry_delta)
        };

        let cause = record.decision.cause;
        let previous = self.penalties.get(&cause).copied().unwrap_or(0.0);
        match classification {
            OutcomeClass::Hurt => {
                *self.hurt_streaks.entry(cause).or_insert(0) += 1;
                self.penalties
                    .insert(cause, (previous + self.config.bias_step).min(self.config.bias_cap));
            }
            OutcomeClass::Helped => {
                self.hurt_streaks.insert(cause, 0);
                self.penalties
                    .insert(cause, (previous - self.config.bias_step).max(0.0));
            }
            OutcomeClass::Neutral => {
                self.hurt_streaks.insert(cause, 0);
            }
        }
        self.touched.insert(cause);

        let current = self.penalties.get(&cause).copied().unwrap_or(0.0);
        let learning = LearningRecord {
            action_id: record.id.clone(),
            action: record.decision.action,
            cause,
            classification,
            success_delta,
            cost_delta,
            retry_delta,
            // Negative when the cause earned more caution.
            confidence_adjustment: previous - current,
            before_window: record.before_window.unwrap_or(before.window),
            after_window: record.after_window.unwrap_or(after.window),
            observed_at: now,
        };

        self.effectiveness
            .entry((learning.action, cause))
            .or_default()
            .record(classification);

        tracing::info!(
            action = %learning.action_id,
            cause = %cause,
            class = learning.classification.as_str(),
            success_delta = format!("{success_delta:+.3}"),
            "action outcome graded"
        );

        self.records.push_back(learning.clone());
        while self.records.len() > self.config.max_records {
            self.records.pop_front();
        }
        learning
    }

    /// End-of-cycle fade: causes with no fresh observation this cycle lose a
    /// fraction of their caution, so old incidents stop dominating.
    pub fn decay(&mut self) {
        for (cause, penalty) in self.penalties.iter_mut() {
            if !self.touched.contains(cause) {
                *penalty *= self.config.bias_decay;
            }
        }
        self.penalties.retain(|_, penalty| *penalty > 1e-3);
        self.touched.clear();
    }

    /// Advisory bias snapshot for the decision engine.
    pub fn bias(&self) -> LearningBias {
        let mut bias = LearningBias::default();
        for (cause, penalty) in &self.penalties {
            bias.set(*cause, *penalty, self.hurt_streaks.get(cause).copied().unwrap_or(0));
        }
        for (cause, streak) in &self.hurt_streaks {
            if *streak > 0 && !self.penalties.contains_key(cause) {
                bias.set(*cause, 0.0, *streak);
            }
        }
        bias
    }

    /// Publishable digest: per (action, cause) tallies plus the live caution
    /// entries, in a deterministic order.
    pub fn summary(&self) -> LearningSummary {
        let mut totals = EffectivenessStats::default();
        let mut effectiveness = Vec::with_capacity(self.effectiveness.len());
        for ((action, cause), stats) in &self.effectiveness {
            totals.helped += stats.helped;
            totals.hurt += stats.hurt;
            totals.neutral += stats.neutral;
            effectiveness.push(EffectivenessEntry {
                action: *action,
                cause: *cause,
                stats: *stats,
            });
        }

        let mut causes: Vec<RootCause> = self
            .penalties
            .keys()
            .chain(self.hurt_streaks.keys())
            .copied()
            .collect();
        causes.sort();
        causes.dedup();
        let caution = causes
            .into_iter()
            .filter_map(|cause| {
                let bias = self.penalties.get(&cause).copied().unwrap_or(0.0);
                let consecutive_hurt = self.hurt_streaks.get(&cause).copied().unwrap_or(0);
                (bias > 0.0 || consecutive_hurt > 0).then_some(CautionEntry {
                    cause,
                    bias,
                    consecutive_hurt,
                })
            })
            .collect();

        LearningSummary {
            totals,
            effectiveness,
            caution,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &LearningRecord> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn classify(&self, success_delta: f64, cost_delta: f64, retry_delta: f64) -> OutcomeClass {
        if success_delta <= -self.config.min_success_effect
            || cost_delta >= self.config.min_cost_effect
            || retry_delta >= self.config.min_retry_effect
        {
            return OutcomeClass::Hurt;
        }
        if success_delta >= self.config.min_success_effect
            || cost_delta <= -self.config.min_cost_effect
            || retry_delta <= -self.config.min_retry_effect
        {
            return OutcomeClass::Helped;
        }
        OutcomeClass::Neutral
    }
}

fn relative(before: f64, after: f64) -> f64 {
    if before <= 0.0 {
        return 0.0;
    }
    (after - before) / before
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::decision::{ActionTarget, Decision};
    use crate::domain::metrics::WindowId;

    fn snapshot(window: u64, overall: f64, cost: f64, retry: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            window: WindowId(window),
            recorded_at: Utc::now(),
            sample_count: 150,
            overall_success_rate: overall,
            success_by_issuer: BTreeMap::new(),
            success_by_merchant: BTreeMap::new(),
            retry_amplification: retry,
            p50_latency_ms: 120.0,
            p95_latency_ms: 300.0,
            avg_estimated_cost: cost,
            error_distribution: BTreeMap::new(),
        }
    }

    fn executed(cause: RootCause, before: WindowId, after: WindowId) -> ActionRecord {
        let decision = Decision {
            action: ActionKind::Reroute,
            target: Some(ActionTarget::Issuer("AXIS".to_string())),
            cause,
            confidence: 0.9,
            risk: 0.37,
            requires_human_approval: false,
            approval_reason: None,
            rationale: "detour traffic away from issuer:AXIS".to_string(),
            window: before,
            decided_at: Utc::now(),
        };
        let mut record = ActionRecord::new(decision, ActionOutcome::Executed, Utc::now());
        record.before_window = Some(before);
        record.after_window = Some(after);
        record.executed_at = Some(Utc::now());
        record
    }

    fn rolled_back(cause: RootCause, before: WindowId, after: WindowId) -> ActionRecord {
        let mut record = executed(cause, before, after);
        record.outcome = ActionOutcome::RolledBack;
        record.rolled_back_at = Some(Utc::now());
        record
    }

    #[test]
    fn small_drift_grades_neutral() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.81, 0.010, 1.2);

        let graded = learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        assert_eq!(graded.classification, OutcomeClass::Neutral);
        assert_eq!(graded.confidence_adjustment, 0.0);
        assert_eq!(learner.bias().penalty(RootCause::IssuerDegradation), 0.0);
    }

    #[test]
    fn clear_recovery_grades_helped() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.70, 0.010, 1.4);
        let after = snapshot(2, 0.82, 0.010, 1.3);

        let graded = learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        assert_eq!(graded.classification, OutcomeClass::Helped);
        assert!(graded.success_delta > 0.0);
    }

    #[test]
    fn harm_outranks_improvement_when_signals_conflict() {
        let mut learner = Learner::new(LearnerConfig::default());
        // Success up, but cost up 40% relative.
        let before = snapshot(1, 0.75, 0.010, 1.2);
        let after = snapshot(2, 0.80, 0.014, 1.2);

        let graded = learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        assert_eq!(graded.classification, OutcomeClass::Hurt);
    }

    #[test]
    fn rollback_is_hurt_even_when_the_deltas_look_fine() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.84, 0.009, 1.1);

        let graded = learner.observe(
            &rolled_back(RootCause::RetryStorm, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        assert_eq!(graded.classification, OutcomeClass::Hurt);
        assert!(graded.confidence_adjustment < 0.0);
        assert_eq!(learner.bias().consecutive_hurt(RootCause::RetryStorm), 1);
    }

    #[test]
    fn hurt_streak_accumulates_and_bias_stops_at_the_cap() {
        let config = LearnerConfig::default();
        let cap = config.bias_cap;
        let mut learner = Learner::new(config);
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.70, 0.010, 1.2);

        for _ in 0..4 {
            learner.observe(
                &executed(RootCause::NoisyMerchant, WindowId(1), WindowId(2)),
                &before,
                &after,
                Utc::now(),
            );
        }
        let bias = learner.bias();
        assert_eq!(bias.consecutive_hurt(RootCause::NoisyMerchant), 4);
        assert!((bias.penalty(RootCause::NoisyMerchant) - cap).abs() < 1e-9);
    }

    #[test]
    fn helped_resets_the_streak_and_steps_the_bias_down() {
        let mut learner = Learner::new(LearnerConfig::default());
        let hurt_before = snapshot(1, 0.80, 0.010, 1.2);
        let hurt_after = snapshot(2, 0.70, 0.010, 1.2);
        for _ in 0..2 {
            learner.observe(
                &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
                &hurt_before,
                &hurt_after,
                Utc::now(),
            );
        }
        assert_eq!(learner.bias().consecutive_hurt(RootCause::IssuerDegradation), 2);

        let good_before = snapshot(3, 0.70, 0.010, 1.2);
        let good_after = snapshot(4, 0.80, 0.010, 1.2);
        let graded = learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(3), WindowId(4)),
            &good_before,
            &good_after,
            Utc::now(),
        );
        assert_eq!(graded.classification, OutcomeClass::Helped);
        assert!(graded.confidence_adjustment > 0.0);
        let bias = learner.bias();
        assert_eq!(bias.consecutive_hurt(RootCause::IssuerDegradation), 0);
        assert!((bias.penalty(RootCause::IssuerDegradation) - 0.08).abs() < 1e-9);
    }

    #[test]
    fn decay_fades_only_the_untouched_causes() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.70, 0.010, 1.2);

        learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        learner.decay();
        // Not observed this cycle either, so it fades.
        learner.decay();

        let penalty = learner.bias().penalty(RootCause::IssuerDegradation);
        assert!((penalty - 0.08 * 0.85).abs() < 1e-9);
    }

    #[test]
    fn touched_causes_skip_that_cycles_decay() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.70, 0.010, 1.2);

        learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        learner.decay();
        assert!((learner.bias().penalty(RootCause::IssuerDegradation) - 0.08).abs() < 1e-9);
    }

    #[test]
    fn zero_baselines_do_not_blow_up_the_relative_deltas() {
        let mut learner = Learner::new(LearnerConfig::default());
        let before = snapshot(1, 0.80, 0.0, 0.0);
        let after = snapshot(2, 0.80, 0.015, 1.5);

        let graded = learner.observe(
            &executed(RootCause::RetryStorm, WindowId(1), WindowId(2)),
            &before,
            &after,
            Utc::now(),
        );
        assert_eq!(graded.cost_delta, 0.0);
        assert_eq!(graded.retry_delta, 0.0);
        assert_eq!(graded.classification, OutcomeClass::Neutral);
    }

    #[test]
    fn summary_tallies_are_deterministic() {
        let mut learner = Learner::new(LearnerConfig::default());
        let hurt_before = snapshot(1, 0.80, 0.010, 1.2);
        let hurt_after = snapshot(2, 0.70, 0.010, 1.2);
        let good_before = snapshot(3, 0.70, 0.010, 1.2);
        let good_after = snapshot(4, 0.80, 0.010, 1.2);

        learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(1), WindowId(2)),
            &hurt_before,
            &hurt_after,
            Utc::now(),
        );
        learner.observe(
            &executed(RootCause::IssuerDegradation, WindowId(3), WindowId(4)),
            &good_before,
            &good_after,
            Utc::now(),
        );

        let summary = learner.summary();
        assert_eq!(summary.totals.total(), 2);
        assert_eq!(summary.totals.hurt, 1);
        assert_eq!(summary.totals.helped, 1);
        assert_eq!(summary.effectiveness.len(), 1);
        assert_eq!(summary.effectiveness[0].action, ActionKind::Reroute);
        assert_eq!(summary.effectiveness[0].stats.total(), 2);
        assert_eq!(learner.summary(), summary);
    }

    #[test]
    fn record_history_is_bounded() {
        let config = LearnerConfig {
            max_records: 3,
            ..LearnerConfig::default()
        };
        let mut learner = Learner::new(config);
        let before = snapshot(1, 0.80, 0.010, 1.2);
        let after = snapshot(2, 0.80, 0.010, 1.2);

        for i in 0..5 {
            learner.observe(
                &executed(RootCause::IssuerDegradation, WindowId(i), WindowId(i + 1)),
                &before,
                &after,
                Utc::now(),
            );
        }
        assert_eq!(learner.record_count(), 3);
        let first = learner.records().next().unwrap();
        assert_eq!(first.before_window, WindowId(2));
    }
}
