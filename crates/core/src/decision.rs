//! Deterministic decision engine.
//!
//! `decide` is a pure function of (snapshot, hypothesis, learning bias): no
//! clocks read, no randomness, no side effects. The same inputs always
//! produce the same decision, which is what makes the action history
//! auditable after the fact.
//!
//! Risk for a candidate action is `base(kind) * (1 - discount * confidence)
//! + severity + penalty`, clamped to [0, 1]:
//! - `base` orders action families by inherent blast potential (a reroute
//!   moves live traffic, a no-op moves nothing),
//! - high confidence discounts risk, low confidence inflates it,
//! - `severity` grows as overall success falls below the reference rate,
//! - `penalty` is the learner's caution bias for the hypothesis cause.
//!
//! A decision is never auto-rejected for high risk; it is proposed with
//! `requires_human_approval` set, and the executor holds it for a human.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decision::{ActionKind, ActionTarget, Decision};
use crate::domain::hypothesis::{Hypothesis, RootCause};
use crate::domain::learning::LearningBias;
use crate::domain::metrics::MetricsSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Below this hypothesis confidence the engine always holds position.
    pub min_confidence: f64,
    /// At or above this risk the proposal requires human approval.
    pub approval_risk_threshold: f64,
    /// Consecutive HURT outcomes for one cause that force approval
    /// regardless of the computed risk score.
    pub handover_hurt_streak: u32,
    /// Overall success rate treated as healthy; the gap below it feeds the
    /// severity term.
    pub severity_reference_rate: f64,
    /// Weight of the severity term in the risk score.
    pub severity_weight: f64,
    /// How strongly confidence discounts base risk.
    pub confidence_discount: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.60,
            approval_risk_threshold: 0.65,
            handover_hurt_streak: 3,
            severity_reference_rate: 0.78,
            severity_weight: 0.20,
            confidence_discount: 0.40,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

#[derive(Clone, Debug)]
struct Candidate {
    kind: ActionKind,
    target: ActionTarget,
    /// Success rate of the candidate's anchor metric, used as a residual
    /// tie-break so the most degraded target is remedied first.
    anchor_rate: f64,
    risk: f64,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Map one (snapshot, hypothesis, bias) triple to exactly one decision.
    ///
    /// Candidate selection order: lowest risk first (bucketed at 0.01 so
    /// float noise cannot reorder), then narrowest blast radius, then the
    /// fixed kind priority reroute > retry_policy > suppress > no_op, then
    /// the most degraded anchor metric, then the target label.
    pub fn decide(
        &self,
        snapshot: &MetricsSnapshot,
        hypothesis: &Hypothesis,
        bias: &LearningBias,
        now: DateTime<Utc>,
    ) -> Decision {
        let confidence = hypothesis.confidence.clamp(0.0, 1.0);

        if confidence < self.config.min_confidence {
            return self.no_op(
                snapshot,
                hypothesis,
                now,
                format!(
                    "confidence {confidence:.2} below action floor {:.2}",
                    self.config.min_confidence
                ),
            );
        }

        let mut candidates = self.candidates(snapshot, hypothesis);
        if candidates.is_empty() {
            return self.no_op(
                snapshot,
                hypothesis,
                now,
                format!("no actionable target for cause {}", hypothesis.cause),
            );
        }

        let penalty = bias.penalty(hypothesis.cause);
        for candidate in &mut candidates {
            candidate.risk = self.risk(candidate.kind, confidence, snapshot, penalty);
        }
        candidates.sort_by(rank);
        let chosen = &candidates[0];

        let streak = bias.consecutive_hurt(hypothesis.cause);
        let forced_handover = streak >= self.config.handover_hurt_streak;
        let above_ceiling = chosen.risk >= self.config.approval_risk_threshold;

        let approval_reason = if forced_handover {
            Some(format!(
                "{streak} consecutive harmful outcomes recorded for cause {}",
                hypothesis.cause
            ))
        } else if above_ceiling {
            Some(format!(
                "risk {:.2} at or above approval threshold {:.2}",
                chosen.risk, self.config.approval_risk_threshold
            ))
        } else {
            None
        };

        Decision {
            action: chosen.kind,
            target: Some(chosen.target.clone()),
            cause: hypothesis.cause,
            confidence,
            risk: chosen.risk,
            requires_human_approval: forced_handover || above_ceiling,
            approval_reason,
            rationale: format!(
                "{}; {} (risk {:.2}, penalty {:.2})",
                hypothesis.evidence.join("; "),
                describe(chosen.kind, &chosen.target),
                chosen.risk,
                penalty
            ),
            window: snapshot.window,
            decided_at: now,
        }
    }

    fn candidates(&self, snapshot: &MetricsSnapshot, hypothesis: &Hypothesis) -> Vec<Candidate> {
        match hypothesis.cause {
            RootCause::IssuerDegradation => scoped_candidates(
                &snapshot.success_by_issuer,
                self.config.severity_reference_rate,
                |name| ActionTarget::Issuer(name.to_string()),
                ActionKind::Reroute,
            ),
            RootCause::RetryStorm => vec![Candidate {
                kind: ActionKind::RetryPolicy,
                target: ActionTarget::Gateway,
                anchor_rate: snapshot.overall_success_rate,
                risk: 0.0,
            }],
            RootCause::NoisyMerchant => scoped_candidates(
                &snapshot.success_by_merchant,
                self.config.severity_reference_rate,
                |name| ActionTarget::Merchant(name.to_string()),
                ActionKind::Suppress,
            ),
            RootCause::InsufficientSignal => Vec::new(),
        }
    }

    fn risk(
        &self,
        kind: ActionKind,
        confidence: f64,
        snapshot: &MetricsSnapshot,
        penalty: f64,
    ) -> f64 {
        let base = base_risk(kind);
        let discounted = base * (1.0 - self.config.confidence_discount * confidence);
        let reference = self.config.severity_reference_rate;
        let severity = if reference > 0.0 {
            ((reference - snapshot.overall_success_rate).max(0.0) / reference)
                * self.config.severity_weight
        } else {
            0.0
        };
        (discounted + severity + penalty).clamp(0.0, 1.0)
    }

    fn no_op(
        &self,
        snapshot: &MetricsSnapshot,
        hypothesis: &Hypothesis,
        now: DateTime<Utc>,
        reason: String,
    ) -> Decision {
        Decision {
            action: ActionKind::NoOp,
            target: None,
            cause: hypothesis.cause,
            confidence: hypothesis.confidence.clamp(0.0, 1.0),
            risk: 0.0,
            requires_human_approval: false,
            approval_reason: None,
            rationale: format!("{reason}; holding position"),
            window: snapshot.window,
            decided_at: now,
        }
    }
}

fn base_risk(kind: ActionKind) -> f64 {
    match kind {
        ActionKind::NoOp => 0.0,
        ActionKind::RetryPolicy => 0.25,
        ActionKind::Reroute => 0.55,
        ActionKind::Suppress => 0.60,
    }
}

fn risk_bucket(risk: f64) -> i64 {
    (risk * 100.0).round() as i64
}

/// Total candidate order: risk bucket, blast radius, kind priority, most
/// degraded anchor metric, target label.
fn rank(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    (risk_bucket(a.risk), a.target.breadth(), a.kind.priority())
        .cmp(&(risk_bucket(b.risk), b.target.breadth(), b.kind.priority()))
        .then(a.anchor_rate.total_cmp(&b.anchor_rate))
        .then_with(|| a.target.label().cmp(&b.target.label()))
}

/// All entities below the reference rate become candidates, most degraded
/// first; when nothing breaches, fall back to the single worst entry so a
/// confident hypothesis still yields a target.
fn scoped_candidates(
    rates: &std::collections::BTreeMap<String, f64>,
    reference: f64,
    make_target: impl Fn(&str) -> ActionTarget,
    kind: ActionKind,
) -> Vec<Candidate> {
    let mut below: Vec<(&str, f64)> = rates
        .iter()
        .filter(|(_, rate)| **rate < reference)
        .map(|(name, rate)| (name.as_str(), *rate))
        .collect();

    if below.is_empty() {
        if let Some((name, rate)) = lowest(rates) {
            below.push((name, rate));
        }
    }

    below.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    below
        .into_iter()
        .map(|(name, rate)| Candidate {
            kind,
            target: make_target(name),
            anchor_rate: rate,
            risk: 0.0,
        })
        .collect()
}

fn lowest(rates: &std::collections::BTreeMap<String, f64>) -> Option<(&str, f64)> {
    let mut worst: Option<(&str, f64)> = None;
    for (name, rate) in rates {
        match worst {
            Some((_, current)) if *rate >= current => {}
            _ => worst = Some((name.as_str(), *rate)),
        }
    }
    worst
}

fn describe(kind: ActionKind, target: &ActionTarget) -> String {
    match kind {
        ActionKind::Reroute => format!("detour traffic away from {target}"),
        ActionKind::RetryPolicy => "clamp the gateway retry policy".to_string(),
        ActionKind::Suppress => format!("sideline {target}"),
        ActionKind::NoOp => "hold position".to_string(),
    }
}
