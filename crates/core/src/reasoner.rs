//! Threshold-based fallback hypothesis, computed purely from one snapshot.
//!
//! This is the always-available half of the hypothesis capability: when the
//! model-backed source times out or returns garbage, the loop substitutes
//! this analysis and keeps moving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::hypothesis::{Hypothesis, HypothesisOrigin, RootCause};
use crate::domain::metrics::MetricsSnapshot;

/// A storm is only claimed while overall success is visibly hurt. Elevated
/// attempts at healthy success rates are not worth a gateway-wide clamp.
const STORM_SUCCESS_CEILING: f64 = 0.80;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// An issuer below this success rate is considered degraded.
    pub issuer_degradation_threshold: f64,
    /// Mean attempts per payment at or above this reads as a retry storm.
    pub storm_amplification: f64,
    /// A merchant below this success rate, with issuers healthy, is noisy.
    pub merchant_noise_threshold: f64,
    /// Below this many window samples no actionable cause is claimed.
    pub min_actionable_samples: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            issuer_degradation_threshold: 0.70,
            storm_amplification: 1.5,
            merchant_noise_threshold: 0.65,
            min_actionable_samples: 30,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HeuristicReasoner {
    config: ReasonerConfig,
}

impl HeuristicReasoner {
    pub fn new(config: ReasonerConfig) -> Self {
        Self { config }
    }

    /// Checks run in fixed order: sample floor, retry storm, issuer
    /// degradation, noisy merchant. The first breach wins so repeated
    /// analysis of one snapshot always yields the same hypothesis.
    pub fn analyze(&self, snapshot: &MetricsSnapshot, now: DateTime<Utc>) -> Hypothesis {
        let config = &self.config;

        if snapshot.sample_count < config.min_actionable_samples {
            return self.hypothesis(
                RootCause::InsufficientSignal,
                0.2,
                vec![format!(
                    "window holds {} samples, below the {} needed to act",
                    snapshot.sample_count, config.min_actionable_samples
                )],
                snapshot,
                now,
            );
        }

        // A storm drags every issuer down with it, so it must outrank the
        // per-issuer check or the loop would reroute healthy issuers one by
        // one instead of clamping retries.
        if snapshot.retry_amplification >= config.storm_amplification
            && snapshot.overall_success_rate < STORM_SUCCESS_CEILING
        {
            let excess = snapshot.retry_amplification - config.storm_amplification;
            return self.hypothesis(
                RootCause::RetryStorm,
                (0.75 + excess).min(0.90),
                vec![
                    format!(
                        "retry amplification {:.2} at or above storm level {:.2}",
                        snapshot.retry_amplification, config.storm_amplification
                    ),
                    format!(
                        "overall success rate {:.2} under {STORM_SUCCESS_CEILING:.2}",
                        snapshot.overall_success_rate
                    ),
                ],
                snapshot,
                now,
            );
        }

        if let Some((issuer, rate)) = snapshot.worst_issuer() {
            if rate < config.issuer_degradation_threshold {
                let gap = config.issuer_degradation_threshold - rate;
                return self.hypothesis(
                    RootCause::IssuerDegradation,
                    (0.70 + gap).min(0.95),
                    vec![
                        format!(
                            "issuer {issuer} success rate {rate:.2} below floor {:.2}",
                            config.issuer_degradation_threshold
                        ),
                        format!("overall success rate {:.2}", snapshot.overall_success_rate),
                    ],
                    snapshot,
                    now,
                );
            }
        }

        if let Some((merchant, rate)) = snapshot.worst_merchant() {
            if rate < config.merchant_noise_threshold {
                let gap = config.merchant_noise_threshold - rate;
                return self.hypothesis(
                    RootCause::NoisyMerchant,
                    (0.65 + gap).min(0.85),
                    vec![
                        format!(
                            "merchant {merchant} success rate {rate:.2} below floor {:.2}",
                            config.merchant_noise_threshold
                        ),
                        "no issuer below its degradation floor".to_string(),
                    ],
                    snapshot,
                    now,
                );
            }
        }

        self.hypothesis(
            RootCause::InsufficientSignal,
            0.3,
            vec![
                format!(
                    "no issuer below {:.2} and no merchant below {:.2}",
                    config.issuer_degradation_threshold, config.merchant_noise_threshold
                ),
                format!(
                    "overall success rate {:.2}, retry amplification {:.2}",
                    snapshot.overall_success_rate, snapshot.retry_amplification
                ),
            ],
            snapshot,
            now,
        )
    }

    fn hypothesis(
        &self,
        cause: RootCause,
        confidence: f64,
        evidence: Vec<String>,
        snapshot: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> Hypothesis {
        Hypothesis {
            cause,
            confidence: confidence.clamp(0.0, 1.0),
            evidence,
            origin: HypothesisOrigin::Heuristic,
            window: snapshot.window,
            created_at: now,
        }
    }
}
