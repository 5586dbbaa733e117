//! Root-cause hypothesis sourcing.
//!
//! A model backend is optional and advisory. The heuristic reasoner is the
//! floor: whatever the model does (times out, errors, returns junk), every
//! cycle still gets a hypothesis, and the decision engine never learns where
//! it came from except through [`HypothesisOrigin`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use payops_core::domain::hypothesis::{Hypothesis, HypothesisOrigin, RootCause};
use payops_core::domain::metrics::MetricsSnapshot;
use payops_core::reasoner::{HeuristicReasoner, ReasonerConfig};

/// Completion seam for model backends. Implementations wrap a provider SDK or
/// HTTP client; the runtime only ever sees prompt in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum HypothesisError {
    #[error("hypothesis backend timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("hypothesis backend transport failed: {0}")]
    Transport(String),

    #[error("hypothesis backend returned malformed output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait HypothesisSource: Send + Sync {
    async fn hypothesize(&self, snapshot: &MetricsSnapshot)
        -> Result<Hypothesis, HypothesisError>;
}

/// Model-backed source: renders the window into a prompt, asks the client,
/// parses a strict JSON verdict.
pub struct ModelHypothesisSource<C> {
    client: C,
    timeout_ms: u64,
}

impl<C> ModelHypothesisSource<C>
where
    C: LlmClient,
{
    pub fn new(client: C, timeout_ms: u64) -> Self {
        Self { client, timeout_ms }
    }

    fn prompt(snapshot: &MetricsSnapshot) -> String {
        let mut lines = vec![
            "You are diagnosing a payment gateway from one metrics window.".to_string(),
            format!(
                "overall_success_rate={:.3} sample_count={} retry_amplification={:.2}",
                snapshot.overall_success_rate, snapshot.sample_count, snapshot.retry_amplification
            ),
            format!(
                "p50_latency_ms={:.0} p95_latency_ms={:.0} avg_cost={:.4}",
                snapshot.p50_latency_ms, snapshot.p95_latency_ms, snapshot.avg_estimated_cost
            ),
        ];
        for (issuer, rate) in &snapshot.success_by_issuer {
            lines.push(format!("issuer {issuer}: success_rate={rate:.3}"));
        }
        for (merchant, rate) in &snapshot.success_by_merchant {
            lines.push(format!("merchant {merchant}: success_rate={rate:.3}"));
        }
        for (code, count) in &snapshot.error_distribution {
            lines.push(format!("error {}: count={count}", code.as_str()));
        }
        lines.push(
            "Reply with JSON only: {\"cause\": \
             \"issuer_degradation|retry_storm|noisy_merchant|insufficient_signal\", \
             \"confidence\": 0.0-1.0, \"evidence\": [\"...\"]}"
                .to_string(),
        );
        lines.join("\n")
    }
}

#[async_trait]
impl<C> HypothesisSource for ModelHypothesisSource<C>
where
    C: LlmClient,
{
    async fn hypothesize(
        &self,
        snapshot: &MetricsSnapshot,
    ) -> Result<Hypothesis, HypothesisError> {
        let prompt = Self::prompt(snapshot);
        let reply = tokio::time::timeout(
            Duration::from_millis(self.timeout_ms),
            self.client.complete(&prompt),
        )
        .await
        .map_err(|_| HypothesisError::Timeout { timeout_ms: self.timeout_ms })?
        .map_err(|err| HypothesisError::Transport(err.to_string()))?;

        let verdict = parse_verdict(&reply)?;
        Ok(Hypothesis {
            cause: verdict.cause,
            confidence: verdict.confidence.clamp(0.0, 1.0),
            evidence: verdict.evidence,
            origin: HypothesisOrigin::Model,
            window: snapshot.window,
            created_at: Utc::now(),
        })
    }
}

struct Verdict {
    cause: RootCause,
    confidence: f64,
    evidence: Vec<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    cause: String,
    confidence: f64,
    #[serde(default)]
    evidence: Vec<String>,
}

fn parse_verdict(reply: &str) -> Result<Verdict, HypothesisError> {
    // Models wrap JSON in prose or code fences often enough to tolerate it.
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(HypothesisError::Malformed(format!(
                "no JSON object in reply: {}",
                truncate(reply)
            )))
        }
    };

    let raw: RawVerdict = serde_json::from_str(json)
        .map_err(|err| HypothesisError::Malformed(err.to_string()))?;
    let cause = RootCause::parse(&raw.cause).ok_or_else(|| {
        HypothesisError::Malformed(format!("unknown cause `{}`", raw.cause))
    })?;

    Ok(Verdict { cause, confidence: raw.confidence, evidence: raw.evidence })
}

fn truncate(reply: &str) -> String {
    const LIMIT: usize = 120;
    if reply.len() <= LIMIT {
        reply.to_string()
    } else {
        let cut = reply
            .char_indices()
            .take_while(|(index, _)| *index < LIMIT)
            .last()
            .map(|(index, ch)| index + ch.len_utf8())
            .unwrap_or(0);
        format!("{}...", &reply[..cut])
    }
}

/// Per-cycle hypothesis provider: optional model first, heuristic always.
pub struct HypothesisProvider {
    model: Option<Box<dyn HypothesisSource>>,
    heuristic: HeuristicReasoner,
}

impl HypothesisProvider {
    pub fn heuristic(config: ReasonerConfig) -> Self {
        Self { model: None, heuristic: HeuristicReasoner::new(config) }
    }

    pub fn with_model(config: ReasonerConfig, model: Box<dyn HypothesisSource>) -> Self {
        Self { model: Some(model), heuristic: HeuristicReasoner::new(config) }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Infallible: a backend failure downgrades to the heuristic verdict for
    /// this cycle and the loop carries on.
    pub async fn hypothesize(&self, snapshot: &MetricsSnapshot) -> Hypothesis {
        if let Some(model) = &self.model {
            match model.hypothesize(snapshot).await {
                Ok(hypothesis) => return hypothesis,
                Err(err) => {
                    tracing::warn!(error = %err, "model hypothesis failed, using heuristic");
                }
            }
        }
        self.heuristic.analyze(snapshot, Utc::now())
    }
}
