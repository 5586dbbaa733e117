use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::metrics::WindowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    IssuerDegradation,
    RetryStorm,
    NoisyMerchant,
    InsufficientSignal,
}

impl RootCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssuerDegradation => "issuer_degradation",
            Self::RetryStorm => "retry_storm",
            Self::NoisyMerchant => "noisy_merchant",
            Self::InsufficientSignal => "insufficient_signal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "issuer_degradation" => Some(Self::IssuerDegradation),
            "retry_storm" => Some(Self::RetryStorm),
            "noisy_merchant" => Some(Self::NoisyMerchant),
            "insufficient_signal" => Some(Self::InsufficientSignal),
            _ => None,
        }
    }
}

impl std::fmt::Display for RootCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisOrigin {
    Model,
    Heuristic,
}

impl HypothesisOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Heuristic => "heuristic",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub cause: RootCause,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub origin: HypothesisOrigin,
    pub window: WindowId,
    pub created_at: DateTime<Utc>,
}
