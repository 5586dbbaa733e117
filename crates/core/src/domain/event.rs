use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    None,
    IssuerUnavailable,
    NetworkTimeout,
    RateLimited,
    InsufficientFunds,
    DoNotHonor,
    FraudSuspected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::IssuerUnavailable => "issuer_unavailable",
            Self::NetworkTimeout => "network_timeout",
            Self::RateLimited => "rate_limited",
            Self::InsufficientFunds => "insufficient_funds",
            Self::DoNotHonor => "do_not_honor",
            Self::FraudSuspected => "fraud_suspected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub issuer: String,
    pub merchant: String,
    pub method: String,
    pub outcome: PaymentOutcome,
    pub error_code: ErrorCode,
    pub latency_ms: f64,
    pub attempts: u32,
    pub estimated_cost: f64,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn succeeded(&self) -> bool {
        self.outcome == PaymentOutcome::Success
    }
}
