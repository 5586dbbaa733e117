use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::ErrorCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub window: WindowId,
    pub recorded_at: DateTime<Utc>,
    pub sample_count: usize,
    pub overall_success_rate: f64,
    pub success_by_issuer: BTreeMap<String, f64>,
    pub success_by_merchant: BTreeMap<String, f64>,
    pub retry_amplification: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub avg_estimated_cost: f64,
    pub error_distribution: BTreeMap<ErrorCode, usize>,
}

impl MetricsSnapshot {
    /// Lowest-success issuer in the window. Ties resolve to the
    /// lexicographically first key so repeated evaluation is stable.
    pub fn worst_issuer(&self) -> Option<(&str, f64)> {
        lowest_rate(&self.success_by_issuer)
    }

    pub fn worst_merchant(&self) -> Option<(&str, f64)> {
        lowest_rate(&self.success_by_merchant)
    }
}

fn lowest_rate(rates: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    let mut worst: Option<(&str, f64)> = None;
    for (name, rate) in rates {
        match worst {
            Some((_, current)) if *rate >= current => {}
            _ => worst = Some((name.as_str(), *rate)),
        }
    }
    worst
}
