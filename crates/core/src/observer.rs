//! Sliding-window aggregation of raw payment events into per-cycle metrics.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::{ErrorCode, PaymentEvent};
use crate::domain::metrics::{MetricsSnapshot, WindowId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Events retained in the rolling window.
    pub window_size: usize,
    /// Below this many events the window is too thin to summarize.
    pub min_samples: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { window_size: 200, min_samples: 20 }
    }
}

#[derive(Debug)]
pub struct Observer {
    config: ObserverConfig,
    events: VecDeque<PaymentEvent>,
    next_window: u64,
}

impl Observer {
    pub fn new(config: ObserverConfig) -> Self {
        Self { config, events: VecDeque::new(), next_window: 1 }
    }

    pub fn ingest(&mut self, event: PaymentEvent) {
        self.events.push_back(event);
        while self.events.len() > self.config.window_size {
            self.events.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.events.len()
    }

    /// Summarize the current window. Returns `None` while the window holds
    /// fewer than `min_samples` events; window ids increase monotonically
    /// across successful snapshots.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> Option<MetricsSnapshot> {
        if self.events.len() < self.config.min_samples {
            return None;
        }

        let sample_count = self.events.len();
        let mut successes = 0usize;
        let mut attempts_total = 0u64;
        let mut cost_total = 0.0f64;
        let mut latencies: Vec<f64> = Vec::with_capacity(sample_count);
        let mut issuer_counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut merchant_counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut error_distribution: BTreeMap<ErrorCode, usize> = BTreeMap::new();

        for event in &self.events {
            let succeeded = event.succeeded();
            if succeeded {
                successes += 1;
            } else if event.error_code != ErrorCode::None {
                *error_distribution.entry(event.error_code).or_insert(0) += 1;
            }

            attempts_total += u64::from(event.attempts);
            cost_total += event.estimated_cost;
            latencies.push(event.latency_ms);

            let issuer = issuer_counts.entry(event.issuer.clone()).or_insert((0, 0));
            issuer.1 += 1;
            if succeeded {
                issuer.0 += 1;
            }

            let merchant = merchant_counts.entry(event.merchant.clone()).or_insert((0, 0));
            merchant.1 += 1;
            if succeeded {
                merchant.0 += 1;
            }
        }

        latencies.sort_by(|a, b| a.total_cmp(b));

        let window = WindowId(self.next_window);
        self.next_window += 1;

        Some(MetricsSnapshot {
            window,
            recorded_at: now,
            sample_count,
            overall_success_rate: successes as f64 / sample_count as f64,
            success_by_issuer: rates(issuer_counts),
            success_by_merchant: rates(merchant_counts),
            retry_amplification: attempts_total as f64 / sample_count as f64,
            p50_latency_ms: percentile(&latencies, 50.0),
            p95_latency_ms: percentile(&latencies, 95.0),
            avg_estimated_cost: cost_total / sample_count as f64,
            error_distribution,
        })
    }
}

fn rates(counts: BTreeMap<String, (usize, usize)>) -> BTreeMap<String, f64> {
    counts
        .into_iter()
        .map(|(name, (ok, total))| (name, ok as f64 / total.max(1) as f64))
        .collect()
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let index = (rank.round() as usize).min(sorted.len() - 1);
    sorted[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::PaymentOutcome;

    fn event(issuer: &str, merchant: &str, ok: bool, latency: f64) -> PaymentEvent {
        PaymentEvent {
            event_id: format!("evt-{issuer}-{merchant}-{latency}"),
            issuer: issuer.to_string(),
            merchant: merchant.to_string(),
            method: "card".to_string(),
            outcome: if ok { PaymentOutcome::Success } else { PaymentOutcome::Failed },
            error_code: if ok { ErrorCode::None } else { ErrorCode::IssuerUnavailable },
            latency_ms: latency,
            attempts: if ok { 1 } else { 3 },
            estimated_cost: 0.015 * if ok { 1.0 } else { 3.0 },
            occurred_at: Utc::now(),
        }
    }

    fn observer_with(config: ObserverConfig, events: Vec<PaymentEvent>) -> Observer {
        let mut observer = Observer::new(config);
        for event in events {
            observer.ingest(event);
        }
        observer
    }

    #[test]
    fn snapshot_refused_below_min_samples() {
        let config = ObserverConfig { window_size: 50, min_samples: 10 };
        let events = (0..9).map(|i| event("HDFC", "m_a", true, 100.0 + i as f64)).collect();
        let mut observer = observer_with(config, events);
        assert!(observer.snapshot(Utc::now()).is_none());
    }

    #[test]
    fn window_evicts_oldest_events() {
        let config = ObserverConfig { window_size: 5, min_samples: 1 };
        let mut observer = Observer::new(config);
        for _ in 0..3 {
            observer.ingest(event("AXIS", "m_a", false, 200.0));
        }
        for _ in 0..5 {
            observer.ingest(event("AXIS", "m_a", true, 100.0));
        }

        let snapshot = observer.snapshot(Utc::now()).expect("snapshot");
        assert_eq!(snapshot.sample_count, 5);
        assert_eq!(snapshot.overall_success_rate, 1.0);
    }

    #[test]
    fn per_issuer_rates_and_amplification() {
        let config = ObserverConfig { window_size: 100, min_samples: 1 };
        let mut events = vec![];
        for _ in 0..8 {
            events.push(event("HDFC", "m_a", true, 100.0));
        }
        for _ in 0..2 {
            events.push(event("AXIS", "m_b", false, 400.0));
        }
        let mut observer = observer_with(config, events);

        let snapshot = observer.snapshot(Utc::now()).expect("snapshot");
        assert_eq!(snapshot.success_by_issuer["HDFC"], 1.0);
        assert_eq!(snapshot.success_by_issuer["AXIS"], 0.0);
        assert_eq!(snapshot.overall_success_rate, 0.8);
        // 8 single-attempt successes and 2 triple-attempt failures.
        assert!((snapshot.retry_amplification - 1.4).abs() < 1e-9);
        assert_eq!(snapshot.error_distribution[&ErrorCode::IssuerUnavailable], 2);
        assert_eq!(snapshot.worst_issuer(), Some(("AXIS", 0.0)));
    }

    #[test]
    fn window_ids_increase_across_snapshots() {
        let config = ObserverConfig { window_size: 10, min_samples: 1 };
        let mut observer = observer_with(config, vec![event("SBI", "m_a", true, 90.0)]);

        let first = observer.snapshot(Utc::now()).expect("first");
        observer.ingest(event("SBI", "m_a", true, 95.0));
        let second = observer.snapshot(Utc::now()).expect("second");
        assert!(second.window > first.window);
    }

    #[test]
    fn p95_reflects_tail_latency() {
        let config = ObserverConfig { window_size: 100, min_samples: 1 };
        let mut events = vec![];
        for i in 0..99 {
            events.push(event("HDFC", "m_a", true, 100.0 + i as f64));
        }
        events.push(event("HDFC", "m_a", true, 900.0));
        let mut observer = observer_with(config, events);

        let snapshot = observer.snapshot(Utc::now()).expect("snapshot");
        assert!(snapshot.p95_latency_ms >= 190.0);
        assert!(snapshot.p50_latency_ms < 160.0);
    }
}
