//! Deterministic payment-network simulator.
//!
//! One [`SimulatedNetwork`] generates traffic and owns the metrics window;
//! one [`SimulatedGateway`] applies remediations against the same shared
//! network state. Faults are scripted per cycle so scenarios replay exactly
//! under a fixed seed.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use payops_core::domain::decision::{ActionKind, ActionTarget, Decision};
use payops_core::domain::event::{ErrorCode, PaymentEvent, PaymentOutcome};
use payops_core::domain::metrics::MetricsSnapshot;
use payops_core::executor::{ActionBackend, BackendError};
use payops_core::observer::{Observer, ObserverConfig};

use crate::runtime::SnapshotSource;

const DEFAULT_ISSUERS: [&str; 5] = ["HDFC", "ICICI", "SBI", "AXIS", "KOTAK"];
const DEFAULT_MERCHANTS: [&str; 5] =
    ["m_smb_001", "m_smb_002", "m_mid_001", "m_ent_001", "m_ent_002"];
const DEFAULT_METHODS: [&str; 4] = ["card", "upi", "netbanking", "wallet"];

const ISSUER_OUTAGE_PENALTY: f64 = 0.45;
const STORM_PENALTY: f64 = 0.30;
const STORM_PENALTY_CLAMPED: f64 = 0.08;
const MERCHANT_FLOOD_PENALTY: f64 = 0.40;

fn cost_per_attempt(method: &str) -> f64 {
    match method {
        "card" => 0.015,
        "upi" => 0.002,
        "netbanking" => 0.010,
        "wallet" => 0.008,
        _ => 0.010,
    }
}

fn method_latency_mult(method: &str) -> f64 {
    match method {
        "card" => 1.35,
        "upi" => 0.75,
        "netbanking" => 1.0,
        "wallet" => 0.85,
        _ => 1.0,
    }
}

fn method_success_bonus(method: &str) -> f64 {
    match method {
        "card" => 0.02,
        "netbanking" => -0.01,
        "wallet" => 0.03,
        _ => 0.0,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultKind {
    IssuerOutage { issuer: String },
    RetryStorm,
    MerchantFlood { merchant: String },
}

/// A fault becomes active at `from_cycle` and stays active until `until_cycle`
/// (exclusive) or forever when unset. Remediations neutralize its effect
/// without ending it.
#[derive(Clone, Debug)]
pub struct Fault {
    pub kind: FaultKind,
    pub from_cycle: u64,
    pub until_cycle: Option<u64>,
}

impl Fault {
    fn active(&self, cycle: u64) -> bool {
        cycle >= self.from_cycle && self.until_cycle.map_or(true, |until| cycle < until)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    Calm,
    IssuerOutage,
    RetryStorm,
    MerchantFlood,
    Mixed,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Calm => "calm",
            Scenario::IssuerOutage => "issuer-outage",
            Scenario::RetryStorm => "retry-storm",
            Scenario::MerchantFlood => "merchant-flood",
            Scenario::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "calm" => Some(Scenario::Calm),
            "issuer-outage" => Some(Scenario::IssuerOutage),
            "retry-storm" => Some(Scenario::RetryStorm),
            "merchant-flood" => Some(Scenario::MerchantFlood),
            "mixed" => Some(Scenario::Mixed),
            _ => None,
        }
    }

    pub const ALL: [Scenario; 5] = [
        Scenario::Calm,
        Scenario::IssuerOutage,
        Scenario::RetryStorm,
        Scenario::MerchantFlood,
        Scenario::Mixed,
    ];
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub seed: u64,
    pub issuers: Vec<String>,
    pub merchants: Vec<String>,
    pub methods: Vec<String>,
    pub base_success_rate: f64,
    pub base_latency_p50_ms: f64,
    pub base_latency_p95_ms: f64,
    pub events_per_cycle: usize,
    pub faults: Vec<Fault>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            issuers: DEFAULT_ISSUERS.iter().map(|s| s.to_string()).collect(),
            merchants: DEFAULT_MERCHANTS.iter().map(|s| s.to_string()).collect(),
            methods: DEFAULT_METHODS.iter().map(|s| s.to_string()).collect(),
            base_success_rate: 0.92,
            base_latency_p50_ms: 120.0,
            base_latency_p95_ms: 350.0,
            events_per_cycle: 120,
            faults: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn for_scenario(scenario: Scenario, seed: u64) -> Self {
        let faults = match scenario {
            Scenario::Calm => Vec::new(),
            Scenario::IssuerOutage => vec![Fault {
                kind: FaultKind::IssuerOutage { issuer: "AXIS".to_string() },
                from_cycle: 2,
                until_cycle: None,
            }],
            Scenario::RetryStorm => vec![Fault {
                kind: FaultKind::RetryStorm,
                from_cycle: 2,
                until_cycle: None,
            }],
            Scenario::MerchantFlood => vec![Fault {
                kind: FaultKind::MerchantFlood { merchant: "m_smb_001".to_string() },
                from_cycle: 2,
                until_cycle: None,
            }],
            Scenario::Mixed => vec![
                Fault {
                    kind: FaultKind::IssuerOutage { issuer: "ICICI".to_string() },
                    from_cycle: 2,
                    until_cycle: Some(14),
                },
                Fault {
                    kind: FaultKind::RetryStorm,
                    from_cycle: 8,
                    until_cycle: Some(16),
                },
                Fault {
                    kind: FaultKind::MerchantFlood { merchant: "m_smb_002".to_string() },
                    from_cycle: 12,
                    until_cycle: None,
                },
            ],
        };
        Self { seed, faults, ..Self::default() }
    }
}

/// Remediation state shared between the traffic generator and the gateway.
#[derive(Debug, Default)]
struct NetState {
    rerouted_issuers: BTreeSet<String>,
    suppressed_merchants: BTreeSet<String>,
    retry_clamped: bool,
}

#[derive(Clone)]
pub struct NetHandle {
    inner: Arc<Mutex<NetState>>,
}

impl NetHandle {
    fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(NetState::default())) }
    }

    // The simulator never panics while holding the lock, but a poisoned lock
    // would still only guard plain flags, so recover rather than wedge.
    fn lock(&self) -> MutexGuard<'_, NetState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Seeded traffic generator. Each call to [`SnapshotSource::next_snapshot`]
/// plays one cycle of events into the sliding window and reads it back.
pub struct SimulatedNetwork {
    config: SimulatorConfig,
    state: NetHandle,
    observer: Observer,
    rng: StdRng,
    cycle: u64,
    sequence: u64,
}

impl SimulatedNetwork {
    pub fn new(config: SimulatorConfig, observer_config: ObserverConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            state: NetHandle::new(),
            observer: Observer::new(observer_config),
            rng,
            cycle: 0,
            sequence: 0,
        }
    }

    /// Handle for the gateway side of the same network.
    pub fn gateway(&self) -> SimulatedGateway {
        SimulatedGateway { state: self.state.clone() }
    }

    pub fn current_cycle(&self) -> u64 {
        self.cycle
    }

    fn pick<'a>(rng: &mut StdRng, pool: &'a [String]) -> &'a str {
        &pool[rng.gen_range(0..pool.len())]
    }

    fn generate_event(&mut self) -> PaymentEvent {
        let (rerouted, suppressed, clamped) = {
            let state = self.state.lock();
            (
                state.rerouted_issuers.clone(),
                state.suppressed_merchants.clone(),
                state.retry_clamped,
            )
        };

        // Detoured issuers and sidelined merchants receive no traffic, unless
        // that would empty the pool entirely.
        let issuers: Vec<String> = {
            let open: Vec<String> = self
                .config
                .issuers
                .iter()
                .filter(|issuer| !rerouted.contains(*issuer))
                .cloned()
                .collect();
            if open.is_empty() { self.config.issuers.clone() } else { open }
        };
        let merchants: Vec<String> = {
            let open: Vec<String> = self
                .config
                .merchants
                .iter()
                .filter(|merchant| !suppressed.contains(*merchant))
                .cloned()
                .collect();
            if open.is_empty() { self.config.merchants.clone() } else { open }
        };

        let issuer = Self::pick(&mut self.rng, &issuers).to_string();
        let merchant = Self::pick(&mut self.rng, &merchants).to_string();
        let method = Self::pick(&mut self.rng, &self.config.methods).to_string();

        let mut issuer_hit = false;
        let mut merchant_hit = false;
        let mut storm = false;
        for fault in &self.config.faults {
            if !fault.active(self.cycle) {
                continue;
            }
            match &fault.kind {
                FaultKind::IssuerOutage { issuer: target } if *target == issuer => {
                    issuer_hit = true;
                }
                FaultKind::MerchantFlood { merchant: target } if *target == merchant => {
                    merchant_hit = true;
                }
                FaultKind::RetryStorm => storm = true,
                _ => {}
            }
        }

        let mut success_prob = self.config.base_success_rate + method_success_bonus(&method);
        if issuer_hit {
            success_prob -= ISSUER_OUTAGE_PENALTY;
        }
        if storm {
            success_prob -=
                if clamped { STORM_PENALTY_CLAMPED } else { STORM_PENALTY };
        }
        if merchant_hit {
            success_prob -= MERCHANT_FLOOD_PENALTY;
        }
        success_prob += self.rng.gen_range(-0.025..0.025);
        let success_prob = success_prob.clamp(0.05, 0.98);

        let succeeded = self.rng.gen_bool(success_prob);

        let mut retries: u32 = if self.rng.gen_bool(0.12) { self.rng.gen_range(1..=2) } else { 0 };
        if storm {
            let extra = self.rng.gen_range(2..=6);
            retries += if clamped { 1 } else { extra };
        }
        if issuer_hit && !succeeded {
            retries += self.rng.gen_range(0..=2);
        }
        let retries = retries.min(8);
        let attempts = 1 + retries;

        let mut latency_scale = method_latency_mult(&method);
        if issuer_hit {
            latency_scale *= 1.8;
        }
        if storm {
            latency_scale *= 1.25;
        }
        let p50 = self.config.base_latency_p50_ms * latency_scale;
        let p95 = self.config.base_latency_p95_ms * latency_scale;
        let base_latency = if self.rng.gen_bool(0.92) {
            p50 + self.rng.gen_range(0.0..(p95 - p50).max(1.0) / 2.0)
        } else {
            p95 + self.rng.gen_range(0.0..p95 * 0.25)
        };
        let latency_ms =
            (base_latency * self.rng.gen_range(0.94..1.06)).max(10.0);

        let error_code = if succeeded {
            ErrorCode::None
        } else if issuer_hit {
            match self.rng.gen_range(0..3) {
                0 => ErrorCode::IssuerUnavailable,
                1 => ErrorCode::NetworkTimeout,
                _ => ErrorCode::RateLimited,
            }
        } else if storm {
            if self.rng.gen_bool(0.6) {
                ErrorCode::RateLimited
            } else {
                ErrorCode::NetworkTimeout
            }
        } else if merchant_hit {
            if self.rng.gen_bool(0.7) {
                ErrorCode::FraudSuspected
            } else {
                ErrorCode::DoNotHonor
            }
        } else {
            match self.rng.gen_range(0..4) {
                0 => ErrorCode::InsufficientFunds,
                1 => ErrorCode::DoNotHonor,
                2 => ErrorCode::NetworkTimeout,
                _ => ErrorCode::IssuerUnavailable,
            }
        };

        self.sequence += 1;
        let estimated_cost = attempts as f64 * cost_per_attempt(&method);
        PaymentEvent {
            event_id: format!("evt_{:08}", self.sequence),
            issuer,
            merchant,
            method,
            outcome: if succeeded { PaymentOutcome::Success } else { PaymentOutcome::Failed },
            error_code,
            latency_ms,
            attempts,
            estimated_cost,
            occurred_at: Utc::now(),
        }
    }
}

impl SnapshotSource for SimulatedNetwork {
    fn next_snapshot(&mut self) -> Option<MetricsSnapshot> {
        self.cycle += 1;
        for _ in 0..self.config.events_per_cycle {
            let event = self.generate_event();
            self.observer.ingest(event);
        }
        self.observer.snapshot(Utc::now())
    }
}

/// Gateway control plane for the simulated network. Remediations flip shared
/// flags that the traffic generator reads on the next cycle.
pub struct SimulatedGateway {
    state: NetHandle,
}

impl SimulatedGateway {
    fn reject(decision: &Decision, reason: &str) -> BackendError {
        BackendError::Rejected {
            action: decision.action,
            target: decision.target_label(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ActionBackend for SimulatedGateway {
    async fn apply(&self, decision: &Decision) -> Result<(), BackendError> {
        match (decision.action, &decision.target) {
            (ActionKind::Reroute, Some(ActionTarget::Issuer(issuer))) => {
                self.state.lock().rerouted_issuers.insert(issuer.clone());
                Ok(())
            }
            (ActionKind::Suppress, Some(ActionTarget::Merchant(merchant))) => {
                self.state.lock().suppressed_merchants.insert(merchant.clone());
                Ok(())
            }
            (ActionKind::RetryPolicy, Some(ActionTarget::Gateway)) => {
                self.state.lock().retry_clamped = true;
                Ok(())
            }
            (ActionKind::NoOp, _) => Ok(()),
            _ => Err(Self::reject(decision, "unsupported action/target pair")),
        }
    }

    async fn revert(&self, decision: &Decision) -> Result<(), BackendError> {
        match (decision.action, &decision.target) {
            (ActionKind::Reroute, Some(ActionTarget::Issuer(issuer))) => {
                self.state.lock().rerouted_issuers.remove(issuer);
                Ok(())
            }
            (ActionKind::Suppress, Some(ActionTarget::Merchant(merchant))) => {
                self.state.lock().suppressed_merchants.remove(merchant);
                Ok(())
            }
            (ActionKind::RetryPolicy, Some(ActionTarget::Gateway)) => {
                self.state.lock().retry_clamped = false;
                Ok(())
            }
            (ActionKind::NoOp, _) => Ok(()),
            _ => Err(Self::reject(decision, "unsupported action/target pair")),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use payops_core::domain::hypothesis::RootCause;
    use payops_core::reasoner::{HeuristicReasoner, ReasonerConfig};

    use super::*;

    fn observer_config() -> ObserverConfig {
        ObserverConfig { window_size: 200, min_samples: 20 }
    }

    fn decision_for(action: ActionKind, target: ActionTarget) -> Decision {
        Decision {
            action,
            target: Some(target),
            cause: RootCause::IssuerDegradation,
            confidence: 0.9,
            risk: 0.3,
            requires_human_approval: false,
            approval_reason: None,
            rationale: "test".to_string(),
            window: payops_core::domain::metrics::WindowId(1),
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn same_seed_replays_the_same_traffic() {
        let mut a =
            SimulatedNetwork::new(SimulatorConfig::for_scenario(Scenario::Mixed, 42), observer_config());
        let mut b =
            SimulatedNetwork::new(SimulatorConfig::for_scenario(Scenario::Mixed, 42), observer_config());

        for _ in 0..3 {
            let snap_a = a.next_snapshot().map(|s| {
                (s.sample_count, s.overall_success_rate, s.retry_amplification)
            });
            let snap_b = b.next_snapshot().map(|s| {
                (s.sample_count, s.overall_success_rate, s.retry_amplification)
            });
            assert_eq!(snap_a, snap_b);
        }
    }

    #[test]
    fn calm_traffic_stays_healthy() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::Calm, 11),
            observer_config(),
        );
        let snapshot = network.next_snapshot().unwrap();
        assert!(snapshot.overall_success_rate > 0.85);
        assert!(snapshot.retry_amplification < 1.5);
    }

    #[test]
    fn issuer_outage_drags_the_target_below_threshold() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::IssuerOutage, 11),
            observer_config(),
        );
        // Cycles 1-2 fill the window, fault active from cycle 2; by cycle 3
        // the window is dominated by faulted traffic.
        let mut snapshot = None;
        for _ in 0..3 {
            snapshot = network.next_snapshot();
        }
        let snapshot = snapshot.unwrap();
        let axis = snapshot.success_by_issuer.get("AXIS").copied().unwrap();
        assert!(axis < 0.70, "AXIS should be degraded, got {axis}");

        let hypothesis =
            HeuristicReasoner::new(ReasonerConfig::default()).analyze(&snapshot, Utc::now());
        assert_eq!(hypothesis.cause, RootCause::IssuerDegradation);
    }

    #[test]
    fn retry_storm_amplifies_attempts() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::RetryStorm, 11),
            observer_config(),
        );
        let mut snapshot = None;
        for _ in 0..3 {
            snapshot = network.next_snapshot();
        }
        let snapshot = snapshot.unwrap();
        assert!(
            snapshot.retry_amplification >= 1.5,
            "storm should amplify retries, got {}",
            snapshot.retry_amplification
        );

        // The storm pulls every issuer under the degradation floor, but the
        // diagnosis must still name the storm, not a scapegoat issuer.
        let hypothesis =
            HeuristicReasoner::new(ReasonerConfig::default()).analyze(&snapshot, Utc::now());
        assert_eq!(hypothesis.cause, RootCause::RetryStorm);
    }

    #[tokio::test]
    async fn reroute_detours_traffic_and_heals_the_window() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::IssuerOutage, 11),
            observer_config(),
        );
        let gateway = network.gateway();
        for _ in 0..3 {
            network.next_snapshot();
        }

        gateway
            .apply(&decision_for(
                ActionKind::Reroute,
                ActionTarget::Issuer("AXIS".to_string()),
            ))
            .await
            .unwrap();

        // Two more cycles flush the stale AXIS events out of the window.
        let mut snapshot = None;
        for _ in 0..2 {
            snapshot = network.next_snapshot();
        }
        let snapshot = snapshot.unwrap();
        assert!(!snapshot.success_by_issuer.contains_key("AXIS"));
        assert!(
            snapshot.overall_success_rate > 0.85,
            "detour should restore health, got {}",
            snapshot.overall_success_rate
        );
    }

    #[tokio::test]
    async fn retry_clamp_reduces_amplification() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::RetryStorm, 11),
            observer_config(),
        );
        let gateway = network.gateway();
        for _ in 0..3 {
            network.next_snapshot();
        }

        gateway
            .apply(&decision_for(ActionKind::RetryPolicy, ActionTarget::Gateway))
            .await
            .unwrap();

        let mut snapshot = None;
        for _ in 0..2 {
            snapshot = network.next_snapshot();
        }
        let snapshot = snapshot.unwrap();
        assert!(
            snapshot.retry_amplification < 2.5,
            "clamp should cut retries, got {}",
            snapshot.retry_amplification
        );
    }

    #[tokio::test]
    async fn revert_restores_the_detoured_issuer() {
        let mut network = SimulatedNetwork::new(
            SimulatorConfig::for_scenario(Scenario::Calm, 11),
            observer_config(),
        );
        let gateway = network.gateway();
        let decision =
            decision_for(ActionKind::Reroute, ActionTarget::Issuer("SBI".to_string()));

        gateway.apply(&decision).await.unwrap();
        network.next_snapshot();
        gateway.revert(&decision).await.unwrap();

        let mut snapshot = None;
        for _ in 0..2 {
            snapshot = network.next_snapshot();
        }
        assert!(snapshot.unwrap().success_by_issuer.contains_key("SBI"));
    }

    #[tokio::test]
    async fn mismatched_action_target_is_rejected() {
        let network = SimulatedNetwork::new(SimulatorConfig::default(), observer_config());
        let gateway = network.gateway();

        let err = gateway
            .apply(&decision_for(
                ActionKind::Reroute,
                ActionTarget::Merchant("m_smb_001".to_string()),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
    }

    #[test]
    fn scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::parse(scenario.as_str()), Some(scenario));
        }
        assert_eq!(Scenario::parse("chaos"), None);
    }
}
