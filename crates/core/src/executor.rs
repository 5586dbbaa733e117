//! Guardrailed execution of decisions against an action backend.
//!
//! The executor owns the runtime safety state the decision engine must not
//! see: per-target cooldowns, the single outstanding escalation slot, and the
//! rollback monitors opened after each applied action. Every outcome change
//! goes through the [`ActionOutcome::can_transition`] table.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::control::{CooldownEntry, EscalationRef};
use crate::domain::action::{ActionId, ActionOutcome, ActionRecord, GuardrailFlag};
use crate::domain::decision::{ActionKind, ActionTarget, Decision};
use crate::domain::metrics::MetricsSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Seconds the same (action, target) pair stays frozen after an apply.
    pub cooldown_secs: i64,
    /// Cycles an applied action is watched before its monitor expires clean.
    pub monitor_cycles: u32,
    /// Hard ceiling on autonomous risk; at or above, execution is refused
    /// even if the decision arrived unflagged.
    pub max_auto_risk: f64,
    /// Absolute drop in overall success rate that counts as a regression.
    pub regression_success_drop: f64,
    /// Relative rise in p95 latency that counts as a regression.
    pub regression_latency_rise: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 180,
            monitor_cycles: 3,
            max_auto_risk: 0.65,
            regression_success_drop: 0.08,
            regression_latency_rise: 0.25,
        }
    }
}

/// Side-effect boundary. The simulator implements this; a live deployment
/// would put the gateway control plane behind it.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    async fn apply(&self, decision: &Decision) -> Result<(), BackendError>;
    async fn revert(&self, decision: &Decision) -> Result<(), BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend rejected {action} on {target}: {reason}")]
    Rejected {
        action: ActionKind,
        target: String,
        reason: String,
    },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("no pending escalation with id {action_id}")]
    UnknownEscalation { action_id: ActionId },

    #[error("illegal outcome transition {from} -> {to}")]
    InvalidTransition {
        from: ActionOutcome,
        to: ActionOutcome,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationVerdict {
    Approve,
    Cancel,
}

/// Result of a rollback monitor leaving the watch list, regressed or clean.
/// Feeds the learner either way; only regressed resolutions mutate the
/// action record.
#[derive(Clone, Debug)]
pub struct MonitorResolution {
    pub record: ActionRecord,
    pub baseline: MetricsSnapshot,
    pub regressed: bool,
}

#[derive(Clone, Debug)]
struct PendingEscalation {
    record: ActionRecord,
    opened_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct RollbackMonitor {
    record: ActionRecord,
    baseline: MetricsSnapshot,
    cycles_left: u32,
}

pub struct Executor {
    config: GuardrailConfig,
    cooldowns: HashMap<(ActionKind, ActionTarget), DateTime<Utc>>,
    pending: Option<PendingEscalation>,
    monitors: Vec<RollbackMonitor>,
}

impl Executor {
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            cooldowns: HashMap::new(),
            pending: None,
            monitors: Vec::new(),
        }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Run one decision through the guardrail gates and, if all pass, the
    /// backend. Returns the action record for the history log; the record is
    /// terminal unless its outcome is PENDING_APPROVAL or EXECUTED.
    pub async fn execute(
        &mut self,
        decision: Decision,
        backend: &dyn ActionBackend,
        baseline: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> ActionRecord {
        if decision.action == ActionKind::NoOp {
            return ActionRecord::new(decision, ActionOutcome::Executed, now);
        }

        if decision.requires_human_approval {
            return self.escalate(decision, now);
        }

        if decision.risk >= self.config.max_auto_risk {
            tracing::warn!(
                action = %decision.action,
                target = %decision.target_label(),
                risk = decision.risk,
                "refusing unflagged decision at risk ceiling"
            );
            return ActionRecord::new(decision, ActionOutcome::Blocked, now)
                .with_guardrail(GuardrailFlag::RiskCeiling);
        }

        if let Some(until) = self.cooldown_until(&decision, now) {
            tracing::debug!(
                action = %decision.action,
                target = %decision.target_label(),
                until = %until,
                "skipping repeat inside cooldown"
            );
            return ActionRecord::new(decision, ActionOutcome::SkippedCooldown, now)
                .with_guardrail(GuardrailFlag::CooldownActive);
        }

        let record = ActionRecord::new(decision, ActionOutcome::Executed, now);
        self.apply(record, backend, baseline, now).await
    }

    /// Re-check every open rollback monitor against the current window.
    /// Regressed actions are reverted and returned with their updated
    /// records; clean expiries are returned untouched so the learner can
    /// grade them. Monitors still inside their watch window stay open.
    pub async fn check_monitors(
        &mut self,
        current: &MetricsSnapshot,
        backend: &dyn ActionBackend,
        now: DateTime<Utc>,
    ) -> Vec<MonitorResolution> {
        let mut resolutions = Vec::new();
        let mut open = Vec::new();

        for mut monitor in self.monitors.drain(..) {
            if regressed(&monitor.baseline, current, &self.config) {
                let mut record = monitor.record;
                record.after_window = Some(current.window);
                match backend.revert(&record.decision).await {
                    Ok(()) => {
                        // can_transition holds: monitors only watch EXECUTED.
                        record.outcome = ActionOutcome::RolledBack;
                        record.rolled_back_at = Some(now);
                        record.guardrails.push(GuardrailFlag::RegressionDetected);
                        tracing::warn!(
                            action = %record.id,
                            kind = %record.decision.action,
                            target = %record.decision.target_label(),
                            "regression detected, action rolled back"
                        );
                    }
                    Err(err) => {
                        record.guardrails.push(GuardrailFlag::BackendFailure);
                        record.note = Some(format!("revert failed: {err}"));
                        tracing::error!(
                            action = %record.id,
                            error = %err,
                            "regression detected but revert failed, action remains applied"
                        );
                    }
                }
                resolutions.push(MonitorResolution {
                    record,
                    baseline: monitor.baseline,
                    regressed: true,
                });
                continue;
            }

            monitor.cycles_left -= 1;
            if monitor.cycles_left == 0 {
                let mut record = monitor.record;
                record.after_window = Some(current.window);
                tracing::debug!(action = %record.id, "monitor window closed clean");
                resolutions.push(MonitorResolution {
                    record,
                    baseline: monitor.baseline,
                    regressed: false,
                });
            } else {
                open.push(monitor);
            }
        }

        self.monitors = open;
        resolutions
    }

    /// Resolve the outstanding escalation. Approval replays the held decision
    /// through the backend under the same post-apply guardrails as an
    /// autonomous action; cancellation closes it as BLOCKED.
    pub async fn resolve_escalation(
        &mut self,
        action_id: &ActionId,
        verdict: EscalationVerdict,
        backend: &dyn ActionBackend,
        baseline: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ActionRecord, ExecutorError> {
        let pending = match self.pending.take() {
            Some(pending) if &pending.record.id == action_id => pending,
            other => {
                self.pending = other;
                return Err(ExecutorError::UnknownEscalation {
                    action_id: action_id.clone(),
                });
            }
        };
        let mut record = pending.record;

        match verdict {
            EscalationVerdict::Cancel => {
                transition(&mut record, ActionOutcome::Blocked)?;
                record.guardrails.push(GuardrailFlag::HumanDeclined);
                tracing::info!(action = %record.id, "escalation declined by operator");
                Ok(record)
            }
            EscalationVerdict::Approve => {
                transition(&mut record, ActionOutcome::Executed)?;
                tracing::info!(action = %record.id, "escalation approved by operator");
                Ok(self.apply(record, backend, baseline, now).await)
            }
        }
    }

    /// Reference to the outstanding escalation, if any, for the control state.
    pub fn escalation_ref(&self) -> Option<EscalationRef> {
        self.pending.as_ref().map(|pending| EscalationRef {
            action_id: pending.record.id.clone(),
            action: pending.record.decision.action,
            target: pending.record.decision.target.clone(),
            risk: pending.record.decision.risk,
            reason: pending
                .record
                .decision
                .approval_reason
                .clone()
                .unwrap_or_else(|| "approval required".to_string()),
            opened_at: pending.opened_at,
        })
    }

    /// Live cooldowns, expired entries pruned, sorted for stable publishing.
    pub fn cooldown_entries(&mut self, now: DateTime<Utc>) -> Vec<CooldownEntry> {
        self.cooldowns.retain(|_, until| *until > now);
        let mut entries: Vec<CooldownEntry> = self
            .cooldowns
            .iter()
            .map(|((action, target), until)| CooldownEntry {
                action: *action,
                target: target.clone(),
                until: *until,
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.until, a.target.label(), a.action)
                .cmp(&(b.until, b.target.label(), b.action))
        });
        entries
    }

    pub fn open_monitors(&self) -> usize {
        self.monitors.len()
    }

    fn escalate(&mut self, decision: Decision, now: DateTime<Utc>) -> ActionRecord {
        if let Some(pending) = &self.pending {
            let held = &pending.record.decision;
            if held.action == decision.action && held.target == decision.target {
                // Same ask while the operator is deciding: re-surface the
                // held record instead of minting a duplicate.
                return pending.record.clone();
            }
            tracing::info!(
                action = %decision.action,
                target = %decision.target_label(),
                held = %pending.record.id,
                "escalation slot occupied, proposal blocked"
            );
            return ActionRecord::new(decision, ActionOutcome::Blocked, now)
                .with_guardrail(GuardrailFlag::EscalationOccupied);
        }

        let record = ActionRecord::new(decision, ActionOutcome::PendingApproval, now)
            .with_guardrail(GuardrailFlag::ApprovalRequired);
        tracing::info!(
            action = %record.id,
            kind = %record.decision.action,
            target = %record.decision.target_label(),
            risk = record.decision.risk,
            "decision escalated for human approval"
        );
        self.pending = Some(PendingEscalation {
            record: record.clone(),
            opened_at: now,
        });
        record
    }

    async fn apply(
        &mut self,
        mut record: ActionRecord,
        backend: &dyn ActionBackend,
        baseline: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> ActionRecord {
        match backend.apply(&record.decision).await {
            Ok(()) => {
                record.executed_at = Some(now);
                record.before_window = Some(baseline.window);
                tracing::info!(
                    action = %record.id,
                    kind = %record.decision.action,
                    target = %record.decision.target_label(),
                    "remediation applied"
                );
                if let Some(target) = record.decision.target.clone() {
                    self.cooldowns.insert(
                        (record.decision.action, target),
                        now + Duration::seconds(self.config.cooldown_secs),
                    );
                }
                self.monitors.push(RollbackMonitor {
                    record: record.clone(),
                    baseline: baseline.clone(),
                    cycles_left: self.config.monitor_cycles.max(1),
                });
                record
            }
            Err(err) => {
                tracing::error!(
                    action = %record.id,
                    kind = %record.decision.action,
                    error = %err,
                    "backend refused remediation, nothing applied"
                );
                record.outcome = ActionOutcome::Failed;
                record.guardrails.push(GuardrailFlag::BackendFailure);
                record.note = Some(err.to_string());
                record
            }
        }
    }

    fn cooldown_until(&self, decision: &Decision, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let target = decision.target.as_ref()?;
        let until = self.cooldowns.get(&(decision.action, target.clone()))?;
        (*until > now).then_some(*until)
    }
}

fn regressed(baseline: &MetricsSnapshot, current: &MetricsSnapshot, config: &GuardrailConfig) -> bool {
    let success_drop = baseline.overall_success_rate - current.overall_success_rate;
    if success_drop >= config.regression_success_drop {
        return true;
    }
    if baseline.p95_latency_ms > 0.0 {
        let latency_rise = (current.p95_latency_ms - baseline.p95_latency_ms) / baseline.p95_latency_ms;
        if latency_rise >= config.regression_latency_rise {
            return true;
        }
    }
    false
}

fn transition(record: &mut ActionRecord, to: ActionOutcome) -> Result<(), ExecutorError> {
    if !ActionOutcome::can_transition(record.outcome, to) {
        return Err(ExecutorError::InvalidTransition {
            from: record.outcome,
            to,
        });
    }
    record.outcome = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::hypothesis::RootCause;
    use crate::domain::metrics::WindowId;

    #[derive(Default)]
    struct RecordingBackend {
        applied: Mutex<Vec<String>>,
        reverted: Mutex<Vec<String>>,
        fail_apply: bool,
        fail_revert: bool,
    }

    impl RecordingBackend {
        fn failing_apply() -> Self {
            Self {
                fail_apply: true,
                ..Self::default()
            }
        }

        fn failing_revert() -> Self {
            Self {
                fail_revert: true,
                ..Self::default()
            }
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }

        fn reverted(&self) -> Vec<String> {
            self.reverted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionBackend for RecordingBackend {
        async fn apply(&self, decision: &Decision) -> Result<(), BackendError> {
            if self.fail_apply {
                return Err(BackendError::Unavailable("gateway offline".to_string()));
            }
            self.applied.lock().unwrap().push(decision.target_label());
            Ok(())
        }

        async fn revert(&self, decision: &Decision) -> Result<(), BackendError> {
            if self.fail_revert {
                return Err(BackendError::Unavailable("gateway offline".to_string()));
            }
            self.reverted.lock().unwrap().push(decision.target_label());
            Ok(())
        }
    }

    fn snapshot(window: u64, overall: f64, p95: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            window: WindowId(window),
            recorded_at: Utc::now(),
            sample_count: 120,
            overall_success_rate: overall,
            success_by_issuer: BTreeMap::new(),
            success_by_merchant: BTreeMap::new(),
            retry_amplification: 1.1,
            p50_latency_ms: 120.0,
            p95_latency_ms: p95,
            avg_estimated_cost: 0.012,
            error_distribution: BTreeMap::new(),
        }
    }

    fn reroute(issuer: &str, risk: f64) -> Decision {
        Decision {
            action: ActionKind::Reroute,
            target: Some(ActionTarget::Issuer(issuer.to_string())),
            cause: RootCause::IssuerDegradation,
            confidence: 0.9,
            risk,
            requires_human_approval: false,
            approval_reason: None,
            rationale: format!("detour traffic away from issuer:{issuer}"),
            window: WindowId(1),
            decided_at: Utc::now(),
        }
    }

    fn escalated(decision: Decision, reason: &str) -> Decision {
        Decision {
            requires_human_approval: true,
            approval_reason: Some(reason.to_string()),
            ..decision
        }
    }

    #[tokio::test]
    async fn repeat_inside_cooldown_is_skipped_not_reapplied() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let first = executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        assert_eq!(first.outcome, ActionOutcome::Executed);
        assert_eq!(first.before_window, Some(WindowId(1)));

        let second = executor
            .execute(
                reroute("AXIS", 0.37),
                &backend,
                &baseline,
                now + Duration::seconds(30),
            )
            .await;
        assert_eq!(second.outcome, ActionOutcome::SkippedCooldown);
        assert_eq!(second.guardrails, vec![GuardrailFlag::CooldownActive]);
        assert_eq!(backend.applied().len(), 1);
    }

    #[tokio::test]
    async fn cooldown_expiry_allows_the_action_again() {
        let config = GuardrailConfig {
            cooldown_secs: 60,
            ..GuardrailConfig::default()
        };
        let mut executor = Executor::new(config);
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        let later = executor
            .execute(
                reroute("AXIS", 0.37),
                &backend,
                &baseline,
                now + Duration::seconds(61),
            )
            .await;
        assert_eq!(later.outcome, ActionOutcome::Executed);
        assert_eq!(backend.applied().len(), 2);
    }

    #[tokio::test]
    async fn cooldowns_are_scoped_per_target() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        let other = executor
            .execute(reroute("MERIDIAN", 0.37), &backend, &baseline, now)
            .await;
        assert_eq!(other.outcome, ActionOutcome::Executed);
        assert_eq!(backend.applied(), vec!["issuer:AXIS", "issuer:MERIDIAN"]);
    }

    #[tokio::test]
    async fn regression_triggers_rollback_with_windows_recorded() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.82, 300.0);
        let now = Utc::now();

        let record = executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        assert_eq!(record.outcome, ActionOutcome::Executed);

        let worse = snapshot(2, 0.70, 310.0);
        let resolutions = executor.check_monitors(&worse, &backend, now).await;
        assert_eq!(resolutions.len(), 1);
        let resolution = &resolutions[0];
        assert!(resolution.regressed);
        assert_eq!(resolution.record.outcome, ActionOutcome::RolledBack);
        assert_eq!(resolution.record.before_window, Some(WindowId(1)));
        assert_eq!(resolution.record.after_window, Some(WindowId(2)));
        assert!(resolution
            .record
            .guardrails
            .contains(&GuardrailFlag::RegressionDetected));
        assert!(resolution.record.rolled_back_at.is_some());
        assert_eq!(backend.reverted(), vec!["issuer:AXIS"]);
        assert_eq!(executor.open_monitors(), 0);
    }

    #[tokio::test]
    async fn latency_spike_alone_is_a_regression() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.82, 300.0);
        let now = Utc::now();

        executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        // Success steady, p95 up 30%.
        let slower = snapshot(2, 0.82, 390.0);
        let resolutions = executor.check_monitors(&slower, &backend, now).await;
        assert_eq!(resolutions.len(), 1);
        assert!(resolutions[0].regressed);
    }

    #[tokio::test]
    async fn healthy_monitor_expires_clean_after_the_watch_window() {
        let config = GuardrailConfig {
            monitor_cycles: 2,
            ..GuardrailConfig::default()
        };
        let mut executor = Executor::new(config);
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.82, 300.0);
        let now = Utc::now();

        executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;

        let steady = snapshot(2, 0.84, 295.0);
        assert!(executor.check_monitors(&steady, &backend, now).await.is_empty());
        assert_eq!(executor.open_monitors(), 1);

        let steady = snapshot(3, 0.85, 290.0);
        let resolutions = executor.check_monitors(&steady, &backend, now).await;
        assert_eq!(resolutions.len(), 1);
        assert!(!resolutions[0].regressed);
        assert_eq!(resolutions[0].record.outcome, ActionOutcome::Executed);
        assert_eq!(resolutions[0].record.after_window, Some(WindowId(3)));
        assert!(backend.reverted().is_empty());
        assert_eq!(executor.open_monitors(), 0);
    }

    #[tokio::test]
    async fn failed_revert_keeps_the_record_executed_and_flags_the_backend() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::failing_revert();
        let baseline = snapshot(1, 0.82, 300.0);
        let now = Utc::now();

        executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        let worse = snapshot(2, 0.70, 310.0);
        let resolutions = executor.check_monitors(&worse, &backend, now).await;
        assert_eq!(resolutions.len(), 1);
        let record = &resolutions[0].record;
        assert!(resolutions[0].regressed);
        assert_eq!(record.outcome, ActionOutcome::Executed);
        assert!(record.guardrails.contains(&GuardrailFlag::BackendFailure));
        assert!(record.note.as_deref().unwrap().contains("revert failed"));
    }

    #[tokio::test]
    async fn nothing_executes_without_approval() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let decision = escalated(reroute("AXIS", 0.70), "risk 0.70 at or above approval threshold 0.65");
        let record = executor.execute(decision, &backend, &baseline, now).await;
        assert_eq!(record.outcome, ActionOutcome::PendingApproval);
        assert_eq!(record.guardrails, vec![GuardrailFlag::ApprovalRequired]);
        assert!(backend.applied().is_empty());

        let reference = executor.escalation_ref().unwrap();
        assert_eq!(reference.action_id, record.id);
        assert_eq!(reference.reason, "risk 0.70 at or above approval threshold 0.65");
    }

    #[tokio::test]
    async fn approval_applies_and_installs_the_usual_guardrails() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let decision = escalated(reroute("AXIS", 0.70), "risk at ceiling");
        let pending = executor.execute(decision, &backend, &baseline, now).await;

        let resolved = executor
            .resolve_escalation(
                &pending.id,
                EscalationVerdict::Approve,
                &backend,
                &snapshot(2, 0.71, 305.0),
                now,
            )
            .await
            .unwrap();
        assert_eq!(resolved.outcome, ActionOutcome::Executed);
        assert_eq!(resolved.before_window, Some(WindowId(2)));
        assert_eq!(backend.applied(), vec!["issuer:AXIS"]);
        assert!(executor.escalation_ref().is_none());
        assert_eq!(executor.open_monitors(), 1);
        assert!(!executor.cooldown_entries(now).is_empty());
    }

    #[tokio::test]
    async fn cancellation_blocks_without_touching_the_backend() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let decision = escalated(reroute("AXIS", 0.70), "risk at ceiling");
        let pending = executor.execute(decision, &backend, &baseline, now).await;

        let resolved = executor
            .resolve_escalation(
                &pending.id,
                EscalationVerdict::Cancel,
                &backend,
                &baseline,
                now,
            )
            .await
            .unwrap();
        assert_eq!(resolved.outcome, ActionOutcome::Blocked);
        assert!(resolved.guardrails.contains(&GuardrailFlag::HumanDeclined));
        assert!(backend.applied().is_empty());
        assert!(executor.escalation_ref().is_none());
    }

    #[tokio::test]
    async fn occupied_slot_blocks_a_different_proposal_and_resurfaces_the_same_one() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let first = executor
            .execute(
                escalated(reroute("AXIS", 0.70), "risk at ceiling"),
                &backend,
                &baseline,
                now,
            )
            .await;

        let repeat = executor
            .execute(
                escalated(reroute("AXIS", 0.72), "risk at ceiling"),
                &backend,
                &baseline,
                now,
            )
            .await;
        assert_eq!(repeat.id, first.id);
        assert_eq!(repeat.outcome, ActionOutcome::PendingApproval);

        let other = executor
            .execute(
                escalated(reroute("MERIDIAN", 0.70), "risk at ceiling"),
                &backend,
                &baseline,
                now,
            )
            .await;
        assert_ne!(other.id, first.id);
        assert_eq!(other.outcome, ActionOutcome::Blocked);
        assert_eq!(other.guardrails, vec![GuardrailFlag::EscalationOccupied]);
    }

    #[tokio::test]
    async fn unknown_escalation_id_is_rejected_and_the_slot_survives() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        executor
            .execute(
                escalated(reroute("AXIS", 0.70), "risk at ceiling"),
                &backend,
                &baseline,
                now,
            )
            .await;

        let missing = ActionId::generate();
        let err = executor
            .resolve_escalation(&missing, EscalationVerdict::Approve, &backend, &baseline, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownEscalation { .. }));
        assert!(executor.escalation_ref().is_some());
    }

    #[tokio::test]
    async fn backend_refusal_yields_failed_without_a_cooldown() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::failing_apply();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let record = executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        assert_eq!(record.outcome, ActionOutcome::Failed);
        assert!(record.guardrails.contains(&GuardrailFlag::BackendFailure));
        assert!(record.note.is_some());
        assert!(executor.cooldown_entries(now).is_empty());
        assert_eq!(executor.open_monitors(), 0);

        // The next cycle may try again immediately.
        let retry = executor
            .execute(reroute("AXIS", 0.37), &backend, &baseline, now)
            .await;
        assert_eq!(retry.outcome, ActionOutcome::Failed);
    }

    #[tokio::test]
    async fn unflagged_decision_at_the_ceiling_is_refused() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.70, 300.0);
        let now = Utc::now();

        let record = executor
            .execute(reroute("AXIS", 0.66), &backend, &baseline, now)
            .await;
        assert_eq!(record.outcome, ActionOutcome::Blocked);
        assert_eq!(record.guardrails, vec![GuardrailFlag::RiskCeiling]);
        assert!(backend.applied().is_empty());
    }

    #[tokio::test]
    async fn no_op_executes_without_backend_cooldown_or_monitor() {
        let mut executor = Executor::new(GuardrailConfig::default());
        let backend = RecordingBackend::default();
        let baseline = snapshot(1, 0.90, 300.0);
        let now = Utc::now();

        let decision = Decision {
            action: ActionKind::NoOp,
            target: None,
            cause: RootCause::InsufficientSignal,
            confidence: 0.3,
            risk: 0.0,
            requires_human_approval: false,
            approval_reason: None,
            rationale: "hold position".to_string(),
            window: WindowId(1),
            decided_at: now,
        };
        let record = executor.execute(decision, &backend, &baseline, now).await;
        assert_eq!(record.outcome, ActionOutcome::Executed);
        assert!(backend.applied().is_empty());
        assert!(executor.cooldown_entries(now).is_empty());
        assert_eq!(executor.open_monitors(), 0);
    }
}
