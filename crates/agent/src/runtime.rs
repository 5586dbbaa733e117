//! The observe -> hypothesize -> decide -> execute -> learn loop.
//!
//! [`AgentRuntime`] owns every stage and drives them in a fixed order each
//! cycle. Human approvals arrive out of band through an [`EscalationHandle`];
//! they are drained at the top of the next cycle that has a fresh window to
//! use as the before-state.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use payops_core::config::AppConfig;
use payops_core::control::{ControlConfig, SystemMode};
use payops_core::decision::DecisionEngine;
use payops_core::domain::action::{ActionId, ActionOutcome, ActionRecord};
use payops_core::domain::decision::{ActionKind, Decision};
use payops_core::domain::hypothesis::Hypothesis;
use payops_core::domain::learning::{LearningRecord, LearningSummary};
use payops_core::domain::metrics::MetricsSnapshot;
use payops_core::executor::{ActionBackend, EscalationVerdict, Executor};
use payops_core::history::ActionLog;
use payops_core::learner::Learner;
use payops_core::store::{
    state_channel, PublishedState, StatePublisher, StateReader, TrendPoint, TREND_POINTS,
};

use crate::hypothesis::HypothesisProvider;

const ACTION_LOG_CAPACITY: usize = 50;

/// Where metric windows come from. The simulator advances traffic by one
/// cycle per call; `None` means the window has not reached minimum samples.
pub trait SnapshotSource: Send {
    fn next_snapshot(&mut self) -> Option<MetricsSnapshot>;
}

#[derive(Clone, Debug)]
pub struct EscalationResponse {
    pub action_id: ActionId,
    pub verdict: EscalationVerdict,
}

/// Cloneable channel for answering escalations from outside the loop.
#[derive(Clone)]
pub struct EscalationHandle {
    tx: mpsc::UnboundedSender<EscalationResponse>,
}

impl EscalationHandle {
    /// Returns false once the runtime is gone.
    pub fn approve(&self, action_id: ActionId) -> bool {
        self.tx
            .send(EscalationResponse { action_id, verdict: EscalationVerdict::Approve })
            .is_ok()
    }

    pub fn decline(&self, action_id: ActionId) -> bool {
        self.tx
            .send(EscalationResponse { action_id, verdict: EscalationVerdict::Cancel })
            .is_ok()
    }
}

/// Everything one cycle produced.
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub mode: SystemMode,
    pub metrics: Option<MetricsSnapshot>,
    pub hypothesis: Option<Hypothesis>,
    pub action: Option<ActionRecord>,
    /// False when the action log collapsed the record into its predecessor.
    pub action_appended: bool,
    pub resolved_approvals: Vec<ActionRecord>,
    pub rollbacks: Vec<ActionRecord>,
    pub graded: Vec<LearningRecord>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub executed: u64,
    pub blocked: u64,
    pub skipped_cooldown: u64,
    pub escalated: u64,
    pub failed: u64,
    pub rolled_back: u64,
    pub learning: LearningSummary,
}

impl RunSummary {
    pub fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.action_appended {
            if let Some(record) = &report.action {
                self.count(record);
            }
        }
        for record in &report.resolved_approvals {
            self.count(record);
        }
        self.rolled_back += report.rollbacks.len() as u64;
    }

    fn count(&mut self, record: &ActionRecord) {
        // NoOp passes through the executor as Executed but is not a
        // remediation; keep it out of the tallies.
        if record.decision.action == ActionKind::NoOp {
            return;
        }
        match record.outcome {
            ActionOutcome::Executed => self.executed += 1,
            ActionOutcome::Blocked => self.blocked += 1,
            ActionOutcome::SkippedCooldown => self.skipped_cooldown += 1,
            ActionOutcome::PendingApproval => self.escalated += 1,
            ActionOutcome::Failed => self.failed += 1,
            ActionOutcome::RolledBack => {}
        }
    }
}

pub struct AgentRuntime<S, B> {
    source: S,
    backend: B,
    provider: HypothesisProvider,
    engine: DecisionEngine,
    executor: Executor,
    learner: Learner,
    control: ControlConfig,
    log: ActionLog,
    trend: VecDeque<TrendPoint>,
    publisher: StatePublisher,
    responses_tx: mpsc::UnboundedSender<EscalationResponse>,
    responses_rx: mpsc::UnboundedReceiver<EscalationResponse>,
    cycle: u64,
    last_metrics: Option<MetricsSnapshot>,
    last_hypothesis: Option<Hypothesis>,
    last_decision: Option<Decision>,
}

impl<S, B> AgentRuntime<S, B>
where
    S: SnapshotSource,
    B: ActionBackend,
{
    pub fn new(config: &AppConfig, source: S, backend: B, provider: HypothesisProvider) -> Self {
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let (publisher, _) = state_channel(PublishedState::initial(Utc::now()));
        Self {
            source,
            backend,
            provider,
            engine: DecisionEngine::new(config.decision.clone()),
            executor: Executor::new(config.guardrails.clone()),
            learner: Learner::new(config.learner.clone()),
            control: config.control.clone(),
            log: ActionLog::new(ACTION_LOG_CAPACITY),
            trend: VecDeque::with_capacity(TREND_POINTS),
            publisher,
            responses_tx,
            responses_rx,
            cycle: 0,
            last_metrics: None,
            last_hypothesis: None,
            last_decision: None,
        }
    }

    pub fn handle(&self) -> EscalationHandle {
        EscalationHandle { tx: self.responses_tx.clone() }
    }

    pub fn reader(&self) -> StateReader {
        self.publisher.reader()
    }

    pub fn learning_summary(&self) -> LearningSummary {
        self.learner.summary()
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let now = Utc::now();
        let snapshot = self.source.next_snapshot();

        let mut resolved_approvals = Vec::new();
        let mut rollbacks = Vec::new();
        let mut graded = Vec::new();
        let mut hypothesis = None;
        let mut action = None;
        let mut action_appended = false;

        if let Some(current) = &snapshot {
            // Approvals resolve against the freshest window so their monitors
            // baseline on post-approval reality, not on the window that
            // triggered the escalation.
            while let Ok(response) = self.responses_rx.try_recv() {
                match self
                    .executor
                    .resolve_escalation(
                        &response.action_id,
                        response.verdict,
                        &self.backend,
                        current,
                        now,
                    )
                    .await
                {
                    Ok(record) => {
                        self.log.append(record.clone());
                        resolved_approvals.push(record);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping stale escalation response");
                    }
                }
            }

            for resolution in self.executor.check_monitors(current, &self.backend, now).await {
                graded.push(self.learner.observe(
                    &resolution.record,
                    &resolution.baseline,
                    current,
                    now,
                ));
                if resolution.regressed {
                    self.log.append(resolution.record.clone());
                    rollbacks.push(resolution.record);
                }
            }

            let proposed = self.provider.hypothesize(current).await;
            let decision =
                self.engine.decide(current, &proposed, &self.learner.bias(), now);
            let record =
                self.executor.execute(decision.clone(), &self.backend, current, now).await;

            action_appended = self.log.append(record.clone());
            action = Some(record);
            hypothesis = Some(proposed.clone());
            self.last_hypothesis = Some(proposed);
            self.last_decision = Some(decision);

            self.trend.push_back(TrendPoint::from_snapshot(current));
            while self.trend.len() > TREND_POINTS {
                self.trend.pop_front();
            }
            self.last_metrics = snapshot.clone();
        } else {
            tracing::debug!(cycle = self.cycle, "window below minimum samples, nothing to analyze");
        }

        self.learner.decay();

        let control = payops_core::control::recompute(
            self.executor.escalation_ref(),
            self.executor.cooldown_entries(now),
            self.last_metrics.as_ref(),
            self.learner.summary(),
            &self.control,
            now,
        );
        let mode = control.mode;

        self.publisher.publish(PublishedState {
            cycle: self.cycle,
            published_at: now,
            metrics: self.last_metrics.clone(),
            trend: self.trend.iter().cloned().collect(),
            hypothesis: self.last_hypothesis.clone(),
            last_decision: self.last_decision.clone(),
            actions: self.log.to_vec(),
            control,
        });

        tracing::debug!(
            cycle = self.cycle,
            mode = %mode,
            resolved = resolved_approvals.len(),
            rollbacks = rollbacks.len(),
            "cycle complete"
        );

        CycleReport {
            cycle: self.cycle,
            mode,
            metrics: snapshot,
            hypothesis,
            action,
            action_appended,
            resolved_approvals,
            rollbacks,
            graded,
        }
    }

    pub async fn run(&mut self, cycles: u64) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..cycles {
            let report = self.run_cycle().await;
            summary.absorb(&report);
        }
        summary.learning = self.learner.summary();
        summary
    }
}
