//! Lock-free publication of the per-cycle state.
//!
//! The control loop writes a fresh immutable [`PublishedState`] at the end of
//! every cycle; any number of readers (CLI watcher, tests) load the latest
//! without blocking the loop.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::control::ControlState;
use crate::domain::action::ActionRecord;
use crate::domain::decision::Decision;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::metrics::{MetricsSnapshot, WindowId};

/// Rolling trend length kept in the published state.
pub const TREND_POINTS: usize = 40;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub window: WindowId,
    pub recorded_at: DateTime<Utc>,
    pub success_rate: f64,
    pub p95_latency_ms: f64,
}

impl TrendPoint {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            window: snapshot.window,
            recorded_at: snapshot.recorded_at,
            success_rate: snapshot.overall_success_rate,
            p95_latency_ms: snapshot.p95_latency_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishedState {
    pub cycle: u64,
    pub published_at: DateTime<Utc>,
    pub metrics: Option<MetricsSnapshot>,
    pub trend: Vec<TrendPoint>,
    pub hypothesis: Option<Hypothesis>,
    pub last_decision: Option<Decision>,
    pub actions: Vec<ActionRecord>,
    pub control: ControlState,
}

impl PublishedState {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            cycle: 0,
            published_at: now,
            metrics: None,
            trend: Vec::new(),
            hypothesis: None,
            last_decision: None,
            actions: Vec::new(),
            control: ControlState::initial(now),
        }
    }
}

pub struct StatePublisher {
    shared: Arc<ArcSwap<PublishedState>>,
}

impl StatePublisher {
    pub fn publish(&self, state: PublishedState) {
        self.shared.store(Arc::new(state));
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[derive(Clone)]
pub struct StateReader {
    shared: Arc<ArcSwap<PublishedState>>,
}

impl StateReader {
    pub fn current(&self) -> Arc<PublishedState> {
        self.shared.load_full()
    }
}

pub fn state_channel(initial: PublishedState) -> (StatePublisher, StateReader) {
    let shared = Arc::new(ArcSwap::from_pointee(initial));
    let reader = StateReader {
        shared: Arc::clone(&shared),
    };
    (StatePublisher { shared }, reader)
}
