pub mod config;
pub mod control;
pub mod decision;
pub mod domain;
pub mod executor;
pub mod history;
pub mod learner;
pub mod observer;
pub mod reasoner;
pub mod store;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, HypothesisBackend, HypothesisConfig, LoadOptions,
    LogFormat, LoggingConfig,
};
pub use control::{ControlConfig, ControlState, CooldownEntry, EscalationRef, SystemMode};
pub use decision::{DecisionConfig, DecisionEngine};
pub use domain::action::{ActionId, ActionOutcome, ActionRecord, GuardrailFlag};
pub use domain::decision::{ActionKind, ActionTarget, Decision};
pub use domain::event::{ErrorCode, PaymentEvent, PaymentOutcome};
pub use domain::hypothesis::{Hypothesis, HypothesisOrigin, RootCause};
pub use domain::learning::{
    CautionEntry, EffectivenessEntry, EffectivenessStats, LearningBias, LearningRecord,
    LearningSummary, OutcomeClass,
};
pub use domain::metrics::{MetricsSnapshot, WindowId};
pub use executor::{
    ActionBackend, BackendError, EscalationVerdict, Executor, ExecutorError, GuardrailConfig,
    MonitorResolution,
};
pub use history::ActionLog;
pub use learner::{Learner, LearnerConfig};
pub use observer::{Observer, ObserverConfig};
pub use reasoner::{HeuristicReasoner, ReasonerConfig};
pub use store::{PublishedState, StatePublisher, StateReader, TrendPoint};
