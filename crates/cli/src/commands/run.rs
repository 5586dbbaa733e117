use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use payops_agent::hypothesis::HypothesisProvider;
use payops_agent::runtime::{AgentRuntime, CycleReport, RunSummary};
use payops_agent::sim::{Scenario, SimulatedNetwork, SimulatorConfig};
use payops_core::config::{AppConfig, ConfigOverrides, HypothesisBackend, LoadOptions, LoggingConfig};
use payops_core::domain::action::ActionOutcome;
use payops_core::domain::decision::ActionKind;
use payops_core::domain::learning::LearningSummary;

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub cycles: u64,
    pub scenario: String,
    pub seed: u64,
    pub config: Option<PathBuf>,
    pub auto_approve: bool,
    pub interval_ms: u64,
    pub backend: Option<String>,
    pub log_level: Option<String>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            cycles: 30,
            scenario: Scenario::IssuerOutage.as_str().to_string(),
            seed: 7,
            config: None,
            auto_approve: false,
            interval_ms: 0,
            backend: None,
            log_level: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    command: &'static str,
    status: &'static str,
    scenario: &'static str,
    seed: u64,
    cycles: u64,
    executed: u64,
    blocked: u64,
    skipped_cooldown: u64,
    escalated: u64,
    failed: u64,
    rolled_back: u64,
    final_mode: String,
    final_success_rate: Option<f64>,
    interrupted: bool,
    learning: LearningSummary,
}

pub async fn run(args: RunArgs) -> CommandResult {
    let backend_override =
        match args.backend.as_deref().map(str::parse::<HypothesisBackend>).transpose() {
            Ok(backend) => backend,
            Err(error) => {
                return CommandResult::failure("run", "config_validation", error.to_string(), 2)
            }
        };
    let overrides = ConfigOverrides {
        log_level: args.log_level.clone(),
        log_format: None,
        hypothesis_backend: backend_override,
        cooldown_secs: None,
        monitor_cycles: None,
    };
    let options = LoadOptions {
        config_path: args.config.clone(),
        require_file: args.config.is_some(),
        overrides,
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("run", "config_validation", error.to_string(), 2)
        }
    };

    let Some(scenario) = Scenario::parse(&args.scenario) else {
        return CommandResult::failure(
            "run",
            "invalid_scenario",
            format!(
                "unknown scenario `{}`; expected one of: {}",
                args.scenario,
                scenario_names()
            ),
            2,
        );
    };

    init_logging(&config.logging);

    if config.hypothesis.backend.is_model_backed() {
        tracing::warn!(
            backend = config.hypothesis.backend.as_str(),
            "no completion client is wired for model backends, using heuristic analysis"
        );
    }
    let provider = HypothesisProvider::heuristic(config.reasoner.clone());

    let network = SimulatedNetwork::new(
        SimulatorConfig::for_scenario(scenario, args.seed),
        config.observer.clone(),
    );
    let gateway = network.gateway();
    let mut runtime = AgentRuntime::new(&config, network, gateway, provider);
    let handle = runtime.handle();
    let reader = runtime.reader();

    println!(
        "driving {} cycles of `{}` (seed {}, backend {})",
        args.cycles,
        scenario,
        args.seed,
        config.hypothesis.backend.as_str()
    );

    let mut summary = RunSummary::default();
    let mut interrupted = false;
    for _ in 0..args.cycles {
        let report = runtime.run_cycle().await;
        summary.absorb(&report);
        println!("{}", cycle_line(&report));

        if args.auto_approve {
            if let Some(record) = &report.action {
                if record.outcome == ActionOutcome::PendingApproval {
                    println!("  auto-approving {}", record.id);
                    handle.approve(record.id.clone());
                }
            }
        }

        if args.interval_ms > 0 {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(args.interval_ms)) => {}
            }
        }
    }
    summary.learning = runtime.learning_summary();

    let state = reader.current();
    let report = RunReport {
        command: "run",
        status: "ok",
        scenario: scenario.as_str(),
        seed: args.seed,
        cycles: summary.cycles,
        executed: summary.executed,
        blocked: summary.blocked,
        skipped_cooldown: summary.skipped_cooldown,
        escalated: summary.escalated,
        failed: summary.failed,
        rolled_back: summary.rolled_back,
        final_mode: state.control.mode.to_string(),
        final_success_rate: state.metrics.as_ref().map(|m| m.overall_success_rate),
        interrupted,
        learning: summary.learning.clone(),
    };

    let human = format!(
        "run: {} cycles on `{}`: {} executed, {} blocked, {} skipped, {} escalated, {} rolled back; final mode {}",
        report.cycles,
        report.scenario,
        report.executed,
        report.blocked,
        report.skipped_cooldown,
        report.escalated,
        report.rolled_back,
        report.final_mode,
    );
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"run\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: 0, output: format!("{human}\n{machine}") }
}

fn cycle_line(report: &CycleReport) -> String {
    let mut line = format!("cycle {:03} mode={}", report.cycle, report.mode);
    match &report.metrics {
        Some(metrics) => line.push_str(&format!(
            " success={:.3} p95={:.0}ms retries={:.2}x",
            metrics.overall_success_rate, metrics.p95_latency_ms, metrics.retry_amplification
        )),
        None => line.push_str(" window=filling"),
    }
    if let Some(hypothesis) = &report.hypothesis {
        line.push_str(&format!(" cause={}({:.2})", hypothesis.cause, hypothesis.confidence));
    }
    if let Some(record) = &report.action {
        if record.decision.action != ActionKind::NoOp {
            line.push_str(&format!(
                " action={} {} -> {}",
                record.decision.action,
                record.decision.target_label(),
                record.outcome
            ));
        }
    }
    for resolved in &report.resolved_approvals {
        line.push_str(&format!(" resolved={} -> {}", resolved.id, resolved.outcome));
    }
    for rollback in &report.rollbacks {
        line.push_str(&format!(
            " rollback={} {}",
            rollback.decision.action,
            rollback.decision.target_label()
        ));
    }
    line
}

fn scenario_names() -> String {
    Scenario::ALL.map(|scenario| scenario.as_str()).join(", ")
}

fn init_logging(config: &LoggingConfig) {
    use payops_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);

    // try_init so repeat invocations in one process keep the first subscriber.
    let _ = match config.format {
        Compact => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .compact()
            .try_init(),
        Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .pretty()
            .try_init(),
        Json => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .json()
            .try_init(),
    };
}
