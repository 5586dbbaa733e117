use payops_agent::runtime::SnapshotSource;
use payops_agent::sim::{Scenario, SimulatedNetwork, SimulatorConfig};
use payops_core::config::{AppConfig, HypothesisBackend, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

/// Checks that cannot run without a loaded configuration.
const CONFIG_DEPENDENT_CHECKS: [&str; 2] = ["hypothesis_backend", "simulator_determinism"];

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_hypothesis_backend(&config));
            checks.push(check_simulator_determinism(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in CONFIG_DEPENDENT_CHECKS {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_hypothesis_backend(config: &AppConfig) -> DoctorCheck {
    let details = match config.hypothesis.backend {
        HypothesisBackend::Heuristic => "heuristic analysis is always available".to_string(),
        backend => format!(
            "`{}` credentials validated by config contract; runtime falls back to heuristic until a completion client is wired",
            backend.as_str()
        ),
    };
    DoctorCheck { name: "hypothesis_backend", status: CheckStatus::Pass, details }
}

fn check_simulator_determinism(config: &AppConfig) -> DoctorCheck {
    let sim = SimulatorConfig::for_scenario(Scenario::Mixed, 7);
    let mut first = SimulatedNetwork::new(sim.clone(), config.observer.clone());
    let mut second = SimulatedNetwork::new(sim, config.observer.clone());

    for _ in 0..2 {
        let a = first.next_snapshot().map(|s| (s.sample_count, s.overall_success_rate));
        let b = second.next_snapshot().map(|s| (s.sample_count, s.overall_success_rate));
        if a != b {
            return DoctorCheck {
                name: "simulator_determinism",
                status: CheckStatus::Fail,
                details: "seeded replays diverged; scenario runs are not reproducible".to_string(),
            };
        }
    }

    DoctorCheck {
        name: "simulator_determinism",
        status: CheckStatus::Pass,
        details: "seeded replays produce identical traffic".to_string(),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
