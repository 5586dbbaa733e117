use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use payops_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "observer.window_size",
        &config.observer.window_size.to_string(),
        source("observer.window_size", Some("PAYOPS_OBSERVER_WINDOW_SIZE")),
    ));
    lines.push(render_line(
        "observer.min_samples",
        &config.observer.min_samples.to_string(),
        source("observer.min_samples", Some("PAYOPS_OBSERVER_MIN_SAMPLES")),
    ));
    lines.push(render_line(
        "decision.min_confidence",
        &config.decision.min_confidence.to_string(),
        source("decision.min_confidence", Some("PAYOPS_DECISION_MIN_CONFIDENCE")),
    ));
    lines.push(render_line(
        "decision.approval_risk_threshold",
        &config.decision.approval_risk_threshold.to_string(),
        source(
            "decision.approval_risk_threshold",
            Some("PAYOPS_DECISION_APPROVAL_RISK_THRESHOLD"),
        ),
    ));
    lines.push(render_line(
        "guardrails.cooldown_secs",
        &config.guardrails.cooldown_secs.to_string(),
        source("guardrails.cooldown_secs", Some("PAYOPS_GUARDRAIL_COOLDOWN_SECS")),
    ));
    lines.push(render_line(
        "guardrails.monitor_cycles",
        &config.guardrails.monitor_cycles.to_string(),
        source("guardrails.monitor_cycles", Some("PAYOPS_GUARDRAIL_MONITOR_CYCLES")),
    ));
    lines.push(render_line(
        "guardrails.max_auto_risk",
        &config.guardrails.max_auto_risk.to_string(),
        source("guardrails.max_auto_risk", Some("PAYOPS_GUARDRAIL_MAX_AUTO_RISK")),
    ));
    lines.push(render_line(
        "learner.bias_step",
        &config.learner.bias_step.to_string(),
        source("learner.bias_step", Some("PAYOPS_LEARNER_BIAS_STEP")),
    ));
    lines.push(render_line(
        "learner.bias_cap",
        &config.learner.bias_cap.to_string(),
        source("learner.bias_cap", Some("PAYOPS_LEARNER_BIAS_CAP")),
    ));
    lines.push(render_line(
        "control.degraded_success_rate",
        &config.control.degraded_success_rate.to_string(),
        source("control.degraded_success_rate", Some("PAYOPS_CONTROL_DEGRADED_SUCCESS_RATE")),
    ));
    lines.push(render_line(
        "hypothesis.backend",
        config.hypothesis.backend.as_str(),
        source("hypothesis.backend", Some("PAYOPS_HYPOTHESIS_BACKEND")),
    ));
    lines.push(render_line(
        "hypothesis.model",
        &config.hypothesis.model,
        source("hypothesis.model", Some("PAYOPS_HYPOTHESIS_MODEL")),
    ));

    let api_key = if config.hypothesis.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "hypothesis.api_key",
        api_key,
        source("hypothesis.api_key", Some("PAYOPS_HYPOTHESIS_API_KEY")),
    ));
    lines.push(render_line(
        "hypothesis.base_url",
        config.hypothesis.base_url.as_deref().unwrap_or("<unset>"),
        source("hypothesis.base_url", Some("PAYOPS_HYPOTHESIS_BASE_URL")),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("PAYOPS_LOGGING_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", Some("PAYOPS_LOGGING_FORMAT")),
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("payops.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/payops.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
