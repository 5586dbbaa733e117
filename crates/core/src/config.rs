use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::ControlConfig;
use crate::decision::DecisionConfig;
use crate::executor::GuardrailConfig;
use crate::learner::LearnerConfig;
use crate::observer::ObserverConfig;
use crate::reasoner::ReasonerConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub observer: ObserverConfig,
    pub reasoner: ReasonerConfig,
    pub decision: DecisionConfig,
    pub guardrails: GuardrailConfig,
    pub learner: LearnerConfig,
    pub control: ControlConfig,
    pub hypothesis: HypothesisConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct HypothesisConfig {
    pub backend: HypothesisBackend,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisBackend {
    Heuristic,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl HypothesisBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }

    pub fn is_model_backed(&self) -> bool {
        !matches!(self, Self::Heuristic)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub hypothesis_backend: Option<HypothesisBackend>,
    pub cooldown_secs: Option<i64>,
    pub monitor_cycles: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            observer: ObserverConfig::default(),
            reasoner: ReasonerConfig::default(),
            decision: DecisionConfig::default(),
            guardrails: GuardrailConfig::default(),
            learner: LearnerConfig::default(),
            control: ControlConfig::default(),
            hypothesis: HypothesisConfig {
                backend: HypothesisBackend::Heuristic,
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                timeout_ms: 8_000,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for HypothesisBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported hypothesis backend `{other}` (expected heuristic|openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("payops.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(observer) = patch.observer {
            if let Some(window_size) = observer.window_size {
                self.observer.window_size = window_size;
            }
            if let Some(min_samples) = observer.min_samples {
                self.observer.min_samples = min_samples;
            }
        }

        if let Some(reasoner) = patch.reasoner {
            if let Some(threshold) = reasoner.issuer_degradation_threshold {
                self.reasoner.issuer_degradation_threshold = threshold;
            }
            if let Some(amplification) = reasoner.storm_amplification {
                self.reasoner.storm_amplification = amplification;
            }
            if let Some(threshold) = reasoner.merchant_noise_threshold {
                self.reasoner.merchant_noise_threshold = threshold;
            }
            if let Some(min_actionable_samples) = reasoner.min_actionable_samples {
                self.reasoner.min_actionable_samples = min_actionable_samples;
            }
        }

        if let Some(decision) = patch.decision {
            if let Some(min_confidence) = decision.min_confidence {
                self.decision.min_confidence = min_confidence;
            }
            if let Some(threshold) = decision.approval_risk_threshold {
                self.decision.approval_risk_threshold = threshold;
            }
            if let Some(streak) = decision.handover_hurt_streak {
                self.decision.handover_hurt_streak = streak;
            }
            if let Some(rate) = decision.severity_reference_rate {
                self.decision.severity_reference_rate = rate;
            }
            if let Some(weight) = decision.severity_weight {
                self.decision.severity_weight = weight;
            }
            if let Some(discount) = decision.confidence_discount {
                self.decision.confidence_discount = discount;
            }
        }

        if let Some(guardrails) = patch.guardrails {
            if let Some(cooldown_secs) = guardrails.cooldown_secs {
                self.guardrails.cooldown_secs = cooldown_secs;
            }
            if let Some(monitor_cycles) = guardrails.monitor_cycles {
                self.guardrails.monitor_cycles = monitor_cycles;
            }
            if let Some(max_auto_risk) = guardrails.max_auto_risk {
                self.guardrails.max_auto_risk = max_auto_risk;
            }
            if let Some(drop) = guardrails.regression_success_drop {
                self.guardrails.regression_success_drop = drop;
            }
            if let Some(rise) = guardrails.regression_latency_rise {
                self.guardrails.regression_latency_rise = rise;
            }
        }

        if let Some(learner) = patch.learner {
            if let Some(effect) = learner.min_success_effect {
                self.learner.min_success_effect = effect;
            }
            if let Some(effect) = learner.min_cost_effect {
                self.learner.min_cost_effect = effect;
            }
            if let Some(effect) = learner.min_retry_effect {
                self.learner.min_retry_effect = effect;
            }
            if let Some(step) = learner.bias_step {
                self.learner.bias_step = step;
            }
            if let Some(cap) = learner.bias_cap {
                self.learner.bias_cap = cap;
            }
            if let Some(decay) = learner.bias_decay {
                self.learner.bias_decay = decay;
            }
            if let Some(max_records) = learner.max_records {
                self.learner.max_records = max_records;
            }
        }

        if let Some(control) = patch.control {
            if let Some(rate) = control.degraded_success_rate {
                self.control.degraded_success_rate = rate;
            }
        }

        if let Some(hypothesis) = patch.hypothesis {
            if let Some(backend) = hypothesis.backend {
                self.hypothesis.backend = backend;
            }
            if let Some(model) = hypothesis.model {
                self.hypothesis.model = model;
            }
            if let Some(hypothesis_api_key_value) = hypothesis.api_key {
                self.hypothesis.api_key = Some(secret_value(hypothesis_api_key_value));
            }
            if let Some(base_url) = hypothesis.base_url {
                self.hypothesis.base_url = Some(base_url);
            }
            if let Some(timeout_ms) = hypothesis.timeout_ms {
                self.hypothesis.timeout_ms = timeout_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PAYOPS_OBSERVER_WINDOW_SIZE") {
            self.observer.window_size = parse_usize("PAYOPS_OBSERVER_WINDOW_SIZE", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_OBSERVER_MIN_SAMPLES") {
            self.observer.min_samples = parse_usize("PAYOPS_OBSERVER_MIN_SAMPLES", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_REASONER_ISSUER_THRESHOLD") {
            self.reasoner.issuer_degradation_threshold =
                parse_f64("PAYOPS_REASONER_ISSUER_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_REASONER_STORM_AMPLIFICATION") {
            self.reasoner.storm_amplification =
                parse_f64("PAYOPS_REASONER_STORM_AMPLIFICATION", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_REASONER_MERCHANT_THRESHOLD") {
            self.reasoner.merchant_noise_threshold =
                parse_f64("PAYOPS_REASONER_MERCHANT_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_REASONER_MIN_SAMPLES") {
            self.reasoner.min_actionable_samples =
                parse_usize("PAYOPS_REASONER_MIN_SAMPLES", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_DECISION_MIN_CONFIDENCE") {
            self.decision.min_confidence = parse_f64("PAYOPS_DECISION_MIN_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_DECISION_APPROVAL_RISK_THRESHOLD") {
            self.decision.approval_risk_threshold =
                parse_f64("PAYOPS_DECISION_APPROVAL_RISK_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_DECISION_HANDOVER_HURT_STREAK") {
            self.decision.handover_hurt_streak =
                parse_u32("PAYOPS_DECISION_HANDOVER_HURT_STREAK", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_GUARDRAIL_COOLDOWN_SECS") {
            self.guardrails.cooldown_secs = parse_i64("PAYOPS_GUARDRAIL_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_GUARDRAIL_MONITOR_CYCLES") {
            self.guardrails.monitor_cycles = parse_u32("PAYOPS_GUARDRAIL_MONITOR_CYCLES", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_GUARDRAIL_MAX_AUTO_RISK") {
            self.guardrails.max_auto_risk = parse_f64("PAYOPS_GUARDRAIL_MAX_AUTO_RISK", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_GUARDRAIL_REGRESSION_SUCCESS_DROP") {
            self.guardrails.regression_success_drop =
                parse_f64("PAYOPS_GUARDRAIL_REGRESSION_SUCCESS_DROP", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_GUARDRAIL_REGRESSION_LATENCY_RISE") {
            self.guardrails.regression_latency_rise =
                parse_f64("PAYOPS_GUARDRAIL_REGRESSION_LATENCY_RISE", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_LEARNER_BIAS_STEP") {
            self.learner.bias_step = parse_f64("PAYOPS_LEARNER_BIAS_STEP", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_LEARNER_BIAS_CAP") {
            self.learner.bias_cap = parse_f64("PAYOPS_LEARNER_BIAS_CAP", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_LEARNER_BIAS_DECAY") {
            self.learner.bias_decay = parse_f64("PAYOPS_LEARNER_BIAS_DECAY", &value)?;
        }
        if let Some(value) = read_env("PAYOPS_LEARNER_MAX_RECORDS") {
            self.learner.max_records = parse_usize("PAYOPS_LEARNER_MAX_RECORDS", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_CONTROL_DEGRADED_SUCCESS_RATE") {
            self.control.degraded_success_rate =
                parse_f64("PAYOPS_CONTROL_DEGRADED_SUCCESS_RATE", &value)?;
        }

        if let Some(value) = read_env("PAYOPS_HYPOTHESIS_BACKEND") {
            self.hypothesis.backend = value.parse()?;
        }
        if let Some(value) = read_env("PAYOPS_HYPOTHESIS_MODEL") {
            self.hypothesis.model = value;
        }
        if let Some(value) = read_env("PAYOPS_HYPOTHESIS_API_KEY") {
            self.hypothesis.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAYOPS_HYPOTHESIS_BASE_URL") {
            self.hypothesis.base_url = Some(value);
        }
        if let Some(value) = read_env("PAYOPS_HYPOTHESIS_TIMEOUT_MS") {
            self.hypothesis.timeout_ms = parse_u64("PAYOPS_HYPOTHESIS_TIMEOUT_MS", &value)?;
        }

        let log_level = read_env("PAYOPS_LOGGING_LEVEL").or_else(|| read_env("PAYOPS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAYOPS_LOGGING_FORMAT").or_else(|| read_env("PAYOPS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(backend) = overrides.hypothesis_backend {
            self.hypothesis.backend = backend;
        }
        if let Some(cooldown_secs) = overrides.cooldown_secs {
            self.guardrails.cooldown_secs = cooldown_secs;
        }
        if let Some(monitor_cycles) = overrides.monitor_cycles {
            self.guardrails.monitor_cycles = monitor_cycles;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_observer(&self.observer)?;
        validate_reasoner(&self.reasoner)?;
        validate_decision(&self.decision)?;
        validate_guardrails(&self.guardrails)?;
        validate_learner(&self.learner)?;
        validate_control(&self.control)?;
        validate_hypothesis(&self.hypothesis)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("payops.toml"), PathBuf::from("config/payops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_observer(observer: &ObserverConfig) -> Result<(), ConfigError> {
    if observer.window_size == 0 {
        return Err(ConfigError::Validation(
            "observer.window_size must be greater than zero".to_string(),
        ));
    }
    if observer.min_samples == 0 || observer.min_samples > observer.window_size {
        return Err(ConfigError::Validation(
            "observer.min_samples must be in range 1..=observer.window_size".to_string(),
        ));
    }
    Ok(())
}

fn validate_reasoner(reasoner: &ReasonerConfig) -> Result<(), ConfigError> {
    validate_rate("reasoner.issuer_degradation_threshold", reasoner.issuer_degradation_threshold)?;
    validate_rate("reasoner.merchant_noise_threshold", reasoner.merchant_noise_threshold)?;
    if reasoner.storm_amplification < 1.0 {
        return Err(ConfigError::Validation(
            "reasoner.storm_amplification must be at least 1.0".to_string(),
        ));
    }
    if reasoner.min_actionable_samples == 0 {
        return Err(ConfigError::Validation(
            "reasoner.min_actionable_samples must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_decision(decision: &DecisionConfig) -> Result<(), ConfigError> {
    validate_rate("decision.min_confidence", decision.min_confidence)?;
    validate_rate("decision.approval_risk_threshold", decision.approval_risk_threshold)?;
    validate_rate("decision.severity_reference_rate", decision.severity_reference_rate)?;
    if !(0.0..=1.0).contains(&decision.severity_weight) {
        return Err(ConfigError::Validation(
            "decision.severity_weight must be in range 0.0..=1.0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&decision.confidence_discount) {
        return Err(ConfigError::Validation(
            "decision.confidence_discount must be in range 0.0..=1.0".to_string(),
        ));
    }
    if decision.handover_hurt_streak == 0 {
        return Err(ConfigError::Validation(
            "decision.handover_hurt_streak must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_guardrails(guardrails: &GuardrailConfig) -> Result<(), ConfigError> {
    if guardrails.cooldown_secs <= 0 || guardrails.cooldown_secs > 3_600 {
        return Err(ConfigError::Validation(
            "guardrails.cooldown_secs must be in range 1..=3600".to_string(),
        ));
    }
    if guardrails.monitor_cycles == 0 {
        return Err(ConfigError::Validation(
            "guardrails.monitor_cycles must be greater than zero".to_string(),
        ));
    }
    validate_rate("guardrails.max_auto_risk", guardrails.max_auto_risk)?;
    if guardrails.regression_success_drop <= 0.0 {
        return Err(ConfigError::Validation(
            "guardrails.regression_success_drop must be greater than zero".to_string(),
        ));
    }
    if guardrails.regression_latency_rise <= 0.0 {
        return Err(ConfigError::Validation(
            "guardrails.regression_latency_rise must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_learner(learner: &LearnerConfig) -> Result<(), ConfigError> {
    if learner.min_success_effect <= 0.0
        || learner.min_cost_effect <= 0.0
        || learner.min_retry_effect <= 0.0
    {
        return Err(ConfigError::Validation(
            "learner effect thresholds must be greater than zero".to_string(),
        ));
    }
    if learner.bias_step <= 0.0 {
        return Err(ConfigError::Validation(
            "learner.bias_step must be greater than zero".to_string(),
        ));
    }
    if learner.bias_cap < learner.bias_step {
        return Err(ConfigError::Validation(
            "learner.bias_cap must be at least learner.bias_step".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&learner.bias_decay) {
        return Err(ConfigError::Validation(
            "learner.bias_decay must be in range 0.0..=1.0".to_string(),
        ));
    }
    if learner.max_records == 0 {
        return Err(ConfigError::Validation(
            "learner.max_records must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_control(control: &ControlConfig) -> Result<(), ConfigError> {
    validate_rate("control.degraded_success_rate", control.degraded_success_rate)
}

fn validate_hypothesis(hypothesis: &HypothesisConfig) -> Result<(), ConfigError> {
    if hypothesis.timeout_ms == 0 || hypothesis.timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "hypothesis.timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    match hypothesis.backend {
        HypothesisBackend::OpenAi | HypothesisBackend::Anthropic => {
            let missing = hypothesis
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "hypothesis.api_key is required for openai/anthropic backends".to_string(),
                ));
            }
        }
        HypothesisBackend::Ollama => {
            let missing = hypothesis
                .base_url
                .as_ref()
                .map(|value| value.trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "hypothesis.base_url is required for the ollama backend".to_string(),
                ));
            }
        }
        HypothesisBackend::Heuristic => {}
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_rate(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{name} must be in range (0.0, 1.0]")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    observer: Option<ObserverPatch>,
    reasoner: Option<ReasonerPatch>,
    decision: Option<DecisionPatch>,
    guardrails: Option<GuardrailPatch>,
    learner: Option<LearnerPatch>,
    control: Option<ControlPatch>,
    hypothesis: Option<HypothesisPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ObserverPatch {
    window_size: Option<usize>,
    min_samples: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasonerPatch {
    issuer_degradation_threshold: Option<f64>,
    storm_amplification: Option<f64>,
    merchant_noise_threshold: Option<f64>,
    min_actionable_samples: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DecisionPatch {
    min_confidence: Option<f64>,
    approval_risk_threshold: Option<f64>,
    handover_hurt_streak: Option<u32>,
    severity_reference_rate: Option<f64>,
    severity_weight: Option<f64>,
    confidence_discount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardrailPatch {
    cooldown_secs: Option<i64>,
    monitor_cycles: Option<u32>,
    max_auto_risk: Option<f64>,
    regression_success_drop: Option<f64>,
    regression_latency_rise: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LearnerPatch {
    min_success_effect: Option<f64>,
    min_cost_effect: Option<f64>,
    min_retry_effect: Option<f64>,
    bias_step: Option<f64>,
    bias_cap: Option<f64>,
    bias_decay: Option<f64>,
    max_records: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ControlPatch {
    degraded_success_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct HypothesisPatch {
    backend: Option<HypothesisBackend>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
