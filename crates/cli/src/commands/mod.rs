pub mod config;
pub mod doctor;
pub mod run;
pub mod scenarios;

use serde::Serialize;

/// What a subcommand hands back: a process exit code and the text already
/// rendered for stdout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Shared failure payload. Success output is command-specific (`run` ends
/// with a full report line), but every failure serializes this one shape so
/// scripts can always read `error_class`.
#[derive(Debug, Serialize)]
struct FailurePayload<'a> {
    command: &'a str,
    status: &'a str,
    error_class: &'a str,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = FailurePayload {
            command,
            status: "error",
            error_class,
            message: message.into(),
        };
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{command}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code, output }
    }
}
