pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::run::RunArgs;

#[derive(Debug, Parser)]
#[command(
    name = "payops",
    about = "Payops remediation agent CLI",
    long_about = "Drive the autonomous remediation loop against simulated payment traffic, \
                  inspect configuration, and run readiness checks.",
    after_help = "Examples:\n  payops run --scenario issuer-outage --cycles 30\n  payops run --scenario mixed --auto-approve --interval-ms 250\n  payops doctor --json\n  payops config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Drive the remediation loop against a scripted fault scenario")]
    Run {
        #[arg(long, default_value_t = 30, help = "Number of control cycles to drive")]
        cycles: u64,
        #[arg(
            long,
            default_value = "issuer-outage",
            help = "Fault scenario to replay (see `payops scenarios`)"
        )]
        scenario: String,
        #[arg(long, default_value_t = 7, help = "Seed for the deterministic traffic generator")]
        seed: u64,
        #[arg(long, value_name = "PATH", help = "Path to payops.toml (must exist when set)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Approve escalations automatically instead of holding them")]
        auto_approve: bool,
        #[arg(
            long,
            default_value_t = 0,
            value_name = "MS",
            help = "Pause between cycles; 0 runs flat out"
        )]
        interval_ms: u64,
        #[arg(long, help = "Override the hypothesis backend (heuristic|openai|anthropic|ollama)")]
        backend: Option<String>,
        #[arg(long, help = "Override the logging level (trace|debug|info|warn|error)")]
        log_level: Option<String>,
    },
    #[command(about = "List scripted fault scenarios and their fault timelines")]
    Scenarios,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, hypothesis backend, and simulator reproducibility")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            cycles,
            scenario,
            seed,
            config,
            auto_approve,
            interval_ms,
            backend,
            log_level,
        } => {
            commands::run::run(RunArgs {
                cycles,
                scenario,
                seed,
                config,
                auto_approve,
                interval_ms,
                backend,
                log_level,
            })
            .await
        }
        Command::Scenarios => {
            commands::CommandResult { exit_code: 0, output: commands::scenarios::run() }
        }
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
