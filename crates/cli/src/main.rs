use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    payops_cli::run().await
}
