//! medfind - medicine search service

use std::process::ExitCode;

use clap::Parser;

use medfind_server::{commands, telemetry, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose, cli.log_json);

    match commands::run(&cli.settings, &cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
