use clap::Parser;
use std::process::ExitCode;
use ticker_window::config::StartTickerArgs;
use ticker_window::logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let args = StartTickerArgs::parse();
    init_tracing(args.log_json);

    let config = match args.normalize() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match ticker_window::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "ticker window failed");
            ExitCode::FAILURE
        }
    }
}
