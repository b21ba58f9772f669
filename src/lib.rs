pub mod config;
pub mod error;
pub mod logging;
pub mod market;
pub mod render;
pub mod state;

use config::{OutputFormat, TickerConfig};
use error::AppError;
use market::pipeline::run_ticker_pipeline;
use render::{JsonLinesSurface, LogSurface, RenderSurface};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the ticker until Ctrl-C.
pub async fn run(config: TickerConfig) -> Result<(), AppError> {
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    let signal_handle = tokio::spawn(async move {
        let outcome = tokio::signal::ctrl_c().await;
        signal_cancel.cancel();
        outcome
    });

    let surface: Box<dyn RenderSurface> = match config.output {
        OutputFormat::Log => Box::new(LogSurface),
        OutputFormat::Json => Box::new(JsonLinesSurface::new(std::io::stdout())),
    };

    info!(
        symbol = %config.symbol,
        window_secs = config.window.num_seconds(),
        refresh_ms = config.refresh_interval.as_millis() as u64,
        y_tick = config.y_tick,
        mock_mode = config.mock_mode,
        "starting ticker window"
    );

    run_ticker_pipeline(&config, surface, cancel).await;

    match signal_handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(AppError::Io(error)),
        Err(error) => {
            warn!(%error, "signal task ended abnormally");
            Ok(())
        }
    }
}
