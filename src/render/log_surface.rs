use super::{RenderFrame, RenderSurface};
use crate::error::AppError;
use tracing::info;

/// Writes one structured log event per frame.
#[derive(Debug, Default)]
pub struct LogSurface;

impl RenderSurface for LogSurface {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<(), AppError> {
        info!(
            target: "ticker_window::frame",
            symbol = frame.symbol,
            points = frame.series.len(),
            x_start = %frame.range.x_start,
            x_end = %frame.range.x_end,
            y_min = frame.range.y_min,
            y_max = frame.range.y_max,
            latest = %frame.endpoint.label,
            "frame"
        );
        Ok(())
    }
}
