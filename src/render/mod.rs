pub mod json_lines;
pub mod log_surface;

use crate::error::AppError;
use crate::market::types::{DisplayRange, EndpointAnnotation, Observation};
use serde::Serialize;

pub use json_lines::JsonLinesSurface;
pub use log_surface::LogSurface;

/// Everything a surface needs to redraw the chart once.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame<'a> {
    pub symbol: &'a str,
    pub series: &'a [Observation],
    pub range: DisplayRange,
    pub endpoint: EndpointAnnotation,
}

impl<'a> RenderFrame<'a> {
    /// Builds a frame from the current series. Returns `None` when there is
    /// nothing to draw.
    pub fn new(symbol: &'a str, series: &'a [Observation], range: DisplayRange) -> Option<Self> {
        let latest = *series.last()?;
        Some(Self {
            symbol,
            series,
            range,
            endpoint: EndpointAnnotation::for_point(latest),
        })
    }
}

pub trait RenderSurface: Send {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<(), AppError>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for Box<S> {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<(), AppError> {
        (**self).render(frame)
    }
}
