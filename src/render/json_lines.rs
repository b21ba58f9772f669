use super::{RenderFrame, RenderSurface};
use crate::error::AppError;
use std::io::Write;

/// Serializes every frame as a single JSON line.
pub struct JsonLinesSurface<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSurface<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RenderSurface for JsonLinesSurface<W> {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<(), AppError> {
        let line = simd_json::serde::to_string(frame)
            .map_err(|error| AppError::Render(format!("failed to encode frame: {error}")))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}
