//! The rendering seam.
//!
//! The engine never draws. After every recomputation it hands a
//! [`ViewModel`] to a [`Renderer`], which may lay it out however it likes.
//! Two renderers ship with the crate: one that writes JSON lines and one
//! that records frames in memory.

use std::io::Write;

use serde::Serialize;

use crate::aggregate::AggregateView;
use crate::risk::ClimateParameters;

/// Why a view model was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderReason {
    /// Initial render after the dataset was loaded.
    Startup,
    SceneEnter,
    AnimationTick,
    Slider,
    Filter,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    /// Monotonic frame counter.
    pub sequence: u64,
    pub reason: RenderReason,
    pub step: Option<u32>,
    pub params: ClimateParameters,
    pub included_taxa: Vec<String>,
    pub filtered: bool,
    pub view: AggregateView,
}

/// Consumer of view models.
///
/// Calling `render` repeatedly with the same view must be safe.
pub trait Renderer {
    fn render(&mut self, view: &ViewModel);
}

/// Writes each view model as one JSON object per line.
pub struct JsonLinesRenderer<W: Write> {
    writer: W,
    failures: usize,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, failures: 0 }
    }

    /// Number of frames that could not be written.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Flush buffered frames and hand back the writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, view: &ViewModel) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, view)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn render(&mut self, view: &ViewModel) {
        if let Err(e) = self.write_frame(view) {
            self.failures += 1;
            if self.failures == 1 {
                log::error!("Failed to write view model {}: {}", view.sequence, e);
            }
        }
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<ViewModel>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&ViewModel> {
        self.frames.last()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, view: &ViewModel) {
        self.frames.push(view.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{recompute, ViewKind};
    use crate::species::{distinct_taxa, SpeciesRecord};

    fn frame(sequence: u64) -> ViewModel {
        let records = vec![SpeciesRecord::new("aves", 0.5, 1.0, 0.0, 0.0)];
        let taxa = distinct_taxa(&records);
        let params = ClimateParameters::new(2.0, 0.0, 0.0);
        ViewModel {
            sequence,
            reason: RenderReason::Slider,
            step: Some(6),
            params,
            included_taxa: taxa.iter().cloned().collect(),
            filtered: true,
            view: recompute(&records, &taxa, &params, ViewKind::CategoryByTaxon),
        }
    }

    #[test]
    fn test_json_lines_one_object_per_frame() {
        let mut renderer = JsonLinesRenderer::new(Vec::new());
        renderer.render(&frame(0));
        renderer.render(&frame(1));
        assert_eq!(renderer.failures(), 0);

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["reason"], "slider");
        assert_eq!(first["params"]["temp"], 2.0);
        assert_eq!(first["view"]["kind"], "categoryByTaxon");
        assert_eq!(first["view"]["totals"]["VU"], 1);
    }

    /// Counts flushes so buffering can be observed.
    #[derive(Default)]
    struct CountingWriter {
        bytes: Vec<u8>,
        flushes: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_flushes_once_on_finish() {
        let mut renderer = JsonLinesRenderer::new(CountingWriter::default());
        for sequence in 0..5 {
            renderer.render(&frame(sequence));
        }
        let writer = renderer.finish().unwrap();
        assert_eq!(writer.flushes, 1);
        assert_eq!(String::from_utf8(writer.bytes).unwrap().lines().count(), 5);
    }

    #[test]
    fn test_recording_renderer_is_idempotent() {
        let mut renderer = RecordingRenderer::new();
        let view = frame(3);
        renderer.render(&view);
        renderer.render(&view);
        assert_eq!(renderer.frames.len(), 2);
        assert_eq!(renderer.frames[0], renderer.frames[1]);
        assert_eq!(renderer.last().map(|f| f.sequence), Some(3));
    }
}
