use anyhow::Result;
use futures::stream::BoxStream;

use crate::camera::CaptureMode;
use crate::cue::NavigationCue;
use crate::frame::Frame;

/// Streamed analyzer output: partial chunks, then a chunk with `is_done`.
pub type CueStream = BoxStream<'static, NavigationCue>;

/// What an analyzer is able to answer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisCapability {
    Navigation,
    TextReading,
    SceneDescription,
}

impl AnalysisCapability {
    /// Capability needed to serve frames captured in `mode`.
    pub fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::TextReading => AnalysisCapability::TextReading,
            CaptureMode::PhotoCapture => AnalysisCapability::SceneDescription,
            CaptureMode::Off | CaptureMode::Navigation => AnalysisCapability::Navigation,
        }
    }
}

/// Frames chosen by the selector plus an optional user prompt.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    /// At most two frames, older first.
    pub frames: Vec<Frame>,
    pub prompt: Option<String>,
    pub mode: CaptureMode,
}

/// Vision/language analyzer seam.
///
/// Inference happens outside this crate. `analyze` should return quickly with
/// a lazy stream; the pipeline holds its admission slot until the stream ends.
pub trait CueAnalyzer: Send + Sync {
    /// Analyzer identifier.
    fn name(&self) -> &'static str;

    fn supports(&self, capability: AnalysisCapability) -> bool;

    fn analyze(&self, request: AnalysisRequest) -> Result<CueStream>;
}
