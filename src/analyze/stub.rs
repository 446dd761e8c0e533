use anyhow::{anyhow, Result};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use super::analyzer::{AnalysisCapability, AnalysisRequest, CueAnalyzer, CueStream};
use crate::camera::CaptureMode;
use crate::cue::{CueCategory, NavigationCue};
use crate::frame::Frame;

/// Mean luminance below which the view is reported as too dark.
const DARK_LUMINANCE: f32 = 28.0;

/// Offline analyzer for tests and demos.
///
/// Hashes the latest frame to notice scene changes, checks exposure, and
/// streams a canned message word by word, followed by an empty final chunk.
pub struct StubAnalyzer {
    last_hash: Mutex<Option<[u8; 32]>>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self {
            last_hash: Mutex::new(None),
        }
    }

    fn scene_changed(&self, frame: &Frame) -> bool {
        let current: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let mut last = self.last_hash.lock().unwrap_or_else(|e| e.into_inner());
        let changed = match *last {
            Some(prev) => prev != current,
            None => true,
        };
        if changed {
            log::debug!("stub analyzer: scene {}", hex::encode(&current[..4]));
        }
        *last = Some(current);
        changed
    }
}

impl Default for StubAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CueAnalyzer for StubAnalyzer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: AnalysisCapability) -> bool {
        matches!(
            capability,
            AnalysisCapability::Navigation
                | AnalysisCapability::TextReading
                | AnalysisCapability::SceneDescription
        )
    }

    fn analyze(&self, request: AnalysisRequest) -> Result<CueStream> {
        let latest = request
            .frames
            .last()
            .ok_or_else(|| anyhow!("analysis request carries no frames"))?;

        let (category, message) = if latest.mean_luminance(8) < DARK_LUMINANCE {
            (
                CueCategory::Critical,
                "Camera view is too dark. Stop and check your surroundings.".to_string(),
            )
        } else {
            match request.mode {
                CaptureMode::TextReading => (
                    CueCategory::Informational,
                    match request.prompt.as_deref() {
                        Some(prompt) if !prompt.trim().is_empty() => {
                            format!("No readable text found for: {}", prompt.trim())
                        }
                        _ => "No readable text found.".to_string(),
                    },
                ),
                CaptureMode::PhotoCapture => (
                    CueCategory::Informational,
                    format!("Photo taken at {}x{}.", latest.width, latest.height),
                ),
                CaptureMode::Off | CaptureMode::Navigation => {
                    if self.scene_changed(latest) {
                        (
                            CueCategory::Informational,
                            "Scene changed ahead. Proceed with care.".to_string(),
                        )
                    } else {
                        (CueCategory::Ambient, "Path ahead unchanged.".to_string())
                    }
                }
            }
        };

        Ok(futures::stream::iter(stream_chunks(category, &message)).boxed())
    }
}

/// Split `message` into word chunks and close with an empty final chunk.
fn stream_chunks(category: CueCategory, message: &str) -> Vec<NavigationCue> {
    let words: Vec<&str> = message.split_whitespace().collect();
    let mut chunks = Vec::with_capacity(words.len() + 1);
    for (i, word) in words.iter().enumerate() {
        let text = if i + 1 < words.len() {
            format!("{} ", word)
        } else {
            (*word).to_string()
        };
        chunks.push(NavigationCue::new(category, text, false));
    }
    chunks.push(NavigationCue::new(category, "", true));
    chunks
}
