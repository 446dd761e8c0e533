use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::admission::DEFAULT_MIN_INTERVAL_MS;
use crate::capture::{FrameWaiter, DEFAULT_BURST_ATTEMPT_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::cue::FoldPolicy;
use crate::frame::{DEFAULT_BUFFER_FRAMES, DEFAULT_RETENTION_MS};
use crate::ingest::SourceConfig;
use crate::quality::{SharpnessConfig, DEFAULT_SHARPNESS_STRIDE, DEFAULT_SHARPNESS_THRESHOLD};
use crate::select::{FrameSelector, DEFAULT_MOTION_WINDOW_MS, DEFAULT_SEARCH_RADIUS};

const DEFAULT_FRAME_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_BURST_FRAMES: usize = 3;
const DEFAULT_BURST_INTERVAL_MS: u64 = 300;
const DEFAULT_SPEECH_RATE: f32 = 1.0;
const MAX_SPEECH_RATE: f32 = 4.0;
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 15;
const DEFAULT_SOURCE_WIDTH: u32 = 320;
const DEFAULT_SOURCE_HEIGHT: u32 = 240;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    admission: Option<AdmissionConfigFile>,
    selection: Option<SelectionConfigFile>,
    capture: Option<CaptureConfigFile>,
    buffer: Option<BufferConfigFile>,
    cues: Option<CueConfigFile>,
    speech: Option<SpeechConfigFile>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AdmissionConfigFile {
    min_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SelectionConfigFile {
    motion_window_ms: Option<u64>,
    search_radius: Option<usize>,
    sharpness_stride: Option<u32>,
    sharpness_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    poll_interval_ms: Option<u64>,
    burst_attempt_timeout_ms: Option<u64>,
    frame_timeout_ms: Option<u64>,
    burst_frames: Option<usize>,
    burst_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct BufferConfigFile {
    max_frames: Option<usize>,
    retention_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CueConfigFile {
    session_fold: Option<FoldPolicy>,
    answer_fold: Option<FoldPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    enabled: Option<bool>,
    rate: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub min_frame_interval_ms: u64,
    pub selection: FrameSelector,
    pub capture: CaptureSettings,
    pub buffer: BufferSettings,
    pub cues: CueSettings,
    pub speech: SpeechSettings,
    pub source: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub poll_interval: Duration,
    pub burst_attempt_timeout: Duration,
    /// Per-frame wait used by the continuous pipeline.
    pub frame_timeout: Duration,
    /// Frames captured for a one-shot text reading.
    pub burst_frames: usize,
    pub burst_interval: Duration,
}

impl CaptureSettings {
    pub fn waiter(&self) -> FrameWaiter {
        FrameWaiter {
            poll_interval: self.poll_interval,
            burst_attempt_timeout: self.burst_attempt_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferSettings {
    pub max_frames: usize,
    pub retention_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CueSettings {
    pub session_fold: FoldPolicy,
    pub answer_fold: FoldPolicy,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub rate: f32,
}

impl PipelineConfig {
    /// Load from `WAYFINDER_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WAYFINDER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let admission = file.admission.unwrap_or_default();
        let selection = file.selection.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let buffer = file.buffer.unwrap_or_default();
        let cues = file.cues.unwrap_or_default();
        let speech = file.speech.unwrap_or_default();
        let source = file.source.unwrap_or_default();

        Self {
            min_frame_interval_ms: admission
                .min_interval_ms
                .unwrap_or(DEFAULT_MIN_INTERVAL_MS),
            selection: FrameSelector {
                motion_window_ms: selection
                    .motion_window_ms
                    .unwrap_or(DEFAULT_MOTION_WINDOW_MS),
                search_radius: selection.search_radius.unwrap_or(DEFAULT_SEARCH_RADIUS),
                sharpness: SharpnessConfig {
                    stride: selection
                        .sharpness_stride
                        .unwrap_or(DEFAULT_SHARPNESS_STRIDE),
                    threshold: selection
                        .sharpness_threshold
                        .unwrap_or(DEFAULT_SHARPNESS_THRESHOLD),
                },
            },
            capture: CaptureSettings {
                poll_interval: capture
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_POLL_INTERVAL),
                burst_attempt_timeout: capture
                    .burst_attempt_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_BURST_ATTEMPT_TIMEOUT),
                frame_timeout: Duration::from_millis(
                    capture.frame_timeout_ms.unwrap_or(DEFAULT_FRAME_TIMEOUT_MS),
                ),
                burst_frames: capture.burst_frames.unwrap_or(DEFAULT_BURST_FRAMES),
                burst_interval: Duration::from_millis(
                    capture.burst_interval_ms.unwrap_or(DEFAULT_BURST_INTERVAL_MS),
                ),
            },
            buffer: BufferSettings {
                max_frames: buffer.max_frames.unwrap_or(DEFAULT_BUFFER_FRAMES),
                retention_ms: buffer.retention_ms.unwrap_or(DEFAULT_RETENTION_MS),
            },
            cues: CueSettings {
                session_fold: cues.session_fold.unwrap_or(FoldPolicy::AppendAlways),
                answer_fold: cues.answer_fold.unwrap_or(FoldPolicy::ResetOnDone),
            },
            speech: SpeechSettings {
                enabled: speech.enabled.unwrap_or(true),
                rate: speech.rate.unwrap_or(DEFAULT_SPEECH_RATE),
            },
            source: SourceConfig {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(interval) = std::env::var("WAYFINDER_MIN_FRAME_INTERVAL_MS") {
            self.min_frame_interval_ms = interval.trim().parse().map_err(|_| {
                anyhow!("WAYFINDER_MIN_FRAME_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(window) = std::env::var("WAYFINDER_MOTION_WINDOW_MS") {
            self.selection.motion_window_ms = window.trim().parse().map_err(|_| {
                anyhow!("WAYFINDER_MOTION_WINDOW_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(threshold) = std::env::var("WAYFINDER_SHARPNESS_THRESHOLD") {
            self.selection.sharpness.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("WAYFINDER_SHARPNESS_THRESHOLD must be a number"))?;
        }
        if let Ok(policy) = std::env::var("WAYFINDER_SESSION_FOLD") {
            self.cues.session_fold = policy
                .parse()
                .map_err(|e| anyhow!("WAYFINDER_SESSION_FOLD: {}", e))?;
        }
        if let Ok(policy) = std::env::var("WAYFINDER_ANSWER_FOLD") {
            self.cues.answer_fold = policy
                .parse()
                .map_err(|e| anyhow!("WAYFINDER_ANSWER_FOLD: {}", e))?;
        }
        if let Ok(enabled) = std::env::var("WAYFINDER_SPEECH_ENABLED") {
            self.speech.enabled = parse_bool(&enabled)
                .ok_or_else(|| anyhow!("WAYFINDER_SPEECH_ENABLED must be true or false"))?;
        }
        if let Ok(url) = std::env::var("WAYFINDER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.min_frame_interval_ms == 0 {
            return Err(anyhow!("admission.min_interval_ms must be greater than zero"));
        }
        if self.selection.sharpness.stride == 0 {
            return Err(anyhow!("selection.sharpness_stride must be greater than zero"));
        }
        let threshold = self.selection.sharpness.threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(anyhow!(
                "selection.sharpness_threshold must be a non-negative number"
            ));
        }
        if self.capture.poll_interval.is_zero() {
            return Err(anyhow!("capture.poll_interval_ms must be greater than zero"));
        }
        if self.capture.burst_attempt_timeout.is_zero() || self.capture.frame_timeout.is_zero() {
            return Err(anyhow!("capture timeouts must be greater than zero"));
        }
        if self.capture.burst_frames == 0 {
            return Err(anyhow!("capture.burst_frames must be at least 1"));
        }
        if self.buffer.max_frames == 0 {
            return Err(anyhow!("buffer.max_frames must be at least 1"));
        }
        if self.buffer.retention_ms < self.selection.motion_window_ms {
            return Err(anyhow!(
                "buffer.retention_ms ({}) must cover the motion window ({} ms)",
                self.buffer.retention_ms,
                self.selection.motion_window_ms
            ));
        }
        if !(self.speech.rate > 0.0 && self.speech.rate <= MAX_SPEECH_RATE) {
            return Err(anyhow!(
                "speech.rate must be in (0, {}], got {}",
                MAX_SPEECH_RATE,
                self.speech.rate
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source.target_fps must be at least 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
