//! Navigation session runner.
//!
//! Wires the pieces together: camera mode, frame capture, buffering,
//! admission, selection, analysis and cue orchestration.
//!
//! A continuous session runs one pipeline task:
//!
//! ```text
//! tick -> wait for frame -> dedupe -> FrameBuffer -> try_admit
//!      -> select -> analyze -> forward cues (guard held) -> release
//! ```
//!
//! Its cues feed a `CueFlow` folded with the session policy. Explicit
//! requests such as `read_text` bypass admission and fold with the answer
//! policy.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::admission::AdmissionController;
use crate::analyze::{AnalysisRequest, CueAnalyzer};
use crate::camera::{CameraModeController, CaptureMode, SavedMode};
use crate::capture::{FrameProvider, FrameWaiter};
use crate::clock::MonotonicClock;
use crate::config::PipelineConfig;
use crate::cue::{CueDisplay, FoldPolicy, NavigationCue};
use crate::frame::{FrameBuffer, DEFAULT_BUFFER_FRAMES, DEFAULT_RETENTION_MS};
use crate::orchestrator::{CueFlow, CueOrchestrator};
use crate::select::FrameSelector;
use crate::speech::SpeechSynthesizer;

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub max_frames: usize,
    pub retention_ms: u64,
    pub frame_timeout: Duration,
    pub burst_frames: usize,
    pub burst_interval: Duration,
    pub session_fold: FoldPolicy,
    pub answer_fold: FoldPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_BUFFER_FRAMES,
            retention_ms: DEFAULT_RETENTION_MS,
            frame_timeout: Duration::from_millis(2_000),
            burst_frames: 3,
            burst_interval: Duration::from_millis(300),
            session_fold: FoldPolicy::AppendAlways,
            answer_fold: FoldPolicy::ResetOnDone,
        }
    }
}

pub struct NavigationSession {
    camera: Arc<CameraModeController>,
    admission: Arc<AdmissionController>,
    selector: FrameSelector,
    waiter: FrameWaiter,
    analyzer: Arc<dyn CueAnalyzer>,
    orchestrator: Arc<CueOrchestrator>,
    settings: SessionSettings,
}

impl NavigationSession {
    pub fn new(
        camera: Arc<CameraModeController>,
        admission: Arc<AdmissionController>,
        analyzer: Arc<dyn CueAnalyzer>,
        orchestrator: Arc<CueOrchestrator>,
    ) -> Self {
        Self {
            camera,
            admission,
            selector: FrameSelector::default(),
            waiter: FrameWaiter::default(),
            analyzer,
            orchestrator,
            settings: SessionSettings::default(),
        }
    }

    /// Build every collaborator from a loaded configuration.
    pub fn from_config(
        config: &PipelineConfig,
        clock: Arc<dyn MonotonicClock>,
        analyzer: Arc<dyn CueAnalyzer>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        speech.set_rate(config.speech.rate);
        let admission = Arc::new(AdmissionController::new(
            config.min_frame_interval_ms,
            clock,
        ));
        let orchestrator = Arc::new(CueOrchestrator::new(speech));
        Self::new(
            Arc::new(CameraModeController::new()),
            admission,
            analyzer,
            orchestrator,
        )
        .with_selector(config.selection)
        .with_waiter(config.capture.waiter())
        .with_settings(SessionSettings {
            max_frames: config.buffer.max_frames,
            retention_ms: config.buffer.retention_ms,
            frame_timeout: config.capture.frame_timeout,
            burst_frames: config.capture.burst_frames,
            burst_interval: config.capture.burst_interval,
            session_fold: config.cues.session_fold,
            answer_fold: config.cues.answer_fold,
        })
    }

    pub fn with_selector(mut self, selector: FrameSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_waiter(mut self, waiter: FrameWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn camera(&self) -> &Arc<CameraModeController> {
        &self.camera
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn orchestrator(&self) -> &Arc<CueOrchestrator> {
        &self.orchestrator
    }

    /// Activate `mode` and start the continuous frame pipeline.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<P>(
        &self,
        mode: CaptureMode,
        provider: P,
        speech_enabled: watch::Receiver<bool>,
    ) -> SessionHandle
    where
        P: FrameProvider + 'static,
    {
        self.admission.reset();
        self.camera.activate(mode);

        let (cue_tx, cue_rx) = mpsc::unbounded_channel::<NavigationCue>();
        let automatic = futures::stream::unfold(cue_rx, |mut rx| async move {
            rx.recv().await.map(|cue| (cue, rx))
        });
        let flow =
            self.orchestrator
                .create_flow(automatic, speech_enabled, self.settings.session_fold);

        let pipeline = FramePipeline {
            mode,
            camera: Arc::clone(&self.camera),
            admission: Arc::clone(&self.admission),
            selector: self.selector,
            waiter: self.waiter,
            analyzer: Arc::clone(&self.analyzer),
            frame_timeout: self.settings.frame_timeout,
            buffer: FrameBuffer::new(self.settings.max_frames, self.settings.retention_ms),
            cues: cue_tx,
        };
        let task = tokio::spawn(pipeline.run(provider));
        log::info!(
            "navigation session started ({}, analyzer={})",
            mode,
            self.analyzer.name()
        );

        SessionHandle {
            pipeline: Some(task),
            flow,
            camera: Arc::clone(&self.camera),
            admission: Arc::clone(&self.admission),
            stopped: false,
        }
    }

    /// One-shot text reading for an explicit user request.
    ///
    /// Switches the camera to text reading for the duration of the call and
    /// restores the previous mode afterwards, including on error or when the
    /// future is dropped. If the camera was moved in the meantime (a session
    /// stop, another activation) that newer mode is kept. A running session
    /// pipeline pauses while the camera is in text reading. Admission
    /// throttling does not apply. Returns every
    /// display state of the folded answer; an empty burst yields no states.
    pub async fn read_text<P>(
        &self,
        provider: &mut P,
        prompt: &str,
        speech_enabled: watch::Receiver<bool>,
    ) -> Result<Vec<CueDisplay>>
    where
        P: FrameProvider + ?Sized,
    {
        let _restore = ModeRestore::switch_to_text_reading(&self.camera);

        let frames = self
            .waiter
            .capture_multiple_frames(
                self.settings.burst_frames,
                self.settings.burst_interval,
                provider,
            )
            .await;
        if frames.is_empty() {
            log::warn!("text reading: no frames captured");
            return Ok(Vec::new());
        }

        let request = AnalysisRequest {
            frames: self.selector.select(&frames),
            prompt: Some(prompt.to_string()),
            mode: CaptureMode::TextReading,
        };
        let cues = self
            .analyzer
            .analyze(request)
            .with_context(|| format!("analyzer {} failed to read text", self.analyzer.name()))?;

        let displays = self
            .orchestrator
            .create_answer_flow(cues, speech_enabled, self.settings.answer_fold)
            .collect_all()
            .await;
        Ok(displays)
    }
}

/// Switches to text reading and, when dropped, restores the saved mode
/// unless the camera was moved in between (e.g. the session was stopped).
struct ModeRestore<'a> {
    camera: &'a CameraModeController,
    saved: SavedMode,
    version: u64,
}

impl<'a> ModeRestore<'a> {
    fn switch_to_text_reading(camera: &'a CameraModeController) -> Self {
        let saved = camera.save_mode();
        camera.switch_to_text_reading();
        Self {
            camera,
            saved,
            version: camera.snapshot().version,
        }
    }
}

impl Drop for ModeRestore<'_> {
    fn drop(&mut self) {
        self.camera.restore_if_unchanged(self.saved, self.version);
    }
}

struct FramePipeline {
    /// Mode the session was started in; other modes pause the pipeline.
    mode: CaptureMode,
    camera: Arc<CameraModeController>,
    admission: Arc<AdmissionController>,
    selector: FrameSelector,
    waiter: FrameWaiter,
    analyzer: Arc<dyn CueAnalyzer>,
    frame_timeout: Duration,
    buffer: FrameBuffer,
    cues: mpsc::UnboundedSender<NavigationCue>,
}

impl FramePipeline {
    async fn run<P: FrameProvider>(mut self, mut provider: P) {
        let mut ticker = tokio::time::interval(self.waiter.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen: Option<u64> = None;

        loop {
            ticker.tick().await;

            if !self.owns_camera() {
                continue;
            }

            let Some(frame) = self
                .waiter
                .wait_for_frame(self.frame_timeout, &mut provider)
                .await
            else {
                continue;
            };
            if !self.owns_camera() {
                continue;
            }
            if last_seen == Some(frame.captured_at_ms) {
                continue;
            }
            last_seen = Some(frame.captured_at_ms);
            if !self.buffer.push(frame) {
                continue;
            }

            let Some(guard) = self.admission.try_admit() else {
                continue;
            };

            let request = AnalysisRequest {
                frames: self.selector.select(&self.buffer.snapshot()),
                prompt: None,
                mode: self.mode,
            };
            match self.analyzer.analyze(request) {
                Ok(mut cues) => {
                    while let Some(cue) = cues.next().await {
                        if self.cues.send(cue).is_err() {
                            log::debug!("cue flow closed, stopping frame pipeline");
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("analyzer {} failed: {:#}", self.analyzer.name(), e);
                }
            }
            guard.finish();
        }
    }

    /// False while the camera is off or borrowed by another mode, such as a
    /// one-shot text reading.
    fn owns_camera(&self) -> bool {
        let state = self.camera.snapshot();
        state.active && state.mode == self.mode
    }
}

/// Running navigation session.
///
/// Dropping the handle stops the session.
pub struct SessionHandle {
    pipeline: Option<JoinHandle<()>>,
    flow: CueFlow,
    camera: Arc<CameraModeController>,
    admission: Arc<AdmissionController>,
    stopped: bool,
}

impl SessionHandle {
    /// Next folded display state, or `None` once stopped.
    pub async fn next_display(&mut self) -> Option<CueDisplay> {
        self.flow.next_display().await
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Abort the pipeline and cue flow, reset admission, turn the camera off.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(task) = self.pipeline.as_ref() {
            task.abort();
        }
        self.flow.cancel();
        self.admission.reset();
        self.camera.deactivate();
        log::info!("navigation session stopped");
    }

    /// Like `stop`, but also waits for the pipeline task to unwind so any
    /// admission guard it held has been released on return.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.pipeline.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("frame pipeline ended abnormally: {}", e);
                }
            }
        }
        self.stop();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
