use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::watch;

use wayfinder::{
    AdmissionController, AnalysisCapability, AnalysisRequest, AnalyzerRegistry,
    CameraModeController, CaptureMode, CueAnalyzer, CueCategory, CueOrchestrator, CueStream, Frame,
    LatestFrameSlot, LogSpeech, ManualClock, NavigationCue, NavigationSession, PixelFormat,
    StubAnalyzer,
};

/// Streams one chunk, then never finishes.
struct Stalling {
    calls: AtomicUsize,
}

impl CueAnalyzer for Stalling {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn supports(&self, _capability: AnalysisCapability) -> bool {
        true
    }

    fn analyze(&self, _request: AnalysisRequest) -> Result<CueStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = futures::stream::iter(vec![NavigationCue::critical("Stop. ", false)]);
        Ok(first.chain(futures::stream::pending()).boxed())
    }
}

/// Echoes how many frames it was given and records the request modes.
#[derive(Default)]
struct Counting {
    modes: Mutex<Vec<CaptureMode>>,
}

impl Counting {
    fn modes(&self) -> Vec<CaptureMode> {
        self.modes.lock().unwrap().clone()
    }
}

impl CueAnalyzer for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn supports(&self, _capability: AnalysisCapability) -> bool {
        true
    }

    fn analyze(&self, request: AnalysisRequest) -> Result<CueStream> {
        self.modes.lock().unwrap().push(request.mode);
        let message = format!("{} frame(s)", request.frames.len());
        Ok(futures::stream::iter(vec![
            NavigationCue::ambient(message, false),
            NavigationCue::ambient("", true),
        ])
        .boxed())
    }
}

fn frame(at_ms: u64) -> Frame {
    Frame::new(vec![90; 24 * 24], 24, 24, PixelFormat::Luma8, at_ms).unwrap()
}

fn build(analyzer: Arc<dyn CueAnalyzer>, clock: &ManualClock) -> NavigationSession {
    NavigationSession::new(
        Arc::new(CameraModeController::new()),
        Arc::new(AdmissionController::new(100, Arc::new(clock.clone()))),
        analyzer,
        Arc::new(CueOrchestrator::new(Arc::new(LogSpeech::new()))),
    )
}

#[tokio::test(start_paused = true)]
async fn stopping_mid_emission_releases_everything() {
    let clock = ManualClock::new(0);
    let analyzer = Arc::new(Stalling {
        calls: AtomicUsize::new(0),
    });
    let session = build(analyzer.clone(), &clock);
    let (_speech_tx, speech_rx) = watch::channel(true);

    let slot = LatestFrameSlot::new();
    slot.publish(frame(0));
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx);

    let display = handle.next_display().await.unwrap();
    assert_eq!(display.text, "Stop. ");
    assert_eq!(display.category, Some(CueCategory::Critical));
    assert!(session.admission().is_in_flight());

    // New frames arrive while the analysis is still streaming.
    for at in [200, 400, 600] {
        clock.set(at);
        slot.publish(frame(at));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
    assert!(!session.admission().is_in_flight());
    assert_eq!(session.camera().current_mode(), CaptureMode::Off);
    assert!(!session.camera().is_active());
}

#[tokio::test(start_paused = true)]
async fn selects_motion_frame_once_history_builds_up() {
    let clock = ManualClock::new(0);
    let session = build(Arc::new(Counting::default()), &clock);
    let (_speech_tx, speech_rx) = watch::channel(false);

    let slot = LatestFrameSlot::new();
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx);

    // Frames 500 ms apart clear the 100 ms admission interval.
    let mut texts = Vec::new();
    for at in [0, 500, 1_000] {
        clock.set(at);
        slot.publish(frame(at));
        handle.next_display().await.unwrap();
        texts.push(handle.next_display().await.unwrap().text);
    }

    // Append policy: each answer extends the running transcript. The motion
    // candidate needs a frame at least 800 ms older than the newest one.
    assert_eq!(texts[0], "1 frame(s)");
    assert_eq!(texts[1], "1 frame(s)1 frame(s)");
    assert_eq!(texts[2], "1 frame(s)1 frame(s)2 frame(s)");

    handle.stop();
    assert!(handle.next_display().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn read_text_during_session_returns_to_navigation() {
    let clock = ManualClock::new(0);
    let analyzer = Arc::new(Counting::default());
    let session = build(analyzer.clone(), &clock);
    let (_speech_tx, speech_rx) = watch::channel(false);

    let slot = LatestFrameSlot::new();
    slot.publish(frame(0));
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx.clone());
    assert_eq!(handle.next_display().await.unwrap().text, "1 frame(s)");
    handle.next_display().await.unwrap();

    // The camera keeps delivering frames while the text is being read.
    let mut probe = slot.clone();
    let reader = session.read_text(&mut probe, "street sign", speech_rx);
    let camera_feed = async {
        for at in [300, 600] {
            tokio::time::sleep(Duration::from_millis(100)).await;
            clock.set(at);
            slot.publish(frame(at));
        }
    };
    let (displays, ()) = tokio::join!(reader, camera_feed);
    let displays = displays.unwrap();

    assert_eq!(displays.len(), 2);
    assert_eq!(displays[0].text, "1 frame(s)");
    assert_eq!(displays[1].text, "");
    assert_eq!(session.camera().current_mode(), CaptureMode::Navigation);
    // The paused pipeline sent nothing while the camera was reading text.
    assert_eq!(
        analyzer.modes(),
        vec![CaptureMode::Navigation, CaptureMode::TextReading]
    );

    // Navigation resumes with the newest frame.
    assert_eq!(
        handle.next_display().await.unwrap().text,
        "1 frame(s)1 frame(s)"
    );
    assert_eq!(analyzer.modes().last(), Some(&CaptureMode::Navigation));

    drop(handle);
    assert_eq!(session.camera().current_mode(), CaptureMode::Off);
}

#[tokio::test(start_paused = true)]
async fn stopping_during_read_text_keeps_camera_off() {
    let clock = ManualClock::new(0);
    let session = build(Arc::new(Counting::default()), &clock);
    let (_speech_tx, speech_rx) = watch::channel(false);

    let slot = LatestFrameSlot::new();
    slot.publish(frame(0));
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx.clone());

    let mut probe = slot.clone();
    let reader = session.read_text(&mut probe, "menu", speech_rx);
    let stop_midway = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        assert_eq!(session.camera().current_mode(), CaptureMode::Off);
    };
    let (displays, ()) = tokio::join!(reader, stop_midway);

    assert_eq!(displays.unwrap().len(), 2);
    assert_eq!(session.camera().current_mode(), CaptureMode::Off);
    assert!(!session.camera().is_active());
}

#[tokio::test(start_paused = true)]
async fn stopped_session_yields_no_stale_displays() {
    let clock = ManualClock::new(0);
    let session = build(Arc::new(StubAnalyzer::new()), &clock);
    let (_speech_tx, speech_rx) = watch::channel(false);

    let slot = LatestFrameSlot::new();
    slot.publish(frame(0));
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx);

    // Let the analysis stream complete without consuming any display.
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.stop();

    assert!(!handle.is_running());
    assert!(handle.next_display().await.is_none());
}

/// Only answers text reading requests.
struct SignReader;

impl CueAnalyzer for SignReader {
    fn name(&self) -> &'static str {
        "sign-reader"
    }

    fn supports(&self, capability: AnalysisCapability) -> bool {
        capability == AnalysisCapability::TextReading
    }

    fn analyze(&self, _request: AnalysisRequest) -> Result<CueStream> {
        Ok(futures::stream::iter(vec![
            NavigationCue::informational("Platform 2", false),
            NavigationCue::informational("", true),
        ])
        .boxed())
    }
}

#[tokio::test(start_paused = true)]
async fn registry_routes_session_requests_by_mode() {
    let clock = ManualClock::new(0);
    let mut registry = AnalyzerRegistry::new();
    registry.register(SignReader);
    registry.register(StubAnalyzer::new());
    let session = build(Arc::new(registry), &clock);
    let (_speech_tx, speech_rx) = watch::channel(false);

    let slot = LatestFrameSlot::new();
    slot.publish(frame(0));
    let mut handle = session.start(CaptureMode::Navigation, slot.clone(), speech_rx.clone());
    assert_eq!(handle.next_display().await.unwrap().text, "Scene ");

    let mut probe = slot.clone();
    let displays = session
        .read_text(&mut probe, "which platform", speech_rx)
        .await
        .unwrap();
    assert_eq!(displays[0].text, "Platform 2");

    handle.shutdown().await;
}
