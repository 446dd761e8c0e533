//! Speech collaborator seam.
//!
//! Voice synthesis lives outside this crate. `SpeechSynthesizer` is the
//! narrow interface the orchestrator drives; implementations must return
//! promptly from every method (queue internally, never synthesize inline).
//! Preempting queued speech for critical cues is the implementation's call.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cue::{CueCategory, NavigationCue};

pub type ReadyCallback = Box<dyn FnOnce() + Send>;
pub type ErrorCallback = Box<dyn FnOnce(String) + Send>;

pub trait SpeechSynthesizer: Send + Sync {
    /// Start the engine. Exactly one of the callbacks fires, possibly later.
    fn initialize(&self, on_ready: ReadyCallback, on_error: ErrorCallback);

    fn speak_cue(&self, cue: &NavigationCue);

    fn speak_text(&self, text: &str);

    fn stop(&self);

    fn is_speaking(&self) -> bool;

    fn set_rate(&self, rate: f32);

    fn shutdown(&self);
}

// ----------------------------------------------------------------------------
// LogSpeech: log-backed synthesizer
// ----------------------------------------------------------------------------

/// Speaks into the log. Used by the daemon when no engine is bound.
pub struct LogSpeech {
    ready: AtomicBool,
    speaking: AtomicBool,
    shut_down: AtomicBool,
    rate_bits: AtomicU32,
}

impl LogSpeech {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            rate_bits: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn rate(&self) -> f32 {
        f32::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    fn say(&self, category: Option<CueCategory>, text: &str) {
        if self.shut_down.load(Ordering::Acquire) || !self.ready.load(Ordering::Acquire) {
            return;
        }
        if category == Some(CueCategory::Critical) && self.is_speaking() {
            log::info!("speech: interrupting for critical cue");
            self.stop();
        }
        self.speaking.store(true, Ordering::Release);
        log::info!("speech[{:.1}x]: {}", self.rate(), text);
        self.speaking.store(false, Ordering::Release);
    }
}

impl Default for LogSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for LogSpeech {
    fn initialize(&self, on_ready: ReadyCallback, on_error: ErrorCallback) {
        if self.shut_down.load(Ordering::Acquire) {
            on_error("speech engine already shut down".to_string());
            return;
        }
        self.ready.store(true, Ordering::Release);
        on_ready();
    }

    fn speak_cue(&self, cue: &NavigationCue) {
        self.say(Some(cue.category()), cue.message());
    }

    fn speak_text(&self, text: &str) {
        self.say(None, text);
    }

    fn stop(&self) {
        self.speaking.store(false, Ordering::Release);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }

    fn set_rate(&self, rate: f32) {
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.ready.store(false, Ordering::Release);
        self.stop();
    }
}

// ----------------------------------------------------------------------------
// Fire-and-forget dispatch
// ----------------------------------------------------------------------------

/// Hands cues to a speech task so the caller never waits on the engine.
pub(crate) struct SpeechDispatcher {
    tx: mpsc::UnboundedSender<NavigationCue>,
}

impl SpeechDispatcher {
    /// Spawn the dispatch task on the current runtime.
    pub(crate) fn spawn(
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<NavigationCue>();
        let handle = tokio::spawn(async move {
            while let Some(cue) = rx.recv().await {
                speech.speak_cue(&cue);
            }
        });
        (Self { tx }, handle)
    }

    pub(crate) fn submit(&self, cue: NavigationCue) {
        if self.tx.send(cue).is_err() {
            log::debug!("speech dispatcher closed; cue not spoken");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSynthesizer for Recorder {
        fn initialize(&self, on_ready: ReadyCallback, _on_error: ErrorCallback) {
            on_ready();
        }
        fn speak_cue(&self, cue: &NavigationCue) {
            self.spoken.lock().unwrap().push(cue.message().to_string());
        }
        fn speak_text(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
        fn stop(&self) {}
        fn is_speaking(&self) -> bool {
            false
        }
        fn set_rate(&self, _rate: f32) {}
        fn shutdown(&self) {}
    }

    #[test]
    fn log_speech_reports_ready_then_refuses_after_shutdown() {
        let speech = LogSpeech::new();
        let ready = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ready);
        speech.initialize(
            Box::new(move || flag.store(true, Ordering::SeqCst)),
            Box::new(|_| panic!("unexpected init error")),
        );
        assert!(ready.load(Ordering::SeqCst));

        speech.set_rate(1.5);
        assert_eq!(speech.rate(), 1.5);
        speech.speak_cue(&NavigationCue::critical("stairs ahead", true));
        assert!(!speech.is_speaking());

        speech.shutdown();
        let errored = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&errored);
        speech.initialize(
            Box::new(|| panic!("should not become ready")),
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        );
        assert!(errored.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dispatcher_speaks_in_submission_order() {
        let recorder = Arc::new(Recorder::default());
        let (dispatcher, handle) = SpeechDispatcher::spawn(recorder.clone());
        dispatcher.submit(NavigationCue::ambient("one", false));
        dispatcher.submit(NavigationCue::ambient("two", true));
        drop(dispatcher);
        handle.await.unwrap();
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["one", "two"]);
    }
}
