//! Cue orchestration.
//!
//! Merges the automatic cue stream (analyzer output) with manually emitted
//! cues, speaks each cue while speech is enabled, and folds the merged stream
//! into display state.
//!
//! Each flow is a small set of tasks:
//! - one producer task per source, all feeding a single unbounded channel
//!   (first-arrival interleaving, per-source order preserved)
//! - a fold task that reads the channel, hands cues to the speech dispatcher
//!   and emits `CueDisplay` values
//! - a speech dispatch task, so speaking never gates forwarding
//!
//! Dropping or cancelling the `CueFlow` aborts all of them.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::cue::{CueAccumulator, CueDisplay, FoldPolicy, NavigationCue};
use crate::speech::{SpeechDispatcher, SpeechSynthesizer};

const MANUAL_CUE_CAPACITY: usize = 64;

pub struct CueOrchestrator {
    speech: Arc<dyn SpeechSynthesizer>,
    manual: broadcast::Sender<NavigationCue>,
}

impl CueOrchestrator {
    /// Create the orchestrator and initialize the speech collaborator once.
    ///
    /// Initialization failures are only logged; cues keep flowing without speech.
    pub fn new(speech: Arc<dyn SpeechSynthesizer>) -> Self {
        speech.initialize(
            Box::new(|| log::info!("speech engine ready")),
            Box::new(|err| log::warn!("speech engine unavailable: {}", err)),
        );
        let (manual, _) = broadcast::channel(MANUAL_CUE_CAPACITY);
        Self { speech, manual }
    }

    pub fn speech(&self) -> &Arc<dyn SpeechSynthesizer> {
        &self.speech
    }

    /// Inject a cue from outside the analyzer, e.g. a direct user command.
    ///
    /// Delivered to every live flow; dropped when no flow is running.
    pub fn emit(&self, cue: NavigationCue) {
        if self.manual.send(cue).is_err() {
            log::debug!("manual cue dropped: no active flow");
        }
    }

    /// Merge `automatic` with manual cues and fold them with `policy`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_flow<S>(
        &self,
        automatic: S,
        speech_enabled: watch::Receiver<bool>,
        policy: FoldPolicy,
    ) -> CueFlow
    where
        S: Stream<Item = NavigationCue> + Send + 'static,
    {
        let manual = self.manual.subscribe();
        let manual_source = futures::stream::unfold(manual, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(cue) => return Some((cue, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("flow lagged behind manual cues, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        self.spawn_flow(
            vec![automatic.boxed(), manual_source.boxed()],
            speech_enabled,
            policy,
        )
    }

    /// Fold a single finite cue stream (a one-shot answer). The flow ends when
    /// `cues` ends; manual cues are not merged in.
    pub fn create_answer_flow<S>(
        &self,
        cues: S,
        speech_enabled: watch::Receiver<bool>,
        policy: FoldPolicy,
    ) -> CueFlow
    where
        S: Stream<Item = NavigationCue> + Send + 'static,
    {
        self.spawn_flow(vec![cues.boxed()], speech_enabled, policy)
    }

    fn spawn_flow(
        &self,
        sources: Vec<BoxStream<'static, NavigationCue>>,
        speech_enabled: watch::Receiver<bool>,
        policy: FoldPolicy,
    ) -> CueFlow {
        let (merged_tx, mut merged_rx) = mpsc::unbounded_channel::<NavigationCue>();
        let (display_tx, display_rx) = mpsc::unbounded_channel::<CueDisplay>();
        let mut tasks = Vec::with_capacity(sources.len() + 1);

        for mut source in sources {
            let tx = merged_tx.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(cue) = source.next().await {
                    if tx.send(cue).is_err() {
                        break;
                    }
                }
            }));
        }
        // The fold loop ends once every producer has dropped its sender.
        drop(merged_tx);

        let (dispatcher, speech_task) = SpeechDispatcher::spawn(Arc::clone(&self.speech));

        tasks.push(tokio::spawn(async move {
            let mut accumulator = CueAccumulator::new(policy);
            while let Some(cue) = merged_rx.recv().await {
                if *speech_enabled.borrow() {
                    dispatcher.submit(cue.clone());
                }
                let display = accumulator.apply(&cue);
                if display_tx.send(display).is_err() {
                    break;
                }
            }
            log::debug!("cue flow ({}) finished", policy);
        }));

        CueFlow {
            displays: display_rx,
            tasks,
            speech_task: Some(speech_task),
        }
    }
}

/// Live display state stream produced by `CueOrchestrator`.
pub struct CueFlow {
    displays: mpsc::UnboundedReceiver<CueDisplay>,
    /// Producers and the fold loop.
    tasks: Vec<JoinHandle<()>>,
    speech_task: Option<JoinHandle<()>>,
}

impl CueFlow {
    /// Next display state, or `None` once the flow has ended or was cancelled.
    pub async fn next_display(&mut self) -> Option<CueDisplay> {
        self.displays.recv().await
    }

    /// Abort producers, fold and speech tasks and discard undelivered
    /// displays. Idempotent; `next_display` returns `None` afterwards.
    pub fn cancel(&mut self) {
        self.abort_tasks();
        self.displays.close();
        while self.displays.try_recv().is_ok() {}
    }

    /// Drain the flow to completion, then let queued speech go out before
    /// returning.
    pub async fn collect_all(mut self) -> Vec<CueDisplay> {
        let mut out = Vec::new();
        while let Some(display) = self.next_display().await {
            out.push(display);
        }
        if let Some(speech_task) = self.speech_task.take() {
            // The fold loop has exited and dropped the dispatcher, so this ends.
            let _ = speech_task.await;
        }
        out
    }

    fn abort_tasks(&self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(speech_task) = &self.speech_task {
            speech_task.abort();
        }
    }
}

impl Stream for CueFlow {
    type Item = CueDisplay;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<CueDisplay>> {
        self.displays.poll_recv(cx)
    }
}

impl Drop for CueFlow {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
