//! Wayfinder
//!
//! Frame admission, selection and navigation-cue orchestration for an
//! assistive camera app. Camera drivers, vision/language inference and speech
//! synthesis are collaborators behind narrow seams; this crate decides which
//! frames get analyzed, when, and how the streamed answers reach the user.
//!
//! # Module Structure
//!
//! - `camera`: capture mode state machine with observable state
//! - `admission`: rate limiting and in-flight exclusion for frame analysis
//! - `frame`, `quality`, `select`: frames, the retention buffer, sharpness
//!   scoring and motion/sharpness-aware selection
//! - `capture`, `ingest`: polling frame waits, bursts and frame sources
//! - `analyze`: analyzer seam, registry and an offline stub analyzer
//! - `cue`, `orchestrator`, `speech`: cue types, display folds, stream
//!   merging and speech dispatch
//! - `session`: the pipeline wiring and one-shot text reading
//! - `config`: file and environment configuration

pub mod admission;
pub mod analyze;
pub mod camera;
pub mod capture;
pub mod clock;
pub mod config;
pub mod cue;
pub mod frame;
pub mod ingest;
pub mod orchestrator;
pub mod quality;
pub mod select;
pub mod session;
pub mod speech;

pub use admission::{AdmissionController, AdmissionGuard};
pub use analyze::{
    AnalysisCapability, AnalysisRequest, AnalyzerRegistry, CueAnalyzer, CueStream, StubAnalyzer,
};
pub use camera::{CameraModeController, CameraState, CaptureMode, SavedMode};
pub use capture::{FrameProvider, FrameWaiter};
pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use config::PipelineConfig;
pub use cue::{CueAccumulator, CueCategory, CueDisplay, FoldPolicy, NavigationCue};
pub use frame::{Frame, FrameBuffer, PixelFormat};
pub use ingest::{LatestFrameSlot, SourceConfig, SyntheticCamera};
pub use orchestrator::{CueFlow, CueOrchestrator};
pub use quality::SharpnessConfig;
pub use select::FrameSelector;
pub use session::{NavigationSession, SessionHandle, SessionSettings};
pub use speech::{LogSpeech, SpeechSynthesizer};
