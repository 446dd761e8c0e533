//! Camera mode state machine.
//!
//! Exactly one `CaptureMode` is active at a time. The current state is
//! published through a `tokio::sync::watch` channel so a camera driver can
//! subscribe and start/stop physical capture as activation changes. Every
//! published snapshot carries a version counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Off,
    Navigation,
    TextReading,
    PhotoCapture,
}

impl CaptureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureMode::Off => "off",
            CaptureMode::Navigation => "navigation",
            CaptureMode::TextReading => "text_reading",
            CaptureMode::PhotoCapture => "photo_capture",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "off" => Ok(CaptureMode::Off),
            "navigation" => Ok(CaptureMode::Navigation),
            "text_reading" => Ok(CaptureMode::TextReading),
            "photo_capture" | "photo" => Ok(CaptureMode::PhotoCapture),
            other => Err(anyhow::anyhow!("unknown capture mode '{}'", other)),
        }
    }
}

/// Published camera state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraState {
    pub mode: CaptureMode,
    /// Derived: `mode != Off`.
    pub active: bool,
    /// Incremented on every transition that changed the state.
    pub version: u64,
}

impl CameraState {
    fn off() -> Self {
        Self {
            mode: CaptureMode::Off,
            active: false,
            version: 0,
        }
    }
}

/// Mode captured by `save_mode`, handed back to `restore`.
#[must_use = "a saved mode does nothing unless passed to restore()"]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavedMode(CaptureMode);

impl SavedMode {
    pub fn mode(&self) -> CaptureMode {
        self.0
    }
}

/// Single source of truth for capture mode and camera activation.
///
/// Writers are serialized by the watch channel; observers subscribe with
/// `subscribe()`.
pub struct CameraModeController {
    state: watch::Sender<CameraState>,
}

impl CameraModeController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CameraState::off());
        Self { state }
    }

    /// Activate `mode`. `Off` behaves as `deactivate()`.
    pub fn activate(&self, mode: CaptureMode) {
        if mode == CaptureMode::Off {
            self.deactivate();
            return;
        }
        self.transition(mode);
    }

    pub fn deactivate(&self) {
        self.transition(CaptureMode::Off);
    }

    /// Sugar for `activate(TextReading)`. Does not remember the prior mode;
    /// call `save_mode()` first when the caller wants to go back afterwards.
    pub fn switch_to_text_reading(&self) {
        self.activate(CaptureMode::TextReading);
    }

    pub fn save_mode(&self) -> SavedMode {
        SavedMode(self.current_mode())
    }

    pub fn restore(&self, saved: SavedMode) {
        self.activate(saved.0);
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn current_mode(&self) -> CaptureMode {
        self.state.borrow().mode
    }

    pub fn snapshot(&self) -> CameraState {
        *self.state.borrow()
    }

    /// Continuous observation of camera state for the capture driver.
    pub fn subscribe(&self) -> watch::Receiver<CameraState> {
        self.state.subscribe()
    }

    /// Restore `saved` only if no transition happened since `version`.
    ///
    /// Returns false when another caller moved the camera in the meantime,
    /// e.g. a session stop that turned it off; that newer decision wins.
    pub fn restore_if_unchanged(&self, saved: SavedMode, version: u64) -> bool {
        let mut stale = false;
        let changed = self.state.send_if_modified(|state| {
            if state.version != version {
                stale = true;
                return false;
            }
            apply_mode(state, saved.0)
        });
        if changed {
            log_transition(saved.0);
        } else if stale {
            log::debug!("camera moved since version {}, not restoring {}", version, saved.0);
        }
        !stale
    }

    fn transition(&self, mode: CaptureMode) {
        if self.state.send_if_modified(|state| apply_mode(state, mode)) {
            log_transition(mode);
        }
    }
}

fn apply_mode(state: &mut CameraState, mode: CaptureMode) -> bool {
    if state.mode == mode {
        return false;
    }
    state.mode = mode;
    state.active = mode != CaptureMode::Off;
    state.version += 1;
    true
}

fn log_transition(mode: CaptureMode) {
    log::info!("camera mode -> {} (active={})", mode, mode != CaptureMode::Off);
}

impl Default for CameraModeController {
    fn default() -> Self {
        Self::new()
    }
}
