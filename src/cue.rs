//! Navigation cues and the display fold.
//!
//! Analyzers stream cues as chunks: partial chunks carry `is_done = false`, the
//! final chunk `is_done = true`. `CueAccumulator` folds chunks into the text
//! shown on screen under one of two explicit policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Urgency of a cue. Speech collaborators use it to decide preemption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueCategory {
    Critical,
    Informational,
    Ambient,
}

/// One unit (or chunk) of guidance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationCue {
    CriticalAlert { message: String, is_done: bool },
    InformationalAlert { message: String, is_done: bool },
    AmbientUpdate { message: String, is_done: bool },
}

impl NavigationCue {
    pub fn critical(message: impl Into<String>, is_done: bool) -> Self {
        NavigationCue::CriticalAlert {
            message: message.into(),
            is_done,
        }
    }

    pub fn informational(message: impl Into<String>, is_done: bool) -> Self {
        NavigationCue::InformationalAlert {
            message: message.into(),
            is_done,
        }
    }

    pub fn ambient(message: impl Into<String>, is_done: bool) -> Self {
        NavigationCue::AmbientUpdate {
            message: message.into(),
            is_done,
        }
    }

    pub fn new(category: CueCategory, message: impl Into<String>, is_done: bool) -> Self {
        match category {
            CueCategory::Critical => Self::critical(message, is_done),
            CueCategory::Informational => Self::informational(message, is_done),
            CueCategory::Ambient => Self::ambient(message, is_done),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            NavigationCue::CriticalAlert { message, .. }
            | NavigationCue::InformationalAlert { message, .. }
            | NavigationCue::AmbientUpdate { message, .. } => message,
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            NavigationCue::CriticalAlert { is_done, .. }
            | NavigationCue::InformationalAlert { is_done, .. }
            | NavigationCue::AmbientUpdate { is_done, .. } => *is_done,
        }
    }

    pub fn category(&self) -> CueCategory {
        match self {
            NavigationCue::CriticalAlert { .. } => CueCategory::Critical,
            NavigationCue::InformationalAlert { .. } => CueCategory::Informational,
            NavigationCue::AmbientUpdate { .. } => CueCategory::Ambient,
        }
    }
}

/// How chunk text accumulates for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldPolicy {
    /// Running transcript: every chunk is appended, `is_done` is ignored.
    #[default]
    AppendAlways,
    /// One answer at a time: chunks append until the final one clears the text.
    ResetOnDone,
}

impl fmt::Display for FoldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldPolicy::AppendAlways => f.write_str("append_always"),
            FoldPolicy::ResetOnDone => f.write_str("reset_on_done"),
        }
    }
}

impl FromStr for FoldPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "append_always" | "append" => Ok(FoldPolicy::AppendAlways),
            "reset_on_done" | "reset" => Ok(FoldPolicy::ResetOnDone),
            other => Err(anyhow::anyhow!("unknown fold policy '{}'", other)),
        }
    }
}

/// Display state emitted after each folded cue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CueDisplay {
    pub text: String,
    pub category: Option<CueCategory>,
}

/// Fold state: accumulated text and the category of the last cue.
#[derive(Clone, Debug)]
pub struct CueAccumulator {
    policy: FoldPolicy,
    state: CueDisplay,
}

impl CueAccumulator {
    pub fn new(policy: FoldPolicy) -> Self {
        Self {
            policy,
            state: CueDisplay::default(),
        }
    }

    pub fn policy(&self) -> FoldPolicy {
        self.policy
    }

    pub fn current(&self) -> &CueDisplay {
        &self.state
    }

    /// Fold one cue and return the new display state.
    pub fn apply(&mut self, cue: &NavigationCue) -> CueDisplay {
        match self.policy {
            FoldPolicy::AppendAlways => self.state.text.push_str(cue.message()),
            FoldPolicy::ResetOnDone => {
                if cue.is_done() {
                    self.state.text.clear();
                } else {
                    self.state.text.push_str(cue.message());
                }
            }
        }
        self.state.category = Some(cue.category());
        self.state.clone()
    }
}
