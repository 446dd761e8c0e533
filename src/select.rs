//! Frame selection for analysis.
//!
//! From a capture-ordered window, picks at most two frames: a motion-context
//! frame at least `motion_window_ms` older than the latest, and the latest
//! frame itself. Each pick is nudged to the nearest sharp neighbour within
//! `search_radius`, falling back to the original frame when none is sharp.
//!
//! Cost is O(n) for the motion scan and O(radius) sharpness checks per pick.

use crate::frame::Frame;
use crate::quality::SharpnessConfig;

/// Reference age gap between the motion-context frame and the latest frame.
pub const DEFAULT_MOTION_WINDOW_MS: u64 = 800;

/// Reference probe radius for the nearest-sharp search.
pub const DEFAULT_SEARCH_RADIUS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSelector {
    pub motion_window_ms: u64,
    pub search_radius: usize,
    pub sharpness: SharpnessConfig,
}

impl Default for FrameSelector {
    fn default() -> Self {
        Self {
            motion_window_ms: DEFAULT_MOTION_WINDOW_MS,
            search_radius: DEFAULT_SEARCH_RADIUS,
            sharpness: SharpnessConfig::default(),
        }
    }
}

impl FrameSelector {
    /// Select 0..=2 frames, older first.
    pub fn select(&self, frames: &[Frame]) -> Vec<Frame> {
        self.select_indices(frames)
            .into_iter()
            .map(|i| frames[i].clone())
            .collect()
    }

    /// Same as `select`, returning positions in `frames`.
    pub fn select_indices(&self, frames: &[Frame]) -> Vec<usize> {
        match frames.len() {
            0 => return Vec::new(),
            1 => return vec![0],
            _ => {}
        }

        let latest = frames.len() - 1;
        let motion = self.motion_candidate_index(frames);

        let mut picked = vec![self.nearest_sharp_index(frames, motion)];
        if motion != latest {
            picked.push(self.nearest_sharp_index(frames, latest));
        }
        picked.sort_unstable();
        picked.dedup();

        log::debug!(
            "selected frames {:?} from window of {} (motion candidate {}, latest {})",
            picked
                .iter()
                .map(|&i| frames[i].captured_at_ms)
                .collect::<Vec<_>>(),
            frames.len(),
            motion,
            latest
        );
        picked
    }

    /// Index of the most recent frame at least `motion_window_ms` older than the
    /// latest one, or the latest index when the window is too short.
    pub fn motion_candidate_index(&self, frames: &[Frame]) -> usize {
        let Some(latest) = frames.last() else {
            return 0;
        };
        let latest_idx = frames.len() - 1;
        frames[..latest_idx]
            .iter()
            .rposition(|f| {
                latest.captured_at_ms.saturating_sub(f.captured_at_ms) >= self.motion_window_ms
            })
            .unwrap_or(latest_idx)
    }

    /// Nearest sharp frame around `index`: the frame itself, then offsets
    /// 1..=radius alternating left before right. Falls back to `index`.
    pub fn nearest_sharp_index(&self, frames: &[Frame], index: usize) -> usize {
        if frames.is_empty() {
            return index;
        }
        let index = index.min(frames.len() - 1);
        if self.sharpness.is_sharp(&frames[index]) {
            return index;
        }
        for offset in 1..=self.search_radius {
            if let Some(left) = index.checked_sub(offset) {
                if self.sharpness.is_sharp(&frames[left]) {
                    return left;
                }
            }
            let right = index + offset;
            if right < frames.len() && self.sharpness.is_sharp(&frames[right]) {
                return right;
            }
        }
        index
    }
}
