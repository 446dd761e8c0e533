use std::sync::{Arc, Mutex};

use crate::capture::FrameProvider;
use crate::frame::Frame;

/// Newest-frame slot shared between a camera driver and the pipeline.
///
/// The driver calls `publish` from its capture callback; the pipeline probes
/// the slot. Older frames are overwritten, never queued.
#[derive(Clone, Default)]
pub struct LatestFrameSlot {
    latest: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame unless it is older than the current one.
    pub fn publish(&self, frame: Frame) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        match latest.as_ref() {
            Some(current) if current.captured_at_ms > frame.captured_at_ms => {
                log::debug!(
                    "ignoring out-of-order frame {} (holding {})",
                    frame.captured_at_ms,
                    current.captured_at_ms
                );
            }
            _ => *latest = Some(frame),
        }
    }

    pub fn peek(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl FrameProvider for LatestFrameSlot {
    fn poll_frame(&mut self) -> Option<Frame> {
        self.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn frame(at_ms: u64) -> Frame {
        Frame::new(vec![0; 4], 2, 2, PixelFormat::Luma8, at_ms).unwrap()
    }

    #[test]
    fn keeps_newest_frame_only() {
        let slot = LatestFrameSlot::new();
        let mut probe = slot.clone();
        assert!(probe.poll_frame().is_none());

        slot.publish(frame(100));
        slot.publish(frame(50));
        assert_eq!(probe.poll_frame().unwrap().captured_at_ms, 100);

        slot.publish(frame(200));
        assert_eq!(probe.poll_frame().unwrap().captured_at_ms, 200);

        slot.clear();
        assert!(probe.poll_frame().is_none());
    }
}
