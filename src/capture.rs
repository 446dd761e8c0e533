//! Polling frame capture.
//!
//! The camera driver exposes a non-blocking "newest frame, if any" probe. The
//! waiter polls it on a fixed interval with `tokio::time::sleep` between
//! probes, so waiting never blocks the runtime.

use std::time::Duration;
use tokio::time::Instant;

use crate::frame::Frame;

/// Reference interval between provider probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reference per-attempt timeout used for burst captures.
pub const DEFAULT_BURST_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Non-blocking probe for the newest captured frame.
pub trait FrameProvider: Send {
    fn poll_frame(&mut self) -> Option<Frame>;
}

impl<F> FrameProvider for F
where
    F: FnMut() -> Option<Frame> + Send,
{
    fn poll_frame(&mut self) -> Option<Frame> {
        self()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameWaiter {
    pub poll_interval: Duration,
    pub burst_attempt_timeout: Duration,
}

impl Default for FrameWaiter {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            burst_attempt_timeout: DEFAULT_BURST_ATTEMPT_TIMEOUT,
        }
    }
}

impl FrameWaiter {
    /// Poll until the provider yields a frame or `timeout` elapses.
    pub async fn wait_for_frame<P>(&self, timeout: Duration, provider: &mut P) -> Option<Frame>
    where
        P: FrameProvider + ?Sized,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = provider.poll_frame() {
                return Some(frame);
            }
            let now = Instant::now();
            if now >= deadline {
                log::debug!("no frame within {:?}", timeout);
                return None;
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    /// Capture up to `count` frames, pausing `interval` after each success
    /// except the last attempt. Timed-out attempts are skipped, not retried.
    pub async fn capture_multiple_frames<P>(
        &self,
        count: usize,
        interval: Duration,
        provider: &mut P,
    ) -> Vec<Frame>
    where
        P: FrameProvider + ?Sized,
    {
        let mut frames = Vec::with_capacity(count);
        for attempt in 0..count {
            match self
                .wait_for_frame(self.burst_attempt_timeout, provider)
                .await
            {
                Some(frame) => {
                    frames.push(frame);
                    if attempt + 1 < count {
                        tokio::time::sleep(interval).await;
                    }
                }
                None => {
                    log::debug!("burst attempt {} of {} timed out", attempt + 1, count);
                }
            }
        }
        if frames.len() < count {
            log::warn!("burst captured {} of {} frames", frames.len(), count);
        }
        frames
    }
}
