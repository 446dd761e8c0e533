//! Synthetic camera (`stub://` URLs).
//!
//! Produces RGB frames at `target_fps` on the supplied clock:
//! - a moving stripe pattern, so most frames are sharp
//! - every `BLUR_EVERY`th frame is washed out, to exercise sharp-frame search
//! - the pattern changes every `SCENE_EVERY` frames, to simulate motion
//! - a little per-frame noise from `rand`

use anyhow::{anyhow, Result};
use rand::Rng;
use std::sync::Arc;

use crate::capture::FrameProvider;
use crate::clock::MonotonicClock;
use crate::frame::{Frame, PixelFormat};

const BLUR_EVERY: u64 = 7;
const SCENE_EVERY: u64 = 50;

/// Camera source configuration.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Only `stub://` URLs are served in-process.
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 15,
            width: 320,
            height: 240,
        }
    }
}

/// Statistics for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

pub struct SyntheticCamera {
    config: SourceConfig,
    clock: Arc<dyn MonotonicClock>,
    frame_count: u64,
    last_slot: Option<u64>,
    latest: Option<Frame>,
    scene_state: u8,
}

impl SyntheticCamera {
    pub fn new(config: SourceConfig, clock: Arc<dyn MonotonicClock>) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "source {} needs an external camera driver; publish its frames through LatestFrameSlot",
                config.url
            ));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        log::info!(
            "synthetic camera {} at {} fps ({}x{})",
            config.url,
            config.target_fps,
            config.width,
            config.height
        );
        Ok(Self {
            config,
            clock,
            frame_count: 0,
            last_slot: None,
            latest: None,
            scene_state: 0,
        })
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    /// Newest frame, generating one when a new frame period has started.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let now = self.clock.now_ms();
        let slot = now * self.config.target_fps as u64 / 1000;
        if self.last_slot != Some(slot) {
            self.last_slot = Some(slot);
            match self.capture(now) {
                Ok(frame) => self.latest = Some(frame),
                Err(e) => log::error!("synthetic capture failed: {:#}", e),
            }
        }
        self.latest.clone()
    }

    fn capture(&mut self, now_ms: u64) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % SCENE_EVERY == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = self.generate_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Rgb8,
            now_ms,
        )
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height * 3];
        let mut rng = rand::thread_rng();

        if self.frame_count % BLUR_EVERY == 0 {
            let level = 110 + self.scene_state % 40;
            for px in pixels.iter_mut() {
                *px = level.saturating_add(rng.gen_range(0..3));
            }
            return pixels;
        }

        let stripe = 10 + (self.scene_state as usize % 4) * 4;
        let shift = self.frame_count as usize;
        for y in 0..height {
            for x in 0..width {
                let on = ((x + shift) / stripe) % 2 == 0;
                let base: u8 = if on { 220 } else { 40 };
                let noise: u8 = rng.gen_range(0..6);
                let offset = (y * width + x) * 3;
                pixels[offset] = base.saturating_add(noise);
                pixels[offset + 1] = base.saturating_add(noise).wrapping_sub(self.scene_state);
                pixels[offset + 2] = base.saturating_add(noise);
            }
        }
        pixels
    }
}

impl FrameProvider for SyntheticCamera {
    fn poll_frame(&mut self) -> Option<Frame> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::quality::SharpnessConfig;

    fn camera(clock: &ManualClock) -> SyntheticCamera {
        let config = SourceConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        };
        SyntheticCamera::new(config, Arc::new(clock.clone())).unwrap()
    }

    #[test]
    fn rejects_non_stub_urls() {
        let config = SourceConfig {
            url: "rtsp://192.168.1.20/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(SyntheticCamera::new(config, Arc::new(ManualClock::new(0))).is_err());
    }

    #[test]
    fn emits_one_frame_per_period() {
        let clock = ManualClock::new(0);
        let mut cam = camera(&clock);

        let first = cam.poll_frame().unwrap();
        let again = cam.poll_frame().unwrap();
        assert!(first.same_capture(&again));

        clock.advance(100);
        let next = cam.poll_frame().unwrap();
        assert_eq!(next.captured_at_ms, 100);
        assert!(!next.same_capture(&first));
        assert_eq!(cam.stats().frames_captured, 2);
    }

    #[test]
    fn mixes_sharp_and_blurred_frames() {
        let clock = ManualClock::new(0);
        let mut cam = camera(&clock);
        let sharpness = SharpnessConfig::default();

        let mut sharp = 0;
        let mut blurred = 0;
        for _ in 0..14 {
            let frame = cam.poll_frame().unwrap();
            if sharpness.is_sharp(&frame) {
                sharp += 1;
            } else {
                blurred += 1;
            }
            clock.advance(100);
        }
        assert_eq!(blurred, 2);
        assert_eq!(sharp, 12);
    }
}
