//! Frame sharpness heuristic.
//!
//! Samples an interior grid of pixels every `stride` pixels, sums the absolute
//! luminance gradient towards the right and lower samples and averages it. A
//! frame is sharp when the average reaches `threshold`. This approximates edge
//! energy; it is not an edge detector.

use crate::frame::Frame;

/// Reference sampling stride in pixels.
pub const DEFAULT_SHARPNESS_STRIDE: u32 = 8;

/// Reference mean gradient for a frame to count as sharp.
pub const DEFAULT_SHARPNESS_THRESHOLD: f32 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SharpnessConfig {
    pub stride: u32,
    pub threshold: f32,
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_SHARPNESS_STRIDE,
            threshold: DEFAULT_SHARPNESS_THRESHOLD,
        }
    }
}

impl SharpnessConfig {
    /// Mean sampled gradient, or `None` when the frame is too small to judge
    /// (less than twice the stride in either dimension).
    pub fn score(&self, frame: &Frame) -> Option<f32> {
        let stride = self.stride.max(1);
        let min_dim = stride.saturating_mul(2);
        if frame.width < min_dim || frame.height < min_dim {
            return None;
        }

        let mut total = 0.0f32;
        let mut samples = 0u32;

        // Border of one stride; every sample has a right and lower neighbour.
        let mut y = stride;
        while y + stride < frame.height {
            let mut x = stride;
            while x + stride < frame.width {
                let here = frame.luminance(x, y);
                let right = frame.luminance(x + stride, y);
                let below = frame.luminance(x, y + stride);
                total += (here - right).abs() + (here - below).abs();
                samples += 1;
                x += stride;
            }
            y += stride;
        }

        if samples == 0 {
            // A dimension of exactly 2x stride leaves no interior grid.
            return None;
        }
        Some(total / samples as f32)
    }

    pub fn is_sharp(&self, frame: &Frame) -> bool {
        match self.score(frame) {
            Some(score) => score >= self.threshold,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(pixels, width, height, PixelFormat::Rgb8, 0).unwrap()
    }

    fn vertical_stripes(width: u32, height: u32, stripe: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _y in 0..height {
            for x in 0..width {
                let v = if (x / stripe) % 2 == 0 { 0 } else { 255 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(pixels, width, height, PixelFormat::Rgb8, 0).unwrap()
    }

    #[test]
    fn uniform_frame_is_not_sharp() {
        let cfg = SharpnessConfig::default();
        let frame = uniform(64, 48, [90, 120, 200]);
        assert_eq!(cfg.score(&frame), Some(0.0));
        assert!(!cfg.is_sharp(&frame));
    }

    #[test]
    fn stripes_wider_than_stride_are_sharp() {
        let cfg = SharpnessConfig::default();
        let frame = vertical_stripes(96, 64, 12);
        let score = cfg.score(&frame).unwrap();
        assert!(score >= cfg.threshold, "score {score}");
        assert!(cfg.is_sharp(&frame));
    }

    #[test]
    fn tiny_frames_are_trivially_sharp() {
        let cfg = SharpnessConfig::default();
        let frame = uniform(15, 64, [0, 0, 0]);
        assert_eq!(cfg.score(&frame), None);
        assert!(cfg.is_sharp(&frame));
    }

    #[test]
    fn grid_needs_more_than_twice_the_stride() {
        let cfg = SharpnessConfig::default();
        assert_eq!(cfg.score(&uniform(16, 64, [9, 9, 9])), None);
        assert_eq!(cfg.score(&uniform(17, 64, [9, 9, 9])), Some(0.0));
    }

    #[test]
    fn threshold_is_tunable() {
        let frame = vertical_stripes(96, 64, 12);
        let strict = SharpnessConfig {
            stride: DEFAULT_SHARPNESS_STRIDE,
            threshold: 10_000.0,
        };
        assert!(!strict.is_sharp(&frame));
    }
}
