//! Captured frames and the retention window.
//!
//! - `Frame`: immutable pixel buffer plus monotonic capture timestamp. Cheap to
//!   clone; the pixel storage is shared and zeroized when the last handle drops.
//! - `FrameBuffer`: bounded, capture-ordered window of recent frames that the
//!   frame pipeline owns and the selector reads from.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use zeroize::Zeroize;

/// Default cap on retained frames.
pub const DEFAULT_BUFFER_FRAMES: usize = 30;

/// Default retention window, measured back from the newest frame.
pub const DEFAULT_RETENTION_MS: u64 = 3_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Luma8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Luma8 => 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

struct PixelData(Vec<u8>);

impl Drop for PixelData {
    fn drop(&mut self) {
        // Camera images of the user's surroundings do not outlive the last handle.
        self.0.zeroize();
    }
}

/// A captured camera frame.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<PixelData>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Monotonic capture time in milliseconds.
    pub captured_at_ms: u64,
}

impl Frame {
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        captured_at_ms: u64,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", width, height))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} {:?}",
                pixels.len(),
                expected,
                width,
                height,
                format
            ));
        }
        Ok(Self {
            pixels: Arc::new(PixelData(pixels)),
            width,
            height,
            format,
            captured_at_ms,
        })
    }

    /// Decode a JPEG image into an RGB frame.
    #[cfg(feature = "decode-jpeg")]
    pub fn decode_jpeg(bytes: &[u8], captured_at_ms: u64) -> Result<Self> {
        use anyhow::Context;

        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .context("decode JPEG frame")?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, PixelFormat::Rgb8, captured_at_ms)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels.0
    }

    /// Weighted luminance at `(x, y)`. Coordinates must be inside the frame.
    pub fn luminance(&self, x: u32, y: u32) -> f32 {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.pixels.0[offset..offset + bpp];
        match self.format {
            PixelFormat::Luma8 => px[0] as f32,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
            }
        }
    }

    /// Mean luminance over a coarse grid; used by analyzers for exposure checks.
    pub fn mean_luminance(&self, stride: u32) -> f32 {
        let stride = stride.max(1);
        let mut sum = 0.0f32;
        let mut count = 0u32;
        let mut y = 0;
        while y < self.height {
            let mut x = 0;
            while x < self.width {
                sum += self.luminance(x, y);
                count += 1;
                x += stride;
            }
            y += stride;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// True when both handles share the same pixel storage.
    pub fn same_capture(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print pixel content.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("captured_at_ms", &self.captured_at_ms)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// FrameBuffer: bounded retention window
// ----------------------------------------------------------------------------

/// Bounded ring buffer of recent frames, ordered by capture time.
///
/// - Evicts frames older than `retention_ms` relative to the newest frame
/// - Evicts the oldest frame when `max_frames` is reached
/// - Rejects frames that are not newer than the current newest frame
pub struct FrameBuffer {
    buffer: VecDeque<Frame>,
    max_frames: usize,
    retention_ms: u64,
}

impl FrameBuffer {
    pub fn new(max_frames: usize, retention_ms: u64) -> Self {
        let max_frames = max_frames.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_frames),
            max_frames,
            retention_ms,
        }
    }

    /// Push a frame. Returns false if the frame was stale and ignored.
    pub fn push(&mut self, frame: Frame) -> bool {
        if let Some(newest) = self.buffer.back() {
            if frame.captured_at_ms <= newest.captured_at_ms {
                return false;
            }
        }

        let horizon = frame.captured_at_ms.saturating_sub(self.retention_ms);
        while let Some(oldest) = self.buffer.front() {
            if oldest.captured_at_ms < horizon {
                self.buffer.pop_front();
            } else {
                break;
            }
        }

        while self.buffer.len() >= self.max_frames {
            self.buffer.pop_front();
        }

        self.buffer.push_back(frame);
        true
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.buffer.back()
    }

    /// Ordered copy of the window (pixel storage is shared, not copied).
    pub fn snapshot(&self) -> Vec<Frame> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Memory usage estimate.
    pub fn memory_bytes(&self) -> usize {
        self.buffer.iter().map(|f| f.pixels().len()).sum()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_FRAMES, DEFAULT_RETENTION_MS)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(value: u8, at_ms: u64) -> Frame {
        Frame::new(vec![value; 4 * 4 * 3], 4, 4, PixelFormat::Rgb8, at_ms).unwrap()
    }

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0; 10], 4, 4, PixelFormat::Rgb8, 0).is_err());
        assert!(Frame::new(vec![0; 16], 4, 4, PixelFormat::Luma8, 0).is_ok());
    }

    #[test]
    fn luminance_uses_weighted_rgb() {
        let frame = Frame::new(vec![255, 0, 0], 1, 1, PixelFormat::Rgb8, 0).unwrap();
        assert!((frame.luminance(0, 0) - 76.245).abs() < 0.01);

        let white = Frame::new(vec![255, 255, 255, 0], 1, 1, PixelFormat::Rgba8, 0).unwrap();
        assert!((white.luminance(0, 0) - 255.0).abs() < 0.01);
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = gray_frame(7, 42);
        let printed = format!("{:?}", frame);
        assert!(printed.contains("captured_at_ms: 42"));
        assert!(!printed.contains("pixels"));
    }

    #[test]
    fn frame_buffer_enforces_capacity() {
        let mut buf = FrameBuffer::new(5, 60_000);
        for i in 0..12 {
            buf.push(gray_frame(0, i * 10));
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.snapshot()[0].captured_at_ms, 70);
        assert_eq!(buf.latest().unwrap().captured_at_ms, 110);
    }

    #[test]
    fn frame_buffer_evicts_by_retention() {
        let mut buf = FrameBuffer::new(100, 500);
        for at in [0, 100, 200, 600, 700] {
            buf.push(gray_frame(0, at));
        }
        let kept: Vec<u64> = buf.snapshot().iter().map(|f| f.captured_at_ms).collect();
        assert_eq!(kept, vec![200, 600, 700]);
    }

    #[test]
    fn frame_buffer_ignores_stale_frames() {
        let mut buf = FrameBuffer::default();
        assert!(buf.push(gray_frame(0, 100)));
        assert!(!buf.push(gray_frame(0, 100)));
        assert!(!buf.push(gray_frame(0, 50)));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.memory_bytes(), 48);
    }
}
