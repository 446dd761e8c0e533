//! Frame sources.
//!
//! The physical camera driver lives outside this crate. Sources here either
//! bridge frames a driver publishes (`LatestFrameSlot`) or synthesize them
//! for tests and demos (`SyntheticCamera`, selected with `stub://` URLs).
//!
//! Every source is exposed as a non-blocking `FrameProvider` probe returning
//! the newest frame; consumers de-duplicate by capture timestamp.

mod slot;
pub mod synthetic;

pub use slot::LatestFrameSlot;
pub use synthetic::{SourceConfig, SyntheticCamera};
