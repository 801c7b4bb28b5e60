pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod sequence;

use anyhow::Result;

use frame::Frame;

/// An ordered, finite, non-restartable supply of frames of a fixed size.
pub trait FrameSource {
    /// Declared frame width at source resolution.
    fn width(&self) -> u32;

    /// Declared frame height at source resolution.
    fn height(&self) -> u32;

    /// Nominal frame rate, or 0.0 when the source has none.
    fn fps(&self) -> f64;

    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
