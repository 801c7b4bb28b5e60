use std::path::PathBuf;

use thiserror::Error;

use crate::rect::PixelRect;

/// Domain failures of the removal pipeline.
///
/// Everything that is not a precondition of the pipeline itself (process
/// spawning, pipe I/O, image decoding) travels as `anyhow::Error` with context.
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("input does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("no template images found in {}", .0.display())]
    NoTemplates(PathBuf),

    #[error("timestamp overlay not located: no template scored at or above {threshold}")]
    TimestampNotLocated { threshold: f32 },

    #[error("bounding box {bbox:?} does not fit inside a {width}x{height} frame")]
    BoxOutOfBounds {
        bbox: PixelRect,
        width: u32,
        height: u32,
    },

    #[error("no frames available from {}", .0.display())]
    EmptySource(PathBuf),

    #[error(
        "frame {} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}",
        .path.display()
    )]
    FrameSizeMismatch {
        path: PathBuf,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("mask is {mask_width}x{mask_height} but frame is {frame_width}x{frame_height}")]
    DimensionMismatch {
        frame_width: u32,
        frame_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("background model needs at least one mixture mode")]
    NoMixtureModes,

    #[error("background model is {model_width}x{model_height} but frame is {frame_width}x{frame_height}")]
    ModelSizeMismatch {
        model_width: u32,
        model_height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}
