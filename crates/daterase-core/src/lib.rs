//! Removes burned-in camera timestamps from videos and frame sequences.
//!
//! The pipeline locates the overlay once from glyph templates, then for every
//! frame masks the overlay's near-black and near-white pixels, inpaints them,
//! and writes the running background estimate of the cleaned frames.

pub mod background;
pub mod debug;
pub mod error;
pub mod inpainting;
pub mod locate;
pub mod mask;
pub mod pipeline;
pub mod rect;
pub mod scale;
pub mod video;

pub use error::RemovalError;
pub use pipeline::{remove_date, remove_date_2, PipelineConfig, RemovalSummary};
