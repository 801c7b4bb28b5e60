use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info};

use super::frame::Frame;
use super::FrameSource;
use crate::error::RemovalError;

/// Still frames carry no rate; timestamps and the output assume this one.
pub const SEQUENCE_FPS: f64 = 24.0;

const FRAME_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// List the frame images in `dir`, sorted by file name.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RemovalError::InputNotFound(dir.to_path_buf()).into());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", dir.display()))?
            .path();
        if path.is_file() && is_frame_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    debug!(?dir, count = files.len(), "listed frame files");
    Ok(files)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("failed to read frame image {}", path.display()))?
        .into_rgb8())
}

/// Frames read from a directory of still images, in file name order.
///
/// The first sorted file fixes the frame size; every later file must match it.
pub struct ImageSequence {
    files: Vec<PathBuf>,
    next_index: usize,
    width: u32,
    height: u32,
    first: Option<RgbImage>,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let files = list_frame_files(dir)?;
        let Some(seed) = files.first() else {
            return Err(RemovalError::EmptySource(dir.to_path_buf()).into());
        };

        let first = load_rgb(seed)?;
        let (width, height) = first.dimensions();
        info!(?dir, frames = files.len(), width, height, seed = ?seed, "image sequence opened");

        Ok(Self {
            files,
            next_index: 0,
            width,
            height,
            first: Some(first),
        })
    }
}

impl FrameSource for ImageSequence {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fps(&self) -> f64 {
        SEQUENCE_FPS
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.next_index) else {
            return Ok(None);
        };

        let image = match self.first.take() {
            Some(image) => image,
            None => load_rgb(path)?,
        };

        if image.dimensions() != (self.width, self.height) {
            return Err(RemovalError::FrameSizeMismatch {
                path: path.clone(),
                expected_width: self.width,
                expected_height: self.height,
                actual_width: image.width(),
                actual_height: image.height(),
            }
            .into());
        }

        let frame = Frame::new(image, self.next_index as u32, SEQUENCE_FPS);
        debug!(frame_number = frame.frame_number, ?path, "loaded frame");
        self.next_index += 1;
        Ok(Some(frame))
    }
}
