use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use ::inpaint::prelude::*;
use tracing::debug;

use crate::error::RemovalError;
use crate::mask::repair_count;

/// Neighbourhood radius of the fast marching inpainting.
pub const INPAINT_RADIUS: i32 = 3;

/// Reconstruct the pixels marked in `mask` from their surroundings (Telea's
/// fast marching method). Pixels not marked keep their values.
pub fn inpaint(frame: &RgbImage, mask: &GrayImage, radius: i32) -> Result<RgbImage> {
    let (width, height) = frame.dimensions();
    if mask.dimensions() != (width, height) {
        return Err(RemovalError::DimensionMismatch {
            frame_width: width,
            frame_height: height,
            mask_width: mask.width(),
            mask_height: mask.height(),
        }
        .into());
    }

    let marked = repair_count(mask);
    if marked == 0 {
        return Ok(frame.clone());
    }
    debug!(marked, radius, "inpainting masked pixels");

    let mut out = frame.clone();
    out.telea_inpaint(mask, radius).context("telea inpainting failed")?;
    Ok(out)
}
