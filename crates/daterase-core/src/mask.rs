use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::error::RemovalError;
use crate::rect::PixelRect;

/// All channels below this mark dark overlay text.
const DARK_LIMIT: u8 = 50;
/// All channels above this mark bright overlay text.
const BRIGHT_LIMIT: u8 = 210;

pub const REPAIR: u8 = 255;
pub const LEAVE: u8 = 0;

/// How a pixel inside the bounding box is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskClass {
    Repair,
    Leave,
}

/// Near-black or near-white in every channel counts as overlay text, whatever
/// the text colour actually is. Scene content that happens to be that dark or
/// bright inside the box is repaired too.
pub fn classify_pixel(rgb: Rgb<u8>) -> MaskClass {
    let [r, g, b] = rgb.0;
    if r < DARK_LIMIT && g < DARK_LIMIT && b < DARK_LIMIT {
        MaskClass::Repair
    } else if r > BRIGHT_LIMIT && g > BRIGHT_LIMIT && b > BRIGHT_LIMIT {
        MaskClass::Repair
    } else {
        MaskClass::Leave
    }
}

/// Build the repair mask for `frame`. Only pixels inside `bbox` can be marked.
pub fn build_mask(frame: &RgbImage, bbox: PixelRect) -> Result<GrayImage, RemovalError> {
    let (width, height) = frame.dimensions();
    if !bbox.fits_within(width, height) {
        return Err(RemovalError::BoxOutOfBounds {
            bbox,
            width,
            height,
        });
    }

    let mut mask = GrayImage::from_pixel(width, height, Luma([LEAVE]));
    for y in bbox.y..bbox.bottom() {
        for x in bbox.x..bbox.right() {
            if classify_pixel(*frame.get_pixel(x, y)) == MaskClass::Repair {
                mask.put_pixel(x, y, Luma([REPAIR]));
            }
        }
    }
    Ok(mask)
}

/// Number of pixels marked for repair.
pub fn repair_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != LEAVE).count()
}
