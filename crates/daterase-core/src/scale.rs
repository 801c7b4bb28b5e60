use image::imageops::{self, FilterType};
use image::RgbImage;

/// Working frames are processed at this fraction of the source resolution.
pub const WORKING_SCALE_DIVISOR: u32 = 2;

/// Size of the working frame for a source of `width` x `height`.
pub fn working_size(width: u32, height: u32) -> (u32, u32) {
    (
        (width / WORKING_SCALE_DIVISOR).max(1),
        (height / WORKING_SCALE_DIVISOR).max(1),
    )
}

/// Reduce a source frame to working resolution with 2x2 area averaging.
pub fn to_working(image: &RgbImage) -> RgbImage {
    let (w, h) = working_size(image.width(), image.height());
    imageops::thumbnail(image, w, h)
}

/// Scale a working frame back up to the source resolution.
pub fn to_source(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}
