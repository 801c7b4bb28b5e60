use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::mask::LEAVE;
use crate::rect::PixelRect;

const TEXT_SCALE: f32 = 16.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const TEXT_LINE_HEIGHT: i32 = 18;
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const REPAIR_TINT: Rgb<u8> = Rgb([255, 0, 64]);

/// Saves annotated frames showing the located box and the repair mask.
pub struct DebugRenderer {
    dir: PathBuf,
    font: Option<FontVec>,
}

impl DebugRenderer {
    /// Create the output directory and try to load a label font.
    pub fn new(dir: &Path, font_path: Option<&Path>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create debug frames directory {}", dir.display()))?;
        info!(?dir, "debug frames directory ready");

        let font = font_path.and_then(Self::load_font);
        Ok(Self {
            dir: dir.to_path_buf(),
            font,
        })
    }

    /// Save the seed frame at source resolution with the located box outlined.
    pub fn save_seed(&self, image: &RgbImage, bbox: PixelRect, working: (u32, u32)) -> Result<()> {
        let mut img = image.clone();
        let scaled = bbox.scale_to(img.width(), img.height(), working.0, working.1);
        outline(&mut img, scaled);
        self.draw_lines(&mut img, &[format!("box {}x{}+{}+{}", bbox.w, bbox.h, bbox.x, bbox.y)]);

        let path = self.dir.join("seed.png");
        img.save(&path)
            .with_context(|| format!("failed to save seed frame to {}", path.display()))?;
        debug!(?path, "saved seed frame");
        Ok(())
    }

    /// Save a working-resolution frame with its repair mask tinted in.
    pub fn save_frame(
        &self,
        frame_number: u32,
        working: &RgbImage,
        mask: &GrayImage,
        bbox: PixelRect,
    ) -> Result<()> {
        let mut img = working.clone();
        let mut repaired = 0usize;
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] != LEAVE {
                img.put_pixel(x, y, REPAIR_TINT);
                repaired += 1;
            }
        }
        outline(&mut img, bbox);
        self.draw_lines(&mut img, &[format!("F:{frame_number}"), format!("R:{repaired}")]);

        let path = self.dir.join(format!("frame_{frame_number:08}.png"));
        img.save(&path)
            .with_context(|| format!("failed to save debug frame to {}", path.display()))?;
        debug!(?path, repaired, "saved debug frame");
        Ok(())
    }

    fn draw_lines(&self, img: &mut RgbImage, lines: &[String]) {
        let Some(font) = &self.font else { return };
        let scale = PxScale::from(TEXT_SCALE);
        let mut y = 4;
        for line in lines {
            draw_text_mut(img, TEXT_COLOR, 4, y, scale, font, line);
            y += TEXT_LINE_HEIGHT;
        }
    }

    fn load_font(path: &Path) -> Option<FontVec> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?path, error = %e, "failed to read font file");
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(?path, "loaded debug font");
                Some(font)
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to parse font file");
                None
            }
        }
    }
}

fn outline(img: &mut RgbImage, bbox: PixelRect) {
    if bbox.is_empty() {
        return;
    }
    let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.w, bbox.h);
    draw_hollow_rect_mut(img, rect, BOX_COLOR);
}
