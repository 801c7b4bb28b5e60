//! Finds the timestamp overlay by matching glyph templates against a seed frame.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use tracing::{debug, info, warn};

use crate::error::RemovalError;
use crate::rect::PixelRect;

/// Correlation score a position needs to count as a glyph match.
pub const MATCH_THRESHOLD: f32 = 0.8;

/// Variances at or below this are treated as flat (undefined correlation).
const FLAT_VARIANCE: f64 = 1e-6;

/// A single-channel reference image of one timestamp glyph.
pub struct Template {
    pub name: String,
    pub image: GrayImage,
}

/// One position whose correlation reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Load every decodable image in `dir` as a luma template, in file name order.
pub fn load_templates(dir: &Path) -> Result<Vec<Template>> {
    if !dir.is_dir() {
        return Err(RemovalError::InputNotFound(dir.to_path_buf()).into());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list template directory {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", dir.display()))?
            .path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let image = match image::open(&path) {
            Ok(img) => img.into_luma8(),
            Err(e) => {
                warn!(?path, error = %e, "skipping unreadable template");
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(%name, width = image.width(), height = image.height(), "loaded template");
        templates.push(Template { name, image });
    }

    if templates.is_empty() {
        return Err(RemovalError::NoTemplates(dir.to_path_buf()).into());
    }

    info!(?dir, count = templates.len(), "templates loaded");
    Ok(templates)
}

/// Sum of the `w` x `h` window at (`x`, `y`) from an integral image with a zero border.
fn window_sum(integral: &ImageBuffer<Luma<u64>, Vec<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
    let at = |px: u32, py: u32| integral.get_pixel(px, py)[0];
    at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)
}

/// Zero-mean normalized cross-correlation of `template` at every position of `image`.
///
/// The result is `(W - w + 1) x (H - h + 1)` with scores in `[-1, 1]`. Positions
/// where either the window or the template is flat score 0.
pub fn correlation_map(image: &GrayImage, template: &GrayImage) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let (tw, th) = template.dimensions();
    let cross = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let (out_w, out_h) = cross.dimensions();
    let mut scores = ImageBuffer::<Luma<f32>, Vec<f32>>::new(out_w, out_h);

    let n = (tw as f64) * (th as f64);
    let (t_sum, t_sq_sum) = template.pixels().fold((0f64, 0f64), |(s, sq), p| {
        let v = p[0] as f64;
        (s + v, sq + v * v)
    });
    let t_var = t_sq_sum - t_sum * t_sum / n;
    if t_var <= FLAT_VARIANCE {
        warn!(width = tw, height = th, "template is flat, it cannot match anything");
        return scores;
    }

    let sums = integral_image::<_, u64>(image);
    let sq_sums = integral_squared_image::<_, u64>(image);

    for y in 0..out_h {
        for x in 0..out_w {
            let w_sum = window_sum(&sums, x, y, tw, th) as f64;
            let w_sq_sum = window_sum(&sq_sums, x, y, tw, th) as f64;
            let w_var = w_sq_sum - w_sum * w_sum / n;
            if w_var <= FLAT_VARIANCE {
                continue;
            }
            let numerator = cross.get_pixel(x, y)[0] as f64 - w_sum * t_sum / n;
            let score = (numerator / (w_var * t_var).sqrt()).clamp(-1.0, 1.0);
            scores.put_pixel(x, y, Luma([score as f32]));
        }
    }

    scores
}

/// Every position where `template` correlates with `image` at or above `threshold`.
pub fn find_matches(image: &GrayImage, template: &GrayImage, threshold: f32) -> Vec<TemplateMatch> {
    if template.width() > image.width() || template.height() > image.height() {
        return Vec::new();
    }

    correlation_map(image, template)
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] >= threshold)
        .map(|(x, y, p)| TemplateMatch { x, y, score: p[0] })
        .collect()
}

/// Running extent of all accepted matches.
#[derive(Debug, Default)]
struct BoxAccumulator {
    min_x: Option<u32>,
    min_y: Option<u32>,
    max_right: u32,
    max_height: u32,
    matches: usize,
    best_score: f32,
}

impl BoxAccumulator {
    fn add(&mut self, m: &TemplateMatch, template_w: u32, template_h: u32) {
        self.min_x = Some(self.min_x.map_or(m.x, |v| v.min(m.x)));
        self.min_y = Some(self.min_y.map_or(m.y, |v| v.min(m.y)));
        self.max_right = self.max_right.max(m.x + template_w);
        self.max_height = self.max_height.max(template_h);
        self.matches += 1;
        self.best_score = self.best_score.max(m.score);
    }

    fn finish(self) -> Option<PixelRect> {
        let (x, y) = (self.min_x?, self.min_y?);
        Some(PixelRect {
            x,
            y,
            w: self.max_right - x,
            h: self.max_height,
        })
    }
}

/// Locate the timestamp overlay in `frame` (already at working resolution).
///
/// All matches of all templates are folded into one box: the smallest matched
/// x and y give the origin, the largest `x + template width` gives the right
/// edge and the tallest matched template gives the height. A stray match far
/// from the real overlay stretches the box; nothing filters it out.
pub fn locate_timestamp(frame: &RgbImage, templates: &[Template]) -> Result<PixelRect> {
    let gray = image::imageops::grayscale(frame);
    let mut acc = BoxAccumulator::default();

    for template in templates {
        let (tw, th) = template.image.dimensions();
        if tw > gray.width() || th > gray.height() {
            warn!(
                name = %template.name,
                template_width = tw,
                template_height = th,
                frame_width = gray.width(),
                frame_height = gray.height(),
                "template larger than frame, skipping"
            );
            continue;
        }

        let matches = find_matches(&gray, &template.image, MATCH_THRESHOLD);
        let best = matches.iter().map(|m| m.score).fold(f32::NAN, f32::max);
        debug!(name = %template.name, count = matches.len(), best, "template matches");
        for m in &matches {
            acc.add(m, tw, th);
        }
    }

    let (total, best_score) = (acc.matches, acc.best_score);
    let bbox = acc.finish().ok_or(RemovalError::TimestampNotLocated {
        threshold: MATCH_THRESHOLD,
    })?;

    if !bbox.fits_within(gray.width(), gray.height()) {
        return Err(RemovalError::BoxOutOfBounds {
            bbox,
            width: gray.width(),
            height: gray.height(),
        }
        .into());
    }

    info!(
        x = bbox.x,
        y = bbox.y,
        w = bbox.w,
        h = bbox.h,
        matches = total,
        best_score,
        "timestamp located"
    );
    Ok(bbox)
}
