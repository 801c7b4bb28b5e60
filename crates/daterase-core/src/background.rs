//! Per-pixel Gaussian mixture background model.
//!
//! Each pixel keeps up to `max_modes` Gaussians (RGB mean, one shared variance,
//! a weight), sorted by weight. Every frame either reinforces the first mode it
//! fits or replaces the weakest mode. The background estimate is the
//! weight-averaged mean of the strongest modes that together explain
//! `background_ratio` of the observations.

use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::error::RemovalError;

/// Foreground value in the mask returned by [`BackgroundModel::apply`].
pub const FOREGROUND: u8 = 255;
/// Background value in the mask returned by [`BackgroundModel::apply`].
pub const BACKGROUND: u8 = 0;

/// Tuning of the mixture model.
#[derive(Debug, Clone, Copy)]
pub struct MixtureParams {
    /// Upper bound on Gaussians per pixel.
    pub max_modes: usize,
    /// Frames that make up the automatic learning rate window.
    pub history: u32,
    /// Squared Mahalanobis distance under which a pixel counts as background.
    pub var_threshold: f32,
    /// Share of total weight the background modes must cover.
    pub background_ratio: f32,
    /// Squared Mahalanobis distance under which a sample updates an existing mode.
    pub var_threshold_gen: f32,
    /// Variance given to a freshly created mode.
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Weight decay that prunes modes nobody supports any more.
    pub complexity_reduction: f32,
}

impl Default for MixtureParams {
    fn default() -> Self {
        Self {
            max_modes: 5,
            history: 500,
            var_threshold: 16.0,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Running background model for one clip.
///
/// The model is owned by whoever drives the frame loop and is updated in frame
/// order; frame N's state depends on frame N-1's.
pub struct BackgroundModel {
    width: u32,
    height: u32,
    params: MixtureParams,
    modes: Vec<Mode>,
    modes_used: Vec<usize>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(width: u32, height: u32, params: MixtureParams) -> Result<Self, RemovalError> {
        if params.max_modes == 0 {
            return Err(RemovalError::NoMixtureModes);
        }
        let pixels = width as usize * height as usize;
        debug!(width, height, max_modes = params.max_modes, "background model created");
        Ok(Self {
            width,
            height,
            params,
            modes: vec![Mode::default(); pixels * params.max_modes],
            modes_used: vec![0; pixels],
            frames_seen: 0,
        })
    }

    /// Learning rate for the frame about to be applied.
    ///
    /// The very first frame and `None` use `1 / min(2 * n, history)`.
    fn learning_rate(&self, requested: Option<f32>) -> f32 {
        match requested {
            Some(rate) if rate >= 0.0 && self.frames_seen > 1 => rate,
            _ => {
                let window = (2 * self.frames_seen).min(self.params.history as u64).max(1);
                1.0 / window as f32
            }
        }
    }

    /// Feed one frame into the model and return its foreground mask.
    pub fn apply(
        &mut self,
        frame: &RgbImage,
        learning_rate: Option<f32>,
    ) -> Result<GrayImage, RemovalError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(RemovalError::ModelSizeMismatch {
                model_width: self.width,
                model_height: self.height,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate(learning_rate);
        let max_modes = self.params.max_modes;
        let mut mask = GrayImage::new(self.width, self.height);

        for (idx, (pixel, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let sample = pixel.0.map(f32::from);
            let modes = &mut self.modes[idx * max_modes..(idx + 1) * max_modes];
            let is_background =
                update_pixel(modes, &mut self.modes_used[idx], sample, alpha, &self.params);
            *out = Luma([if is_background { BACKGROUND } else { FOREGROUND }]);
        }

        debug!(frame = self.frames_seen, learning_rate = alpha, "background model updated");
        Ok(mask)
    }

    /// Current background estimate.
    pub fn background_image(&self) -> RgbImage {
        let max_modes = self.params.max_modes;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let idx = y as usize * self.width as usize + x as usize;
            let used = self.modes_used[idx];
            let modes = &self.modes[idx * max_modes..idx * max_modes + used];

            let mut acc = [0f32; 3];
            let mut total = 0f32;
            for mode in modes {
                for (a, m) in acc.iter_mut().zip(mode.mean) {
                    *a += mode.weight * m;
                }
                total += mode.weight;
                if total > self.params.background_ratio {
                    break;
                }
            }

            let inv = if total > f32::EPSILON { 1.0 / total } else { 0.0 };
            Rgb(acc.map(|v| (v * inv).round().clamp(0.0, 255.0) as u8))
        })
    }
}

/// Update one pixel's mixture with `sample`. Returns whether the sample was
/// explained by the background modes.
fn update_pixel(
    modes: &mut [Mode],
    used: &mut usize,
    sample: [f32; 3],
    alpha: f32,
    params: &MixtureParams,
) -> bool {
    let keep = 1.0 - alpha;
    let prune = -alpha * params.complexity_reduction;

    let mut fits = false;
    let mut background = false;
    let mut total_weight = 0f32;

    let mut mode = 0;
    while mode < *used {
        let mut weight = keep * modes[mode].weight + prune;
        let mut slot = mode;

        if !fits {
            let var = modes[mode].variance;
            let diff: [f32; 3] = std::array::from_fn(|c| modes[mode].mean[c] - sample[c]);
            let dist2: f32 = diff.iter().map(|d| d * d).sum();

            if total_weight < params.background_ratio && dist2 < params.var_threshold * var {
                background = true;
            }

            if dist2 < params.var_threshold_gen * var {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for (m, d) in modes[mode].mean.iter_mut().zip(diff) {
                    *m -= k * d;
                }
                modes[mode].variance =
                    (var + k * (dist2 - var)).clamp(params.var_min, params.var_max);

                while slot > 0 && weight >= modes[slot - 1].weight {
                    modes.swap(slot, slot - 1);
                    slot -= 1;
                }
            }
        }

        if weight < -prune {
            weight = 0.0;
            *used -= 1;
        }
        modes[slot].weight = weight;
        total_weight += weight;
        mode += 1;
    }

    if total_weight > 0.0 {
        let inv = 1.0 / total_weight;
        for m in &mut modes[..*used] {
            m.weight *= inv;
        }
    }

    if !fits && alpha > 0.0 {
        let slot = if *used == modes.len() {
            modes.len() - 1
        } else {
            *used += 1;
            *used - 1
        };

        if *used == 1 {
            modes[slot].weight = 1.0;
        } else {
            modes[slot].weight = alpha;
            for m in &mut modes[..*used - 1] {
                m.weight *= keep;
            }
        }
        modes[slot].mean = sample;
        modes[slot].variance = params.var_init;

        let mut i = slot;
        while i > 0 && alpha >= modes[i - 1].weight {
            modes.swap(i, i - 1);
            i -= 1;
        }
    }

    background
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: Option<f32> = Some(0.5);

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    #[test]
    fn first_frame_becomes_background() {
        let frame = RgbImage::from_fn(6, 4, |x, y| Rgb([(x * 40) as u8, (y * 60) as u8, 77]));
        let mut model = BackgroundModel::new(6, 4, MixtureParams::default()).unwrap();

        let mask = model.apply(&frame, RATE).unwrap();
        assert!(mask.pixels().all(|p| p[0] == FOREGROUND));
        assert_eq!(model.background_image(), frame);
    }

    #[test]
    fn static_scene_is_all_background() {
        let frame = solid(5, 5, [30, 60, 90]);
        let mut model = BackgroundModel::new(5, 5, MixtureParams::default()).unwrap();
        model.apply(&frame, RATE).unwrap();

        for _ in 0..4 {
            let mask = model.apply(&frame, RATE).unwrap();
            assert!(mask.pixels().all(|p| p[0] == BACKGROUND));
        }
        assert_eq!(model.background_image(), frame);
        assert_eq!(model.frames_seen, 5);
    }

    #[test]
    fn transient_object_fades_out() {
        let scene = solid(4, 4, [40, 120, 200]);
        let mut with_object = scene.clone();
        with_object.put_pixel(1, 1, Rgb([250, 250, 250]));

        let mut model = BackgroundModel::new(4, 4, MixtureParams::default()).unwrap();
        for _ in 0..5 {
            model.apply(&scene, RATE).unwrap();
        }

        let mask = model.apply(&with_object, RATE).unwrap();
        assert_eq!(mask.get_pixel(1, 1)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
        let ghost = model.background_image();
        assert_ne!(ghost.get_pixel(1, 1), scene.get_pixel(1, 1));

        for _ in 0..5 {
            model.apply(&scene, RATE).unwrap();
        }
        let settled = model.background_image();
        let p = settled.get_pixel(1, 1);
        for c in 0..3 {
            assert!(p[c].abs_diff(scene.get_pixel(1, 1)[c]) <= 1, "settled pixel {p:?}");
        }
    }

    #[test]
    fn mixture_stays_bounded_and_sorted() {
        let params = MixtureParams {
            max_modes: 2,
            ..MixtureParams::default()
        };
        let mut model = BackgroundModel::new(1, 1, params).unwrap();
        for v in [0u8, 80, 160, 240, 40] {
            model.apply(&solid(1, 1, [v, v, v]), RATE).unwrap();
            assert!(model.modes_used[0] <= 2);
        }
        let used = &model.modes[..model.modes_used[0]];
        assert!(used.windows(2).all(|pair| pair[0].weight >= pair[1].weight));
    }

    #[test]
    fn automatic_rate_follows_history() {
        let mut model = BackgroundModel::new(1, 1, MixtureParams::default()).unwrap();
        model.frames_seen = 1;
        assert_eq!(model.learning_rate(None), 0.5);
        assert_eq!(model.learning_rate(Some(0.5)), 0.5);
        model.frames_seen = 10;
        assert_eq!(model.learning_rate(None), 0.05);
        assert_eq!(model.learning_rate(Some(0.25)), 0.25);
        model.frames_seen = 10_000;
        assert_eq!(model.learning_rate(None), 1.0 / 500.0);
    }

    #[test]
    fn frame_size_must_match() {
        let mut model = BackgroundModel::new(4, 4, MixtureParams::default()).unwrap();
        let err = model.apply(&solid(3, 4, [0, 0, 0]), RATE).unwrap_err();
        assert!(matches!(err, RemovalError::ModelSizeMismatch { frame_width: 3, .. }));
    }

    #[test]
    fn zero_modes_are_rejected() {
        let params = MixtureParams {
            max_modes: 0,
            ..MixtureParams::default()
        };
        let err = BackgroundModel::new(4, 4, params).err().unwrap();
        assert!(matches!(err, RemovalError::NoMixtureModes));
    }
}
