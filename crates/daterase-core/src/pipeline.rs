use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::background::{BackgroundModel, MixtureParams};
use crate::debug::DebugRenderer;
use crate::error::RemovalError;
use crate::inpainting::{inpaint, INPAINT_RADIUS};
use crate::locate::{load_templates, locate_timestamp, Template};
use crate::mask::{build_mask, repair_count};
use crate::rect::PixelRect;
use crate::scale;
use crate::video::decoder::VideoDecoder;
use crate::video::encoder::VideoEncoder;
use crate::video::frame::Frame;
use crate::video::sequence::ImageSequence;
use crate::video::FrameSource;

/// Frame rate of every output video.
pub const OUTPUT_FPS: u32 = 24;
/// Learning rate fed to the background model for every frame.
pub const BACKGROUND_LEARNING_RATE: f32 = 0.5;

const VIDEO_EXTENSION: &str = "mp4";
const VIDEO_OUTPUT_PREFIX: &str = "wd-";
const SEQUENCE_OUTPUT_NAME: &str = "output.mp4";

/// Parameters for the removal pipeline.
pub struct PipelineConfig {
    /// Directory holding `<video_id>.mp4` inputs and receiving `wd-<video_id>.mp4` outputs.
    pub work_dir: PathBuf,
    /// Directory of single-channel glyph templates.
    pub template_dir: PathBuf,
    pub output_fps: u32,
    /// Stop after this many frames, or None for the entire source.
    pub max_frames: Option<u32>,
    /// Directory to write annotated debug frames, or None to skip.
    pub debug_frames_dir: Option<PathBuf>,
    /// Font for debug frame labels.
    pub debug_font: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./lib/python"),
            template_dir: PathBuf::from("./lib/python/time"),
            output_fps: OUTPUT_FPS,
            max_frames: None,
            debug_frames_dir: None,
            debug_font: None,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RemovalSummary {
    pub output: PathBuf,
    /// Overlay box in working (half) resolution.
    pub bbox: PixelRect,
    pub frames_written: u32,
}

pub fn video_input_path(video_id: &str, work_dir: &Path) -> PathBuf {
    work_dir.join(format!("{video_id}.{VIDEO_EXTENSION}"))
}

pub fn video_output_path(video_id: &str, work_dir: &Path) -> PathBuf {
    work_dir.join(format!("{VIDEO_OUTPUT_PREFIX}{video_id}.{VIDEO_EXTENSION}"))
}

pub fn sequence_output_path(images_directory: &Path) -> PathBuf {
    images_directory.join(SEQUENCE_OUTPUT_NAME)
}

/// Remove the timestamp from `<work_dir>/<video_id>.mp4`, writing `<work_dir>/wd-<video_id>.mp4`.
pub fn remove_date(video_id: &str, config: &PipelineConfig) -> Result<RemovalSummary> {
    let input = video_input_path(video_id, &config.work_dir);
    if !input.is_file() {
        return Err(RemovalError::InputNotFound(input).into());
    }
    let output = video_output_path(video_id, &config.work_dir);
    info!(video_id, ?input, ?output, "date removal requested for video");

    let templates = load_templates(&config.template_dir)?;
    let mut decoder = VideoDecoder::open(&input).context("failed to open video")?;
    run_removal(&mut decoder, &input, &templates, &output, config)
}

/// Remove the timestamp from the `*.jpg` frames in `images_directory`, writing
/// `images_directory/output.mp4`.
pub fn remove_date_2(
    video_id: &str,
    images_directory: &Path,
    config: &PipelineConfig,
) -> Result<RemovalSummary> {
    if !images_directory.is_dir() {
        return Err(RemovalError::InputNotFound(images_directory.to_path_buf()).into());
    }
    let output = sequence_output_path(images_directory);
    info!(video_id, ?images_directory, ?output, "date removal requested for image sequence");

    let templates = load_templates(&config.template_dir)?;
    let mut sequence = ImageSequence::open(images_directory).context("failed to open image sequence")?;
    run_removal(&mut sequence, images_directory, &templates, &output, config)
}

/// Run the full removal over `source` and encode the result to `output`.
///
/// The first frame seeds the overlay box, which then stays fixed for the whole
/// clip: the overlay is assumed not to move. What gets written is the
/// background model's estimate after each inpainted frame, so residual
/// inpainting artifacts and moving content are suppressed at the cost of some
/// lag while the model settles.
pub fn run_removal(
    source: &mut dyn FrameSource,
    input: &Path,
    templates: &[Template],
    output: &Path,
    config: &PipelineConfig,
) -> Result<RemovalSummary> {
    ensure!(config.output_fps > 0, "output_fps must be > 0");
    let (width, height) = (source.width(), source.height());

    info!(?input, width, height, fps = source.fps(), max_frames = ?config.max_frames, "pipeline starting");

    let Some(seed) = source.next_frame()? else {
        return Err(RemovalError::EmptySource(input.to_path_buf()).into());
    };
    let seed_working = scale::to_working(&seed.image);
    let bbox = locate_timestamp(&seed_working, templates).context("failed to locate timestamp")?;

    let renderer = match &config.debug_frames_dir {
        Some(dir) => Some(DebugRenderer::new(dir, config.debug_font.as_deref())?),
        None => None,
    };
    if let Some(renderer) = &renderer {
        renderer
            .save_seed(&seed.image, bbox, seed_working.dimensions())
            .context("failed to save debug seed frame")?;
    }

    let (working_w, working_h) = seed_working.dimensions();
    let mut model = BackgroundModel::new(working_w, working_h, MixtureParams::default())?;
    let mut encoder = VideoEncoder::create(output, width, height, config.output_fps)
        .context("failed to open output video")?;

    info!("removing timestamp");
    let outcome = process_frames(source, seed, bbox, &mut model, &mut encoder, renderer.as_ref(), config);
    let written = encoder.frame_count();

    // Finalize on both paths: frames already written stay in the output.
    let finished = encoder.finish();
    if let Err(e) = outcome {
        if let Err(finish_err) = finished {
            warn!(error = %finish_err, "failed to finalize output after error");
        }
        error!(frames_written = written, error = %e, "pipeline stopped early");
        return Err(e);
    }
    let frames_written = finished.context("failed to finalize output video")?;

    info!(?output, frames_written, "timestamp removed");
    Ok(RemovalSummary {
        output: output.to_path_buf(),
        bbox,
        frames_written,
    })
}

fn process_frames(
    source: &mut dyn FrameSource,
    seed: Frame,
    bbox: PixelRect,
    model: &mut BackgroundModel,
    encoder: &mut VideoEncoder,
    renderer: Option<&DebugRenderer>,
    config: &PipelineConfig,
) -> Result<()> {
    let mut next = Some(seed);
    while let Some(frame) = next {
        if let Some(max) = config.max_frames {
            if encoder.frame_count() >= max {
                info!(max, "frame limit reached");
                break;
            }
        }

        let cleaned = process_frame(&frame, bbox, model, renderer)
            .with_context(|| format!("failed to process frame {}", frame.frame_number))?;
        encoder.write_frame(&cleaned)?;

        next = source.next_frame()?;
    }
    Ok(())
}

/// Mask, inpaint and model one frame. Returns the background estimate at the
/// frame's source resolution.
pub fn process_frame(
    frame: &Frame,
    bbox: PixelRect,
    model: &mut BackgroundModel,
    renderer: Option<&DebugRenderer>,
) -> Result<RgbImage> {
    let working = scale::to_working(&frame.image);
    let mask = build_mask(&working, bbox)?;
    let repaired = inpaint(&working, &mask, INPAINT_RADIUS)?;

    model.apply(&repaired, Some(BACKGROUND_LEARNING_RATE))?;
    let background = model.background_image();

    debug!(
        frame_number = frame.frame_number,
        timestamp_seconds = frame.timestamp_seconds,
        repaired = repair_count(&mask),
        "frame processed"
    );

    if let Some(renderer) = renderer {
        renderer
            .save_frame(frame.frame_number, &working, &mask, bbox)
            .context("failed to save debug frame")?;
    }

    Ok(scale::to_source(&background, frame.image.width(), frame.image.height()))
}
