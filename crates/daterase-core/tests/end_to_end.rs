//! Full runs through ffmpeg. Ignored by default, run with
//! `cargo test -- --ignored` where ffmpeg and ffprobe are on PATH.

use std::path::Path;

use image::{imageops, Rgb, RgbImage};
use tracing_test::traced_test;

use daterase_core::pipeline::{remove_date, remove_date_2, sequence_output_path, video_output_path};
use daterase_core::video::decoder::VideoDecoder;
use daterase_core::video::encoder::VideoEncoder;
use daterase_core::video::FrameSource;
use daterase_core::{PipelineConfig, RemovalError};

const WIDTH: u32 = 96;
const HEIGHT: u32 = 64;
const SCENE: Rgb<u8> = Rgb([90, 130, 110]);
/// Overlay position and size at source resolution.
const STAMP_X: u32 = 8;
const STAMP_Y: u32 = 8;
const STAMP_W: u32 = 48;
const STAMP_H: u32 = 16;
const BLOCK: u32 = 4;

/// Black and white blocks standing in for timestamp digits.
fn stamp_pattern() -> RgbImage {
    let mut state: u32 = 0x9e37_79b9;
    let cols = STAMP_W / BLOCK;
    let rows = STAMP_H / BLOCK;
    let bits: Vec<bool> = (0..cols * rows)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state & 1 == 1
        })
        .collect();
    RgbImage::from_fn(STAMP_W, STAMP_H, |x, y| {
        let on = bits[((y / BLOCK) * cols + x / BLOCK) as usize];
        let v = if on { 255 } else { 0 };
        Rgb([v, v, v])
    })
}

fn stamped_scene(pattern: &RgbImage) -> RgbImage {
    let mut frame = RgbImage::from_pixel(WIDTH, HEIGHT, SCENE);
    imageops::replace(&mut frame, pattern, STAMP_X as i64, STAMP_Y as i64);
    frame
}

/// The glyph template as the locator sees it: half resolution, single channel.
fn write_template(dir: &Path, pattern: &RgbImage) {
    std::fs::create_dir_all(dir).unwrap();
    let half = imageops::thumbnail(pattern, STAMP_W / 2, STAMP_H / 2);
    imageops::grayscale(&half).save(dir.join("stamp.png")).unwrap();
}

fn write_video(path: &Path, frames: &[RgbImage]) {
    let mut encoder = VideoEncoder::create(path, WIDTH, HEIGHT, 24).unwrap();
    for frame in frames {
        encoder.write_frame(frame).unwrap();
    }
    assert_eq!(encoder.finish().unwrap(), frames.len() as u32);
}

fn decode_all(path: &Path) -> (u32, u32, Vec<RgbImage>) {
    let mut decoder = VideoDecoder::open(path).unwrap();
    let (w, h) = (decoder.width(), decoder.height());
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame().unwrap() {
        frames.push(frame.image);
    }
    (w, h, frames)
}

fn bright_pixels_in_stamp(frame: &RgbImage) -> usize {
    let mut count = 0;
    for y in STAMP_Y..STAMP_Y + STAMP_H {
        for x in STAMP_X..STAMP_X + STAMP_W {
            let p = frame.get_pixel(x, y);
            if p.0.iter().all(|&c| c > 210) {
                count += 1;
            }
        }
    }
    count
}

#[test]
#[ignore = "needs ffmpeg and ffprobe on PATH"]
#[traced_test]
fn video_overlay_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = stamp_pattern();
    write_template(&dir.path().join("time"), &pattern);
    let frames = vec![stamped_scene(&pattern); 10];
    write_video(&dir.path().join("clip.mp4"), &frames);

    let config = PipelineConfig {
        work_dir: dir.path().to_path_buf(),
        template_dir: dir.path().join("time"),
        ..PipelineConfig::default()
    };
    let summary = remove_date("clip", &config).unwrap();
    assert_eq!(summary.frames_written, 10);
    assert_eq!(summary.output, video_output_path("clip", dir.path()));

    let bbox = summary.bbox;
    assert!(bbox.x <= STAMP_X / 2 + 1 && bbox.y <= STAMP_Y / 2 + 1, "box {bbox:?}");
    assert!(bbox.right() >= (STAMP_X + STAMP_W) / 2 - 1, "box {bbox:?}");

    let (w, h, cleaned) = decode_all(&summary.output);
    assert_eq!((w, h), (WIDTH, HEIGHT));
    assert_eq!(cleaned.len(), 10);

    let last = cleaned.last().unwrap();
    let before = bright_pixels_in_stamp(&frames[0]);
    let after = bright_pixels_in_stamp(last);
    assert!(before > 100);
    assert!(
        after * 50 <= (STAMP_W * STAMP_H) as usize,
        "{after} bright pixels left in the overlay area"
    );
}

#[test]
#[ignore = "needs ffmpeg and ffprobe on PATH"]
#[traced_test]
fn image_sequence_keeps_frame_count_and_size() {
    let root = tempfile::tempdir().unwrap();
    let frames_dir = root.path().join("frames");
    std::fs::create_dir_all(&frames_dir).unwrap();
    let pattern = stamp_pattern();
    write_template(&root.path().join("time"), &pattern);

    const N: usize = 6;
    for i in 0..N {
        stamped_scene(&pattern)
            .save(frames_dir.join(format!("img_{i:04}.jpg")))
            .unwrap();
    }

    let config = PipelineConfig {
        template_dir: root.path().join("time"),
        ..PipelineConfig::default()
    };
    let summary = remove_date_2("clip", &frames_dir, &config).unwrap();
    assert_eq!(summary.output, sequence_output_path(&frames_dir));
    assert_eq!(summary.frames_written, N as u32);

    let (w, h, cleaned) = decode_all(&summary.output);
    assert_eq!((w, h), (WIDTH, HEIGHT));
    assert_eq!(cleaned.len(), N);
    assert!(cleaned.iter().all(|f| f.dimensions() == (WIDTH, HEIGHT)));
}

#[test]
#[ignore = "needs ffmpeg and ffprobe on PATH"]
#[traced_test]
fn max_frames_limits_output() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = stamp_pattern();
    write_template(&dir.path().join("time"), &pattern);
    write_video(&dir.path().join("clip.mp4"), &vec![stamped_scene(&pattern); 8]);

    let config = PipelineConfig {
        work_dir: dir.path().to_path_buf(),
        template_dir: dir.path().join("time"),
        max_frames: Some(3),
        ..PipelineConfig::default()
    };
    let summary = remove_date("clip", &config).unwrap();
    assert_eq!(summary.frames_written, 3);
    assert_eq!(decode_all(&summary.output).2.len(), 3);
}

#[test]
#[ignore = "needs ffmpeg and ffprobe on PATH"]
#[traced_test]
fn clip_without_overlay_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_template(&dir.path().join("time"), &stamp_pattern());
    let plain = RgbImage::from_pixel(WIDTH, HEIGHT, SCENE);
    write_video(&dir.path().join("plain.mp4"), &vec![plain; 3]);

    let config = PipelineConfig {
        work_dir: dir.path().to_path_buf(),
        template_dir: dir.path().join("time"),
        ..PipelineConfig::default()
    };
    let err = remove_date("plain", &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemovalError>(),
        Some(RemovalError::TimestampNotLocated { .. })
    ));
    assert!(!video_output_path("plain", dir.path()).exists());
}

#[test]
#[ignore = "needs ffmpeg and ffprobe on PATH"]
#[traced_test]
fn frames_before_a_bad_frame_are_kept() {
    let root = tempfile::tempdir().unwrap();
    let frames_dir = root.path().join("frames");
    std::fs::create_dir_all(&frames_dir).unwrap();
    let pattern = stamp_pattern();
    write_template(&root.path().join("time"), &pattern);

    stamped_scene(&pattern)
        .save(frames_dir.join("img_0000.jpg"))
        .unwrap();
    RgbImage::from_pixel(WIDTH / 2, HEIGHT / 2, SCENE)
        .save(frames_dir.join("img_0001.jpg"))
        .unwrap();

    let config = PipelineConfig {
        template_dir: root.path().join("time"),
        ..PipelineConfig::default()
    };
    let err = remove_date_2("clip", &frames_dir, &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemovalError>(),
        Some(RemovalError::FrameSizeMismatch { actual_width, .. }) if *actual_width == WIDTH / 2
    ));

    let output = sequence_output_path(&frames_dir);
    assert!(output.is_file());
    let (w, h, written) = decode_all(&output);
    assert_eq!((w, h), (WIDTH, HEIGHT));
    assert_eq!(written.len(), 1);
}
