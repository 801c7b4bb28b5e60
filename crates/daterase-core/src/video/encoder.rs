use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{bail, ensure, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info};

/// Encodes RGB frames to H.264 by piping raw RGB24 data into the ffmpeg CLI.
pub struct VideoEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frame_count: u32,
    output: PathBuf,
}

/// libx264 needs even dimensions for 4:2:0 chroma.
fn pixel_format_for(width: u32, height: u32) -> &'static str {
    if width % 2 == 0 && height % 2 == 0 {
        "yuv420p"
    } else {
        "yuv444p"
    }
}

impl VideoEncoder {
    /// Create (or overwrite) `output` and start an encoder for `width` x `height` frames.
    pub fn create(output: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        ensure!(width > 0 && height > 0, "invalid output dimensions: {width}x{height}");
        ensure!(fps > 0, "output fps must be > 0");

        let pix_fmt = pixel_format_for(width, height);
        info!(?output, width, height, fps, pix_fmt, "spawning ffmpeg encoder process");

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-v", "error",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-video_size", &format!("{width}x{height}"),
                "-framerate", &fps.to_string(),
                "-i", "pipe:0",
                "-an",
                "-c:v", "libx264",
                "-preset", "medium",
                "-crf", "18",
                "-pix_fmt", pix_fmt,
            ])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg, is ffmpeg installed?")?;

        let stdin = child.stdin.take().context("ffmpeg stdin not available")?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            width,
            height,
            frame_count: 0,
            output: output.to_path_buf(),
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Append one frame. It must match the size the encoder was created with.
    pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        ensure!(
            image.dimensions() == (self.width, self.height),
            "frame is {}x{}, encoder expects {}x{}",
            image.width(),
            image.height(),
            self.width,
            self.height
        );

        let stdin = self.stdin.as_mut().context("encoder already finished")?;
        stdin
            .write_all(image.as_raw())
            .context("failed to write frame data to ffmpeg")?;

        debug!(frame = self.frame_count, "encoded frame");
        self.frame_count += 1;
        Ok(())
    }

    /// Close the input pipe and wait for ffmpeg to finalize the container.
    pub fn finish(mut self) -> Result<u32> {
        drop(self.stdin.take());

        let status = self.child.wait().context("failed to wait for ffmpeg encoder")?;

        if !status.success() {
            error!(%status, output = ?self.output, "ffmpeg encoder failed");
            bail!("ffmpeg encoder exited with {status}");
        }

        info!(output = ?self.output, frames = self.frame_count, "video written");
        Ok(self.frame_count)
    }
}

impl Drop for VideoEncoder {
    /// Finalize whatever was written so a partial output stays playable.
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            info!(output = ?self.output, frames = self.frame_count, "closing unfinished encoder");
        }
        let _ = self.child.wait();
    }
}
