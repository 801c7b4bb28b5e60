use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "daterase", about = "Remove burned-in camera timestamps from footage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean `<work-dir>/<id>.mp4` into `<work-dir>/wd-<id>.mp4`.
    Video {
        /// Video name without the .mp4 extension.
        #[arg(long)]
        id: String,

        /// Directory holding the input video.
        #[arg(long, default_value = "./lib/python")]
        work_dir: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Clean a directory of .jpg frames into `<dir>/output.mp4`.
    Images {
        /// Identifier of the clip, used for logging only.
        #[arg(long)]
        id: String,

        /// Directory of frame images.
        #[arg(long)]
        dir: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
pub struct CommonArgs {
    /// Directory of timestamp glyph templates.
    #[arg(long, default_value = "./lib/python/time")]
    pub templates: PathBuf,

    /// Stop after this many frames.
    #[arg(long)]
    pub max_frames: Option<u32>,

    /// Directory to save annotated debug frames.
    #[arg(long)]
    pub debug_frames: Option<PathBuf>,

    /// Font used to label debug frames.
    #[arg(long, requires = "debug_frames")]
    pub debug_font: Option<PathBuf>,
}
