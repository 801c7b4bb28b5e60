mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use daterase_core::pipeline::{self, PipelineConfig};

fn config_from(common: cli::CommonArgs, work_dir: Option<PathBuf>) -> PipelineConfig {
    let defaults = PipelineConfig::default();
    PipelineConfig {
        work_dir: work_dir.unwrap_or(defaults.work_dir),
        template_dir: common.templates,
        max_frames: common.max_frames,
        debug_frames_dir: common.debug_frames,
        debug_font: common.debug_font,
        ..defaults
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let summary = match cli.command {
        cli::Command::Video { id, work_dir, common } => {
            let config = config_from(common, Some(work_dir));
            info!(%id, work_dir = ?config.work_dir, "starting video date removal");
            pipeline::remove_date(&id, &config).context("video date removal failed")?
        }
        cli::Command::Images { id, dir, common } => {
            let config = config_from(common, None);
            info!(%id, ?dir, "starting image sequence date removal");
            pipeline::remove_date_2(&id, &dir, &config).context("image sequence date removal failed")?
        }
    };

    info!(
        output = ?summary.output,
        frames = summary.frames_written,
        x = summary.bbox.x,
        y = summary.bbox.y,
        w = summary.bbox.w,
        h = summary.bbox.h,
        "done"
    );
    Ok(())
}
