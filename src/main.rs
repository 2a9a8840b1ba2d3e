// Replays a directory of image frames through the motion pipeline and logs one
// line per scored capture. Diff images can be written out for inspection.

use anyhow::Context;
use motion_vision::core_modules::utils::image_helper::image_helper;
use motion_vision::{DirectoryFrameSource, MotionEvent, MotionPipeline, Settings};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: motion_vision <frames_dir> [config.toml] [diff_output_dir]");
        return Ok(());
    }
    let frames_dir = PathBuf::from(&args[1]);
    let settings = match args.get(2) {
        Some(path) => Settings::load(Path::new(path))
            .with_context(|| format!("failed to load config from {path}"))?,
        None => Settings::default(),
    };
    let output_dir = args.get(3).map(PathBuf::from);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.parse().unwrap_or_default()),
        )
        .init();

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    // --- 2. Pipeline Initialization ---
    let source = DirectoryFrameSource::new(&frames_dir);
    let (mut pipeline, mut events) =
        MotionPipeline::with_options(Some(&settings.motion), Box::new(source))?;

    info!(frames_dir = %frames_dir.display(), "starting replay");
    pipeline.start().await?;

    // --- 3. Event Loop ---
    let mut captures = 0u64;
    let mut with_motion = 0u64;
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };
        let Some(event) = event else { break };

        match event {
            MotionEvent::Capture(capture) => {
                captures += 1;
                if capture.has_motion() {
                    with_motion += 1;
                }
                info!(
                    capture = captures,
                    score = capture.score(),
                    has_motion = capture.has_motion(),
                    motion_box = ?capture.motion_box_in_capture_space(),
                    "capture"
                );
                if let Some(dir) = &output_dir {
                    let path = dir.join(format!("diff_{captures:06}.png"));
                    if let Err(e) = image_helper::save(&path, &capture.diff.diff_image) {
                        warn!(error = %e, path = %path.display(), "failed to write diff image");
                    }
                }
            }
            MotionEvent::CaptureError(message) => {
                error!(error = %message, "capture failed");
                break;
            }
            MotionEvent::Stopped => break,
            MotionEvent::InitSuccess | MotionEvent::StartComplete | MotionEvent::InitError(_) => {}
        }
    }

    pipeline.stop().await?;
    info!(captures, with_motion, "replay complete");
    Ok(())
}
