use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use gait_analyzer::{
    Settings, analyze_video,
    pipeline::{
        aggregate::{BlendedScorer, ExtremeValueScorer, SeverityScorer},
        provider::{LandmarkTrack, ReplayProvider},
        sink::JpegSink,
        source::ImageDirSource,
    },
};

#[derive(Parser, Debug)]
#[command(name = "gait-analyzer", about = "Running posture and overstride analysis")]
struct Args {
    /// Directory holding frame_000000.jpg, frame_000001.jpg, ...
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,
    /// Landmark track recorded by the pose estimator (JSON)
    #[arg(long, value_name = "PATH")]
    landmarks: PathBuf,
    /// Frame rate of the source video; falls back to the track or the default
    #[arg(long)]
    fps: Option<f64>,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides output.dir from the config
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// Process the whole video on one thread
    #[arg(long)]
    sequential: bool,
    #[arg(long)]
    workers: Option<usize>,
    /// Rank worst frames with the position/category blend
    #[arg(long)]
    blended_severity: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(out) = args.out {
        settings.output.dir = out;
    }
    if args.sequential {
        settings.execution.parallel = false;
    }
    if args.workers.is_some() {
        settings.execution.workers = args.workers;
    }
    settings.validate()?;

    let track = Arc::new(LandmarkTrack::load(&args.landmarks)?);
    if track.is_empty() {
        log::warn!(
            "{} has no landmark frames; every frame will be a visibility issue",
            args.landmarks.display()
        );
    }
    log::info!(
        "loaded landmarks for {} frames from {}",
        track.len(),
        args.landmarks.display()
    );
    let fps = args
        .fps
        .or(track.fps())
        .unwrap_or(settings.analysis.default_fps);

    let source = ImageDirSource::open(&args.frames, fps, settings.analysis.default_fps)?;
    let factory = ReplayProvider::factory(track);
    let sink = JpegSink::new(&settings.output);
    sink.prepare().with_context(|| format!("failed to prepare {}", sink.root().display()))?;

    let scorer: Box<dyn SeverityScorer> = if args.blended_severity {
        Box::new(BlendedScorer {
            back_angle_bad_thresh: f64::from(settings.analysis.back_angle_bad_thresh),
            ..BlendedScorer::default()
        })
    } else {
        Box::new(ExtremeValueScorer)
    };

    let outcome = analyze_video(&settings, &source, &factory, &sink, scorer.as_ref())?;
    outcome.write_artifacts(sink.root())?;

    println!(
        "{} frames @ {:.2} fps ({:.1}s): {} bad posture, {} heel strikes ({} overstride), {} low visibility",
        outcome.summary.total_frames,
        outcome.summary.fps,
        outcome.summary.duration_seconds,
        outcome.summary.analysis_summary.posture_issues,
        outcome.summary.analysis_summary.heel_strikes,
        outcome.summary.analysis_summary.overstride_issues,
        outcome.summary.analysis_summary.visibility_issues,
    );
    println!("results in {}", sink.root().display());

    Ok(())
}
