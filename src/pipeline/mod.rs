pub mod aggregate;
pub mod analyzer;
pub mod executor;
pub mod partition;
pub mod provider;
pub mod sink;
pub mod source;

use std::path::Path;

use crate::{
    config::{Settings, Timing},
    error::Result,
};

use self::{
    aggregate::{Aggregator, SeverityScorer, Summary, Timeline},
    executor::Worker,
    partition::partition,
    provider::ProviderFactory,
    sink::{OutputSink, write_json},
    source::{FrameSource, VideoMeta},
};

pub const RECORDS_FILE: &str = "records.json";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub meta: VideoMeta,
    pub timing: Timing,
    pub timeline: Timeline,
    pub summary: Summary,
}

impl AnalysisOutcome {
    pub fn write_artifacts(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(RECORDS_FILE), &self.timeline.records)?;
        write_json(&dir.join(REPORT_FILE), &self.summary)?;
        log::info!("wrote {} and {} to {}", RECORDS_FILE, REPORT_FILE, dir.display());
        Ok(())
    }
}

/// Runs the whole video, sequentially or in parallel chunks, and aggregates
/// the result. Nothing is returned unless every chunk succeeded.
pub fn analyze_video<S, F, K>(
    settings: &Settings,
    source: &S,
    factory: &F,
    sink: &K,
    scorer: &dyn SeverityScorer,
) -> Result<AnalysisOutcome>
where
    S: FrameSource + ?Sized,
    F: ProviderFactory,
    K: OutputSink + ?Sized,
{
    settings.validate()?;
    let meta = source.meta();
    let timing = Timing::new(meta.fps, &settings.analysis);
    log::info!(
        "analyzing {} frames at {:.3} fps | window {} frames | cooldown {} frames",
        meta.frame_count,
        timing.fps,
        timing.window_size,
        timing.cooldown_frames
    );

    let worker = Worker {
        analysis: &settings.analysis,
        timing,
        source,
        factory,
        sink,
    };

    let outputs = if settings.execution.parallel {
        let chunks = partition(
            meta.frame_count,
            settings.execution.chunk_frames,
            timing.window_size,
        );
        worker.run_parallel(&chunks, settings.execution.worker_count())?
    } else {
        vec![worker.run_sequential()?]
    };

    let timeline = Aggregator::merge(outputs);
    let summary = Aggregator::new(scorer).summarize(&timeline, &meta, |category, index| {
        sink.image_path(category, index)
    });
    log::info!(
        "done: {} posture issues | {} heel strikes ({} overstride) | {} visibility issues | {} skipped",
        summary.analysis_summary.posture_issues,
        summary.analysis_summary.heel_strikes,
        summary.analysis_summary.overstride_issues,
        summary.analysis_summary.visibility_issues,
        summary.skipped_frames
    );

    Ok(AnalysisOutcome {
        meta,
        timing,
        timeline,
        summary,
    })
}
