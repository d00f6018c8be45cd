use std::panic::{self, AssertUnwindSafe};

use indicatif::{ProgressBar, ProgressStyle};

use super::{
    analyzer::FrameAnalyzer,
    partition::Chunk,
    provider::{LandmarkProvider, ProviderFactory},
    sink::OutputSink,
    source::FrameSource,
};
use crate::{
    config::{AnalysisConfig, Timing},
    error::{AnalysisError, Result},
    types::{Category, FrameRecord},
};

/// Records owned by one chunk, in frame order.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    pub records: Vec<FrameRecord>,
    pub skipped: usize,
}

/// Everything a worker needs besides its chunk. Shared read-only.
pub struct Worker<'a, S: ?Sized, F, K: ?Sized> {
    pub analysis: &'a AnalysisConfig,
    pub timing: Timing,
    pub source: &'a S,
    pub factory: &'a F,
    pub sink: &'a K,
}

impl<'a, S, F, K> Worker<'a, S, F, K>
where
    S: FrameSource + ?Sized,
    F: ProviderFactory,
    K: OutputSink + ?Sized,
{
    /// Processes `chunk.processed()` in order with a fresh provider and
    /// analyzer. Warm-up frames feed detector state but produce no output.
    pub fn run_chunk(&self, chunk: Chunk) -> Result<ChunkOutput> {
        let mut provider = self.factory.create().map_err(AnalysisError::Provider)?;
        let mut analyzer = FrameAnalyzer::new(self.analysis, &self.timing);
        log::debug!(
            "chunk {}..{} (warm-up {} frames)",
            chunk.effective_start,
            chunk.end,
            chunk.warm_up_len()
        );
        let mut output = ChunkOutput {
            records: Vec::with_capacity(chunk.owned().len()),
            skipped: 0,
        };

        for index in chunk.processed() {
            let warm_up = chunk.is_warm_up(index);
            let frame = match self.source.read(index) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("skipping frame {index}: {err}");
                    output.skipped += usize::from(!warm_up);
                    continue;
                }
            };

            let landmarks = match provider.detect(&frame) {
                Ok(landmarks) => landmarks,
                Err(err) => {
                    log::warn!("pose estimation failed on frame {index}: {err:?}");
                    output.skipped += usize::from(!warm_up);
                    continue;
                }
            };

            let record = analyzer.analyze(index, landmarks.as_ref(), frame.width, frame.height);
            if warm_up {
                continue;
            }

            for category in record.categories() {
                if self.sink.wants(category) {
                    self.sink.write(category, &frame)?;
                }
            }
            if self.sink.wants(Category::All) {
                self.sink.write(Category::All, &frame)?;
            }
            output.records.push(record);
        }

        Ok(output)
    }

    pub fn run_sequential(&self) -> Result<ChunkOutput> {
        let frame_count = self.source.meta().frame_count;
        log::info!("sequential run over {frame_count} frames");
        self.run_chunk(Chunk::whole(frame_count))
    }

    /// Runs every chunk on a dedicated pool. Results arrive in completion
    /// order and are returned in chunk order. Any failed chunk fails the run.
    pub fn run_parallel(&self, chunks: &[Chunk], workers: usize) -> Result<Vec<ChunkOutput>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("gait-worker-{i}"))
            .build()?;

        log::info!(
            "parallel run: {} workers | {} chunks | overlap {}",
            workers,
            chunks.len(),
            self.timing.window_size.saturating_sub(1)
        );

        let progress = ProgressBar::new(chunks.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} chunks {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut slots: Vec<Option<ChunkOutput>> = vec![None; chunks.len()];
        let mut failure: Option<AnalysisError> = None;

        pool.in_place_scope(|scope| {
            for (slot, chunk) in chunks.iter().copied().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_chunk(chunk)));
                    let _ = tx.send((slot, outcome));
                });
            }
            drop(tx);

            for (slot, outcome) in rx.iter() {
                progress.inc(1);
                match outcome {
                    Ok(Ok(output)) => {
                        log::debug!(
                            "chunk {}/{} ready ({} records)",
                            slot + 1,
                            chunks.len(),
                            output.records.len()
                        );
                        slots[slot] = Some(output);
                    }
                    Ok(Err(err)) => {
                        log::error!("chunk {} failed: {err}", slot + 1);
                        failure.get_or_insert(AnalysisError::Worker {
                            chunk: slot,
                            message: err.to_string(),
                        });
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        log::error!("chunk {} panicked: {message}", slot + 1);
                        failure.get_or_insert(AnalysisError::Worker {
                            chunk: slot,
                            message,
                        });
                    }
                }
            }
        });
        progress.finish_and_clear();

        if let Some(err) = failure {
            return Err(err);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(chunk, slot)| {
                slot.ok_or_else(|| AnalysisError::Worker {
                    chunk,
                    message: "worker exited without a result".to_string(),
                })
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        pipeline::{
            partition::partition,
            provider::{LandmarkTrack, ReplayProvider},
            sink::NullSink,
            source::VideoMeta,
        },
        types::{BodyPoint, Frame, Landmark, LandmarkSet},
    };

    struct BlankSource {
        frames: usize,
        broken: Option<usize>,
    }

    impl FrameSource for BlankSource {
        fn meta(&self) -> VideoMeta {
            VideoMeta::new(10.0, self.frames, 30.0)
        }

        fn read(&self, index: usize) -> Result<Frame> {
            if Some(index) == self.broken {
                return Err(AnalysisError::Source {
                    index,
                    message: "corrupt".into(),
                });
            }
            Ok(Frame::new(index, Vec::new(), 100, 100, 10.0))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        written: Mutex<Vec<(Category, usize)>>,
    }

    impl OutputSink for RecordingSink {
        fn wants(&self, category: Category) -> bool {
            category != Category::All
        }

        fn write(&self, category: Category, frame: &Frame) -> Result<()> {
            self.written.lock().unwrap().push((category, frame.index));
            Ok(())
        }
    }

    struct PanickingProvider;

    impl LandmarkProvider for PanickingProvider {
        fn detect(&mut self, frame: &Frame) -> anyhow::Result<Option<LandmarkSet>> {
            if frame.index == 15 {
                panic!("model crashed");
            }
            Ok(None)
        }
    }

    fn limb(heel_y: f32) -> LandmarkSet {
        LandmarkSet::default()
            .with(BodyPoint::RightHeel, Landmark::new(0.5, heel_y, 0.9))
            .with(BodyPoint::RightFootIndex, Landmark::new(0.6, heel_y, 0.9))
            .with(BodyPoint::RightKnee, Landmark::new(0.52, heel_y - 0.3, 0.9))
    }

    fn config_and_timing() -> (AnalysisConfig, Timing) {
        let config = AnalysisConfig {
            window_seconds: 0.5,
            cooldown_seconds: 0.3,
            ..AnalysisConfig::default()
        };
        let timing = Timing::new(10.0, &config);
        (config, timing)
    }

    #[test]
    fn warm_up_frames_produce_no_output() {
        let (config, timing) = config_and_timing();
        let track = Arc::new(LandmarkTrack::from_sets((0..20).map(|i| (i, limb(0.8)))));
        let factory = ReplayProvider::factory(track);
        let sink = RecordingSink::default();
        let worker = Worker {
            analysis: &config,
            timing,
            source: &BlankSource {
                frames: 20,
                broken: None,
            },
            factory: &factory,
            sink: &sink,
        };
        let chunk = Chunk {
            overlap_start: 6,
            end: 20,
            effective_start: 10,
        };
        let output = worker.run_chunk(chunk).unwrap();
        assert_eq!(output.records.first().map(|r| r.frame_number), Some(10));
        assert_eq!(output.records.len(), 10);
        // Window (5) is already full at frame 10, so the strike lands there.
        assert_eq!(output.records[0].heel_strike.map(|s| s.frame_number), Some(10));
        assert!(sink.written.lock().unwrap().iter().all(|(_, index)| *index >= 10));
    }

    #[test]
    fn unreadable_frames_are_skipped_and_counted() {
        let (config, timing) = config_and_timing();
        let factory = || -> anyhow::Result<ReplayProvider> {
            Ok(ReplayProvider::new(Arc::new(LandmarkTrack::default())))
        };
        let worker = Worker {
            analysis: &config,
            timing,
            source: &BlankSource {
                frames: 8,
                broken: Some(3),
            },
            factory: &factory,
            sink: &NullSink,
        };
        let output = worker.run_sequential().unwrap();
        assert_eq!(output.skipped, 1);
        assert_eq!(output.records.len(), 7);
        assert!(output.records.iter().all(|r| r.frame_number != 3 && r.visibility_issue));
    }

    #[test]
    fn panicking_worker_fails_the_run() {
        let (config, timing) = config_and_timing();
        let factory = || -> anyhow::Result<PanickingProvider> { Ok(PanickingProvider) };
        let worker = Worker {
            analysis: &config,
            timing,
            source: &BlankSource {
                frames: 40,
                broken: None,
            },
            factory: &factory,
            sink: &NullSink,
        };
        let chunks = partition(40, 10, timing.window_size);
        let err = worker.run_parallel(&chunks, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::Worker { chunk: 1, .. }));
    }

    #[test]
    fn provider_construction_failure_is_fatal() {
        let (config, timing) = config_and_timing();
        let factory = || -> anyhow::Result<ReplayProvider> { Err(anyhow::anyhow!("no model")) };
        let worker = Worker {
            analysis: &config,
            timing,
            source: &BlankSource {
                frames: 20,
                broken: None,
            },
            factory: &factory,
            sink: &NullSink,
        };
        let chunks = partition(20, 10, timing.window_size);
        assert!(matches!(
            worker.run_parallel(&chunks, 2),
            Err(AnalysisError::Worker { .. })
        ));
    }

    #[test]
    fn parallel_results_come_back_in_chunk_order() {
        let (config, timing) = config_and_timing();
        let factory = || -> anyhow::Result<ReplayProvider> {
            Ok(ReplayProvider::new(Arc::new(LandmarkTrack::default())))
        };
        let worker = Worker {
            analysis: &config,
            timing,
            source: &BlankSource {
                frames: 95,
                broken: None,
            },
            factory: &factory,
            sink: &NullSink,
        };
        let chunks = partition(95, 10, timing.window_size);
        let outputs = worker.run_parallel(&chunks, 4).unwrap();
        assert_eq!(outputs.len(), 10);
        let frames: Vec<usize> = outputs
            .iter()
            .flat_map(|o| o.records.iter().map(|r| r.frame_number))
            .collect();
        assert_eq!(frames, (0..95).collect::<Vec<_>>());
    }
}
