use std::{cmp::Ordering, path::PathBuf};

use serde::Serialize;

use super::{executor::ChunkOutput, source::VideoMeta};
use crate::types::{Category, FrameRecord, Lean};

/// Scores a record for "worst frame" selection within one category.
/// Higher is worse; `None` means the record is not a candidate.
pub trait SeverityScorer: Send + Sync {
    fn score(&self, category: Category, record: &FrameRecord, meta: &VideoMeta) -> Option<f64>;
}

/// Lowest posture angle, largest flagged overstride angle, most recent
/// visibility gap.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtremeValueScorer;

impl SeverityScorer for ExtremeValueScorer {
    fn score(&self, category: Category, record: &FrameRecord, _meta: &VideoMeta) -> Option<f64> {
        match category {
            Category::BadPosture if record.bad_posture => {
                record.angle.map(|angle| -f64::from(angle))
            }
            Category::HeelStrike => record
                .heel_strike
                .filter(|strike| strike.overstride)
                .map(|strike| f64::from(strike.overstride_angle)),
            Category::LowVisibility if record.visibility_issue => Some(record.frame_number as f64),
            _ => None,
        }
    }
}

/// Linear blend of how extreme the reading is and where it sits in the video,
/// scaled by a per-category weight.
#[derive(Debug, Clone, Copy)]
pub struct BlendedScorer {
    pub position_weight: f64,
    pub posture_weight: f64,
    pub overstride_weight: f64,
    pub visibility_weight: f64,
    pub back_angle_bad_thresh: f64,
}

impl Default for BlendedScorer {
    fn default() -> Self {
        Self {
            position_weight: 0.2,
            posture_weight: 1.0,
            overstride_weight: 0.8,
            visibility_weight: 0.5,
            back_angle_bad_thresh: 110.0,
        }
    }
}

impl SeverityScorer for BlendedScorer {
    fn score(&self, category: Category, record: &FrameRecord, meta: &VideoMeta) -> Option<f64> {
        let position = if meta.frame_count > 1 {
            record.frame_number as f64 / (meta.frame_count - 1) as f64
        } else {
            0.0
        };
        let (weight, magnitude) = match category {
            Category::BadPosture if record.bad_posture => {
                let angle = f64::from(record.angle?);
                let depth =
                    (self.back_angle_bad_thresh - angle) / self.back_angle_bad_thresh.max(1.0);
                (self.posture_weight, depth.clamp(0.0, 1.0))
            }
            Category::HeelStrike => {
                let strike = record.heel_strike.filter(|strike| strike.overstride)?;
                let magnitude = (f64::from(strike.overstride_angle) / 90.0).clamp(0.0, 1.0);
                (self.overstride_weight, magnitude)
            }
            Category::LowVisibility if record.visibility_issue => (self.visibility_weight, 1.0),
            _ => return None,
        };
        Some(weight * ((1.0 - self.position_weight) * magnitude + self.position_weight * position))
    }
}

/// Frame-ordered union of all chunk outputs.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub records: Vec<FrameRecord>,
    pub skipped: usize,
}

impl Timeline {
    pub fn issue_count(&self, category: Category) -> usize {
        self.records
            .iter()
            .filter(|record| match category {
                Category::BadPosture => record.bad_posture,
                Category::HeelStrike => record.overstride_flag() == Some(true),
                Category::LowVisibility => record.visibility_issue,
                Category::All => true,
            })
            .count()
    }

    pub fn heel_strikes(&self) -> usize {
        self.records.iter().filter(|record| record.heel_strike.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IssueCounts {
    pub posture_issues: usize,
    pub overstride_issues: usize,
    pub heel_strikes: usize,
    pub visibility_issues: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorstFrame {
    pub category: Category,
    pub frame_number: usize,
    pub severity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AngleSample {
    pub frame_number: usize,
    pub timestamp: f64,
    pub angle: f32,
    pub lean: Lean,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrikeSample {
    pub frame_number: usize,
    pub angle: f32,
    pub overstride: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_frames: usize,
    pub analyzed_frames: usize,
    pub skipped_frames: usize,
    pub fps: f64,
    pub duration_seconds: f64,
    pub analysis_summary: IssueCounts,
    pub bad_posture_seconds: f64,
    pub bad_posture_percent: f64,
    pub posture_angles: Vec<AngleSample>,
    pub heel_strikes: Vec<StrikeSample>,
    pub worst_frames: Vec<WorstFrame>,
}

/// Joins chunk results into one timeline and derives the report.
pub struct Aggregator<'a> {
    scorer: &'a dyn SeverityScorer,
}

impl<'a> Aggregator<'a> {
    pub fn new(scorer: &'a dyn SeverityScorer) -> Self {
        Self { scorer }
    }

    /// Accepts outputs in any order.
    pub fn merge(outputs: impl IntoIterator<Item = ChunkOutput>) -> Timeline {
        let mut timeline = Timeline::default();
        for output in outputs {
            timeline.records.extend(output.records);
            timeline.skipped += output.skipped;
        }
        timeline.records.sort_by_key(|record| record.frame_number);
        timeline
    }

    pub fn summarize<P>(&self, timeline: &Timeline, meta: &VideoMeta, image_path: P) -> Summary
    where
        P: Fn(Category, usize) -> Option<PathBuf>,
    {
        let counts = IssueCounts {
            posture_issues: timeline.issue_count(Category::BadPosture),
            overstride_issues: timeline.issue_count(Category::HeelStrike),
            heel_strikes: timeline.heel_strikes(),
            visibility_issues: timeline.issue_count(Category::LowVisibility),
        };

        let worst_frames = Category::ISSUES
            .into_iter()
            .filter_map(|category| {
                let (record, score) = self.worst(timeline, category, meta)?;
                Some(WorstFrame {
                    category,
                    frame_number: record.frame_number,
                    severity_score: score,
                    image_path: image_path(category, record.frame_number),
                })
            })
            .collect();

        let bad_posture_percent = if meta.frame_count > 0 {
            counts.posture_issues as f64 * 100.0 / meta.frame_count as f64
        } else {
            0.0
        };

        Summary {
            total_frames: meta.frame_count,
            analyzed_frames: timeline.records.len(),
            skipped_frames: timeline.skipped,
            fps: meta.fps,
            duration_seconds: meta.duration_seconds(),
            analysis_summary: counts,
            bad_posture_seconds: counts.posture_issues as f64 / meta.fps,
            bad_posture_percent,
            posture_angles: timeline
                .records
                .iter()
                .filter(|record| record.bad_posture)
                .filter_map(|record| {
                    let (angle, lean) = record.angle.zip(record.lean)?;
                    Some(AngleSample {
                        frame_number: record.frame_number,
                        timestamp: record.timestamp,
                        angle,
                        lean,
                    })
                })
                .collect(),
            heel_strikes: timeline
                .records
                .iter()
                .filter_map(|record| record.heel_strike)
                .map(|strike| StrikeSample {
                    frame_number: strike.frame_number,
                    angle: strike.overstride_angle,
                    overstride: strike.overstride,
                })
                .collect(),
            worst_frames,
        }
    }

    /// Highest score wins; equal scores keep the earliest frame.
    fn worst<'t>(
        &self,
        timeline: &'t Timeline,
        category: Category,
        meta: &VideoMeta,
    ) -> Option<(&'t FrameRecord, f64)> {
        timeline
            .records
            .iter()
            .filter_map(|record| {
                self.scorer
                    .score(category, record, meta)
                    .filter(|score| score.is_finite())
                    .map(|score| (record, score))
            })
            .fold(None, |best: Option<(&FrameRecord, f64)>, candidate| match best {
                Some(current) if candidate.1.partial_cmp(&current.1) != Some(Ordering::Greater) => {
                    Some(current)
                }
                _ => Some(candidate),
            })
    }
}
