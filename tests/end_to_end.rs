use std::{fs, path::PathBuf, sync::Arc};

use approx::assert_relative_eq;
use gait_analyzer::{
    AnalysisError, Result, Settings, analyze_video,
    pipeline::{
        RECORDS_FILE, REPORT_FILE,
        aggregate::ExtremeValueScorer,
        provider::{LandmarkProvider, LandmarkTrack, ReplayProvider},
        sink::{JpegSink, NullSink},
        source::{FrameSource, VideoMeta},
    },
    types::{BodyPoint, Category, Frame, Landmark, LandmarkSet},
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

struct SyntheticSource {
    frames: usize,
    fps: f64,
    pixels: bool,
}

impl SyntheticSource {
    fn blank(frames: usize, fps: f64) -> Self {
        Self {
            frames,
            fps,
            pixels: false,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn meta(&self) -> VideoMeta {
        VideoMeta::new(self.fps, self.frames, 30.0)
    }

    fn read(&self, index: usize) -> Result<Frame> {
        let (width, height, rgb) = if self.pixels {
            (16, 16, vec![128; 16 * 16 * 3])
        } else {
            (WIDTH, HEIGHT, Vec::new())
        };
        Ok(Frame::new(index, rgb, width, height, self.fps))
    }
}

/// Upright runner whose right heel sits at `heel_y`; the knee stays put ahead
/// of the foot.
fn runner(heel_y: f32) -> LandmarkSet {
    LandmarkSet::default()
        .with(BodyPoint::RightShoulder, Landmark::new(0.5, 0.15, 0.9))
        .with(BodyPoint::RightHip, Landmark::new(0.5, 0.45, 0.9))
        .with(BodyPoint::RightKnee, Landmark::new(0.6, 0.6, 0.9))
        .with(BodyPoint::RightHeel, Landmark::new(0.5, heel_y, 0.9))
        .with(BodyPoint::RightFootIndex, Landmark::new(0.6, heel_y, 0.9))
}

/// Single footstrike at frame 50 at 30 fps (window 42, cooldown 11).
fn single_strike_profile(i: usize) -> f32 {
    let t = i as f32;
    match i {
        0..=8 => 0.80,
        9..=25 => 0.60 - 0.01 * (t - 9.0),
        26..=49 => 0.44 + 0.01 * (t - 25.0),
        50 => 0.90,
        _ => 0.90 - 0.01 * (t - 50.0),
    }
}

/// Footstrike every 25 frames over a slowly rising heel.
fn periodic_profile(i: usize) -> f32 {
    let phase = i % 25;
    if phase == 0 { 0.9 } else { 0.6 - 0.005 * phase as f32 }
}

fn track_from(frames: usize, profile: impl Fn(usize) -> f32) -> Arc<LandmarkTrack> {
    Arc::new(LandmarkTrack::from_sets((0..frames).map(|i| (i, runner(profile(i))))))
}

fn strike_frames(
    settings: &Settings,
    source: &SyntheticSource,
    track: Arc<LandmarkTrack>,
) -> Vec<usize> {
    let outcome = analyze_video(
        settings,
        source,
        &ReplayProvider::factory(track),
        &NullSink,
        &ExtremeValueScorer,
    )
    .unwrap();
    outcome
        .timeline
        .records
        .iter()
        .filter_map(|record| record.heel_strike.map(|strike| strike.frame_number))
        .collect()
}

fn sequential() -> Settings {
    let mut settings = Settings::default();
    settings.execution.parallel = false;
    settings
}

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gait-analyzer-{}-{name}", std::process::id()))
}

#[test]
fn single_footstrike_is_detected_once() {
    let source = SyntheticSource::blank(90, 30.0);
    let track = track_from(90, single_strike_profile);
    let outcome = analyze_video(
        &sequential(),
        &source,
        &ReplayProvider::factory(track),
        &NullSink,
        &ExtremeValueScorer,
    )
    .unwrap();

    assert_eq!(outcome.timing.window_size, 42);
    assert_eq!(outcome.timing.cooldown_frames, 11);
    assert_eq!(outcome.timeline.records.len(), 90);

    let strikes: Vec<_> = outcome
        .timeline
        .records
        .iter()
        .filter_map(|record| record.heel_strike)
        .collect();
    assert_eq!(strikes.len(), 1);
    let strike = strikes[0];
    assert_eq!(strike.frame_number, 50);
    // Contact point (336, 432) to knee (384, 288).
    assert_relative_eq!(
        strike.overstride_angle,
        48f32.atan2(144.0).to_degrees(),
        epsilon = 1e-3
    );
    assert!(strike.overstride);

    let summary = &outcome.summary;
    assert_eq!(summary.analysis_summary.heel_strikes, 1);
    assert_eq!(summary.analysis_summary.overstride_issues, 1);
    assert_eq!(summary.analysis_summary.posture_issues, 0);
    assert_eq!(summary.analysis_summary.visibility_issues, 0);
    assert_relative_eq!(summary.duration_seconds, 3.0);
}

#[test]
fn cooldown_blocks_repeat_contact_until_it_expires() {
    let source = SyntheticSource::blank(90, 30.0);

    // Frame 55 ties the window maximum but lands inside the cooldown of the
    // strike at 50; frame 61 is the first frame after it.
    let released = |i: usize| match i {
        55 => 0.90,
        61 => 0.91,
        _ => single_strike_profile(i),
    };
    assert_eq!(
        strike_frames(&sequential(), &source, track_from(90, released)),
        vec![50, 61]
    );

    let blocked = |i: usize| match i {
        55 => 0.90,
        60 => 0.91,
        _ => single_strike_profile(i),
    };
    assert_eq!(
        strike_frames(&sequential(), &source, track_from(90, blocked)),
        vec![50]
    );
}

#[test]
fn parallel_matches_sequential_away_from_boundaries() {
    let mut settings = sequential();
    settings.analysis.window_seconds = 1.0;
    let source = SyntheticSource::blank(200, 10.0);
    let track = track_from(200, periodic_profile);

    let expected: Vec<usize> = (1..8).map(|k| k * 25).collect();
    assert_eq!(strike_frames(&settings, &source, track.clone()), expected);

    settings.execution.parallel = true;
    settings.execution.chunk_frames = 40;
    settings.execution.workers = Some(3);
    assert_eq!(strike_frames(&settings, &source, track), expected);
}

#[test]
fn parallel_output_keeps_every_frame_in_order() {
    let mut settings = Settings::default();
    settings.execution.chunk_frames = 17;
    settings.execution.workers = Some(4);
    let source = SyntheticSource::blank(150, 30.0);
    let outcome = analyze_video(
        &settings,
        &source,
        &ReplayProvider::factory(track_from(150, single_strike_profile)),
        &NullSink,
        &ExtremeValueScorer,
    )
    .unwrap();
    let frames: Vec<usize> = outcome.timeline.records.iter().map(|r| r.frame_number).collect();
    assert_eq!(frames, (0..150).collect::<Vec<_>>());
}

#[test]
fn cooldown_restarts_at_chunk_boundary() {
    let mut settings = sequential();
    settings.analysis.window_seconds = 1.0;
    let source = SyntheticSource::blank(80, 10.0);
    let profile = |i: usize| match i {
        38 => 0.9,
        40 => 0.95,
        _ => 0.5 - 0.001 * i as f32,
    };

    assert_eq!(strike_frames(&settings, &source, track_from(80, profile)), vec![38]);

    settings.execution.parallel = true;
    settings.execution.chunk_frames = 40;
    settings.execution.workers = Some(2);
    assert_eq!(strike_frames(&settings, &source, track_from(80, profile)), vec![38, 40]);
}

#[test]
fn hidden_heel_only_blocks_gait() {
    let hidden_heel = |i: usize| {
        let mut set = runner(single_strike_profile(i));
        set.set(BodyPoint::RightHeel, Landmark::new(0.5, single_strike_profile(i), 0.1));
        (i, set)
    };
    let track = Arc::new(LandmarkTrack::from_sets((0..90).map(hidden_heel)));
    let outcome = analyze_video(
        &sequential(),
        &SyntheticSource::blank(90, 30.0),
        &ReplayProvider::factory(track),
        &NullSink,
        &ExtremeValueScorer,
    )
    .unwrap();

    for record in &outcome.timeline.records {
        assert!(record.heel_strike.is_none());
        assert!(record.angle.is_some());
        assert!(!record.visibility_issue);
    }
}

#[test]
fn hidden_shoulder_is_a_visibility_issue() {
    let track = Arc::new(LandmarkTrack::from_sets((0..30).map(|i| {
        let set = runner(0.8).with(BodyPoint::RightShoulder, Landmark::new(0.5, 0.15, 0.3));
        (i, set)
    })));
    let outcome = analyze_video(
        &sequential(),
        &SyntheticSource::blank(30, 30.0),
        &ReplayProvider::factory(track),
        &NullSink,
        &ExtremeValueScorer,
    )
    .unwrap();

    assert_eq!(outcome.summary.analysis_summary.visibility_issues, 30);
    assert_eq!(outcome.summary.analysis_summary.posture_issues, 0);
    assert!(outcome.timeline.records.iter().all(|r| r.angle.is_none() && !r.bad_posture));
}

struct CrashingProvider;

impl LandmarkProvider for CrashingProvider {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Option<LandmarkSet>> {
        // Owned by the third chunk and outside the fourth chunk's warm-up.
        if frame.index == 105 {
            panic!("estimator state corrupted");
        }
        Ok(Some(runner(0.8)))
    }
}

#[test]
fn crashed_worker_fails_the_whole_run() {
    let mut settings = Settings::default();
    settings.execution.chunk_frames = 50;
    settings.execution.workers = Some(2);
    let factory = || -> anyhow::Result<CrashingProvider> { Ok(CrashingProvider) };
    let result = analyze_video(
        &settings,
        &SyntheticSource::blank(200, 30.0),
        &factory,
        &NullSink,
        &ExtremeValueScorer,
    );
    match result {
        Err(AnalysisError::Worker { chunk, message }) => {
            assert_eq!(chunk, 2);
            assert!(message.contains("estimator state corrupted"));
        }
        other => panic!("expected worker failure, got {:?}", other.map(|o| o.summary)),
    }
}

#[test]
fn invalid_settings_are_rejected_before_work() {
    let mut settings = Settings::default();
    settings.execution.chunk_frames = 0;
    let result = analyze_video(
        &settings,
        &SyntheticSource::blank(10, 30.0),
        &ReplayProvider::factory(Arc::new(LandmarkTrack::default())),
        &NullSink,
        &ExtremeValueScorer,
    );
    assert!(matches!(result, Err(AnalysisError::Config(_))));
}

#[test]
fn writes_images_and_reports() {
    let dir = scratch_dir("artifacts");
    let mut settings = Settings::default();
    settings.output.dir = dir.clone();
    settings.execution.chunk_frames = 30;
    settings.execution.workers = Some(2);

    let sink = JpegSink::new(&settings.output);
    sink.prepare().unwrap();
    let source = SyntheticSource {
        frames: 90,
        fps: 30.0,
        pixels: true,
    };
    let outcome = analyze_video(
        &settings,
        &source,
        &ReplayProvider::factory(track_from(90, single_strike_profile)),
        &sink,
        &ExtremeValueScorer,
    )
    .unwrap();
    outcome.write_artifacts(sink.root()).unwrap();

    let strike_image = dir.join(Category::HeelStrike.dir_name()).join("frame_000050.jpg");
    assert!(strike_image.is_file());
    assert_eq!(fs::read_dir(dir.join(Category::HeelStrike.dir_name())).unwrap().count(), 1);
    assert!(!dir.join(Category::All.dir_name()).exists());

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join(REPORT_FILE)).unwrap()).unwrap();
    assert_eq!(report["total_frames"], 90);
    assert_eq!(report["analysis_summary"]["heel_strikes"], 1);
    let worst = report["worst_frames"]
        .as_array()
        .unwrap()
        .iter()
        .find(|w| w["category"] == "heel-strike")
        .unwrap();
    assert_eq!(worst["frame_number"], 50);

    let records: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join(RECORDS_FILE)).unwrap()).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 90);

    fs::remove_dir_all(&dir).unwrap();
}
