use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnalysisError, Result};
use crate::types::Side;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Body side whose landmarks are tracked.
    #[serde(default = "default_side")]
    pub side: Side,
    /// Landmarks must be strictly above this visibility to be trusted.
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
    /// Shoulder-hip-knee angles at or below this are bad posture.
    #[serde(default = "default_back_angle_bad_thresh")]
    pub back_angle_bad_thresh: f32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    /// Position of the ground contact point along heel -> foot tip.
    #[serde(default = "default_contact_ratio")]
    pub contact_ratio: f32,
    #[serde(default = "default_heel_tolerance")]
    pub heel_tolerance: f32,
    /// Overstride angles above this are flagged.
    #[serde(default = "default_overstride_angle_thresh")]
    pub overstride_angle_thresh: f32,
    /// Substituted when the source reports an unusable frame rate.
    #[serde(default = "default_fps")]
    pub default_fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_save_low_visibility")]
    pub save_low_visibility: bool,
    #[serde(default)]
    pub save_all_frames: bool,
}

fn default_side() -> Side { Side::Right }
fn default_min_visibility() -> f32 { 0.30 }
fn default_back_angle_bad_thresh() -> f32 { 110.0 }
fn default_window_seconds() -> f64 { 1.4 }
fn default_cooldown_seconds() -> f64 { 0.35 }
fn default_contact_ratio() -> f32 { 2.0 / 8.0 }
fn default_heel_tolerance() -> f32 { 1e-3 }
fn default_overstride_angle_thresh() -> f32 { 10.0 }
fn default_fps() -> f64 { 30.0 }
fn default_parallel() -> bool { true }
fn default_chunk_frames() -> usize { 200 }
fn default_output_dir() -> PathBuf { PathBuf::from("out") }
fn default_jpeg_quality() -> u8 { 92 }
fn default_save_low_visibility() -> bool { true }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            side: default_side(),
            min_visibility: default_min_visibility(),
            back_angle_bad_thresh: default_back_angle_bad_thresh(),
            window_seconds: default_window_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
            contact_ratio: default_contact_ratio(),
            heel_tolerance: default_heel_tolerance(),
            overstride_angle_thresh: default_overstride_angle_thresh(),
            default_fps: default_fps(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            chunk_frames: default_chunk_frames(),
            workers: None,
        }
    }
}

impl ExecutionConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            cpus.saturating_sub(1).max(4)
        })
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
            save_low_visibility: default_save_low_visibility(),
            save_all_frames: false,
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if !(0.0..1.0).contains(&a.min_visibility) {
            return Err(config_error("min_visibility must be in [0, 1)"));
        }
        if !a.back_angle_bad_thresh.is_finite() {
            return Err(config_error("back_angle_bad_thresh must be finite"));
        }
        if !positive(a.window_seconds) || !positive(a.cooldown_seconds) {
            return Err(config_error("window_seconds and cooldown_seconds must be positive"));
        }
        if !(0.0..=1.0).contains(&a.contact_ratio) {
            return Err(config_error("contact_ratio must be in [0, 1]"));
        }
        if !(a.heel_tolerance.is_finite() && a.heel_tolerance >= 0.0) {
            return Err(config_error("heel_tolerance must be a non-negative number"));
        }
        if !a.overstride_angle_thresh.is_finite() {
            return Err(config_error("overstride_angle_thresh must be finite"));
        }
        if !FPS_RANGE.contains(&a.default_fps) {
            return Err(config_error("default_fps must be in 0.01..=1000"));
        }
        if self.execution.chunk_frames == 0 {
            return Err(config_error("chunk_frames must be at least 1"));
        }
        if self.execution.workers == Some(0) {
            return Err(config_error("workers must be at least 1"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(config_error("jpeg_quality must be in 1..=100"));
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn config_error(message: &str) -> AnalysisError {
    AnalysisError::Config(message.to_string())
}

/// Frame-domain constants derived once per video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub fps: f64,
    pub window_size: usize,
    pub cooldown_frames: usize,
}

impl Timing {
    pub fn new(fps: f64, analysis: &AnalysisConfig) -> Self {
        let fps = sanitize_fps(fps, analysis.default_fps);
        Self {
            fps,
            window_size: seconds_to_frames(fps, analysis.window_seconds),
            cooldown_frames: seconds_to_frames(fps, analysis.cooldown_seconds),
        }
    }
}

/// Frame rates outside this range are treated as unusable.
pub const FPS_RANGE: RangeInclusive<f64> = 0.01..=1000.0;

pub fn sanitize_fps(fps: f64, fallback: f64) -> f64 {
    if FPS_RANGE.contains(&fps) {
        fps
    } else {
        log::warn!("unusable fps {fps}, falling back to {fallback}");
        fallback
    }
}

fn seconds_to_frames(fps: f64, seconds: f64) -> usize {
    ((fps * seconds).round() as usize).max(1)
}
