use std::path::{Path, PathBuf};

use crate::{
    config::sanitize_fps,
    error::{AnalysisError, Result},
    types::Frame,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMeta {
    pub fps: f64,
    pub frame_count: usize,
}

impl VideoMeta {
    pub fn new(fps: f64, frame_count: usize, default_fps: f64) -> Self {
        Self {
            fps: sanitize_fps(fps, default_fps),
            frame_count,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }
}

/// Random-access frame reader shared by every worker.
pub trait FrameSource: Sync {
    fn meta(&self) -> VideoMeta;

    fn read(&self, index: usize) -> Result<Frame>;
}

pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:06}.jpg")
}

/// Frames already extracted to `frame_000000.jpg`, `frame_000001.jpg`, ...
pub struct ImageDirSource {
    dir: PathBuf,
    meta: VideoMeta,
}

impl ImageDirSource {
    pub fn open(dir: impl Into<PathBuf>, fps: f64, default_fps: f64) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(AnalysisError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("frame directory {} not found", dir.display()),
            )));
        }
        let frame_count = count_frames(&dir);
        log::info!("found {frame_count} frames in {}", dir.display());
        Ok(Self {
            meta: VideoMeta::new(fps, frame_count, default_fps),
            dir,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }
}

fn count_frames(dir: &Path) -> usize {
    (0..)
        .take_while(|&index| dir.join(frame_file_name(index)).is_file())
        .count()
}

impl FrameSource for ImageDirSource {
    fn meta(&self) -> VideoMeta {
        self.meta
    }

    fn read(&self, index: usize) -> Result<Frame> {
        let path = self.frame_path(index);
        let decoded = image::open(&path).map_err(|err| AnalysisError::Source {
            index,
            message: format!("{}: {err}", path.display()),
        })?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Frame::new(index, rgb.into_raw(), width, height, self.meta.fps))
    }
}
