use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use serde::Serialize;

use super::source::frame_file_name;
use crate::{
    config::OutputConfig,
    error::{AnalysisError, Result},
    types::{Category, Frame},
};

/// Receives frames that landed in an issue category. Workers write disjoint
/// paths, so implementations only need shared access.
pub trait OutputSink: Sync {
    fn wants(&self, category: Category) -> bool;

    fn write(&self, category: Category, frame: &Frame) -> Result<()>;

    fn image_path(&self, _category: Category, _index: usize) -> Option<PathBuf> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn wants(&self, _category: Category) -> bool {
        false
    }

    fn write(&self, _category: Category, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

/// Writes `{root}/{category}/frame_{index:06}.jpg`.
pub struct JpegSink {
    root: PathBuf,
    quality: u8,
    save_low_visibility: bool,
    save_all_frames: bool,
}

impl JpegSink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: config.dir.clone(),
            quality: config.jpeg_quality,
            save_low_visibility: config.save_low_visibility,
            save_all_frames: config.save_all_frames,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clears previous results and creates the category folders.
    pub fn prepare(&self) -> Result<()> {
        if self.root.is_dir() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;
        for category in Category::ISSUES {
            if self.wants(category) {
                fs::create_dir_all(self.root.join(category.dir_name()))?;
            }
        }
        if self.save_all_frames {
            fs::create_dir_all(self.root.join(Category::All.dir_name()))?;
        }
        Ok(())
    }

    fn path_for(&self, category: Category, index: usize) -> PathBuf {
        self.root.join(category.dir_name()).join(frame_file_name(index))
    }
}

impl OutputSink for JpegSink {
    fn wants(&self, category: Category) -> bool {
        match category {
            Category::BadPosture | Category::HeelStrike => true,
            Category::LowVisibility => self.save_low_visibility,
            Category::All => self.save_all_frames,
        }
    }

    fn write(&self, category: Category, frame: &Frame) -> Result<()> {
        if !frame.has_pixels() {
            log::warn!(
                "frame {} has no pixel data, not writing {}",
                frame.index,
                category.dir_name()
            );
            return Ok(());
        }
        let path = self.path_for(category, frame.index);
        let file = File::create(&path)?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.quality);
        encoder
            .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|source| AnalysisError::Sink { path, source })
    }

    fn image_path(&self, category: Category, index: usize) -> Option<PathBuf> {
        self.wants(category).then(|| self.path_for(category, index))
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}
