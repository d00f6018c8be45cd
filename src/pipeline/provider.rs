use std::{collections::HashMap, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{BodyPoint, Frame, Landmark, LandmarkSet};

/// Per-frame pose estimator. Instances carry model state and are never shared
/// between workers; each worker builds its own through a [`ProviderFactory`].
pub trait LandmarkProvider: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}

pub trait ProviderFactory: Sync {
    type Provider: LandmarkProvider;

    fn create(&self) -> Result<Self::Provider>;
}

impl<F, P> ProviderFactory for F
where
    F: Fn() -> Result<P> + Sync,
    P: LandmarkProvider,
{
    type Provider = P;

    fn create(&self) -> Result<P> {
        self()
    }
}

#[derive(Debug, Deserialize)]
struct TrackFile {
    #[serde(default)]
    fps: Option<f64>,
    frames: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    frame: usize,
    #[serde(default)]
    landmarks: Option<HashMap<BodyPoint, Landmark>>,
}

/// Landmarks recorded ahead of time by an external pose estimator, keyed by
/// frame index.
#[derive(Debug, Default)]
pub struct LandmarkTrack {
    fps: Option<f64>,
    frames: HashMap<usize, LandmarkSet>,
}

impl LandmarkTrack {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read landmark track {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse landmark track {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: TrackFile = serde_json::from_str(content)?;
        let frames = file
            .frames
            .into_iter()
            .filter_map(|entry| {
                let points = entry.landmarks?;
                let mut set = LandmarkSet::default();
                for (point, landmark) in points {
                    set.set(point, landmark);
                }
                Some((entry.frame, set))
            })
            .collect();
        Ok(Self {
            fps: file.fps,
            frames,
        })
    }

    pub fn from_sets(frames: impl IntoIterator<Item = (usize, LandmarkSet)>) -> Self {
        Self {
            fps: None,
            frames: frames.into_iter().collect(),
        }
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<&LandmarkSet> {
        self.frames.get(&frame)
    }
}

pub struct ReplayProvider {
    track: Arc<LandmarkTrack>,
}

impl ReplayProvider {
    pub fn new(track: Arc<LandmarkTrack>) -> Self {
        Self { track }
    }

    pub fn factory(track: Arc<LandmarkTrack>) -> impl Fn() -> Result<ReplayProvider> + Sync {
        move || Ok(ReplayProvider::new(track.clone()))
    }
}

impl LandmarkProvider for ReplayProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        Ok(self.track.get(frame.index).cloned())
    }
}
