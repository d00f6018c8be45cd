use crate::types::{BodyPoint, Landmark, LandmarkSet};

/// Admits landmarks whose visibility is strictly above the threshold.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityGate {
    threshold: f32,
}

impl VisibilityGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn admits(&self, landmark: &Landmark) -> bool {
        landmark.visibility.is_finite() && landmark.visibility > self.threshold
    }

    /// Returns the three landmarks only if every one of them passes.
    pub fn triple<'a>(
        &self,
        set: &'a LandmarkSet,
        points: [BodyPoint; 3],
    ) -> Option<[&'a Landmark; 3]> {
        let triple = points.map(|point| set.get(point));
        triple.iter().all(|lm| self.admits(lm)).then_some(triple)
    }
}
