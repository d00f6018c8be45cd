use crate::{
    config::AnalysisConfig,
    geometry,
    types::{BodyPoint, LandmarkSet, Lean, Side},
    visibility::VisibilityGate,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PostureReading {
    /// Shoulder-hip-knee angle in degrees.
    Measured { angle: f32, bad: bool, lean: Lean },
    /// One of the three points failed the visibility gate.
    Hidden,
}

impl PostureReading {
    pub fn angle(&self) -> Option<f32> {
        match self {
            PostureReading::Measured { angle, .. } => Some(*angle),
            PostureReading::Hidden => None,
        }
    }

    pub fn lean(&self) -> Option<Lean> {
        match self {
            PostureReading::Measured { lean, .. } => Some(*lean),
            PostureReading::Hidden => None,
        }
    }

    pub fn is_bad(&self) -> bool {
        matches!(self, PostureReading::Measured { bad: true, .. })
    }
}

/// Stateless torso-lean classifier.
#[derive(Debug, Clone)]
pub struct PostureClassifier {
    gate: VisibilityGate,
    points: [BodyPoint; 3],
    bad_threshold: f32,
}

impl PostureClassifier {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_side(
            config.side,
            VisibilityGate::new(config.min_visibility),
            config.back_angle_bad_thresh,
        )
    }

    pub fn with_side(side: Side, gate: VisibilityGate, bad_threshold: f32) -> Self {
        Self {
            gate,
            points: [BodyPoint::shoulder(side), BodyPoint::hip(side), BodyPoint::knee(side)],
            bad_threshold,
        }
    }

    pub fn classify(&self, landmarks: &LandmarkSet) -> PostureReading {
        let Some([shoulder, hip, knee]) = self.gate.triple(landmarks, self.points) else {
            return PostureReading::Hidden;
        };
        let angle = geometry::angle(shoulder.point(), hip.point(), knee.point());
        // Runner faces +x.
        let lean = if shoulder.x > hip.x {
            Lean::Forward
        } else {
            Lean::Neutral
        };
        PostureReading::Measured {
            angle,
            bad: angle <= self.bad_threshold,
            lean,
        }
    }
}
