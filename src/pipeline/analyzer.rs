use crate::{
    config::{AnalysisConfig, Timing},
    gait::GaitEventDetector,
    posture::{PostureClassifier, PostureReading},
    types::{FrameRecord, LandmarkSet, frame_timestamp},
};

/// Runs the posture classifier and the gait detector over one frame's
/// landmarks. Owns all per-run detector state.
pub struct FrameAnalyzer {
    posture: PostureClassifier,
    gait: GaitEventDetector,
    fps: f64,
}

impl FrameAnalyzer {
    pub fn new(config: &AnalysisConfig, timing: &Timing) -> Self {
        Self {
            posture: PostureClassifier::new(config),
            gait: GaitEventDetector::new(config, timing),
            fps: timing.fps,
        }
    }

    /// `landmarks` is `None` when the provider found nobody in the frame.
    pub fn analyze(
        &mut self,
        frame_number: usize,
        landmarks: Option<&LandmarkSet>,
        width: u32,
        height: u32,
    ) -> FrameRecord {
        let timestamp = frame_timestamp(frame_number, self.fps).as_secs_f64();
        let Some(landmarks) = landmarks else {
            log::trace!("[frame {frame_number:06}] no landmarks");
            return FrameRecord {
                frame_number,
                timestamp,
                angle: None,
                bad_posture: false,
                visibility_issue: true,
                heel_strike: None,
                lean: None,
            };
        };

        let posture = self.posture.classify(landmarks);
        if let PostureReading::Measured {
            angle,
            bad: true,
            lean,
        } = posture
        {
            log::debug!("[posture] frame={frame_number} angle={angle:.1} lean={lean:?} (bad)");
        }

        let gait = self.gait.observe(frame_number, landmarks, width, height);
        let strike = gait.and_then(|observation| observation.strike);
        if let Some(strike) = strike {
            log::debug!(
                "[heel] frame={frame_number} lowest_y={:.4} angle={:.2}",
                strike.lowest_heel_y,
                strike.overstride_angle
            );
        }

        log::trace!(
            "[frame {frame_number:06}] back_angle={:?} heel_y={:?} lowest_y={:?}",
            posture.angle(),
            gait.map(|observation| observation.heel_y),
            gait.and_then(|observation| observation.lowest_heel_y),
        );

        FrameRecord {
            frame_number,
            timestamp,
            angle: posture.angle(),
            bad_posture: posture.is_bad(),
            visibility_issue: posture == PostureReading::Hidden,
            heel_strike: strike,
            lean: posture.lean(),
        }
    }
}
