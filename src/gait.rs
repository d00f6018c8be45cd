//! Heel-strike detection over a sliding window of heel heights.
//!
//! Image y grows downward, so the largest heel y in the window is the lowest
//! physical heel position. A frame whose heel y reaches the window maximum
//! (within tolerance) is taken as ground contact, after which a cooldown keeps
//! the same footstrike from being counted twice.

use std::collections::VecDeque;

use crate::{
    config::{AnalysisConfig, Timing},
    geometry,
    types::{BodyPoint, HeelStrike, LandmarkSet, Side},
    visibility::VisibilityGate,
};

#[derive(Debug, Clone, Copy)]
pub struct GaitParams {
    pub window_size: usize,
    pub cooldown_frames: usize,
    pub tolerance: f32,
    pub contact_ratio: f32,
    pub overstride_threshold: f32,
}

impl GaitParams {
    pub fn new(config: &AnalysisConfig, timing: &Timing) -> Self {
        Self {
            window_size: timing.window_size.max(1),
            cooldown_frames: timing.cooldown_frames,
            tolerance: config.heel_tolerance,
            contact_ratio: config.contact_ratio,
            overstride_threshold: config.overstride_angle_thresh,
        }
    }
}

/// Lower-limb points of one frame, already past the visibility gate.
#[derive(Debug, Clone, Copy)]
pub struct LimbSample {
    pub heel: (f32, f32),
    pub foot_index: (f32, f32),
    pub knee: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitObservation {
    pub heel_y: f32,
    /// Window maximum, present once the window is full.
    pub lowest_heel_y: Option<f32>,
    pub strike: Option<HeelStrike>,
}

pub struct GaitEventDetector {
    gate: VisibilityGate,
    points: [BodyPoint; 3],
    params: GaitParams,
    history: VecDeque<f32>,
    cooldown: usize,
}

impl GaitEventDetector {
    pub fn new(config: &AnalysisConfig, timing: &Timing) -> Self {
        Self::with_params(
            config.side,
            VisibilityGate::new(config.min_visibility),
            GaitParams::new(config, timing),
        )
    }

    pub fn with_params(side: Side, gate: VisibilityGate, params: GaitParams) -> Self {
        Self {
            gate,
            points: [BodyPoint::heel(side), BodyPoint::foot_index(side), BodyPoint::knee(side)],
            history: VecDeque::new(),
            params,
            cooldown: 0,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn cooldown(&self) -> usize {
        self.cooldown
    }

    /// Gates the heel, foot tip and knee and feeds the frame if all pass.
    /// Returns `None` for ineligible frames, which leave the state untouched.
    pub fn observe(
        &mut self,
        frame_number: usize,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Option<GaitObservation> {
        let [heel, foot_index, knee] = self.gate.triple(landmarks, self.points)?;
        let sample = LimbSample {
            heel: heel.point(),
            foot_index: foot_index.point(),
            knee: knee.point(),
        };
        Some(self.update(frame_number, &sample, width, height))
    }

    /// Advances the window and cooldown by one eligible frame.
    pub fn update(
        &mut self,
        frame_number: usize,
        sample: &LimbSample,
        width: u32,
        height: u32,
    ) -> GaitObservation {
        let heel_y = sample.heel.1;
        self.history.push_back(heel_y);
        while self.history.len() > self.params.window_size {
            self.history.pop_front();
        }

        let mut observation = GaitObservation {
            heel_y,
            lowest_heel_y: None,
            strike: None,
        };

        if self.history.len() == self.params.window_size {
            let lowest = self.history.iter().copied().fold(f32::MIN, f32::max);
            observation.lowest_heel_y = Some(lowest);

            if self.cooldown == 0 && heel_y >= lowest - self.params.tolerance {
                let overstride_angle = self.overstride_angle(sample, width, height);
                observation.strike = Some(HeelStrike {
                    frame_number,
                    overstride_angle,
                    overstride: overstride_angle > self.params.overstride_threshold,
                    lowest_heel_y: lowest,
                });
                self.cooldown = self.params.cooldown_frames;
            }
        }

        // Single end-of-frame decrement; a cooldown armed above counts this
        // frame as its first.
        if self.cooldown > 0 {
            self.cooldown -= 1;
        }

        observation
    }

    fn overstride_angle(&self, sample: &LimbSample, width: u32, height: u32) -> f32 {
        let heel = geometry::normalized_to_pixel(sample.heel, width, height);
        let foot_index = geometry::normalized_to_pixel(sample.foot_index, width, height);
        let knee = geometry::normalized_to_pixel(sample.knee, width, height);
        let contact = geometry::lerp(heel, foot_index, self.params.contact_ratio);
        geometry::angle_from_vertical(contact, knee)
    }
}
