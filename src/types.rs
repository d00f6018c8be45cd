use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct Frame {
    pub index: usize,
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Duration,
}

impl Frame {
    pub fn new(index: usize, rgb: Vec<u8>, width: u32, height: u32, fps: f64) -> Self {
        Self {
            index,
            rgb,
            width,
            height,
            timestamp: frame_timestamp(index, fps),
        }
    }

    pub fn has_pixels(&self) -> bool {
        !self.rgb.is_empty() && self.rgb.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

/// Falls back to zero when `index / fps` is not a representable duration.
pub fn frame_timestamp(index: usize, fps: f64) -> Duration {
    Duration::try_from_secs_f64(index as f64 / fps).unwrap_or(Duration::ZERO)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Body points the analysis reads. Indices are stable and back the array in
/// [`LandmarkSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum BodyPoint {
    LeftShoulder = 0,
    RightShoulder = 1,
    LeftHip = 2,
    RightHip = 3,
    LeftKnee = 4,
    RightKnee = 5,
    LeftHeel = 6,
    RightHeel = 7,
    LeftFootIndex = 8,
    RightFootIndex = 9,
}

impl BodyPoint {
    pub const COUNT: usize = 10;

    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => BodyPoint::LeftShoulder,
            Side::Right => BodyPoint::RightShoulder,
        }
    }

    pub fn hip(side: Side) -> Self {
        match side {
            Side::Left => BodyPoint::LeftHip,
            Side::Right => BodyPoint::RightHip,
        }
    }

    pub fn knee(side: Side) -> Self {
        match side {
            Side::Left => BodyPoint::LeftKnee,
            Side::Right => BodyPoint::RightKnee,
        }
    }

    pub fn heel(side: Side) -> Self {
        match side {
            Side::Left => BodyPoint::LeftHeel,
            Side::Right => BodyPoint::RightHeel,
        }
    }

    pub fn foot_index(side: Side) -> Self {
        match side {
            Side::Left => BodyPoint::LeftFootIndex,
            Side::Right => BodyPoint::RightFootIndex,
        }
    }
}

/// One landmark in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    pub fn point(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            visibility: 0.0,
        }
    }
}

/// Landmarks produced for a single frame. Points the provider did not report
/// carry zero visibility and therefore never pass the gate.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; BodyPoint::COUNT],
}

impl LandmarkSet {
    pub fn get(&self, point: BodyPoint) -> &Landmark {
        &self.points[point as usize]
    }

    pub fn with(mut self, point: BodyPoint, landmark: Landmark) -> Self {
        self.points[point as usize] = landmark;
        self
    }

    pub fn set(&mut self, point: BodyPoint, landmark: Landmark) {
        self.points[point as usize] = landmark;
    }
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            points: [Landmark::default(); BodyPoint::COUNT],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    BadPosture,
    HeelStrike,
    LowVisibility,
    All,
}

impl Category {
    pub const ISSUES: [Category; 3] = [
        Category::BadPosture,
        Category::HeelStrike,
        Category::LowVisibility,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::BadPosture => "bad-posture",
            Category::HeelStrike => "heel-strike",
            Category::LowVisibility => "low-visibility",
            Category::All => "all",
        }
    }
}

/// Torso lean relative to the hip, read from the shoulder's x position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    Forward,
    Neutral,
}

/// A detected heel-strike peak.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HeelStrike {
    pub frame_number: usize,
    pub overstride_angle: f32,
    pub overstride: bool,
    #[serde(skip)]
    pub lowest_heel_y: f32,
}

/// Per-frame outcome surfaced to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame_number: usize,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    pub bad_posture: bool,
    pub visibility_issue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heel_strike: Option<HeelStrike>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lean: Option<Lean>,
}

impl FrameRecord {
    pub fn overstride_flag(&self) -> Option<bool> {
        self.heel_strike.map(|strike| strike.overstride)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ISSUES.into_iter().filter(|category| match category {
            Category::BadPosture => self.bad_posture,
            Category::HeelStrike => self.heel_strike.is_some(),
            Category::LowVisibility => self.visibility_issue,
            Category::All => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreported_points_have_zero_visibility() {
        let set = LandmarkSet::default().with(BodyPoint::RightHeel, Landmark::new(0.4, 0.9, 0.8));
        assert_eq!(set.get(BodyPoint::RightHeel).visibility, 0.8);
        assert_eq!(set.get(BodyPoint::LeftHeel).visibility, 0.0);
    }

    #[test]
    fn side_maps_to_matching_points() {
        assert_eq!(BodyPoint::heel(Side::Left), BodyPoint::LeftHeel);
        assert_eq!(BodyPoint::foot_index(Side::Right), BodyPoint::RightFootIndex);
        assert_eq!(BodyPoint::shoulder(Side::Right) as usize, 1);
    }

    #[test]
    fn record_categories_follow_flags() {
        let record = FrameRecord {
            frame_number: 3,
            timestamp: 0.1,
            angle: Some(95.0),
            bad_posture: true,
            visibility_issue: false,
            heel_strike: None,
            lean: Some(Lean::Forward),
        };
        let categories: Vec<_> = record.categories().collect();
        assert_eq!(categories, vec![Category::BadPosture]);
        assert_eq!(record.overstride_flag(), None);
    }

    #[test]
    fn timestamp_uses_fps() {
        assert_eq!(frame_timestamp(60, 30.0), Duration::from_secs(2));
    }

    #[test]
    fn unrepresentable_timestamp_is_zero() {
        assert_eq!(frame_timestamp(5, 1e-300), Duration::ZERO);
        assert_eq!(frame_timestamp(5, 0.0), Duration::ZERO);
        assert_eq!(frame_timestamp(0, f64::NAN), Duration::ZERO);
    }
}
