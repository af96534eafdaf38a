use serde::Deserialize;
use thiserror::Error;

pub const NUM_HAND_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_MCP: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// (tip, pip) index pairs for the four non-thumb fingers.
pub const FINGER_TIPS_AND_PIPS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;

pub const POSE_CONNECTIONS: &[(usize, usize)] = &[
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
    (11, 23),
    (12, 24),
    (23, 25),
    (25, 27),
    (24, 26),
    (26, 28),
];

/// A single keypoint in frame-local coordinates. Image convention: y grows
/// downward. 2D sources leave `z` at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "LandmarkRepr")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn planar(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkRepr {
    Planar([f32; 2]),
    Spatial([f32; 3]),
    Named {
        x: f32,
        y: f32,
        #[serde(default)]
        z: f32,
    },
}

impl From<LandmarkRepr> for Landmark {
    fn from(repr: LandmarkRepr) -> Self {
        match repr {
            LandmarkRepr::Planar([x, y]) => Landmark::planar(x, y),
            LandmarkRepr::Spatial([x, y, z]) => Landmark::new(x, y, z),
            LandmarkRepr::Named { x, y, z } => Landmark::new(x, y, z),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("hand frame needs {NUM_HAND_LANDMARKS} landmarks, got {0}")]
    TooShort(usize),
}

/// One tick's hand landmarks in the 21-point topology.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    points: [Landmark; NUM_HAND_LANDMARKS],
}

impl HandFrame {
    /// Extra trailing points are ignored.
    pub fn from_points(points: &[Landmark]) -> Result<Self, LandmarkError> {
        let points: [Landmark; NUM_HAND_LANDMARKS] = points
            .get(..NUM_HAND_LANDMARKS)
            .and_then(|head| head.try_into().ok())
            .ok_or(LandmarkError::TooShort(points.len()))?;
        Ok(Self { points })
    }

    pub fn point(&self, index: usize) -> Landmark {
        self.points[index]
    }
}

/// Body pose landmarks; length depends on the pose model.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PoseFrame {
    pub landmarks: Vec<Landmark>,
}

#[cfg(test)]
impl PoseFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }
}

impl PoseFrame {
    pub fn shoulders(&self) -> Option<(Landmark, Landmark)> {
        self.pair(LEFT_SHOULDER, RIGHT_SHOULDER)
    }

    pub fn hips(&self) -> Option<(Landmark, Landmark)> {
        self.pair(LEFT_HIP, RIGHT_HIP)
    }

    /// Connections whose endpoints both exist in this frame.
    pub fn visible_connections(&self) -> impl Iterator<Item = (Landmark, Landmark)> + '_ {
        POSE_CONNECTIONS
            .iter()
            .filter_map(|&(a, b)| self.pair(a, b))
    }

    fn pair(&self, a: usize, b: usize) -> Option<(Landmark, Landmark)> {
        Some((*self.landmarks.get(a)?, *self.landmarks.get(b)?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    FistClosed,
    PalmOpen,
    ThumbUp,
}

pub const GESTURE_COUNT: usize = 3;

impl Gesture {
    pub const ALL: [Gesture; GESTURE_COUNT] =
        [Gesture::FistClosed, Gesture::PalmOpen, Gesture::ThumbUp];

    pub fn index(&self) -> usize {
        match self {
            Gesture::FistClosed => 0,
            Gesture::PalmOpen => 1,
            Gesture::ThumbUp => 2,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Gesture::FistClosed => "fist closed",
            Gesture::PalmOpen => "palm open",
            Gesture::ThumbUp => "thumb up",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Gesture::FistClosed => "✊ ",
            Gesture::PalmOpen => "🖐 ",
            Gesture::ThumbUp => "👍 ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_frame_rejects_short_input() {
        let points = vec![Landmark::default(); 20];
        assert_eq!(
            HandFrame::from_points(&points),
            Err(LandmarkError::TooShort(20))
        );
    }

    #[test]
    fn hand_frame_keeps_first_21_points() {
        let points: Vec<Landmark> = (0..25).map(|i| Landmark::planar(i as f32, 0.0)).collect();
        let frame = HandFrame::from_points(&points).unwrap();
        assert_eq!(frame.point(WRIST).x, 0.0);
        assert_eq!(frame.point(PINKY_TIP).x, 20.0);
    }

    #[test]
    fn landmark_deserializes_from_arrays_and_objects() {
        let parsed: Vec<Landmark> =
            serde_json::from_str(r#"[[1.0, 2.0], [1.0, 2.0, 3.0], {"x": 4.0, "y": 5.0}]"#)
                .unwrap();
        assert_eq!(parsed[0], Landmark::planar(1.0, 2.0));
        assert_eq!(parsed[1], Landmark::new(1.0, 2.0, 3.0));
        assert_eq!(parsed[2], Landmark::planar(4.0, 5.0));
    }

    #[test]
    fn pose_frame_skips_missing_connections() {
        let mut landmarks = vec![Landmark::default(); 17];
        landmarks[11] = Landmark::planar(1.0, 1.0);
        landmarks[12] = Landmark::planar(2.0, 1.0);
        let pose = PoseFrame::new(landmarks);

        assert!(pose.shoulders().is_some());
        assert!(pose.hips().is_none());
        assert_eq!(pose.visible_connections().count(), 5);
    }
}
