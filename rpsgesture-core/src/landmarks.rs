//! Hand landmark geometry (21 normalized 2-D points per hand)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of landmarks the detector reports per hand
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// Tips of the four non-thumb fingers (index, middle, ring, pinky)
pub const FINGER_TIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Offset from a tip to the reference joint the extension test compares against
pub const PIP_OFFSET: usize = 2;

/// Reference joint for a digit tip
pub const fn pip_of(tip: usize) -> usize {
    tip - PIP_OFFSET
}

/// Normalized image coordinates, [0, 1] per axis, y grows downward
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Horizontal distance to another point
    pub fn dx(&self, other: Point) -> f32 {
        (self.x - other.x).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LandmarkError {
    #[error("expected {expected} landmarks, found {found}")]
    WrongPointCount { expected: usize, found: usize },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// One detected hand.
///
/// Holds whatever the detector produced, well formed or not: the classifier
/// has to be able to degrade on bad input instead of refusing to build it.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Build a set, rejecting anything that is not 21 finite points
    pub fn try_new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        let set = Self { points };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), LandmarkError> {
        if self.points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::WrongPointCount {
                expected: LANDMARK_COUNT,
                found: self.points.len(),
            });
        }
        match self.points.iter().position(|p| !p.is_finite()) {
            Some(index) => Err(LandmarkError::NonFinite { index }),
            None => Ok(()),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Wrist position, if present
    pub fn wrist(&self) -> Option<Point> {
        self.get(WRIST)
    }
}

/// Order hands left to right in the image by wrist x.
///
/// Hands without a usable wrist sort last.
pub fn order_left_to_right(hands: &mut [LandmarkSet]) {
    hands.sort_by(|a, b| {
        let ax = a.wrist().filter(Point::is_finite).map(|p| p.x);
        let bx = b.wrist().filter(Point::is_finite).map(|p| p.x);
        match (ax, bx) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}
