//! Common functionality for object detection.
//!
//! The palm network emits one candidate per anchor; this module defines the decoded
//! candidate type and the non-maximum suppression used to reduce duplicates.

pub mod nms;
pub mod ssd;

use crate::rect::Rect;

/// One anchor's decoded output: a candidate detection in absolute network-input
/// pixel coordinates.
///
/// Per convention, the confidence value lies between 0.0 and 1.0, obtained by
/// passing the raw network logit through [`crate::num::sigmoid`]. Candidates are
/// ephemeral; they are produced per inference call and consumed by suppression.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
    anchor_index: usize,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect, anchor_index: usize) -> Self {
        Self {
            confidence,
            rect,
            keypoints: Vec::new(),
            anchor_index,
        }
    }

    pub fn with_keypoints(
        confidence: f32,
        rect: Rect,
        anchor_index: usize,
        keypoints: Vec<Keypoint>,
    ) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
            anchor_index,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the axis-aligned bounding rectangle of the candidate, already moved
    /// by its anchor.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the index of the anchor this candidate was decoded from.
    ///
    /// The index doubles as a deterministic tie breaker when two candidates have
    /// the same confidence.
    pub fn anchor_index(&self) -> usize {
        self.anchor_index
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The palm network outputs 7 coarse keypoints per candidate; their meaning is
/// given by [`crate::palm::Keypoint`]. Keypoint coordinates are in the same
/// absolute pixel space as the candidate's bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
