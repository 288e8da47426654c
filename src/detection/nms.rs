//! Non-Maximum Suppression.
//!
//! Single-Shot MultiBox Detectors produce duplicate detections for individual
//! objects: several neighboring anchors fire for the same hand. Non-Maximum
//! Suppression (NMS) filters these duplicates out, leaving one high-confidence
//! detection per object.
//!
//! The overlap measure used here is the intersection area divided by the *other*
//! candidate's own area, matching the classic greedy suppression recipe the palm
//! network was tuned against (this is not symmetric, unlike IoU). Candidate order
//! must not influence the result, so candidates are ranked by descending
//! confidence with the anchor index as a deterministic tie breaker.

use std::cmp::Reverse;

use crate::num::TotalF32;

use super::Detection;

/// A greedy non-maximum suppression pass.
pub struct NonMaxSuppression {
    overlap_thresh: f32,
    out_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default overlap ratio above which two detections are considered
    /// duplicates.
    pub const DEFAULT_OVERLAP_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            overlap_thresh: Self::DEFAULT_OVERLAP_THRESH,
            out_buf: Vec::new(),
        }
    }

    /// Sets the overlap ratio threshold to consider two detections as duplicates.
    ///
    /// By default, [`Self::DEFAULT_OVERLAP_THRESH`] is used.
    pub fn set_overlap_thresh(&mut self, overlap_thresh: f32) {
        self.overlap_thresh = overlap_thresh;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` will be emptied in the process. Surviving detections are
    /// returned as an iterator, ordered by descending confidence.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence and process from the back, so the most
        // confident candidate seeds each round. Equal confidences are resolved by
        // anchor index to keep the result independent of input order.
        detections.sort_unstable_by_key(|det| {
            (TotalF32(det.confidence()), Reverse(det.anchor_index()))
        });

        while let Some(seed) = detections.pop() {
            detections.retain(|other| overlap_ratio(&seed, other) < self.overlap_thresh);
            self.out_buf.push(seed);
        }

        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of `other`'s area covered by `seed`.
///
/// Zero-area candidates never overlap anything.
fn overlap_ratio(seed: &Detection, other: &Detection) -> f32 {
    let area = other.bounding_rect().area();
    if area <= 0.0 {
        return 0.0;
    }
    seed.bounding_rect().intersection_area(&other.bounding_rect()) / area
}
