//! The palm region decoder.
//!
//! Converts raw per-anchor network outputs into a single oriented hand region:
//! sigmoid → confidence threshold → anchor shift → non-maximum suppression →
//! oriented triangular frame. Exactly one region (or none) is produced per call;
//! overlapping candidates are reduced by suppression and the most confident
//! survivor wins ("top-1 by probability" — the single-hand policy).

use nalgebra::{Point2, Vector2};

use crate::{
    affine,
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors},
        Detection, Keypoint,
    },
    error::PalmError,
    iter::zip_exact,
    nn::{PalmOutputs, INPUT_SIZE, NUM_BOX_PARAMS},
    num::sigmoid,
    rect::{OrientedBox, Rect},
};

/// Baseline vectors shorter than this are treated as degenerate.
const MIN_BASELINE: f32 = 1e-6;

/// Number of keypoints regressed per candidate.
const NUM_KEYPOINTS: usize = 7;

/// Decodes raw palm network outputs against a fixed anchor table.
///
/// The decoder is the explicit context object of the pipeline: it owns the anchor
/// table and the decode tunables, is constructed once, and keeps no state between
/// calls.
pub struct Decoder {
    anchors: Anchors,
    nms: NonMaxSuppression,
    threshold: f32,
    box_enlarge: f32,
    box_shift: f32,
}

impl Decoder {
    pub fn new(anchors: Anchors, config: super::PalmConfig) -> Self {
        let mut nms = NonMaxSuppression::new();
        nms.set_overlap_thresh(config.overlap_thresh);
        Self {
            anchors,
            nms,
            threshold: config.threshold,
            box_enlarge: config.box_enlarge,
            box_shift: config.box_shift,
        }
    }

    /// Decodes one inference pass into at most one palm region.
    ///
    /// Returns `Ok(None)` when no anchor's probability exceeds the threshold; no
    /// suppression or geometry work happens in that case. Degenerate keypoint
    /// geometry fails with [`PalmError::DegenerateGeometry`] instead of producing
    /// NaN coordinates.
    pub fn decode(&mut self, outputs: &PalmOutputs) -> Result<Option<Decoded>, PalmError> {
        let regressors = &outputs.regressors;
        let scores = &outputs.scores;

        if regressors.ncols() != NUM_BOX_PARAMS {
            return Err(PalmError::TensorShape {
                what: "regression",
                got: regressors.shape().to_vec(),
                expected: "[num_anchors, 18]",
            });
        }
        if scores.len() != regressors.nrows() {
            return Err(PalmError::TensorShape {
                what: "confidence",
                got: scores.shape().to_vec(),
                expected: "[num_anchors]",
            });
        }
        if self.anchors.anchor_count() != regressors.nrows() {
            return Err(PalmError::AnchorCountMismatch {
                table: self.anchors.anchor_count(),
                network: regressors.nrows(),
            });
        }

        let mut candidates = Vec::new();
        let mut candidate_anchors = Vec::new();
        let rows = zip_exact(self.anchors.iter(), regressors.outer_iter());
        for (index, ((anchor, row), &logit)) in zip_exact(rows, scores.iter()).enumerate() {
            let confidence = sigmoid(logit);
            if confidence <= self.threshold {
                continue;
            }

            candidates.push(extract_candidate(anchor, row, confidence, index));
            candidate_anchors.push(*anchor);
        }

        if candidates.is_empty() {
            log::debug!("no anchor above threshold {}", self.threshold);
            return Ok(None);
        }

        let mut working = candidates.clone();
        let mut survivors = self.nms.process(&mut working);
        let Some(winner) = survivors.next() else {
            // Suppression of a non-empty list always yields at least one survivor.
            return Ok(None);
        };
        let survivor_count = 1 + survivors.count();
        if survivor_count > 1 {
            log::debug!(
                "{survivor_count} regions survived suppression, keeping the most confident"
            );
        }

        let selected = candidates
            .iter()
            .position(|c| c.anchor_index() == winner.anchor_index())
            .expect("suppression winner originates from the candidate list");

        let region = self.extract_region(&winner)?;
        Ok(Some(Decoded {
            region,
            debug: DebugInfo {
                candidates,
                anchors: candidate_anchors,
                selected,
                survivors: survivor_count,
            },
        }))
    }

    /// Builds the oriented triangular frame from the winning candidate.
    ///
    /// The frame's baseline direction is the wrist→middle-finger vector scaled by
    /// `max(width, height) * box_enlarge`; the third point is the baseline rotated
    /// by 90°. The whole frame is then shifted along the baseline by `box_shift`
    /// to recenter the crop on the palm.
    fn extract_region(&self, winner: &Detection) -> Result<Region, PalmError> {
        let keypoints: Vec<Point2<f32>> = winner
            .keypoints()
            .iter()
            .map(|kp| Point2::new(kp.x(), kp.y()))
            .collect();
        let keypoints: [Point2<f32>; NUM_KEYPOINTS] = keypoints
            .try_into()
            .map_err(|_| PalmError::DegenerateGeometry("candidate lacks the 7 palm keypoints"))?;

        let wrist = keypoints[super::Keypoint::Wrist as usize];
        let middle = keypoints[super::Keypoint::MiddleFingerMcp as usize];

        let baseline: Vector2<f32> = middle - wrist;
        let length = baseline.norm();
        if !(length > MIN_BASELINE) {
            return Err(PalmError::DegenerateGeometry(
                "wrist and middle finger keypoints coincide",
            ));
        }

        let rect = winner.bounding_rect();
        let side = rect.width().max(rect.height()) * self.box_enlarge;

        let dir = baseline / length;
        // The baseline rotated by 90° (clockwise in image coordinates).
        let perp = Vector2::new(dir.y, -dir.x);

        let shift = baseline * self.box_shift;
        let triangle = [
            middle + shift,
            middle + dir * side + shift,
            middle + perp * side + shift,
        ];

        Ok(Region {
            triangle,
            keypoints,
            confidence: winner.confidence(),
        })
    }
}

fn extract_candidate(
    anchor: &Anchor,
    box_params: ndarray::ArrayView1<'_, f32>,
    confidence: f32,
    anchor_index: usize,
) -> Detection {
    debug_assert_eq!(box_params.len(), NUM_BOX_PARAMS);

    let input = INPUT_SIZE as f32;
    let anchor_x = anchor.x_center() * input;
    let anchor_y = anchor.y_center() * input;

    let xc = box_params[0] + anchor_x;
    let yc = box_params[1] + anchor_y;
    let w = box_params[2];
    let h = box_params[3];

    let keypoints = (0..NUM_KEYPOINTS)
        .map(|i| {
            Keypoint::new(
                box_params[4 + 2 * i] + anchor_x,
                box_params[5 + 2 * i] + anchor_y,
            )
        })
        .collect();

    Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), anchor_index, keypoints)
}

/// The result of a successful decode: the winning region plus diagnostics.
#[derive(Debug)]
pub struct Decoded {
    pub region: Region,
    pub debug: DebugInfo,
}

/// An oriented hand region in network input (256×256) coordinates.
#[derive(Debug, Clone)]
pub struct Region {
    triangle: [Point2<f32>; 3],
    keypoints: [Point2<f32>; NUM_KEYPOINTS],
    confidence: f32,
}

impl Region {
    /// The triangular affine frame describing the region's position, scale, and
    /// rotation.
    pub fn triangle(&self) -> &[Point2<f32>; 3] {
        &self.triangle
    }

    /// The 7 decoded palm keypoints, indexable by [`super::Keypoint`].
    pub fn keypoints(&self) -> &[Point2<f32>; NUM_KEYPOINTS] {
        &self.keypoints
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Maps the region into original image coordinates.
    ///
    /// `scale` is the factor from network input to padded image coordinates
    /// (`max(width, height) / 256`), `pad` the padding offset added by
    /// [`crate::image::pad_to_square`]. The triangular frame is sent onto the fixed
    /// target triangle to recover the affine transform, whose inverse projects the
    /// canonical crop square back into the padded image; subtracting the padding
    /// lands in the original image's coordinate space.
    pub fn to_oriented_box(&self, scale: f32, pad: (u32, u32)) -> Result<OrientedBox, PalmError> {
        let src = self.triangle.map(|p| p * scale);
        let m = affine::from_triangles(&src, &target_triangle())?;
        let m_inv = affine::invert(&m)?;

        let offset = Vector2::new(pad.0 as f32, pad.1 as f32);
        let corners = target_box().map(|corner| affine::apply(&m_inv, corner) - offset);
        Ok(OrientedBox::new(corners))
    }
}

/// Where the triangular frame is moved to in the canonical 256×256 crop.
fn target_triangle() -> [Point2<f32>; 3] {
    let half = INPUT_SIZE as f32 / 2.0;
    [
        Point2::new(half, half),
        Point2::new(half, 0.0),
        Point2::new(0.0, half),
    ]
}

/// Corners of the canonical crop square.
fn target_box() -> [Point2<f32>; 4] {
    let full = INPUT_SIZE as f32;
    [
        Point2::new(0.0, 0.0),
        Point2::new(full, 0.0),
        Point2::new(full, full),
        Point2::new(0.0, full),
    ]
}

/// Diagnostics of one decode call: which candidates survived filtering and which
/// one won suppression.
#[derive(Debug)]
pub struct DebugInfo {
    /// All candidates above the confidence threshold, moved by their anchors.
    pub candidates: Vec<Detection>,
    /// The anchors corresponding to `candidates`, in the same order.
    pub anchors: Vec<Anchor>,
    /// Index of the winning candidate in `candidates`.
    pub selected: usize,
    /// Number of regions that survived suppression. Values above 1 would indicate
    /// multiple distinct hands; only the most confident one is reported.
    pub survivors: usize,
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array2};

    use crate::palm::PalmConfig;

    use super::*;

    /// A logit that sigmoids to well above the 0.5 threshold.
    const HIGH: f32 = 2.0;
    /// A logit that sigmoids to well below the 0.5 threshold.
    const LOW: f32 = -10.0;

    fn anchors(centers: &[(f32, f32)]) -> Anchors {
        centers.iter().map(|&(x, y)| Anchor::new(x, y)).collect()
    }

    fn outputs(rows: &[[f32; NUM_BOX_PARAMS]], logits: &[f32]) -> PalmOutputs {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        PalmOutputs {
            regressors: Array2::from_shape_vec((rows.len(), NUM_BOX_PARAMS), flat).unwrap(),
            scores: Array1::from_vec(logits.to_vec()),
        }
    }

    fn decoder(anchors: Anchors) -> Decoder {
        Decoder::new(anchors, PalmConfig::default())
    }

    /// Box of size 2 at the anchor center, wrist below the middle finger MCP.
    fn upright_hand_row() -> [f32; NUM_BOX_PARAMS] {
        let mut row = [0.0; NUM_BOX_PARAMS];
        row[2] = 2.0; // width
        row[3] = 2.0; // height
        row[5] = 20.0; // wrist y delta
        row[9] = -20.0; // middle finger MCP y delta
        row
    }

    #[test]
    fn all_logits_below_threshold_is_no_detection() {
        let mut dec = decoder(anchors(&[(0.25, 0.25), (0.5, 0.5), (0.75, 0.75)]));
        let out = outputs(
            &[upright_hand_row(), upright_hand_row(), upright_hand_row()],
            &[LOW, LOW, LOW],
        );
        assert!(dec.decode(&out).unwrap().is_none());
    }

    #[test]
    fn single_candidate_produces_expected_corner() {
        let mut dec = decoder(anchors(&[(0.5, 0.5)]));
        let out = outputs(&[upright_hand_row()], &[HIGH]);

        let decoded = dec.decode(&out).unwrap().expect("one candidate passes");
        assert_eq!(decoded.debug.candidates.len(), 1);
        assert_eq!(decoded.debug.selected, 0);
        assert_eq!(decoded.debug.survivors, 1);

        // Anchor center is (128, 128); wrist at (128, 148), middle MCP at
        // (128, 108). The baseline points straight up, side = 2 * 1.5 = 3, and
        // the 0.2 shift moves the frame up by 8: triangle corner at (128, 100).
        let region = &decoded.region;
        assert_relative_eq!(region.triangle()[0], Point2::new(128.0, 100.0), epsilon = 1e-3);
        assert_relative_eq!(region.triangle()[1], Point2::new(128.0, 97.0), epsilon = 1e-3);
        assert_relative_eq!(region.triangle()[2], Point2::new(125.0, 100.0), epsilon = 1e-3);

        // With unit scale and no padding, the analytic wrist-anchored corner of
        // the enlarged crop is (125, 97).
        let oriented = region.to_oriented_box(1.0, (0, 0)).unwrap();
        assert_relative_eq!(oriented.corners()[0], Point2::new(125.0, 97.0), epsilon = 1e-3);
        assert_relative_eq!(oriented.corners()[2], Point2::new(131.0, 103.0), epsilon = 1e-3);
    }

    #[test]
    fn overlapping_jittered_candidates_suppress_to_the_stronger_one() {
        // Two anchors one pixel apart produce nearly identical boxes.
        let mut dec = decoder(anchors(&[(0.5, 0.5), (0.5 + 1.0 / 256.0, 0.5)]));
        let out = outputs(&[upright_hand_row(), upright_hand_row()], &[1.0, HIGH]);

        let decoded = dec.decode(&out).unwrap().expect("both candidates pass");
        assert_eq!(decoded.debug.candidates.len(), 2);
        assert_eq!(decoded.debug.survivors, 1);
        // The second candidate has the higher logit.
        assert_eq!(decoded.debug.selected, 1);
        assert_eq!(decoded.debug.candidates[1].anchor_index(), 1);
    }

    #[test]
    fn distant_survivors_resolve_to_top_confidence() {
        let mut dec = decoder(anchors(&[(0.25, 0.25), (0.75, 0.75)]));
        let out = outputs(&[upright_hand_row(), upright_hand_row()], &[HIGH, 1.0]);

        let decoded = dec.decode(&out).unwrap().expect("both candidates pass");
        // Two independent regions survive; the top-1 policy keeps the first.
        assert_eq!(decoded.debug.survivors, 2);
        assert_eq!(decoded.debug.selected, 0);
    }

    #[test]
    fn coincident_wrist_and_middle_finger_is_degenerate() {
        let mut row = [0.0; NUM_BOX_PARAMS];
        row[2] = 2.0;
        row[3] = 2.0;
        // All keypoint deltas zero: the wrist and middle finger MCP coincide.
        let mut dec = decoder(anchors(&[(0.5, 0.5)]));
        let out = outputs(&[row], &[HIGH]);

        match dec.decode(&out) {
            Err(PalmError::DegenerateGeometry(_)) => {}
            other => panic!("expected degenerate geometry, got {other:?}"),
        }
    }

    #[test]
    fn anchor_count_mismatch_is_rejected() {
        let mut dec = decoder(anchors(&[(0.5, 0.5)]));
        let out = outputs(&[upright_hand_row(), upright_hand_row()], &[HIGH, HIGH]);

        match dec.decode(&out) {
            Err(PalmError::AnchorCountMismatch { table, network }) => {
                assert_eq!(table, 1);
                assert_eq!(network, 2);
            }
            other => panic!("expected anchor count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn padding_offset_is_subtracted_from_the_box() {
        let mut dec = decoder(anchors(&[(0.5, 0.5)]));
        let out = outputs(&[upright_hand_row()], &[HIGH]);
        let decoded = dec.decode(&out).unwrap().unwrap();

        let unpadded = decoded.region.to_oriented_box(1.0, (0, 0)).unwrap();
        let padded = decoded.region.to_oriented_box(1.0, (10, 4)).unwrap();
        for (a, b) in unpadded.corners().iter().zip(padded.corners()) {
            assert_relative_eq!(a.x - 10.0, b.x, epsilon = 1e-4);
            assert_relative_eq!(a.y - 4.0, b.y, epsilon = 1e-4);
        }
    }
}
