//! End-to-end detector tests with a synthetic inference engine.

use approx::assert_relative_eq;
use image::RgbImage;
use nalgebra::Point2;
use ndarray::{Array1, Array2, Array4};
use ruka::{
    detection::ssd::{Anchor, Anchors},
    error::PalmError,
    nn::{PalmNetwork, PalmOutputs, NUM_BOX_PARAMS},
    palm::{DetectPalm, NullDetector, PalmConfig, PalmDetector},
};

/// A stand-in inference engine that replays fixed outputs.
struct SyntheticNetwork {
    rows: Vec<[f32; NUM_BOX_PARAMS]>,
    logits: Vec<f32>,
}

impl PalmNetwork for SyntheticNetwork {
    fn infer(&self, input: &Array4<f32>) -> anyhow::Result<PalmOutputs> {
        assert_eq!(input.shape(), &[1, 256, 256, 3]);
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        Ok(PalmOutputs {
            regressors: Array2::from_shape_vec((self.rows.len(), NUM_BOX_PARAMS), flat)?,
            scores: Array1::from_vec(self.logits.clone()),
        })
    }
}

fn centered_anchor_table() -> Anchors {
    [Anchor::new(0.5, 0.5)].into_iter().collect()
}

/// Box of size 2 at the anchor center, wrist below the middle finger MCP.
fn upright_hand_row() -> [f32; NUM_BOX_PARAMS] {
    let mut row = [0.0; NUM_BOX_PARAMS];
    row[2] = 2.0;
    row[3] = 2.0;
    row[5] = 20.0;
    row[9] = -20.0;
    row
}

fn detector(rows: Vec<[f32; NUM_BOX_PARAMS]>, logits: Vec<f32>) -> PalmDetector {
    PalmDetector::new(
        Box::new(SyntheticNetwork { rows, logits }),
        centered_anchor_table(),
        PalmConfig::default(),
    )
}

#[test]
fn detects_a_hand_and_maps_it_into_image_coordinates() {
    let mut detector = detector(vec![upright_hand_row()], vec![2.0]);

    // 64x48 frame: padded to a 64 square (8 pixels of bars top and bottom),
    // scale from network input back to the padded frame is 64/256.
    let frame = RgbImage::new(64, 48);
    let region = detector
        .detect(&frame)
        .unwrap()
        .expect("the synthetic candidate is above threshold");

    // The analytic corner in network input space is (125, 97); scaled by 0.25
    // and shifted up by the 8 pixel letterbox.
    assert_relative_eq!(
        region.corners()[0],
        Point2::new(31.25, 16.25),
        epsilon = 1e-3
    );
    assert_relative_eq!(
        region.corners()[2],
        Point2::new(32.75, 17.75),
        epsilon = 1e-3
    );
}

#[test]
fn low_confidence_everywhere_reports_no_detection() {
    let mut detector = detector(vec![upright_hand_row()], vec![-10.0]);
    let frame = RgbImage::new(64, 48);
    assert!(detector.detect(&frame).unwrap().is_none());
}

#[test]
fn malformed_tensor_fails_before_inference() {
    let mut detector = detector(vec![upright_hand_row()], vec![2.0]);

    let wrong_shape = Array4::<f32>::zeros((1, 64, 64, 3));
    let err = detector.detect_normalized(&wrong_shape).unwrap_err();
    match err.downcast_ref::<PalmError>() {
        Some(PalmError::TensorShape { what, .. }) => assert_eq!(*what, "input"),
        other => panic!("unexpected error: {other:?}"),
    }

    let out_of_range = Array4::<f32>::from_elem((1, 256, 256, 3), 2.0);
    let err = detector.detect_normalized(&out_of_range).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PalmError>(),
        Some(PalmError::InputOutOfRange { .. })
    ));
}

#[test]
fn degenerate_keypoints_surface_as_a_typed_error() {
    // All keypoint deltas zero: wrist and middle finger coincide.
    let mut row = [0.0; NUM_BOX_PARAMS];
    row[2] = 2.0;
    row[3] = 2.0;
    let mut detector = detector(vec![row], vec![2.0]);

    let frame = RgbImage::new(64, 64);
    let err = detector.detect(&frame).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PalmError>(),
        Some(PalmError::DegenerateGeometry(_))
    ));
}

#[test]
fn null_detector_never_finds_anything() {
    let mut detector = NullDetector;
    let frame = RgbImage::new(640, 480);
    assert!(detector.detect(&frame).unwrap().is_none());
}
