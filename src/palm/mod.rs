//! Palm detection.
//!
//! [`PalmDetector`] is the caller-facing entry point: it accepts an arbitrary-sized
//! RGB image and returns either an [`OrientedBox`] in input image coordinates or
//! "no detection". The numerical work happens in [`decoder`].

pub mod decoder;

use std::path::Path;

use image::RgbImage;
use ndarray::Array4;

use crate::{
    detection::ssd::{Anchors, LayerInfo},
    image::preprocess,
    nn::{self, OnnxPalmNetwork, PalmNetwork, INPUT_SIZE},
    rect::OrientedBox,
    timer::Timer,
};

use self::decoder::{Decoded, Decoder};

/// A keypoint of a palm detection.
///
/// The palm network regresses 7 coarse keypoints per candidate; indices match the
/// order of the regression output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// A list of all [`Keypoint`]s.
pub const ALL_KEYPOINTS: &[Keypoint] = &[
    Keypoint::Wrist,
    Keypoint::IndexFingerMcp,
    Keypoint::MiddleFingerMcp,
    Keypoint::RingFingerMcp,
    Keypoint::PinkyMcp,
    Keypoint::ThumbCmc,
    Keypoint::ThumbMcp,
];

/// SSD feature map layout of the palm detection network: 2 anchors per cell on the
/// 32×32 and 16×16 maps, 6 per cell on the 8×8 map (2944 anchors total).
///
/// Prefer the anchor CSV shipped with the model ([`Anchors::from_csv_path`]) when
/// available; it is the authoritative row order.
pub const PALM_DETECTION_LAYERS: &[LayerInfo] = &[
    LayerInfo::new(2, 32, 32),
    LayerInfo::new(2, 16, 16),
    LayerInfo::new(6, 8, 8),
];

/// Tunables of the palm decoding pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PalmConfig {
    /// Minimum sigmoid probability for an anchor to become a candidate.
    pub threshold: f32,
    /// Overlap ratio above which suppression considers two candidates duplicates.
    pub overlap_thresh: f32,
    /// Enlargement factor applied to the detected box before cropping.
    pub box_enlarge: f32,
    /// Fraction of the wrist→middle-finger vector the crop is shifted by, to
    /// recenter it on the palm.
    pub box_shift: f32,
}

impl Default for PalmConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            overlap_thresh: 0.3,
            box_enlarge: 1.5,
            box_shift: 0.2,
        }
    }
}

/// Something that maps an image to an oriented hand region, or none.
///
/// Which implementation to use is decided by explicit configuration at
/// construction time (see [`create_detector`]), not by editing call sites.
pub trait DetectPalm {
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Option<OrientedBox>>;
}

/// Selects the palm detector implementation to construct.
pub enum DetectorChoice<'a> {
    /// The BlazePalm-style neural detector, loaded from an ONNX model and its
    /// anchor table.
    Neural {
        model: &'a Path,
        anchors: &'a Path,
    },
    /// A detector that never reports a hand. Useful to run the surrounding
    /// pipeline without a model.
    Disabled,
}

/// Constructs the configured palm detector.
pub fn create_detector(
    choice: DetectorChoice<'_>,
    config: PalmConfig,
) -> anyhow::Result<Box<dyn DetectPalm>> {
    match choice {
        DetectorChoice::Neural { model, anchors } => Ok(Box::new(PalmDetector::from_files(
            model, anchors, config,
        )?)),
        DetectorChoice::Disabled => Ok(Box::new(NullDetector)),
    }
}

/// Neural-network based palm detector.
///
/// Holds the loaded inference engine and the anchor table for the lifetime of the
/// detector; each [`detect`][Self::detect] call is otherwise stateless.
pub struct PalmDetector {
    network: Box<dyn PalmNetwork>,
    decoder: Decoder,
    t_infer: Timer,
    t_decode: Timer,
}

impl PalmDetector {
    /// Creates a detector from an already-loaded inference engine and anchor table.
    pub fn new(network: Box<dyn PalmNetwork>, anchors: Anchors, config: PalmConfig) -> Self {
        Self {
            network,
            decoder: Decoder::new(anchors, config),
            t_infer: Timer::new("infer"),
            t_decode: Timer::new("decode"),
        }
    }

    /// Loads the ONNX model and anchor CSV from disk.
    ///
    /// Failures here are fatal; there is no per-frame recovery from a missing
    /// model or anchor table.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        model: P,
        anchors: Q,
        config: PalmConfig,
    ) -> anyhow::Result<Self> {
        let network = OnnxPalmNetwork::load(model)?;
        let anchors = Anchors::from_csv_path(anchors)?;
        Ok(Self::new(Box::new(network), anchors, config))
    }

    /// Runs palm detection on an input image.
    ///
    /// The image is padded to a square, normalized, and run through the network;
    /// the decoded region is mapped back into the coordinates of `image`. Returns
    /// `Ok(None)` when no anchor clears the confidence threshold.
    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Option<OrientedBox>> {
        let pre = preprocess(image);
        let Some(decoded) = self.detect_normalized(&pre.tensor)? else {
            return Ok(None);
        };

        let (width, height) = image.dimensions();
        let scale = width.max(height) as f32 / INPUT_SIZE as f32;
        let oriented = decoded.region.to_oriented_box(scale, pre.pad)?;

        log::debug!(
            "palm detected with confidence {:.2} at {:?}",
            decoded.region.confidence(),
            oriented.center(),
        );
        Ok(Some(oriented))
    }

    /// Runs detection on an already-normalized input tensor.
    ///
    /// This is the tensor-level entry point; it validates the decoding
    /// preconditions before any computation and returns the decoded region in
    /// network input coordinates, alongside its [`decoder::DebugInfo`].
    pub fn detect_normalized(&mut self, tensor: &Array4<f32>) -> anyhow::Result<Option<Decoded>> {
        nn::validate_input(tensor)?;

        let outputs = self.t_infer.time(|| self.network.infer(tensor))?;
        let decoded = self.t_decode.time(|| self.decoder.decode(&outputs))?;
        Ok(decoded)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_decode].into_iter()
    }
}

impl DetectPalm for PalmDetector {
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Option<OrientedBox>> {
        PalmDetector::detect(self, image)
    }
}

/// A palm detector that always reports "no detection".
pub struct NullDetector;

impl DetectPalm for NullDetector {
    fn detect(&mut self, _image: &RgbImage) -> anyhow::Result<Option<OrientedBox>> {
        Ok(None)
    }
}
