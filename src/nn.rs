//! Neural network inference.
//!
//! The palm detection model is consumed as a black box: given a normalized
//! 256×256×3 image tensor it returns one 18-value regression row and one
//! confidence logit per anchor. [`PalmNetwork`] is that boundary; [`OnnxPalmNetwork`]
//! implements it with [tract], and the test suite substitutes synthetic
//! implementations.
//!
//! [tract]: https://github.com/sonos/tract

use std::path::Path;

use ndarray::{Array1, Array2, Array4};
use tract_onnx::prelude::*;

use crate::error::PalmError;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Width and height of the network input, in pixels.
pub const INPUT_SIZE: usize = 256;

/// Values per anchor in the regression output: 4 box geometry values (x/y offset,
/// width, height) followed by 7 keypoint x/y deltas.
pub const NUM_BOX_PARAMS: usize = 18;

/// Raw per-anchor outputs of one palm detection inference pass.
#[derive(Debug)]
pub struct PalmOutputs {
    /// Shape `[num_anchors, 18]`.
    pub regressors: Array2<f32>,
    /// One confidence logit per anchor.
    pub scores: Array1<f32>,
}

/// The inference engine boundary: anything that maps a normalized input image
/// tensor to raw palm detection outputs.
pub trait PalmNetwork: Send {
    /// Runs a forward pass on a `[1, 256, 256, 3]` tensor with values in `[-1, 1]`.
    fn infer(&self, input: &Array4<f32>) -> anyhow::Result<PalmOutputs>;
}

/// Checks the decoding preconditions on a network input tensor.
///
/// Downstream indexing assumes the fixed `[1, 256, 256, 3]` shape and a value range
/// of `[-1, 1]`, so violations fail fast before any computation. NaNs are rejected
/// by the range check.
pub fn validate_input(input: &Array4<f32>) -> Result<(), PalmError> {
    if input.shape() != [1, INPUT_SIZE, INPUT_SIZE, 3] {
        return Err(PalmError::TensorShape {
            what: "input",
            got: input.shape().to_vec(),
            expected: "[1, 256, 256, 3]",
        });
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut ok = true;
    for &v in input.iter() {
        ok &= v >= -1.0 && v <= 1.0;
        min = min.min(v);
        max = max.max(v);
    }
    if !ok {
        return Err(PalmError::InputOutOfRange { min, max });
    }

    Ok(())
}

/// A neural network loaded for CPU inference via tract.
pub struct NeuralNetwork {
    plan: Model,
}

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension. Model loading failures are fatal at
    /// startup; there is no per-frame recovery from a missing or malformed model.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!("neural network file must have `.onnx` extension"),
        }

        let model_data = std::fs::read(path)?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self { plan })
    }

    /// Returns the number of output nodes of the network.
    pub fn num_outputs(&self) -> usize {
        self.plan.model().outputs.len()
    }

    /// Runs the network on a single input tensor, returning the raw output tensors.
    pub fn estimate(&self, input: &Array4<f32>) -> anyhow::Result<TVec<TValue>> {
        let data = input
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("input tensor is not contiguous"))?;
        let tensor = Tensor::from_shape(input.shape(), data)?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        Ok(outputs)
    }
}

/// [`PalmNetwork`] backed by an ONNX palm detection model.
///
/// The output tensor indexing contract is fixed at load time: output 0 holds the
/// `[1, num_anchors, 18]` regressors, output 1 the `[1, num_anchors, 1]` (or
/// `[1, num_anchors]`) confidence logits.
pub struct OnnxPalmNetwork {
    nn: NeuralNetwork,
}

impl OnnxPalmNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path)?;
        anyhow::ensure!(
            nn.num_outputs() == 2,
            "palm detection model must have 2 outputs (regressors, scores), found {}",
            nn.num_outputs(),
        );
        Ok(Self { nn })
    }
}

impl PalmNetwork for OnnxPalmNetwork {
    fn infer(&self, input: &Array4<f32>) -> anyhow::Result<PalmOutputs> {
        let outputs = self.nn.estimate(input)?;
        log::trace!("inference result: {:?}", outputs);

        let reg = outputs[0].to_array_view::<f32>()?;
        let num_anchors = match reg.shape() {
            &[1, n, NUM_BOX_PARAMS] => n,
            shape => anyhow::bail!(
                "regression output has shape {shape:?}, expected [1, num_anchors, 18]"
            ),
        };
        let regressors =
            Array2::from_shape_vec((num_anchors, NUM_BOX_PARAMS), reg.iter().copied().collect())?;

        let clf = outputs[1].to_array_view::<f32>()?;
        let scores = match clf.shape() {
            &[1, n] | &[1, n, 1] if n == num_anchors => Array1::from_iter(clf.iter().copied()),
            shape => anyhow::bail!(
                "confidence output has shape {shape:?}, expected [1, {num_anchors}, 1]"
            ),
        };

        Ok(PalmOutputs { regressors, scores })
    }
}
