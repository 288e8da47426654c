//! Error conditions produced by the palm decoding pipeline.

/// Errors produced while decoding palm detection network outputs.
///
/// "No detection" is *not* an error; the decoder reports it as `Ok(None)`.
#[derive(thiserror::Error, Debug)]
pub enum PalmError {
    /// A tensor did not have the shape required by the decoding contract.
    #[error("{what} tensor has shape {got:?}, expected {expected}")]
    TensorShape {
        what: &'static str,
        got: Vec<usize>,
        expected: &'static str,
    },

    /// The normalized input image contained values outside of `[-1, 1]`.
    #[error("input tensor values must lie in [-1, 1], found range {min}..{max}")]
    InputOutOfRange { min: f32, max: f32 },

    /// The anchor table does not match the network's per-anchor output rows.
    #[error("anchor table has {table} rows, network produced {network} anchor outputs")]
    AnchorCountMismatch { table: usize, network: usize },

    /// A row of the anchor table could not be parsed.
    #[error("anchor table line {line}: {msg}")]
    AnchorTable { line: usize, msg: String },

    /// The detection geometry collapsed (zero-length wrist baseline or a singular
    /// affine matrix) and no oriented box can be recovered from it.
    #[error("degenerate detection geometry: {0}")]
    DegenerateGeometry(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
