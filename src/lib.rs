//! Ruka palm perception library.
//!
//! Ruka wraps a pretrained palm detection network and turns its raw per-anchor
//! outputs into a single oriented hand bounding box in source image coordinates.
//! The network itself is an opaque ONNX artifact run through [tract]; everything
//! around it (anchor decoding, non-maximum suppression, affine recovery of the
//! oriented box) lives in this crate.
//!
//! The usual flow is:
//!
//! 1. [`image::preprocess`] pads a frame to a square and produces the normalized
//!    network input tensor.
//! 2. A [`nn::PalmNetwork`] implementation runs inference and returns the raw
//!    regression and confidence tensors.
//! 3. [`palm::decoder::Decoder`] decodes those into an oriented region, or "no
//!    detection".
//! 4. The caller maps the region back into original image coordinates and crops
//!    it (see [`image::warp_crop`]).
//!
//! [`palm::PalmDetector`] bundles steps 1–4 behind a single call.
//!
//! [tract]: https://github.com/sonos/tract

use log::LevelFilter;

pub mod affine;
pub mod detection;
pub mod error;
pub mod image;
pub mod iter;
pub mod nn;
pub mod num;
pub mod palm;
pub mod rect;
pub mod timer;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .filter(Some("tract_hir"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and Ruka will log at *debug* level, tract will log at *warn*
/// level. `RUST_LOG` overrides all of this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
