//! Image preprocessing for the palm detection network.
//!
//! The network takes a square 256×256 input, so arbitrary-aspect frames are first
//! zero-padded to a centered square, then resized and normalized to `[-1, 1]`.
//! The padding offset is kept around so decoded coordinates can be mapped back
//! into the original frame.

use image::{imageops, imageops::FilterType, RgbImage};
use nalgebra::Point2;
use ndarray::Array4;

use crate::{
    affine,
    error::PalmError,
    nn::INPUT_SIZE,
    rect::OrientedBox,
};

/// The preprocessed form of one input frame.
pub struct Preprocessed {
    /// The frame zero-padded to a square.
    pub padded: RgbImage,
    /// Normalized `[1, 256, 256, 3]` network input built from `padded`.
    pub tensor: Array4<f32>,
    /// Padding added on the left and top edge, in original image pixels.
    pub pad: (u32, u32),
}

/// Pads an image to a centered square and produces the normalized input tensor.
pub fn preprocess(image: &RgbImage) -> Preprocessed {
    let (padded, pad) = pad_to_square(image);
    let tensor = to_network_input(&padded);
    Preprocessed {
        padded,
        tensor,
        pad,
    }
}

/// Fits an image into a square by adding equal black bars on the short sides.
///
/// Returns the square image and the `(left, top)` padding offset.
pub fn pad_to_square(image: &RgbImage) -> (RgbImage, (u32, u32)) {
    let (width, height) = image.dimensions();
    let side = width.max(height);
    let pad_x = (side - width) / 2;
    let pad_y = (side - height) / 2;

    let mut square = RgbImage::new(side, side);
    imageops::replace(&mut square, image, i64::from(pad_x), i64::from(pad_y));
    (square, (pad_x, pad_y))
}

/// Resizes a square image to the network input size and maps sRGB bytes to
/// `[-1, 1]`, NHWC.
pub fn to_network_input(square: &RgbImage) -> Array4<f32> {
    let size = INPUT_SIZE as u32;
    let resized = if square.dimensions() == (size, size) {
        square.clone()
    } else {
        imageops::resize(square, size, size, FilterType::Triangle)
    };

    Array4::from_shape_fn((1, INPUT_SIZE, INPUT_SIZE, 3), |(_, y, x, c)| {
        map_color(resized.get_pixel(x as u32, y as u32).0[c])
    })
}

fn map_color(value: u8) -> f32 {
    // Output range: -1.0 ... 1.0
    (value as f32 / 255.0 - 0.5) * 2.0
}

/// Rectifies the detected hand region into an axis-aligned square crop.
///
/// Solves the affine transform sending the box's first three corners onto the crop
/// corners and samples the source image through its inverse (nearest neighbor).
/// Samples that fall outside the source stay black.
pub fn warp_crop(image: &RgbImage, region: &OrientedBox, size: u32) -> Result<RgbImage, PalmError> {
    let corners = region.corners();
    let extent = (size - 1) as f32;
    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(extent, 0.0),
        Point2::new(extent, extent),
    ];
    let m = affine::from_triangles(&[corners[0], corners[1], corners[2]], &dst)?;
    let m_inv = affine::invert(&m)?;

    let (src_w, src_h) = image.dimensions();
    let mut crop = RgbImage::new(size, size);
    for y in 0..size {
        for x in 0..size {
            let src = affine::apply(&m_inv, Point2::new(x as f32, y as f32));
            let sx = src.x.round();
            let sy = src.y.round();
            if sx >= 0.0 && sy >= 0.0 && (sx as u32) < src_w && (sy as u32) < src_h {
                crop.put_pixel(x, y, *image.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    Ok(crop)
}
