//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
///
/// Mainly used to rank detections by confidence.
#[derive(Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        f32::total_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(&self.0, &other.0)
    }
}

/// Applies the standard sigmoid/logistic function to the input.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_stays_in_open_unit_interval() {
        for logit in [-80.0, -10.0, -0.5, 0.0, 0.5, 10.0, 80.0] {
            let p = sigmoid(logit);
            assert!(p > 0.0 && p < 1.0, "sigmoid({logit}) = {p}");
        }
        assert_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn sigmoid_is_monotonic() {
        let logits = [-4.0, -1.0, 0.0, 0.25, 1.0, 3.0];
        for pair in logits.windows(2) {
            assert!(sigmoid(pair[0]) < sigmoid(pair[1]));
        }
    }

    #[test]
    fn total_f32_orders_nan_last() {
        let mut v = [TotalF32(f32::NAN), TotalF32(1.0), TotalF32(-1.0)];
        v.sort();
        assert_eq!(v[0].0, -1.0);
        assert_eq!(v[1].0, 1.0);
        assert!(v[2].0.is_nan());
    }
}
