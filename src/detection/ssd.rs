//! Anchor/prior tables for Single Shot MultiBox Detectors (SSDs).
//!
//! The network's regression output is relative to a fixed table of anchor points.
//! The table is either loaded from a CSV file shipped alongside the model (the
//! authoritative source, since row order must match the network's output order), or
//! generated from the SSD feature map layout with [`Anchors::calculate`].

use std::{fs::File, io::BufRead, io::BufReader, ops::Index, path::Path};

use itertools::Itertools;

use crate::error::PalmError;

/// An anchor of an SSD network.
///
/// Coordinates are fractions of the network input size, ranging from 0 to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn new(x_center: f32, y_center: f32) -> Self {
        Self { x_center, y_center }
    }

    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map width of this layer, in cells.
    width: u32,
    /// Feature map height of this layer, in cells.
    height: u32,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            width,
            height,
        }
    }
}

/// Parameters for SSD anchor generation.
pub struct AnchorParams<'a> {
    /// List of output layers, ordered like the network's output rows.
    pub layers: &'a [LayerInfo],
}

/// The full, immutable anchor table of a network.
///
/// Anchor row *i* corresponds to network output row *i*; this coupling is a hard
/// external contract, so the table is loaded (or generated) once and never changes
/// for the lifetime of the detector.
#[derive(Debug)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    /// Computes the anchor positions for a network from its feature map layout.
    pub fn calculate(params: &AnchorParams<'_>) -> Self {
        let mut anchors = Vec::new();

        for layer in params.layers {
            for y in 0..layer.height {
                for x in 0..layer.width {
                    for _ in 0..layer.boxes_per_cell {
                        let x_center = (x as f32 + 0.5) / layer.width as f32;
                        let y_center = (y as f32 + 0.5) / layer.height as f32;

                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Loads an anchor table from a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, PalmError> {
        Self::from_csv(BufReader::new(File::open(path)?))
    }

    /// Reads a row-per-anchor table of numeric values.
    ///
    /// The first two columns of each row are the anchor center's x and y fraction;
    /// remaining columns (some exports carry fixed anchor sizes there) are ignored.
    pub fn from_csv<R: BufRead>(reader: R) -> Result<Self, PalmError> {
        let mut anchors = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let row = line.trim();
            if row.is_empty() {
                continue;
            }

            let (x, y) = row
                .split(',')
                .map(str::trim)
                .take(2)
                .collect_tuple()
                .ok_or_else(|| PalmError::AnchorTable {
                    line: index + 1,
                    msg: format!("expected at least 2 columns, got {row:?}"),
                })?;

            let parse = |field: &str| {
                field.parse::<f32>().map_err(|e| PalmError::AnchorTable {
                    line: index + 1,
                    msg: format!("bad numeric field {field:?}: {e}"),
                })
            };
            anchors.push(Anchor {
                x_center: parse(x)?,
                y_center: parse(y)?,
            });
        }

        Ok(Self { anchors })
    }

    /// Returns the total number of SSD anchors/priors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Anchor> {
        self.anchors.iter()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

impl FromIterator<Anchor> for Anchors {
    fn from_iter<I: IntoIterator<Item = Anchor>>(iter: I) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palm::PALM_DETECTION_LAYERS;

    #[test]
    fn palm_layer_layout_yields_full_anchor_table() {
        let anchors = Anchors::calculate(&AnchorParams {
            layers: PALM_DETECTION_LAYERS,
        });
        // 2 per cell on the 32x32 and 16x16 maps, 6 per cell on the 8x8 map.
        assert_eq!(anchors.anchor_count(), 2944);
        assert_eq!(anchors[0], Anchor::new(0.5 / 32.0, 0.5 / 32.0));
    }

    #[test]
    fn csv_rows_parse_into_anchors() {
        let csv = "0.5,0.25,1.0,1.0\n0.75, 0.75\n\n";
        let anchors = Anchors::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(anchors.anchor_count(), 2);
        assert_eq!(anchors[0], Anchor::new(0.5, 0.25));
        assert_eq!(anchors[1], Anchor::new(0.75, 0.75));
    }

    #[test]
    fn malformed_csv_reports_line_number() {
        let err = Anchors::from_csv("0.5,0.5\nnope\n".as_bytes()).unwrap_err();
        match err {
            PalmError::AnchorTable { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
