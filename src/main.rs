//! File-driven palm detection demo.
//!
//! Loads a palm detection model, its anchor table, and an input image, then prints
//! the detected oriented box and writes the rectified hand crop next to the input.

use std::path::PathBuf;

use anyhow::Context;
use ruka::{
    image::warp_crop,
    palm::{PalmConfig, PalmDetector},
};

fn main() -> anyhow::Result<()> {
    ruka::init_logger!();

    let mut args = std::env::args().skip(1);
    let (Some(model), Some(anchors), Some(input)) = (args.next(), args.next(), args.next()) else {
        anyhow::bail!("usage: ruka <model.onnx> <anchors.csv> <image> [crop-output]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&input).with_extension("crop.png"));

    let image = image::open(&input)
        .with_context(|| format!("failed to read input image {input}"))?
        .to_rgb8();

    let mut detector = PalmDetector::from_files(&model, &anchors, PalmConfig::default())?;

    match detector.detect(&image)? {
        Some(region) => {
            for (i, corner) in region.corners().iter().enumerate() {
                log::info!("corner {i}: ({:.1}, {:.1})", corner.x, corner.y);
            }

            let crop = warp_crop(&image, &region, 256)?;
            crop.save(&output)
                .with_context(|| format!("failed to save {}", output.display()))?;
            log::info!("wrote rectified crop to {}", output.display());
        }
        None => log::info!("no hand found in {input}"),
    }

    for timer in detector.timers() {
        log::debug!("{timer}");
    }

    Ok(())
}
