use crate::shared::constants::CROP_SIZE_PERCENTILE;
use crate::shared::stats::percentile;
use crate::shared::tracked_box::CoordinateSequence;
use crate::shared::video_metadata::VideoGeometry;

use super::aspect_ratio::TargetSize;

/// Box size percentiles of a run, reported for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeDistribution {
    pub p50: (f64, f64),
    pub p75: (f64, f64),
    pub p90: (f64, f64),
}

impl SizeDistribution {
    pub fn from_sequence(coords: &CoordinateSequence) -> Option<Self> {
        let widths: Vec<f64> = coords.iter().map(|b| b.w as f64).collect();
        let heights: Vec<f64> = coords.iter().map(|b| b.h as f64).collect();
        let at = |p: f64| -> Option<(f64, f64)> {
            Some((percentile(&widths, p)?, percentile(&heights, p)?))
        };
        Some(Self {
            p50: at(50.0)?,
            p75: at(75.0)?,
            p90: at(90.0)?,
        })
    }
}

/// Decides the crop size from observed boxes or a requested target.
#[derive(Clone, Copy, Debug)]
pub struct CropSizeEstimator {
    margin_factor: f64,
}

impl CropSizeEstimator {
    pub fn new(margin_factor: f64) -> Self {
        Self { margin_factor }
    }

    /// `floor(p75 * margin)` per dimension, clamped to `[1, video size]`.
    ///
    /// Returns `None` when there are no boxes.
    pub fn automatic(
        &self,
        coords: &CoordinateSequence,
        geometry: &VideoGeometry,
    ) -> Option<(u32, u32)> {
        let widths: Vec<f64> = coords.iter().map(|b| b.w as f64).collect();
        let heights: Vec<f64> = coords.iter().map(|b| b.h as f64).collect();
        let p75_w = percentile(&widths, CROP_SIZE_PERCENTILE)?;
        let p75_h = percentile(&heights, CROP_SIZE_PERCENTILE)?;

        let size = |p75: f64, limit: u32| -> u32 {
            let scaled = (p75 * self.margin_factor).floor();
            (scaled.max(1.0) as u32).clamp(1, limit.max(1))
        };
        Some((size(p75_w, geometry.width), size(p75_h, geometry.height)))
    }

    /// The requested target, scaled down once to fit the source.
    pub fn target(&self, target: TargetSize, geometry: &VideoGeometry) -> TargetSize {
        let fitted = target.fit_within(geometry.width, geometry.height);
        if fitted != target {
            log::info!(
                "Target {}x{} exceeds source {}x{}, scaled to {}x{}",
                target.width,
                target.height,
                geometry.width,
                geometry.height,
                fitted.width,
                fitted.height
            );
        }
        fitted
    }
}
