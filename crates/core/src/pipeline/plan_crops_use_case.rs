use std::time::Instant;

use crate::cropping::domain::aspect_ratio::AspectRatio;
use crate::cropping::domain::crop_planner::CropPlanner;
use crate::shared::crop_plan::CropTimeline;
use crate::shared::tracked_box::CoordinateSequence;
use crate::shared::video_metadata::VideoGeometry;
use crate::tracking::domain::box_series::BoxSeries;
use crate::tracking::domain::gap_interpolator::{GapInterpolator, GapReport};
use crate::tracking::domain::outlier_filter::{OutlierFilter, OutlierReport};
use crate::tracking::domain::smoother::Smoother;

use super::pipeline_config::PipelineConfig;
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;

/// Post-processed coordinates plus what each stage changed.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedCoordinates {
    pub coords: CoordinateSequence,
    pub gaps: GapReport,
    pub outliers: OutlierReport,
}

/// Raw tracking output to crop timeline: interpolate gaps, reject
/// outliers, smooth, then plan one crop per frame.
///
/// The aspect ratio is resolved once here. A malformed one falls back to
/// automatic sizing and is reported as a warning on every run.
pub struct PlanCropsUseCase {
    config: PipelineConfig,
    aspect: AspectRatio,
    aspect_warning: Option<String>,
}

impl PlanCropsUseCase {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let (aspect, aspect_warning) = match config.aspect() {
            Ok(aspect) => (aspect, None),
            Err(e) => {
                log::warn!("{e}; falling back to automatic crop size");
                (AspectRatio::Auto, Some(format!("{e}; used automatic crop size")))
            }
        };
        Ok(Self {
            config,
            aspect,
            aspect_warning,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn aspect(&self) -> AspectRatio {
        self.aspect
    }

    /// Set when the configured aspect ratio could not be parsed.
    pub fn aspect_warning(&self) -> Option<&str> {
        self.aspect_warning.as_deref()
    }

    /// Runs the coordinate stages only. Empty input stays empty.
    pub fn process(
        &self,
        raw: &CoordinateSequence,
        logger: &mut dyn PipelineLogger,
    ) -> ProcessedCoordinates {
        let started = Instant::now();
        let (dense, gaps) = GapInterpolator::new().interpolate(raw);
        logger.timing("interpolate", elapsed_ms(started));
        logger.metric("gap_frames", gaps.synthesized_frames as f64);

        let started = Instant::now();
        let series = BoxSeries::from_sequence(&dense);
        let (filtered, outliers) = OutlierFilter::new(self.config.window()).filter(&series);
        logger.timing("outliers", elapsed_ms(started));
        logger.metric("outliers_replaced", outliers.total() as f64);

        let started = Instant::now();
        let smoothed = Smoother::new(self.config.smoother()).smooth(&filtered);
        logger.timing("smooth", elapsed_ms(started));

        ProcessedCoordinates {
            coords: smoothed.to_sequence(),
            gaps,
            outliers,
        }
    }

    pub fn execute(
        &self,
        raw: &CoordinateSequence,
        geometry: &VideoGeometry,
        logger: &mut dyn PipelineLogger,
    ) -> Result<CropTimeline, PipelineError> {
        if raw.is_empty() {
            return Err(PipelineError::NoTrackedFrames);
        }
        logger.info(&format!(
            "Processing {} tracked frames with {:?}",
            raw.len(),
            self.config.smoother()
        ));

        let processed = self.process(raw, logger);
        if processed.gaps.gaps > 0 {
            logger.info(&format!(
                "Filled {} gaps ({} frames, longest {})",
                processed.gaps.gaps, processed.gaps.synthesized_frames, processed.gaps.longest_gap
            ));
        }

        let started = Instant::now();
        let planner = CropPlanner::new(self.config.margin_factor, self.config.crop_smooth_window);
        let timeline = planner.plan(
            &processed.coords,
            geometry,
            self.aspect,
            self.config.adaptive_crop,
        )?;
        logger.timing("plan", elapsed_ms(started));

        if let Some(warning) = &self.aspect_warning {
            logger.warn(warning);
        }
        let (w, h) = timeline.output_size();
        logger.info(&format!("Crop size: {w}x{h}"));
        Ok(timeline)
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
