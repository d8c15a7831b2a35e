use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cropping::domain::aspect_ratio::{AspectRatio, AspectRatioError};
use crate::shared::constants::{
    DEFAULT_CROP_SMOOTH_WINDOW, DEFAULT_EMA_WINDOW, DEFAULT_MARGIN_FACTOR, DEFAULT_ROLLING_WINDOW,
};
use crate::tracking::domain::smoother::{SizePolicy, SmoothingStrategy};

use super::pipeline_error::PipelineError;

/// Which smoother family to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKind {
    Rolling,
    #[default]
    Ema,
}

/// Tunables for one reframing run. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Crop size relative to the subject box.
    pub margin_factor: f64,
    /// Window for outlier filtering and smoothing. Unset means 15 for
    /// rolling and 45 for EMA.
    pub smooth_window: Option<usize>,
    /// EMA window for the adaptive crop size.
    pub crop_smooth_window: usize,
    /// `auto`, a preset name, or `W:H`.
    pub aspect_ratio: String,
    pub adaptive_crop: bool,
    pub smoothing_strategy: SmoothingKind,
    /// Only used by the rolling smoother.
    pub size_policy: SizePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            margin_factor: DEFAULT_MARGIN_FACTOR,
            smooth_window: None,
            crop_smooth_window: DEFAULT_CROP_SMOOTH_WINDOW,
            aspect_ratio: AspectRatio::Auto.to_string(),
            adaptive_crop: false,
            smoothing_strategy: SmoothingKind::default(),
            size_policy: SizePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Rejects values no stage can run with. A malformed aspect ratio is
    /// not rejected here; see [`PipelineConfig::aspect`].
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.margin_factor.is_finite() && self.margin_factor > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "margin_factor must be positive, got {}",
                self.margin_factor
            )));
        }
        if self.smooth_window == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "smooth_window must be at least 1".into(),
            ));
        }
        if self.crop_smooth_window == 0 {
            return Err(PipelineError::InvalidConfig(
                "crop_smooth_window must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parsed `aspect_ratio`. Callers fall back to [`AspectRatio::Auto`]
    /// on error.
    pub fn aspect(&self) -> Result<AspectRatio, AspectRatioError> {
        self.aspect_ratio.parse()
    }

    /// Effective window for outlier filtering and smoothing.
    pub fn window(&self) -> usize {
        self.smooth_window.unwrap_or(match self.smoothing_strategy {
            SmoothingKind::Rolling => DEFAULT_ROLLING_WINDOW,
            SmoothingKind::Ema => DEFAULT_EMA_WINDOW,
        })
    }

    pub fn smoother(&self) -> SmoothingStrategy {
        let window = self.window();
        match self.smoothing_strategy {
            SmoothingKind::Rolling => SmoothingStrategy::Rolling {
                window,
                size_policy: self.size_policy,
            },
            SmoothingKind::Ema => SmoothingStrategy::Ema { window },
        }
    }
}
