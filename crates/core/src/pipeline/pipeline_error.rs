use thiserror::Error;

use crate::cropping::domain::crop_planner::CropPlanError;

/// Failures surfaced by the crop pipeline use cases.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no tracked frames: the coordinate sequence is empty")]
    NoTrackedFrames,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("export cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("coordinate file: {0}")]
    Csv(#[from] csv::Error),
    #[error("config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("video: {0}")]
    Video(String),
}

impl PipelineError {
    /// Wraps an error from a video or cropper port.
    pub fn video(e: Box<dyn std::error::Error>) -> Self {
        Self::Video(e.to_string())
    }
}

impl From<CropPlanError> for PipelineError {
    fn from(e: CropPlanError) -> Self {
        match e {
            CropPlanError::NoTrackedFrames => Self::NoTrackedFrames,
            e @ CropPlanError::EmptyVideo { .. } => Self::Video(e.to_string()),
        }
    }
}
