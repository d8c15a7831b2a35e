/// Size multiplier applied around the subject.
pub const DEFAULT_MARGIN_FACTOR: f64 = 1.5;

pub const DEFAULT_ROLLING_WINDOW: usize = 15;
pub const DEFAULT_EMA_WINDOW: usize = 45;

/// EMA window for the adaptive crop size, independent of coordinate smoothing.
pub const DEFAULT_CROP_SMOOTH_WINDOW: usize = 30;

/// Absolute distance from the window median beyond which a position is an outlier.
pub const POSITION_OUTLIER_THRESHOLD_PX: f64 = 200.0;

/// A size above `p75 * factor` of its window is an outlier.
pub const SIZE_OUTLIER_PERCENTILE: f64 = 75.0;
pub const SIZE_OUTLIER_FACTOR: f64 = 1.5;

/// Upper bound on outlier passes before the filter gives up on a fixed point.
pub const MAX_OUTLIER_PASSES: usize = 100;

/// Percentile of observed box sizes used for automatic crop sizing.
pub const CROP_SIZE_PERCENTILE: f64 = 75.0;

/// Custom ratios are anchored to roughly 1080p output.
pub const CUSTOM_PORTRAIT_HEIGHT: u32 = 1350;
pub const CUSTOM_LANDSCAPE_WIDTH: u32 = 1920;

/// Frame-to-frame deltas that count as a tracking jump.
pub const JUMP_POSITION_THRESHOLD_PX: i32 = 100;
pub const JUMP_SIZE_THRESHOLD_PX: i32 = 200;

/// Box areas averaged when checking for a sudden size change.
pub const SIZE_HISTORY_FRAMES: usize = 30;
/// Area relative to the first box below which the box is too small.
pub const TOO_SMALL_AREA_RATIO: f64 = 0.3;
pub const SHRINKING_AREA_RATIO: f64 = 0.5;
/// Relative deviation from the recent average area.
pub const SUDDEN_SIZE_CHANGE: f64 = 0.2;
/// Width spread over median width above which tracking looks unstable.
pub const SIZE_VARIATION_WARNING: f64 = 0.5;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "m4v"];
