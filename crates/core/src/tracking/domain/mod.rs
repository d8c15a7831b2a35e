pub mod box_series;
pub mod gap_interpolator;
pub mod outlier_filter;
pub mod smoother;
pub mod subject_merger;
pub mod tracking_report;
