pub mod aspect_ratio;
pub mod crop_planner;
pub mod crop_size_estimator;
pub mod frame_cropper;
