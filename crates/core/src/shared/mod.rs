pub mod constants;
pub mod crop_plan;
pub mod frame;
pub mod stats;
pub mod tracked_box;
pub mod video_metadata;
