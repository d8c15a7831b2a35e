pub mod export_crop_use_case;
pub mod pipeline_config;
pub mod pipeline_error;
pub mod pipeline_logger;
pub mod plan_crops_use_case;
