pub mod cropping;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod video;
