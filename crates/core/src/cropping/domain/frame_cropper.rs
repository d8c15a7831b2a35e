use crate::shared::crop_plan::CropPlan;
use crate::shared::frame::Frame;

/// Domain interface for cutting one crop out of a decoded frame.
///
/// The returned frame is always `output_size`, keeps the source frame
/// index, and never distorts the aspect ratio beyond what the plan asks for.
pub trait FrameCropper: Send {
    fn crop(
        &self,
        frame: &Frame,
        plan: &CropPlan,
        output_size: (u32, u32),
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
