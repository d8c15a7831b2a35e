use image::imageops::FilterType;

use crate::cropping::domain::frame_cropper::FrameCropper;
use crate::shared::crop_plan::CropPlan;
use crate::shared::frame::Frame;

/// CPU cropper: copies the planned rectangle out of the frame and resamples
/// it to the output size when the two differ.
pub struct CpuFrameCropper {
    filter: FilterType,
}

impl CpuFrameCropper {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for CpuFrameCropper {
    fn default() -> Self {
        Self::new(FilterType::Triangle)
    }
}

impl FrameCropper for CpuFrameCropper {
    fn crop(
        &self,
        frame: &Frame,
        plan: &CropPlan,
        output_size: (u32, u32),
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("Expected RGB frame, got {} channels", frame.channels()).into());
        }

        let view = frame.region(plan.crop_x, plan.crop_y, plan.crop_w, plan.crop_h);
        let (rh, rw, _) = view.dim();
        if rw == 0 || rh == 0 {
            return Err(format!(
                "Crop {}x{} at ({}, {}) is outside the {}x{} frame",
                plan.crop_w,
                plan.crop_h,
                plan.crop_x,
                plan.crop_y,
                frame.width(),
                frame.height()
            )
            .into());
        }

        // Iteration is in logical (row, col, channel) order, so this packs
        // the strided view into a contiguous RGB buffer.
        let data: Vec<u8> = view.iter().copied().collect();
        let (out_w, out_h) = output_size;
        if (rw as u32, rh as u32) == (out_w, out_h) {
            return Ok(Frame::new(data, out_w, out_h, 3, frame.index()));
        }

        let img = image::RgbImage::from_raw(rw as u32, rh as u32, data)
            .ok_or("Failed to create image from crop data")?;
        let resized = image::imageops::resize(&img, out_w, out_h, self.filter);
        Ok(Frame::from_rgb_image(resized, frame.index()))
    }
}
