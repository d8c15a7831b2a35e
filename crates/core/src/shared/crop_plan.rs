use serde::{Deserialize, Serialize};

/// Crop rectangle for one output frame, in source pixels.
///
/// Always lies inside the source frame: `crop_x + crop_w <= width` and
/// `crop_y + crop_h <= height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPlan {
    pub frame: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_w: u32,
    pub crop_h: u32,
}

impl CropPlan {
    /// Same rectangle, re-stamped for another frame.
    pub fn for_frame(&self, frame: u32) -> CropPlan {
        CropPlan { frame, ..*self }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.crop_w > 0
            && self.crop_h > 0
            && self.crop_x + self.crop_w <= width
            && self.crop_y + self.crop_h <= height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.crop_w as f64 / self.crop_h as f64
    }
}

/// How the output size was decided for a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SizingMode {
    /// Size derived from the observed box distribution.
    Automatic,
    /// Constant crop at a requested aspect ratio.
    Fixed { ratio: f64 },
    /// Per-frame crop at a requested aspect ratio, resized on output.
    Adaptive { ratio: f64 },
}

/// Per-frame crop plans for a whole export run.
///
/// Holds one plan per frame starting at frame 0. Frames past the end reuse
/// the last plan.
#[derive(Clone, Debug, PartialEq)]
pub struct CropTimeline {
    plans: Vec<CropPlan>,
    output_width: u32,
    output_height: u32,
    mode: SizingMode,
}

impl CropTimeline {
    pub fn new(
        plans: Vec<CropPlan>,
        output_width: u32,
        output_height: u32,
        mode: SizingMode,
    ) -> Self {
        debug_assert!(!plans.is_empty(), "a timeline needs at least one plan");
        Self {
            plans,
            output_width,
            output_height,
            mode,
        }
    }

    pub fn plans(&self) -> &[CropPlan] {
        &self.plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Plan for `frame`, falling back to the last known plan. `None` only
    /// for an empty timeline; there is no full-frame default.
    pub fn plan_for(&self, frame: u32) -> Option<CropPlan> {
        match self.plans.get(frame as usize) {
            Some(plan) => Some(*plan),
            None => self.plans.last().map(|p| p.for_frame(frame)),
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }

    pub fn mode(&self) -> SizingMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plan(frame: u32, x: u32) -> CropPlan {
        CropPlan {
            frame,
            crop_x: x,
            crop_y: 0,
            crop_w: 80,
            crop_h: 100,
        }
    }

    #[test]
    fn test_fits_within() {
        assert!(plan(0, 20).fits_within(100, 100));
        assert!(!plan(0, 21).fits_within(100, 100));
    }

    #[test]
    fn test_aspect_ratio() {
        assert_relative_eq!(plan(0, 0).aspect_ratio(), 0.8);
    }

    #[test]
    fn test_plan_for_past_end_reuses_last() {
        let timeline = CropTimeline::new(
            vec![plan(0, 1), plan(1, 2)],
            80,
            100,
            SizingMode::Automatic,
        );
        assert_eq!(timeline.plan_for(1), Some(plan(1, 2)));
        assert_eq!(timeline.plan_for(7), Some(plan(7, 2)));
    }

    #[test]
    fn test_plan_for_empty_timeline_is_none() {
        let timeline = CropTimeline {
            plans: Vec::new(),
            output_width: 80,
            output_height: 100,
            mode: SizingMode::Automatic,
        };
        assert!(timeline.is_empty());
        assert_eq!(timeline.plan_for(0), None);
    }

    #[test]
    fn test_for_frame_keeps_rectangle() {
        let p = plan(3, 5).for_frame(9);
        assert_eq!(p.frame, 9);
        assert_eq!(p.crop_x, 5);
    }
}
