use thiserror::Error;

use crate::shared::crop_plan::{CropPlan, CropTimeline, SizingMode};
use crate::shared::stats::ema;
use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};
use crate::shared::video_metadata::VideoGeometry;

use super::aspect_ratio::{AspectRatio, TargetSize};
use super::crop_size_estimator::{CropSizeEstimator, SizeDistribution};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CropPlanError {
    #[error("no tracked frames to plan crops from")]
    NoTrackedFrames,
    #[error("cannot crop a {width}x{height} video")]
    EmptyVideo { width: u32, height: u32 },
}

/// Turns smoothed subject boxes into one crop rectangle per source frame.
///
/// Three sizing modes:
/// - automatic: constant size from the box distribution.
/// - fixed: constant size from a target aspect ratio.
/// - adaptive: per-frame size that keeps the target ratio but grows with
///   the subject, EMA-smoothed so zoom changes stay gradual. Every crop is
///   resized to the target size on output.
///
/// Frames without a box reuse the previous plan; frames before the first
/// box reuse the first plan.
#[derive(Clone, Copy, Debug)]
pub struct CropPlanner {
    margin_factor: f64,
    crop_smooth_window: usize,
}

impl CropPlanner {
    pub fn new(margin_factor: f64, crop_smooth_window: usize) -> Self {
        Self {
            margin_factor,
            crop_smooth_window: crop_smooth_window.max(1),
        }
    }

    /// Plans crops for `geometry.total_frames` frames, or up to the last
    /// tracked frame when the frame count is unknown.
    pub fn plan(
        &self,
        coords: &CoordinateSequence,
        geometry: &VideoGeometry,
        aspect: AspectRatio,
        adaptive: bool,
    ) -> Result<CropTimeline, CropPlanError> {
        let last = coords.last().ok_or(CropPlanError::NoTrackedFrames)?;
        if geometry.width == 0 || geometry.height == 0 {
            return Err(CropPlanError::EmptyVideo {
                width: geometry.width,
                height: geometry.height,
            });
        }

        if let Some(dist) = SizeDistribution::from_sequence(coords) {
            log::info!(
                "Box size percentiles: p50 {:.0}x{:.0}, p75 {:.0}x{:.0}, p90 {:.0}x{:.0}",
                dist.p50.0,
                dist.p50.1,
                dist.p75.0,
                dist.p75.1,
                dist.p90.0,
                dist.p90.1
            );
        }

        let estimator = CropSizeEstimator::new(self.margin_factor);
        let (tracked, output, mode) = match aspect.target() {
            None => {
                if adaptive {
                    log::debug!("Adaptive crop needs a target aspect ratio; using automatic size");
                }
                let (w, h) = estimator
                    .automatic(coords, geometry)
                    .ok_or(CropPlanError::NoTrackedFrames)?;
                let plans = coords.iter().map(|b| place(b, w, h, geometry)).collect();
                (plans, (w, h), SizingMode::Automatic)
            }
            Some(target) => {
                let target = estimator.target(target, geometry);
                let output = (target.width, target.height);
                if adaptive {
                    let plans = self.adaptive_plans(coords, &target, geometry);
                    (plans, output, SizingMode::Adaptive { ratio: target.ratio })
                } else {
                    let plans = coords
                        .iter()
                        .map(|b| place(b, target.width, target.height, geometry))
                        .collect();
                    (plans, output, SizingMode::Fixed { ratio: target.ratio })
                }
            }
        };

        log::info!(
            "Crop output {}x{} ({mode:?}, aspect {aspect})",
            output.0,
            output.1
        );

        let frame_count = if geometry.total_frames > 0 {
            geometry.total_frames
        } else {
            last.frame as usize + 1
        };
        let plans = fill_timeline(&tracked, frame_count);
        Ok(CropTimeline::new(plans, output.0, output.1, mode))
    }

    fn adaptive_plans(
        &self,
        coords: &CoordinateSequence,
        target: &TargetSize,
        geometry: &VideoGeometry,
    ) -> Vec<CropPlan> {
        let raw_widths: Vec<f64> = coords
            .iter()
            .map(|b| self.required_size(b, target, geometry).0)
            .collect();
        let smoothed = ema(&raw_widths, self.crop_smooth_window);

        // Height follows from the smoothed width so the ratio stays exact.
        coords
            .iter()
            .zip(smoothed)
            .map(|(b, w)| {
                let (w, h) = fit_ratio(w, target.ratio, geometry);
                place(b, w, h, geometry)
            })
            .collect()
    }

    /// Smallest crop at `target.ratio` that holds the box plus margin and is
    /// at least the target size, limited to the video.
    fn required_size(
        &self,
        b: &TrackedBox,
        target: &TargetSize,
        geometry: &VideoGeometry,
    ) -> (f64, f64) {
        let ratio = target.ratio;
        let (vw, vh) = (geometry.width as f64, geometry.height as f64);
        let req_w = (b.w as f64 * self.margin_factor)
            .floor()
            .max(target.width as f64);
        let req_h = (b.h as f64 * self.margin_factor)
            .floor()
            .max(target.height as f64);

        let (mut w, mut h) = if req_w / req_h > ratio {
            (req_w, (req_w / ratio).floor())
        } else {
            ((req_h * ratio).floor(), req_h)
        };
        if w > vw {
            w = vw;
            h = (w / ratio).floor();
        }
        if h > vh {
            h = vh;
            w = (h * ratio).floor();
        }
        (w.min(vw), h.min(vh))
    }
}

/// Integer crop size at `ratio` from a smoothed width, inside the video.
fn fit_ratio(width: f64, ratio: f64, geometry: &VideoGeometry) -> (u32, u32) {
    let mut w = (width.round() as u32).clamp(1, geometry.width);
    let mut h = ((w as f64 / ratio).round() as u32).max(1);
    if h > geometry.height {
        h = geometry.height;
        w = ((h as f64 * ratio).round() as u32).clamp(1, geometry.width);
    }
    (w, h)
}

/// Centers a `w x h` crop on the box, shifted (never shrunk) into the video.
fn place(b: &TrackedBox, w: u32, h: u32, geometry: &VideoGeometry) -> CropPlan {
    let w = w.clamp(1, geometry.width);
    let h = h.clamp(1, geometry.height);
    let (cx, cy) = b.center();
    let max_x = (geometry.width - w) as i64;
    let max_y = (geometry.height - h) as i64;
    CropPlan {
        frame: b.frame,
        crop_x: (cx as i64 - (w / 2) as i64).clamp(0, max_x) as u32,
        crop_y: (cy as i64 - (h / 2) as i64).clamp(0, max_y) as u32,
        crop_w: w,
        crop_h: h,
    }
}

/// One plan per frame in `0..frame_count`, carrying the last known plan
/// forward and the first plan backward.
fn fill_timeline(tracked: &[CropPlan], frame_count: usize) -> Vec<CropPlan> {
    let Some(&first) = tracked.first() else {
        return Vec::new();
    };
    let mut plans = Vec::with_capacity(frame_count);
    let mut current = first;
    let mut next = 0;
    for frame in 0..frame_count as u32 {
        while next < tracked.len() && tracked[next].frame <= frame {
            current = tracked[next];
            next += 1;
        }
        plans.push(current.for_frame(frame));
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn geometry(width: u32, height: u32, total_frames: usize) -> VideoGeometry {
        VideoGeometry::new(width, height, 30.0, total_frames)
    }

    fn coords(boxes: &[(u32, i32, i32, i32, i32)]) -> CoordinateSequence {
        CoordinateSequence::from_unordered(
            boxes
                .iter()
                .map(|&(f, x, y, w, h)| TrackedBox::new(f, x, y, w, h))
                .collect(),
        )
    }

    fn planner() -> CropPlanner {
        CropPlanner::new(1.5, 30)
    }

    fn aspect(name: &str) -> AspectRatio {
        name.parse().unwrap()
    }

    #[test]
    fn test_no_boxes_is_error() {
        let result = planner().plan(
            &CoordinateSequence::new(),
            &geometry(100, 100, 10),
            aspect("auto"),
            false,
        );
        assert_eq!(result, Err(CropPlanError::NoTrackedFrames));
    }

    #[test]
    fn test_automatic_single_box_centered() {
        let c = coords(&[(0, 400, 300, 100, 200)]);
        let timeline = planner().plan(&c, &geometry(1920, 1080, 1), aspect("auto"), false).unwrap();
        assert_eq!(timeline.output_size(), (150, 300));
        assert_eq!(timeline.mode(), SizingMode::Automatic);
        let plan = timeline.plan_for(0).unwrap();
        // center (450, 400)
        assert_eq!((plan.crop_x, plan.crop_y), (375, 250));
    }

    #[test]
    fn test_crop_shifted_into_bounds_at_corner() {
        let c = coords(&[(0, 0, 0, 100, 100), (1, 1880, 1040, 40, 40)]);
        let timeline = planner().plan(&c, &geometry(1920, 1080, 2), aspect("1:1"), false).unwrap();
        let first = timeline.plan_for(0).unwrap();
        let second = timeline.plan_for(1).unwrap();
        assert_eq!((first.crop_x, first.crop_y), (0, 0));
        assert_eq!((second.crop_w, second.crop_h), (1080, 1080));
        assert_eq!((second.crop_x, second.crop_y), (840, 0));
    }

    #[test]
    fn test_last_known_plan_after_tracking_ends() {
        let boxes: Vec<_> = (0..50).map(|f| (f, 500 + f as i32 * 10, 300, 100, 200)).collect();
        let timeline = planner()
            .plan(&coords(&boxes), &geometry(1920, 1080, 100), aspect("auto"), false)
            .unwrap();
        assert_eq!(timeline.len(), 100);
        let reference = timeline.plan_for(49).unwrap();
        for frame in 50..100 {
            assert_eq!(timeline.plan_for(frame).unwrap(), reference.for_frame(frame));
        }
    }

    #[test]
    fn test_frames_before_first_box_use_first_plan() {
        let c = coords(&[(10, 100, 100, 50, 50), (11, 120, 100, 50, 50)]);
        let timeline = planner().plan(&c, &geometry(640, 480, 12), aspect("auto"), false).unwrap();
        let first = timeline.plan_for(10).unwrap();
        for frame in 0..10 {
            assert_eq!(timeline.plan_for(frame).unwrap(), first.for_frame(frame));
        }
    }

    #[test]
    fn test_unknown_frame_count_stops_at_last_box() {
        let c = coords(&[(0, 100, 100, 50, 50), (4, 100, 100, 50, 50)]);
        let timeline = planner().plan(&c, &geometry(640, 480, 0), aspect("auto"), false).unwrap();
        assert_eq!(timeline.len(), 5);
    }

    #[test]
    fn test_zero_sized_video_is_error() {
        let c = coords(&[(0, 0, 0, 10, 10)]);
        let result = planner().plan(&c, &geometry(0, 0, 1), aspect("4:5"), false);
        assert_eq!(result, Err(CropPlanError::EmptyVideo { width: 0, height: 0 }));
        let result = planner().plan(&c, &geometry(640, 0, 1), aspect("auto"), true);
        assert_eq!(result, Err(CropPlanError::EmptyVideo { width: 640, height: 0 }));
    }

    #[test]
    fn test_fixed_crop_keeps_ratio_on_small_source() {
        let c = coords(&[(0, 100, 100, 40, 40)]);
        let timeline = planner().plan(&c, &geometry(240, 240, 1), aspect("7:3"), false).unwrap();
        let plan = timeline.plan_for(0).unwrap();
        assert_eq!((plan.crop_w, plan.crop_h), (240, 103));
        assert_eq!(timeline.output_size(), (240, 103));
        assert_abs_diff_eq!(plan.aspect_ratio(), 7.0 / 3.0, epsilon = 0.01);
    }

    #[test]
    fn test_extreme_custom_ratio_output_matches_crop() {
        let c = coords(&[(0, 1000, 500, 40, 40)]);
        let timeline = planner()
            .plan(&c, &geometry(3840, 2160, 1), aspect("1:2000"), false)
            .unwrap();
        let plan = timeline.plan_for(0).unwrap();
        assert_eq!(timeline.output_size(), (1, 1350));
        assert_eq!((plan.crop_w, plan.crop_h), timeline.output_size());
    }

    #[test]
    fn test_adaptive_without_ratio_is_automatic() {
        let c = coords(&[(0, 100, 100, 50, 50)]);
        let timeline = planner().plan(&c, &geometry(640, 480, 1), aspect("auto"), true).unwrap();
        assert_eq!(timeline.mode(), SizingMode::Automatic);
    }

    #[test]
    fn test_fixed_target_scaled_to_source() {
        let c = coords(&[(0, 600, 300, 100, 200)]);
        let timeline = planner().plan(&c, &geometry(1280, 720, 1), aspect("instagram"), false).unwrap();
        assert_eq!(timeline.output_size(), (576, 720));
        let plan = timeline.plan_for(0).unwrap();
        assert_eq!((plan.crop_w, plan.crop_h), (576, 720));
        assert_eq!(plan.crop_y, 0);
    }

    #[test]
    fn test_adaptive_grows_gradually_with_subject() {
        let mut boxes: Vec<_> = (0..30).map(|f| (f, 1800, 1000, 200, 300)).collect();
        boxes.extend((30..90).map(|f| (f, 1500, 800, 800, 1200)));
        let timeline = planner()
            .plan(&coords(&boxes), &geometry(3840, 2160, 90), aspect("4:5"), true)
            .unwrap();
        assert_eq!(timeline.output_size(), (1080, 1350));

        let widths: Vec<u32> = timeline.plans().iter().map(|p| p.crop_w).collect();
        assert_eq!(widths[0], 1080);
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert!(widths[31] - widths[30] < 200);
        // required: floor(1200 * 1.5) = 1800 high -> 1440 wide
        assert!(widths[89] > 1300 && widths[89] <= 1440);
    }

    #[rstest]
    #[case::portrait("4:5", 0.8)]
    #[case::vertical("9:16", 0.5625)]
    #[case::landscape("16:9", 1.777)]
    #[case::custom("3:2", 1.5)]
    fn test_adaptive_keeps_ratio(#[case] name: &str, #[case] ratio: f64) {
        let boxes: Vec<_> = (0..40)
            .map(|f| (f, 200 + f as i32 * 20, 150, 100 + f as i32 * 15, 180 + f as i32 * 20))
            .collect();
        let timeline = planner()
            .plan(&coords(&boxes), &geometry(1920, 1080, 40), aspect(name), true)
            .unwrap();
        for plan in timeline.plans() {
            assert!(plan.fits_within(1920, 1080));
            assert_abs_diff_eq!(plan.aspect_ratio(), ratio, epsilon = 0.01);
        }
    }

    #[test]
    fn test_fill_timeline_empty() {
        assert!(fill_timeline(&[], 10).is_empty());
    }

    fn arb_box(width: u32, height: u32) -> impl Strategy<Value = (i32, i32, i32, i32)> {
        let (w, h) = (width as i32, height as i32);
        (
            prop_oneof![Just(0), Just(w - 1), 0..w],
            prop_oneof![Just(0), Just(h - 1), 0..h],
            1..w,
            1..h,
        )
    }

    proptest! {
        #[test]
        fn prop_crops_stay_inside_video(
            (width, height, raw) in (240u32..2000, 240u32..2000).prop_flat_map(|(w, h)| {
                (Just(w), Just(h), prop::collection::vec(arb_box(w, h), 1..40))
            }),
            name in prop_oneof![
                Just("auto"), Just("4:5"), Just("1:1"), Just("9:16"), Just("16:9"), Just("7:3")
            ],
            adaptive in any::<bool>(),
        ) {
            let boxes: Vec<_> = raw
                .iter()
                .enumerate()
                .map(|(i, &(x, y, w, h))| TrackedBox::new(i as u32 * 2, x, y, w, h))
                .collect();
            let frame_count = boxes.len() * 2 + 5;
            let timeline = planner()
                .plan(
                    &CoordinateSequence::from_unordered(boxes),
                    &geometry(width, height, frame_count),
                    aspect(name),
                    adaptive,
                )
                .unwrap();

            prop_assert_eq!(timeline.len(), frame_count);
            for (i, plan) in timeline.plans().iter().enumerate() {
                prop_assert_eq!(plan.frame as usize, i);
                prop_assert!(plan.fits_within(width, height), "{:?} outside {}x{}", plan, width, height);
            }
            match timeline.mode() {
                SizingMode::Fixed { ratio } | SizingMode::Adaptive { ratio } => {
                    for plan in timeline.plans() {
                        prop_assert!(
                            (plan.aspect_ratio() - ratio).abs() <= 0.01,
                            "{:?} ratio {} vs {}", plan, plan.aspect_ratio(), ratio
                        );
                    }
                }
                SizingMode::Automatic => {}
            }
        }
    }
}
