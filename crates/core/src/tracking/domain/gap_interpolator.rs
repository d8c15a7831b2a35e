use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};

/// What the interpolator filled in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GapReport {
    pub gaps: usize,
    pub synthesized_frames: usize,
    pub longest_gap: usize,
}

/// Fills missing frames between consecutive tracked frames by linear
/// interpolation of x, y, w and h.
///
/// The output covers every integer frame from the first to the last tracked
/// frame. Nothing is extrapolated outside that range.
#[derive(Clone, Copy, Debug, Default)]
pub struct GapInterpolator;

impl GapInterpolator {
    pub fn new() -> Self {
        Self
    }

    pub fn interpolate(&self, coords: &CoordinateSequence) -> (CoordinateSequence, GapReport) {
        let mut report = GapReport::default();
        if coords.len() < 2 {
            return (coords.clone(), report);
        }

        let boxes = coords.as_slice();
        let span = (boxes[boxes.len() - 1].frame - boxes[0].frame) as usize + 1;
        let mut result = Vec::with_capacity(span);

        for pair in boxes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            result.push(a);

            let gap = (b.frame - a.frame - 1) as usize;
            if gap == 0 {
                continue;
            }
            report.gaps += 1;
            report.synthesized_frames += gap;
            report.longest_gap = report.longest_gap.max(gap);

            for j in 1..=gap {
                let ratio = j as f64 / (gap + 1) as f64;
                result.push(TrackedBox {
                    frame: a.frame + j as u32,
                    x: lerp(a.x, b.x, ratio),
                    y: lerp(a.y, b.y, ratio),
                    w: lerp(a.w, b.w, ratio),
                    h: lerp(a.h, b.h, ratio),
                });
            }
        }
        result.push(boxes[boxes.len() - 1]);

        if report.gaps > 0 {
            log::debug!(
                "Interpolated {} gaps ({} frames, longest {}): {} -> {} boxes",
                report.gaps,
                report.synthesized_frames,
                report.longest_gap,
                coords.len(),
                result.len()
            );
        }

        (CoordinateSequence::from_sorted(result), report)
    }
}

fn lerp(a: i32, b: i32, ratio: f64) -> i32 {
    (a as f64 + (b - a) as f64 * ratio).round() as i32
}
