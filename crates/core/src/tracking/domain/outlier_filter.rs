use crate::shared::constants::{
    DEFAULT_ROLLING_WINDOW, MAX_OUTLIER_PASSES, POSITION_OUTLIER_THRESHOLD_PX,
    SIZE_OUTLIER_FACTOR, SIZE_OUTLIER_PERCENTILE,
};
use crate::shared::stats::{centered_window, percentile_sorted};

use super::box_series::BoxSeries;

/// Sliding-window outlier rejection, applied per dimension.
///
/// - Position (x, y): a value further than `position_threshold` pixels from
///   its window median is replaced by that median.
/// - Size (w, h): a value above `p75 * size_factor` of its window is
///   replaced by the window median. Spurious detections inflate boxes, so
///   only upward spikes are rejected.
///
/// Passes repeat until nothing changes, so filtering already filtered
/// output is a no-op.
#[derive(Clone, Copy, Debug)]
pub struct OutlierFilter {
    window: usize,
    position_threshold: f64,
    size_factor: f64,
}

/// Count of values that differ from the input, per dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutlierReport {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl OutlierReport {
    pub fn total(&self) -> usize {
        self.x + self.y + self.w + self.h
    }
}

impl OutlierFilter {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            position_threshold: POSITION_OUTLIER_THRESHOLD_PX,
            size_factor: SIZE_OUTLIER_FACTOR,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn filter(&self, series: &BoxSeries) -> (BoxSeries, OutlierReport) {
        let (x, rx) = self.filter_position(&series.x);
        let (y, ry) = self.filter_position(&series.y);
        let (w, rw) = self.filter_size(&series.w);
        let (h, rh) = self.filter_size(&series.h);
        let report = OutlierReport {
            x: rx,
            y: ry,
            w: rw,
            h: rh,
        };

        if report.total() > 0 {
            log::debug!(
                "Outlier filter (window={}): replaced x={} y={} w={} h={}",
                self.window,
                report.x,
                report.y,
                report.w,
                report.h
            );
        }

        let filtered = BoxSeries {
            frames: series.frames.clone(),
            x,
            y,
            w,
            h,
        };
        (filtered, report)
    }

    fn filter_position(&self, values: &[f64]) -> (Vec<f64>, usize) {
        self.filter_with(values, |value, sorted_window| {
            let median = percentile_sorted(sorted_window, 50.0);
            ((value - median).abs() > self.position_threshold).then_some(median)
        })
    }

    fn filter_size(&self, values: &[f64]) -> (Vec<f64>, usize) {
        self.filter_with(values, |value, sorted_window| {
            let p75 = percentile_sorted(sorted_window, SIZE_OUTLIER_PERCENTILE);
            (value > p75 * self.size_factor).then(|| percentile_sorted(sorted_window, 50.0))
        })
    }

    /// Repeats [`Self::pass`] until no value is replaced.
    fn filter_with<F>(&self, values: &[f64], replace: F) -> (Vec<f64>, usize)
    where
        F: Fn(f64, &[f64]) -> Option<f64>,
    {
        let mut current = values.to_vec();
        let mut passes = 0;
        loop {
            let (next, replaced) = self.pass(&current, &replace);
            current = next;
            if replaced == 0 {
                break;
            }
            passes += 1;
            if passes == MAX_OUTLIER_PASSES {
                log::warn!(
                    "Outlier filter (window={}) still replacing values after {passes} passes",
                    self.window
                );
                break;
            }
        }
        let changed = values.iter().zip(&current).filter(|(a, b)| a != b).count();
        (current, changed)
    }

    /// Applies `replace` to every value with its sorted window; `Some` swaps
    /// the value out.
    fn pass<F>(&self, values: &[f64], replace: &F) -> (Vec<f64>, usize)
    where
        F: Fn(f64, &[f64]) -> Option<f64>,
    {
        let n = values.len();
        let mut out = Vec::with_capacity(n);
        let mut replaced = 0;
        let mut window_buf = Vec::with_capacity(self.window);

        for (i, &value) in values.iter().enumerate() {
            let (start, end) = centered_window(i, n, self.window);
            window_buf.clear();
            window_buf.extend_from_slice(&values[start..end]);
            window_buf.sort_by(|a, b| a.total_cmp(b));

            match replace(value, &window_buf) {
                Some(v) if v != value => {
                    out.push(v);
                    replaced += 1;
                }
                _ => out.push(value),
            }
        }
        (out, replaced)
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLING_WINDOW)
    }
}
