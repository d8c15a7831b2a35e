use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_EMA_WINDOW, DEFAULT_ROLLING_WINDOW};
use crate::shared::stats::{centered_window, ema, mean, median};

use super::box_series::BoxSeries;

/// How box width and height are treated by the rolling-mean smoother.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePolicy {
    /// Average w/h over the same window as the position.
    #[default]
    Local,
    /// Pin w/h to the median over the whole sequence.
    FixedMedian,
}

/// Temporal smoothing strategy, resolved once per run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmoothingStrategy {
    /// Centered rolling mean over `window` samples.
    Rolling { window: usize, size_policy: SizePolicy },
    /// Causal exponential moving average with `alpha = 2 / (window + 1)`.
    ///
    /// Lags behind real motion in exchange for stability; suits trackers
    /// that re-detect on every frame.
    Ema { window: usize },
}

impl SmoothingStrategy {
    pub fn rolling() -> Self {
        Self::Rolling {
            window: DEFAULT_ROLLING_WINDOW,
            size_policy: SizePolicy::Local,
        }
    }

    pub fn ema() -> Self {
        Self::Ema {
            window: DEFAULT_EMA_WINDOW,
        }
    }

    pub fn window(&self) -> usize {
        match *self {
            Self::Rolling { window, .. } | Self::Ema { window } => window,
        }
    }
}

/// Applies a [`SmoothingStrategy`] to outlier-filtered coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Smoother {
    strategy: SmoothingStrategy,
}

impl Smoother {
    pub fn new(strategy: SmoothingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SmoothingStrategy {
        self.strategy
    }

    /// Same length and frames as the input; never fails.
    pub fn smooth(&self, series: &BoxSeries) -> BoxSeries {
        match self.strategy {
            SmoothingStrategy::Rolling {
                window,
                size_policy,
            } => rolling_mean(series, window.max(1), size_policy),
            SmoothingStrategy::Ema { window } => BoxSeries {
                frames: series.frames.clone(),
                x: ema(&series.x, window),
                y: ema(&series.y, window),
                w: ema(&series.w, window),
                h: ema(&series.h, window),
            },
        }
    }
}

fn rolling_mean(series: &BoxSeries, window: usize, size_policy: SizePolicy) -> BoxSeries {
    if series.len() < window {
        return series.clone();
    }

    let (w, h) = match size_policy {
        SizePolicy::Local => (window_means(&series.w, window), window_means(&series.h, window)),
        SizePolicy::FixedMedian => {
            let n = series.len();
            let mw = median(&series.w).unwrap_or_default();
            let mh = median(&series.h).unwrap_or_default();
            (vec![mw; n], vec![mh; n])
        }
    };

    BoxSeries {
        frames: series.frames.clone(),
        x: window_means(&series.x, window),
        y: window_means(&series.y, window),
        w,
        h,
    }
}

fn window_means(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let (start, end) = centered_window(i, n, window);
            mean(&values[start..end]).unwrap_or(values[i])
        })
        .collect()
}
