use std::fmt;

use crate::shared::constants::{
    JUMP_POSITION_THRESHOLD_PX, JUMP_SIZE_THRESHOLD_PX, SHRINKING_AREA_RATIO,
    SIZE_HISTORY_FRAMES, SIZE_VARIATION_WARNING, SUDDEN_SIZE_CHANGE, TOO_SMALL_AREA_RATIO,
};
use crate::shared::stats::{mean, median, safe_ratio, std_dev};
use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};

/// Summary statistics for one box dimension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DimensionStats {
    pub min: i32,
    pub max: i32,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl DimensionStats {
    fn from_values(values: &[i32]) -> Option<Self> {
        let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Some(Self {
            min: *values.iter().min()?,
            max: *values.iter().max()?,
            mean: mean(&as_f64)?,
            median: median(&as_f64)?,
            std_dev: std_dev(&as_f64)?,
        })
    }
}

/// An abrupt change between two consecutive tracked boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackingJump {
    pub frame: u32,
    pub dx: i32,
    pub dy: i32,
    pub dw: i32,
    pub dh: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeAlertKind {
    /// Under 30% of the first box area; the tracker has likely lost the subject.
    TooSmall,
    /// Under 50% of the first box area.
    Shrinking,
    /// More than 20% off the average area of the recent frames.
    SuddenChange,
}

impl fmt::Display for SizeAlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TooSmall => "too small",
            Self::Shrinking => "shrinking",
            Self::SuddenChange => "sudden size change",
        })
    }
}

/// A tracked box whose size looks unhealthy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeAlert {
    pub frame: u32,
    pub kind: SizeAlertKind,
    /// Box area over the first box area.
    pub area_ratio: f64,
}

/// Diagnostic overview of a raw coordinate sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingReport {
    pub tracked_frames: usize,
    pub first_frame: u32,
    pub last_frame: u32,
    pub width: DimensionStats,
    pub height: DimensionStats,
    pub jumps: Vec<TrackingJump>,
    /// Last box area over first box area; 1.0 when the first area is zero.
    pub area_change: f64,
    pub size_alerts: Vec<SizeAlert>,
    /// `(max width - min width) / median width`; 0 when the median is 0.
    pub size_variation: f64,
    /// Median width over height.
    pub median_aspect: f64,
}

impl TrackingReport {
    /// Returns `None` for an empty sequence.
    pub fn analyze(coords: &CoordinateSequence) -> Option<Self> {
        let first = coords.first()?;
        let last = coords.last()?;
        let widths: Vec<i32> = coords.iter().map(|b| b.w).collect();
        let heights: Vec<i32> = coords.iter().map(|b| b.h).collect();

        let jumps = coords
            .as_slice()
            .windows(2)
            .filter_map(|pair| {
                let (a, b) = (pair[0], pair[1]);
                let jump = TrackingJump {
                    frame: b.frame,
                    dx: (b.x - a.x).abs(),
                    dy: (b.y - a.y).abs(),
                    dw: (b.w - a.w).abs(),
                    dh: (b.h - a.h).abs(),
                };
                let is_jump = jump.dx > JUMP_POSITION_THRESHOLD_PX
                    || jump.dy > JUMP_POSITION_THRESHOLD_PX
                    || jump.dw > JUMP_SIZE_THRESHOLD_PX
                    || jump.dh > JUMP_SIZE_THRESHOLD_PX;
                is_jump.then_some(jump)
            })
            .collect();

        let width = DimensionStats::from_values(&widths)?;
        let size_variation = if width.median == 0.0 {
            0.0
        } else {
            (width.max - width.min) as f64 / width.median
        };
        let aspects: Vec<f64> = coords
            .iter()
            .map(|b| safe_ratio(b.w as f64, b.h as f64))
            .collect();

        Some(Self {
            tracked_frames: coords.len(),
            first_frame: first.frame,
            last_frame: last.frame,
            width,
            height: DimensionStats::from_values(&heights)?,
            jumps,
            area_change: safe_ratio(last.area() as f64, first.area() as f64),
            size_alerts: size_alerts(coords.as_slice()),
            size_variation,
            median_aspect: median(&aspects)?,
        })
    }

    /// Frames flagged with `kind`.
    pub fn alert_count(&self, kind: SizeAlertKind) -> usize {
        self.size_alerts.iter().filter(|a| a.kind == kind).count()
    }

    pub fn size_unstable(&self) -> bool {
        self.size_variation > SIZE_VARIATION_WARNING
    }

    /// Frames between first and last with no tracked box.
    pub fn missing_frames(&self) -> usize {
        (self.last_frame - self.first_frame) as usize + 1 - self.tracked_frames
    }
}

impl fmt::Display for TrackingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracked frames: {}", self.tracked_frames)?;
        writeln!(
            f,
            "Frame range: {} to {} ({} missing)",
            self.first_frame,
            self.last_frame,
            self.missing_frames()
        )?;
        for (name, s) in [("Width", &self.width), ("Height", &self.height)] {
            writeln!(
                f,
                "{name:6}: min {} max {} mean {:.1} median {:.1} std {:.1}",
                s.min, s.max, s.mean, s.median, s.std_dev
            )?;
        }
        writeln!(f, "Area change (last/first): {:.2}", self.area_change)?;
        writeln!(f, "Median w/h ratio: {:.2}", self.median_aspect)?;
        write!(f, "Size variation: {:.0}%", self.size_variation * 100.0)?;
        if self.size_unstable() {
            writeln!(f, " (unstable, the tracker likely lost the subject)")?;
        } else {
            writeln!(f)?;
        }
        if !self.size_alerts.is_empty() {
            writeln!(
                f,
                "{} size alerts ({} too small, {} shrinking, {} sudden), first 5:",
                self.size_alerts.len(),
                self.alert_count(SizeAlertKind::TooSmall),
                self.alert_count(SizeAlertKind::Shrinking),
                self.alert_count(SizeAlertKind::SuddenChange)
            )?;
            for a in self.size_alerts.iter().take(5) {
                writeln!(
                    f,
                    "  frame {}: {} (area ratio {:.2})",
                    a.frame, a.kind, a.area_ratio
                )?;
            }
        }
        if self.jumps.is_empty() {
            write!(f, "No large jumps detected")
        } else {
            writeln!(f, "{} large jumps detected, first 5:", self.jumps.len())?;
            for j in self.jumps.iter().take(5) {
                writeln!(
                    f,
                    "  frame {}: dx={} dy={} dw={} dh={}",
                    j.frame, j.dx, j.dy, j.dw, j.dh
                )?;
            }
            Ok(())
        }
    }
}

/// Classifies each box against the first box area and the running
/// average of the last [`SIZE_HISTORY_FRAMES`] areas, itself included.
fn size_alerts(boxes: &[TrackedBox]) -> Vec<SizeAlert> {
    let Some(first) = boxes.first() else {
        return Vec::new();
    };
    let initial_area = first.area() as f64;
    let mut alerts = Vec::new();
    for (i, b) in boxes.iter().enumerate() {
        let area = b.area() as f64;
        let recent = &boxes[(i + 1).saturating_sub(SIZE_HISTORY_FRAMES)..=i];
        let recent_avg =
            recent.iter().map(|r| r.area() as f64).sum::<f64>() / recent.len() as f64;

        let area_ratio = safe_ratio(area, initial_area);
        let kind = if area_ratio < TOO_SMALL_AREA_RATIO {
            Some(SizeAlertKind::TooSmall)
        } else if area_ratio < SHRINKING_AREA_RATIO {
            Some(SizeAlertKind::Shrinking)
        } else if (safe_ratio(area, recent_avg) - 1.0).abs() > SUDDEN_SIZE_CHANGE {
            Some(SizeAlertKind::SuddenChange)
        } else {
            None
        };
        if let Some(kind) = kind {
            alerts.push(SizeAlert {
                frame: b.frame,
                kind,
                area_ratio,
            });
        }
    }
    alerts
}
