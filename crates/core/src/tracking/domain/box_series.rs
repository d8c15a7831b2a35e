use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};

/// Column-oriented view of a coordinate sequence for per-dimension filtering.
///
/// Indexed by position, not frame number; `frames` carries the frame
/// numbers through unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoxSeries {
    pub frames: Vec<u32>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub w: Vec<f64>,
    pub h: Vec<f64>,
}

impl BoxSeries {
    pub fn from_sequence(coords: &CoordinateSequence) -> Self {
        let n = coords.len();
        let mut series = BoxSeries {
            frames: Vec::with_capacity(n),
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            w: Vec::with_capacity(n),
            h: Vec::with_capacity(n),
        };
        for b in coords {
            series.frames.push(b.frame);
            series.x.push(b.x as f64);
            series.y.push(b.y as f64);
            series.w.push(b.w as f64);
            series.h.push(b.h as f64);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Rounds back to integer boxes. Sizes never drop below one pixel.
    pub fn to_sequence(&self) -> CoordinateSequence {
        let boxes = (0..self.len())
            .map(|i| TrackedBox {
                frame: self.frames[i],
                x: self.x[i].round() as i32,
                y: self.y[i].round() as i32,
                w: (self.w[i].round() as i32).max(1),
                h: (self.h[i].round() as i32).max(1),
            })
            .collect();
        CoordinateSequence::from_sorted(boxes)
    }
}
