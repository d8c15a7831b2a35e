use serde::{Deserialize, Serialize};

/// One axis-aligned subject bounding box for a single source frame.
///
/// Coordinates are source-video pixels with the origin at the top-left.
/// Field names double as the persisted CSV header (`frame,x,y,w,h`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBox {
    pub frame: u32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl TrackedBox {
    pub fn new(frame: u32, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { frame, x, y, w, h }
    }

    /// Integer center, rounding toward the top-left like the crop math expects.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn area(&self) -> i64 {
        self.w.max(0) as i64 * self.h.max(0) as i64
    }

    /// Smallest box enclosing both, stamped with `self.frame`.
    pub fn union(&self, other: &TrackedBox) -> TrackedBox {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = (self.x + self.w).max(other.x + other.w);
        let y2 = (self.y + self.h).max(other.y + other.h);
        TrackedBox::new(self.frame, x1, y1, x2 - x1, y2 - y1)
    }

    pub fn has_positive_size(&self) -> bool {
        self.w > 0 && self.h > 0
    }
}

/// Frame-ordered boxes, at most one per frame.
///
/// Invariant: frame numbers are strictly increasing. Lookups use frame
/// arithmetic when the sequence is dense and binary search otherwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoordinateSequence {
    boxes: Vec<TrackedBox>,
}

impl CoordinateSequence {
    pub fn new() -> Self {
        Self { boxes: Vec::new() }
    }

    /// Builds a sequence from boxes in any order.
    ///
    /// Sorts by frame; when a frame appears more than once the last
    /// occurrence wins. Boxes with a non-positive size are dropped.
    pub fn from_unordered(mut boxes: Vec<TrackedBox>) -> Self {
        let before = boxes.len();
        boxes.retain(TrackedBox::has_positive_size);
        if boxes.len() != before {
            log::warn!(
                "Dropped {} boxes with non-positive size",
                before - boxes.len()
            );
        }

        // Stable sort keeps input order within a frame, so the last duplicate
        // is the one that survives the reverse dedup below.
        boxes.sort_by_key(|b| b.frame);
        boxes.reverse();
        boxes.dedup_by_key(|b| b.frame);
        boxes.reverse();

        Self { boxes }
    }

    /// Wraps boxes the caller guarantees are strictly increasing by frame.
    pub(crate) fn from_sorted(boxes: Vec<TrackedBox>) -> Self {
        debug_assert!(
            boxes.windows(2).all(|w| w[0].frame < w[1].frame),
            "frames must be strictly increasing"
        );
        Self { boxes }
    }

    pub fn as_slice(&self) -> &[TrackedBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn first(&self) -> Option<&TrackedBox> {
        self.boxes.first()
    }

    pub fn last(&self) -> Option<&TrackedBox> {
        self.boxes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackedBox> {
        self.boxes.iter()
    }

    /// True when every integer frame between first and last is present.
    pub fn is_dense(&self) -> bool {
        match (self.boxes.first(), self.boxes.last()) {
            (Some(first), Some(last)) => (last.frame - first.frame) as usize + 1 == self.boxes.len(),
            _ => true,
        }
    }

    pub fn get(&self, frame: u32) -> Option<&TrackedBox> {
        let first = self.boxes.first()?;
        if self.is_dense() {
            let offset = frame.checked_sub(first.frame)? as usize;
            return self.boxes.get(offset);
        }
        self.boxes
            .binary_search_by_key(&frame, |b| b.frame)
            .ok()
            .map(|i| &self.boxes[i])
    }

    pub fn into_vec(self) -> Vec<TrackedBox> {
        self.boxes
    }
}

impl<'a> IntoIterator for &'a CoordinateSequence {
    type Item = &'a TrackedBox;
    type IntoIter = std::slice::Iter<'a, TrackedBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}
