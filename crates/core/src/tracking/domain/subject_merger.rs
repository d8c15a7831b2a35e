use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};

/// One subject's box in a multi-subject tracking export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectBox {
    pub frame: u32,
    #[serde(default)]
    pub track_id: Option<u32>,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl SubjectBox {
    fn to_tracked(self) -> TrackedBox {
        TrackedBox::new(self.frame, self.x, self.y, self.w, self.h)
    }
}

/// Collapses several subjects per frame into one enclosing box, so a group
/// (e.g. two dancers) is framed together.
///
/// When `track_ids` is set, only those subjects contribute; boxes without a
/// track ID are then ignored.
#[derive(Clone, Debug, Default)]
pub struct SubjectMerger {
    track_ids: Option<HashSet<u32>>,
}

impl SubjectMerger {
    pub fn new(track_ids: Option<HashSet<u32>>) -> Self {
        Self { track_ids }
    }

    pub fn merge(&self, subjects: &[SubjectBox]) -> CoordinateSequence {
        let mut selected: Vec<SubjectBox> = subjects
            .iter()
            .filter(|s| s.w > 0 && s.h > 0)
            .filter(|s| match &self.track_ids {
                Some(ids) => s.track_id.is_some_and(|tid| ids.contains(&tid)),
                None => true,
            })
            .copied()
            .collect();
        selected.sort_by_key(|s| s.frame);

        let mut merged: Vec<TrackedBox> = Vec::new();
        for subject in selected {
            let b = subject.to_tracked();
            match merged.last_mut() {
                Some(last) if last.frame == b.frame => *last = last.union(&b),
                _ => merged.push(b),
            }
        }
        CoordinateSequence::from_sorted(merged)
    }
}
