use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::shared::crop_plan::CropPlan;
use crate::shared::tracked_box::{CoordinateSequence, TrackedBox};
use crate::tracking::domain::subject_merger::SubjectBox;

/// Persists tracking coordinates and crop plans as headed CSV files.
///
/// Column names come from the serde field names:
/// - coordinates: `frame,x,y,w,h`
/// - multi-subject coordinates: `frame,track_id,x,y,w,h`
/// - crop plans: `frame,crop_x,crop_y,crop_w,crop_h`
pub struct CsvCoordinateStore;

impl CsvCoordinateStore {
    /// Loads a single-subject coordinate file. Rows may be in any order.
    pub fn load(path: &Path) -> Result<CoordinateSequence, csv::Error> {
        let boxes: Vec<TrackedBox> = read_rows(path)?;
        log::debug!("Loaded {} tracked boxes from {}", boxes.len(), path.display());
        Ok(CoordinateSequence::from_unordered(boxes))
    }

    pub fn save(path: &Path, coords: &CoordinateSequence) -> Result<(), csv::Error> {
        write_rows(path, coords.iter())
    }

    /// Loads a multi-subject file; `track_id` may be empty.
    pub fn load_subjects(path: &Path) -> Result<Vec<SubjectBox>, csv::Error> {
        read_rows(path)
    }

    pub fn save_plans(path: &Path, plans: &[CropPlan]) -> Result<(), csv::Error> {
        write_rows(path, plans.iter())
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    reader.deserialize().collect()
}

fn write_rows<'a, T, I>(path: &Path, rows: I) -> Result<(), csv::Error>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_save_then_load_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coords.csv");
        let coords = CoordinateSequence::from_unordered(vec![
            TrackedBox::new(0, 10, 20, 30, 40),
            TrackedBox::new(2, 12, 22, 30, 40),
        ]);

        CsvCoordinateStore::save(&path, &coords).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("frame,x,y,w,h\n"));
        assert_eq!(CsvCoordinateStore::load(&path).unwrap(), coords);
    }

    #[test]
    fn test_load_sorts_and_tolerates_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coords.csv");
        fs::write(&path, "frame, x, y, w, h\n5, 1, 1, 4, 4\n1, 2, 2, 4, 4\n").unwrap();

        let coords = CsvCoordinateStore::load(&path).unwrap();
        let frames: Vec<u32> = coords.iter().map(|b| b.frame).collect();
        assert_eq!(frames, vec![1, 5]);
    }

    #[test]
    fn test_load_rejects_malformed_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coords.csv");
        fs::write(&path, "frame,x,y,w,h\n0,a,0,1,1\n").unwrap();
        assert!(CsvCoordinateStore::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CsvCoordinateStore::load(&dir.path().join("none.csv")).is_err());
    }

    #[test]
    fn test_load_subjects_with_optional_track_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.csv");
        fs::write(&path, "frame,track_id,x,y,w,h\n0,3,0,0,10,10\n0,,20,0,10,10\n").unwrap();

        let subjects = CsvCoordinateStore::load_subjects(&path).unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].track_id, Some(3));
        assert_eq!(subjects[1].track_id, None);
    }

    #[test]
    fn test_save_plans_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.csv");
        let plans = vec![CropPlan {
            frame: 0,
            crop_x: 1,
            crop_y: 2,
            crop_w: 3,
            crop_h: 4,
        }];

        CsvCoordinateStore::save_plans(&path, &plans).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "frame,crop_x,crop_y,crop_w,crop_h\n0,1,2,3,4\n");
    }
}
