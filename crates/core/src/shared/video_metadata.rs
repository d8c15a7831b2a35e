use std::path::PathBuf;

/// Container-level facts reported by a [`VideoReader`](crate::video::domain::video_reader::VideoReader).
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
    pub rotation: i32,
}

impl VideoMetadata {
    pub fn geometry(&self) -> VideoGeometry {
        VideoGeometry {
            width: self.width,
            height: self.height,
            fps: self.fps,
            total_frames: self.total_frames,
        }
    }

    /// Same container facts with the frame size replaced, for the cropped output.
    pub fn with_size(&self, width: u32, height: u32) -> VideoMetadata {
        VideoMetadata {
            width,
            height,
            ..self.clone()
        }
    }
}

/// Immutable source geometry for one export run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
}

impl VideoGeometry {
    pub fn new(width: u32, height: u32, fps: f64, total_frames: usize) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames,
        }
    }
}
