use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for cropped frames.
///
/// `open` receives the source metadata resized to the output size, so
/// `source_path` still points at the original file.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Every frame must match the size given to `open`.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes the encoder. Audio from the source is muxed in here.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
