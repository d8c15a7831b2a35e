use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cropping::domain::frame_cropper::FrameCropper;
use crate::shared::crop_plan::CropTimeline;
use crate::shared::tracked_box::CoordinateSequence;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_config::PipelineConfig;
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::plan_crops_use_case::PlanCropsUseCase;

/// Outcome of a completed export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSummary {
    pub frames_written: usize,
    pub output_size: (u32, u32),
    pub warnings: Vec<String>,
}

/// Plans crops for a source video and writes the cropped video.
///
/// Frames are processed strictly in order on the calling thread. The
/// cancellation flag and the progress callback are checked once per frame;
/// a callback returning `false` cancels the run.
pub struct ExportCropUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    cropper: Box<dyn FrameCropper>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl ExportCropUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        cropper: Box<dyn FrameCropper>,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader,
            writer,
            cropper,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
        output: &Path,
        coords: &CoordinateSequence,
        config: &PipelineConfig,
    ) -> Result<ExportSummary, PipelineError> {
        let planner = PlanCropsUseCase::new(config.clone())?;
        let metadata = self.reader.open(input).map_err(PipelineError::video)?;
        self.logger.info(&format!(
            "Source {}x{} @ {:.2} fps, {} frames",
            metadata.width, metadata.height, metadata.fps, metadata.total_frames
        ));

        let timeline = match planner.execute(coords, &metadata.geometry(), self.logger.as_mut()) {
            Ok(timeline) => timeline,
            Err(e) => {
                self.reader.close();
                return Err(e);
            }
        };
        let (out_w, out_h) = timeline.output_size();

        if let Err(e) = self.writer.open(output, &metadata.with_size(out_w, out_h)) {
            self.reader.close();
            return Err(PipelineError::video(e));
        }

        let result = self.write_frames(&timeline, metadata.total_frames);
        self.reader.close();
        // Always finalize the container, even after a failure mid-stream.
        let closed = self.writer.close().map_err(PipelineError::video);
        let frames_written = result?;
        closed?;

        let mut warnings: Vec<String> = planner
            .aspect_warning()
            .map(str::to_string)
            .into_iter()
            .collect();
        if metadata.total_frames > 0 && frames_written != metadata.total_frames {
            let warning = format!(
                "Container reported {} frames, decoded {frames_written}",
                metadata.total_frames
            );
            self.logger.warn(&warning);
            warnings.push(warning);
        }
        self.logger.summary();

        Ok(ExportSummary {
            frames_written,
            output_size: (out_w, out_h),
            warnings,
        })
    }

    fn write_frames(
        &mut self,
        timeline: &CropTimeline,
        total: usize,
    ) -> Result<usize, PipelineError> {
        let output_size = timeline.output_size();
        let mut written = 0;

        for frame in self.reader.frames() {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }
            let frame = frame.map_err(PipelineError::video)?;
            let plan = timeline
                .plan_for(frame.index() as u32)
                .ok_or(PipelineError::NoTrackedFrames)?;

            let started = Instant::now();
            let cropped = self
                .cropper
                .crop(&frame, &plan, output_size)
                .map_err(PipelineError::video)?;
            self.logger
                .timing("crop", started.elapsed().as_secs_f64() * 1000.0);

            let started = Instant::now();
            self.writer.write(&cropped).map_err(PipelineError::video)?;
            self.logger
                .timing("encode", started.elapsed().as_secs_f64() * 1000.0);

            written += 1;
            self.logger.progress(written, total);
            if let Some(on_progress) = &self.on_progress {
                if !on_progress(written, total) {
                    self.cancelled.store(true, Ordering::Relaxed);
                    return Err(PipelineError::Cancelled);
                }
            }
        }
        Ok(written)
    }
}
