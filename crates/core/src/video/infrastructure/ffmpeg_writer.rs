use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::Rational;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

const FALLBACK_FPS: i32 = 30;

/// Open encoder state for one output file.
struct EncodeSession {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    time_base: Rational,
    next_pts: i64,
}

impl EncodeSession {
    /// Sends pending packets from the encoder to the container.
    fn drain(&mut self) -> Result<(), ffmpeg_next::Error> {
        let stream_tb = self
            .octx
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(self.time_base);
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.time_base, stream_tb);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

/// Encodes cropped frames to MPEG-4 via ffmpeg-next, then remuxes the
/// source's audio track into the result on close.
///
/// YUV 4:2:0 needs even dimensions, so an odd output size is encoded one
/// pixel smaller on that axis.
pub struct FfmpegWriter {
    session: Option<EncodeSession>,
    source_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
}

// Safety: FfmpegWriter is driven from one thread at a time; the ffmpeg
// handles it owns are never shared.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            session: None,
            source_path: None,
            output_path: None,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let enc_w = metadata.width & !1;
        let enc_h = metadata.height & !1;
        if enc_w == 0 || enc_h == 0 {
            return Err(format!(
                "Output size {}x{} is too small to encode",
                metadata.width, metadata.height
            )
            .into());
        }
        if (enc_w, enc_h) != (metadata.width, metadata.height) {
            log::debug!(
                "Encoding {}x{} as {enc_w}x{enc_h} for 4:2:0 chroma",
                metadata.width,
                metadata.height
            );
        }

        let fps = match metadata.fps.round() as i32 {
            f if f > 0 => f,
            _ => FALLBACK_FPS,
        };
        let time_base = Rational(1, fps);

        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(enc_w);
        encoder_ctx.set_height(enc_h);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            enc_w,
            enc_h,
            scaling::Flags::BILINEAR,
        )?;

        self.session = Some(EncodeSession {
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            time_base,
            next_pts: 0,
        });
        self.source_path = metadata.source_path.clone();
        self.output_path = Some(path.to_path_buf());
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let session = self.session.as_mut().ok_or("FfmpegWriter: not opened")?;
        if (frame.width(), frame.height()) != (session.width, session.height) {
            return Err(format!(
                "Frame {} is {}x{}, writer expects {}x{}",
                frame.index(),
                frame.width(),
                frame.height(),
                session.width,
                session.height
            )
            .into());
        }

        let mut rgb = Video::new(Pixel::RGB24, session.width, session.height);
        let stride = rgb.stride(0);
        let row_bytes = session.width as usize * 3;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_bytes).enumerate() {
            dst[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let mut yuv = Video::empty();
        session.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(session.next_pts));
        session.next_pts += 1;

        session.encoder.send_frame(&yuv)?;
        session.drain()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.encoder.send_eof()?;
        session.drain()?;
        session.octx.write_trailer()?;
        drop(session);

        if let (Some(source), Some(output)) = (self.source_path.take(), self.output_path.take()) {
            if let Err(e) = mux_audio(&source, &output) {
                log::warn!("Audio muxing failed: {e}");
            }
        }
        Ok(())
    }
}

/// Rewrites `video_output` with the first audio stream of `source` added.
///
/// No-op when the source has no audio.
fn mux_audio(source: &Path, video_output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut audio_in = ffmpeg_next::format::input(source)?;
    let Some(audio_index) = audio_in
        .streams()
        .best(ffmpeg_next::media::Type::Audio)
        .map(|s| s.index())
    else {
        return Ok(());
    };
    let mut video_in = ffmpeg_next::format::input(video_output)?;
    let video_index = video_in
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .map(|s| s.index())
        .ok_or("Encoded output has no video stream")?;

    let ext = video_output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let temp_path = video_output.with_extension(format!("mux.{ext}"));
    let mut octx = ffmpeg_next::format::output(&temp_path)?;

    for (input, index) in [(&video_in, video_index), (&audio_in, audio_index)] {
        let stream = input.stream(index).ok_or("Stream vanished while muxing")?;
        let mut ost = octx.add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
        ost.set_parameters(stream.parameters());
        // Let the container pick its own tag for the copied codec.
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
    }
    octx.write_header()?;

    copy_packets(&mut video_in, video_index, &mut octx, 0)?;
    copy_packets(&mut audio_in, audio_index, &mut octx, 1)?;
    octx.write_trailer()?;

    std::fs::rename(&temp_path, video_output)?;
    Ok(())
}

fn copy_packets(
    input: &mut ffmpeg_next::format::context::Input,
    stream_index: usize,
    octx: &mut ffmpeg_next::format::context::Output,
    out_index: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let in_tb = input
        .stream(stream_index)
        .ok_or("Missing input stream")?
        .time_base();
    let out_tb = octx
        .stream(out_index)
        .ok_or("Missing output stream")?
        .time_base();
    for (stream, mut packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        packet.rescale_ts(in_tb, out_tb);
        packet.set_position(-1);
        packet.set_stream(out_index);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}
