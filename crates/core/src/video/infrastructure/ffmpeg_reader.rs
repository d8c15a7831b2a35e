use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes source frames via ffmpeg-next and converts them to packed RGB.
///
/// Frames come out in stored orientation. Tracking coordinates are expected
/// in the same space, so a rotation tag is reported but not applied.
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is driven from one thread at a time; the ffmpeg
// handles it owns are never shared.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

fn open_decoder(
    stream: &ffmpeg_next::format::stream::Stream,
) -> Result<ffmpeg_next::decoder::Video, ffmpeg_next::Error> {
    ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or("No video stream found")?;
        let decoder = open_decoder(&stream)?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let rotation = extract_rotation(&stream);
        if rotation != 0 {
            log::warn!(
                "{} is tagged with {rotation} degree rotation; crops use stored orientation",
                path.display()
            );
        }

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
            rotation,
        };

        self.video_stream_index = stream.index();
        drop(stream);
        self.input_ctx = Some(ictx);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };
        match DecodedFrames::new(ictx, self.video_stream_index) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

/// Lazily decodes one frame at a time.
struct DecodedFrames<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    next_index: usize,
    eof_sent: bool,
}

impl<'a> DecodedFrames<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        stream_index: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .stream(stream_index)
            .ok_or("Video stream disappeared")?;
        let decoder = open_decoder(&stream)?;
        drop(stream);

        let (w, h) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            w,
            h,
            Pixel::RGB24,
            w,
            h,
            scaling::Flags::BILINEAR,
        )?;
        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            next_index: 0,
            eof_sent: false,
        })
    }

    fn receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let frame = Frame::new(
            packed_rgb(&rgb),
            rgb.width(),
            rgb.height(),
            3,
            self.next_index,
        );
        self.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.receive() {
                return Some(result);
            }
            if self.eof_sent {
                return None;
            }
            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_index {
                        // Corrupt packets are skipped; the decoder resyncs.
                        let _ = self.decoder.send_packet(&packet);
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Rotation in degrees (0, 90, 180 or 270) from the display matrix side
/// data, falling back to the legacy `rotate` tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    let from_matrix = stream
        .side_data()
        .filter(|sd| sd.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix)
        .find_map(|sd| display_matrix_angle(sd.data()));
    let angle = from_matrix.or_else(|| stream.metadata().get("rotate")?.parse().ok());
    angle.map(snap_rotation).unwrap_or(0)
}

/// Angle of a 3x3 display matrix (nine little-endian 16.16 fixed-point
/// values). The matrix maps stored to displayed pixels, hence the negation.
fn display_matrix_angle(data: &[u8]) -> Option<i32> {
    let read = |i: usize| -> Option<f64> {
        let bytes: [u8; 4] = data.get(i * 4..i * 4 + 4)?.try_into().ok()?;
        Some(i32::from_le_bytes(bytes) as f64 / 65536.0)
    };
    if data.len() < 36 {
        return None;
    }
    let (m00, m10) = (read(0)?, read(1)?);
    Some(-(m10.atan2(m00).to_degrees().round() as i32))
}

/// Snaps an angle to the nearest quarter turn.
fn snap_rotation(angle: i32) -> i32 {
    ((angle.rem_euclid(360) + 45) / 90 % 4) * 90
}

/// Strips per-row padding from an RGB24 ffmpeg frame.
fn packed_rgb(rgb: &Video) -> Vec<u8> {
    let stride = rgb.stride(0);
    let row_bytes = rgb.width() as usize * 3;
    rgb.data(0)
        .chunks(stride)
        .take(rgb.height() as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_writer::VideoWriter;
    use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;
    use rstest::rstest;

    fn write_test_video(path: &Path, frames: usize, width: u32, height: u32) {
        let meta = VideoMetadata {
            width,
            height,
            fps: 30.0,
            total_frames: frames,
            codec: String::new(),
            source_path: None,
            rotation: 0,
        };
        let mut writer = FfmpegWriter::new();
        writer.open(path, &meta).unwrap();
        for i in 0..frames {
            let value = (i * 40 % 256) as u8;
            let data = vec![value; (width * height * 3) as usize];
            writer.write(&Frame::new(data, width, height, 3, i)).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        write_test_video(&path, 5, 160, 120);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert!(meta.fps > 0.0);
        assert_eq!(meta.rotation, 0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_is_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.open(Path::new("/nonexistent/in.mp4")).is_err());
    }

    #[test]
    fn test_frames_are_sequential_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        write_test_video(&path, 5, 160, 120);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
    }

    #[test]
    fn test_frames_without_open_is_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_close_twice_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        write_test_video(&path, 1, 64, 64);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
    }

    fn matrix(m00: i32, m10: i32) -> Vec<u8> {
        let mut data = vec![0u8; 36];
        data[0..4].copy_from_slice(&m00.to_le_bytes());
        data[4..8].copy_from_slice(&m10.to_le_bytes());
        data
    }

    #[test]
    fn test_display_matrix_identity() {
        assert_eq!(display_matrix_angle(&matrix(65536, 0)), Some(0));
    }

    #[test]
    fn test_display_matrix_quarter_turn() {
        let angle = display_matrix_angle(&matrix(0, 65536)).unwrap();
        assert_eq!(snap_rotation(angle), 270);
    }

    #[test]
    fn test_display_matrix_too_short() {
        assert_eq!(display_matrix_angle(&[0u8; 20]), None);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(44, 0)]
    #[case(45, 90)]
    #[case(90, 90)]
    #[case(180, 180)]
    #[case(-90, 270)]
    #[case(315, 0)]
    #[case(314, 270)]
    #[case(360, 0)]
    fn test_snap_rotation(#[case] angle: i32, #[case] expected: i32) {
        assert_eq!(snap_rotation(angle), expected);
    }
}
