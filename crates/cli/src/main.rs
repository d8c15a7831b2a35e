use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use reframe_core::cropping::infrastructure::cpu_frame_cropper::CpuFrameCropper;
use reframe_core::pipeline::export_crop_use_case::ExportCropUseCase;
use reframe_core::pipeline::pipeline_config::{PipelineConfig, SmoothingKind};
use reframe_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use reframe_core::pipeline::plan_crops_use_case::PlanCropsUseCase;
use reframe_core::shared::constants::VIDEO_EXTENSIONS;
use reframe_core::shared::tracked_box::CoordinateSequence;
use reframe_core::tracking::domain::smoother::SizePolicy;
use reframe_core::tracking::domain::subject_merger::SubjectMerger;
use reframe_core::tracking::domain::tracking_report::TrackingReport;
use reframe_core::tracking::infrastructure::csv_coordinate_store::CsvCoordinateStore;
use reframe_core::video::domain::video_reader::VideoReader;
use reframe_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use reframe_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

/// Reframe a video around a tracked subject.
#[derive(Parser)]
#[command(name = "reframe", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop the video around the subject and write a new video.
    Export {
        /// Source video.
        input: PathBuf,
        /// Tracking coordinates CSV.
        coords: PathBuf,
        /// Output video.
        output: PathBuf,
        #[command(flatten)]
        subjects: SubjectArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Write the per-frame crop rectangles to a CSV without encoding.
    Plan {
        /// Source video (only its size and frame count are read).
        input: PathBuf,
        /// Tracking coordinates CSV.
        coords: PathBuf,
        /// Output crop plan CSV.
        output: PathBuf,
        #[command(flatten)]
        subjects: SubjectArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Print tracking statistics, size alerts and large jumps.
    Analyze {
        /// Tracking coordinates CSV.
        coords: PathBuf,
        #[command(flatten)]
        subjects: SubjectArgs,
    },
}

#[derive(Args)]
struct SubjectArgs {
    /// Coordinates hold several subjects per frame (frame,track_id,x,y,w,h);
    /// they are merged into one enclosing box.
    #[arg(long)]
    multi_subject: bool,

    /// Only merge these track IDs (comma-separated). Requires --multi-subject.
    #[arg(long, value_delimiter = ',')]
    track_ids: Option<Vec<u32>>,
}

#[derive(Args)]
struct TuningArgs {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Crop size relative to the subject box.
    #[arg(long)]
    margin_factor: Option<f64>,

    /// Smoothing window in frames (default 15 rolling, 45 ema).
    #[arg(long)]
    smooth_window: Option<usize>,

    /// EMA window for adaptive crop size changes.
    #[arg(long)]
    crop_smooth_window: Option<usize>,

    /// auto, instagram, square, iphone, landscape, or W:H.
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Let the crop grow with the subject at the target aspect ratio.
    #[arg(long)]
    adaptive_crop: bool,

    /// Smoothing: rolling or ema.
    #[arg(long)]
    smoothing: Option<String>,

    /// Rolling size policy: local or fixed_median.
    #[arg(long)]
    size_policy: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    match cli.command {
        Command::Export {
            input,
            coords,
            output,
            subjects,
            tuning,
        } => run_export(&input, &coords, &output, &subjects, &tuning),
        Command::Plan {
            input,
            coords,
            output,
            subjects,
            tuning,
        } => run_plan(&input, &coords, &output, &subjects, &tuning),
        Command::Analyze { coords, subjects } => run_analyze(&coords, &subjects),
    }
}

fn run_export(
    input: &Path,
    coords_path: &Path,
    output: &Path,
    subjects: &SubjectArgs,
    tuning: &TuningArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(tuning)?;
    let coords = load_coordinates(coords_path, subjects)?;

    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(|current, total| {
        if total > 0 {
            eprint!("\rCropping frame {current}/{total}");
        } else {
            eprint!("\rCropping frame {current}");
        }
        true
    });

    let mut use_case = ExportCropUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new()),
        Box::new(CpuFrameCropper::default()),
        Box::new(StdoutPipelineLogger::without_progress()),
        Some(progress),
        None,
    );
    let summary = use_case.execute(input, output, &coords, &config)?;
    eprintln!();

    let (w, h) = summary.output_size;
    log::info!(
        "Wrote {} frames at {w}x{h} to {}",
        summary.frames_written,
        output.display()
    );
    Ok(())
}

fn run_plan(
    input: &Path,
    coords_path: &Path,
    output: &Path,
    subjects: &SubjectArgs,
    tuning: &TuningArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(tuning)?;
    let coords = load_coordinates(coords_path, subjects)?;

    let mut reader = FfmpegReader::new();
    let metadata = reader.open(input)?;
    reader.close();

    let mut logger = StdoutPipelineLogger::default();
    let timeline = PlanCropsUseCase::new(config)?.execute(&coords, &metadata.geometry(), &mut logger)?;
    CsvCoordinateStore::save_plans(output, timeline.plans())?;

    let (w, h) = timeline.output_size();
    log::info!(
        "Planned {} frames at {w}x{h}, written to {}",
        timeline.len(),
        output.display()
    );
    Ok(())
}

fn run_analyze(coords_path: &Path, subjects: &SubjectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let coords = load_coordinates(coords_path, subjects)?;
    let report = TrackingReport::analyze(&coords)
        .ok_or_else(|| format!("No tracked frames in {}", coords_path.display()))?;
    println!("{report}");
    Ok(())
}

fn load_coordinates(
    path: &Path,
    subjects: &SubjectArgs,
) -> Result<CoordinateSequence, Box<dyn std::error::Error>> {
    if !subjects.multi_subject {
        return Ok(CsvCoordinateStore::load(path)?);
    }
    let boxes = CsvCoordinateStore::load_subjects(path)?;
    let track_ids: Option<HashSet<u32>> = subjects
        .track_ids
        .as_ref()
        .map(|ids| ids.iter().copied().collect());
    let merged = SubjectMerger::new(track_ids).merge(&boxes);
    log::info!(
        "Merged {} subject boxes into {} frames",
        boxes.len(),
        merged.len()
    );
    Ok(merged)
}

fn build_config(tuning: &TuningArgs) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &tuning.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(margin) = tuning.margin_factor {
        config.margin_factor = margin;
    }
    if tuning.smooth_window.is_some() {
        config.smooth_window = tuning.smooth_window;
    }
    if let Some(window) = tuning.crop_smooth_window {
        config.crop_smooth_window = window;
    }
    if let Some(aspect) = &tuning.aspect_ratio {
        config.aspect_ratio = aspect.clone();
    }
    if tuning.adaptive_crop {
        config.adaptive_crop = true;
    }
    if let Some(smoothing) = tuning.smoothing.as_deref() {
        config.smoothing_strategy = parse_smoothing(smoothing)?;
    }
    if let Some(policy) = tuning.size_policy.as_deref() {
        config.size_policy = parse_size_policy(policy)?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_smoothing(value: &str) -> Result<SmoothingKind, String> {
    match value {
        "rolling" => Ok(SmoothingKind::Rolling),
        "ema" => Ok(SmoothingKind::Ema),
        other => Err(format!("Smoothing must be 'rolling' or 'ema', got '{other}'")),
    }
}

fn parse_size_policy(value: &str) -> Result<SizePolicy, String> {
    match value {
        "local" => Ok(SizePolicy::Local),
        "fixed_median" => Ok(SizePolicy::FixedMedian),
        other => Err(format!(
            "Size policy must be 'local' or 'fixed_median', got '{other}'"
        )),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (input, coords, subjects) = match &cli.command {
        Command::Export {
            input,
            coords,
            subjects,
            ..
        }
        | Command::Plan {
            input,
            coords,
            subjects,
            ..
        } => (Some(input), coords, subjects),
        Command::Analyze { coords, subjects } => (None, coords, subjects),
    };

    if let Some(input) = input {
        if !input.exists() {
            return Err(format!("Input video not found: {}", input.display()).into());
        }
        if !is_video(input) {
            log::warn!(
                "{} does not have a known video extension ({})",
                input.display(),
                VIDEO_EXTENSIONS.join(", ")
            );
        }
    }
    if !coords.exists() {
        return Err(format!("Coordinates file not found: {}", coords.display()).into());
    }
    if subjects.track_ids.is_some() && !subjects.multi_subject {
        return Err("--track-ids requires --multi-subject".into());
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> TuningArgs {
        TuningArgs {
            config: None,
            margin_factor: None,
            smooth_window: None,
            crop_smooth_window: None,
            aspect_ratio: None,
            adaptive_crop: false,
            smoothing: None,
            size_policy: None,
        }
    }

    #[test]
    fn test_cli_parses_export() {
        let cli = Cli::try_parse_from([
            "reframe",
            "export",
            "in.mp4",
            "coords.csv",
            "out.mp4",
            "--aspect-ratio",
            "9:16",
            "--adaptive-crop",
            "--multi-subject",
            "--track-ids",
            "1,3",
        ])
        .unwrap();
        let Command::Export {
            tuning, subjects, ..
        } = cli.command
        else {
            panic!("expected export");
        };
        assert_eq!(tuning.aspect_ratio.as_deref(), Some("9:16"));
        assert!(tuning.adaptive_crop);
        assert_eq!(subjects.track_ids, Some(vec![1, 3]));
    }

    #[test]
    fn test_flags_override_defaults() {
        let mut args = tuning();
        args.margin_factor = Some(2.0);
        args.smoothing = Some("rolling".into());
        args.size_policy = Some("fixed_median".into());
        let config = build_config(&args).unwrap();
        assert_eq!(config.margin_factor, 2.0);
        assert_eq!(config.smoothing_strategy, SmoothingKind::Rolling);
        assert_eq!(config.size_policy, SizePolicy::FixedMedian);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"aspect_ratio": "1:1", "margin_factor": 3.0}"#).unwrap();

        let mut args = tuning();
        args.config = Some(path);
        args.margin_factor = Some(1.2);
        let config = build_config(&args).unwrap();
        assert_eq!(config.aspect_ratio, "1:1");
        assert_eq!(config.margin_factor, 1.2);
    }

    #[test]
    fn test_invalid_flag_values_rejected() {
        let mut args = tuning();
        args.smoothing = Some("gaussian".into());
        assert!(build_config(&args).is_err());

        let mut args = tuning();
        args.margin_factor = Some(0.0);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_track_ids_require_multi_subject() {
        let cli = Cli::try_parse_from(["reframe", "analyze", "Cargo.toml", "--track-ids", "2"]).unwrap();
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("--multi-subject"));
    }

    #[test]
    fn test_is_video() {
        assert!(is_video(Path::new("clip.MP4")));
        assert!(is_video(Path::new("clip.mov")));
        assert!(!is_video(Path::new("coords.csv")));
    }
}
