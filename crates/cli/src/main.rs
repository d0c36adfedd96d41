use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};

use facefeat_core::identity::infrastructure::cosine_identity_grouper::CosineIdentityGrouper;
use facefeat_core::loading::domain::frame_loader::FrameLoader;
use facefeat_core::loading::infrastructure::image_loader::ImageLoader;
use facefeat_core::loading::infrastructure::prefetch_loader::{PrefetchLoader, DEFAULT_PREFETCH_DEPTH};
use facefeat_core::loading::infrastructure::video_loader::{VideoLoader, VideoOptions};
use facefeat_core::pipeline::analyze_faces_use_case::AnalyzeFacesUseCase;
use facefeat_core::pipeline::config::{AnalyzerConfig, Device, ModelChoice};
use facefeat_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facefeat_core::pipeline::result_table::ResultTable;
use facefeat_core::prediction::infrastructure::predictor_factory::create_predictors;
use facefeat_core::shared::constants::IMAGE_EXTENSIONS;

/// Face, landmark, pose, action unit, emotion and identity extraction for
/// images and videos.
#[derive(Parser, Debug)]
#[command(name = "facefeat")]
struct Cli {
    /// Input images, or video files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Result table, written as CSV or JSON depending on the extension.
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file with analyzer settings; flags given on the command line win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face and head pose detector (ONNX).
    #[arg(long)]
    face_model: Option<PathBuf>,

    #[arg(long, default_value = "img2pose")]
    face_variant: String,

    #[arg(long)]
    landmark_model: Option<PathBuf>,

    /// mobilefacenet, mobilenet or pfld.
    #[arg(long, default_value = "mobilefacenet")]
    landmark_variant: String,

    #[arg(long)]
    au_model: Option<PathBuf>,

    /// xgb or svm.
    #[arg(long, default_value = "xgb")]
    au_variant: String,

    #[arg(long)]
    emotion_model: Option<PathBuf>,

    /// resmasknet or svm.
    #[arg(long, default_value = "resmasknet")]
    emotion_variant: String,

    #[arg(long)]
    identity_model: Option<PathBuf>,

    #[arg(long, default_value = "facenet")]
    identity_variant: String,

    /// Input kind; guessed from the file extensions when omitted.
    #[arg(long, value_enum)]
    data_type: Option<DataType>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Letterbox every frame to a square of this many pixels.
    #[arg(long)]
    output_size: Option<u32>,

    /// Analyze every Nth video frame (1 = every frame).
    #[arg(long)]
    skip_frames: Option<usize>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Cosine similarity above which two faces share an identity.
    #[arg(long)]
    identity_threshold: Option<f64>,

    /// cpu or accelerator.
    #[arg(long)]
    device: Option<Device>,

    /// Batches decoded ahead on a background thread (0 = decode inline).
    #[arg(long, default_value_t = DEFAULT_PREFETCH_DEPTH)]
    prefetch: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DataType {
    Image,
    Video,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Json,
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
    let format = output_format(&cli.output)?;
    let data_type = match cli.data_type {
        Some(data_type) => data_type,
        None => infer_data_type(&cli.inputs)?,
    };
    let config = build_config(&cli)?;

    let predictors = create_predictors(&config.models, config.device)?;
    let logger = Box::new(StdoutPipelineLogger::default());
    let mut use_case = AnalyzeFacesUseCase::new(config.clone(), predictors, logger)?;

    let table = match data_type {
        DataType::Image => {
            let loader = ImageLoader::new(cli.inputs.clone(), config.batch_size, config.output_size)?;
            let mut loader = with_prefetch(Box::new(loader), cli.prefetch);
            use_case.detect(loader.as_mut())?
        }
        DataType::Video => {
            let options = VideoOptions {
                batch_size: config.batch_size,
                skip_frames: config.skip_frames.unwrap_or(1),
                output_size: config.output_size,
            };
            let mut tables = Vec::with_capacity(cli.inputs.len());
            for input in &cli.inputs {
                let loader = VideoLoader::open(input, options)?;
                let mut loader = with_prefetch(Box::new(loader), cli.prefetch);
                tables.push(use_case.detect(loader.as_mut())?);
            }
            let regroup = tables.len() > 1 && config.models.identity.is_some();
            let mut table = ResultTable::concat(tables);
            if regroup {
                table.assign_identities(&CosineIdentityGrouper::new(config.identity_threshold));
            }
            table
        }
    };

    match format {
        OutputFormat::Csv => table.write_csv(&cli.output)?,
        OutputFormat::Json => table.write_json(&cli.output)?,
    }
    log::info!("Wrote {} rows to {}", table.len(), cli.output.display());
    Ok(())
}

fn with_prefetch(loader: Box<dyn FrameLoader>, depth: usize) -> Box<dyn FrameLoader> {
    if depth == 0 {
        loader
    } else {
        Box::new(PrefetchLoader::new(loader, depth))
    }
}

/// Starts from `--config` (or the defaults) and applies every flag that was
/// given explicitly.
fn build_config(cli: &Cli) -> Result<AnalyzerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_json_file(path)?,
        None => AnalyzerConfig::default(),
    };

    if let Some(v) = cli.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = cli.output_size {
        config.output_size = Some(v);
    }
    if let Some(v) = cli.skip_frames {
        config.skip_frames = Some(v);
    }
    if let Some(v) = cli.confidence {
        config.face_detection_threshold = v;
    }
    if let Some(v) = cli.identity_threshold {
        config.identity_threshold = v;
    }
    if let Some(v) = cli.device {
        config.device = v;
    }

    let models = &mut config.models;
    let overrides = [
        (&mut models.face, &cli.face_model, &cli.face_variant),
        (&mut models.landmark, &cli.landmark_model, &cli.landmark_variant),
        (&mut models.action_unit, &cli.au_model, &cli.au_variant),
        (&mut models.emotion, &cli.emotion_model, &cli.emotion_variant),
        (&mut models.identity, &cli.identity_model, &cli.identity_variant),
    ];
    for (slot, path, variant) in overrides {
        if let Some(path) = path {
            *slot = Some(ModelChoice::new(variant.as_str(), path));
        }
    }

    if config.models.face.is_none() {
        return Err("A face model is required (--face-model or \"face\" in --config)".into());
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if cli.data_type == Some(DataType::Image) && cli.skip_frames.is_some() {
        return Err("--skip-frames only applies to video input".into());
    }
    Ok(())
}

fn output_format(path: &Path) -> Result<OutputFormat, Box<dyn std::error::Error>> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    match ext.as_deref() {
        Some("csv") => Ok(OutputFormat::Csv),
        Some("json") => Ok(OutputFormat::Json),
        _ => Err(format!(
            "Output must end in .csv or .json, got {}",
            path.display()
        )
        .into()),
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn infer_data_type(inputs: &[PathBuf]) -> Result<DataType, Box<dyn std::error::Error>> {
    let images = inputs.iter().filter(|p| is_image(p)).count();
    if images == inputs.len() {
        Ok(DataType::Image)
    } else if images == 0 {
        Ok(DataType::Video)
    } else {
        Err("Inputs mix images and videos; analyze them separately or pass --data-type".into())
    }
}
