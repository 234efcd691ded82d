use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{persist, BoundingBox, FaceEmbedder, TemplateStore};
use facematch_models::{FaceNetEmbedder, ScrfdDetector, FACENET_EMBEDDING_DIM};
use serde::Serialize;
use std::path::PathBuf;

mod capture;
mod config;
mod detect;
mod engine;

use config::Config;

#[derive(Parser)]
#[command(name = "facematch", about = "Face enrollment and recognition")]
struct Cli {
    /// Embeddings file (overrides FACEMATCH_EMBEDDINGS_PATH)
    #[arg(long, global = true)]
    embeddings: Option<PathBuf>,

    /// Directory with the ONNX models (overrides FACEMATCH_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save face crops of one person from a sequence of frames
    Capture {
        /// Identity name; crops go to <dataset>/<name>/
        #[arg(short, long)]
        name: String,
        /// Number of faces to save
        #[arg(long)]
        max: Option<usize>,
        /// Dataset root directory
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Frame images, processed in order
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Print every face box the detector finds, without recognition
    Detect {
        /// Print one JSON object per frame
        #[arg(long)]
        json: bool,
        /// Frame images, processed in order
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Extract embeddings for every identity in the dataset and save them
    Enroll {
        /// Dataset root directory
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Label the faces in each frame against the enrolled identities
    Recognize {
        /// Maximum Euclidean distance for a positive identification
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Print one JSON object per face
        #[arg(long)]
        json: bool,
        /// Frame images, processed in order
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// List enrolled identities
    Identities,
}

/// One recognized face, as printed with `--json`.
#[derive(Serialize)]
struct FaceRecord<'a> {
    frame: String,
    region: BoundingBox,
    label: &'a str,
    distance: f32,
    nearest: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.embeddings {
        config.embeddings_path = path;
    }
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Capture {
            name,
            max,
            dataset,
            frames,
        } => {
            let detector = load_detector(&config)?;
            let engine =
                engine::spawn_engine::<_, FaceNetEmbedder>(Some(detector), None, TemplateStore::default())?;

            let settings = capture::CaptureSettings {
                identity: name,
                dataset_dir: dataset.unwrap_or(config.dataset_dir),
                max_faces: max.unwrap_or(config.max_capture),
                crop_size: config.crop_size,
            };
            let saved = capture::capture_faces(&engine, &frames, &settings).await?;
            println!(
                "Saved {saved} face(s) to {}",
                settings.dataset_dir.join(&settings.identity).display()
            );
        }
        Commands::Detect { json, frames } => {
            let detector = load_detector(&config)?;
            let engine =
                engine::spawn_engine::<_, FaceNetEmbedder>(Some(detector), None, TemplateStore::default())?;

            for detections in detect::detect_frames(&engine, &frames).await {
                if json {
                    println!("{}", serde_json::to_string(&detections)?);
                } else if detections.boxes.is_empty() {
                    println!("{}	no faces", detections.frame.display());
                } else {
                    for line in detections.to_lines() {
                        println!("{line}");
                    }
                }
            }
        }
        Commands::Enroll { dataset } => {
            let dataset_dir = dataset.unwrap_or(config.dataset_dir.clone());
            let embedder = load_embedder(&config)?;
            let engine =
                engine::spawn_engine::<ScrfdDetector, _>(None, Some(embedder), TemplateStore::default())?;

            let enrollment = engine.enroll(&dataset_dir).await?;
            for (name, samples) in enrollment.data.iter() {
                println!("→ extracted {} embeddings for \"{name}\"", samples.len());
            }
            if !enrollment.failures.is_empty() {
                println!("{} image(s) skipped, see log for details", enrollment.failures.len());
            }
            let store = engine.templates();
            println!("{} identity template(s) ready", store.len());
            for err in store.excluded() {
                println!("  excluded: {err}");
            }

            persist::save_file(&config.embeddings_path, &enrollment.data)?;
            println!("Embeddings saved to {}", config.embeddings_path.display());
        }
        Commands::Recognize {
            threshold,
            json,
            frames,
        } => {
            let threshold = config::validate_threshold(threshold.unwrap_or(config.threshold))?;
            let data = persist::load_file(&config.embeddings_path)?;
            let embedder = load_embedder(&config)?;
            let store = TemplateStore::build_with_dim(&data, embedder.output_dim());
            tracing::info!(
                identities = ?store.templates().keys().collect::<Vec<_>>(),
                threshold,
                "templates loaded"
            );
            if store.is_empty() {
                tracing::warn!("no usable templates; every face will be reported as unknown");
            }

            let engine = engine::spawn_engine(Some(load_detector(&config)?), Some(embedder), store)?;
            run_recognition(&engine, &frames, threshold, json).await?;
        }
        Commands::Identities => {
            let data = persist::load_file(&config.embeddings_path)?;
            let store = TemplateStore::build_with_dim(&data, Some(FACENET_EMBEDDING_DIM));
            if data.is_empty() {
                println!("No identities enrolled");
            }
            for (name, samples) in data.iter() {
                match store.get(name) {
                    Some(template) => println!(
                        "{name}: {} sample(s), template dim {}",
                        samples.len(),
                        template.dim()
                    ),
                    None => println!("{name}: {} sample(s), no template", samples.len()),
                }
            }
            for err in store.excluded() {
                println!("  excluded: {err}");
            }
        }
    }

    Ok(())
}

/// Recognize frames in order until done or interrupted.
async fn run_recognition(
    engine: &engine::EngineHandle,
    frames: &[PathBuf],
    threshold: f32,
    json: bool,
) -> Result<()> {
    for path in frames {
        let frame = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "unreadable frame skipped");
                continue;
            }
        };

        let faces = tokio::select! {
            faces = engine.recognize(frame, threshold) => faces?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; stopping recognition");
                break;
            }
        };

        for face in &faces {
            let result = &face.result;
            if json {
                let record = FaceRecord {
                    frame: path.display().to_string(),
                    region: face.region,
                    label: result.label(),
                    distance: result.distance,
                    nearest: result.nearest.as_deref(),
                };
                println!("{}", serde_json::to_string(&record)?);
            } else {
                let r = &face.region;
                println!(
                    "{}\t[{},{},{},{}]\t{} ({:.2})",
                    path.display(),
                    r.x1,
                    r.y1,
                    r.x2,
                    r.y2,
                    result.label(),
                    result.distance
                );
            }
        }
    }

    Ok(())
}

fn load_detector(config: &Config) -> Result<ScrfdDetector> {
    let path = config.detector_model_path();
    ScrfdDetector::load(&path).with_context(|| format!("loading detection model {path}"))
}

fn load_embedder(config: &Config) -> Result<FaceNetEmbedder> {
    let path = config.embedder_model_path();
    FaceNetEmbedder::load(&path).with_context(|| format!("loading embedding model {path}"))
}
