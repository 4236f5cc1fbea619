use std::collections::HashMap;
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use warpdrop_core::{
    EngineConfig, FeatureExtractor, FrameAudioData, FrameTrace, MeshCache, PassKind, Preset,
    PresetDescription, RecordingBackend, RenderBackend, RenderContext, RenderError,
};

fn main() -> warpdrop_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            preset,
            config,
            audio,
            frames,
            width,
            height,
            fps,
        } => run_render(&preset, config.as_deref(), audio.as_deref(), frames, (width, height), fps),
        Commands::InspectMesh {
            width,
            height,
            aspect_x,
            aspect_y,
            vertices,
        } => run_inspect_mesh(width, height, aspect_x, aspect_y, vertices),
    }
}

#[derive(Debug, Serialize)]
struct PassCount {
    pass: PassKind,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RenderSummary {
    preset: String,
    backend: &'static str,
    frames: u64,
    width: u32,
    height: u32,
    substituted_shaders: usize,
    passes: Vec<PassCount>,
    last_frame: FrameTrace,
}

fn run_render(
    preset_path: &Path,
    config_path: Option<&Path>,
    audio_path: Option<&Path>,
    frames: u32,
    (width, height): (u32, u32),
    fps: f32,
) -> warpdrop_core::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let description = PresetDescription::load(preset_path)?;
    tracing::info!(preset = %description.name, frames, width, height, "rendering headless");

    let recorded = match audio_path {
        Some(path) => Some(load_audio(path)?),
        None => None,
    };

    let context = RenderContext::new(width, height);
    let mut preset = Preset::load(RecordingBackend::new(), &description, config)?;
    preset.initialize(&context)?;

    let mut synth = SyntheticAudio::new(fps);
    let mut counts: Vec<PassCount> = Vec::new();
    let mut positions: HashMap<PassKind, usize> = HashMap::new();

    for frame in 0..frames {
        match &recorded {
            Some(snapshots) if !snapshots.is_empty() => {
                let audio = &snapshots[frame as usize % snapshots.len()];
                preset.render_frame(audio, &context)?;
            }
            _ => {
                let audio = synth.next_frame(frame)?;
                preset.render_frame(audio, &context)?;
            }
        }

        for pass in preset.backend_mut().take_trace() {
            let index = *positions.entry(pass).or_insert_with(|| {
                counts.push(PassCount { pass, count: 0 });
                counts.len() - 1
            });
            counts[index].count += 1;
        }
    }

    let summary = RenderSummary {
        preset: preset.name().to_string(),
        backend: preset.backend().name(),
        frames: preset.frame_count(),
        width,
        height,
        substituted_shaders: preset.last_trace().substituted_shaders,
        passes: counts,
        last_frame: preset.last_trace().clone(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn load_audio(path: &Path) -> warpdrop_core::Result<Vec<FrameAudioData>> {
    let text = std::fs::read_to_string(path)?;
    let snapshots: Vec<FrameAudioData> = serde_json::from_str(&text)?;
    tracing::debug!(?path, snapshots = snapshots.len(), "loaded audio snapshots");
    Ok(snapshots)
}

/// Kick drum, bass line and hi-hat noise rendered into one block per frame.
struct SyntheticAudio {
    extractor: FeatureExtractor,
    fps: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    noise: u32,
}

impl SyntheticAudio {
    fn new(fps: f32) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            fps,
            left: Vec::new(),
            right: Vec::new(),
            noise: 0x1234_5678,
        }
    }

    fn next_frame(&mut self, frame: u32) -> warpdrop_core::Result<&FrameAudioData> {
        if self.fps <= 0.0 {
            return Err(RenderError::msg("fps must be positive"));
        }
        let rate = self.extractor.sample_rate() as f32;
        let block = (rate / self.fps).round().max(2.0) as usize;
        let start = frame as f32 / self.fps;

        self.left.clear();
        self.right.clear();
        for i in 0..block {
            let t = start + i as f32 / rate;
            let beat = t * 2.0 % 1.0;
            let kick = (TAU * 55.0 * t).sin() * (-beat * 12.0).exp();
            let bass = 0.3 * (TAU * 110.0 * t).sin();
            self.noise ^= self.noise << 13;
            self.noise ^= self.noise >> 17;
            self.noise ^= self.noise << 5;
            let gate = if t * 8.0 % 1.0 < 0.1 { 0.2 } else { 0.0 };
            let hat = (self.noise as f32 / u32::MAX as f32 - 0.5) * gate;
            self.left.push(kick + bass + hat);
            self.right.push(kick + bass * 0.8 - hat);
        }

        self.extractor
            .process_block(&self.left, &self.right, start, self.fps)
    }
}

#[derive(Debug, Serialize)]
struct MeshSummary {
    width: u32,
    height: u32,
    aspect_x: f32,
    aspect_y: f32,
    vertex_count: usize,
    triangle_count: usize,
    max_radius: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertices: Option<Vec<[f32; 6]>>,
}

fn run_inspect_mesh(
    width: u32,
    height: u32,
    aspect_x: f32,
    aspect_y: f32,
    with_vertices: bool,
) -> warpdrop_core::Result<()> {
    let mut cache = MeshCache::new(width, height)?;
    let mesh = cache.get(aspect_x, aspect_y);

    let summary = MeshSummary {
        width,
        height,
        aspect_x,
        aspect_y,
        vertex_count: mesh.vertices().len(),
        triangle_count: mesh.indices().len() / 3,
        max_radius: mesh.vertices().iter().map(|v| v.radius).fold(0.0, f32::max),
        vertices: with_vertices.then(|| {
            mesh.vertices()
                .iter()
                .map(|v| [v.x, v.y, v.u, v.v, v.radius, v.angle])
                .collect()
        }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive preset renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a preset headlessly and print a summary of the issued passes.
    Render {
        /// Preset description in JSON form.
        preset: PathBuf,
        /// Engine configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON array of audio snapshots to play instead of the built-in
        /// synthetic track. Loops when shorter than `--frames`.
        #[arg(short, long)]
        audio: Option<PathBuf>,
        #[arg(short, long, default_value_t = 300)]
        frames: u32,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
    },
    /// Print the geometry of a warp mesh.
    InspectMesh {
        #[arg(long, default_value_t = 48)]
        width: u32,
        #[arg(long, default_value_t = 36)]
        height: u32,
        #[arg(long, default_value_t = 1.0)]
        aspect_x: f32,
        #[arg(long, default_value_t = 1.0)]
        aspect_y: f32,
        /// Include every vertex as `[x, y, u, v, radius, angle]`.
        #[arg(long)]
        vertices: bool,
    },
}
