use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use emotive_core::{
    ChoreographyEngine, CulturePack, Definition, EngineConfig, HeadlessRenderer, MorphOptions,
    Renderer,
};
use tracing_subscriber::EnvFilter;

fn main() -> emotive_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Validate { pack } => run_validate(&pack),
        Commands::Catalog => run_catalog(),
    }
}

fn run(args: RunArgs) -> emotive_core::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut engine = ChoreographyEngine::new(config)?;
    if let Some(path) = &args.pack {
        let summary = engine.load_pack(&CulturePack::load(path)?)?;
        tracing::info!(?path, ?summary, "pack loaded");
    }

    engine.set_bpm(args.bpm)?;
    engine.set_emotion(&args.emotion, args.undertone.as_deref(), None)?;
    for gesture in &args.gesture {
        let outcome = engine.trigger_gesture(gesture)?;
        tracing::info!(gesture = %gesture, ?outcome, "gesture requested");
    }
    if let Some(shape) = &args.morph {
        let outcome = engine.morph_to(shape, MorphOptions::default())?;
        tracing::info!(shape = %shape, ?outcome, "morph requested");
    }

    let fps = args.fps.max(1);
    let dt_ms = 1000.0 / fps as f32;
    let frames = (args.seconds.max(0.0) * fps as f32).round() as u64;
    tracing::info!(
        emotion = %args.emotion,
        bpm = args.bpm,
        fps,
        frames,
        "running headless"
    );

    let mut renderer = HeadlessRenderer::new();
    for frame in 1..=frames {
        let snapshot = engine.tick(dt_ms);
        renderer.draw(&snapshot)?;
        if frame % u64::from(fps) == 0 {
            let state = engine.state();
            tracing::info!(
                second = frame / u64::from(fps),
                beat = state.beat,
                particles = state.pool.active,
                skipped = state.spawn_skipped,
                gestures = state.active_gestures.len(),
                shape = %state.shape,
                "tick"
            );
        }
    }

    let state = engine.state();
    println!("{}", serde_json::to_string_pretty(&state)?);
    tracing::info!(
        frames = renderer.frames(),
        peak_particles = renderer.peak_particles(),
        diagnostics = engine.diagnostics().len(),
        "run complete"
    );

    if let Some(path) = &args.dump {
        if let Some(snapshot) = renderer.last() {
            std::fs::write(path, snapshot.to_json()?)?;
            tracing::info!(?path, "final snapshot written");
        }
    }
    Ok(())
}

fn run_validate(pack: &Path) -> emotive_core::Result<()> {
    let summary = CulturePack::load(pack)?.validate()?;
    tracing::info!(?pack, "pack is valid");
    println!(
        "emotions: {}, undertones: {}, gestures: {}, shapes: {}",
        summary.emotions, summary.undertones, summary.gestures, summary.shapes
    );
    Ok(())
}

fn run_catalog() -> emotive_core::Result<()> {
    let engine = ChoreographyEngine::new(EngineConfig::default())?;
    let emotions = engine.emotions();
    println!("emotions:   {}", emotions.emotions().ids().join(", "));
    println!("undertones: {}", emotions.undertones().ids().join(", "));
    println!("gestures:   {}", engine.gestures().registry().ids().join(", "));
    let shapes: Vec<String> = engine
        .morpher()
        .shapes()
        .iter()
        .map(|shape| {
            if shape.is_special() {
                format!("{} ({:?})", shape.id(), shape.curve())
            } else {
                shape.id().to_string()
            }
        })
        .collect();
    println!("shapes:     {}", shapes.join(", "));
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless host for the emotive choreography engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the engine for a while and print its final state.
    Run(RunArgs),
    /// Check a culture pack without running anything.
    Validate {
        /// Path to the culture pack JSON document.
        pack: PathBuf,
    },
    /// List the built-in emotions, undertones, gestures and shapes.
    Catalog,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Emotion to express.
    #[arg(short, long, default_value = "neutral")]
    emotion: String,
    #[arg(short, long)]
    undertone: Option<String>,
    #[arg(short, long, default_value_t = 120.0)]
    bpm: f32,
    /// Simulated run length.
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f32,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Gestures to request at start. Repeatable.
    #[arg(short, long)]
    gesture: Vec<String>,
    /// Shape to morph into at start.
    #[arg(short, long)]
    morph: Option<String>,
    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Culture pack JSON to load before running.
    #[arg(long)]
    pack: Option<PathBuf>,
    /// Write the final render snapshot here as JSON.
    #[arg(long)]
    dump: Option<PathBuf>,
}
