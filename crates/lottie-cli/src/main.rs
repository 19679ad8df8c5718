//! # lottie-inspect
//!
//! Loads a Lottie file and prints its header, layer tree, assets and warnings.
//! With `--layer` it also samples that layer's transform at `--frame`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lottie_loader::lottie_core::{Composition, Layer, LayerKind};
use lottie_loader::{load_sync, FileSource, Loader};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lottie-inspect")]
#[command(about = "Parse a Lottie animation and summarize it")]
#[command(version)]
struct Cli {
    /// Path to the Lottie JSON file
    file: PathBuf,

    /// Device density scale applied at parse time
    #[arg(short, long, default_value_t = 1.0)]
    scale: f32,

    /// Frame at which to sample `--layer`
    #[arg(short, long, default_value_t = 0.0)]
    frame: f32,

    /// Id of a top-level layer to sample
    #[arg(short, long)]
    layer: Option<i64>,

    /// Load on the background loader instead of the main thread
    #[arg(long = "async")]
    background: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "lottie_inspect=debug,lottie_core=debug,lottie_loader=debug"
    } else {
        "lottie_inspect=info,lottie_core=info,lottie_loader=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
    tracing::debug!("Inspecting {} at scale {}", cli.file.display(), cli.scale);

    let source = FileSource::new(&cli.file);
    let composition = if cli.background {
        load_in_background(source, cli.scale)?
    } else {
        Arc::new(
            load_sync(&source, cli.scale)
                .with_context(|| format!("Failed to load {}", cli.file.display()))?,
        )
    };

    print_summary(&composition);

    if let Some(id) = cli.layer {
        let layer = composition
            .layer_by_id(id)
            .with_context(|| format!("No top-level layer with id {id}"))?;
        print_sample(&composition, layer, cli.frame);
    }
    Ok(())
}

fn load_in_background(source: FileSource, scale: f32) -> Result<Arc<Composition>> {
    let loader = Loader::new().context("Failed to start loader")?;
    let (tx, rx) = std::sync::mpsc::channel();
    let path = source.path().to_path_buf();
    tracing::info!("Loading {} on {} workers", path.display(), loader.threads());
    loader.load_async(source, scale, move |outcome| {
        let _ = tx.send(outcome);
    });
    match rx.recv() {
        Ok(outcome) => outcome.with_context(|| format!("Failed to load {}", path.display())),
        Err(_) => bail!("Loader stopped without delivering {}", path.display()),
    }
}

fn print_summary(comp: &Composition) {
    println!(
        "Bodymovin {}  {}x{}  frames {}..{} @ {} fps  ({:.0} ms)",
        comp.version(),
        comp.bounds().width(),
        comp.bounds().height(),
        comp.start_frame(),
        comp.end_frame(),
        comp.frame_rate(),
        comp.duration_millis()
    );

    println!("Layers ({}):", comp.layers().len());
    for layer in comp.layers() {
        let parent = comp
            .layer_list()
            .parent_of(layer)
            .map(|p| format!(" <- {}", p.id))
            .unwrap_or_default();
        println!(
            "  [{:>3}] {:<10} {}{}",
            layer.id,
            format!("{:?}", layer.layer_type()),
            layer.name,
            parent
        );
    }

    let mut precomps: Vec<_> = comp.precomps().iter().collect();
    precomps.sort_by(|a, b| a.0.cmp(b.0));
    for (name, layers) in precomps {
        println!("Precomp {name}: {} layers", layers.len());
    }
    for image in comp.images().values() {
        println!(
            "Image {}: {} ({}x{}{})",
            image.id,
            if image.embedded { "<embedded>".to_string() } else { image.path() },
            image.width,
            image.height,
            if image.embedded { ", embedded" } else { "" }
        );
    }
    if !comp.fonts().is_empty() {
        println!(
            "Fonts: {}, glyphs: {}",
            comp.fonts().len(),
            comp.characters().len()
        );
    }
    for marker in comp.markers() {
        println!(
            "Marker {}: {}..{}",
            marker.name,
            marker.start_frame,
            marker.end_frame()
        );
    }

    let warnings = comp.warnings();
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }
}

fn print_sample(comp: &Composition, layer: &Layer, frame: f32) {
    let transform = &layer.transform;
    println!("Layer {} `{}` at frame {frame}:", layer.id, layer.name);
    println!("  visible:  {}", layer.is_visible_at(frame));
    println!("  position: {}", transform.position_at(frame));
    println!("  scale:    {}", transform.scale.value_at(frame));
    println!("  rotation: {}", transform.rotation.value_at(frame));
    println!("  opacity:  {}", transform.opacity_at(frame));
    let origin = comp
        .layer_list()
        .to_composition_space(layer, Default::default(), frame);
    println!("  origin in composition: {origin}");

    match &layer.kind {
        LayerKind::Shape { shapes } => println!("  shapes:   {}", shapes.len()),
        LayerKind::Text { document } => println!("  text:     {:?}", document.value_at(frame).t),
        LayerKind::PrecompReference { ref_id, .. } | LayerKind::Image { ref_id } => {
            println!("  refId:    {ref_id}")
        }
        _ => {}
    }
}
