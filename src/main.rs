use std::path::{Path, PathBuf};

use clap::Parser;

mod aligner;
mod config;
mod datatypes;
mod error;
mod mesh;
mod mesher;
mod pairs;
mod post_processor;

use aligner::{AlignmentReport, AlignmentStrategy, Plane, DEFAULT_OFFSET};
use config::RunConfig;
use datatypes::Axis;
use error::{LemError, LemResult};

/// Builds lattice nodes and fracture pairs from a GMSH mesh
#[derive(Parser, Debug)]
#[command(name = "lem-gmsh", version, about)]
struct Cli {
    /// Path to the .msh file
    mesh_file: PathBuf,

    /// Run configuration (json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plane alignment strategy
    #[arg(long, value_parser = ["symmetric", "global-span"])]
    strategy: Option<String>,

    /// Axis along which paired nodes are separated
    #[arg(long, value_parser = ["x", "y", "z"])]
    axis: Option<String>,

    /// Half-gap of the symmetric strategy
    #[arg(long)]
    offset: Option<f64>,

    /// Also align weak-plane pairs
    #[arg(long)]
    align_weak_planes: bool,

    /// Log every rejected line and keyword search
    #[arg(short, long)]
    verbose: bool,
}

/// Merges the config file (if any) with command-line overrides
fn resolve_config(cli: &Cli) -> LemResult<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RunConfig::default(),
    };

    if let Some(name) = &cli.strategy {
        let offset = cli.offset.unwrap_or(DEFAULT_OFFSET);
        config.alignment.strategy = AlignmentStrategy::from_name(name, offset).ok_or_else(|| LemError::Config {
            reason: format!("unknown alignment strategy {name:?}"),
        })?;
    } else if let Some(offset) = cli.offset {
        config.alignment.strategy = config.alignment.strategy.with_offset(offset);
    }
    config.alignment.strategy.validate()?;

    if let Some(axis) = &cli.axis {
        config.alignment.axis = Axis::parse(axis).ok_or_else(|| LemError::Config {
            reason: format!("unknown alignment axis {axis:?}"),
        })?;
    }
    if cli.align_weak_planes {
        config.alignment.weak_planes = true;
    }

    Ok(config)
}

fn log_report(plane: &str, report: &AlignmentReport) {
    if report.is_complete() {
        tracing::info!("aligned {} {plane} pairs", report.aligned);
    } else if let Some(err) = &report.failure {
        tracing::warn!(
            "{plane} alignment incomplete after {} pairs: {err}",
            report.aligned
        );
    }
}

/// Reads the mesh, writes the pair files, aligns and writes the nodes
///
/// # Arguments
/// * `mesh_file` - The path to the mesh file
/// * `config` - Resolved run configuration
///
/// # Returns
/// The alignment report for the fracture pairs
fn run(mesh_file: &Path, config: &RunConfig) -> LemResult<AlignmentReport> {
    let mut mesh = mesher::read_msh_file(mesh_file, &config.parser)?;
    for group in mesh.physical_names() {
        tracing::debug!(
            "physical group {} (dimension {}): {}",
            group.surface_id,
            group.dimension,
            group.name
        );
    }

    post_processor::write_pairs(&mesh.fracture_pairs, &config.output.fracture_pairs)?;
    if !mesh.weak_plane_pairs.is_empty() {
        post_processor::write_pairs(&mesh.weak_plane_pairs, &config.output.weak_plane_pairs)?;
    }

    let alignment = &config.alignment;
    let report = aligner::align_plane(&mut mesh, Plane::Fracture, alignment.strategy, alignment.axis);
    log_report("fracture", &report);

    if alignment.weak_planes {
        let weak = aligner::align_plane(&mut mesh, Plane::WeakPlane, alignment.strategy, alignment.axis);
        log_report("weak plane", &weak);
    }

    post_processor::write_nodes(&mesh, &config.output.nodes)?;

    if !mesh.diagnostics.is_empty() {
        tracing::warn!(
            "{} recoverable problems in {} (rerun with --verbose for details)",
            mesh.diagnostics.len(),
            mesh_file.display()
        );
    }

    Ok(report)
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = resolve_config(&cli).and_then(|config| run(&cli.mesh_file, &config));

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
