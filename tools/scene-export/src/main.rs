//! scene-export - scene mesh optimization tool
//!
//! Imports glTF/GLB/OBJ scenes, optimizes their meshes (vertex deduplication,
//! sub mesh partitioning, skin weight compaction) and writes `.optmesh` files.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scene_export::{MESH_EXTENSION, OptimizedMeshFile, SceneManifest, inspect};

#[derive(Parser)]
#[command(name = "scene-export")]
#[command(about = "Scene mesh optimization tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the meshes of a scene and write .optmesh files
    Optimize {
        /// Input scene file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Path to scene.toml manifest (default: every mesh in one group)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the scene tree and what optimization would produce
    Inspect {
        /// Input scene file (glTF/GLB/OBJ) or .optmesh file
        input: PathBuf,

        /// Path to scene.toml manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Validate manifest without optimizing
    Check {
        /// Path to scene.toml manifest
        #[arg(default_value = "scene.toml")]
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            input,
            manifest,
            output,
        } => {
            tracing::info!("Optimizing {:?}", input);
            let export = scene_export::export_file(&input, manifest.as_deref(), output.as_deref())?;
            if !export.report.is_clean() {
                bail!(
                    "{} of {} meshes failed to optimize",
                    export.report.failed.len(),
                    export.report.failed.len() + export.report.optimized.len()
                );
            }
            tracing::info!("Done! Wrote {} mesh files", export.files.len());
        }

        Commands::Inspect { input, manifest } => {
            let is_mesh_file = input
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(MESH_EXTENSION));

            if is_mesh_file {
                let bytes = std::fs::read(&input)
                    .with_context(|| format!("Failed to read mesh file: {:?}", input))?;
                let mesh = OptimizedMeshFile::from_bytes(&bytes)
                    .with_context(|| format!("Invalid mesh file: {:?}", input))?;
                print!("{}", inspect::mesh_file_summary(&mesh));
            } else {
                let (graph, report) = scene_export::optimize_file(&input, manifest.as_deref())?;
                print!("{}", inspect::scene_tree(&graph));
                print!("{}", inspect::report_summary(&report));
            }
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = SceneManifest::load(&manifest)?;
            tracing::info!(
                "Manifest is valid! {} mesh groups",
                config.mesh_groups.len()
            );
        }
    }

    Ok(())
}
