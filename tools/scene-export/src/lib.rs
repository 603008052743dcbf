//! scene-export library
//!
//! Imports glTF/GLB/OBJ scenes into the scene model, runs the mesh optimizer
//! over the mesh groups of a `scene.toml` manifest and writes the optimized
//! meshes as GPU-ready `.optmesh` files.

pub mod export;
pub mod formats;
pub mod import;
pub mod inspect;
pub mod manifest;
pub mod packing;

use std::path::{Path, PathBuf};

use anyhow::Result;
use scene_processing::{OptimizeReport, SceneGraph, optimize_scene};

pub use export::{ExportedMesh, MESH_EXTENSION, export_optimized_meshes, pack_optimized_mesh};
pub use formats::{OptimizedMeshFile, write_optimized_mesh};
pub use import::import_scene;
pub use manifest::SceneManifest;

/// Result of running the pipeline on one scene file
#[derive(Debug)]
pub struct SceneExport {
    pub graph: SceneGraph,
    pub report: OptimizeReport,
    pub files: Vec<ExportedMesh>,
}

fn load_manifest(manifest: Option<&Path>) -> Result<SceneManifest> {
    match manifest {
        Some(path) => SceneManifest::load(path),
        None => Ok(SceneManifest::default()),
    }
}

/// Import a scene and optimize its meshes without writing anything
pub fn optimize_file(input: &Path, manifest: Option<&Path>) -> Result<(SceneGraph, OptimizeReport)> {
    let manifest = load_manifest(manifest)?;
    let mut graph = import_scene(input)?;
    let groups = manifest.mesh_groups_for(&graph);
    let report = optimize_scene(&mut graph, &groups);
    Ok((graph, report))
}

/// Import, optimize and write every optimized mesh of a scene.
///
/// `output` overrides the manifest's output directory; without either the
/// files land next to the input.
pub fn export_file(input: &Path, manifest: Option<&Path>, output: Option<&Path>) -> Result<SceneExport> {
    let config = load_manifest(manifest)?;
    let output_dir: PathBuf = match (output, &config.output_dir) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) => match manifest.and_then(Path::parent) {
            Some(base) => base.join(dir),
            None => dir.clone(),
        },
        (None, None) => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let mut graph = import_scene(input)?;
    let groups = config.mesh_groups_for(&graph);
    let report = optimize_scene(&mut graph, &groups);
    let files = export_optimized_meshes(&graph, &report, &output_dir)?;

    Ok(SceneExport {
        graph,
        report,
        files,
    })
}
