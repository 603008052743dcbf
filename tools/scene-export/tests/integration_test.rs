//! Integration tests for scene-export
//!
//! Tests the full pipeline: generate test assets -> optimize -> verify output

mod scene_generator;

use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

use scene_export::packing::{FORMAT_NORMAL, vertex_stride_packed};
use scene_export::{OptimizedMeshFile, export_file, optimize_file};

fn write_asset(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test asset");
    path
}

fn read_mesh_file(path: &Path) -> OptimizedMeshFile {
    let data = std::fs::read(path).expect("Failed to read mesh file");
    OptimizedMeshFile::from_bytes(&data).expect("Invalid mesh file")
}

/// Test that a triangle soup cube is welded to 24 vertices
#[test]
fn test_triangulated_cube_dedup() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_asset(dir.path(), "cube.obj", &scene_generator::obj::triangulated_cube_obj());

    let (_, report) = optimize_file(&obj_path, None).expect("Failed to optimize");
    assert!(report.is_clean());
    assert_eq!(report.optimized.len(), 1);
    assert_eq!(report.optimized[0].vertex_count, 24);
    assert_eq!(report.optimized[0].face_count, 12);
    assert_eq!(report.optimized[0].sub_mesh_count, 1);
}

/// Test that disabling dedup keeps every corner
#[test]
fn test_triangulated_cube_without_dedup() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_asset(dir.path(), "cube.obj", &scene_generator::obj::triangulated_cube_obj());
    let manifest = write_asset(
        dir.path(),
        "scene.toml",
        r#"
        [[mesh_groups]]
        name = "cube"
        nodes = ["cube"]
        optimize_duplicates = false
        "#,
    );

    let (_, report) = optimize_file(&obj_path, Some(&manifest)).expect("Failed to optimize");
    assert_eq!(report.optimized[0].vertex_count, 36);
}

/// Test the written file of a two material cube
#[test]
fn test_export_cube_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_asset(dir.path(), "cube.obj", &scene_generator::obj::cube_obj());

    let export = export_file(&obj_path, None, None).expect("Failed to export");
    assert_eq!(export.files.len(), 1);

    let mesh_path = dir.path().join("cube_optimized.optmesh");
    assert_eq!(export.files[0].path, mesh_path);

    let mesh = read_mesh_file(&mesh_path);
    assert_eq!(mesh.format, FORMAT_NORMAL);
    assert_eq!(mesh.vertex_count, 24);
    assert_eq!(mesh.indices.len(), 36);
    assert_eq!(
        mesh.vertex_data.len(),
        24 * vertex_stride_packed(mesh.format) as usize
    );

    // side faces come first, the top gets its own sub mesh
    assert_eq!(mesh.sub_meshes.len(), 2);
    assert_eq!(mesh.sub_meshes[0].vertex_count, 20);
    assert_eq!(mesh.sub_meshes[0].index_count, 30);
    assert_eq!(mesh.sub_meshes[1].first_vertex, 20);
    assert_eq!(mesh.sub_meshes[1].vertex_count, 4);
    assert_eq!(mesh.sub_meshes[1].first_index, 30);

    // every index stays inside its sub mesh
    for sub_mesh in &mesh.sub_meshes {
        let range = sub_mesh.first_vertex..sub_mesh.first_vertex + sub_mesh.vertex_count;
        let first = sub_mesh.first_index as usize;
        for &index in &mesh.indices[first..first + sub_mesh.index_count as usize] {
            assert!(range.contains(&index), "index {index} outside {range:?}");
        }
    }
}

/// Test that the manifest vertex cap splits the cube
#[test]
fn test_vertex_limit_splits_sub_meshes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_asset(dir.path(), "cube.obj", &scene_generator::obj::triangulated_cube_obj());
    let manifest = write_asset(
        dir.path(),
        "scene.toml",
        r#"
        output_dir = "meshes"

        [[mesh_groups]]
        name = "cube"
        nodes = ["cube"]

        [mesh_groups.limits]
        max_vertices = 8
        "#,
    );

    let export = export_file(&obj_path, Some(&manifest), None).expect("Failed to export");
    let mesh = read_mesh_file(&dir.path().join("meshes").join("cube_optimized.optmesh"));

    assert_eq!(export.report.optimized[0].vertex_count, mesh.vertex_count as usize);
    assert_eq!(mesh.sub_meshes.len(), 3);
    assert!(mesh.sub_meshes.iter().all(|s| s.vertex_count <= 8));
    assert_eq!(mesh.vertex_count, 24);
}

// Helper to run the scene-export binary
fn scene_export(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_scene-export"))
        .args(args)
        .output()
        .expect("Failed to run scene-export")
}

#[test]
fn test_cli_optimize_and_inspect() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_asset(dir.path(), "cube.obj", &scene_generator::obj::cube_obj());
    let out = dir.path().join("out");

    let output = scene_export(&[
        "optimize",
        obj_path.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "scene-export optimize failed");

    let mesh_path = out.join("cube_optimized.optmesh");
    assert!(mesh_path.exists(), "Mesh file should exist");

    let output = scene_export(&["inspect", mesh_path.to_str().unwrap()]);
    assert!(output.status.success(), "scene-export inspect failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("24 vertices, 36 indices"), "unexpected output: {stdout}");

    let output = scene_export(&["inspect", obj_path.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("optimized cube -> cube_optimized"), "unexpected output: {stdout}");
}

#[test]
fn test_cli_check() {
    let dir = tempdir().expect("Failed to create temp dir");
    let valid = write_asset(
        dir.path(),
        "scene.toml",
        "[[mesh_groups]]\nname = \"all\"\nnodes = [\"cube\"]\n",
    );
    let invalid = write_asset(
        dir.path(),
        "bad.toml",
        "[[mesh_groups]]\nname = \"all\"\n[mesh_groups.limits]\nmax_vertices = 1\n",
    );

    assert!(scene_export(&["check", valid.to_str().unwrap()]).status.success());
    assert!(!scene_export(&["check", invalid.to_str().unwrap()]).status.success());
}
