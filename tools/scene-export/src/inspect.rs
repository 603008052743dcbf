//! Human readable summaries for the `inspect` command

use std::fmt::Write;

use scene_processing::{GraphObject, MeshGeometry, NodeIndex, OptimizeReport, SceneGraph};

use crate::formats::OptimizedMeshFile;
use crate::packing::{format_name, vertex_stride_packed};

fn describe(content: Option<&GraphObject>) -> String {
    match content {
        None => String::new(),
        Some(GraphObject::Mesh(mesh)) => format!(
            " [mesh: {} vertices, {} faces, {} control points]",
            mesh.vertex_count(),
            mesh.face_count(),
            mesh.used_control_point_count()
        ),
        Some(GraphObject::Channel(channel)) => format!(
            " [{} set {}: {} values]",
            channel.values.kind_name(),
            channel.set_index,
            channel.len()
        ),
        Some(GraphObject::SkinWeights(skin)) => format!(
            " [skin weights: {} vertices, {} bones]",
            skin.vertex_count(),
            skin.bone_count()
        ),
        Some(GraphObject::BlendShape(shape)) => {
            format!(" [blend shape: {} vertices]", shape.vertex_count())
        }
        Some(object) => format!(" [{}]", object.type_name()),
    }
}

fn write_node(out: &mut String, graph: &SceneGraph, node: NodeIndex, depth: usize) {
    let name = graph.node_name(node).unwrap_or_default();
    let _ = writeln!(
        out,
        "{:indent$}{}{}",
        "",
        name,
        describe(graph.content(node)),
        indent = depth * 2
    );
    for &child in graph.children(node) {
        write_node(out, graph, child, depth + 1);
    }
}

/// Indented node tree, one line per node below the root
pub fn scene_tree(graph: &SceneGraph) -> String {
    let mut out = String::new();
    for &child in graph.children(graph.root()) {
        write_node(&mut out, graph, child, 0);
    }
    out
}

pub fn report_summary(report: &OptimizeReport) -> String {
    let mut out = String::new();
    for node in &report.optimized {
        let _ = writeln!(
            out,
            "optimized {} -> {} (group {}): {} vertices, {} faces, {} sub meshes",
            node.source, node.optimized, node.group, node.vertex_count, node.face_count, node.sub_mesh_count
        );
    }
    for node in &report.skipped {
        let _ = writeln!(
            out,
            "skipped {} (group {}): {} already exists",
            node.source, node.group, node.existing
        );
    }
    for node in &report.failed {
        let _ = writeln!(out, "failed {} (group {}): {}", node.source, node.group, node.error);
    }
    out
}

pub fn mesh_file_summary(mesh: &OptimizedMeshFile) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} vertices, {} indices, format {} (stride {})",
        mesh.vertex_count,
        mesh.indices.len(),
        format_name(mesh.format),
        vertex_stride_packed(mesh.format)
    );
    for (i, sub_mesh) in mesh.sub_meshes.iter().enumerate() {
        let _ = writeln!(
            out,
            "sub mesh {}: material {}, vertices {}..{}, indices {}..{}",
            i,
            sub_mesh.material_id,
            sub_mesh.first_vertex,
            sub_mesh.first_vertex + sub_mesh.vertex_count,
            sub_mesh.first_index,
            sub_mesh.first_index + sub_mesh.index_count
        );
    }
    for shape in &mesh.blend_shapes {
        let _ = writeln!(out, "blend shape {}: {} positions", shape.name, shape.positions.len());
    }
    if !mesh.bone_names.is_empty() {
        let _ = writeln!(out, "bones: {}", mesh.bone_names.join(", "));
    }
    out
}
