//! Optimized mesh export (scene graph -> .optmesh files)

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use scene_processing::{
    GraphObject, MeshData, MeshGeometry, NodeIndex, OptimizeReport, PATH_SEPARATOR, SceneGraph,
    SkinWeightData, VertexChannel,
};

use crate::formats::{BlendShapeTarget, OptimizedMeshFile, write_optimized_mesh};
use crate::packing::{MAX_PACKED_BONES, VertexSource, format_name, pack_vertices, vertex_stride_packed};

/// Output file extension
pub const MESH_EXTENSION: &str = "optmesh";

/// Skin links the packed format keeps per vertex
const PACKED_WEIGHTS_PER_VERTEX: usize = 4;

/// One written mesh file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMesh {
    /// Path of the optimized node
    pub node: String,
    pub path: PathBuf,
    pub vertex_count: u32,
    pub index_count: u32,
    pub format: u8,
}

/// Channels of an optimized mesh picked for packing
#[derive(Default)]
struct PackedChannels<'a> {
    uvs: Option<(u32, &'a [[f32; 2]])>,
    colors: Option<(u32, &'a [[f32; 4]])>,
    tangents: Option<&'a [[f32; 4]]>,
    skin: Option<&'a SkinWeightData>,
    blend_shapes: Vec<BlendShapeTarget>,
}

/// Lowest set index wins
fn keep_lowest_set<T>(slot: &mut Option<(u32, T)>, set_index: u32, values: T) {
    if slot.as_ref().is_none_or(|&(current, _)| set_index < current) {
        *slot = Some((set_index, values));
    }
}

fn collect_channels(graph: &SceneGraph, node: NodeIndex) -> PackedChannels<'_> {
    let mut channels = PackedChannels::default();
    for &child in graph.children(node) {
        match graph.content(child) {
            Some(GraphObject::Channel(channel)) => match &channel.values {
                VertexChannel::Uv(values) => {
                    keep_lowest_set(&mut channels.uvs, channel.set_index, values.as_slice());
                }
                VertexChannel::Color(values) => {
                    keep_lowest_set(&mut channels.colors, channel.set_index, values.as_slice());
                }
                VertexChannel::Tangent(values) => {
                    channels.tangents.get_or_insert(values.as_slice());
                }
                // derived from normal and tangent on the GPU
                VertexChannel::Bitangent(_) => {}
            },
            Some(GraphObject::SkinWeights(skin)) => {
                channels.skin.get_or_insert(skin);
            }
            Some(GraphObject::BlendShape(shape)) => {
                channels.blend_shapes.push(BlendShapeTarget {
                    name: graph.node_name(child).unwrap_or_default().to_string(),
                    positions: shape.positions().to_vec(),
                    normals: shape.normals().to_vec(),
                });
            }
            _ => {}
        }
    }
    channels
}

/// Four strongest links per vertex, renormalized
fn pack_skin(skin: &SkinWeightData, vertex_count: usize) -> Result<(Vec<[u8; 4]>, Vec<[f32; 4]>)> {
    if skin.bone_count() > MAX_PACKED_BONES {
        bail!(
            "Skin references {} bones, the packed format supports at most {}",
            skin.bone_count(),
            MAX_PACKED_BONES
        );
    }

    let mut joints = Vec::with_capacity(vertex_count);
    let mut weights = Vec::with_capacity(vertex_count);
    let mut truncated = 0usize;
    for vertex in 0..vertex_count {
        let mut links = skin.links(vertex).to_vec();
        links.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        if links.len() > PACKED_WEIGHTS_PER_VERTEX {
            truncated += 1;
            links.truncate(PACKED_WEIGHTS_PER_VERTEX);
        }

        let total: f32 = links.iter().map(|link| link.weight).sum();
        let mut packed_joints = [0u8; 4];
        let mut packed_weights = [0.0f32; 4];
        for (slot, link) in links.iter().enumerate() {
            packed_joints[slot] = link.bone_id as u8;
            packed_weights[slot] = if total > 0.0 { link.weight / total } else { 0.0 };
        }
        joints.push(packed_joints);
        weights.push(packed_weights);
    }

    if truncated > 0 {
        tracing::warn!(
            "{} vertices have more than {} skin links, keeping the strongest",
            truncated,
            PACKED_WEIGHTS_PER_VERTEX
        );
    }
    Ok((joints, weights))
}

fn mesh_indices(mesh: &MeshData) -> Vec<u32> {
    mesh.faces()
        .iter()
        .flat_map(|face| face.vertex_index)
        .collect()
}

/// Pack an optimized mesh node and its children into file contents
pub fn pack_optimized_mesh(graph: &SceneGraph, node: NodeIndex) -> Result<OptimizedMeshFile> {
    let Some(GraphObject::Mesh(mesh)) = graph.content(node) else {
        bail!("Node {:?} holds no mesh", graph.node_path(node));
    };
    if mesh.sub_meshes().is_empty() && mesh.face_count() > 0 {
        bail!(
            "Mesh {:?} has no sub mesh table, only optimized meshes can be exported",
            graph.node_path(node)
        );
    }

    let channels = collect_channels(graph, node);
    let vertex_count = mesh.vertex_count();
    let skinning = channels
        .skin
        .map(|skin| pack_skin(skin, vertex_count))
        .transpose()?;

    let source = VertexSource {
        positions: mesh.positions(),
        uvs: channels.uvs.map(|(_, values)| values),
        colors: channels.colors.map(|(_, values)| values),
        normals: mesh.has_normals().then(|| mesh.normals()),
        tangents: channels.tangents,
        skinning: skinning
            .as_ref()
            .map(|(joints, weights)| (joints.as_slice(), weights.as_slice())),
    };

    Ok(OptimizedMeshFile {
        format: source.format(),
        vertex_count: vertex_count as u32,
        vertex_data: pack_vertices(&source),
        indices: mesh_indices(mesh),
        sub_meshes: mesh.sub_meshes().to_vec(),
        blend_shapes: channels.blend_shapes,
        bone_names: channels
            .skin
            .map(|skin| skin.bone_names().to_vec())
            .unwrap_or_default(),
    })
}

/// File name for an optimized node path
pub fn mesh_file_name(node_path: &str) -> String {
    format!(
        "{}.{MESH_EXTENSION}",
        node_path.replace(PATH_SEPARATOR, "_")
    )
}

fn write_mesh_file(path: &Path, mesh: &OptimizedMeshFile) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_optimized_mesh(&mut writer, mesh)?;
    Ok(())
}

/// Write one `.optmesh` file per optimized node of `report` into `output_dir`
pub fn export_optimized_meshes(
    graph: &SceneGraph,
    report: &OptimizeReport,
    output_dir: &Path,
) -> Result<Vec<ExportedMesh>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    report
        .optimized
        .par_iter()
        .map(|optimized| {
            let mesh = pack_optimized_mesh(graph, optimized.node)
                .with_context(|| format!("Failed to pack mesh '{}'", optimized.optimized))?;
            let path = output_dir.join(mesh_file_name(&optimized.optimized));
            write_mesh_file(&path, &mesh)?;

            tracing::info!(
                "Exported '{}' -> {:?}: {} vertices, {} indices, {} sub meshes, format={}, stride={}",
                optimized.optimized,
                path,
                mesh.vertex_count,
                mesh.indices.len(),
                mesh.sub_meshes.len(),
                format_name(mesh.format),
                vertex_stride_packed(mesh.format)
            );
            Ok(ExportedMesh {
                node: optimized.optimized.clone(),
                path,
                vertex_count: mesh.vertex_count,
                index_count: mesh.indices.len() as u32,
                format: mesh.format,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::{FORMAT_NORMAL, FORMAT_SKINNED, FORMAT_UV};
    use scene_processing::{
        SkinLink, VertexChannelData, default_mesh_group, optimize_scene,
    };

    /// Triangle with a uv set and a skinned control point
    fn scene() -> SceneGraph {
        let mut mesh = MeshData::new();
        for (vertex, position) in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            .into_iter()
            .enumerate()
        {
            mesh.add_position(position);
            mesh.add_normal([0.0, 0.0, 1.0]);
            mesh.set_vertex_index_to_control_point_index_map(vertex as u32, vertex as u32);
        }
        mesh.add_face([0, 1, 2], 0);

        let mut skin = SkinWeightData::new();
        skin.resize_container_space(3);
        let hip = skin.bone_id("hip");
        let knee = skin.bone_id("knee");
        skin.append_link(0, SkinLink { bone_id: hip, weight: 0.25 });
        skin.append_link(0, SkinLink { bone_id: knee, weight: 0.75 });

        let mut graph = SceneGraph::new();
        let root = graph.root();
        let node = graph.add_child(root, "tri", GraphObject::Mesh(mesh)).unwrap();
        graph
            .add_child(
                node,
                "uv_1",
                GraphObject::Channel(
                    VertexChannelData::new(VertexChannel::Uv(vec![[1.0, 1.0]; 3])).with_set_index(1),
                ),
            )
            .unwrap();
        graph
            .add_child(
                node,
                "uv_0",
                GraphObject::Channel(VertexChannelData::new(VertexChannel::Uv(vec![[0.5, 0.5]; 3]))),
            )
            .unwrap();
        graph
            .add_child(node, "skinWeights", GraphObject::SkinWeights(skin))
            .unwrap();
        graph
    }

    #[test]
    fn test_pack_optimized_mesh() {
        let mut graph = scene();
        let group = default_mesh_group(&graph);
        let report = optimize_scene(&mut graph, &[group]);
        assert!(report.is_clean());

        let mesh = pack_optimized_mesh(&graph, report.optimized[0].node).unwrap();
        assert_eq!(mesh.format, FORMAT_UV | FORMAT_NORMAL | FORMAT_SKINNED);
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.sub_meshes.len(), 1);
        assert_eq!(mesh.bone_names.len(), 2);

        let stride = vertex_stride_packed(mesh.format) as usize;
        assert_eq!(mesh.vertex_data.len(), 3 * stride);
        // uv set 0 is packed even though set 1 comes first
        let uv: [half::f16; 2] = bytemuck::pod_read_unaligned(&mesh.vertex_data[8..12]);
        assert_eq!(uv[0].to_f32(), 0.5);

        // strongest link first, weights renormalized
        let knee = mesh.bone_names.iter().position(|n| n == "knee").unwrap() as u8;
        assert_eq!(mesh.vertex_data[stride - 8], knee);
        assert_eq!(mesh.vertex_data[stride - 4], 191);
    }

    #[test]
    fn test_unoptimized_mesh_is_rejected() {
        let graph = scene();
        let node = graph.find("tri").unwrap();
        assert!(pack_optimized_mesh(&graph, node).is_err());
    }

    #[test]
    fn test_too_many_bones() {
        let mut skin = SkinWeightData::new();
        for bone in 0..=MAX_PACKED_BONES {
            skin.bone_id(&format!("bone_{bone}"));
        }
        assert!(pack_skin(&skin, 1).is_err());
    }

    #[test]
    fn test_mesh_file_name() {
        assert_eq!(mesh_file_name("hero.body_optimized"), "hero_body_optimized.optmesh");
    }
}
