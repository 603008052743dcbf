//! glTF/GLB scene import

use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use gltf::mesh::Mode;
use scene_processing::{
    GraphObject, MaterialData, NodeIndex, SceneGraph, TransformData, VertexChannel,
    VertexChannelData,
};

use super::{CornerMesh, NormalFallback, sanitize_name, unique_child_name};

/// Import the default scene (or the first scene) of a glTF/GLB file.
///
/// Every node becomes a graph node; nodes with a mesh carry it, with one
/// material id per triangle primitive in primitive order.
pub fn import_gltf(input: &Path) -> Result<SceneGraph> {
    let (document, buffers, _images) =
        gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("No scenes found in glTF")?;

    let mut graph = SceneGraph::new();
    let root = graph.root();
    for node in scene.nodes() {
        import_node(&mut graph, root, &node, &buffers)?;
    }
    Ok(graph)
}

fn import_node(
    graph: &mut SceneGraph,
    parent: NodeIndex,
    node: &gltf::Node<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<()> {
    let name = sanitize_name(node.name(), || format!("node_{}", node.index()));
    let transform = TransformData {
        matrix: node.transform().matrix(),
    };
    let transform = (transform != TransformData::default()).then_some(transform);

    let index = match node.mesh() {
        Some(mesh) => {
            let mut corners = read_mesh(&mesh, node.skin().as_ref(), buffers)
                .with_context(|| format!("Failed to import mesh of node '{name}'"))?;
            corners.transform = transform;
            corners.add_to_graph(graph, parent, &name)?
        }
        None => {
            let name = unique_child_name(graph, parent, &name);
            let index = graph.add_empty_child(parent, &name)?;
            if let Some(transform) = transform {
                let child = graph.add_child(index, "transform", GraphObject::Transform(transform))?;
                graph.make_end_point(child)?;
            }
            index
        }
    };

    for child in node.children() {
        import_node(graph, index, &child, buffers)?;
    }
    Ok(())
}

struct MorphTarget {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
}

/// Vertex attributes of one triangle primitive
struct Primitive {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    indices: Vec<u32>,
    tex_coords: Vec<Vec<[f32; 2]>>,
    colors: Vec<Vec<[f32; 4]>>,
    tangents: Option<Vec<[f32; 4]>>,
    joints: Vec<(Vec<[u16; 4]>, Vec<[f32; 4]>)>,
    morph_targets: Vec<MorphTarget>,
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<Primitive> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    // Positions (required)
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("No positions in primitive")?
        .collect();

    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|iter| iter.collect());

    // Non-indexed primitives use their vertices in order
    let indices: Vec<u32> = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());
    if indices.len() % 3 != 0 {
        tracing::warn!(
            "Primitive {} has {} indices, ignoring the trailing {}",
            primitive.index(),
            indices.len(),
            indices.len() % 3
        );
    }

    let tex_coords = (0..)
        .map_while(|set| reader.read_tex_coords(set).map(|iter| iter.into_f32().collect()))
        .collect();
    let colors = (0..)
        .map_while(|set| reader.read_colors(set).map(|iter| iter.into_rgba_f32().collect()))
        .collect();

    // Tangents (vec4: xyz direction, w handedness) are only meaningful with normals
    let tangents = if normals.is_some() {
        reader.read_tangents().map(|iter| iter.collect())
    } else {
        None
    };

    let mut joints = Vec::new();
    for set in 0.. {
        match (reader.read_joints(set), reader.read_weights(set)) {
            (Some(j), Some(w)) => joints.push((j.into_u16().collect(), w.into_f32().collect())),
            (None, None) => break,
            _ => {
                tracing::warn!(
                    "Primitive {} has partial skinning data in set {} (joints or weights missing), ignoring it",
                    primitive.index(),
                    set
                );
                break;
            }
        }
    }

    let morph_targets = reader
        .read_morph_targets()
        .map(|(positions, normals, _tangents)| MorphTarget {
            positions: positions.map(|iter| iter.collect()).unwrap_or_default(),
            normals: normals.map(|iter| iter.collect()),
        })
        .collect();

    Ok(Primitive {
        positions,
        normals,
        indices,
        tex_coords,
        colors,
        tangents,
        joints,
        morph_targets,
    })
}

fn material_data(material: &gltf::Material<'_>) -> MaterialData {
    let fallback = || match material.index() {
        Some(index) => format!("material_{index}"),
        None => "default".to_string(),
    };
    MaterialData {
        name: material.name().map(str::to_string).unwrap_or_else(fallback),
        base_color: material.pbr_metallic_roughness().base_color_factor(),
    }
}

fn joint_name(joint: &gltf::Node<'_>) -> String {
    joint
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("joint_{}", joint.index()))
}

/// Smallest per-primitive count; attributes missing on any primitive are dropped
fn common_count(primitives: &[Primitive], count: impl Fn(&Primitive) -> usize) -> usize {
    primitives.iter().map(count).min().unwrap_or(0)
}

/// Gather the triangle primitives of a mesh into one per-corner mesh
fn read_mesh(
    mesh: &gltf::Mesh<'_>,
    skin: Option<&gltf::Skin<'_>>,
    buffers: &[gltf::buffer::Data],
) -> Result<CornerMesh> {
    let mut primitives = Vec::new();
    let mut materials = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            tracing::warn!(
                "Skipping primitive {} of mesh {:?}: {:?} is not supported",
                primitive.index(),
                mesh.name(),
                primitive.mode()
            );
            continue;
        }
        primitives.push(read_primitive(&primitive, buffers)?);
        materials.push(material_data(&primitive.material()));
    }
    if primitives.is_empty() {
        bail!("No triangle primitives in mesh");
    }

    let uv_sets = common_count(&primitives, |p| p.tex_coords.len());
    let color_sets = common_count(&primitives, |p| p.colors.len());
    let joint_sets = common_count(&primitives, |p| p.joints.len());
    let target_count = common_count(&primitives, |p| p.morph_targets.len());
    let has_tangents = primitives.iter().all(|p| p.tangents.is_some());
    let has_target_normals = (0..target_count)
        .map(|t| primitives.iter().any(|p| p.morph_targets[t].normals.is_some()))
        .collect::<Vec<_>>();

    if primitives.iter().any(|p| p.morph_targets.len() != target_count) {
        tracing::warn!(
            "Primitives of mesh {:?} disagree on morph target count, keeping {}",
            mesh.name(),
            target_count
        );
    }

    let joint_names: Vec<String> = skin
        .map(|skin| skin.joints().map(|joint| joint_name(&joint)).collect())
        .unwrap_or_default();
    if joint_sets > 0 && joint_names.is_empty() {
        tracing::warn!(
            "Mesh {:?} has joints but its node has no skin, ignoring skinning",
            mesh.name()
        );
    }

    let mut corners = CornerMesh::new();
    let mut uvs = vec![Vec::new(); uv_sets];
    let mut colors = vec![Vec::new(); color_sets];
    let mut tangents = Vec::new();
    let mut targets: Vec<(Vec<[f32; 3]>, Vec<[f32; 3]>)> = vec![(Vec::new(), Vec::new()); target_count];

    for (material_id, primitive) in primitives.iter().enumerate() {
        for triangle in primitive.indices.chunks_exact(3) {
            let mut face = [0u32; 3];
            for (slot, &index) in triangle.iter().enumerate() {
                let i = index as usize;
                let position = *primitive.positions.get(i).with_context(|| {
                    format!(
                        "Index {index} out of range ({} vertices)",
                        primitive.positions.len()
                    )
                })?;
                let normal = primitive.normals.as_ref().and_then(|n| n.get(i).copied());

                let mut influences = Vec::new();
                if !joint_names.is_empty() {
                    for (joints, weights) in primitive.joints.iter().take(joint_sets) {
                        let (Some(joints), Some(weights)) = (joints.get(i), weights.get(i)) else {
                            continue;
                        };
                        for (&joint, &weight) in joints.iter().zip(weights) {
                            if weight <= 0.0 {
                                continue;
                            }
                            let bone = joint_names.get(joint as usize).with_context(|| {
                                format!(
                                    "Joint index {joint} out of range for skin with {} joints",
                                    joint_names.len()
                                )
                            })?;
                            influences.push((bone.as_str(), weight));
                        }
                    }
                }
                let corner = corners.add_skinned_corner(position, normal, &influences);
                face[slot] = corner;

                for (set, values) in uvs.iter_mut().enumerate() {
                    values.push(primitive.tex_coords[set].get(i).copied().unwrap_or_default());
                }
                for (set, values) in colors.iter_mut().enumerate() {
                    values.push(primitive.colors[set].get(i).copied().unwrap_or([1.0; 4]));
                }
                if has_tangents {
                    let tangent = primitive.tangents.as_ref().and_then(|t| t.get(i).copied());
                    tangents.push(tangent.unwrap_or([1.0, 0.0, 0.0, 1.0]));
                }

                for (t, (position_offsets, normal_offsets)) in targets.iter_mut().enumerate() {
                    let target = &primitive.morph_targets[t];
                    position_offsets.push(target.positions.get(i).copied().unwrap_or_default());
                    let normal = target.normals.as_ref().and_then(|n| n.get(i).copied());
                    normal_offsets.push(normal.unwrap_or_default());
                }
            }
            corners.add_face(face, material_id as u32);
        }
    }

    corners.fill_missing_normals(NormalFallback::Smooth);

    for (set, values) in uvs.into_iter().enumerate() {
        corners.channels.push((
            format!("uv_{set}"),
            VertexChannelData::new(VertexChannel::Uv(values)).with_set_index(set as u32),
        ));
    }
    if has_tangents {
        let bitangents = tangents
            .iter()
            .enumerate()
            .map(|(corner, t)| {
                let normal = Vec3::from(corners.corner_normal(corner as u32));
                (normal.cross(Vec3::new(t[0], t[1], t[2])) * t[3]).to_array()
            })
            .collect();
        corners.channels.push((
            "tangent".to_string(),
            VertexChannelData::new(VertexChannel::Tangent(tangents)),
        ));
        corners.channels.push((
            "bitangent".to_string(),
            VertexChannelData::new(VertexChannel::Bitangent(bitangents)),
        ));
    }
    for (set, values) in colors.into_iter().enumerate() {
        corners.channels.push((
            format!("color_{set}"),
            VertexChannelData::new(VertexChannel::Color(values)).with_set_index(set as u32),
        ));
    }

    for (t, (position_offsets, normal_offsets)) in targets.iter().enumerate() {
        let normal_offsets = has_target_normals[t].then_some(normal_offsets.as_slice());
        let shape = corners.blend_shape(position_offsets, normal_offsets);
        corners.blend_shapes.push((format!("blend_shape_{t}"), shape));
    }

    corners.materials = materials;
    tracing::debug!(
        "Read mesh {:?}: {} primitives, {} faces, {} uv sets, {} color sets, {} morph targets",
        mesh.name(),
        primitives.len(),
        corners.face_count(),
        uv_sets,
        color_sets,
        target_count
    );
    Ok(corners)
}
