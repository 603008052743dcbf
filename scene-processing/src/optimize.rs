//! Mesh optimization
//!
//! Feeds a mesh through the [`MeshBuilder`] and reads the result back as new
//! scene objects: a compacted mesh, index-aligned channels and skin weights.
//! Blend shapes run through the same routine with deduplication disabled and the
//! base mesh's face materials, so their vertex order matches the optimized base.

use mesh_builder::{
    BuilderSettings, Influence, LayerId, LayerKind, MeshBuilder, SkinningInfo, VertexLookup,
};

use crate::channel::VertexChannelData;
use crate::config::{MeshGroup, SkinRule};
use crate::error::OptimizeError;
use crate::mesh_data::{BlendShapeData, Face, MeshData, MeshGeometry, SubMeshRange};
use crate::skin_weights::{SkinLink, SkinWeightData};

/// Optimized replacement for a mesh node and its data children
#[derive(Debug, Clone)]
pub struct OptimizedMesh {
    pub mesh: MeshData,
    /// Same order as the channels passed in
    pub channels: Vec<VertexChannelData>,
    /// `None` when the source mesh had no skin weights
    pub skin_weights: Option<SkinWeightData>,
}

/// Optimize a mesh with its channels and skin weights
pub fn optimize_mesh(
    mesh: &MeshData,
    channels: &[&VertexChannelData],
    skin_weights: &[&SkinWeightData],
    group: &MeshGroup,
    has_blend_shapes: bool,
) -> Result<OptimizedMesh, OptimizeError> {
    let mut bones = SkinWeightData::new();
    let skinning = extract_skinning_info(mesh, skin_weights, group.skin_rule(), &mut bones)?;
    let built = build(
        mesh,
        mesh,
        channels,
        skinning,
        group.builder_settings(has_blend_shapes),
    )?;

    let mut optimized = MeshData::new();
    optimized.clone_attributes_from(mesh);
    let vertex_count = built.builder.num_compacted_vertices();
    let mut optimized_channels: Vec<VertexChannelData> = channels
        .iter()
        .map(|channel| channel.clone_attributes(vertex_count))
        .collect();

    let assembled = built.assemble(&mut optimized_channels)?;
    let skin_weights = built.remap_skin_weights(&assembled.lookups, &bones)?;

    for (position, normal) in assembled.positions.iter().zip(&assembled.normals) {
        optimized.add_position(*position);
        optimized.add_normal(*normal);
    }
    for (vertex, &control_point) in assembled.control_points.iter().enumerate() {
        optimized.set_vertex_index_to_control_point_index_map(vertex as u32, control_point);
    }
    for face in &assembled.faces {
        optimized.add_face(face.vertex_index, face.material_id);
    }
    optimized.set_sub_meshes(assembled.sub_meshes);

    tracing::debug!(
        "Optimized mesh: {} vertices -> {}, {} faces, {} sub meshes, {} channels, skinned={}",
        mesh.vertex_count(),
        optimized.vertex_count(),
        optimized.face_count(),
        optimized.sub_meshes().len(),
        optimized_channels.len(),
        skin_weights.is_some()
    );

    Ok(OptimizedMesh {
        mesh: optimized,
        channels: optimized_channels,
        skin_weights,
    })
}

/// Optimize a blend shape of `base` so it lines up with the optimized base mesh
pub fn optimize_blend_shape(
    blend_shape: &BlendShapeData,
    base: &MeshData,
    group: &MeshGroup,
    has_blend_shapes: bool,
) -> Result<BlendShapeData, OptimizeError> {
    let built = build(
        blend_shape,
        base,
        &[],
        None,
        group.builder_settings(has_blend_shapes),
    )?;
    let assembled = built.assemble(&mut [])?;

    let mut optimized = BlendShapeData::new();
    for (position, normal) in assembled.positions.iter().zip(&assembled.normals) {
        optimized.add_position(*position);
        optimized.add_normal(*normal);
    }
    for (vertex, &control_point) in assembled.control_points.iter().enumerate() {
        optimized.set_vertex_index_to_control_point_index_map(vertex as u32, control_point);
    }
    for face in &assembled.faces {
        optimized.add_face(face.vertex_index);
    }
    Ok(optimized)
}

/// Collect influences per used point and compact them.
///
/// Skin weight nodes are indexed by control point. Bone ids of every input node
/// are unified through `bones` so influences from several nodes can share a list.
fn extract_skinning_info(
    mesh: &MeshData,
    skin_weights: &[&SkinWeightData],
    rule: SkinRule,
    bones: &mut SkinWeightData,
) -> Result<Option<SkinningInfo>, OptimizeError> {
    if skin_weights.is_empty() {
        return Ok(None);
    }

    let mut info = SkinningInfo::new(mesh.used_control_point_count());
    for skin in skin_weights {
        for control_point in 0..skin.vertex_count() {
            let Some(used_point) = mesh.used_point_index_for_control_point(control_point as u32)
            else {
                continue;
            };
            for link in skin.links(control_point) {
                let name = skin
                    .bone_name(link.bone_id)
                    .ok_or(OptimizeError::UnknownBone(link.bone_id))?;
                let bone = bones.bone_id(name);
                info.add_influence(used_point, Influence::new(bone, link.weight))?;
            }
        }
    }

    info.optimize(rule.max_weights_per_vertex, rule.weight_threshold);
    Ok(Some(info))
}

fn check_stream_length(
    stream: impl FnOnce() -> String,
    expected: usize,
    actual: usize,
) -> Result<(), OptimizeError> {
    if actual == expected {
        return Ok(());
    }
    Err(OptimizeError::StreamLength {
        stream: stream(),
        expected,
        actual,
    })
}

fn validate_streams<G: MeshGeometry>(
    geometry: &G,
    channels: &[&VertexChannelData],
) -> Result<(), OptimizeError> {
    let expected = geometry.vertex_count();
    check_stream_length(|| "normals".to_string(), expected, geometry.normals().len())?;

    let mapped = (0..expected as u32)
        .take_while(|&vertex| geometry.control_point_index(vertex).is_some())
        .count();
    check_stream_length(|| "control point map".to_string(), expected, mapped)?;

    for channel in channels {
        check_stream_length(
            || format!("{} channel {}", channel.values.kind_name(), channel.set_index),
            expected,
            channel.len(),
        )?;
    }

    for face in 0..geometry.face_count() {
        for vertex in geometry.face_vertices(face).into_iter().flatten() {
            if vertex as usize >= expected {
                return Err(OptimizeError::FaceIndexOutOfRange {
                    face,
                    vertex,
                    vertex_count: expected,
                });
            }
        }
    }
    Ok(())
}

/// Builder state after every face was processed
struct BuiltMesh {
    builder: MeshBuilder,
    original_vertex: LayerId,
    position: LayerId,
    normal: LayerId,
    channels: Vec<LayerId>,
}

/// Flat output buffers in sub mesh order
struct Assembled {
    lookups: Vec<VertexLookup>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    control_points: Vec<u32>,
    faces: Vec<Face>,
    sub_meshes: Vec<SubMeshRange>,
}

fn build<G: MeshGeometry>(
    geometry: &G,
    base: &MeshData,
    channels: &[&VertexChannelData],
    skinning: Option<SkinningInfo>,
    settings: BuilderSettings,
) -> Result<BuiltMesh, OptimizeError> {
    validate_streams(geometry, channels)?;
    if geometry.face_count() != base.face_count() {
        return Err(OptimizeError::FaceCountMismatch {
            blend_shape: geometry.face_count(),
            base: base.face_count(),
        });
    }

    let mut builder = MeshBuilder::new(geometry.used_control_point_count(), settings)?;
    let original_vertex = builder.add_layer(LayerKind::OriginalVertex);
    let position = builder.add_layer(LayerKind::Position);
    let normal = builder.add_layer(LayerKind::Normal);
    let channel_layers: Vec<LayerId> = channels
        .iter()
        .map(|channel| builder.add_layer(channel.values.layer_kind()))
        .collect();
    builder.set_skinning_info(skinning)?;

    let positions = geometry.positions();
    let normals = geometry.normals();
    for (face, base_face) in base.faces().iter().enumerate() {
        let Some(vertices) = geometry.face_vertices(face) else {
            continue;
        };

        builder.begin_polygon(base_face.material_id)?;
        for vertex in vertices {
            let mapped = geometry
                .control_point_index(vertex)
                .and_then(|cp| Some((cp, geometry.used_point_index_for_control_point(cp)?)));
            let Some((control_point, org_vertex)) = mapped else {
                return Err(OptimizeError::UnmappedVertex(vertex));
            };

            builder.set_current_vertex_value(original_vertex, control_point)?;
            builder.set_current_vertex_value(position, positions[vertex as usize])?;
            builder.set_current_vertex_value(normal, normals[vertex as usize])?;
            for (channel, &layer) in channels.iter().zip(&channel_layers) {
                if let Some(value) = channel.values.value(vertex) {
                    builder.set_current_vertex_value(layer, value)?;
                }
            }
            builder.add_polygon_vertex(org_vertex)?;
        }
        builder.end_polygon()?;
    }
    builder.generate_sub_mesh_vertex_orders()?;

    Ok(BuiltMesh {
        builder,
        original_vertex,
        position,
        normal,
        channels: channel_layers,
    })
}

impl BuiltMesh {
    /// Walk sub meshes in creation order and emit vertex, face and channel data
    fn assemble(&self, channels: &mut [VertexChannelData]) -> Result<Assembled, OptimizeError> {
        let vertex_count = self.builder.num_compacted_vertices();
        let mut assembled = Assembled {
            lookups: Vec::with_capacity(vertex_count),
            positions: Vec::with_capacity(vertex_count),
            normals: Vec::with_capacity(vertex_count),
            control_points: Vec::with_capacity(vertex_count),
            faces: Vec::new(),
            sub_meshes: Vec::with_capacity(self.builder.num_sub_meshes()),
        };

        let mut offset = 0u32;
        for sub_mesh in self.builder.sub_meshes() {
            for &lookup in sub_mesh.vertices() {
                assembled.lookups.push(lookup);
                assembled
                    .positions
                    .push(self.builder.vertex_value(self.position, lookup)?);
                assembled
                    .normals
                    .push(self.builder.vertex_value(self.normal, lookup)?);
                assembled
                    .control_points
                    .push(self.builder.vertex_value(self.original_vertex, lookup)?);

                for (channel, &layer) in channels.iter_mut().zip(&self.channels) {
                    let value = self
                        .builder
                        .layer(layer)?
                        .vertex_value(lookup.org_vertex, lookup.duplicate_nr)?;
                    channel.values.push(value)?;
                }
            }

            let first_index = (assembled.faces.len() * 3) as u32;
            for triangle in sub_mesh.indices().chunks_exact(3) {
                assembled.faces.push(Face::new(
                    [
                        offset + triangle[0],
                        offset + triangle[1],
                        offset + triangle[2],
                    ],
                    sub_mesh.material(),
                ));
            }

            let sub_mesh_vertices = sub_mesh.vertices().len() as u32;
            assembled.sub_meshes.push(SubMeshRange {
                material_id: sub_mesh.material(),
                first_vertex: offset,
                vertex_count: sub_mesh_vertices,
                first_index,
                index_count: sub_mesh.indices().len() as u32,
            });
            offset += sub_mesh_vertices;
        }

        Ok(assembled)
    }

    /// One link list per output vertex, bone ids resolved by name into the
    /// output object's own table
    fn remap_skin_weights(
        &self,
        lookups: &[VertexLookup],
        bones: &SkinWeightData,
    ) -> Result<Option<SkinWeightData>, OptimizeError> {
        let Some(info) = self.builder.skinning_info() else {
            return Ok(None);
        };

        let mut optimized = SkinWeightData::new();
        optimized.resize_container_space(lookups.len());
        for (vertex, lookup) in lookups.iter().enumerate() {
            for influence in info.influences(lookup.org_vertex) {
                let name = bones
                    .bone_name(influence.bone)
                    .ok_or(OptimizeError::UnknownBone(influence.bone))?;
                let bone_id = optimized.bone_id(name);
                optimized.append_link(
                    vertex,
                    SkinLink {
                        bone_id,
                        weight: influence.weight,
                    },
                );
            }
        }
        Ok(Some(optimized))
    }
}
