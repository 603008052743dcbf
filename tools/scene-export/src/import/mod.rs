//! Scene importers (glTF/GLB/OBJ -> scene graph)
//!
//! Importers emit one vertex per face corner. Corners at bitwise equal
//! positions with the same bone influences share a control point, so the
//! optimizer can weld them back together where every attribute matches.

mod gltf;
mod obj;

use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use hashbrown::HashMap;
use scene_processing::{
    BlendShapeData, GraphObject, MaterialData, MeshData, NodeIndex, PATH_SEPARATOR,
    SKIN_WEIGHTS_NODE_NAME, SceneGraph, SkinLink, SkinWeightData, TransformData, VertexChannelData,
};

pub use self::gltf::import_gltf;
pub use self::obj::import_obj;

/// Import a scene file, detecting the format by extension
pub fn import_scene(input: &Path) -> Result<SceneGraph> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let graph = match ext.as_str() {
        "obj" => import_obj(input)?,
        "gltf" | "glb" => import_gltf(input)?,
        _ => bail!(
            "Unsupported scene format: {:?} (use .obj, .gltf, or .glb)",
            input
        ),
    };

    tracing::info!(
        "Imported {:?}: {} nodes, {} meshes",
        input,
        graph.node_count(),
        graph.mesh_nodes().len()
    );
    Ok(graph)
}

/// Node name with path separators replaced, or `fallback` when empty
pub(crate) fn sanitize_name(name: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match name {
        Some(name) if !name.is_empty() => name.replace(PATH_SEPARATOR, "_"),
        _ => fallback(),
    }
}

/// `base`, or `base_N` for the first N that is not taken under `parent`
pub(crate) fn unique_child_name(graph: &SceneGraph, parent: NodeIndex, base: &str) -> String {
    if graph.find_child(parent, base).is_none() {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| graph.find_child(parent, name).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// How corners without an authored normal get one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NormalFallback {
    /// Flat normal of the corner's face
    Face,
    /// Area weighted average over the faces sharing the control point
    Smooth,
}

/// Bitwise position plus `(bone id, weight bits)` of every influence
type WeldKey = ([u32; 3], Vec<(u32, u32)>);

/// Per-corner mesh gathered by an importer before it is added to the graph
#[derive(Debug, Default)]
pub(crate) struct CornerMesh {
    control_points: Vec<[f32; 3]>,
    welded: HashMap<WeldKey, u32>,
    corner_control_points: Vec<u32>,
    normals: Vec<Option<[f32; 3]>>,
    faces: Vec<([u32; 3], u32)>,
    pub channels: Vec<(String, VertexChannelData)>,
    pub blend_shapes: Vec<(String, BlendShapeData)>,
    pub materials: Vec<MaterialData>,
    pub transform: Option<TransformData>,
    skin: Option<SkinWeightData>,
}

impl CornerMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Control point of the position, welding bitwise equal positions
    pub fn control_point(&mut self, position: [f32; 3]) -> u32 {
        self.skinned_control_point(position, &[])
    }

    /// Control point of a vertex with bone influences. Vertices only weld when
    /// their positions and influences are bitwise equal, so a seam with
    /// different skinning on each side keeps both sides.
    pub fn skinned_control_point(&mut self, position: [f32; 3], influences: &[(&str, f32)]) -> u32 {
        let links: Vec<SkinLink> = if influences.is_empty() {
            Vec::new()
        } else {
            let skin = self.skin.get_or_insert_with(SkinWeightData::new);
            influences
                .iter()
                .map(|&(bone, weight)| SkinLink {
                    bone_id: skin.bone_id(bone),
                    weight,
                })
                .collect()
        };
        let key = (
            position.map(f32::to_bits),
            links.iter().map(|l| (l.bone_id, l.weight.to_bits())).collect(),
        );
        if let Some(&control_point) = self.welded.get(&key) {
            return control_point;
        }

        let control_point = self.add_control_point(position);
        if let Some(skin) = &mut self.skin {
            for link in links {
                skin.append_link(control_point as usize, link);
            }
        }
        self.welded.insert(key, control_point);
        control_point
    }

    /// Control point that is never welded with others
    pub fn add_control_point(&mut self, position: [f32; 3]) -> u32 {
        self.control_points.push(position);
        (self.control_points.len() - 1) as u32
    }

    /// Add a corner at an existing control point
    pub fn add_corner_at(&mut self, control_point: u32, normal: Option<[f32; 3]>) -> u32 {
        self.corner_control_points.push(control_point);
        self.normals.push(normal);
        (self.corner_control_points.len() - 1) as u32
    }

    pub fn add_corner(&mut self, position: [f32; 3], normal: Option<[f32; 3]>) -> u32 {
        let control_point = self.control_point(position);
        self.add_corner_at(control_point, normal)
    }

    pub fn add_skinned_corner(
        &mut self,
        position: [f32; 3],
        normal: Option<[f32; 3]>,
        influences: &[(&str, f32)],
    ) -> u32 {
        let control_point = self.skinned_control_point(position, influences);
        self.add_corner_at(control_point, normal)
    }

    pub fn add_face(&mut self, corners: [u32; 3], material_id: u32) {
        self.faces.push((corners, material_id));
    }

    pub fn corner_position(&self, corner: u32) -> [f32; 3] {
        let control_point = self.corner_control_points[corner as usize];
        self.control_points[control_point as usize]
    }

    /// Normal of a corner, zero until [`CornerMesh::fill_missing_normals`] ran
    pub fn corner_normal(&self, corner: u32) -> [f32; 3] {
        self.normals[corner as usize].unwrap_or([0.0; 3])
    }

    fn face_normal(&self, corners: [u32; 3]) -> Vec3 {
        let [a, b, c] = corners.map(|corner| Vec3::from(self.corner_position(corner)));
        (b - a).cross(c - a)
    }

    /// Give every corner without an authored normal a generated one
    pub fn fill_missing_normals(&mut self, fallback: NormalFallback) {
        if self.normals.iter().all(Option::is_some) {
            return;
        }

        let smooth = match fallback {
            NormalFallback::Face => Vec::new(),
            NormalFallback::Smooth => {
                // cross product length is twice the face area
                let mut sums = vec![Vec3::ZERO; self.control_points.len()];
                for &(corners, _) in &self.faces {
                    let weighted = self.face_normal(corners);
                    for corner in corners {
                        sums[self.corner_control_points[corner as usize] as usize] += weighted;
                    }
                }
                sums
            }
        };

        let mut generated = 0usize;
        for face in 0..self.faces.len() {
            let corners = self.faces[face].0;
            let flat = self.face_normal(corners).normalize_or(Vec3::Y);
            for corner in corners {
                if self.normals[corner as usize].is_some() {
                    continue;
                }
                let control_point = self.corner_control_points[corner as usize] as usize;
                let normal = smooth
                    .get(control_point)
                    .map(|sum| sum.normalize_or(flat))
                    .unwrap_or(flat);
                self.normals[corner as usize] = Some(normal.to_array());
                generated += 1;
            }
        }

        // corners not referenced by any face
        for normal in self.normals.iter_mut().filter(|n| n.is_none()) {
            *normal = Some(Vec3::Y.to_array());
            generated += 1;
        }

        tracing::debug!("Generated {} normals ({:?})", generated, fallback);
    }

    /// Blend shape built from per-corner offsets to this mesh
    pub fn blend_shape(
        &self,
        position_offsets: &[[f32; 3]],
        normal_offsets: Option<&[[f32; 3]]>,
    ) -> BlendShapeData {
        let mut shape = BlendShapeData::new();
        for (corner, &control_point) in self.corner_control_points.iter().enumerate() {
            let offset = position_offsets.get(corner).copied().unwrap_or([0.0; 3]);
            let position = Vec3::from(self.corner_position(corner as u32)) + Vec3::from(offset);
            shape.add_position(position.to_array());

            let normal = Vec3::from(self.corner_normal(corner as u32));
            let normal = match normal_offsets.and_then(|offsets| offsets.get(corner)) {
                Some(&offset) => (normal + Vec3::from(offset)).normalize_or(normal),
                None => normal,
            };
            shape.add_normal(normal.to_array());
            shape.set_vertex_index_to_control_point_index_map(corner as u32, control_point);
        }
        for &(corners, _) in &self.faces {
            shape.add_face(corners);
        }
        shape
    }

    fn mesh_data(&self) -> MeshData {
        let mut mesh = MeshData::new();
        for (corner, &control_point) in self.corner_control_points.iter().enumerate() {
            mesh.add_position(self.corner_position(corner as u32));
            mesh.add_normal(self.corner_normal(corner as u32));
            mesh.set_vertex_index_to_control_point_index_map(corner as u32, control_point);
        }
        for &(corners, material_id) in &self.faces {
            mesh.add_face(corners, material_id);
        }
        mesh
    }

    /// Add the mesh node and its data children under `parent`
    pub fn add_to_graph(
        mut self,
        graph: &mut SceneGraph,
        parent: NodeIndex,
        name: &str,
    ) -> Result<NodeIndex> {
        if let Some(skin) = &mut self.skin {
            skin.resize_container_space(self.control_points.len());
        }

        let name = unique_child_name(graph, parent, name);
        let node = graph
            .add_child(parent, &name, GraphObject::Mesh(self.mesh_data()))
            .with_context(|| format!("Failed to add mesh node '{name}'"))?;

        for (channel_name, channel) in self.channels {
            let child = graph.add_child(node, &channel_name, GraphObject::Channel(channel))?;
            graph.make_end_point(child)?;
        }
        if let Some(skin) = self.skin {
            let child = graph.add_child(node, SKIN_WEIGHTS_NODE_NAME, GraphObject::SkinWeights(skin))?;
            graph.make_end_point(child)?;
        }
        for (shape_name, shape) in self.blend_shapes {
            let shape_name = unique_child_name(graph, node, &shape_name);
            let child = graph.add_child(node, &shape_name, GraphObject::BlendShape(shape))?;
            graph.make_end_point(child)?;
        }
        for material in self.materials {
            let base = sanitize_name(Some(material.name.as_str()), || "material".to_string());
            let material_name = unique_child_name(graph, node, &base);
            let child = graph.add_child(node, &material_name, GraphObject::Material(material))?;
            graph.make_end_point(child)?;
        }
        if let Some(transform) = self.transform {
            let child = graph.add_child(node, "transform", GraphObject::Transform(transform))?;
            graph.make_end_point(child)?;
        }

        tracing::debug!(
            "Imported mesh '{}': {} corners, {} control points, {} faces",
            name,
            self.corner_control_points.len(),
            self.control_points.len(),
            self.faces.len()
        );
        Ok(node)
    }
}
