//! Mesh and blend shape geometry
//!
//! Vertices are the per-corner entries a mesh stores positions and normals for.
//! Several vertices can share one control point (the authored point in the source
//! asset). Control points that at least one vertex references are "used points",
//! numbered densely in order of first reference.

use hashbrown::HashMap;

/// One triangle of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub vertex_index: [u32; 3],
    pub material_id: u32,
}

impl Face {
    pub fn new(vertex_index: [u32; 3], material_id: u32) -> Self {
        Self {
            vertex_index,
            material_id,
        }
    }
}

/// Contiguous vertex and index range of one sub mesh in an optimized mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMeshRange {
    pub material_id: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// Read access shared by meshes and blend shapes
pub trait MeshGeometry {
    fn vertex_count(&self) -> usize;
    fn face_count(&self) -> usize;
    /// Vertex indices of a face
    fn face_vertices(&self, face: usize) -> Option<[u32; 3]>;
    fn positions(&self) -> &[[f32; 3]];
    fn normals(&self) -> &[[f32; 3]];
    /// Control point a vertex was created from
    fn control_point_index(&self, vertex: u32) -> Option<u32>;
    /// Dense used-point number of a control point, `None` if no vertex uses it
    fn used_point_index_for_control_point(&self, control_point: u32) -> Option<u32>;
    fn used_control_point_count(&self) -> usize;
}

/// Per-vertex streams and the control point mapping
#[derive(Debug, Clone, Default, PartialEq)]
struct VertexStreams {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    control_points: Vec<u32>,
    used_points: HashMap<u32, u32>,
}

impl VertexStreams {
    fn set_control_point(&mut self, vertex: u32, control_point: u32) {
        let vertex = vertex as usize;
        if vertex >= self.control_points.len() {
            self.control_points.resize(vertex + 1, 0);
        }
        self.control_points[vertex] = control_point;

        let next = self.used_points.len() as u32;
        self.used_points.entry(control_point).or_insert(next);
    }
}

macro_rules! impl_vertex_streams {
    ($ty:ty) => {
        impl $ty {
            pub fn add_position(&mut self, position: [f32; 3]) {
                self.streams.positions.push(position);
            }

            pub fn add_normal(&mut self, normal: [f32; 3]) {
                self.streams.normals.push(normal);
            }

            /// Record which control point `vertex` was created from
            pub fn set_vertex_index_to_control_point_index_map(&mut self, vertex: u32, control_point: u32) {
                self.streams.set_control_point(vertex, control_point);
            }

            pub fn position(&self, vertex: u32) -> Option<[f32; 3]> {
                self.streams.positions.get(vertex as usize).copied()
            }

            pub fn normal(&self, vertex: u32) -> Option<[f32; 3]> {
                self.streams.normals.get(vertex as usize).copied()
            }

            pub fn has_normals(&self) -> bool {
                !self.streams.normals.is_empty()
            }

            pub fn control_point_indices(&self) -> &[u32] {
                &self.streams.control_points
            }
        }

        impl MeshGeometry for $ty {
            fn vertex_count(&self) -> usize {
                self.streams.positions.len()
            }

            fn face_count(&self) -> usize {
                self.faces.len()
            }

            fn face_vertices(&self, face: usize) -> Option<[u32; 3]> {
                self.faces.get(face).map(|f| Self::face_vertex_index(f))
            }

            fn positions(&self) -> &[[f32; 3]] {
                &self.streams.positions
            }

            fn normals(&self) -> &[[f32; 3]] {
                &self.streams.normals
            }

            fn control_point_index(&self, vertex: u32) -> Option<u32> {
                self.streams.control_points.get(vertex as usize).copied()
            }

            fn used_point_index_for_control_point(&self, control_point: u32) -> Option<u32> {
                self.streams.used_points.get(&control_point).copied()
            }

            fn used_control_point_count(&self) -> usize {
                self.streams.used_points.len()
            }
        }
    };
}

/// Triangle mesh with per-face materials
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    streams: VertexStreams,
    faces: Vec<Face>,
    sub_meshes: Vec<SubMeshRange>,
    /// Scale of one mesh unit in meters
    pub unit_size_in_meters: f32,
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            streams: VertexStreams::default(),
            faces: Vec::new(),
            sub_meshes: Vec::new(),
            unit_size_in_meters: 1.0,
        }
    }
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_face(&mut self, vertex_index: [u32; 3], material_id: u32) {
        self.faces.push(Face::new(vertex_index, material_id));
    }

    pub fn face(&self, face: usize) -> Option<&Face> {
        self.faces.get(face)
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face_material_id(&self, face: usize) -> Option<u32> {
        self.faces.get(face).map(|f| f.material_id)
    }

    /// Sub mesh table, empty unless the mesh was produced by the optimizer
    pub fn sub_meshes(&self) -> &[SubMeshRange] {
        &self.sub_meshes
    }

    pub fn set_sub_meshes(&mut self, sub_meshes: Vec<SubMeshRange>) {
        self.sub_meshes = sub_meshes;
    }

    /// Copy the non-geometry attributes of `other`
    pub fn clone_attributes_from(&mut self, other: &MeshData) {
        self.unit_size_in_meters = other.unit_size_in_meters;
    }

    fn face_vertex_index(face: &Face) -> [u32; 3] {
        face.vertex_index
    }
}

impl_vertex_streams!(MeshData);

/// Morph target sharing the face topology of its base mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendShapeData {
    streams: VertexStreams,
    faces: Vec<[u32; 3]>,
}

impl BlendShapeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_face(&mut self, vertex_index: [u32; 3]) {
        self.faces.push(vertex_index);
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    fn face_vertex_index(face: &[u32; 3]) -> [u32; 3] {
        *face
    }
}

impl_vertex_streams!(BlendShapeData);
