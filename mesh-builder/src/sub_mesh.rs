//! Material-homogeneous sub meshes

use hashbrown::{HashMap, HashSet};

use crate::builder::VertexLookup;

/// A group of triangles sharing one material, bounded by vertex and index caps.
///
/// Polygons are collected first. The local vertex buffer order is only assigned
/// by [`MeshBuilder::generate_sub_mesh_vertex_orders`](crate::MeshBuilder::generate_sub_mesh_vertex_orders),
/// in the order vertices are first referenced.
#[derive(Debug, Clone)]
pub struct SubMesh {
    material: u32,
    polygons: Vec<[VertexLookup; 3]>,
    distinct: HashSet<VertexLookup>,
    vertices: Vec<VertexLookup>,
    indices: Vec<u32>,
}

impl SubMesh {
    pub(crate) fn new(material: u32) -> Self {
        Self {
            material,
            polygons: Vec::new(),
            distinct: HashSet::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn material(&self) -> u32 {
        self.material
    }

    /// Number of distinct compacted vertices referenced by this sub mesh
    pub fn num_vertices(&self) -> usize {
        self.distinct.len()
    }

    pub fn num_polygons(&self) -> usize {
        self.polygons.len()
    }

    pub fn num_indices(&self) -> usize {
        self.polygons.len() * 3
    }

    /// Local vertex buffer, empty until vertex orders are generated
    pub fn vertices(&self) -> &[VertexLookup] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<VertexLookup> {
        self.vertices.get(index).copied()
    }

    /// Local triangle indices into [`Self::vertices`]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index(&self, index: usize) -> Option<u32> {
        self.indices.get(index).copied()
    }

    /// Whether adding `corners` keeps both caps satisfied
    pub(crate) fn can_fit(&self, corners: &[VertexLookup; 3], max_vertices: usize, max_indices: usize) -> bool {
        let mut new_vertices = 0;
        for (i, corner) in corners.iter().enumerate() {
            if !self.distinct.contains(corner) && !corners[..i].contains(corner) {
                new_vertices += 1;
            }
        }

        self.distinct.len() + new_vertices <= max_vertices
            && self.num_indices() + corners.len() <= max_indices
    }

    pub(crate) fn add_polygon(&mut self, corners: [VertexLookup; 3]) {
        self.distinct.extend(corners);
        self.polygons.push(corners);
    }

    pub(crate) fn generate_vertex_order(&mut self) {
        let mut local: HashMap<VertexLookup, u32> = HashMap::with_capacity(self.distinct.len());
        self.vertices.clear();
        self.indices.clear();
        self.vertices.reserve(self.distinct.len());
        self.indices.reserve(self.num_indices());

        for polygon in &self.polygons {
            for corner in polygon {
                let index = *local.entry(*corner).or_insert_with(|| {
                    self.vertices.push(*corner);
                    (self.vertices.len() - 1) as u32
                });
                self.indices.push(index);
            }
        }
    }
}
