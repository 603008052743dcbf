//! Vertex deduplication and sub mesh partitioning
//!
//! Polygons are fed corner by corner. For every corner the caller first stages a
//! value in each layer, then adds the corner with its original vertex number.
//! The builder looks for an existing duplicate slot of that vertex whose full
//! attribute tuple matches the staged one, and either reuses it or allocates a
//! new slot. Finished polygons are routed to the open sub mesh of their material.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::BuildError;
use crate::layer::{LayerId, LayerKind, LayerValue, VertexAttributeLayer, VertexValue};
use crate::skinning::SkinningInfo;
use crate::sub_mesh::SubMesh;

/// Sub mesh cap meaning "anything that fits a 32-bit index"
pub const UNBOUNDED: usize = u32::MAX as usize;

/// Identifies one compacted vertex: an original vertex and which of its
/// attribute variations is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexLookup {
    pub org_vertex: u32,
    pub duplicate_nr: u32,
}

/// Builder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderSettings {
    /// A sub mesh never references more distinct vertices than this
    pub max_sub_mesh_vertices: usize,
    /// A sub mesh never holds more indices than this
    pub max_sub_mesh_indices: usize,
    /// Merge corners with identical attribute tuples. Disabled for meshes with
    /// blend shapes, which need one vertex per corner.
    pub optimize_duplicates: bool,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            max_sub_mesh_vertices: UNBOUNDED,
            max_sub_mesh_indices: UNBOUNDED,
            optimize_duplicates: true,
        }
    }
}

#[derive(Debug)]
struct OpenPolygon {
    material: u32,
    corners: SmallVec<[VertexLookup; 3]>,
}

/// Builds deduplicated, sub mesh partitioned vertex data for one mesh
#[derive(Debug)]
pub struct MeshBuilder {
    vertex_count: usize,
    settings: BuilderSettings,
    layers: Vec<VertexAttributeLayer>,
    duplicate_counts: Vec<u32>,
    skinning_info: Option<SkinningInfo>,
    open_polygon: Option<OpenPolygon>,
    sub_meshes: Vec<SubMesh>,
    open_sub_meshes: HashMap<u32, usize>,
    finalized: bool,
}

impl MeshBuilder {
    /// Create a builder for a mesh with `vertex_count` used vertices
    pub fn new(vertex_count: usize, settings: BuilderSettings) -> Result<Self, BuildError> {
        if settings.max_sub_mesh_vertices < 3 {
            return Err(BuildError::LimitTooSmall {
                limit: "vertex",
                value: settings.max_sub_mesh_vertices,
            });
        }
        if settings.max_sub_mesh_indices < 3 {
            return Err(BuildError::LimitTooSmall {
                limit: "index",
                value: settings.max_sub_mesh_indices,
            });
        }

        Ok(Self {
            vertex_count,
            settings,
            layers: Vec::new(),
            duplicate_counts: vec![0; vertex_count],
            skinning_info: None,
            open_polygon: None,
            sub_meshes: Vec::new(),
            open_sub_meshes: HashMap::new(),
            finalized: false,
        })
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    /// Number of original (used) vertices
    pub fn num_org_vertices(&self) -> usize {
        self.vertex_count
    }

    /// Add a layer covering every original vertex
    pub fn add_layer(&mut self, kind: LayerKind) -> LayerId {
        self.layers
            .push(VertexAttributeLayer::new(kind, self.vertex_count));
        LayerId(self.layers.len() - 1)
    }

    pub fn layer(&self, id: LayerId) -> Result<&VertexAttributeLayer, BuildError> {
        self.layers.get(id.0).ok_or(BuildError::UnknownLayer(id.0))
    }

    pub fn layers(&self) -> &[VertexAttributeLayer] {
        &self.layers
    }

    /// Stage a value for the corner about to be added
    pub fn set_current_vertex_value(
        &mut self,
        id: LayerId,
        value: impl Into<VertexValue>,
    ) -> Result<(), BuildError> {
        self.layers
            .get_mut(id.0)
            .ok_or(BuildError::UnknownLayer(id.0))?
            .set_current_vertex_value(value.into())
    }

    /// Read a layer value for a resolved compacted vertex
    pub fn vertex_value<T: LayerValue>(&self, id: LayerId, lookup: VertexLookup) -> Result<T, BuildError> {
        self.layer(id)?.get(lookup.org_vertex, lookup.duplicate_nr)
    }

    pub fn set_skinning_info(&mut self, skinning_info: Option<SkinningInfo>) -> Result<(), BuildError> {
        if let Some(info) = &skinning_info
            && info.num_org_vertices() != self.vertex_count
        {
            return Err(BuildError::SkinningSizeMismatch {
                skinning: info.num_org_vertices(),
                mesh: self.vertex_count,
            });
        }
        self.skinning_info = skinning_info;
        Ok(())
    }

    pub fn skinning_info(&self) -> Option<&SkinningInfo> {
        self.skinning_info.as_ref()
    }

    /// Number of attribute variations allocated for `org_vertex`
    pub fn num_duplicates(&self, org_vertex: u32) -> u32 {
        self.duplicate_counts
            .get(org_vertex as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of `(original vertex, duplicate)` slots
    pub fn num_compacted_vertices(&self) -> usize {
        self.duplicate_counts.iter().map(|&c| c as usize).sum()
    }

    pub fn begin_polygon(&mut self, material: u32) -> Result<(), BuildError> {
        if self.finalized {
            return Err(BuildError::AlreadyFinalized);
        }
        if self.open_polygon.is_some() {
            return Err(BuildError::NestedPolygon);
        }
        self.open_polygon = Some(OpenPolygon {
            material,
            corners: SmallVec::new(),
        });
        Ok(())
    }

    /// Add a corner of the open polygon, resolving its duplicate slot from the
    /// values staged in every layer
    pub fn add_polygon_vertex(&mut self, org_vertex: u32) -> Result<VertexLookup, BuildError> {
        if self.open_polygon.is_none() {
            return Err(BuildError::NoOpenPolygon);
        }
        if org_vertex as usize >= self.vertex_count {
            return Err(BuildError::VertexOutOfRange {
                vertex: org_vertex,
                count: self.vertex_count,
            });
        }
        if let Some(layer) = self
            .layers
            .iter()
            .find(|layer| layer.current_vertex_value().is_none())
        {
            return Err(BuildError::MissingLayerValue(layer.kind()));
        }

        let vertex = org_vertex as usize;
        let existing = if self.settings.optimize_duplicates {
            (0..self.duplicate_counts[vertex] as usize).find(|&duplicate_nr| {
                self.layers
                    .iter()
                    .all(|layer| layer.current_matches(vertex, duplicate_nr))
            })
        } else {
            None
        };

        let duplicate_nr = match existing {
            Some(duplicate_nr) => {
                for layer in &mut self.layers {
                    layer.discard_current();
                }
                duplicate_nr as u32
            }
            None => {
                for layer in &mut self.layers {
                    layer.commit_current(vertex);
                }
                self.duplicate_counts[vertex] += 1;
                self.duplicate_counts[vertex] - 1
            }
        };

        let lookup = VertexLookup {
            org_vertex,
            duplicate_nr,
        };
        if let Some(polygon) = self.open_polygon.as_mut() {
            polygon.corners.push(lookup);
        }
        Ok(lookup)
    }

    pub fn end_polygon(&mut self) -> Result<(), BuildError> {
        let polygon = self.open_polygon.take().ok_or(BuildError::NoOpenPolygon)?;
        let corners: [VertexLookup; 3] = polygon
            .corners
            .as_slice()
            .try_into()
            .map_err(|_| BuildError::MalformedPolygon(polygon.corners.len()))?;

        let sub_mesh = self.sub_mesh_for_polygon(polygon.material, &corners);
        self.sub_meshes[sub_mesh].add_polygon(corners);
        Ok(())
    }

    /// Only the open (most recently created) sub mesh of a material is tried;
    /// earlier sub meshes of that material are closed for good.
    fn sub_mesh_for_polygon(&mut self, material: u32, corners: &[VertexLookup; 3]) -> usize {
        let max_vertices = self.settings.max_sub_mesh_vertices;
        let max_indices = self.settings.max_sub_mesh_indices;

        if let Some(&open) = self.open_sub_meshes.get(&material)
            && self.sub_meshes[open].can_fit(corners, max_vertices, max_indices)
        {
            return open;
        }

        self.sub_meshes.push(SubMesh::new(material));
        let index = self.sub_meshes.len() - 1;
        self.open_sub_meshes.insert(material, index);
        index
    }

    /// Finalize the sub mesh layout and assign local vertex orders
    pub fn generate_sub_mesh_vertex_orders(&mut self) -> Result<(), BuildError> {
        if self.open_polygon.is_some() {
            return Err(BuildError::UnfinishedPolygon);
        }
        if self.finalized {
            return Err(BuildError::AlreadyFinalized);
        }

        for sub_mesh in &mut self.sub_meshes {
            sub_mesh.generate_vertex_order();
        }
        self.finalized = true;

        tracing::debug!(
            "Built {} sub meshes: {} original vertices -> {} compacted",
            self.sub_meshes.len(),
            self.vertex_count,
            self.num_compacted_vertices()
        );
        Ok(())
    }

    pub fn num_sub_meshes(&self) -> usize {
        self.sub_meshes.len()
    }

    pub fn sub_mesh(&self, index: usize) -> Option<&SubMesh> {
        self.sub_meshes.get(index)
    }

    /// Sub meshes in creation order
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }
}
