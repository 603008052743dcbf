//! Error types for scene graph edits and mesh optimization

use mesh_builder::BuildError;

/// Scene graph edit failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("invalid node name {0:?}: names must be non-empty and must not contain '.'")]
    InvalidName(String),

    #[error("a node already exists at {0:?}")]
    NameCollision(String),

    #[error("node index {0} is not part of this graph")]
    InvalidIndex(u32),

    #[error("node {0:?} is an end point and cannot have children")]
    EndPoint(String),
}

/// Failure to optimize one mesh node.
///
/// The scene driver logs these and moves on to the next mesh.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A per-vertex stream does not cover every mesh vertex
    #[error("{stream} has {actual} entries, mesh has {expected} vertices")]
    StreamLength {
        stream: String,
        expected: usize,
        actual: usize,
    },

    /// A face references a vertex past the end of the mesh
    #[error("face {face} references vertex {vertex}, mesh has {vertex_count} vertices")]
    FaceIndexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    /// A vertex has no control point, or its control point is not a used point
    #[error("vertex {0} is not mapped to a used control point")]
    UnmappedVertex(u32),

    /// A blend shape does not share the base mesh face topology
    #[error("blend shape has {blend_shape} faces, base mesh has {base}")]
    FaceCountMismatch { blend_shape: usize, base: usize },

    /// A skin link points at a bone id without a name
    #[error("skin link references unknown bone id {0}")]
    UnknownBone(u32),
}
