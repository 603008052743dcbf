//! Errors raised while building an optimized mesh

use crate::layer::{LayerKind, ValueKind};

/// Precondition violation detected by the mesh builder.
///
/// Every variant is fatal to the build of the current mesh. The input that
/// produced it will fail the same way on every retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// A polygon corner or influence referenced a vertex past the used-vertex count
    #[error("original vertex {vertex} is out of range (mesh has {count} used vertices)")]
    VertexOutOfRange { vertex: u32, count: usize },

    /// A layer was read at a duplicate slot that was never allocated
    #[error("vertex {vertex} has no duplicate {duplicate_nr} in the {kind:?} layer")]
    DuplicateOutOfRange {
        kind: LayerKind,
        vertex: u32,
        duplicate_nr: u32,
    },

    /// Layer handle does not belong to this builder
    #[error("unknown layer handle {0}")]
    UnknownLayer(usize),

    /// A value of the wrong type was written to or read from a layer
    #[error("{kind:?} layer stores {expected:?} values, got {actual:?}")]
    ValueKindMismatch {
        kind: LayerKind,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// A corner was added before every layer received a value for it
    #[error("{0:?} layer has no value for the current vertex")]
    MissingLayerValue(LayerKind),

    /// `begin_polygon` was called while another polygon was open
    #[error("begin_polygon called while a polygon is still open")]
    NestedPolygon,

    /// Corner or end call without a matching `begin_polygon`
    #[error("no polygon is open")]
    NoOpenPolygon,

    /// Polygons must be triangles
    #[error("polygon has {0} vertices, expected 3")]
    MalformedPolygon(usize),

    /// Sub mesh orders were requested while a polygon was still open
    #[error("cannot generate sub mesh vertex orders while a polygon is open")]
    UnfinishedPolygon,

    /// Polygons were added after the sub mesh layout was finalized
    #[error("sub mesh vertex orders were already generated")]
    AlreadyFinalized,

    /// A sub mesh cap cannot hold a single triangle
    #[error("sub mesh {limit} limit of {value} is too small (at least 3 required)")]
    LimitTooSmall { limit: &'static str, value: usize },

    /// Skinning info does not cover the same vertices as the builder
    #[error("skinning info covers {skinning} vertices, mesh has {mesh}")]
    SkinningSizeMismatch { skinning: usize, mesh: usize },
}
