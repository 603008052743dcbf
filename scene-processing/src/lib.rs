//! Scene processing for imported assets
//!
//! Holds the in-memory scene model produced by importers and the mesh
//! optimization pass that turns authored meshes into deduplicated,
//! sub mesh partitioned meshes ready for GPU upload.
//!
//! - [`graph`] - Scene graph of named nodes with shared content
//! - [`mesh_data`], [`channel`], [`skin_weights`] - Node content types
//! - [`config`] - Mesh groups and their rules
//! - [`optimize`] - Optimization of a single mesh and its blend shapes
//! - [`optimizer`] - Scene driver that inserts `<node>_optimized` siblings

pub mod channel;
pub mod config;
pub mod error;
pub mod graph;
pub mod mesh_data;
pub mod optimize;
pub mod optimizer;
pub mod skin_weights;

pub use channel::{VertexChannel, VertexChannelData};
pub use config::{LodRule, MeshGroup, SkinRule, SubMeshLimits};
pub use error::{GraphError, OptimizeError};
pub use graph::{GraphObject, MaterialData, NodeIndex, PATH_SEPARATOR, SceneGraph, TransformData};
pub use mesh_data::{BlendShapeData, Face, MeshData, MeshGeometry, SubMeshRange};
pub use optimize::{OptimizedMesh, optimize_blend_shape, optimize_mesh};
pub use optimizer::{
    FailedNode, OPTIMIZED_MESH_SUFFIX, OptimizeReport, OptimizedNode, SKIN_WEIGHTS_NODE_NAME,
    SkippedNode, default_mesh_group, optimize_scene,
};
pub use skin_weights::{SkinLink, SkinWeightData};
