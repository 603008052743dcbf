//! Mesh builder for scene mesh optimization
//!
//! Turns a polygon soup with per-corner attributes into deduplicated vertex
//! buffers split into material-homogeneous sub meshes.
//!
//! # Modules
//!
//! - [`layer`] - Typed per-vertex attribute storage with duplicate slots
//! - [`builder`] - Vertex deduplication and sub mesh routing
//! - [`sub_mesh`] - Sub mesh vertex/index bookkeeping
//! - [`skinning`] - Bone influence capping and renormalization
//!
//! # Example
//!
//! ```
//! use mesh_builder::{BuilderSettings, LayerKind, MeshBuilder};
//!
//! let mut builder = MeshBuilder::new(3, BuilderSettings::default())?;
//! let positions = builder.add_layer(LayerKind::Position);
//!
//! builder.begin_polygon(0)?;
//! for (vertex, position) in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
//!     .into_iter()
//!     .enumerate()
//! {
//!     builder.set_current_vertex_value(positions, position)?;
//!     builder.add_polygon_vertex(vertex as u32)?;
//! }
//! builder.end_polygon()?;
//! builder.generate_sub_mesh_vertex_orders()?;
//!
//! assert_eq!(builder.num_sub_meshes(), 1);
//! # Ok::<(), mesh_builder::BuildError>(())
//! ```

pub mod builder;
pub mod error;
pub mod layer;
pub mod skinning;
pub mod sub_mesh;

pub use builder::{BuilderSettings, MeshBuilder, UNBOUNDED, VertexLookup};
pub use error::BuildError;
pub use layer::{LayerId, LayerKind, LayerValue, ValueKind, VertexAttributeLayer, VertexValue};
pub use skinning::{
    DEFAULT_MAX_WEIGHTS_PER_VERTEX, DEFAULT_WEIGHT_THRESHOLD, Influence, SkinningInfo,
};
pub use sub_mesh::SubMesh;
