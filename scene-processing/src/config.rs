//! Mesh group configuration
//!
//! A mesh group selects scene nodes by path and carries the rules applied
//! when optimizing them. Groups deserialize from the `[[mesh_groups]]` tables
//! of a scene manifest.

use mesh_builder::{
    BuilderSettings, DEFAULT_MAX_WEIGHTS_PER_VERTEX, DEFAULT_WEIGHT_THRESHOLD, UNBOUNDED,
};
use serde::{Deserialize, Serialize};

fn default_max_weights_per_vertex() -> u32 {
    DEFAULT_MAX_WEIGHTS_PER_VERTEX
}

fn default_weight_threshold() -> f32 {
    DEFAULT_WEIGHT_THRESHOLD
}

fn default_unbounded() -> usize {
    UNBOUNDED
}

fn default_true() -> bool {
    true
}

/// Skinning limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinRule {
    #[serde(default = "default_max_weights_per_vertex")]
    pub max_weights_per_vertex: u32,
    #[serde(default = "default_weight_threshold")]
    pub weight_threshold: f32,
}

impl Default for SkinRule {
    fn default() -> Self {
        Self {
            max_weights_per_vertex: DEFAULT_MAX_WEIGHTS_PER_VERTEX,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
        }
    }
}

/// Extra node selections, one list per level of detail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodRule {
    #[serde(default)]
    pub levels: Vec<Vec<String>>,
}

/// Per sub mesh caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMeshLimits {
    #[serde(default = "default_unbounded")]
    pub max_vertices: usize,
    #[serde(default = "default_unbounded")]
    pub max_indices: usize,
}

impl Default for SubMeshLimits {
    fn default() -> Self {
        Self {
            max_vertices: UNBOUNDED,
            max_indices: UNBOUNDED,
        }
    }
}

/// A set of scene nodes exported together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshGroup {
    pub name: String,
    /// Selected node paths
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<SkinRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lod: Option<LodRule>,
    #[serde(default)]
    pub limits: SubMeshLimits,
    #[serde(default = "default_true")]
    pub optimize_duplicates: bool,
}

impl MeshGroup {
    pub fn new(name: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            nodes,
            skin: None,
            lod: None,
            limits: SubMeshLimits::default(),
            optimize_duplicates: true,
        }
    }

    /// Skin rule in effect, defaults when the group has none
    pub fn skin_rule(&self) -> SkinRule {
        self.skin.unwrap_or_default()
    }

    /// Every node path this group selects: its own list followed by each LOD list
    pub fn selected_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .chain(self.lod.iter().flat_map(|lod| lod.levels.iter().flatten()))
            .map(String::as_str)
    }

    pub fn selects(&self, path: &str) -> bool {
        self.selected_nodes().any(|selected| selected == path)
    }

    /// Builder settings for one mesh; meshes with blend shapes keep every corner
    pub fn builder_settings(&self, has_blend_shapes: bool) -> BuilderSettings {
        BuilderSettings {
            max_sub_mesh_vertices: self.limits.max_vertices,
            max_sub_mesh_indices: self.limits.max_indices,
            optimize_duplicates: self.optimize_duplicates && !has_blend_shapes,
        }
    }
}
