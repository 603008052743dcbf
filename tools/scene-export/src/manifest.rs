//! scene.toml manifest parsing
//!
//! ```toml
//! output_dir = "build/meshes"
//!
//! [[mesh_groups]]
//! name = "hero"
//! nodes = ["hero.body", "hero.head"]
//! optimize_duplicates = true
//!
//! [mesh_groups.skin]
//! max_weights_per_vertex = 4
//! weight_threshold = 0.001
//!
//! [mesh_groups.lod]
//! levels = [["hero.body_lod1"], ["hero.body_lod2"]]
//!
//! [mesh_groups.limits]
//! max_vertices = 65535
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use scene_processing::{MeshGroup, SceneGraph, default_mesh_group};
use serde::Deserialize;

/// Smallest sub mesh cap that still fits one triangle
const MIN_SUB_MESH_LIMIT: usize = 3;

/// scene.toml manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct SceneManifest {
    /// Default output directory, the `-o` flag overrides it
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub mesh_groups: Vec<MeshGroup>,
}

impl SceneManifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Failed to parse scene.toml")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check rule values that deserialize fine but cannot be applied
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for group in &self.mesh_groups {
            if group.name.is_empty() {
                bail!("Mesh group names must not be empty");
            }
            if !names.insert(group.name.as_str()) {
                bail!("Duplicate mesh group name '{}'", group.name);
            }
            if group.limits.max_vertices < MIN_SUB_MESH_LIMIT
                || group.limits.max_indices < MIN_SUB_MESH_LIMIT
            {
                bail!(
                    "Mesh group '{}': sub mesh limits must be at least {} (got max_vertices={}, max_indices={})",
                    group.name,
                    MIN_SUB_MESH_LIMIT,
                    group.limits.max_vertices,
                    group.limits.max_indices
                );
            }
            if let Some(skin) = &group.skin {
                if skin.max_weights_per_vertex == 0 {
                    bail!(
                        "Mesh group '{}': max_weights_per_vertex must be at least 1",
                        group.name
                    );
                }
                if !(0.0..1.0).contains(&skin.weight_threshold) {
                    bail!(
                        "Mesh group '{}': weight_threshold must be in [0, 1), got {}",
                        group.name,
                        skin.weight_threshold
                    );
                }
            }
            if group.selected_nodes().next().is_none() {
                tracing::warn!("Mesh group '{}' selects no nodes", group.name);
            }
        }
        Ok(())
    }

    /// Groups to run on `graph`; without configured groups every mesh is selected
    pub fn mesh_groups_for(&self, graph: &SceneGraph) -> Vec<MeshGroup> {
        if self.mesh_groups.is_empty() {
            return vec![default_mesh_group(graph)];
        }

        for group in &self.mesh_groups {
            for path in group.selected_nodes() {
                if graph.find(path).is_none() {
                    tracing::warn!("Mesh group '{}' selects unknown node '{}'", group.name, path);
                }
            }
        }
        self.mesh_groups.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_builder::UNBOUNDED;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = SceneManifest::parse(
            r#"
            output_dir = "out"

            [[mesh_groups]]
            name = "hero"
            nodes = ["hero.body"]
            optimize_duplicates = false

            [mesh_groups.skin]
            max_weights_per_vertex = 2

            [mesh_groups.lod]
            levels = [["hero.body_lod1"]]

            [mesh_groups.limits]
            max_vertices = 300

            [[mesh_groups]]
            name = "props"
            nodes = ["crate"]
            "#,
        )
        .unwrap();

        assert_eq!(manifest.output_dir, Some(PathBuf::from("out")));
        assert_eq!(manifest.mesh_groups.len(), 2);

        let hero = &manifest.mesh_groups[0];
        assert!(!hero.optimize_duplicates);
        assert_eq!(hero.skin_rule().max_weights_per_vertex, 2);
        assert_eq!(hero.skin_rule().weight_threshold, 0.001);
        assert!(hero.selects("hero.body_lod1"));
        assert_eq!(hero.limits.max_vertices, 300);
        assert_eq!(hero.limits.max_indices, UNBOUNDED);

        let props = &manifest.mesh_groups[1];
        assert!(props.optimize_duplicates);
        assert!(props.skin.is_none());
    }

    #[test]
    fn test_empty_manifest_uses_default_group() {
        let manifest = SceneManifest::parse("").unwrap();
        assert!(manifest.mesh_groups.is_empty());

        let groups = manifest.mesh_groups_for(&SceneGraph::new());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "default");
    }

    #[test]
    fn test_rejects_duplicate_group_names() {
        let err = SceneManifest::parse(
            r#"
            [[mesh_groups]]
            name = "a"
            [[mesh_groups]]
            name = "a"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate mesh group name"));
    }

    #[test]
    fn test_rejects_tiny_limits() {
        let err = SceneManifest::parse(
            r#"
            [[mesh_groups]]
            name = "a"
            [mesh_groups.limits]
            max_indices = 2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        assert!(
            SceneManifest::parse(
                r#"
                [[mesh_groups]]
                name = "a"
                [mesh_groups.skin]
                weight_threshold = 1.5
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_malformed_toml() {
        let err = SceneManifest::parse("[[mesh_groups]\nname = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse scene.toml"));
    }
}
