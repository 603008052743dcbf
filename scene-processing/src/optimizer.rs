//! Scene level mesh optimization
//!
//! For every mesh node selected by a mesh group, an optimized copy is added as a
//! sibling named `<node>_optimized`. Its children are the optimized channels, a
//! `skinWeights` node, the optimized blend shapes, and every other child of the
//! source node mirrored by reference.
//!
//! Work is planned up front in graph order, the meshes are optimized in parallel,
//! and the results are inserted in plan order, so the resulting graph does not
//! depend on thread scheduling.

use hashbrown::HashSet;
use rayon::prelude::*;

use crate::config::MeshGroup;
use crate::error::{GraphError, OptimizeError};
use crate::graph::{GraphObject, NodeIndex, PATH_SEPARATOR, SceneGraph};
use crate::mesh_data::{BlendShapeData, MeshGeometry};
use crate::optimize::{OptimizedMesh, optimize_blend_shape, optimize_mesh};

/// Name suffix of optimized mesh nodes
pub const OPTIMIZED_MESH_SUFFIX: &str = "_optimized";

/// Name of the skin weight node under an optimized mesh
pub const SKIN_WEIGHTS_NODE_NAME: &str = "skinWeights";

/// A mesh node that was optimized
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedNode {
    pub source: String,
    pub optimized: String,
    pub node: NodeIndex,
    pub group: String,
    pub vertex_count: usize,
    pub face_count: usize,
    pub sub_mesh_count: usize,
}

/// A (node, group) pair skipped because the optimized node already exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    pub source: String,
    pub group: String,
    pub existing: String,
}

/// A (node, group) pair whose optimization failed
#[derive(Debug, Clone, PartialEq)]
pub struct FailedNode {
    pub source: String,
    pub group: String,
    pub error: OptimizeError,
}

/// Outcome of [`optimize_scene`]
#[derive(Debug, Clone, Default)]
pub struct OptimizeReport {
    pub optimized: Vec<OptimizedNode>,
    pub skipped: Vec<SkippedNode>,
    pub failed: Vec<FailedNode>,
}

impl OptimizeReport {
    /// No mesh failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Group selecting every mesh node in the graph
pub fn default_mesh_group(graph: &SceneGraph) -> MeshGroup {
    let nodes = graph
        .mesh_nodes()
        .into_iter()
        .filter_map(|node| graph.node_path(node).map(str::to_string))
        .collect();
    MeshGroup::new("default", nodes)
}

struct Job<'a> {
    node: NodeIndex,
    parent: NodeIndex,
    group: &'a MeshGroup,
    name: String,
}

struct JobOutput {
    optimized: OptimizedMesh,
    channel_sources: Vec<NodeIndex>,
    blend_shapes: Vec<(NodeIndex, BlendShapeData)>,
    mirrored: Vec<NodeIndex>,
}

/// Optimize every selected mesh node of `graph` and insert the results
pub fn optimize_scene(graph: &mut SceneGraph, groups: &[MeshGroup]) -> OptimizeReport {
    let mut report = OptimizeReport::default();
    let jobs = plan(graph, groups, &mut report);

    let outputs: Vec<Result<JobOutput, OptimizeError>> = {
        let graph = &*graph;
        jobs.par_iter().map(|job| compute(graph, job)).collect()
    };

    for (job, output) in jobs.iter().zip(outputs) {
        let source = graph.node_path(job.node).unwrap_or_default().to_string();
        let result = output.and_then(|output| {
            let vertex_count = output.optimized.mesh.vertex_count();
            let face_count = output.optimized.mesh.face_count();
            let sub_mesh_count = output.optimized.mesh.sub_meshes().len();
            let node = insert(graph, job, output)?;
            Ok(OptimizedNode {
                source: source.clone(),
                optimized: graph.node_path(node).unwrap_or_default().to_string(),
                node,
                group: job.group.name.clone(),
                vertex_count,
                face_count,
                sub_mesh_count,
            })
        });

        match result {
            Ok(optimized) => {
                tracing::debug!(
                    "Optimized '{}' -> '{}': {} vertices, {} faces, {} sub meshes",
                    optimized.source,
                    optimized.optimized,
                    optimized.vertex_count,
                    optimized.face_count,
                    optimized.sub_mesh_count
                );
                report.optimized.push(optimized);
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to optimize mesh '{}' for group '{}': {}",
                    source,
                    job.group.name,
                    error
                );
                report.failed.push(FailedNode {
                    source,
                    group: job.group.name.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        "Mesh optimization: {} optimized, {} skipped, {} failed",
        report.optimized.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}

/// Decide which (node, group) pairs run, skipping output name collisions
fn plan<'a>(graph: &SceneGraph, groups: &'a [MeshGroup], report: &mut OptimizeReport) -> Vec<Job<'a>> {
    let mut jobs = Vec::new();
    let mut planned: HashSet<(NodeIndex, String)> = HashSet::new();

    for node in graph.mesh_nodes() {
        let (Some(path), Some(name), Some(parent)) =
            (graph.node_path(node), graph.node_name(node), graph.parent(node))
        else {
            continue;
        };

        for group in groups.iter().filter(|group| group.selects(path)) {
            let optimized_name = format!("{name}{OPTIMIZED_MESH_SUFFIX}");
            let key = (parent, optimized_name.clone());
            if graph.find_child(parent, &optimized_name).is_some() || planned.contains(&key) {
                let existing = match graph.node_path(parent) {
                    Some("") | None => optimized_name,
                    Some(parent_path) => format!("{parent_path}{PATH_SEPARATOR}{optimized_name}"),
                };
                tracing::info!(
                    "Optimized mesh already exists at '{}', there must be multiple mesh groups that have selected this mesh. Skipping group '{}'.",
                    existing,
                    group.name
                );
                report.skipped.push(SkippedNode {
                    source: path.to_string(),
                    group: group.name.clone(),
                    existing,
                });
                continue;
            }

            planned.insert(key);
            jobs.push(Job {
                node,
                parent,
                group,
                name: optimized_name,
            });
        }
    }

    jobs
}

/// Optimize one mesh node and its data children without touching the graph
fn compute(graph: &SceneGraph, job: &Job<'_>) -> Result<JobOutput, OptimizeError> {
    let Some(GraphObject::Mesh(mesh)) = graph.content(job.node) else {
        return Err(GraphError::InvalidIndex(job.node.index() as u32).into());
    };

    let mut channels = Vec::new();
    let mut channel_sources = Vec::new();
    let mut skin_weights = Vec::new();
    let mut blend_shapes = Vec::new();
    let mut mirrored = Vec::new();
    for &child in graph.children(job.node) {
        match graph.content(child) {
            Some(GraphObject::Channel(channel)) => {
                channels.push(channel);
                channel_sources.push(child);
            }
            Some(GraphObject::SkinWeights(skin)) => skin_weights.push(skin),
            Some(GraphObject::BlendShape(shape)) => blend_shapes.push((child, shape)),
            // child meshes are optimized on their own
            Some(GraphObject::Mesh(_)) => {}
            _ => mirrored.push(child),
        }
    }

    let has_blend_shapes = !blend_shapes.is_empty();
    let optimized = optimize_mesh(mesh, &channels, &skin_weights, job.group, has_blend_shapes)?;
    let blend_shapes = blend_shapes
        .into_iter()
        .map(|(node, shape)| {
            optimize_blend_shape(shape, mesh, job.group, has_blend_shapes).map(|shape| (node, shape))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JobOutput {
        optimized,
        channel_sources,
        blend_shapes,
        mirrored,
    })
}

fn owned_name(graph: &SceneGraph, node: NodeIndex) -> String {
    graph.node_name(node).unwrap_or_default().to_string()
}

fn add_mirrored_end_point(graph: &mut SceneGraph, source: NodeIndex, node: NodeIndex) -> Result<(), GraphError> {
    if graph.is_end_point(source) {
        graph.make_end_point(node)?;
    }
    Ok(())
}

/// Fail before any node is added when two children of the optimized node
/// would share a name
fn check_child_names(graph: &SceneGraph, job: &Job<'_>, output: &JobOutput) -> Result<(), GraphError> {
    let name_of = move |node: NodeIndex| graph.node_name(node).unwrap_or_default();
    let skin = output
        .optimized
        .skin_weights
        .as_ref()
        .map(|_| SKIN_WEIGHTS_NODE_NAME);
    let names = output
        .channel_sources
        .iter()
        .map(|&node| name_of(node))
        .chain(skin)
        .chain(output.blend_shapes.iter().map(|(node, _)| name_of(*node)))
        .chain(output.mirrored.iter().map(|&node| name_of(node)));

    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            let path = match graph.node_path(job.parent) {
                Some("") | None => format!("{}{PATH_SEPARATOR}{name}", job.name),
                Some(parent) => format!("{parent}{PATH_SEPARATOR}{}{PATH_SEPARATOR}{name}", job.name),
            };
            return Err(GraphError::NameCollision(path));
        }
    }
    Ok(())
}

/// Add the optimized node and its children to the graph
fn insert(graph: &mut SceneGraph, job: &Job<'_>, output: JobOutput) -> Result<NodeIndex, OptimizeError> {
    check_child_names(graph, job, &output)?;
    let OptimizedMesh {
        mesh,
        channels,
        skin_weights,
    } = output.optimized;
    let optimized = graph.add_child(job.parent, &job.name, GraphObject::Mesh(mesh))?;

    for (source, channel) in output.channel_sources.into_iter().zip(channels) {
        let name = owned_name(graph, source);
        let node = graph.add_child(optimized, &name, GraphObject::Channel(channel))?;
        add_mirrored_end_point(graph, source, node)?;
    }

    if let Some(skin_weights) = skin_weights {
        let node = graph.add_child(
            optimized,
            SKIN_WEIGHTS_NODE_NAME,
            GraphObject::SkinWeights(skin_weights),
        )?;
        graph.make_end_point(node)?;
    }

    for (source, shape) in output.blend_shapes {
        let name = owned_name(graph, source);
        let node = graph.add_child(optimized, &name, GraphObject::BlendShape(shape))?;
        add_mirrored_end_point(graph, source, node)?;
    }

    for source in output.mirrored {
        let name = owned_name(graph, source);
        let node = match graph.shared_content(source).cloned() {
            Some(content) => graph.add_child(optimized, &name, content)?,
            None => graph.add_empty_child(optimized, &name)?,
        };
        add_mirrored_end_point(graph, source, node)?;
    }

    Ok(optimized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{VertexChannel, VertexChannelData};
    use crate::graph::MaterialData;
    use crate::mesh_data::MeshData;
    use crate::skin_weights::{SkinLink, SkinWeightData};

    /// Two triangles sharing an edge, unwelded: 6 vertices, 4 control points
    fn quad() -> MeshData {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut mesh = MeshData::new();
        for (vertex, control_point) in [0u32, 1, 2, 0, 2, 3].into_iter().enumerate() {
            mesh.add_position(positions[control_point as usize]);
            mesh.add_normal([0.0, 0.0, 1.0]);
            mesh.set_vertex_index_to_control_point_index_map(vertex as u32, control_point);
        }
        mesh.add_face([0, 1, 2], 0);
        mesh.add_face([3, 4, 5], 0);
        mesh
    }

    fn scene() -> (SceneGraph, NodeIndex) {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mesh = graph
            .add_child(root, "quad", GraphObject::Mesh(quad()))
            .unwrap();
        let uv = graph
            .add_child(
                mesh,
                "TEXCOORD_0",
                GraphObject::Channel(VertexChannelData::new(VertexChannel::Uv(vec![[0.0, 0.0]; 6]))),
            )
            .unwrap();
        graph.make_end_point(uv).unwrap();
        graph
            .add_child(
                mesh,
                "material",
                GraphObject::Material(MaterialData {
                    name: "stone".to_string(),
                    base_color: [0.5, 0.5, 0.5, 1.0],
                }),
            )
            .unwrap();
        (graph, mesh)
    }

    #[test]
    fn test_inserts_optimized_sibling() {
        let (mut graph, source) = scene();
        let group = default_mesh_group(&graph);
        assert_eq!(group.nodes, vec!["quad".to_string()]);

        let report = optimize_scene(&mut graph, &[group]);
        assert!(report.is_clean());
        assert_eq!(report.optimized.len(), 1);

        let optimized = graph.find("quad_optimized").unwrap();
        assert_eq!(report.optimized[0].node, optimized);
        assert_eq!(report.optimized[0].vertex_count, 4);
        assert_eq!(graph.parent(optimized), graph.parent(source));

        let Some(GraphObject::Mesh(mesh)) = graph.content(optimized) else {
            panic!("optimized node holds no mesh");
        };
        assert_eq!(mesh.vertex_count(), 4);

        let uv = graph.find("quad_optimized.TEXCOORD_0").unwrap();
        assert!(graph.is_end_point(uv));
        let Some(GraphObject::Channel(channel)) = graph.content(uv) else {
            panic!("uv node holds no channel");
        };
        assert_eq!(channel.len(), 4);

        // non-optimized children are shared, not copied
        let material = graph.find("quad_optimized.material").unwrap();
        let original = graph.find("quad.material").unwrap();
        assert!(std::sync::Arc::ptr_eq(
            graph.shared_content(material).unwrap(),
            graph.shared_content(original).unwrap()
        ));
    }

    #[test]
    fn test_second_group_is_skipped() {
        let (mut graph, _) = scene();
        let groups = [
            MeshGroup::new("first", vec!["quad".to_string()]),
            MeshGroup::new("second", vec!["quad".to_string()]),
        ];

        let report = optimize_scene(&mut graph, &groups);
        assert_eq!(report.optimized.len(), 1);
        assert_eq!(report.optimized[0].group, "first");
        assert_eq!(
            report.skipped,
            vec![SkippedNode {
                source: "quad".to_string(),
                group: "second".to_string(),
                existing: "quad_optimized".to_string(),
            }]
        );

        // running again finds the existing node
        let report = optimize_scene(&mut graph, &groups[..1]);
        assert!(report.optimized.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_lod_lists_select_nodes() {
        let (mut graph, _) = scene();
        let root = graph.root();
        graph
            .add_child(root, "quad_lod1", GraphObject::Mesh(quad()))
            .unwrap();

        let mut group = MeshGroup::new("hero", vec![]);
        group.lod = Some(crate::config::LodRule {
            levels: vec![vec!["quad_lod1".to_string()]],
        });

        let report = optimize_scene(&mut graph, &[group]);
        assert_eq!(report.optimized.len(), 1);
        assert_eq!(report.optimized[0].source, "quad_lod1");
        assert!(graph.find("quad_lod1_optimized").is_some());
        assert!(graph.find("quad_optimized").is_none());
    }

    #[test]
    fn test_failure_does_not_stop_other_meshes() {
        let (mut graph, _) = scene();
        let root = graph.root();
        let broken = graph
            .add_child(root, "broken", GraphObject::Mesh(quad()))
            .unwrap();
        graph
            .add_child(
                broken,
                "colors",
                GraphObject::Channel(VertexChannelData::new(VertexChannel::Color(vec![[1.0; 4]; 2]))),
            )
            .unwrap();

        let group = default_mesh_group(&graph);
        let report = optimize_scene(&mut graph, &[group]);

        assert_eq!(report.optimized.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source, "broken");
        assert!(matches!(
            report.failed[0].error,
            OptimizeError::StreamLength { actual: 2, .. }
        ));
        assert!(graph.find("broken_optimized").is_none());
    }

    #[test]
    fn test_child_name_collision_leaves_graph_unchanged() {
        let (mut graph, source) = scene();
        let mut skin = SkinWeightData::new();
        let bone_id = skin.bone_id("root");
        for control_point in 0..4 {
            skin.append_link(control_point, SkinLink { bone_id, weight: 1.0 });
        }
        graph
            .add_child(source, "skin", GraphObject::SkinWeights(skin))
            .unwrap();
        // mirrored as is, clashes with the optimized skin node
        graph.add_empty_child(source, SKIN_WEIGHTS_NODE_NAME).unwrap();
        let node_count = graph.node_count();

        let group = default_mesh_group(&graph);
        let report = optimize_scene(&mut graph, &[group]);

        assert!(report.optimized.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed[0].error,
            OptimizeError::Graph(GraphError::NameCollision(
                "quad_optimized.skinWeights".to_string()
            ))
        );
        assert!(graph.find("quad_optimized").is_none());
        assert_eq!(graph.node_count(), node_count);
    }

    #[test]
    fn test_skin_weights_and_blend_shapes() {
        let (mut graph, source) = scene();
        let mut skin = SkinWeightData::new();
        for control_point in 0..4 {
            let bone_id = skin.bone_id("root");
            skin.append_link(control_point, SkinLink { bone_id, weight: 1.0 });
        }
        graph
            .add_child(source, "skin", GraphObject::SkinWeights(skin))
            .unwrap();

        let mut shape = BlendShapeData::new();
        let base = quad();
        for vertex in 0..6 {
            let [x, y, z] = base.position(vertex).unwrap();
            shape.add_position([x, y, z + 1.0]);
            shape.add_normal([0.0, 0.0, 1.0]);
            shape.set_vertex_index_to_control_point_index_map(
                vertex,
                base.control_point_index(vertex).unwrap(),
            );
        }
        shape.add_face([0, 1, 2]);
        shape.add_face([3, 4, 5]);
        let shape_node = graph
            .add_child(source, "smile", GraphObject::BlendShape(shape))
            .unwrap();
        graph.make_end_point(shape_node).unwrap();

        let group = default_mesh_group(&graph);
        let report = optimize_scene(&mut graph, &[group]);
        assert!(report.is_clean());
        // blend shapes keep every corner
        assert_eq!(report.optimized[0].vertex_count, 6);

        let skin = graph.find("quad_optimized.skinWeights").unwrap();
        assert!(graph.is_end_point(skin));
        let Some(GraphObject::SkinWeights(skin)) = graph.content(skin) else {
            panic!("skin node holds no skin weights");
        };
        assert_eq!(skin.vertex_count(), 6);
        assert_eq!(skin.bone_names(), &["root".to_string()]);

        let smile = graph.find("quad_optimized.smile").unwrap();
        assert!(graph.is_end_point(smile));
        let Some(GraphObject::BlendShape(smile)) = graph.content(smile) else {
            panic!("blend shape node holds no blend shape");
        };
        assert_eq!(smile.vertex_count(), 6);
        assert_eq!(smile.faces(), &[[0, 1, 2], [3, 4, 5]]);
    }
}
