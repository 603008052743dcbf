//! Scene graph
//!
//! An arena of named nodes. Every node has a dot separated path from the root
//! (`root` itself has the empty path) and optional shared content. Content is
//! reference counted so a node can be mirrored under another parent without
//! copying its data.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::channel::VertexChannelData;
use crate::error::GraphError;
use crate::mesh_data::{BlendShapeData, MeshData};
use crate::skin_weights::SkinWeightData;

/// Separator between node names in a path
pub const PATH_SEPARATOR: char = '.';

/// Handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Surface description referenced by mesh face material ids
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
}

/// Local transform of a node, column major
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformData {
    pub matrix: [[f32; 4]; 4],
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

/// Node content
#[derive(Debug, Clone, PartialEq)]
pub enum GraphObject {
    Mesh(MeshData),
    Channel(VertexChannelData),
    SkinWeights(SkinWeightData),
    BlendShape(BlendShapeData),
    Material(MaterialData),
    Transform(TransformData),
}

impl GraphObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            GraphObject::Mesh(_) => "mesh",
            GraphObject::Channel(c) => c.values.kind_name(),
            GraphObject::SkinWeights(_) => "skin weights",
            GraphObject::BlendShape(_) => "blend shape",
            GraphObject::Material(_) => "material",
            GraphObject::Transform(_) => "transform",
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    path: String,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
    content: Option<Arc<GraphObject>>,
    end_point: bool,
}

/// Tree of named scene nodes
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    paths: HashMap<String, NodeIndex>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = Node {
            name: String::new(),
            path: String::new(),
            parent: None,
            children: Vec::new(),
            content: None,
            end_point: false,
        };
        let mut paths = HashMap::new();
        paths.insert(String::new(), NodeIndex(0));
        Self {
            nodes: vec![root],
            paths,
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in insertion order, root first
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len() as u32).map(NodeIndex)
    }

    /// Add a named child under `parent`
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        name: &str,
        content: impl Into<Arc<GraphObject>>,
    ) -> Result<NodeIndex, GraphError> {
        self.insert(parent, name, Some(content.into()))
    }

    /// Add a child without content, used for grouping
    pub fn add_empty_child(&mut self, parent: NodeIndex, name: &str) -> Result<NodeIndex, GraphError> {
        self.insert(parent, name, None)
    }

    fn insert(
        &mut self,
        parent: NodeIndex,
        name: &str,
        content: Option<Arc<GraphObject>>,
    ) -> Result<NodeIndex, GraphError> {
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(GraphError::InvalidName(name.to_string()));
        }
        let parent_node = self.node(parent)?;
        if parent_node.end_point {
            return Err(GraphError::EndPoint(parent_node.path.clone()));
        }

        let path = child_path(&parent_node.path, name);
        if self.paths.contains_key(&path) {
            return Err(GraphError::NameCollision(path));
        }

        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.to_string(),
            path: path.clone(),
            parent: Some(parent),
            children: Vec::new(),
            content,
            end_point: false,
        });
        self.nodes[parent.index()].children.push(index);
        self.paths.insert(path, index);
        Ok(index)
    }

    fn node(&self, index: NodeIndex) -> Result<&Node, GraphError> {
        self.nodes
            .get(index.index())
            .ok_or(GraphError::InvalidIndex(index.0))
    }

    /// Look up a node by its full path
    pub fn find(&self, path: &str) -> Option<NodeIndex> {
        self.paths.get(path).copied()
    }

    /// Look up a direct child of `parent` by name
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        let parent = self.nodes.get(parent.index())?;
        self.find(&child_path(&parent.path, name))
    }

    pub fn node_name(&self, index: NodeIndex) -> Option<&str> {
        self.nodes.get(index.index()).map(|n| n.name.as_str())
    }

    pub fn node_path(&self, index: NodeIndex) -> Option<&str> {
        self.nodes.get(index.index()).map(|n| n.path.as_str())
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.nodes.get(index.index()).and_then(|n| n.parent)
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.nodes
            .get(index.index())
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn content(&self, index: NodeIndex) -> Option<&GraphObject> {
        self.shared_content(index).map(Arc::as_ref)
    }

    /// Content handle, for mirroring a node elsewhere in the graph
    pub fn shared_content(&self, index: NodeIndex) -> Option<&Arc<GraphObject>> {
        self.nodes.get(index.index()).and_then(|n| n.content.as_ref())
    }

    /// Mark a node as a leaf; end points refuse children
    pub fn make_end_point(&mut self, index: NodeIndex) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(index.index())
            .ok_or(GraphError::InvalidIndex(index.0))?;
        node.end_point = true;
        Ok(())
    }

    pub fn is_end_point(&self, index: NodeIndex) -> bool {
        self.nodes
            .get(index.index())
            .is_some_and(|n| n.end_point)
    }

    /// Nodes holding mesh data, in insertion order
    pub fn mesh_nodes(&self) -> Vec<NodeIndex> {
        self.node_indices()
            .filter(|&i| matches!(self.content(i), Some(GraphObject::Mesh(_))))
            .collect()
    }
}

fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path}{PATH_SEPARATOR}{name}")
    }
}
