//! Skin weight nodes

use hashbrown::HashMap;
use smallvec::SmallVec;

/// One bone influence on a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinLink {
    /// Index into the bone name table of the owning [`SkinWeightData`]
    pub bone_id: u32,
    pub weight: f32,
}

/// Bone influences per vertex, with bones identified by name.
///
/// Bone ids are local to one object; the same bone may have different ids in
/// two skin weight nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinWeightData {
    links: Vec<SmallVec<[SkinLink; 4]>>,
    bone_names: Vec<String>,
    bone_ids: HashMap<String, u32>,
}

impl SkinWeightData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for `vertex_count` link lists
    pub fn resize_container_space(&mut self, vertex_count: usize) {
        self.links.resize(vertex_count, SmallVec::new());
    }

    pub fn vertex_count(&self) -> usize {
        self.links.len()
    }

    pub fn link_count(&self, vertex: usize) -> usize {
        self.links(vertex).len()
    }

    pub fn links(&self, vertex: usize) -> &[SkinLink] {
        self.links.get(vertex).map(|l| l.as_slice()).unwrap_or(&[])
    }

    /// Append a link, growing the container if needed
    pub fn append_link(&mut self, vertex: usize, link: SkinLink) {
        if vertex >= self.links.len() {
            self.links.resize(vertex + 1, SmallVec::new());
        }
        self.links[vertex].push(link);
    }

    /// Id of `name`, registering the bone if it is new
    pub fn bone_id(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.bone_ids.get(name) {
            return id;
        }
        let id = self.bone_names.len() as u32;
        self.bone_names.push(name.to_string());
        self.bone_ids.insert(name.to_string(), id);
        id
    }

    pub fn find_bone_id(&self, name: &str) -> Option<u32> {
        self.bone_ids.get(name).copied()
    }

    pub fn bone_name(&self, bone_id: u32) -> Option<&str> {
        self.bone_names.get(bone_id as usize).map(String::as_str)
    }

    /// Bone names in id order
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    pub fn bone_count(&self) -> usize {
        self.bone_names.len()
    }
}
