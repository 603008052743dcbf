//! Skinning influence compaction
//!
//! Collects the bone influences of every used vertex, then drops weak links,
//! caps the influence count and renormalizes what survives.

use smallvec::SmallVec;

use crate::error::BuildError;

/// Default maximum number of bone influences kept per vertex
pub const DEFAULT_MAX_WEIGHTS_PER_VERTEX: u32 = 4;

/// Default threshold below which an influence is dropped
pub const DEFAULT_WEIGHT_THRESHOLD: f32 = 0.001;

/// One bone influencing a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    /// Bone id, resolved to a bone name by the owner of the skin data
    pub bone: u32,
    pub weight: f32,
}

impl Influence {
    pub fn new(bone: u32, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Per used-vertex influence lists
#[derive(Debug, Clone, Default)]
pub struct SkinningInfo {
    influences: Vec<SmallVec<[Influence; 4]>>,
}

impl SkinningInfo {
    /// Create empty influence lists for `org_vertex_count` used vertices
    pub fn new(org_vertex_count: usize) -> Self {
        Self {
            influences: vec![SmallVec::new(); org_vertex_count],
        }
    }

    pub fn num_org_vertices(&self) -> usize {
        self.influences.len()
    }

    pub fn add_influence(&mut self, org_vertex: u32, influence: Influence) -> Result<(), BuildError> {
        let count = self.influences.len();
        self.influences
            .get_mut(org_vertex as usize)
            .ok_or(BuildError::VertexOutOfRange {
                vertex: org_vertex,
                count,
            })?
            .push(influence);
        Ok(())
    }

    pub fn num_influences(&self, org_vertex: u32) -> usize {
        self.influences(org_vertex).len()
    }

    /// Influences of `org_vertex`, empty when out of range
    pub fn influences(&self, org_vertex: u32) -> &[Influence] {
        self.influences
            .get(org_vertex as usize)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Drop links below `weight_threshold`, keep the `max_weights_per_vertex`
    /// strongest and renormalize them to sum to 1.
    ///
    /// Lists end up sorted by descending weight; equal weights keep the order
    /// in which they were added. A vertex whose links are all below the
    /// threshold ends up with no influences.
    pub fn optimize(&mut self, max_weights_per_vertex: u32, weight_threshold: f32) {
        let mut emptied = 0usize;
        for list in &mut self.influences {
            let had_links = !list.is_empty();
            optimize_influences(list, max_weights_per_vertex as usize, weight_threshold);
            if had_links && list.is_empty() {
                emptied += 1;
            }
        }

        if emptied > 0 {
            tracing::warn!(
                "{} skinned vertices have no influence above the weight threshold {}",
                emptied,
                weight_threshold
            );
        }
    }
}

fn optimize_influences(list: &mut SmallVec<[Influence; 4]>, max: usize, threshold: f32) {
    list.retain(|influence| influence.weight >= threshold);

    // Stable sort keeps first-seen order for equal weights
    list.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    list.truncate(max);

    let total: f32 = list.iter().map(|influence| influence.weight).sum();
    if total > 0.0 {
        for influence in list.iter_mut() {
            influence.weight /= total;
        }
    }
}
