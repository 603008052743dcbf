//! Optional per-vertex channels stored next to a mesh

use mesh_builder::{BuildError, LayerKind, VertexValue};

/// Values of one channel, one entry per mesh vertex
#[derive(Debug, Clone, PartialEq)]
pub enum VertexChannel {
    Uv(Vec<[f32; 2]>),
    /// xyz direction, w handedness
    Tangent(Vec<[f32; 4]>),
    Bitangent(Vec<[f32; 3]>),
    /// Linear RGBA
    Color(Vec<[f32; 4]>),
}

impl VertexChannel {
    /// Empty channel of the same kind, sized for `capacity` entries
    pub fn empty_like(&self, capacity: usize) -> Self {
        match self {
            VertexChannel::Uv(_) => VertexChannel::Uv(Vec::with_capacity(capacity)),
            VertexChannel::Tangent(_) => VertexChannel::Tangent(Vec::with_capacity(capacity)),
            VertexChannel::Bitangent(_) => VertexChannel::Bitangent(Vec::with_capacity(capacity)),
            VertexChannel::Color(_) => VertexChannel::Color(Vec::with_capacity(capacity)),
        }
    }

    /// Builder layer that stores this channel
    pub fn layer_kind(&self) -> LayerKind {
        match self {
            VertexChannel::Uv(_) => LayerKind::Uv,
            VertexChannel::Tangent(_) => LayerKind::Tangent,
            VertexChannel::Bitangent(_) => LayerKind::Bitangent,
            VertexChannel::Color(_) => LayerKind::Color,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            VertexChannel::Uv(_) => "uv",
            VertexChannel::Tangent(_) => "tangent",
            VertexChannel::Bitangent(_) => "bitangent",
            VertexChannel::Color(_) => "color",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VertexChannel::Uv(v) => v.len(),
            VertexChannel::Tangent(v) => v.len(),
            VertexChannel::Bitangent(v) => v.len(),
            VertexChannel::Color(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, vertex: u32) -> Option<VertexValue> {
        let vertex = vertex as usize;
        match self {
            VertexChannel::Uv(v) => v.get(vertex).copied().map(VertexValue::Vec2),
            VertexChannel::Tangent(v) => v.get(vertex).copied().map(VertexValue::Vec4),
            VertexChannel::Bitangent(v) => v.get(vertex).copied().map(VertexValue::Vec3),
            VertexChannel::Color(v) => v.get(vertex).copied().map(VertexValue::Vec4),
        }
    }

    /// Append a value produced by the builder layer of this channel
    pub fn push(&mut self, value: VertexValue) -> Result<(), BuildError> {
        match (self, value) {
            (VertexChannel::Uv(v), VertexValue::Vec2(x)) => v.push(x),
            (VertexChannel::Tangent(v), VertexValue::Vec4(x)) => v.push(x),
            (VertexChannel::Bitangent(v), VertexValue::Vec3(x)) => v.push(x),
            (VertexChannel::Color(v), VertexValue::Vec4(x)) => v.push(x),
            (channel, value) => {
                let kind = channel.layer_kind();
                return Err(BuildError::ValueKindMismatch {
                    kind,
                    expected: kind.value_kind(),
                    actual: value.kind(),
                });
            }
        }
        Ok(())
    }
}

/// A named channel node
#[derive(Debug, Clone, PartialEq)]
pub struct VertexChannelData {
    /// Name given by the source asset, e.g. `TEXCOORD_1`
    pub custom_name: Option<String>,
    /// Set index among channels of the same kind
    pub set_index: u32,
    pub values: VertexChannel,
}

impl VertexChannelData {
    pub fn new(values: VertexChannel) -> Self {
        Self {
            custom_name: None,
            set_index: 0,
            values,
        }
    }

    pub fn with_set_index(mut self, set_index: u32) -> Self {
        self.set_index = set_index;
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Empty channel of the same kind carrying the same attributes
    pub fn clone_attributes(&self, capacity: usize) -> Self {
        Self {
            custom_name: self.custom_name.clone(),
            set_index: self.set_index,
            values: self.values.empty_like(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
