//! Vertex attribute layers
//!
//! A layer stores one semantic attribute for every `(original vertex, duplicate)`
//! slot the builder allocates. The value for the corner being processed is staged
//! first, then either committed into a new duplicate slot or discarded when an
//! existing slot already holds an identical tuple.

use smallvec::SmallVec;

use crate::error::BuildError;

/// Handle to a layer owned by a [`MeshBuilder`](crate::MeshBuilder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    /// Position of the layer in creation order
    pub fn index(self) -> usize {
        self.0
    }
}

/// Semantic channel stored by a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Back-reference to the source control point
    OriginalVertex,
    Position,
    Normal,
    Uv,
    Tangent,
    Bitangent,
    Color,
}

impl LayerKind {
    /// Storage type used for this channel
    pub const fn value_kind(self) -> ValueKind {
        match self {
            LayerKind::OriginalVertex => ValueKind::U32,
            LayerKind::Uv => ValueKind::Vec2,
            LayerKind::Position | LayerKind::Normal | LayerKind::Bitangent => ValueKind::Vec3,
            LayerKind::Tangent | LayerKind::Color => ValueKind::Vec4,
        }
    }
}

/// Storage type of a [`VertexValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    U32,
    Vec2,
    Vec3,
    Vec4,
}

/// A single attribute value
#[derive(Debug, Clone, Copy)]
pub enum VertexValue {
    U32(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl VertexValue {
    pub const fn kind(&self) -> ValueKind {
        match self {
            VertexValue::U32(_) => ValueKind::U32,
            VertexValue::Vec2(_) => ValueKind::Vec2,
            VertexValue::Vec3(_) => ValueKind::Vec3,
            VertexValue::Vec4(_) => ValueKind::Vec4,
        }
    }

    /// Exact comparison.
    ///
    /// Floats compare by bit pattern, so `-0.0` and `0.0` differ and a NaN
    /// matches an identical NaN.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (VertexValue::U32(a), VertexValue::U32(b)) => a == b,
            (VertexValue::Vec2(a), VertexValue::Vec2(b)) => bits_eq(a, b),
            (VertexValue::Vec3(a), VertexValue::Vec3(b)) => bits_eq(a, b),
            (VertexValue::Vec4(a), VertexValue::Vec4(b)) => bits_eq(a, b),
            _ => false,
        }
    }
}

fn bits_eq(a: &[f32], b: &[f32]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Rust types that can be stored in a layer
pub trait LayerValue: Copy + Into<VertexValue> {
    const KIND: ValueKind;

    fn from_value(value: VertexValue) -> Option<Self>;
}

macro_rules! impl_layer_value {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for VertexValue {
            fn from(value: $ty) -> Self {
                VertexValue::$variant(value)
            }
        }

        impl LayerValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: VertexValue) -> Option<Self> {
                match value {
                    VertexValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_layer_value!(u32, U32);
impl_layer_value!([f32; 2], Vec2);
impl_layer_value!([f32; 3], Vec3);
impl_layer_value!([f32; 4], Vec4);

/// Attribute storage for every `(original vertex, duplicate)` slot
#[derive(Debug, Clone)]
pub struct VertexAttributeLayer {
    kind: LayerKind,
    current: Option<VertexValue>,
    slots: Vec<SmallVec<[VertexValue; 2]>>,
}

impl VertexAttributeLayer {
    pub fn new(kind: LayerKind, vertex_count: usize) -> Self {
        Self {
            kind,
            current: None,
            slots: vec![SmallVec::new(); vertex_count],
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Number of original (used) vertices the layer covers
    pub fn vertex_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of duplicate slots allocated for `vertex`
    pub fn num_duplicates(&self, vertex: u32) -> usize {
        self.slots.get(vertex as usize).map_or(0, |s| s.len())
    }

    /// Stage `value` for the corner currently being processed
    pub fn set_current_vertex_value(&mut self, value: VertexValue) -> Result<(), BuildError> {
        let expected = self.kind.value_kind();
        if value.kind() != expected {
            return Err(BuildError::ValueKindMismatch {
                kind: self.kind,
                expected,
                actual: value.kind(),
            });
        }
        self.current = Some(value);
        Ok(())
    }

    pub fn current_vertex_value(&self) -> Option<VertexValue> {
        self.current
    }

    /// Read the value stored for a resolved duplicate slot
    pub fn vertex_value(&self, vertex: u32, duplicate_nr: u32) -> Result<VertexValue, BuildError> {
        self.slots
            .get(vertex as usize)
            .and_then(|s| s.get(duplicate_nr as usize))
            .copied()
            .ok_or(BuildError::DuplicateOutOfRange {
                kind: self.kind,
                vertex,
                duplicate_nr,
            })
    }

    /// Typed variant of [`Self::vertex_value`]
    pub fn get<T: LayerValue>(&self, vertex: u32, duplicate_nr: u32) -> Result<T, BuildError> {
        let value = self.vertex_value(vertex, duplicate_nr)?;
        T::from_value(value).ok_or(BuildError::ValueKindMismatch {
            kind: self.kind,
            expected: T::KIND,
            actual: value.kind(),
        })
    }

    /// Whether the staged value equals the one stored at `(vertex, duplicate_nr)`
    pub(crate) fn current_matches(&self, vertex: usize, duplicate_nr: usize) -> bool {
        match (self.current, self.slots[vertex].get(duplicate_nr)) {
            (Some(current), Some(stored)) => current.same_as(stored),
            _ => false,
        }
    }

    /// Move the staged value into a new duplicate slot of `vertex`
    pub(crate) fn commit_current(&mut self, vertex: usize) {
        if let Some(value) = self.current.take() {
            self.slots[vertex].push(value);
        }
    }

    pub(crate) fn discard_current(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_table() {
        assert_eq!(LayerKind::OriginalVertex.value_kind(), ValueKind::U32);
        assert_eq!(LayerKind::Uv.value_kind(), ValueKind::Vec2);
        assert_eq!(LayerKind::Bitangent.value_kind(), ValueKind::Vec3);
        assert_eq!(LayerKind::Color.value_kind(), ValueKind::Vec4);
    }

    #[test]
    fn test_same_as_is_bitwise() {
        let a = VertexValue::Vec3([0.0, 1.0, 2.0]);
        let b = VertexValue::Vec3([-0.0, 1.0, 2.0]);
        assert!(a.same_as(&a));
        assert!(!a.same_as(&b));
        assert!(!b.same_as(&a));

        let nan = VertexValue::Vec2([f32::NAN, 0.0]);
        assert!(nan.same_as(&nan));

        assert!(!VertexValue::U32(1).same_as(&VertexValue::Vec2([1.0, 0.0])));
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut layer = VertexAttributeLayer::new(LayerKind::Normal, 2);
        let err = layer
            .set_current_vertex_value(VertexValue::Vec2([0.0, 0.0]))
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::ValueKindMismatch {
                kind: LayerKind::Normal,
                expected: ValueKind::Vec3,
                actual: ValueKind::Vec2,
            }
        );
    }

    #[test]
    fn test_commit_and_read_back() {
        let mut layer = VertexAttributeLayer::new(LayerKind::Uv, 3);
        layer
            .set_current_vertex_value(VertexValue::Vec2([0.25, 0.5]))
            .unwrap();
        assert!(!layer.current_matches(1, 0));
        layer.commit_current(1);
        assert!(layer.current_vertex_value().is_none());

        layer
            .set_current_vertex_value(VertexValue::Vec2([0.25, 0.5]))
            .unwrap();
        assert!(layer.current_matches(1, 0));
        layer.discard_current();

        assert_eq!(layer.num_duplicates(1), 1);
        assert_eq!(layer.get::<[f32; 2]>(1, 0).unwrap(), [0.25, 0.5]);
        assert!(layer.get::<[f32; 3]>(1, 0).is_err());
        assert!(matches!(
            layer.vertex_value(1, 1),
            Err(BuildError::DuplicateOutOfRange { .. })
        ));
        assert!(layer.vertex_value(7, 0).is_err());
    }
}
