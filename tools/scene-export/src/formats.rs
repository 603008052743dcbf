//! Optimized mesh binary format (.optmesh)
//!
//! GPU-ready mesh with packed vertices, a sub mesh draw table, blend shape
//! targets and the bone names skin indices refer to. POD format, little endian,
//! no magic bytes.
//!
//! # Layout
//! ```text
//! 0x00: vertex_count u32
//! 0x04: index_count u32
//! 0x08: sub_mesh_count u32
//! 0x0C: blend_shape_count u32
//! 0x10: bone_count u32
//! 0x14: format u8 (vertex format flags)
//! 0x15: padding (3 bytes)
//! 0x18: sub mesh table (sub_mesh_count * 5 u32:
//!       material_id, first_vertex, vertex_count, first_index, index_count)
//! var:  vertex_data (vertex_count * stride)
//! var:  index_data (index_count * u32)
//! var:  blend shapes, each: name, position_count u32, positions f32x3,
//!       normal_count u32, normals f32x3
//! var:  bone names
//! ```
//!
//! Strings are a u32 byte length followed by UTF-8 bytes.
//! For vertex format constants and stride calculation, see [`crate::packing`].

use std::io::Write;

use anyhow::Result;
use scene_processing::SubMeshRange;

use crate::packing::vertex_stride_packed;

/// Errors reading an `.optmesh` file
#[derive(Debug, thiserror::Error)]
pub enum MeshFileError {
    #[error("unexpected end of file reading {0}")]
    Truncated(&'static str),

    #[error("{0} is not valid UTF-8")]
    InvalidString(&'static str),

    #[error("{trailing} trailing bytes after mesh data")]
    TrailingBytes { trailing: usize },
}

/// OptimizedMesh header (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct OptimizedMeshHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    pub sub_mesh_count: u32,
    pub blend_shape_count: u32,
    pub bone_count: u32,
    pub format: u8,
    pub _padding: [u8; 3],
}

impl OptimizedMeshHeader {
    pub const SIZE: usize = 24;

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.sub_mesh_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.blend_shape_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.bone_count.to_le_bytes());
        bytes[20] = self.format;
        // padding bytes stay 0
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let word = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        Some(Self {
            vertex_count: word(0),
            index_count: word(4),
            sub_mesh_count: word(8),
            blend_shape_count: word(12),
            bone_count: word(16),
            format: bytes[20],
            _padding: [0; 3],
        })
    }
}

/// Morph target positions and normals, one entry per output vertex
#[derive(Debug, Clone, PartialEq)]
pub struct BlendShapeTarget {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
}

/// Everything stored in one `.optmesh` file
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedMeshFile {
    pub format: u8,
    pub vertex_count: u32,
    /// Packed vertices, `vertex_count * vertex_stride_packed(format)` bytes
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u32>,
    pub sub_meshes: Vec<SubMeshRange>,
    pub blend_shapes: Vec<BlendShapeTarget>,
    pub bone_names: Vec<String>,
}

impl OptimizedMeshFile {
    pub fn header(&self) -> OptimizedMeshHeader {
        OptimizedMeshHeader {
            vertex_count: self.vertex_count,
            index_count: self.indices.len() as u32,
            sub_mesh_count: self.sub_meshes.len() as u32,
            blend_shape_count: self.blend_shapes.len() as u32,
            bone_count: self.bone_names.len() as u32,
            format: self.format,
            _padding: [0; 3],
        }
    }

    /// Parse a complete file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshFileError> {
        let header =
            OptimizedMeshHeader::from_bytes(bytes).ok_or(MeshFileError::Truncated("header"))?;
        let mut reader = ByteReader {
            bytes,
            offset: OptimizedMeshHeader::SIZE,
        };

        let mut sub_meshes = Vec::with_capacity(reader.capacity(header.sub_mesh_count, 20));
        for _ in 0..header.sub_mesh_count {
            sub_meshes.push(SubMeshRange {
                material_id: reader.u32("sub mesh table")?,
                first_vertex: reader.u32("sub mesh table")?,
                vertex_count: reader.u32("sub mesh table")?,
                first_index: reader.u32("sub mesh table")?,
                index_count: reader.u32("sub mesh table")?,
            });
        }

        let stride = vertex_stride_packed(header.format) as usize;
        let vertex_bytes = (header.vertex_count as usize)
            .checked_mul(stride)
            .ok_or(MeshFileError::Truncated("vertex data"))?;
        let vertex_data = reader.take(vertex_bytes, "vertex data")?.to_vec();

        let indices = (0..header.index_count)
            .map(|_| reader.u32("index data"))
            .collect::<Result<Vec<_>, _>>()?;

        // name length plus two array counts
        let mut blend_shapes = Vec::with_capacity(reader.capacity(header.blend_shape_count, 12));
        for _ in 0..header.blend_shape_count {
            let name = reader.string("blend shape name")?;
            let positions = reader.vec3_array("blend shape positions")?;
            let normals = reader.vec3_array("blend shape normals")?;
            blend_shapes.push(BlendShapeTarget {
                name,
                positions,
                normals,
            });
        }

        let bone_names = (0..header.bone_count)
            .map(|_| reader.string("bone name"))
            .collect::<Result<Vec<_>, _>>()?;

        let trailing = bytes.len() - reader.offset;
        if trailing != 0 {
            return Err(MeshFileError::TrailingBytes { trailing });
        }

        Ok(Self {
            format: header.format,
            vertex_count: header.vertex_count,
            vertex_data,
            indices,
            sub_meshes,
            blend_shapes,
            bone_names,
        })
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// `count` clamped to how many `size` byte entries the rest can hold
    fn capacity(&self, count: u32, size: usize) -> usize {
        (count as usize).min((self.bytes.len() - self.offset) / size)
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], MeshFileError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(MeshFileError::Truncated(what))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, MeshFileError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self, what: &'static str) -> Result<f32, MeshFileError> {
        self.u32(what).map(f32::from_bits)
    }

    fn string(&mut self, what: &'static str) -> Result<String, MeshFileError> {
        let len = self.u32(what)? as usize;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| MeshFileError::InvalidString(what))
    }

    fn vec3_array(&mut self, what: &'static str) -> Result<Vec<[f32; 3]>, MeshFileError> {
        let count = self.u32(what)?;
        let mut values = Vec::with_capacity(self.capacity(count, 12));
        for _ in 0..count {
            values.push([self.f32(what)?, self.f32(what)?, self.f32(what)?]);
        }
        Ok(values)
    }
}

fn write_string<W: Write>(w: &mut W, value: &str) -> Result<()> {
    w.write_all(&(value.len() as u32).to_le_bytes())?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

fn write_vec3_array<W: Write>(w: &mut W, values: &[[f32; 3]]) -> Result<()> {
    w.write_all(&(values.len() as u32).to_le_bytes())?;
    for value in values {
        for component in value {
            w.write_all(&component.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Write a complete `.optmesh` file
pub fn write_optimized_mesh<W: Write>(w: &mut W, mesh: &OptimizedMeshFile) -> Result<()> {
    w.write_all(&mesh.header().to_bytes())?;

    for sub_mesh in &mesh.sub_meshes {
        for value in [
            sub_mesh.material_id,
            sub_mesh.first_vertex,
            sub_mesh.vertex_count,
            sub_mesh.first_index,
            sub_mesh.index_count,
        ] {
            w.write_all(&value.to_le_bytes())?;
        }
    }

    w.write_all(&mesh.vertex_data)?;
    for index in &mesh.indices {
        w.write_all(&index.to_le_bytes())?;
    }

    for shape in &mesh.blend_shapes {
        write_string(w, &shape.name)?;
        write_vec3_array(w, &shape.positions)?;
        write_vec3_array(w, &shape.normals)?;
    }

    for name in &mesh.bone_names {
        write_string(w, name)?;
    }

    Ok(())
}
