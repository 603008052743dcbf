//! Vertex data packing
//!
//! Converts f32 vertex streams of an optimized mesh to packed GPU formats:
//! - f32 → f16 (IEEE 754 half-float)
//! - f32 → snorm16 (signed normalized, -1.0 to 1.0)
//! - f32 → unorm8 (unsigned normalized, 0.0 to 1.0)
//!
//! Vertex layout (in order): Position → UV → Color → Normal → Tangent → Skinning

use bytemuck::cast_slice;
use glam::Vec3;
use half::f16;

// ============================================================================
// Vertex Format Constants
// ============================================================================

/// Vertex format flag: Has UV coordinates
pub const FORMAT_UV: u8 = 1;
/// Vertex format flag: Has per-vertex color
pub const FORMAT_COLOR: u8 = 2;
/// Vertex format flag: Has normals
pub const FORMAT_NORMAL: u8 = 4;
/// Vertex format flag: Has bone indices/weights for skinning
pub const FORMAT_SKINNED: u8 = 8;
/// Vertex format flag: Has tangents with handedness
pub const FORMAT_TANGENT: u8 = 16;

/// Bone indices are stored as u8
pub const MAX_PACKED_BONES: usize = 256;

/// Calculate vertex stride in bytes for packed GPU format
#[inline]
pub const fn vertex_stride_packed(format: u8) -> u32 {
    let mut stride = 8; // Position: Float16x4

    if format & FORMAT_UV != 0 {
        stride += 4; // Float16x2
    }
    if format & FORMAT_COLOR != 0 {
        stride += 4; // Unorm8x4
    }
    if format & FORMAT_NORMAL != 0 {
        stride += 4; // Octahedral u32
    }
    if format & FORMAT_TANGENT != 0 {
        stride += 4; // Octahedral u32 with sign bit
    }
    if format & FORMAT_SKINNED != 0 {
        stride += 8; // Bone indices (u8x4) + weights (unorm8x4)
    }

    stride
}

/// Human readable list of the attributes in a format
pub fn format_name(format: u8) -> String {
    let mut name = String::from("POS");
    for (flag, label) in [
        (FORMAT_UV, "UV"),
        (FORMAT_COLOR, "COLOR"),
        (FORMAT_NORMAL, "NORMAL"),
        (FORMAT_TANGENT, "TANGENT"),
        (FORMAT_SKINNED, "SKINNED"),
    ] {
        if format & flag != 0 {
            name.push('_');
            name.push_str(label);
        }
    }
    name
}

// ============================================================================
// Basic Conversion Functions
// ============================================================================

/// Convert f32 to signed normalized 16-bit integer (snorm16)
///
/// Maps f32 range [-1.0, 1.0] to i16 range [-32767, 32767].
#[inline]
pub fn f32_to_snorm16(value: f32) -> i16 {
    let clamped = value.clamp(-1.0, 1.0);
    (clamped * 32767.0) as i16
}

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0) as u8
}

// ============================================================================
// Position / UV / Color
// ============================================================================

/// Pack a 3D position to Float16x4 format (with w=1.0 padding)
#[inline]
pub fn pack_position_f16(x: f32, y: f32, z: f32) -> [f16; 4] {
    [
        f16::from_f32(x),
        f16::from_f32(y),
        f16::from_f32(z),
        f16::from_f32(1.0),
    ]
}

#[inline]
pub fn pack_uv_f16(u: f32, v: f32) -> [f16; 2] {
    [f16::from_f32(u), f16::from_f32(v)]
}

#[inline]
pub fn pack_color_rgba_unorm8(r: f32, g: f32, b: f32, a: f32) -> [u8; 4] {
    [
        f32_to_unorm8(r),
        f32_to_unorm8(g),
        f32_to_unorm8(b),
        f32_to_unorm8(a),
    ]
}

/// Pack bone weights as unorm8x4 (4 bytes)
#[inline]
pub fn pack_bone_weights_unorm8(weights: [f32; 4]) -> [u8; 4] {
    weights.map(f32_to_unorm8)
}

// ============================================================================
// Normal / Tangent Packing
// ============================================================================

/// Encode normalized direction to octahedral coordinates in [-1, 1]²
#[inline]
pub fn encode_octahedral(dir: Vec3) -> (f32, f32) {
    let dir = dir.normalize_or_zero();

    let l1_norm = dir.x.abs() + dir.y.abs() + dir.z.abs();
    if l1_norm == 0.0 {
        return (0.0, 0.0);
    }

    let mut u = dir.x / l1_norm;
    let mut v = dir.y / l1_norm;

    if dir.z < 0.0 {
        let u_abs = u.abs();
        let v_abs = v.abs();
        u = (1.0 - v_abs) * u.signum();
        v = (1.0 - u_abs) * v.signum();
    }

    (u, v)
}

/// Decode octahedral coordinates in [-1, 1]² back to normalized direction
#[inline]
pub fn decode_octahedral(u: f32, v: f32) -> Vec3 {
    let mut dir = Vec3::new(u, v, 1.0 - u.abs() - v.abs());

    if dir.z < 0.0 {
        let old_x = dir.x;
        dir.x = (1.0 - dir.y.abs()) * old_x.signum();
        dir.y = (1.0 - old_x.abs()) * dir.y.signum();
    }

    dir.normalize_or_zero()
}

/// Pack direction to u32 using octahedral encoding (2x snorm16)
#[inline]
pub fn pack_octahedral_u32(dir: Vec3) -> u32 {
    let (u, v) = encode_octahedral(dir);
    let u_snorm = f32_to_snorm16(u);
    let v_snorm = f32_to_snorm16(v);
    (u_snorm as u16 as u32) | ((v_snorm as u16 as u32) << 16)
}

#[inline]
pub fn unpack_octahedral_u32(packed: u32) -> Vec3 {
    let u = (packed & 0xFFFF) as u16 as i16 as f32 / 32767.0;
    let v = (packed >> 16) as u16 as i16 as f32 / 32767.0;
    decode_octahedral(u, v)
}

#[inline]
pub fn pack_normal_octahedral(nx: f32, ny: f32, nz: f32) -> u32 {
    pack_octahedral_u32(Vec3::new(nx, ny, nz))
}

const TANGENT_SIGN_BIT: u32 = 1 << 31;
const SNORM15_MAX: f32 = 16383.0;

/// Pack a tangent (xyz direction, w handedness) to u32
///
/// Bits 0..16 hold u as snorm16, bits 16..31 hold v as snorm15 and bit 31 is
/// set for negative handedness.
#[inline]
pub fn pack_tangent(tangent: [f32; 4]) -> u32 {
    let (u, v) = encode_octahedral(Vec3::new(tangent[0], tangent[1], tangent[2]));
    let u_bits = f32_to_snorm16(u) as u16 as u32;
    let v_bits = ((v.clamp(-1.0, 1.0) * SNORM15_MAX) as i16 as u16 as u32) & 0x7FFF;
    let sign = if tangent[3] < 0.0 { TANGENT_SIGN_BIT } else { 0 };
    u_bits | (v_bits << 16) | sign
}

/// Unpack a tangent packed by [`pack_tangent`], handedness is ±1.0
#[inline]
pub fn unpack_tangent(packed: u32) -> [f32; 4] {
    let u = (packed & 0xFFFF) as u16 as i16 as f32 / 32767.0;
    // sign extend the 15 bit v
    let v_raw = ((packed >> 16) & 0x7FFF) as u16;
    let v = (((v_raw << 1) as i16) >> 1) as f32 / SNORM15_MAX;
    let dir = decode_octahedral(u, v);
    let w = if packed & TANGENT_SIGN_BIT != 0 { -1.0 } else { 1.0 };
    [dir.x, dir.y, dir.z, w]
}

// ============================================================================
// Full Vertex Packing
// ============================================================================

/// Unpacked per-vertex streams of one mesh, all index aligned to `positions`
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexSource<'a> {
    pub positions: &'a [[f32; 3]],
    pub uvs: Option<&'a [[f32; 2]]>,
    pub colors: Option<&'a [[f32; 4]]>,
    pub normals: Option<&'a [[f32; 3]]>,
    pub tangents: Option<&'a [[f32; 4]]>,
    /// Bone indices and weights, four per vertex
    pub skinning: Option<(&'a [[u8; 4]], &'a [[f32; 4]])>,
}

impl VertexSource<'_> {
    /// Format flags for the streams present
    pub fn format(&self) -> u8 {
        let mut format = 0;
        if self.uvs.is_some() {
            format |= FORMAT_UV;
        }
        if self.colors.is_some() {
            format |= FORMAT_COLOR;
        }
        if self.normals.is_some() {
            format |= FORMAT_NORMAL;
        }
        if self.tangents.is_some() {
            format |= FORMAT_TANGENT;
        }
        if self.skinning.is_some() {
            format |= FORMAT_SKINNED;
        }
        format
    }
}

/// Pack vertex streams to interleaved GPU-ready data in the source's format
pub fn pack_vertices(source: &VertexSource<'_>) -> Vec<u8> {
    let format = source.format();
    let stride = vertex_stride_packed(format) as usize;
    let mut data = Vec::with_capacity(source.positions.len() * stride);

    for (i, pos) in source.positions.iter().enumerate() {
        // Position (f16x4) - 8 bytes
        let packed_pos = pack_position_f16(pos[0], pos[1], pos[2]);
        data.extend_from_slice(cast_slice(&packed_pos));

        // UV (f16x2) - 4 bytes
        if let Some(uvs) = source.uvs {
            let uv = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
            data.extend_from_slice(cast_slice(&pack_uv_f16(uv[0], uv[1])));
        }

        // Color (unorm8x4) - 4 bytes
        if let Some(colors) = source.colors {
            let c = colors.get(i).copied().unwrap_or([1.0, 1.0, 1.0, 1.0]);
            data.extend_from_slice(&pack_color_rgba_unorm8(c[0], c[1], c[2], c[3]));
        }

        // Normal (octahedral u32) - 4 bytes
        if let Some(normals) = source.normals {
            let n = normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
            data.extend_from_slice(&pack_normal_octahedral(n[0], n[1], n[2]).to_le_bytes());
        }

        // Tangent (octahedral u32 with sign bit) - 4 bytes
        if let Some(tangents) = source.tangents {
            let t = tangents.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 1.0]);
            data.extend_from_slice(&pack_tangent(t).to_le_bytes());
        }

        // Skinning (bone indices + weights) - 8 bytes
        if let Some((joints, weights)) = source.skinning {
            data.extend_from_slice(&joints.get(i).copied().unwrap_or([0; 4]));
            let w = weights.get(i).copied().unwrap_or([0.0; 4]);
            data.extend_from_slice(&pack_bone_weights_unorm8(w));
        }
    }

    data
}
