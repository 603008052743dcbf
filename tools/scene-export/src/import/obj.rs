//! Wavefront OBJ scene import

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use scene_processing::{MaterialData, SceneGraph, VertexChannel, VertexChannelData};

use super::{CornerMesh, NormalFallback, sanitize_name};

/// Corner reference: position, optional texture coordinate, optional normal
type ObjVertex = (usize, Option<usize>, Option<usize>);

struct ObjFace {
    corners: Vec<ObjVertex>,
    material_id: u32,
}

struct ObjObject {
    name: String,
    faces: Vec<ObjFace>,
}

/// Import an OBJ file, one mesh node per `o` object
pub fn import_obj(input: &Path) -> Result<SceneGraph> {
    let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let name = sanitize_name(input.file_stem().and_then(|s| s.to_str()), || {
        "mesh".to_string()
    });
    parse_obj(BufReader::new(file), &name).with_context(|| format!("Failed to parse OBJ: {:?}", input))
}

/// Parse OBJ text; faces before the first `o` line belong to `default_name`
pub fn parse_obj<R: BufRead>(reader: R, default_name: &str) -> Result<SceneGraph> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();

    let mut material_ids: HashMap<String, u32> = HashMap::new();
    let mut material_names: Vec<String> = Vec::new();
    let mut current_material: Option<u32> = None;

    let mut objects = vec![ObjObject {
        name: default_name.to_string(),
        faces: Vec::new(),
    }];

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let context = || format!("line {}: {:?}", line_number + 1, line);

        match parts[0] {
            "v" if parts.len() >= 4 => {
                positions.push(parse_floats::<3>(&parts[1..]).with_context(context)?);
            }
            "vt" if parts.len() >= 3 => {
                tex_coords.push(parse_floats::<2>(&parts[1..]).with_context(context)?);
            }
            "vn" if parts.len() >= 4 => {
                normals.push(parse_floats::<3>(&parts[1..]).with_context(context)?);
            }
            "o" => {
                let name = sanitize_name(parts.get(1).copied(), || format!("object_{}", objects.len()));
                // an object with no faces yet is just renamed
                match objects.last_mut() {
                    Some(object) if object.faces.is_empty() => object.name = name,
                    _ => objects.push(ObjObject {
                        name,
                        faces: Vec::new(),
                    }),
                }
            }
            "usemtl" => {
                let name = parts.get(1).copied().unwrap_or("default").to_string();
                let id = *material_ids.entry(name.clone()).or_insert_with(|| {
                    material_names.push(name);
                    (material_names.len() - 1) as u32
                });
                current_material = Some(id);
            }
            "f" if parts.len() >= 4 => {
                let corners = parts[1..]
                    .iter()
                    .map(|v| {
                        parse_obj_vertex(v, positions.len(), tex_coords.len(), normals.len())
                            .with_context(|| format!("invalid vertex reference {v:?}"))
                    })
                    .collect::<Result<Vec<_>>>()
                    .with_context(context)?;

                let material_id = match current_material {
                    Some(id) => id,
                    None => {
                        // faces before any usemtl
                        let id = *material_ids.entry("default".to_string()).or_insert_with(|| {
                            material_names.push("default".to_string());
                            (material_names.len() - 1) as u32
                        });
                        current_material = Some(id);
                        id
                    }
                };

                if let Some(object) = objects.last_mut() {
                    object.faces.push(ObjFace {
                        corners,
                        material_id,
                    });
                }
            }
            _ => {}
        }
    }

    let mut graph = SceneGraph::new();
    let root = graph.root();
    for object in objects.into_iter().filter(|o| !o.faces.is_empty()) {
        let corners = build_mesh(&object, &positions, &tex_coords, &normals, &material_names)
            .with_context(|| format!("Failed to build object '{}'", object.name))?;
        corners.add_to_graph(&mut graph, root, &object.name)?;
    }

    if graph.mesh_nodes().is_empty() {
        bail!("No faces found in OBJ file");
    }
    Ok(graph)
}

fn build_mesh(
    object: &ObjObject,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    normals: &[[f32; 3]],
    material_names: &[String],
) -> Result<CornerMesh> {
    let mut corners = CornerMesh::new();
    // control points are OBJ positions
    let control_points: Vec<u32> = positions
        .iter()
        .map(|&position| corners.add_control_point(position))
        .collect();

    let has_uvs = object
        .faces
        .iter()
        .all(|face| face.corners.iter().all(|&(_, vt, _)| vt.is_some()));
    if !has_uvs
        && object
            .faces
            .iter()
            .any(|face| face.corners.iter().any(|&(_, vt, _)| vt.is_some()))
    {
        tracing::warn!(
            "Object '{}' has texture coordinates on some faces only, dropping them",
            object.name
        );
    }

    let mut uvs = Vec::new();
    let mut used_materials = Vec::new();
    for face in &object.faces {
        let mut added = Vec::with_capacity(face.corners.len());
        for &(vi, vti, vni) in &face.corners {
            let control_point = *control_points
                .get(vi)
                .with_context(|| format!("position {} out of range", vi + 1))?;
            let normal = match vni {
                Some(ni) => Some(
                    *normals
                        .get(ni)
                        .with_context(|| format!("normal {} out of range", ni + 1))?,
                ),
                None => None,
            };
            if has_uvs && let Some(ti) = vti {
                uvs.push(
                    *tex_coords
                        .get(ti)
                        .with_context(|| format!("texture coordinate {} out of range", ti + 1))?,
                );
            }
            added.push(corners.add_corner_at(control_point, normal));
        }

        // Triangulate (fan triangulation for convex polygons)
        let material_id = dense_material_id(&mut used_materials, face.material_id);
        for i in 1..added.len() - 1 {
            corners.add_face([added[0], added[i], added[i + 1]], material_id);
        }
    }

    corners.fill_missing_normals(NormalFallback::Face);

    if has_uvs {
        corners
            .channels
            .push(("uv_0".to_string(), VertexChannelData::new(VertexChannel::Uv(uvs))));
    }
    corners.materials = used_materials
        .iter()
        .map(|&id| MaterialData {
            name: material_names
                .get(id as usize)
                .cloned()
                .unwrap_or_else(|| "default".to_string()),
            base_color: [1.0; 4],
        })
        .collect();

    Ok(corners)
}

/// Material id local to one object, in order of first use
fn dense_material_id(used: &mut Vec<u32>, file_material: u32) -> u32 {
    match used.iter().position(|&id| id == file_material) {
        Some(local) => local as u32,
        None => {
            used.push(file_material);
            (used.len() - 1) as u32
        }
    }
}

fn parse_floats<const N: usize>(parts: &[&str]) -> Result<[f32; N]> {
    let mut values = [0.0; N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = part
            .parse()
            .with_context(|| format!("invalid number {part:?}"))?;
    }
    Ok(values)
}

/// Resolve a 1-based or negative (relative) OBJ index to 0-based
fn resolve_index(s: &str, count: usize) -> Option<usize> {
    let index: i64 = s.parse().ok()?;
    if index < 0 {
        count.checked_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).checked_sub(1)
    }
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_obj_vertex(
    s: &str,
    position_count: usize,
    tex_coord_count: usize,
    normal_count: usize,
) -> Option<ObjVertex> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = resolve_index(parts.first()?, position_count)?;

    let vti = match parts.get(1).filter(|s| !s.is_empty()) {
        Some(s) => Some(resolve_index(s, tex_coord_count)?),
        None => None,
    };

    let vni = match parts.get(2).filter(|s| !s.is_empty()) {
        Some(s) => Some(resolve_index(s, normal_count)?),
        None => None,
    };

    Some((vi, vti, vni))
}
