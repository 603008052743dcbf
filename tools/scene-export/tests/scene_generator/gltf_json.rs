//! GLTF JSON structure and binary buffer construction.

use std::collections::BTreeMap;

use gltf_json as json;
use json::validation::Checked::Valid;

use super::glb_assembly::assemble_glb;

/// One primitive of a test mesh
#[derive(Debug, Clone)]
pub struct TestPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
    /// Index into [`TestMesh::materials`]
    pub material: Option<u32>,
    /// Morph target position offsets
    pub targets: Vec<Vec<[f32; 3]>>,
    pub mode: json::mesh::Mode,
}

impl TestPrimitive {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            joints: None,
            weights: None,
            indices,
            material: None,
            targets: Vec::new(),
            mode: json::mesh::Mode::Triangles,
        }
    }
}

/// A single mesh node, optionally skinned by root level joint nodes
#[derive(Debug, Clone)]
pub struct TestMesh {
    pub name: String,
    pub primitives: Vec<TestPrimitive>,
    pub materials: Vec<String>,
    pub joints: Vec<String>,
}

/// Binary buffer with its views and accessors, one view per accessor
#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    /// Append a tightly packed accessor and return its index
    fn push<T: bytemuck::Pod>(
        &mut self,
        values: &[T],
        component_type: json::accessor::ComponentType,
        type_: json::accessor::Type,
        target: json::buffer::Target,
        bounds: Option<([f32; 3], [f32; 3])>,
    ) -> json::Index<json::Accessor> {
        while !self.data.len().is_multiple_of(4) {
            self.data.push(0);
        }
        let offset = self.data.len();
        self.data.extend_from_slice(bytemuck::cast_slice(values));

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: (self.data.len() - offset).into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(target)),
        });

        let to_value =
            |v: [f32; 3]| json::Value::Array(v.into_iter().map(json::Value::from).collect());
        self.accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(self.views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: values.len().into(),
            component_type: Valid(json::accessor::GenericComponentType(component_type)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min: bounds.map(|(min, _)| to_value(min)),
            max: bounds.map(|(_, max)| to_value(max)),
            name: None,
            normalized: false,
            sparse: None,
        });
        json::Index::new(self.accessors.len() as u32 - 1)
    }

    fn push_attribute<T: bytemuck::Pod>(
        &mut self,
        values: &[T],
        component_type: json::accessor::ComponentType,
        type_: json::accessor::Type,
    ) -> json::Index<json::Accessor> {
        self.push(values, component_type, type_, json::buffer::Target::ArrayBuffer, None)
    }

    /// Vec3 float accessor with the min/max bounds glTF requires for positions
    fn push_vec3(&mut self, values: &[[f32; 3]]) -> json::Index<json::Accessor> {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for value in values {
            for axis in 0..3 {
                min[axis] = min[axis].min(value[axis]);
                max[axis] = max[axis].max(value[axis]);
            }
        }
        self.push(
            values,
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            json::buffer::Target::ArrayBuffer,
            Some((min, max)),
        )
    }
}

fn node(name: &str) -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: None,
        name: Some(name.to_string()),
        rotation: None,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
    }
}

fn build_primitive(buffer: &mut BufferBuilder, primitive: &TestPrimitive) -> json::mesh::Primitive {
    use json::accessor::{ComponentType, Type};
    use json::mesh::Semantic;

    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(Semantic::Positions), buffer.push_vec3(&primitive.positions));
    if let Some(normals) = &primitive.normals {
        attributes.insert(Valid(Semantic::Normals), buffer.push_vec3(normals));
    }
    if let Some(uvs) = &primitive.uvs {
        attributes.insert(
            Valid(Semantic::TexCoords(0)),
            buffer.push_attribute(uvs, ComponentType::F32, Type::Vec2),
        );
    }
    if let Some(joints) = &primitive.joints {
        attributes.insert(
            Valid(Semantic::Joints(0)),
            buffer.push_attribute(joints, ComponentType::U16, Type::Vec4),
        );
    }
    if let Some(weights) = &primitive.weights {
        attributes.insert(
            Valid(Semantic::Weights(0)),
            buffer.push_attribute(weights, ComponentType::F32, Type::Vec4),
        );
    }

    let indices = buffer.push(
        &primitive.indices,
        ComponentType::U32,
        Type::Scalar,
        json::buffer::Target::ElementArrayBuffer,
        None,
    );

    let targets = (!primitive.targets.is_empty()).then(|| {
        primitive
            .targets
            .iter()
            .map(|offsets| json::mesh::MorphTarget {
                positions: Some(buffer.push_vec3(offsets)),
                normals: None,
                tangents: None,
            })
            .collect()
    });

    json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(indices),
        material: primitive.material.map(json::Index::new),
        mode: Valid(primitive.mode),
        targets,
    }
}

/// Build a GLB file holding `mesh`
pub fn build_glb(mesh: &TestMesh) -> Vec<u8> {
    let mut buffer = BufferBuilder::default();
    let primitives = mesh
        .primitives
        .iter()
        .map(|primitive| build_primitive(&mut buffer, primitive))
        .collect();

    // Node 0 holds the mesh, joints follow as root nodes
    let mut mesh_node = node(&mesh.name);
    mesh_node.mesh = Some(json::Index::new(0));
    let mut skins = Vec::new();
    if !mesh.joints.is_empty() {
        mesh_node.skin = Some(json::Index::new(0));
        skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: None,
            joints: (1..=mesh.joints.len() as u32).map(json::Index::new).collect(),
            name: None,
            skeleton: None,
        });
    }
    let nodes: Vec<json::Node> = std::iter::once(mesh_node)
        .chain(mesh.joints.iter().map(|joint| node(joint)))
        .collect();

    let materials = mesh
        .materials
        .iter()
        .map(|name| json::Material {
            name: Some(name.clone()),
            ..Default::default()
        })
        .collect();

    let scenes = vec![json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes: (0..nodes.len() as u32).map(json::Index::new).collect(),
    }];

    // Create buffer (byte length will be set by assemble_glb)
    let buffers = vec![json::Buffer {
        byte_length: 0u64.into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }];

    let root = json::Root {
        accessors: buffer.accessors,
        animations: Vec::new(),
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some("scene-export-test".to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers,
        buffer_views: buffer.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extras: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        images: Vec::new(),
        materials,
        meshes: vec![json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(mesh.name.clone()),
            primitives,
            weights: None,
        }],
        nodes,
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes,
        skins,
        textures: Vec::new(),
    };

    assemble_glb(&root, &buffer.data)
}
