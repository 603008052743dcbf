//! Programmatic scene generation for integration tests.
//!
//! - OBJ cubes as text
//! - GLB files with multiple primitives, skins and morph targets

#![allow(dead_code)]

mod glb_assembly;
pub mod gltf_json;
pub mod obj;
