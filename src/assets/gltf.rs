//! glTF 2.0 decoding via the `gltf` crate.
//!
//! Handles both `.gltf` (JSON plus external buffers) and `.glb` (single
//! binary container); `gltf::import` resolves the difference. The scene
//! hierarchy and node transforms are preserved, flattened into our own node
//! tree. Compressed files declaring `KHR_draco_mesh_compression` are
//! rejected up front with a decoder-missing error instead of failing deep in
//! primitive parsing.

use std::path::Path;

use glam::{Quat, Vec3};

use crate::assets::{AssetError, DEFAULT_MESH_COLOR};
use crate::scene::{Material, Node, Rgba, Transform, TriMesh};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Load a glTF or GLB file into a node tree.
pub fn load(path: &Path) -> Result<Node, AssetError> {
    let (document, buffers, _images) = match gltf::import(path) {
        Ok(loaded) => loaded,
        Err(gltf::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssetError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(AssetError::decode(path, e.to_string())),
    };

    if let Some(decoder) = missing_required_decoder(&document) {
        return Err(AssetError::MissingDecoder {
            path: path.to_path_buf(),
            decoder,
        });
    }

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::decode(path, "file contains no scenes"))?;

    convert_scene(path, &scene, &buffers)
}

/// Wrap a glTF scene's root nodes under a fresh group node.
///
/// The wrapper keeps an identity transform so placement can overwrite it
/// without clobbering translations or scales stored in the file, even when
/// the scene has a single root node.
fn convert_scene(
    path: &Path,
    scene: &gltf::Scene<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<Node, AssetError> {
    let mut root = Node::new("gltf");
    for gltf_node in scene.nodes() {
        root.add_child(convert_node(path, &gltf_node, buffers)?);
    }

    if root.children.is_empty() {
        return Err(AssetError::decode(path, "scene contains no nodes"));
    }
    Ok(root)
}

/// Report a required extension we cannot satisfy, if any.
pub fn missing_required_decoder(document: &gltf::Document) -> Option<String> {
    document
        .extensions_required()
        .find(|ext| *ext == DRACO_EXTENSION)
        .map(str::to_string)
}

fn convert_node(
    path: &Path,
    gltf_node: &gltf::Node<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<Node, AssetError> {
    let name = gltf_node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("gltf-node-{}", gltf_node.index()));

    let (translation, rotation, scale) = gltf_node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    };

    let mut node = match gltf_node.mesh() {
        Some(gltf_mesh) => {
            let (mesh, color) = convert_mesh(path, &gltf_mesh, buffers)?;
            Node::new(name).with_mesh(mesh, Material::Lit { color })
        }
        None => Node::new(name),
    }
    .with_transform(transform);

    for child in gltf_node.children() {
        node.add_child(convert_node(path, &child, buffers)?);
    }
    Ok(node)
}

/// Merge all primitives of one glTF mesh into a single `TriMesh`.
///
/// The base color factor of the first primitive's material wins; teapot
/// assets carry at most one material.
fn convert_mesh(
    path: &Path,
    gltf_mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<(TriMesh, Rgba), AssetError> {
    let mut mesh = TriMesh::default();
    let mut color = DEFAULT_MESH_COLOR;

    for (i, prim) in gltf_mesh.primitives().enumerate() {
        let reader = prim.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| AssetError::decode(path, "primitive has no POSITION attribute"))?
            .collect();
        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|iter| iter.collect())
            .unwrap_or_default();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(read) => read.into_u32().collect(),
            // Non-indexed primitives draw vertices in order.
            None => (0..positions.len() as u32).collect(),
        };

        let mut part = TriMesh {
            positions,
            normals,
            indices,
        };
        part.ensure_normals();
        mesh.append(&part);

        if i == 0 {
            let c = prim
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();
            color = Rgba::new(c[0], c[1], c[2], c[3]);
        }
    }

    if mesh.positions.is_empty() {
        return Err(AssetError::decode(path, "mesh has no primitives"));
    }
    Ok((mesh, color))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRACO_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "extensionsRequired": ["KHR_draco_mesh_compression"],
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "scenes": [{ "nodes": [] }],
        "scene": 0
    }"#;

    const PLAIN_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [] }],
        "scene": 0
    }"#;

    const TRANSFORMED_ROOT_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "nodes": [{ "translation": [5.0, 0.0, 0.0], "scale": [2.0, 2.0, 2.0] }],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    }"#;

    #[test]
    fn draco_requirement_is_detected() {
        let gltf = gltf::Gltf::from_slice_without_validation(DRACO_GLTF.as_bytes()).unwrap();
        let missing = missing_required_decoder(&gltf.document);
        assert_eq!(missing.as_deref(), Some("KHR_draco_mesh_compression"));
    }

    #[test]
    fn plain_files_require_no_decoder() {
        let gltf = gltf::Gltf::from_slice(PLAIN_GLTF.as_bytes()).unwrap();
        assert!(missing_required_decoder(&gltf.document).is_none());
    }

    #[test]
    fn single_root_node_keeps_its_file_transform_under_the_wrapper() {
        let gltf = gltf::Gltf::from_slice(TRANSFORMED_ROOT_GLTF.as_bytes()).unwrap();
        let scene = gltf.document.default_scene().unwrap();
        let root = convert_scene(Path::new("t.gltf"), &scene, &[]).unwrap();

        // The wrapper is free for placement to overwrite.
        assert_eq!(root.transform, Transform::IDENTITY);
        assert_eq!(root.children.len(), 1);
        let child = &root.children[0];
        assert_eq!(child.transform.translation, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(child.transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = load(Path::new("definitely/not/here.gltf")).unwrap_err();
        assert!(matches!(err, AssetError::NotFound { .. }));
    }
}
