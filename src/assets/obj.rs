//! Wavefront OBJ decoding via `tobj`.

use std::path::Path;

use crate::assets::{AssetError, DEFAULT_MESH_COLOR};
use crate::scene::{Material, Node, TriMesh};

/// Load an OBJ file into a group node with one child per model.
///
/// Triangulation and vertex de-duplication are delegated to `tobj`'s GPU
/// load options. Models without normals get area-weighted smooth normals.
pub fn load(path: &Path) -> Result<Node, AssetError> {
    let (models, _materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|e| match e {
            tobj::LoadError::OpenFileFailed => AssetError::NotFound {
                path: path.to_path_buf(),
            },
            other => AssetError::decode(path, other.to_string()),
        })?;

    if models.is_empty() {
        return Err(AssetError::decode(path, "file contains no models"));
    }

    let mut nodes: Vec<Node> = models.into_iter().map(model_to_node).collect();
    // A single-model file does not need a wrapping group.
    if nodes.len() == 1
        && let Some(only) = nodes.pop()
    {
        return Ok(only);
    }

    let mut root = Node::new("obj");
    for node in nodes {
        root.add_child(node);
    }
    Ok(root)
}

fn model_to_node(model: tobj::Model) -> Node {
    let m = model.mesh;
    let mut mesh = TriMesh {
        positions: m
            .positions
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        normals: m
            .normals
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        indices: m.indices,
    };
    mesh.ensure_normals();

    let name = if model.name.is_empty() {
        "obj-mesh".to_string()
    } else {
        model.name
    };
    Node::new(name).with_mesh(mesh, Material::Lit {
        color: DEFAULT_MESH_COLOR,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;
    use std::io::Cursor;

    const TRIANGLE_OBJ: &str = "\
o tri
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

    fn load_str(src: &str) -> Vec<tobj::Model> {
        let (models, _) = tobj::load_obj_buf(
            &mut Cursor::new(src.as_bytes()),
            &tobj::GPU_LOAD_OPTIONS,
            |_| tobj::load_mtl_buf(&mut Cursor::new(&b""[..])),
        )
        .unwrap();
        models
    }

    #[test]
    fn triangle_decodes_with_generated_normals() {
        let models = load_str(TRIANGLE_OBJ);
        assert_eq!(models.len(), 1);
        let node = model_to_node(models.into_iter().next().unwrap());
        assert_eq!(node.name, "tri");
        let NodeKind::Mesh { mesh, .. } = &node.kind else {
            panic!("expected a mesh node");
        };
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.normals.len(), 3);
        // Counter-clockwise triangle in XY faces +Z.
        assert!(mesh.normals[0][2] > 0.99);
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = load(Path::new("definitely/not/here.obj")).unwrap_err();
        assert!(matches!(err, AssetError::NotFound { .. }));
    }
}
