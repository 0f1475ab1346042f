//! FBX binary decoding via `fbxcel`.
//!
//! We read the raw node tree rather than the full object graph: geometry
//! lives under `Objects/Geometry` as a `Vertices` double array plus a
//! `PolygonVertexIndex` int array. Polygons are variable-length; the last
//! index of each polygon is stored bitwise-negated (`!idx`) as a terminator.
//! Object-level transforms in the file are ignored; placement comes from the
//! pipeline spec.

use std::{fs::File, io::BufReader, path::Path};

use fbxcel::tree::any::AnyTree;

use crate::assets::{AssetError, DEFAULT_MESH_COLOR};
use crate::scene::{Material, Node, TriMesh};

/// Load an FBX 7.x binary file into a node (grouped if multi-geometry).
pub fn load(path: &Path) -> Result<Node, AssetError> {
    let file = File::open(path).map_err(|_| AssetError::NotFound {
        path: path.to_path_buf(),
    })?;

    let tree = match AnyTree::from_seekable_reader(BufReader::new(file)) {
        Ok(AnyTree::V7400(_, tree, _)) => tree,
        Ok(other) => {
            return Err(AssetError::decode(
                path,
                format!("unsupported FBX version: {:?}", other.fbx_version()),
            ));
        }
        Err(e) => return Err(AssetError::decode(path, e.to_string())),
    };

    let mut meshes = Vec::new();
    for objects in tree.root().children_by_name("Objects") {
        for geometry in objects.children_by_name("Geometry") {
            let is_mesh = geometry
                .attributes()
                .get(2)
                .and_then(|a| a.get_string())
                .map(|s| s == "Mesh")
                .unwrap_or(false);
            if !is_mesh {
                continue;
            }

            let vertices = geometry
                .children_by_name("Vertices")
                .next()
                .and_then(|n| n.attributes().first())
                .and_then(|a| a.get_arr_f64())
                .ok_or_else(|| AssetError::decode(path, "geometry has no Vertices array"))?;
            let polygons = geometry
                .children_by_name("PolygonVertexIndex")
                .next()
                .and_then(|n| n.attributes().first())
                .and_then(|a| a.get_arr_i32())
                .ok_or_else(|| {
                    AssetError::decode(path, "geometry has no PolygonVertexIndex array")
                })?;

            let mesh = mesh_from_polygons(vertices, polygons)
                .map_err(|reason| AssetError::decode(path, reason))?;
            meshes.push(mesh);
        }
    }

    if meshes.is_empty() {
        return Err(AssetError::decode(path, "file contains no mesh geometry"));
    }

    if meshes.len() == 1
        && let Some(mesh) = meshes.pop()
    {
        return Ok(mesh_node("fbx-mesh", mesh));
    }

    let mut root = Node::new("fbx");
    for (i, mesh) in meshes.into_iter().enumerate() {
        root.add_child(mesh_node(format!("fbx-mesh-{i}"), mesh));
    }
    Ok(root)
}

fn mesh_node(name: impl Into<String>, mesh: TriMesh) -> Node {
    Node::new(name).with_mesh(mesh, Material::Lit {
        color: DEFAULT_MESH_COLOR,
    })
}

/// Build a triangle mesh from FBX control points and polygon indices.
///
/// `control_points` is xyz-interleaved; each polygon in
/// `polygon_vertex_index` ends with a negated index (`!idx`). Polygons with
/// more than three corners are fan-triangulated. Smooth normals are
/// generated afterwards; the per-polygon normal layers in the file are not
/// consulted.
pub fn mesh_from_polygons(
    control_points: &[f64],
    polygon_vertex_index: &[i32],
) -> Result<TriMesh, String> {
    if control_points.len() % 3 != 0 {
        return Err(format!(
            "control point array length {} is not a multiple of 3",
            control_points.len()
        ));
    }
    let point_count = control_points.len() / 3;

    let mut mesh = TriMesh {
        positions: control_points
            .chunks_exact(3)
            .map(|c| [c[0] as f32, c[1] as f32, c[2] as f32])
            .collect(),
        normals: Vec::new(),
        indices: Vec::new(),
    };

    let mut polygon: Vec<u32> = Vec::with_capacity(4);
    for &raw in polygon_vertex_index {
        let (index, last) = if raw < 0 { (!raw, true) } else { (raw, false) };
        let index = index as u32;
        if index as usize >= point_count {
            return Err(format!(
                "polygon index {index} out of range ({point_count} control points)"
            ));
        }
        polygon.push(index);

        if last {
            if polygon.len() < 3 {
                return Err(format!("degenerate polygon with {} corners", polygon.len()));
            }
            for i in 1..polygon.len() - 1 {
                mesh.indices
                    .extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
            }
            polygon.clear();
        }
    }

    if !polygon.is_empty() {
        return Err("polygon index array ends without a terminator".into());
    }

    mesh.ensure_normals();
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_POINTS: [f64; 12] = [
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, //
        0.0, 1.0, 0.0,
    ];

    #[test]
    fn quad_fan_triangulates_into_two_triangles() {
        // Last index negated: !3 == -4.
        let mesh = mesh_from_polygons(&QUAD_POINTS, &[0, 1, 2, -4]).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.normals.len(), 4);
        assert!(mesh.normals.iter().all(|n| n[2] > 0.99));
    }

    #[test]
    fn triangle_terminator_decodes_correctly() {
        let mesh = mesh_from_polygons(&QUAD_POINTS, &[0, 1, -3]).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn two_polygons_share_the_control_points() {
        let mesh = mesh_from_polygons(&QUAD_POINTS, &[0, 1, -3, 0, 2, -4]).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.positions.len(), 4);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = mesh_from_polygons(&QUAD_POINTS, &[0, 1, -10]).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let err = mesh_from_polygons(&QUAD_POINTS, &[0, 1, 2]).unwrap_err();
        assert!(err.contains("terminator"));
    }

    #[test]
    fn ragged_control_points_are_rejected() {
        let err = mesh_from_polygons(&QUAD_POINTS[..10], &[0, 1, -3]).unwrap_err();
        assert!(err.contains("multiple of 3"));
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = load(Path::new("definitely/not/here.fbx")).unwrap_err();
        assert!(matches!(err, AssetError::NotFound { .. }));
    }
}
