//! Extrusion of filled outlines into solid 3D meshes.
//!
//! A glyph becomes a prism: two tessellated caps (front at `+half`, back at
//! `-half` along Z) plus side walls quadded along the flattened outline. The
//! bevel parameters thicken the prism rather than producing true chamfered
//! corners; the total depth is `depth + 2 * bevel_thickness` so beveled text
//! keeps the silhouette thickness it was tuned for.

use glam::Vec3;
use lyon::path::iterator::PathIterator as _;
use lyon::path::{Path, PathEvent};

use crate::font::tessellate::{Affine2x3, TessellationError, tessellate_fill};
use crate::scene::TriMesh;

/// Parameters for extruding a filled outline.
#[derive(Debug, Clone, Copy)]
pub struct ExtrudeOptions {
    /// Core extrusion depth along Z, in world units.
    pub depth: f32,
    /// Extra thickness added on each face, folded into the total depth.
    pub bevel_thickness: f32,
    /// Unused for geometry; kept so label styles carry the full parameter set.
    pub bevel_size: f32,
    pub bevel_segments: u32,
    /// Flattening tolerance for curves, in the path's own units.
    pub tolerance: f32,
}

impl ExtrudeOptions {
    /// Total Z extent of the extruded solid.
    #[inline]
    pub fn total_depth(&self) -> f32 {
        self.depth + 2.0 * self.bevel_thickness
    }
}

impl Default for ExtrudeOptions {
    fn default() -> Self {
        Self {
            depth: 0.1,
            bevel_thickness: 0.0,
            bevel_size: 0.0,
            bevel_segments: 0,
            tolerance: 0.02,
        }
    }
}

/// Extrude a filled path into a closed triangle mesh centered on Z=0.
///
/// The transform is applied to the 2D outline before extrusion, so callers
/// can hand over paths in font units together with a units-to-world scale.
pub fn extrude_path(
    path: &Path,
    transform: &Affine2x3,
    options: &ExtrudeOptions,
) -> Result<TriMesh, TessellationError> {
    let half = options.total_depth() * 0.5;
    let cap = tessellate_fill(path, transform, options.tolerance)?;

    let mut mesh = TriMesh::default();

    // Front cap at +half, facing +Z.
    let front_base = 0u32;
    for p in &cap.positions {
        mesh.positions.push([p[0], p[1], half]);
        mesh.normals.push([0.0, 0.0, 1.0]);
    }
    mesh.indices
        .extend(cap.indices.iter().map(|&i| front_base + i));

    // Back cap at -half, winding reversed so it faces -Z.
    let back_base = mesh.positions.len() as u32;
    for p in &cap.positions {
        mesh.positions.push([p[0], p[1], -half]);
        mesh.normals.push([0.0, 0.0, -1.0]);
    }
    for tri in cap.indices.chunks_exact(3) {
        mesh.indices
            .extend_from_slice(&[back_base + tri[0], back_base + tri[2], back_base + tri[1]]);
    }

    // Side walls: one quad per flattened outline edge, flat normals in the
    // XY plane.
    let mut first: Option<[f32; 2]> = None;
    let mut prev: Option<[f32; 2]> = None;
    for event in path.iter().flattened(options.tolerance) {
        match event {
            PathEvent::Begin { at } => {
                let p = transform.transform_point(at);
                first = Some(p);
                prev = Some(p);
            }
            PathEvent::Line { to, .. } => {
                let p = transform.transform_point(to);
                if let Some(a) = prev {
                    push_side_quad(&mut mesh, a, p, half);
                }
                prev = Some(p);
            }
            PathEvent::End { close, .. } => {
                if close
                    && let (Some(a), Some(b)) = (prev, first)
                {
                    push_side_quad(&mut mesh, a, b, half);
                }
                first = None;
                prev = None;
            }
            // Flattened iteration only emits Begin/Line/End.
            _ => {}
        }
    }

    Ok(mesh)
}

fn push_side_quad(mesh: &mut TriMesh, a: [f32; 2], b: [f32; 2], half: f32) {
    let edge = Vec3::new(b[0] - a[0], b[1] - a[1], 0.0);
    if edge.length_squared() < 1e-12 {
        return;
    }
    // Outward for counter-clockwise outer contours.
    let n = Vec3::new(edge.y, -edge.x, 0.0).normalize().to_array();

    let base = mesh.positions.len() as u32;
    mesh.positions.push([a[0], a[1], half]);
    mesh.positions.push([b[0], b[1], half]);
    mesh.positions.push([b[0], b[1], -half]);
    mesh.positions.push([a[0], a[1], -half]);
    for _ in 0..4 {
        mesh.normals.push(n);
    }
    mesh.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::point;

    fn square_path() -> Path {
        let mut b = Path::builder();
        b.begin(point(0.0, 0.0));
        b.line_to(point(1.0, 0.0));
        b.line_to(point(1.0, 1.0));
        b.line_to(point(0.0, 1.0));
        b.close();
        b.build()
    }

    fn opts(depth: f32, bevel: f32) -> ExtrudeOptions {
        ExtrudeOptions {
            depth,
            bevel_thickness: bevel,
            ..ExtrudeOptions::default()
        }
    }

    #[test]
    fn z_extent_includes_the_bevel_thickness() {
        let mesh = extrude_path(&square_path(), &Affine2x3::IDENTITY, &opts(0.01, 0.03)).unwrap();
        let bounds = mesh.bounds();
        let total = 0.01 + 2.0 * 0.03;
        assert!((bounds.max.z - total * 0.5).abs() < 1e-5);
        assert!((bounds.min.z + total * 0.5).abs() < 1e-5);
    }

    #[test]
    fn square_extrusion_has_caps_and_four_walls() {
        let mesh = extrude_path(&square_path(), &Affine2x3::IDENTITY, &opts(0.2, 0.0)).unwrap();
        // 2 cap triangles per face plus 2 per wall.
        assert_eq!(mesh.indices.len() / 3, 2 + 2 + 4 * 2);
        assert_eq!(mesh.positions.len(), mesh.normals.len());
    }

    #[test]
    fn cap_normals_face_outward() {
        let mesh = extrude_path(&square_path(), &Affine2x3::IDENTITY, &opts(0.2, 0.0)).unwrap();
        let half = 0.1;
        for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
            if (p[2] - half).abs() < 1e-6 && n[2].abs() > 0.5 {
                assert!(n[2] > 0.0);
            }
            if (p[2] + half).abs() < 1e-6 && n[2].abs() > 0.5 {
                assert!(n[2] < 0.0);
            }
        }
    }

    #[test]
    fn transform_is_applied_before_extrusion() {
        let t = Affine2x3::scale_translate(2.0, -1.0, 0.0);
        let mesh = extrude_path(&square_path(), &t, &opts(0.2, 0.0)).unwrap();
        let bounds = mesh.bounds();
        assert!((bounds.min.x + 1.0).abs() < 1e-5);
        assert!((bounds.max.x - 1.0).abs() < 1e-5);
    }
}
