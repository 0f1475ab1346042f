//! Generated reference geometry: the ground grid and the UV sphere.
//!
//! These are the only meshes the viewer builds itself; everything else is
//! decoded from asset files. Kept renderer-agnostic (plain `TriMesh` /
//! `LineSet` output).

use glam::Vec3;

use crate::scene::{LineSet, TriMesh};

/// Build a square reference grid in the XZ plane, centered on the origin.
///
/// `size` is the total extent along each axis, `divisions` the number of
/// cells per axis, so the grid has `divisions + 1` lines in each direction.
pub fn grid(size: f32, divisions: u32) -> LineSet {
    let mut positions = Vec::with_capacity(((divisions + 1) * 4) as usize);
    let half = size * 0.5;
    let step = size / divisions.max(1) as f32;

    for i in 0..=divisions {
        let t = -half + i as f32 * step;
        // Line parallel to X, then the one parallel to Z.
        positions.push([-half, 0.0, t]);
        positions.push([half, 0.0, t]);
        positions.push([t, 0.0, -half]);
        positions.push([t, 0.0, half]);
    }

    LineSet { positions }
}

/// Build a UV sphere with smooth normals.
///
/// `segments` is the longitudinal resolution, `rings` the latitudinal one.
/// Vertices are laid out ring-major with a duplicated seam column so the
/// index pattern stays regular.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> TriMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut positions = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for ring in 0..=rings {
        // Polar angle from +Y (0) to -Y (pi).
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for seg in 0..=segments {
            let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let n = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
            normals.push(n.to_array());
            positions.push((n * radius).to_array());
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    TriMesh {
        positions,
        normals,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_expected_line_count() {
        let g = grid(20.0, 20);
        // 21 lines per direction, 2 points per line.
        assert_eq!(g.positions.len(), 21 * 2 * 2);
        assert_eq!(g.segment_count(), 42);
        // All points lie in the XZ plane within the extent.
        for p in &g.positions {
            assert_eq!(p[1], 0.0);
            assert!(p[0] >= -10.0 && p[0] <= 10.0);
            assert!(p[2] >= -10.0 && p[2] <= 10.0);
        }
    }

    #[test]
    fn sphere_vertices_sit_on_the_radius_with_unit_normals() {
        let s = uv_sphere(1.0, 32, 32);
        assert_eq!(s.positions.len(), 33 * 33);
        assert_eq!(s.indices.len(), (32 * 32 * 6) as usize);
        for (p, n) in s.positions.iter().zip(&s.normals) {
            let p = Vec3::from(*p);
            let n = Vec3::from(*n);
            assert!((p.length() - 1.0).abs() < 1e-5);
            assert!((n.length() - 1.0).abs() < 1e-5);
            // Normal points along the position for a sphere at the origin.
            assert!(p.dot(n) > 0.999);
        }
    }

    #[test]
    fn sphere_indices_are_in_range() {
        let s = uv_sphere(2.0, 8, 6);
        let max = s.positions.len() as u32;
        assert!(s.indices.iter().all(|&i| i < max));
    }
}
