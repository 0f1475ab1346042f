//! Fill tessellation of glyph outlines.
//!
//! Turns a `lyon::path::Path` (font units) into a flat 2D triangle list,
//! optionally transformed into world units on the way out.

use lyon::math::Point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
};

/// Row-major 2x3 affine transform applied to tessellated positions.
#[derive(Debug, Clone, Copy)]
pub struct Affine2x3 {
    pub m: [[f32; 3]; 2],
}

impl Affine2x3 {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    /// Uniform scale followed by a translation.
    pub fn scale_translate(scale: f32, tx: f32, ty: f32) -> Self {
        Self {
            m: [[scale, 0.0, tx], [0.0, scale, ty]],
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Point) -> [f32; 2] {
        [
            self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2],
            self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2],
        ]
    }
}

/// Tessellated fill geometry in 2D.
#[derive(Debug, Clone, Default)]
pub struct FillGeometry {
    pub positions: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl FillGeometry {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Errors from the tessellation stage.
#[derive(thiserror::Error, Debug)]
pub enum TessellationError {
    #[error("fill tessellation failed: {0:?}")]
    Fill(lyon::tessellation::TessellationError),
}

/// Tessellate a filled path with the non-zero winding rule.
///
/// `tolerance` is the flattening tolerance in the path's own units; glyph
/// paths are in font units so callers scale it by units-per-em.
pub fn tessellate_fill(
    path: &Path,
    transform: &Affine2x3,
    tolerance: f32,
) -> Result<FillGeometry, TessellationError> {
    let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tess = FillTessellator::new();

    let options = FillOptions::tolerance(tolerance).with_fill_rule(FillRule::NonZero);
    tess.tessellate_path(
        path,
        &options,
        &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| {
            transform.transform_point(v.position())
        }),
    )
    .map_err(TessellationError::Fill)?;

    Ok(FillGeometry {
        positions: buffers.vertices,
        indices: buffers.indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::point;

    fn unit_square() -> Path {
        let mut b = Path::builder();
        b.begin(point(0.0, 0.0));
        b.line_to(point(1.0, 0.0));
        b.line_to(point(1.0, 1.0));
        b.line_to(point(0.0, 1.0));
        b.close();
        b.build()
    }

    #[test]
    fn square_tessellates_to_two_triangles() {
        let geo = tessellate_fill(&unit_square(), &Affine2x3::IDENTITY, 0.01).unwrap();
        assert_eq!(geo.triangle_count(), 2);
        assert_eq!(geo.positions.len(), 4);
    }

    #[test]
    fn transform_scales_and_translates_output() {
        let t = Affine2x3::scale_translate(2.0, 10.0, -5.0);
        let geo = tessellate_fill(&unit_square(), &t, 0.01).unwrap();
        for p in &geo.positions {
            assert!(p[0] >= 10.0 - 1e-5 && p[0] <= 12.0 + 1e-5);
            assert!(p[1] >= -5.0 - 1e-5 && p[1] <= -3.0 + 1e-5);
        }
    }

    #[test]
    fn indices_stay_in_range() {
        let geo = tessellate_fill(&unit_square(), &Affine2x3::IDENTITY, 0.01).unwrap();
        let max = geo.positions.len() as u32;
        assert!(geo.indices.iter().all(|&i| i < max));
    }
}
