//! Text label meshes: layout plus per-glyph extrusion.
//!
//! A label is a single `TriMesh` built by walking the string with a pen,
//! extruding each glyph outline at the pen position, and finally centering
//! the whole mesh on its bounding box so callers can position it by its
//! middle.

use crate::font::extrude::{ExtrudeOptions, extrude_path};
use crate::font::tessellate::Affine2x3;
use crate::font::{FontError, FontQuery, FontSystem};
use crate::scene::{Rgba, TriMesh};

/// Styling for extruded text labels.
#[derive(Debug, Clone)]
pub struct LabelStyle {
    pub families: Vec<String>,
    pub weight: u16,
    /// Glyph size (em height) in world units.
    pub size: f32,
    /// Core extrusion depth in world units.
    pub depth: f32,
    pub bevel_thickness: f32,
    pub bevel_size: f32,
    pub bevel_segments: u32,
    /// Curve subdivision hint; higher means smoother outlines.
    pub curve_segments: u32,
    pub color: Rgba,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            families: vec![
                "Helvetica".into(),
                "Arial".into(),
                "Liberation Sans".into(),
                "DejaVu Sans".into(),
                "sans-serif".into(),
            ],
            weight: 700,
            size: 0.25,
            depth: 0.01,
            bevel_thickness: 0.03,
            bevel_size: 0.01,
            bevel_segments: 5,
            curve_segments: 12,
            color: Rgba::WHITE,
        }
    }
}

impl LabelStyle {
    pub fn query(&self) -> FontQuery {
        FontQuery {
            families: self.families.clone(),
            weight: self.weight,
            italic: false,
        }
    }
}

/// Build a centered 3D mesh for `text`.
///
/// Characters without an outline (spaces, missing glyphs) still advance the
/// pen; a newline resets the pen to a fresh line below. The typeface lookup
/// goes through the font system's memoizing resolver, so concurrent callers
/// share one loaded face.
pub fn build_label_mesh(
    fonts: &FontSystem,
    style: &LabelStyle,
    text: &str,
) -> Result<TriMesh, FontError> {
    let face = fonts.resolve_cached(&style.query())?;
    let scale = face.units_to_world_scale(style.size);
    let line_height = (face.v_metrics.ascender - face.v_metrics.descender) * scale;

    // Flattening tolerance in font units, derived from the subdivision hint.
    let tolerance =
        (face.units_per_em() / (style.curve_segments.max(1) as f32 * 10.0)).max(1.0);

    let extrude = ExtrudeOptions {
        depth: style.depth,
        bevel_thickness: style.bevel_thickness,
        bevel_size: style.bevel_size,
        bevel_segments: style.bevel_segments,
        tolerance,
    };

    let mut mesh = TriMesh::default();
    let mut pen_x = 0.0f32;
    let mut pen_y = 0.0f32;

    for ch in text.chars() {
        if ch == '\n' {
            pen_x = 0.0;
            pen_y -= line_height;
            continue;
        }

        let glyph_id = match fonts.glyph_id_for_char(&face, ch) {
            Ok(id) => id,
            Err(_) => continue,
        };
        let advance = fonts.glyph_h_metrics(&face, glyph_id)?.advance_width * scale;

        // Whitespace and other empty glyphs advance without geometry.
        if let Ok(path) = fonts.glyph_outline_path(&face, glyph_id) {
            let transform = Affine2x3 {
                m: [[scale, 0.0, pen_x], [0.0, scale, pen_y]],
            };
            let glyph = extrude_path(&path, &transform, &extrude)
                .map_err(|e| FontError::Other(e.to_string()))?;
            mesh.append(&glyph);
        }

        pen_x += advance;
    }

    mesh.center();
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fonts() -> Option<FontSystem> {
        FontSystem::new().ok()
    }

    #[test]
    fn default_style_matches_the_label_setup() {
        let s = LabelStyle::default();
        assert_eq!(s.size, 0.25);
        assert_eq!(s.depth, 0.01);
        assert_eq!(s.bevel_thickness, 0.03);
        assert_eq!(s.bevel_size, 0.01);
        assert_eq!(s.bevel_segments, 5);
        assert_eq!(s.curve_segments, 12);
        assert_eq!(s.weight, 700);
        assert_eq!(s.color, Rgba::WHITE);
    }

    #[test]
    fn label_mesh_is_centered_and_sized_to_the_style() {
        let Some(fonts) = fonts() else {
            return;
        };
        let style = LabelStyle::default();
        let mesh = build_label_mesh(&fonts, &style, "Teapot").unwrap();
        let bounds = mesh.bounds();
        assert!(!bounds.is_empty());
        let c = bounds.center();
        assert!(c.x.abs() < 1e-4 && c.y.abs() < 1e-4 && c.z.abs() < 1e-4);
        // Glyph height stays within an em at the requested size.
        assert!(bounds.size().y <= style.size * 1.5);
        // Total depth includes the bevel thickness on both faces.
        let total = style.depth + 2.0 * style.bevel_thickness;
        assert!((bounds.size().z - total).abs() < 1e-4);
    }

    #[test]
    fn whitespace_advances_without_geometry() {
        let Some(fonts) = fonts() else {
            return;
        };
        let style = LabelStyle::default();
        let spaced = build_label_mesh(&fonts, &style, "a a").unwrap();
        let tight = build_label_mesh(&fonts, &style, "aa").unwrap();
        let sw = spaced.bounds().size().x;
        let tw = tight.bounds().size().x;
        assert!(sw > tw);
    }

    #[test]
    fn repeated_builds_share_one_resolved_face() {
        let Some(fonts) = fonts() else {
            return;
        };
        let style = LabelStyle::default();
        let a = fonts.resolve_cached(&style.query()).unwrap();
        let b = fonts.resolve_cached(&style.query()).unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }
}
