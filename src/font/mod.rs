//! Typeface resolution and glyph outline extraction.
//!
//! Labels are rendered as extruded vector glyph outlines:
//! - Discover fonts via `fontdb` (system fonts).
//! - Resolve a family/weight query to a concrete face, memoized so the
//!   typeface file is read once even though four label pipelines request it.
//! - Extract glyph outlines (move_to/line_to/quad_to/curve_to) from TTF/OTF
//!   with `ttf-parser` and convert them to `lyon::path::Path`.
//!
//! Downstream: `tessellate` turns outlines into fill triangles, `extrude`
//! lifts them to 3D, `label` lays out whole strings.

pub mod extrude;
pub mod label;
pub mod tessellate;

use std::{
    collections::HashMap,
    fs,
    sync::{Arc, Mutex},
};

use fontdb::{Database, Family, ID, Query, Source, Style, Weight};
use lyon::math::point;
use lyon::path::Path;

/// A stable identifier for a selected font face.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontFaceId(pub ID);

/// Simplified font selection query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FontQuery {
    /// Preferred family names, in priority order. Generic names
    /// (`sans-serif`, `serif`, `monospace`) are understood.
    pub families: Vec<String>,
    /// CSS-ish weight (100..900); 700 = bold.
    pub weight: u16,
    pub italic: bool,
}

/// Vertical metrics in font units (units-per-em).
#[derive(Debug, Copy, Clone)]
pub struct FontVMetrics {
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Per-glyph horizontal metrics in font units.
#[derive(Debug, Copy, Clone, Default)]
pub struct GlyphHMetrics {
    pub advance_width: f32,
}

/// A resolved face plus its backing bytes.
#[derive(Debug, Clone)]
pub struct ResolvedFace {
    pub face_id: FontFaceId,
    pub bytes: Arc<[u8]>,
    pub index: u32,
    pub v_metrics: FontVMetrics,
}

impl ResolvedFace {
    #[inline]
    pub fn units_per_em(&self) -> f32 {
        self.v_metrics.units_per_em
    }

    /// Scale factor mapping font units to world units for a given size.
    #[inline]
    pub fn units_to_world_scale(&self, size: f32) -> f32 {
        size / self.v_metrics.units_per_em
    }
}

/// Errors produced by the font subsystem.
#[derive(thiserror::Error, Debug)]
pub enum FontError {
    #[error("no fonts found on this system")]
    NoFontsAvailable,

    #[error("failed to resolve a font face for query: {0:?}")]
    ResolveFailed(FontQuery),

    #[error("font face has no file-backed source")]
    NonFileBackedSource,

    #[error("failed to read font file from disk: {0}")]
    ReadFailed(String),

    #[error("failed to parse font face")]
    ParseFailed,

    #[error("glyph outline not found for glyph id {glyph_id}")]
    MissingGlyph { glyph_id: u16 },

    #[error("{0}")]
    Other(String),
}

/// The font system: a `fontdb` database plus a memoizing resolver.
///
/// `resolve_cached` is the shared-typeface seam: all four label pipelines
/// issue the same query from worker threads and only the first one touches
/// the filesystem.
pub struct FontSystem {
    db: Database,
    cache: Mutex<HashMap<FontQuery, Arc<ResolvedFace>>>,
}

impl FontSystem {
    /// Create a font system backed by the system font database.
    pub fn new() -> Result<Self, FontError> {
        let mut db = Database::new();
        db.load_system_fonts();

        if db.faces().next().is_none() {
            return Err(FontError::NoFontsAvailable);
        }

        Ok(Self {
            db,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a query, reusing a cached face when the same query was
    /// resolved before.
    pub fn resolve_cached(&self, query: &FontQuery) -> Result<Arc<ResolvedFace>, FontError> {
        if let Some(face) = self.cache.lock().unwrap().get(query) {
            return Ok(Arc::clone(face));
        }
        let face = Arc::new(self.resolve(query)?);
        self.cache
            .lock()
            .unwrap()
            .entry(query.clone())
            .or_insert_with(|| Arc::clone(&face));
        Ok(face)
    }

    /// Resolve a query to a concrete face.
    ///
    /// Strategy: try the named families in order with the requested
    /// weight/style, fall back to generic sans-serif, then to the first face
    /// in the database.
    pub fn resolve(&self, query: &FontQuery) -> Result<ResolvedFace, FontError> {
        let style = if query.italic {
            Style::Italic
        } else {
            Style::Normal
        };
        let weight = Weight(query.weight.clamp(1, 1000));

        let mut families: Vec<Family<'_>> = Vec::new();
        for f in &query.families {
            let s = f.trim();
            if s.eq_ignore_ascii_case("serif") {
                families.push(Family::Serif);
            } else if s.eq_ignore_ascii_case("sans-serif") || s.eq_ignore_ascii_case("sans") {
                families.push(Family::SansSerif);
            } else if s.eq_ignore_ascii_case("monospace") || s.eq_ignore_ascii_case("mono") {
                families.push(Family::Monospace);
            } else if !s.is_empty() {
                families.push(Family::Name(s));
            }
        }

        let q = Query {
            families: &families,
            weight,
            style,
            stretch: fontdb::Stretch::Normal,
        };

        let id = self
            .db
            .query(&q)
            .or_else(|| {
                let fallback = [Family::SansSerif];
                self.db.query(&Query {
                    families: &fallback,
                    weight,
                    style,
                    stretch: fontdb::Stretch::Normal,
                })
            })
            .or_else(|| self.db.faces().next().map(|f| f.id))
            .ok_or(FontError::NoFontsAvailable)?;

        let face = self
            .db
            .face(id)
            .ok_or_else(|| FontError::ResolveFailed(query.clone()))?;

        let (path, index) = match &face.source {
            Source::File(p) => (p.to_path_buf(), face.index),
            _ => return Err(FontError::NonFileBackedSource),
        };

        let bytes = read_font_bytes(&path)?;
        let parsed = ttf_parser::Face::parse(&bytes, index).map_err(|_| FontError::ParseFailed)?;

        let units_per_em = parsed.units_per_em() as f32;
        let asc = parsed
            .typographic_ascender()
            .unwrap_or_else(|| parsed.ascender()) as f32;
        let desc = parsed
            .typographic_descender()
            .unwrap_or_else(|| parsed.descender()) as f32;

        Ok(ResolvedFace {
            face_id: FontFaceId(id),
            bytes,
            index,
            v_metrics: FontVMetrics {
                units_per_em,
                ascender: asc,
                descender: desc,
            },
        })
    }

    /// Extract a glyph outline as a lyon `Path`, in font units.
    pub fn glyph_outline_path(
        &self,
        face: &ResolvedFace,
        glyph_id: u16,
    ) -> Result<Path, FontError> {
        let parsed =
            ttf_parser::Face::parse(&face.bytes, face.index).map_err(|_| FontError::ParseFailed)?;
        let gid = ttf_parser::GlyphId(glyph_id);

        let mut builder = LyonOutlineBuilder::new();
        if parsed.outline_glyph(gid, &mut builder).is_none() {
            return Err(FontError::MissingGlyph { glyph_id });
        }
        Ok(builder.build())
    }

    /// Find the glyph id for a Unicode codepoint.
    pub fn glyph_id_for_char(&self, face: &ResolvedFace, ch: char) -> Result<u16, FontError> {
        let parsed =
            ttf_parser::Face::parse(&face.bytes, face.index).map_err(|_| FontError::ParseFailed)?;
        let gid = parsed
            .glyph_index(ch)
            .ok_or_else(|| FontError::Other(format!("glyph not found for char {ch:?}")))?;
        Ok(gid.0)
    }

    /// Horizontal metrics (advance width) for a glyph, in font units.
    pub fn glyph_h_metrics(
        &self,
        face: &ResolvedFace,
        glyph_id: u16,
    ) -> Result<GlyphHMetrics, FontError> {
        let parsed =
            ttf_parser::Face::parse(&face.bytes, face.index).map_err(|_| FontError::ParseFailed)?;
        let adv = parsed
            .glyph_hor_advance(ttf_parser::GlyphId(glyph_id))
            .ok_or_else(|| {
                FontError::Other(format!("missing hor advance for glyph id {glyph_id}"))
            })? as f32;
        Ok(GlyphHMetrics { advance_width: adv })
    }
}

fn read_font_bytes(path: &std::path::Path) -> Result<Arc<[u8]>, FontError> {
    let data = fs::read(path).map_err(|_| FontError::ReadFailed(path.display().to_string()))?;
    log::info!("typeface: {} ({} bytes loaded)", path.display(), data.len());
    Ok(Arc::<[u8]>::from(data))
}

/// Convert `ttf-parser` outline callbacks into a `lyon::path::Path`.
///
/// A glyph may contain multiple contours; `move_to` starts a new one.
struct LyonOutlineBuilder {
    builder: lyon::path::path::Builder,
    contour_open: bool,
}

impl LyonOutlineBuilder {
    fn new() -> Self {
        Self {
            builder: Path::builder(),
            contour_open: false,
        }
    }

    fn build(mut self) -> Path {
        if self.contour_open {
            self.builder.close();
            self.contour_open = false;
        }
        self.builder.build()
    }
}

impl ttf_parser::OutlineBuilder for LyonOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        if self.contour_open {
            self.builder.close();
        }
        self.builder.begin(point(x, y));
        self.contour_open = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(point(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quadratic_bezier_to(point(x1, y1), point(x, y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder
            .cubic_bezier_to(point(x1, y1), point(x2, y2), point(x, y));
    }

    fn close(&mut self) {
        if self.contour_open {
            self.builder.close();
            self.contour_open = false;
        }
    }
}
