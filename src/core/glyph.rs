use std::sync::Arc;

use crate::geom::{Point, Rect};

pub type GlyphId = u16;

/// Descriptor metrics a PDF font descriptor needs, in font units.
#[derive(Debug, Clone, Default)]
pub struct TypefaceMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub italic_angle: f32,
    pub bounds: Rect,
    pub is_fixed_pitch: bool,
    pub is_italic: bool,
    pub is_serif: bool,
    pub weight: u16,
}

/// A parsed font file. Metrics are cached at construction; the raw table data stays
/// available for subsetting and embedding.
pub struct Typeface {
    data: Arc<Vec<u8>>,
    index: u32,
    units_per_em: u16,
    glyph_count: u16,
    has_color: bool,
    post_script_name: String,
    advances: Vec<u16>,
    glyph_to_unicode: Vec<u32>,
    metrics: TypefaceMetrics,
}

impl Typeface {
    /// Parses a font from raw bytes. Returns None when the data is not a usable face.
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Option<Arc<Typeface>> {
        let face = ttf_parser::Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em();
        let glyph_count = face.number_of_glyphs();
        let has_color = face.tables().sbix.is_some()
            || face.tables().cbdt.is_some()
            || face.tables().colr.is_some();
        let post_script_name = face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|name| name.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut advances = Vec::with_capacity(usize::from(glyph_count));
        for glyph in 0..glyph_count {
            advances.push(face.glyph_hor_advance(ttf_parser::GlyphId(glyph)).unwrap_or(0));
        }

        let mut glyph_to_unicode = vec![0u32; usize::from(glyph_count)];
        if let Some(subtables) = face.tables().cmap {
            for subtable in subtables.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    if let Some(glyph) = subtable.glyph_index(codepoint) {
                        let slot = usize::from(glyph.0);
                        if slot < glyph_to_unicode.len() && glyph_to_unicode[slot] == 0 {
                            glyph_to_unicode[slot] = codepoint;
                        }
                    }
                });
            }
        }

        let bbox = face.global_bounding_box();
        let ascent = f32::from(face.typographic_ascender().unwrap_or(face.ascender()));
        let descent = f32::from(face.typographic_descender().unwrap_or(face.descender()));
        let metrics = TypefaceMetrics {
            ascent,
            descent,
            cap_height: face
                .capital_height()
                .filter(|height| *height > 0)
                .map(f32::from)
                .unwrap_or(ascent),
            italic_angle: face.italic_angle().unwrap_or(0.0),
            bounds: Rect::new(
                f32::from(bbox.x_min),
                f32::from(bbox.y_min),
                f32::from(bbox.x_max),
                f32::from(bbox.y_max),
            ),
            is_fixed_pitch: face.is_monospaced(),
            is_italic: face.is_italic(),
            is_serif: post_script_name.contains("Serif"),
            weight: face.weight().to_number(),
        };

        Some(Arc::new(Typeface {
            data: Arc::new(data),
            index,
            units_per_em,
            glyph_count,
            has_color,
            post_script_name,
            advances,
            glyph_to_unicode,
            metrics,
        }))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    /// True for bitmap/color-table fonts whose glyphs must be drawn as images.
    pub fn has_color(&self) -> bool {
        self.has_color
    }

    pub fn post_script_name(&self) -> &str {
        &self.post_script_name
    }

    pub fn metrics(&self) -> &TypefaceMetrics {
        &self.metrics
    }

    /// Horizontal advance in font units.
    pub fn advance(&self, glyph: GlyphId) -> u16 {
        self.advances.get(usize::from(glyph)).copied().unwrap_or(0)
    }

    /// The unicode code point a glyph maps back to, or 0 when unmapped.
    pub fn glyph_to_unicode(&self, glyph: GlyphId) -> u32 {
        self.glyph_to_unicode.get(usize::from(glyph)).copied().unwrap_or(0)
    }

    /// Tight glyph bounds in font units, when the face can supply them.
    pub fn glyph_bounds(&self, glyph: GlyphId) -> Option<Rect> {
        let face = ttf_parser::Face::parse(&self.data, self.index).ok()?;
        let bbox = face.glyph_bounding_box(ttf_parser::GlyphId(glyph))?;
        Some(Rect::new(
            f32::from(bbox.x_min),
            f32::from(bbox.y_min),
            f32::from(bbox.x_max),
            f32::from(bbox.y_max),
        ))
    }

    /// The glyph outline as a path in font units (y-up). Returns None for glyphs
    /// without outlines.
    pub fn glyph_path(&self, glyph: GlyphId) -> Option<crate::core::Path> {
        struct Builder {
            path: crate::core::Path,
        }
        impl ttf_parser::OutlineBuilder for Builder {
            fn move_to(&mut self, x: f32, y: f32) {
                self.path.move_to(x, y);
            }
            fn line_to(&mut self, x: f32, y: f32) {
                self.path.line_to(x, y);
            }
            fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
                self.path.quad_to(x1, y1, x, y);
            }
            fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
                self.path.cubic_to(x1, y1, x2, y2, x, y);
            }
            fn close(&mut self) {
                self.path.close();
            }
        }
        let face = ttf_parser::Face::parse(&self.data, self.index).ok()?;
        let mut builder = Builder { path: crate::core::Path::new() };
        face.outline_glyph(ttf_parser::GlyphId(glyph), &mut builder)?;
        Some(builder.path)
    }

    /// True when the glyph has an outline program (as opposed to bitmap-only).
    pub fn has_outline(&self, glyph: GlyphId) -> bool {
        struct Sink;
        impl ttf_parser::OutlineBuilder for Sink {
            fn move_to(&mut self, _: f32, _: f32) {}
            fn line_to(&mut self, _: f32, _: f32) {}
            fn quad_to(&mut self, _: f32, _: f32, _: f32, _: f32) {}
            fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) {}
            fn close(&mut self) {}
        }
        let Ok(face) = ttf_parser::Face::parse(&self.data, self.index) else {
            return false;
        };
        face.outline_glyph(ttf_parser::GlyphId(glyph), &mut Sink).is_some()
    }
}

/// A typeface at a specific text size.
#[derive(Clone)]
pub struct Font {
    pub typeface: Arc<Typeface>,
    pub size: f32,
}

impl Font {
    pub fn new(typeface: Arc<Typeface>, size: f32) -> Self {
        Font { typeface, size }
    }

    pub fn has_color(&self) -> bool {
        self.typeface.has_color()
    }

    /// Advance of a glyph scaled to the font size.
    pub fn advance(&self, glyph: GlyphId) -> f32 {
        let scale = self.size / f32::from(self.typeface.units_per_em());
        f32::from(self.typeface.advance(glyph)) * scale
    }
}

/// A run of positioned glyphs from a single font.
#[derive(Clone)]
pub struct GlyphRun {
    pub font: Font,
    pub glyphs: Vec<GlyphId>,
    pub positions: Vec<Point>,
}
