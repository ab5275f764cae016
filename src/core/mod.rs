//! The drawing-surface contract: paths, paints, images, pictures and glyph runs, plus
//! the [`DrawContext`] trait every render target implements.

mod glyph;
mod image;
mod paint;
mod path;
mod picture;

pub use glyph::{Font, GlyphId, GlyphRun, Typeface, TypefaceMetrics};
pub use image::{ColorType, Image, Pixmap, RasterImage};
pub use paint::{
    BlendMode, ColorFilter, Fill, GradientInfo, GradientType, LayerFilter, MaskFilter, Shader,
    TileMode,
};
pub use path::{Path, PathFillType, PathVerb};
pub use picture::{Picture, PictureRecord, PictureRecorder};

use std::sync::Arc;

use crate::geom::{Matrix, RRect, Rect, Stroke};

/// Matrix-and-clip state captured at a draw site. An empty clip path means unclipped.
#[derive(Clone, Default)]
pub struct MCState {
    pub matrix: Matrix,
    pub clip: Path,
}

impl MCState {
    pub fn new() -> Self {
        MCState::default()
    }

    pub fn with_matrix(matrix: Matrix) -> Self {
        MCState { matrix, clip: Path::new() }
    }
}

/// The sink for draw commands. The PDF export context implements this; so does the
/// picture recorder.
pub trait DrawContext {
    /// Fills the whole target.
    fn draw_fill(&mut self, fill: &Fill);

    fn draw_rect(&mut self, rect: &Rect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>);

    fn draw_rrect(&mut self, rrect: &RRect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>);

    fn draw_path(&mut self, path: &Path, state: &MCState, fill: &Fill);

    /// Draws `src` of the image mapped onto `dst`.
    fn draw_image_rect(
        &mut self, image: Arc<dyn Image>, src: &Rect, dst: &Rect, state: &MCState, fill: &Fill,
    );

    fn draw_glyph_run(
        &mut self, run: &GlyphRun, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    );

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &MCState);

    /// Draws recorded content through an optional layer filter.
    fn draw_layer(
        &mut self, picture: &Arc<Picture>, filter: Option<&LayerFilter>, state: &MCState,
        fill: &Fill,
    );
}

/// Renders pictures to pixels for the draws PDF cannot express vectorially (layer
/// filters, filtered images). Supplied by the embedder; the exporter has no raster
/// backend of its own.
pub trait Rasterizer: Send + Sync {
    /// Rasterizes `picture` into a pixmap covering `bounds`, scaled by `scale`.
    fn rasterize(&self, picture: &Picture, bounds: &Rect, scale: f32) -> Option<Pixmap>;
}
