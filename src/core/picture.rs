use std::sync::Arc;

use crate::core::{DrawContext, Fill, GlyphRun, Image, LayerFilter, MCState, Path};
use crate::geom::{Matrix, RRect, Rect, Stroke};

/// One recorded draw call. Records store the full argument set so playback can target
/// any [`DrawContext`].
pub enum PictureRecord {
    Fill {
        fill: Fill,
    },
    Rect {
        rect: Rect,
        state: MCState,
        fill: Fill,
        stroke: Option<Stroke>,
    },
    RRect {
        rrect: RRect,
        state: MCState,
        fill: Fill,
        stroke: Option<Stroke>,
    },
    Path {
        path: Path,
        state: MCState,
        fill: Fill,
    },
    ImageRect {
        image: Arc<dyn Image>,
        src: Rect,
        dst: Rect,
        state: MCState,
        fill: Fill,
    },
    GlyphRun {
        run: GlyphRun,
        state: MCState,
        fill: Fill,
        stroke: Option<Stroke>,
    },
    Picture {
        picture: Arc<Picture>,
        state: MCState,
    },
}

impl PictureRecord {
    /// Plays this single record back into a draw context.
    pub fn playback(&self, context: &mut dyn DrawContext) {
        match self {
            PictureRecord::Fill { fill } => context.draw_fill(fill),
            PictureRecord::Rect { rect, state, fill, stroke } => {
                context.draw_rect(rect, state, fill, stroke.as_ref());
            }
            PictureRecord::RRect { rrect, state, fill, stroke } => {
                context.draw_rrect(rrect, state, fill, stroke.as_ref());
            }
            PictureRecord::Path { path, state, fill } => context.draw_path(path, state, fill),
            PictureRecord::ImageRect { image, src, dst, state, fill } => {
                context.draw_image_rect(Arc::clone(image), src, dst, state, fill);
            }
            PictureRecord::GlyphRun { run, state, fill, stroke } => {
                context.draw_glyph_run(run, state, fill, stroke.as_ref());
            }
            PictureRecord::Picture { picture, state } => context.draw_picture(picture, state),
        }
    }

    fn bounds(&self) -> Rect {
        fn mapped(rect: &Rect, state: &MCState) -> Rect {
            state.matrix.map_rect(rect)
        }
        match self {
            PictureRecord::Fill { .. } => Rect::empty(),
            PictureRecord::Rect { rect, state, .. } => mapped(rect, state),
            PictureRecord::RRect { rrect, state, .. } => mapped(&rrect.rect, state),
            PictureRecord::Path { path, state, .. } => mapped(&path.bounds(), state),
            PictureRecord::ImageRect { dst, state, .. } => mapped(dst, state),
            PictureRecord::GlyphRun { run, state, fill: _, .. } => {
                let mut bounds = Rect::empty();
                let size = run.font.size;
                for position in &run.positions {
                    bounds.join(&Rect::from_xywh(position.x, position.y - size, size, size));
                }
                mapped(&bounds, state)
            }
            PictureRecord::Picture { picture, state } => mapped(&picture.bounds(), state),
        }
    }
}

/// A recorded list of draw commands.
#[derive(Default)]
pub struct Picture {
    records: Vec<PictureRecord>,
}

impl Picture {
    pub fn records(&self) -> &[PictureRecord] {
        &self.records
    }

    pub fn playback(&self, context: &mut dyn DrawContext) {
        for record in &self.records {
            record.playback(context);
        }
    }

    /// Device-space bounds of everything recorded.
    pub fn bounds(&self) -> Rect {
        let mut bounds = Rect::empty();
        for record in &self.records {
            bounds.join(&record.bounds());
        }
        bounds
    }
}

/// A [`DrawContext`] that records instead of drawing.
#[derive(Default)]
pub struct PictureRecorder {
    records: Vec<PictureRecord>,
}

impl PictureRecorder {
    pub fn new() -> Self {
        PictureRecorder::default()
    }

    pub fn finish(self) -> Arc<Picture> {
        Arc::new(Picture { records: self.records })
    }
}

impl DrawContext for PictureRecorder {
    fn draw_fill(&mut self, fill: &Fill) {
        self.records.push(PictureRecord::Fill { fill: fill.clone() });
    }

    fn draw_rect(&mut self, rect: &Rect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>) {
        self.records.push(PictureRecord::Rect {
            rect: *rect,
            state: state.clone(),
            fill: fill.clone(),
            stroke: stroke.copied(),
        });
    }

    fn draw_rrect(
        &mut self, rrect: &RRect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        self.records.push(PictureRecord::RRect {
            rrect: *rrect,
            state: state.clone(),
            fill: fill.clone(),
            stroke: stroke.copied(),
        });
    }

    fn draw_path(&mut self, path: &Path, state: &MCState, fill: &Fill) {
        self.records.push(PictureRecord::Path {
            path: path.clone(),
            state: state.clone(),
            fill: fill.clone(),
        });
    }

    fn draw_image_rect(
        &mut self, image: Arc<dyn Image>, src: &Rect, dst: &Rect, state: &MCState, fill: &Fill,
    ) {
        self.records.push(PictureRecord::ImageRect {
            image,
            src: *src,
            dst: *dst,
            state: state.clone(),
            fill: fill.clone(),
        });
    }

    fn draw_glyph_run(
        &mut self, run: &GlyphRun, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        self.records.push(PictureRecord::GlyphRun {
            run: run.clone(),
            state: state.clone(),
            fill: fill.clone(),
            stroke: stroke.copied(),
        });
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, state: &MCState) {
        self.records.push(PictureRecord::Picture {
            picture: Arc::clone(picture),
            state: state.clone(),
        });
    }

    fn draw_layer(
        &mut self, picture: &Arc<Picture>, _filter: Option<&LayerFilter>, state: &MCState,
        _fill: &Fill,
    ) {
        // Layer filters cannot be re-recorded losslessly; keep the content.
        self.records.push(PictureRecord::Picture {
            picture: Arc::clone(picture),
            state: state.clone(),
        });
    }
}
