use crate::geom::Rect;
use crate::gpu::fill_rrects::FillRRectsVertexProvider;
use crate::gpu::quads::QuadsVertexProvider;
use crate::gpu::rects::RectsVertexProvider;
use crate::gpu::rrects::RRectsVertexProvider;

/// Sequential f32 writer over a pre-sized output slice. The slice length must equal
/// the provider's `vertex_count()`; writers panic on overflow in debug builds the same
/// way a stray index would.
pub struct VertexWriter<'a> {
    out: &'a mut [f32],
    index: usize,
}

impl<'a> VertexWriter<'a> {
    pub fn new(out: &'a mut [f32]) -> Self {
        VertexWriter { out, index: 0 }
    }

    #[inline]
    pub fn push(&mut self, value: f32) {
        self.out[self.index] = value;
        self.index += 1;
    }

    /// Writes the four subset floats: left, top, right, bottom.
    pub fn push_subset(&mut self, subset: &Rect) {
        self.push(subset.left);
        self.push(subset.top);
        self.push(subset.right);
        self.push(subset.bottom);
    }

    pub fn written(&self) -> usize {
        self.index
    }
}

/// The closed set of vertex producers. Each variant writes a fixed per-vertex float
/// layout that the matching shader samples by offset; see the variant modules for the
/// exact layouts.
pub enum VertexProvider {
    Rects(RectsVertexProvider),
    RRects(RRectsVertexProvider),
    FillRRects(FillRRectsVertexProvider),
    Quads(QuadsVertexProvider),
}

impl VertexProvider {
    /// Number of f32 values `get_vertices` will write.
    pub fn vertex_count(&self) -> usize {
        match self {
            VertexProvider::Rects(provider) => provider.vertex_count(),
            VertexProvider::RRects(provider) => provider.vertex_count(),
            VertexProvider::FillRRects(provider) => provider.vertex_count(),
            VertexProvider::Quads(provider) => provider.vertex_count(),
        }
    }

    /// Writes the packed vertex data into `out`, which must hold exactly
    /// `vertex_count()` floats.
    pub fn get_vertices(&self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.vertex_count());
        match self {
            VertexProvider::Rects(provider) => provider.get_vertices(out),
            VertexProvider::RRects(provider) => provider.get_vertices(out),
            VertexProvider::FillRRects(provider) => provider.get_vertices(out),
            VertexProvider::Quads(provider) => provider.get_vertices(out),
        }
    }

    pub fn as_rects(&self) -> Option<&RectsVertexProvider> {
        match self {
            VertexProvider::Rects(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn as_quads(&self) -> Option<&QuadsVertexProvider> {
        match self {
            VertexProvider::Quads(provider) => Some(provider),
            _ => None,
        }
    }
}
