//! Draw ops produced by the 3D compositor: a captured vertex provider, the index data
//! the renderer consumes alongside it, and the projection arguments for the shader.

use std::sync::Arc;

use crate::alloc::{BlockAllocator, PlacementCell};
use crate::core::Image;
use crate::geom::{Color, ISize, Matrix, Matrix3D, Vec2};
use crate::gpu::provider::VertexProvider;
use crate::gpu::quad::AAType;
use crate::gpu::vertex_task::AsyncVertexSource;

/// Projection arguments for a 3D quad batch.
///
/// After the transform maps vertices to clip space, `ndc_scale` then `ndc_offset` are
/// applied so any rectangular region of the projected model can land anywhere in the
/// target. `viewport` is the reference size those factors were derived from.
#[derive(Clone, Copy)]
pub struct Draw3DArgs {
    pub transform: Matrix3D,
    pub ndc_scale: Vec2,
    pub ndc_offset: Vec2,
    pub viewport: ISize,
}

/// Draws a batch of 3D-transformed quads with per-edge antialiasing.
pub struct Quads3DDrawOp {
    image: Arc<dyn Image>,
    args: Draw3DArgs,
    aa_type: AAType,
    quad_count: usize,
    common_color: Option<Color>,
    uv_matrix: Option<Matrix>,
    indices: Vec<u16>,
    vertex_source: AsyncVertexSource,
}

impl Quads3DDrawOp {
    /// Captures a quads provider into a draw op and enqueues its vertex generation on
    /// the worker pool.
    pub fn make(
        allocator: &BlockAllocator, provider: PlacementCell<VertexProvider>,
        image: Arc<dyn Image>, args: Draw3DArgs,
    ) -> Option<Quads3DDrawOp> {
        let (aa_type, quad_count, common_color, uv_matrix) = {
            let quads = provider.get()?.as_quads()?;
            (
                quads.aa_type(),
                quads.quad_count(),
                (!quads.has_color()).then(|| quads.first_color()),
                (!quads.has_uv()).then(|| quads.first_matrix()),
            )
        };
        let indices = build_quad_indices(quad_count, aa_type);
        let vertex_source = AsyncVertexSource::spawn(allocator, vec![provider]);
        Some(Quads3DDrawOp {
            image,
            args,
            aa_type,
            quad_count,
            common_color,
            uv_matrix,
            indices,
            vertex_source,
        })
    }

    pub fn image(&self) -> &Arc<dyn Image> {
        &self.image
    }

    pub fn args(&self) -> &Draw3DArgs {
        &self.args
    }

    pub fn aa_type(&self) -> AAType {
        self.aa_type
    }

    pub fn quad_count(&self) -> usize {
        self.quad_count
    }

    /// The uniform color when every record shares one.
    pub fn common_color(&self) -> Option<Color> {
        self.common_color
    }

    /// The uniform UV transform when every record shares one.
    pub fn uv_matrix(&self) -> Option<Matrix> {
        self.uv_matrix
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Joins the vertex tasks and returns the packed vertex floats.
    pub fn vertex_data(&mut self) -> &[f32] {
        self.vertex_source.data()
    }

    /// Drops the queued provider; the op becomes a no-op.
    pub fn cancel(&mut self) {
        self.vertex_source.cancel();
    }
}

/// Builds the 16-bit index list for a quad batch. Non-AA quads are two triangles over
/// the Z-order strip; AA quads triangulate the coverage ring (4 ring quads) plus the
/// interior, 30 indices per quad.
fn build_quad_indices(quad_count: usize, aa_type: AAType) -> Vec<u16> {
    // Z-order corners walked clockwise: LT, RT, RB, LB.
    const CW: [u16; 4] = [0, 2, 3, 1];
    let mut indices = Vec::new();
    if aa_type == AAType::Coverage {
        indices.reserve(quad_count * 30);
        for quad in 0..quad_count {
            let inset = (quad * 8) as u16;
            let outset = inset + 4;
            for corner in 0..4 {
                let o0 = outset + CW[corner];
                let o1 = outset + CW[(corner + 1) % 4];
                let i0 = inset + CW[corner];
                let i1 = inset + CW[(corner + 1) % 4];
                indices.extend_from_slice(&[o0, o1, i1, o0, i1, i0]);
            }
            indices.extend_from_slice(&[
                inset + CW[0],
                inset + CW[1],
                inset + CW[2],
                inset + CW[0],
                inset + CW[2],
                inset + CW[3],
            ]);
        }
    } else {
        indices.reserve(quad_count * 6);
        for quad in 0..quad_count {
            let base = (quad * 4) as u16;
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_budget_per_quad() {
        assert_eq!(build_quad_indices(2, AAType::None).len(), 12);
        assert_eq!(build_quad_indices(2, AAType::Coverage).len(), 60);
        // AA indices address all 8 vertices of each quad.
        let indices = build_quad_indices(1, AAType::Coverage);
        let mut seen: Vec<u16> = indices.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..8).collect::<Vec<u16>>());
    }
}
