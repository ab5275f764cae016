use std::sync::Arc;

use crate::alloc::{AllocatorReference, BlockAllocator, PlacementArray, PlacementCell};
use crate::geom::{packed_vertex_color, Matrix};
use crate::gpu::provider::{VertexProvider, VertexWriter};
use crate::gpu::quad::AAType;
use crate::gpu::rrects::RRectRecord;

const ROOT2_OVER_2: f32 = 0.707_106_78;
const OCTO_OFFSET: f32 = 1.0 / (1.0 + ROOT2_OVER_2);

struct CoverageVertex {
    corner: [f32; 2],
    radius_outset: [f32; 2],
    aa_bloat_direction: [f32; 2],
    coverage: f32,
    is_linear_coverage: f32,
}

const fn vertex(
    corner: [f32; 2], radius_outset: [f32; 2], aa_bloat_direction: [f32; 2], coverage: f32,
    is_linear_coverage: f32,
) -> CoverageVertex {
    CoverageVertex { corner, radius_outset, aa_bloat_direction, coverage, is_linear_coverage }
}

/// The 40-vertex template in normalized [-1, +1] space: 8 edge-inset, 8 edge-outset,
/// and 6 per corner (2 arc, 2 linear, 2 octagon offsets).
#[rustfmt::skip]
static VERTEX_DATA: [CoverageVertex; 40] = [
    // Left inset edge.
    vertex([-1.0,  1.0], [0.0, -1.0], [ 1.0, 0.0], 1.0, 1.0),
    vertex([-1.0, -1.0], [0.0,  1.0], [ 1.0, 0.0], 1.0, 1.0),
    // Top inset edge.
    vertex([-1.0, -1.0], [ 1.0, 0.0], [0.0,  1.0], 1.0, 1.0),
    vertex([ 1.0, -1.0], [-1.0, 0.0], [0.0,  1.0], 1.0, 1.0),
    // Right inset edge.
    vertex([ 1.0, -1.0], [0.0,  1.0], [-1.0, 0.0], 1.0, 1.0),
    vertex([ 1.0,  1.0], [0.0, -1.0], [-1.0, 0.0], 1.0, 1.0),
    // Bottom inset edge.
    vertex([ 1.0,  1.0], [-1.0, 0.0], [0.0, -1.0], 1.0, 1.0),
    vertex([-1.0,  1.0], [ 1.0, 0.0], [0.0, -1.0], 1.0, 1.0),
    // Left outset edge.
    vertex([-1.0,  1.0], [0.0, -1.0], [-1.0, 0.0], 0.0, 1.0),
    vertex([-1.0, -1.0], [0.0,  1.0], [-1.0, 0.0], 0.0, 1.0),
    // Top outset edge.
    vertex([-1.0, -1.0], [ 1.0, 0.0], [0.0, -1.0], 0.0, 1.0),
    vertex([ 1.0, -1.0], [-1.0, 0.0], [0.0, -1.0], 0.0, 1.0),
    // Right outset edge.
    vertex([ 1.0, -1.0], [0.0,  1.0], [ 1.0, 0.0], 0.0, 1.0),
    vertex([ 1.0,  1.0], [0.0, -1.0], [ 1.0, 0.0], 0.0, 1.0),
    // Bottom outset edge.
    vertex([ 1.0,  1.0], [-1.0, 0.0], [0.0,  1.0], 0.0, 1.0),
    vertex([-1.0,  1.0], [ 1.0, 0.0], [0.0,  1.0], 0.0, 1.0),
    // Top-left corner.
    vertex([-1.0, -1.0], [0.0,  1.0], [-1.0, 0.0], 0.0, 0.0),
    vertex([-1.0, -1.0], [0.0,  1.0], [ 1.0, 0.0], 1.0, 0.0),
    vertex([-1.0, -1.0], [ 1.0, 0.0], [0.0,  1.0], 1.0, 0.0),
    vertex([-1.0, -1.0], [ 1.0, 0.0], [0.0, -1.0], 0.0, 0.0),
    vertex([-1.0, -1.0], [ OCTO_OFFSET, 0.0], [-1.0, -1.0], 0.0, 0.0),
    vertex([-1.0, -1.0], [0.0,  OCTO_OFFSET], [-1.0, -1.0], 0.0, 0.0),
    // Top-right corner.
    vertex([ 1.0, -1.0], [-1.0, 0.0], [0.0, -1.0], 0.0, 0.0),
    vertex([ 1.0, -1.0], [-1.0, 0.0], [0.0,  1.0], 1.0, 0.0),
    vertex([ 1.0, -1.0], [0.0,  1.0], [-1.0, 0.0], 1.0, 0.0),
    vertex([ 1.0, -1.0], [0.0,  1.0], [ 1.0, 0.0], 0.0, 0.0),
    vertex([ 1.0, -1.0], [0.0,  OCTO_OFFSET], [ 1.0, -1.0], 0.0, 0.0),
    vertex([ 1.0, -1.0], [-OCTO_OFFSET, 0.0], [ 1.0, -1.0], 0.0, 0.0),
    // Bottom-right corner.
    vertex([ 1.0,  1.0], [0.0, -1.0], [ 1.0, 0.0], 0.0, 0.0),
    vertex([ 1.0,  1.0], [0.0, -1.0], [-1.0, 0.0], 1.0, 0.0),
    vertex([ 1.0,  1.0], [-1.0, 0.0], [0.0, -1.0], 1.0, 0.0),
    vertex([ 1.0,  1.0], [-1.0, 0.0], [0.0,  1.0], 0.0, 0.0),
    vertex([ 1.0,  1.0], [-OCTO_OFFSET, 0.0], [ 1.0,  1.0], 0.0, 0.0),
    vertex([ 1.0,  1.0], [0.0, -OCTO_OFFSET], [ 1.0,  1.0], 0.0, 0.0),
    // Bottom-left corner.
    vertex([-1.0,  1.0], [ 1.0, 0.0], [0.0,  1.0], 0.0, 0.0),
    vertex([-1.0,  1.0], [ 1.0, 0.0], [0.0, -1.0], 1.0, 0.0),
    vertex([-1.0,  1.0], [0.0, -1.0], [ 1.0, 0.0], 1.0, 0.0),
    vertex([-1.0,  1.0], [0.0, -1.0], [-1.0, 0.0], 0.0, 0.0),
    vertex([-1.0,  1.0], [0.0, -OCTO_OFFSET], [-1.0,  1.0], 0.0, 0.0),
    vertex([-1.0,  1.0], [ OCTO_OFFSET, 0.0], [-1.0,  1.0], 0.0, 0.0),
];

/// Provides vertices for filled round rects using exact per-pixel coverage evaluated
/// in a normalized [-1, +1] coordinate system. Every rrect contributes the same 40
/// template vertices plus its local-to-device matrix and radii.
pub struct FillRRectsVertexProvider {
    rects: PlacementArray<RRectRecord>,
    aa_type: AAType,
    has_color: bool,
    _reference: Arc<AllocatorReference>,
}

impl FillRRectsVertexProvider {
    pub fn make_from(
        allocator: &BlockAllocator, rects: Vec<PlacementCell<RRectRecord>>, aa_type: AAType,
    ) -> Option<PlacementCell<VertexProvider>> {
        if rects.is_empty() {
            return None;
        }
        let mut has_color = false;
        if rects.len() > 1 {
            let first_color = rects[0].color;
            has_color = rects.iter().any(|record| record.color != first_color);
        }
        let provider = FillRRectsVertexProvider {
            rects: allocator.make_array_from(rects),
            aa_type,
            has_color,
            _reference: allocator.add_reference(),
        };
        let cell = allocator.make(VertexProvider::FillRRects(provider));
        (!cell.is_empty()).then_some(cell)
    }

    pub fn rect_count(&self) -> usize {
        self.rects.len()
    }

    pub fn aa_type(&self) -> AAType {
        self.aa_type
    }

    pub fn has_color(&self) -> bool {
        self.has_color
    }

    pub fn first_color(&self) -> crate::geom::Color {
        self.rects[0].color
    }

    pub fn vertex_count(&self) -> usize {
        // corner+radius outsets (4) + aa bloat/coverage/linearity (4) + skew matrix (4)
        // + translate (2) + radii (2), plus the optional packed color.
        let mut floats_per_vertex = 16;
        if self.has_color {
            floats_per_vertex += 1;
        }
        self.rects.len() * VERTEX_DATA.len() * floats_per_vertex
    }

    pub fn get_vertices(&self, out: &mut [f32]) {
        let mut writer = VertexWriter::new(out);
        for index in 0..self.rects.len() {
            let record = &*self.rects[index];
            let view_matrix = record.view_matrix;
            let rrect = record.rrect;
            let rect = rrect.rect;
            let color = self.has_color.then(|| packed_vertex_color(record.color));

            // Unmap the normalized [-1, +1] square back to the rect, then into device
            // space.
            let mut matrix = Matrix::make_scale(rect.width() / 2.0, rect.height() / 2.0);
            matrix.post_translate(rect.center_x(), rect.center_y());
            matrix.post_concat(&view_matrix);

            // Radii in normalized space. Clamp keeps the shader's inversesqrt sane.
            let x_radii = (rrect.radii.x * 2.0 / rect.width()).max(1e-6);
            let y_radii = (rrect.radii.y * 2.0 / rect.height()).max(1e-6);

            for template in &VERTEX_DATA {
                writer.push(template.corner[0]);
                writer.push(template.corner[1]);
                writer.push(template.radius_outset[0]);
                writer.push(template.radius_outset[1]);
                writer.push(template.aa_bloat_direction[0]);
                writer.push(template.aa_bloat_direction[1]);
                writer.push(template.coverage);
                writer.push(template.is_linear_coverage);
                writer.push(matrix.scale_x());
                writer.push(matrix.skew_x());
                writer.push(matrix.skew_y());
                writer.push(matrix.scale_y());
                writer.push(matrix.trans_x());
                writer.push(matrix.trans_y());
                writer.push(x_radii);
                writer.push(y_radii);
                if let Some(color) = color {
                    writer.push(color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{RRect, Rect};

    #[test]
    fn forty_vertices_sixteen_floats() {
        let allocator = BlockAllocator::new();
        let rrect = RRect::new(Rect::new(10.0, 10.0, 50.0, 30.0), 4.0, 4.0);
        let record = allocator.make(RRectRecord::new(rrect, Matrix::identity()));
        let cell =
            FillRRectsVertexProvider::make_from(&allocator, vec![record], AAType::Coverage)
                .unwrap();
        let provider = cell.get().unwrap();
        assert_eq!(provider.vertex_count(), 40 * 16);
        let mut vertices = vec![0.0f32; provider.vertex_count()];
        provider.get_vertices(&mut vertices);
        // Every vertex carries the same local-to-device matrix: scale (20, 10),
        // translate (30, 20).
        for vertex in vertices.chunks(16) {
            assert_eq!(vertex[8], 20.0);
            assert_eq!(vertex[11], 10.0);
            assert_eq!(vertex[12], 30.0);
            assert_eq!(vertex[13], 20.0);
            // Normalized radii: 4 * 2 / 40 and 4 * 2 / 20.
            assert!((vertex[14] - 0.2).abs() < 1e-6);
            assert!((vertex[15] - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_radius_is_clamped() {
        let allocator = BlockAllocator::new();
        let rrect = RRect::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.0, 0.0);
        let record = allocator.make(RRectRecord::new(rrect, Matrix::identity()));
        let cell =
            FillRRectsVertexProvider::make_from(&allocator, vec![record], AAType::Coverage)
                .unwrap();
        let provider = cell.get().unwrap();
        let mut vertices = vec![0.0f32; provider.vertex_count()];
        provider.get_vertices(&mut vertices);
        assert_eq!(vertices[14], 1e-6);
        assert_eq!(vertices[15], 1e-6);
    }
}
