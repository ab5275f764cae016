use std::sync::Arc;

use crate::alloc::{AllocatorReference, BlockAllocator, PlacementArray, PlacementCell};
use crate::geom::math::{FLOAT_NEARLY_ZERO, FLOAT_SQRT2};
use crate::geom::{Color, Matrix, Point, RRect, Stroke};
use crate::gpu::provider::{VertexProvider, VertexWriter};
use crate::gpu::quad::AAType;

/// Geometry record for one rounded-rect draw.
pub struct RRectRecord {
    pub rrect: RRect,
    pub view_matrix: Matrix,
    pub color: Color,
}

impl RRectRecord {
    pub fn new(rrect: RRect, view_matrix: Matrix) -> Self {
        RRectRecord { rrect, view_matrix, color: Color::WHITE }
    }

    pub fn with_color(rrect: RRect, view_matrix: Matrix, color: Color) -> Self {
        RRectRecord { rrect, view_matrix, color }
    }
}

fn float_invert(value: f32) -> f32 {
    if value == 0.0 {
        1e6
    } else {
        1.0 / value
    }
}

/// Provides vertices for drawing round rects as a 9-patch mesh: 16 vertices per rrect,
/// each carrying position, ellipse offsets, and four reciprocal radii.
pub struct RRectsVertexProvider {
    rects: PlacementArray<RRectRecord>,
    strokes: PlacementArray<Stroke>,
    aa_type: AAType,
    has_color: bool,
    _reference: Arc<AllocatorReference>,
}

impl RRectsVertexProvider {
    /// Creates a provider from rrect records and optional matching strokes.
    pub fn make_from(
        allocator: &BlockAllocator, rects: Vec<PlacementCell<RRectRecord>>, aa_type: AAType,
        strokes: Vec<PlacementCell<Stroke>>,
    ) -> Option<PlacementCell<VertexProvider>> {
        if rects.is_empty() {
            return None;
        }
        let mut has_color = false;
        if rects.len() > 1 {
            let first_color = rects[0].color;
            has_color = rects.iter().any(|record| record.color != first_color);
        }
        let provider = RRectsVertexProvider {
            rects: allocator.make_array_from(rects),
            strokes: allocator.make_array_from(strokes),
            aa_type,
            has_color,
            _reference: allocator.add_reference(),
        };
        let cell = allocator.make(VertexProvider::RRects(provider));
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

    pub fn has_stroke(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn first_color(&self) -> Color {
        self.rects[0].color
    }

    pub fn vertex_count(&self) -> usize {
        // 16 vertices x 8 floats, plus one color float per vertex when present.
        let mut count = self.rects.len() * 4 * 32;
        if self.has_color {
            count += self.rects.len() * 4 * 4;
        }
        count
    }

    pub fn get_vertices(&self, out: &mut [f32]) {
        let mut writer = VertexWriter::new(out);
        for index in 0..self.rects.len() {
            let record = &*self.rects[index];
            let mut view_matrix = record.view_matrix;
            let mut rrect = record.rrect;
            let color = record.color;
            let scales = view_matrix.axis_scales();
            rrect.scale(scales.x, scales.y);
            view_matrix.pre_scale(1.0 / scales.x, 1.0 / scales.y);

            let stroke = self.strokes.get(index).and_then(|cell| cell.get());
            let mut stroked = false;
            let mut x_radius = rrect.radii.x;
            let mut y_radius = rrect.radii.y;
            let mut inner_x_radius = 0.0f32;
            let mut inner_y_radius = 0.0f32;
            let mut rect_bounds = rrect.rect;
            if let Some(stroke) = stroke {
                if stroke.width > 0.0 {
                    let half_stroke_width = stroke.width / 2.0;
                    inner_x_radius = rrect.radii.x - half_stroke_width;
                    inner_y_radius = rrect.radii.y - half_stroke_width;
                    stroked = inner_x_radius > 0.0 && inner_y_radius > 0.0;
                    x_radius += half_stroke_width;
                    y_radius += half_stroke_width;
                    rect_bounds.outset(half_stroke_width, half_stroke_width);
                }
            }
            let mut reciprocal_radii = [
                float_invert(x_radius),
                float_invert(y_radius),
                float_invert(inner_x_radius),
                float_invert(inner_y_radius),
            ];
            // A stroke exactly double the radius zeroes the inner radii; pin the
            // reciprocals so the shader sees no infinities.
            reciprocal_radii[2] = reciprocal_radii[2].min(1e6);
            reciprocal_radii[3] = reciprocal_radii[3].min(1e6);

            // MSAA needs enough bloat that every touched pixel has full sample
            // coverage.
            let aa_bloat = if self.aa_type == AAType::Msaa { FLOAT_SQRT2 } else { 0.5 };
            let x_outer_radius = x_radius + aa_bloat;
            let y_outer_radius = y_radius + aa_bloat;
            let mut x_max_offset = x_outer_radius;
            let mut y_max_offset = y_outer_radius;
            if !stroked {
                // Filled rrects map a unit circle in the vertex attributes, so the
                // offsets normalize to 1.
                x_max_offset /= x_radius;
                y_max_offset /= y_radius;
            }
            let bounds = rrect.rect.make_outset(aa_bloat, aa_bloat);
            let y_coords = [
                bounds.top,
                bounds.top + y_outer_radius,
                bounds.bottom - y_outer_radius,
                bounds.bottom,
            ];
            // The shader uses inversesqrt(), so the inner offsets cannot be zero.
            let y_outer_offsets =
                [y_max_offset, FLOAT_NEARLY_ZERO, FLOAT_NEARLY_ZERO, y_max_offset];
            let x_coords = [
                bounds.left,
                bounds.left + x_outer_radius,
                bounds.right - x_outer_radius,
                bounds.right,
            ];
            let x_offsets = [x_max_offset, FLOAT_NEARLY_ZERO, FLOAT_NEARLY_ZERO, x_max_offset];

            for row in 0..4 {
                for column in 0..4 {
                    let point =
                        view_matrix.map_point(Point::new(x_coords[column], y_coords[row]));
                    writer.push(point.x);
                    writer.push(point.y);
                    if self.has_color {
                        writer.push(crate::geom::packed_vertex_color(color));
                    }
                    writer.push(x_offsets[column]);
                    writer.push(y_outer_offsets[row]);
                    writer.push(reciprocal_radii[0]);
                    writer.push(reciprocal_radii[1]);
                    writer.push(reciprocal_radii[2]);
                    writer.push(reciprocal_radii[3]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;

    #[test]
    fn sixteen_vertices_with_pinned_radii() {
        let allocator = BlockAllocator::new();
        let rrect = RRect::new(Rect::new(0.0, 0.0, 40.0, 20.0), 5.0, 5.0);
        let record = allocator.make(RRectRecord::new(rrect, Matrix::identity()));
        let cell =
            RRectsVertexProvider::make_from(&allocator, vec![record], AAType::Coverage, vec![])
                .unwrap();
        let provider = cell.get().unwrap();
        assert_eq!(provider.vertex_count(), 128);
        let mut vertices = vec![0.0f32; 128];
        provider.get_vertices(&mut vertices);
        // 8 floats per vertex: positions in the first 2, reciprocal radii in the last 4.
        for vertex in vertices.chunks(8) {
            assert!(vertex[4] > 0.0 && vertex[4].is_finite());
            // Inner radii are zero for fills: reciprocals pinned to 1e6.
            assert_eq!(vertex[6], 1e6);
            assert_eq!(vertex[7], 1e6);
        }
    }

    #[test]
    fn stroked_rrect_uses_inner_radii() {
        let allocator = BlockAllocator::new();
        let rrect = RRect::new(Rect::new(0.0, 0.0, 40.0, 40.0), 8.0, 8.0);
        let record = allocator.make(RRectRecord::new(rrect, Matrix::identity()));
        let stroke = allocator.make(Stroke::new(4.0));
        let cell = RRectsVertexProvider::make_from(
            &allocator,
            vec![record],
            AAType::Coverage,
            vec![stroke],
        )
        .unwrap();
        let provider = cell.get().unwrap();
        let mut vertices = vec![0.0f32; provider.vertex_count()];
        provider.get_vertices(&mut vertices);
        // Outer radius 10, inner radius 6.
        let vertex = &vertices[0..8];
        assert!((vertex[4] - 0.1).abs() < 1e-6);
        assert!((vertex[6] - 1.0 / 6.0).abs() < 1e-6);
    }
}
