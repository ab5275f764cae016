use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::alloc::BlockAllocator;
use crate::core::Image;
use crate::geom::{Color, ISize, Matrix, Matrix3D, Point, Rect, Vec2};
use crate::gpu::{AAType, Quad, QuadAAFlags, QuadRecord, Quads3DDrawOp, QuadsVertexProvider};
use crate::scene3d::bsp::BspTree;
use crate::scene3d::polygon::DrawPolygon3D;

const AA_EPSILON: f32 = 0.01;

const RECT_EDGE_TOP: u8 = 0b0001;
const RECT_EDGE_RIGHT: u8 = 0b0010;
const RECT_EDGE_BOTTOM: u8 = 0b0100;
const RECT_EDGE_LEFT: u8 = 0b1000;

fn aa_type_for(sample_count: i32, anti_alias: bool) -> AAType {
    if sample_count > 1 {
        AAType::Msaa
    } else if anti_alias {
        AAType::Coverage
    } else {
        AAType::None
    }
}

/// Which edges of the original rect this point lies on.
fn point_on_rect_edges(point: Point, rect: &Rect) -> u8 {
    let mut edges = 0u8;
    if (point.x - rect.left).abs() < AA_EPSILON {
        edges |= RECT_EDGE_LEFT;
    }
    if (point.x - rect.right).abs() < AA_EPSILON {
        edges |= RECT_EDGE_RIGHT;
    }
    if (point.y - rect.top).abs() < AA_EPSILON {
        edges |= RECT_EDGE_TOP;
    }
    if (point.y - rect.bottom).abs() < AA_EPSILON {
        edges |= RECT_EDGE_BOTTOM;
    }
    edges
}

/// An edge is exterior when both endpoints sit on the same original-rect edge. Edges
/// introduced by BSP splits never qualify and receive no AA.
fn is_exterior_edge(corner_a: u8, corner_b: u8) -> bool {
    corner_a & corner_b != 0
}

/// Per-edge AA flags for a sub-quad, tested against the image's original rect in
/// local space.
fn quad_aa_flags(quad: &Quad, rect: &Rect) -> QuadAAFlags {
    let on_edges = [
        point_on_rect_edges(quad.point(0), rect),
        point_on_rect_edges(quad.point(1), rect),
        point_on_rect_edges(quad.point(2), rect),
        point_on_rect_edges(quad.point(3), rect),
    ];
    let mut flags = QuadAAFlags::NONE;
    // Edge[i] starts at Z-order vertex i: 0 -> 1, 1 -> 3, 2 -> 0, 3 -> 2.
    if is_exterior_edge(on_edges[0], on_edges[1]) {
        flags |= QuadAAFlags::EDGE_0;
    }
    if is_exterior_edge(on_edges[1], on_edges[3]) {
        flags |= QuadAAFlags::EDGE_1;
    }
    if is_exterior_edge(on_edges[2], on_edges[0]) {
        flags |= QuadAAFlags::EDGE_2;
    }
    if is_exterior_edge(on_edges[3], on_edges[2]) {
        flags |= QuadAAFlags::EDGE_3;
    }
    flags
}

/// Accumulates 3D-transformed images, depth-sorts them with a BSP tree, and emits
/// quad draw ops in correct back-to-front order.
pub struct Context3DCompositor {
    width: i32,
    height: i32,
    sample_count: i32,
    allocator: BlockAllocator,
    polygons: VecDeque<Box<DrawPolygon3D>>,
    draw_ops: Vec<Quads3DDrawOp>,
    depth_sequence_counters: HashMap<i32, i32>,
    finished: bool,
}

impl Context3DCompositor {
    pub fn new(width: i32, height: i32, sample_count: i32) -> Context3DCompositor {
        debug_assert!(width > 0 && height > 0);
        Context3DCompositor {
            width,
            height,
            sample_count,
            allocator: BlockAllocator::new(),
            polygons: VecDeque::new(),
            draw_ops: Vec::new(),
            depth_sequence_counters: HashMap::new(),
            finished: false,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Adds an image under a 3D transform. `depth` is the layer-tree depth; insertion
    /// order within a depth is tracked here and preserved for coplanar polygons.
    pub fn add_image(
        &mut self, image: Arc<dyn Image>, matrix: Matrix3D, depth: i32, alpha: f32,
        anti_alias: bool,
    ) {
        debug_assert!(!self.finished, "add_image after finish");
        let counter = self.depth_sequence_counters.entry(depth).or_insert(0);
        let sequence_index = *counter;
        *counter += 1;
        let polygon = Box::new(DrawPolygon3D::new(
            image,
            matrix,
            depth,
            sequence_index,
            alpha,
            anti_alias,
        ));
        self.polygons.push_back(polygon);
    }

    /// Sorts everything added so far and returns the draw ops in paint order. The
    /// compositor's allocator backs the ops' vertex providers, and every op holds an
    /// allocator reference: drop the ops before the compositor, or its drop will
    /// block waiting for them.
    pub fn finish(&mut self) -> Vec<Quads3DDrawOp> {
        debug_assert!(!self.finished, "finish called twice");
        self.finished = true;
        if !self.polygons.is_empty() {
            let polygons = std::mem::take(&mut self.polygons);
            let tree = BspTree::new(polygons);
            let mut ops = Vec::new();
            tree.traverse_back_to_front(|polygon| {
                if let Some(op) = Self::make_polygon_op(
                    &self.allocator,
                    self.width,
                    self.height,
                    self.sample_count,
                    polygon,
                ) {
                    ops.push(op);
                }
            });
            self.draw_ops = ops;
        }
        std::mem::take(&mut self.draw_ops)
    }

    fn make_polygon_op(
        allocator: &BlockAllocator, width: i32, height: i32, sample_count: i32,
        polygon: &DrawPolygon3D,
    ) -> Option<Quads3DDrawOp> {
        let aa_type = aa_type_for(sample_count, polygon.anti_alias());
        let image = polygon.image();
        let src_w = image.width() as f32;
        let src_h = image.height() as f32;
        let original_rect = Rect::from_wh(src_w, src_h);
        // Alpha rides along as a vertex color so semi-transparent layers blend.
        let vertex_color = Color::new(1.0, 1.0, 1.0, polygon.alpha());

        let mut quad_records = Vec::new();
        if !polygon.is_split() {
            let quad = Quad::from_rect(&original_rect, None);
            let aa_flags = if aa_type == AAType::Coverage {
                QuadAAFlags::ALL
            } else {
                QuadAAFlags::NONE
            };
            quad_records.push(allocator.make(QuadRecord::new(
                quad,
                aa_flags,
                vertex_color,
                Matrix::identity(),
            )));
        } else {
            for quad in polygon.to_quads() {
                let aa_flags = if aa_type == AAType::Coverage {
                    quad_aa_flags(&quad, &original_rect)
                } else {
                    QuadAAFlags::NONE
                };
                quad_records.push(allocator.make(QuadRecord::new(
                    quad,
                    aa_flags,
                    vertex_color,
                    Matrix::identity(),
                )));
            }
        }

        // Flatten the z row so projected vertices keep their depth without being
        // culled by the clip-space z test.
        let mut matrix = *polygon.matrix();
        matrix.set_row(2, [0.0, 0.0, 1.0, 0.0]);
        let width_f = width as f32;
        let height_f = height as f32;
        let args = crate::gpu::Draw3DArgs {
            transform: matrix,
            ndc_scale: Vec2::new(2.0 / width_f, 2.0 / height_f),
            ndc_offset: Vec2::new(-1.0, -1.0),
            viewport: ISize::new(width, height),
        };
        let provider = QuadsVertexProvider::make_from(allocator, quad_records, aa_type)?;
        Quads3DDrawOp::make(allocator, provider, Arc::clone(image), args)
    }
}

impl Drop for Context3DCompositor {
    fn drop(&mut self) {
        // Draw ops not taken by finish() still hold provider cells in our region.
        self.draw_ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene3d::polygon::tests::test_image;

    #[test]
    fn paint_order_is_back_to_front() {
        let mut compositor = Context3DCompositor::new(100, 100, 1);
        compositor.add_image(
            test_image(10, 10),
            Matrix3D::make_translate(0.0, 0.0, 2.0),
            0,
            1.0,
            true,
        );
        compositor.add_image(
            test_image(10, 10),
            Matrix3D::make_translate(0.0, 0.0, 1.0),
            0,
            0.5,
            true,
        );
        let mut ops = compositor.finish();
        assert_eq!(ops.len(), 2);
        // The far image (z = 1) paints first; the nearer one kept its 0.5 alpha as a
        // vertex color.
        assert_eq!(ops[0].common_color().unwrap().alpha, 0.5);
        assert_eq!(ops[1].common_color().unwrap().alpha, 1.0);
        for op in &mut ops {
            assert_eq!(op.quad_count(), 1);
            let floats = op.vertex_data();
            assert!(!floats.is_empty());
        }
        // Z row flattened for the shader.
        assert_eq!(ops[0].args().transform.row(2), [0.0, 0.0, 1.0, 0.0]);
        drop(ops);
    }

    #[test]
    fn split_polygons_lose_aa_on_cut_edges() {
        let mut compositor = Context3DCompositor::new(100, 100, 1);
        // A vertical polygon crossing a flat one forces a split.
        let crossing = Matrix3D::concat(
            &Matrix3D::make_translate(0.0, 5.0, -5.0),
            &Matrix3D::make_rotate_x(90.0),
        );
        compositor.add_image(test_image(10, 10), crossing, 0, 1.0, true);
        compositor.add_image(
            test_image(10, 10),
            Matrix3D::make_translate(0.0, 0.0, 0.0),
            0,
            1.0,
            true,
        );
        let ops = compositor.finish();
        assert_eq!(ops.len(), 3);
        drop(ops);
    }

    #[test]
    fn aa_flags_skip_split_edges() {
        let rect = Rect::from_wh(10.0, 10.0);
        // Left half of the rect: the right edge at x = 5 came from a split.
        let quad = Quad::from_cw(
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
        );
        let flags = quad_aa_flags(&quad, &rect);
        // Z-order: 0=LT(0,0), 1=LB(0,10), 2=RT(5,0), 3=RB(5,10).
        // Edge 0 (left) and edges 1/2 (bottom/top) touch the original boundary; edge 3
        // (the x = 5 cut) does not.
        assert!(flags.contains(QuadAAFlags::EDGE_0));
        assert!(flags.contains(QuadAAFlags::EDGE_1));
        assert!(flags.contains(QuadAAFlags::EDGE_2));
        assert!(!flags.contains(QuadAAFlags::EDGE_3));
    }
}
