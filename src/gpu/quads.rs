//! Vertex generation for batches of quads with per-edge antialiasing.
//!
//! The AA math runs on 4-lane SoA vectors: one lane per vertex/edge. Inset and outset
//! rings are normally produced by miter displacement along the adjacent edges; quads
//! with near-parallel or zero-length edges fall back to intersecting offset edge
//! equations, with explicit handling for triangle and collinear degeneration.

use std::sync::Arc;

use crate::alloc::{AllocatorReference, BlockAllocator, PlacementArray, PlacementCell};
use crate::geom::{packed_vertex_color, Color, Mask4, Matrix, Point, Rect, Vec4};
use crate::gpu::provider::{VertexProvider, VertexWriter};
use crate::gpu::quad::{AAType, Quad, QuadAAFlags, QuadRecord};

const DIST_TOLERANCE: f32 = 1e-2;
const INV_DIST_TOLERANCE: f32 = 1.0 / DIST_TOLERANCE;

const DENOM_TOLERANCE: f32 = 1e-9;

const AA_OFFSET: f32 = 0.5;

const COS_THETA_THRESHOLD: f32 = 0.9;

/// 4 vertex coordinates in SoA layout, Z-order lanes.
#[derive(Clone, Copy, Default)]
struct Vertices4 {
    xs: Vec4,
    ys: Vec4,
}

/// Per-edge geometric data. Edge[i] starts at vertex[i].
#[derive(Clone, Copy, Default)]
struct EdgeData {
    /// Normalized edge vector components.
    dxs: Vec4,
    dys: Vec4,
    /// Inverse edge lengths (inf for zero-length edges).
    inv_lengths: Vec4,
    /// Cosine of the interior angle at vertex[i].
    cos_thetas: Vec4,
    /// Inverse of sin(interior angle) at vertex[i].
    inv_sin_thetas: Vec4,
}

/// Edge equations `a*x + b*y + c = 0` with inward-pointing unit normals `(a, b)`.
#[derive(Clone, Copy, Default)]
struct EdgeEquations {
    a: Vec4,
    b: Vec4,
    c: Vec4,
}

/// Shuffle each lane to its clockwise neighbor.
fn next_cw(v: Vec4) -> Vec4 {
    v.shuffle([2, 0, 3, 1])
}

/// Shuffle each lane to its counter-clockwise neighbor.
fn next_ccw(v: Vec4) -> Vec4 {
    v.shuffle([1, 3, 0, 2])
}

/// Shuffle each lane to its diagonal counterpart.
fn next_diag(v: Vec4) -> Vec4 {
    v.shuffle([3, 2, 1, 0])
}

fn to_vertices4(quad: &Quad) -> Vertices4 {
    Vertices4 {
        xs: Vec4::new(quad.point(0).x, quad.point(1).x, quad.point(2).x, quad.point(3).x),
        ys: Vec4::new(quad.point(0).y, quad.point(1).y, quad.point(2).y, quad.point(3).y),
    }
}

fn transform_vertices4(coords: &Vertices4, matrix: &Matrix) -> Vertices4 {
    let mut points = [
        Point::new(coords.xs[0], coords.ys[0]),
        Point::new(coords.xs[1], coords.ys[1]),
        Point::new(coords.xs[2], coords.ys[2]),
        Point::new(coords.xs[3], coords.ys[3]),
    ];
    matrix.map_points(&mut points);
    Vertices4 {
        xs: Vec4::new(points[0].x, points[1].x, points[2].x, points[3].x),
        ys: Vec4::new(points[0].y, points[1].y, points[2].y, points[3].y),
    }
}

/// Zero-length edges borrow the diagonal edge direction with flipped sign.
fn correct_bad_edges(bad: Mask4, dxs: &mut Vec4, dys: &mut Vec4) {
    if bad.any() {
        *dxs = Vec4::select(bad, -next_diag(*dxs), *dxs);
        *dys = Vec4::select(bad, -next_diag(*dys), *dys);
    }
}

/// Unresolvable intersections fall back to the CCW-next vertex.
fn correct_bad_coords(bad: Mask4, xs: &mut Vec4, ys: &mut Vec4) {
    if bad.any() {
        *xs = Vec4::select(bad, next_ccw(*xs), *xs);
        *ys = Vec4::select(bad, next_ccw(*ys), *ys);
    }
}

fn compute_edge_data(vertices: &Vertices4) -> EdgeData {
    // Edge[i] runs from vertex[i] to its CCW neighbor.
    let raw_dxs = next_ccw(vertices.xs) - vertices.xs;
    let raw_dys = next_ccw(vertices.ys) - vertices.ys;

    // Zero-length edges produce inf here. Do NOT replace inf with 0; downstream code
    // relies on `inv_lengths >= INV_DIST_TOLERANCE` to detect them.
    let inv_lengths = Vec4::splat(1.0) / (raw_dxs * raw_dxs + raw_dys * raw_dys).sqrt();
    let dxs = raw_dxs * inv_lengths;
    let dys = raw_dys * inv_lengths;

    // cos(theta) = dot(current edge, clockwise-next edge).
    let cos_thetas = dxs * next_cw(dxs) + dys * next_cw(dys);
    let inv_sin_thetas =
        Vec4::splat(1.0) / (Vec4::splat(1.0) - cos_thetas * cos_thetas).sqrt();

    EdgeData { dxs, dys, inv_lengths, cos_thetas, inv_sin_thetas }
}

fn compute_edge_equations(vertices: &Vertices4, edges: &EdgeData) -> EdgeEquations {
    let mut dxs = edges.dxs;
    let mut dys = edges.dys;
    let bad = edges.inv_lengths.greater_equal(INV_DIST_TOLERANCE);
    correct_bad_edges(bad, &mut dxs, &mut dys);

    // For ax + by + c = 0 with normal (a, b) = (dy, -dx), c is the signed distance
    // from the origin to the edge along the normal.
    let c = dxs * vertices.ys - dys * vertices.xs;

    // Test the clockwise-next vertex to make sure the normals point inward.
    let test = dys * next_cw(vertices.xs) - dxs * next_cw(vertices.ys) + c;
    if test.less_than(-DIST_TOLERANCE).any() {
        EdgeEquations { a: -dys, b: dxs, c: -c }
    } else {
        EdgeEquations { a: dys, b: -dxs, c }
    }
}

/// Rectangle quads never degenerate; all their angles are 90 degrees.
fn is_aa_degenerate(edges: &EdgeData, is_rect: bool) -> bool {
    if is_rect {
        return false;
    }
    let bad_length = edges.inv_lengths.greater_equal(INV_DIST_TOLERANCE);
    let bad_angle = edges.cos_thetas.abs().greater_equal(COS_THETA_THRESHOLD);
    bad_length.or(bad_angle).any()
}

/// True when all 4 vertices lie on one edge equation.
fn is_collinear(vertices: &Vertices4, eqs: &EdgeEquations) -> bool {
    for i in 0..4 {
        let dists = vertices.xs * Vec4::splat(eqs.a[i])
            + vertices.ys * Vec4::splat(eqs.b[i])
            + Vec4::splat(eqs.c[i]);
        if dists.abs().less_than(DIST_TOLERANCE).all() {
            return true;
        }
    }
    false
}

/// Miter displacement path for well-formed quads.
fn compute_aa_vertices(
    vertices: &Vertices4, edge_offset: Vec4, edges: &EdgeData,
) -> (Vertices4, Vertices4) {
    // For vertex[i], combine displacement from the outgoing edge (edge[i]) and the
    // incoming edge (edge[next_cw(i)]) scaled by 1/sin(theta).
    let from_outsets = edges.inv_sin_thetas * edge_offset;
    let to_outsets = edges.inv_sin_thetas * next_cw(edge_offset);

    // Outgoing edge contribution applies along the incoming edge direction (positive);
    // incoming edge contribution along the outgoing direction (negative).
    let outset_xs = from_outsets * next_cw(edges.dxs) - to_outsets * edges.dxs;
    let outset_ys = from_outsets * next_cw(edges.dys) - to_outsets * edges.dys;

    let inset = Vertices4 { xs: vertices.xs - outset_xs, ys: vertices.ys - outset_ys };
    let outset = Vertices4 { xs: vertices.xs + outset_xs, ys: vertices.ys + outset_ys };
    (inset, outset)
}

/// Replaces vertices that crossed a non-adjacent edge with the intersection of the
/// opposite edge pair, or the midpoint of the containing edge when those edges are
/// nearly parallel.
///
/// Assumes the quad is rectangle-like with vertex 0 at top-left, so E0/E3 are vertical
/// and E1/E2 horizontal.
fn correct_triangle_degeneration(
    eqs: &EdgeEquations, edge_dists_v: Vec4, edge_dists_h: Vec4, pxs: &mut Vec4, pys: &mut Vec4,
) {
    // Intersection of two lines a*x + b*y + c = 0:
    // denom = a0*b1 - b0*a1, x = (b0*c1 - c0*b1)/denom, y = (c0*a1 - a0*c1)/denom.
    let denom_v = eqs.a[0] * eqs.b[3] - eqs.b[0] * eqs.a[3];
    let x_v = (eqs.b[0] * eqs.c[3] - eqs.c[0] * eqs.b[3]) / denom_v;
    let y_v = (eqs.c[0] * eqs.a[3] - eqs.a[0] * eqs.c[3]) / denom_v;
    let valid_v = denom_v.abs() > DENOM_TOLERANCE;

    let denom_h = eqs.a[1] * eqs.b[2] - eqs.b[1] * eqs.a[2];
    let x_h = (eqs.b[1] * eqs.c[2] - eqs.c[1] * eqs.b[2]) / denom_h;
    let y_h = (eqs.c[1] * eqs.a[2] - eqs.a[1] * eqs.c[2]) / denom_h;
    let valid_h = denom_h.abs() > DENOM_TOLERANCE;

    let avg_xs = (pxs.shuffle([0, 1, 0, 2]) + pxs.shuffle([2, 3, 1, 3])) * 0.5;
    let avg_ys = (pys.shuffle([0, 1, 0, 2]) + pys.shuffle([2, 3, 1, 3])) * 0.5;

    let over_edge_v = edge_dists_v.less_than(DIST_TOLERANCE);
    let over_edge_h = edge_dists_h.less_than(DIST_TOLERANCE);

    for i in 0..4 {
        if edge_dists_v[i] < -DIST_TOLERANCE && valid_v {
            // Clearly crossed the opposite vertical edge: snap to the intersection.
            pxs[i] = x_v;
            pys[i] = y_v;
        } else if over_edge_v.0[i] {
            // Nearly parallel or barely crossed: midpoint of the containing edge.
            pxs[i] = avg_xs[i % 2];
            pys[i] = avg_ys[i % 2];
        } else if edge_dists_h[i] < -DIST_TOLERANCE && valid_h {
            pxs[i] = x_h;
            pys[i] = y_h;
        } else if over_edge_h.0[i] {
            pxs[i] = avg_xs[i / 2 + 2];
            pys[i] = avg_ys[i / 2 + 2];
        }
    }
}

/// Edge-equation intersection path for degenerate quads.
fn offset_quad_by_intersect(eqs: &EdgeEquations, edge_offset: Vec4) -> Vertices4 {
    let offset_eqs = EdgeEquations { a: eqs.a, b: eqs.b, c: eqs.c + edge_offset };

    let denoms = offset_eqs.a * next_cw(offset_eqs.b) - offset_eqs.b * next_cw(offset_eqs.a);
    let mut pxs =
        (offset_eqs.b * next_cw(offset_eqs.c) - offset_eqs.c * next_cw(offset_eqs.b)) / denoms;
    let mut pys =
        (offset_eqs.c * next_cw(offset_eqs.a) - offset_eqs.a * next_cw(offset_eqs.c)) / denoms;

    let bad = denoms.abs().less_than(DENOM_TOLERANCE);
    correct_bad_coords(bad, &mut pxs, &mut pys);

    // Signed distances from each new vertex to its non-adjacent vertical and
    // horizontal edges.
    let edge_dists_v = offset_eqs.a.shuffle([3, 3, 0, 0]) * pxs
        + offset_eqs.b.shuffle([3, 3, 0, 0]) * pys
        + offset_eqs.c.shuffle([3, 3, 0, 0]);
    let edge_dists_h = offset_eqs.a.shuffle([1, 2, 1, 2]) * pxs
        + offset_eqs.b.shuffle([1, 2, 1, 2]) * pys
        + offset_eqs.c.shuffle([1, 2, 1, 2]);

    let over_edge_v = edge_dists_v.less_than(DIST_TOLERANCE);
    let over_edge_h = edge_dists_h.less_than(DIST_TOLERANCE);
    let over_both = over_edge_v.and(over_edge_h);
    let over_any = over_edge_v.or(over_edge_h);

    // No vertex beyond any non-adjacent edge: the offset result is still a quad.
    if !over_any.any() {
        return Vertices4 { xs: pxs, ys: pys };
    }

    // A vertex beyond both opposite edges means degeneration to a point; all vertices
    // beyond some opposite edge means degeneration to a line.
    if over_both.any() || over_any.all() {
        // TODO: resolve point/line degeneration instead of keeping the raw
        // intersections.
        return Vertices4 { xs: pxs, ys: pys };
    }

    let mut pxs = pxs;
    let mut pys = pys;
    correct_triangle_degeneration(&offset_eqs, edge_dists_v, edge_dists_h, &mut pxs, &mut pys);
    Vertices4 { xs: pxs, ys: pys }
}

fn compute_aa_vertices_degenerate(
    vertices: &Vertices4, edge_offset: Vec4, eqs: &EdgeEquations,
) -> (Vertices4, Vertices4) {
    if is_collinear(vertices, eqs) {
        // Zero-width ribbons keep inset == outset.
        return (*vertices, *vertices);
    }
    let inset = offset_quad_by_intersect(eqs, -edge_offset);
    let outset = offset_quad_by_intersect(eqs, edge_offset);
    (inset, outset)
}

fn write_quad_vertices(
    writer: &mut VertexWriter, coords: &Vertices4, coverage: f32, uv: Option<&Vertices4>,
    color: Option<f32>,
) {
    for i in 0..4 {
        writer.push(coords.xs[i]);
        writer.push(coords.ys[i]);
        writer.push(coverage);
        if let Some(uv) = uv {
            writer.push(uv.xs[i]);
            writer.push(uv.ys[i]);
        }
        if let Some(color) = color {
            writer.push(color);
        }
    }
}

/// Provides vertex data for rendering a batch of quads with per-edge AA, typically on
/// behalf of the 3D compositor.
pub struct QuadsVertexProvider {
    quads: PlacementArray<QuadRecord>,
    aa_type: AAType,
    has_color: bool,
    has_uv: bool,
    _reference: Arc<AllocatorReference>,
}

impl QuadsVertexProvider {
    /// Creates a provider from a single rect with all edges marked for AA.
    pub fn make_from_rect(
        allocator: &BlockAllocator, rect: Rect, aa_type: AAType, color: Color,
    ) -> Option<PlacementCell<VertexProvider>> {
        let quad = Quad::from_rect(&rect, None);
        let record =
            allocator.make(QuadRecord::new(quad, QuadAAFlags::ALL, color, Matrix::identity()));
        Self::make_from(allocator, vec![record], aa_type)
    }

    /// Creates a provider from a list of quad records. Colors and UV transforms are
    /// uniform unless some record disagrees with the first.
    pub fn make_from(
        allocator: &BlockAllocator, quads: Vec<PlacementCell<QuadRecord>>, aa_type: AAType,
    ) -> Option<PlacementCell<VertexProvider>> {
        if quads.is_empty() {
            return None;
        }
        let mut has_color = false;
        let mut has_uv = false;
        let first_color = quads[0].color;
        let first_matrix = quads[0].matrix;
        for record in quads.iter().skip(1) {
            has_color = has_color || record.color != first_color;
            has_uv = has_uv || record.matrix != first_matrix;
            if has_color && has_uv {
                break;
            }
        }
        let provider = QuadsVertexProvider {
            quads: allocator.make_array_from(quads),
            aa_type,
            has_color,
            has_uv,
            _reference: allocator.add_reference(),
        };
        let cell = allocator.make(VertexProvider::Quads(provider));
        (!cell.is_empty()).then_some(cell)
    }

    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    pub fn aa_type(&self) -> AAType {
        self.aa_type
    }

    pub fn has_color(&self) -> bool {
        self.has_color
    }

    pub fn has_uv(&self) -> bool {
        self.has_uv
    }

    pub fn first_color(&self) -> Color {
        self.quads[0].color
    }

    pub fn first_matrix(&self) -> Matrix {
        self.quads[0].matrix
    }

    pub fn vertex_count(&self) -> usize {
        let per_vertex = if self.aa_type == AAType::Coverage { 3 } else { 2 };
        let per_vertex = per_vertex
            + if self.has_uv { 2 } else { 0 }
            + if self.has_color { 1 } else { 0 };
        let vertices_per_quad = if self.aa_type == AAType::Coverage { 8 } else { 4 };
        self.quads.len() * vertices_per_quad * per_vertex
    }

    pub fn get_vertices(&self, out: &mut [f32]) {
        let mut writer = VertexWriter::new(out);
        if self.aa_type == AAType::Coverage {
            for i in 0..self.quads.len() {
                self.write_aa_quad(&mut writer, &self.quads[i]);
            }
        } else {
            self.write_non_aa(&mut writer);
        }
    }

    fn write_non_aa(&self, writer: &mut VertexWriter) {
        for i in 0..self.quads.len() {
            let record = &*self.quads[i];
            let color = self.has_color.then(|| packed_vertex_color(record.color));
            let mut transformed = record.quad;
            transformed.transform(&record.matrix);
            for j in 0..4 {
                let point = transformed.point(j);
                writer.push(point.x);
                writer.push(point.y);
                if self.has_uv {
                    let uv = record.quad.point(j);
                    writer.push(uv.x);
                    writer.push(uv.y);
                }
                if let Some(color) = color {
                    writer.push(color);
                }
            }
        }
    }

    fn write_aa_quad(&self, writer: &mut VertexWriter, record: &QuadRecord) {
        let mut transformed = record.quad;
        transformed.transform(&record.matrix);
        let vertices = to_vertices4(&transformed);

        let edges = compute_edge_data(&vertices);
        let flags = record.aa_flags;
        let offset_for = |flag: QuadAAFlags| {
            if flags.contains(flag) {
                AA_OFFSET
            } else {
                0.0
            }
        };
        let edge_offset = Vec4::new(
            offset_for(QuadAAFlags::EDGE_0),
            offset_for(QuadAAFlags::EDGE_1),
            offset_for(QuadAAFlags::EDGE_2),
            offset_for(QuadAAFlags::EDGE_3),
        );

        let (inset, outset) = if is_aa_degenerate(&edges, transformed.is_rect()) {
            let eqs = compute_edge_equations(&vertices, &edges);
            compute_aa_vertices_degenerate(&vertices, edge_offset, &eqs)
        } else {
            compute_aa_vertices(&vertices, edge_offset, &edges)
        };

        let (inset_uv, outset_uv) = if self.has_uv {
            match record.matrix.invert() {
                Some(inverse) => (
                    Some(transform_vertices4(&inset, &inverse)),
                    Some(transform_vertices4(&outset, &inverse)),
                ),
                None => {
                    // Non-invertible record matrix: fall back to the untransformed quad.
                    debug_assert!(false, "quad record matrix not invertible");
                    let fallback = to_vertices4(&record.quad);
                    (Some(fallback), Some(fallback))
                }
            }
        } else {
            (None, None)
        };

        let color = self.has_color.then(|| packed_vertex_color(record.color));
        write_quad_vertices(writer, &inset, 1.0, inset_uv.as_ref(), color);
        write_quad_vertices(writer, &outset, 0.0, outset_uv.as_ref(), color);
    }
}

// Collinearity helper shared with tests.
#[allow(dead_code)]
fn quad_is_collinear(quad: &Quad) -> bool {
    let vertices = to_vertices4(quad);
    let edges = compute_edge_data(&vertices);
    let eqs = compute_edge_equations(&vertices, &edges);
    is_collinear(&vertices, &eqs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices_of(cell: &PlacementCell<VertexProvider>) -> Vec<f32> {
        let provider = cell.get().unwrap();
        let mut out = vec![0.0f32; provider.vertex_count()];
        provider.get_vertices(&mut out);
        out
    }

    fn point_in_rect(x: f32, y: f32, rect: &Rect) -> bool {
        x > rect.left && x < rect.right && y > rect.top && y < rect.bottom
    }

    #[test]
    fn aa_rect_inset_inside_outset_outside() {
        let allocator = BlockAllocator::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let cell =
            QuadsVertexProvider::make_from_rect(&allocator, rect, AAType::Coverage, Color::WHITE)
                .unwrap();
        let vertices = vertices_of(&cell);
        assert_eq!(vertices.len(), 8 * 3);
        for (i, vertex) in vertices.chunks(3).enumerate() {
            if i < 4 {
                assert_eq!(vertex[2], 1.0);
                assert!(point_in_rect(vertex[0], vertex[1], &rect), "inset escaped: {vertex:?}");
            } else {
                assert_eq!(vertex[2], 0.0);
                assert!(
                    !point_in_rect(vertex[0], vertex[1], &rect),
                    "outset inside: {vertex:?}"
                );
            }
        }
    }

    #[test]
    fn aa_off_edges_keep_inset_equal_to_outset() {
        let allocator = BlockAllocator::new();
        let quad = Quad::from_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), None);
        // AA on the left edge only (edge 0: LT -> LB).
        let record = allocator.make(QuadRecord::new(
            quad,
            QuadAAFlags::EDGE_0,
            Color::WHITE,
            Matrix::identity(),
        ));
        let cell =
            QuadsVertexProvider::make_from(&allocator, vec![record], AAType::Coverage).unwrap();
        let vertices = vertices_of(&cell);
        let inset: Vec<(f32, f32)> = vertices[..12].chunks(3).map(|v| (v[0], v[1])).collect();
        let outset: Vec<(f32, f32)> = vertices[12..].chunks(3).map(|v| (v[0], v[1])).collect();
        // Vertices on the AA edge (0 and 1) move in x, all others stay pinned.
        for i in 0..4 {
            let dx = (inset[i].0 - outset[i].0).abs();
            let dy = (inset[i].1 - outset[i].1).abs();
            if i < 2 {
                assert!(dx > 0.9, "edge-0 vertex {i} did not move");
            } else {
                assert!(dx < 1e-4 && dy < 1e-4, "non-AA vertex {i} moved");
            }
            assert!(dy < 1e-4);
        }
    }

    #[test]
    fn collinear_quad_degenerates_to_ribbon() {
        let p = |x: f32| Point::new(x, 5.0);
        let quad = Quad::from_cw(p(0.0), p(3.0), p(6.0), p(9.0));
        assert!(quad_is_collinear(&quad));

        let allocator = BlockAllocator::new();
        let record = allocator.make(QuadRecord::new(
            quad,
            QuadAAFlags::ALL,
            Color::WHITE,
            Matrix::identity(),
        ));
        let cell =
            QuadsVertexProvider::make_from(&allocator, vec![record], AAType::Coverage).unwrap();
        let vertices = vertices_of(&cell);
        let inset = &vertices[..12];
        let outset = &vertices[12..];
        for i in 0..4 {
            assert_eq!(inset[i * 3], outset[i * 3]);
            assert_eq!(inset[i * 3 + 1], outset[i * 3 + 1]);
        }
    }

    #[test]
    fn shared_color_stays_uniform() {
        let allocator = BlockAllocator::new();
        let quad = Quad::from_rect(&Rect::new(0.0, 0.0, 4.0, 4.0), None);
        let records = vec![
            allocator.make(QuadRecord::new(
                quad,
                QuadAAFlags::ALL,
                Color::WHITE,
                Matrix::identity(),
            )),
            allocator.make(QuadRecord::new(
                quad,
                QuadAAFlags::ALL,
                Color::WHITE,
                Matrix::identity(),
            )),
        ];
        let cell = QuadsVertexProvider::make_from(&allocator, records, AAType::None).unwrap();
        let provider = cell.get().unwrap();
        let quads = provider.as_quads().unwrap();
        assert!(!quads.has_color());
        assert!(!quads.has_uv());
        assert_eq!(provider.vertex_count(), 2 * 4 * 2);
    }

    #[test]
    fn differing_matrices_enable_uv() {
        let allocator = BlockAllocator::new();
        let quad = Quad::from_rect(&Rect::new(0.0, 0.0, 4.0, 4.0), None);
        let records = vec![
            allocator.make(QuadRecord::new(
                quad,
                QuadAAFlags::ALL,
                Color::WHITE,
                Matrix::identity(),
            )),
            allocator.make(QuadRecord::new(
                quad,
                QuadAAFlags::ALL,
                Color::WHITE,
                Matrix::make_scale(2.0, 2.0),
            )),
        ];
        let cell = QuadsVertexProvider::make_from(&allocator, records, AAType::Coverage).unwrap();
        assert!(cell.get().unwrap().as_quads().unwrap().has_uv());
        let vertices = vertices_of(&cell);
        // 2 quads x 8 vertices x (x, y, coverage, u, v).
        assert_eq!(vertices.len(), 2 * 8 * 5);
        // The second quad's UVs are its device positions mapped back through the
        // inverse scale.
        let second = &vertices[40..];
        for vertex in second.chunks(5) {
            assert!((vertex[3] - vertex[0] / 2.0).abs() < 1e-4);
            assert!((vertex[4] - vertex[1] / 2.0).abs() < 1e-4);
        }
    }
}
