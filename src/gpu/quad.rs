use bitflags::bitflags;

use crate::geom::{Color, Matrix, Point, Rect};

/// Antialiasing strategy for a draw op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AAType {
    #[default]
    None,
    /// Coverage ramps baked into the geometry.
    Coverage,
    /// Multisampling; geometry is bloated by sqrt(2) instead of half a pixel.
    Msaa,
}

bitflags! {
    /// AA flags for each edge of a quad. Each flag covers the edge starting from the
    /// same-numbered vertex.
    ///
    /// Vertex and edge layout:
    /// ```text
    ///   0 <-- 2
    ///   |     ^
    ///   1 --> 3
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QuadAAFlags: u8 {
        const EDGE_0 = 0b0001;
        const EDGE_1 = 0b0010;
        const EDGE_2 = 0b0100;
        const EDGE_3 = 0b1000;
    }
}

impl QuadAAFlags {
    pub const NONE: QuadAAFlags = QuadAAFlags::empty();
    pub const ALL: QuadAAFlags = QuadAAFlags::all();
}

/// A quadrilateral with vertices in Z-order.
///
/// Vertex layout:
/// ```text
///   0(LT) --- 2(RT)
///     |         |
///   1(LB) --- 3(RB)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    points: [Point; 4],
    is_rect: bool,
}

impl Quad {
    /// Creates a quad from a rectangle, optionally transformed. The rect-invariance
    /// bit survives only matrices that keep rectangles rectangular.
    pub fn from_rect(rect: &Rect, matrix: Option<&Matrix>) -> Quad {
        let mut points = [
            Point::new(rect.left, rect.top),
            Point::new(rect.left, rect.bottom),
            Point::new(rect.right, rect.top),
            Point::new(rect.right, rect.bottom),
        ];
        if let Some(matrix) = matrix {
            matrix.map_points(&mut points);
        }
        let is_rect = match matrix {
            None => true,
            Some(matrix) => rect_stays_rect(matrix),
        };
        Quad { points, is_rect }
    }

    /// Creates a quad from four points in clockwise order. Prefer [`Quad::from_rect`]
    /// when the points form a rectangle.
    pub fn from_cw(p0: Point, p1: Point, p2: Point, p3: Point) -> Quad {
        Quad { points: [p0, p3, p1, p2], is_rect: false }
    }

    pub fn point(&self, index: usize) -> Point {
        debug_assert!(index < 4);
        self.points[index]
    }

    pub fn is_rect(&self) -> bool {
        self.is_rect
    }

    /// Transforms all four vertices in place.
    pub fn transform(&mut self, matrix: &Matrix) {
        if matrix.is_identity() {
            return;
        }
        matrix.map_points(&mut self.points);
        if self.is_rect {
            self.is_rect = rect_stays_rect(matrix);
        }
    }
}

fn rect_stays_rect(matrix: &Matrix) -> bool {
    matrix.rect_stays_rect() || matrix.preserves_right_angles()
}

/// A Z-order quad with per-edge AA flags, an optional transform, and a vertex color.
pub struct QuadRecord {
    pub quad: Quad,
    pub aa_flags: QuadAAFlags,
    pub color: Color,
    pub matrix: Matrix,
}

impl QuadRecord {
    pub fn new(quad: Quad, aa_flags: QuadAAFlags, color: Color, matrix: Matrix) -> Self {
        QuadRecord { quad, aa_flags, color, matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_order_from_cw() {
        let quad = Quad::from_cw(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        );
        assert_eq!(quad.point(0), Point::new(0.0, 0.0)); // LT
        assert_eq!(quad.point(1), Point::new(0.0, 10.0)); // LB
        assert_eq!(quad.point(2), Point::new(10.0, 0.0)); // RT
        assert_eq!(quad.point(3), Point::new(10.0, 10.0)); // RB
    }

    #[test]
    fn rect_bit_tracks_matrix() {
        let rect = Rect::new(0.0, 0.0, 4.0, 4.0);
        assert!(Quad::from_rect(&rect, None).is_rect());
        assert!(Quad::from_rect(&rect, Some(&Matrix::make_rotate(90.0))).is_rect());
        // A uniform rotation keeps right angles, so the bit survives.
        assert!(Quad::from_rect(&rect, Some(&Matrix::make_rotate(30.0))).is_rect());
        let shear = Matrix::from_values(1.0, 0.7, 0.0, 0.0, 1.0, 0.0);
        assert!(!Quad::from_rect(&rect, Some(&shear)).is_rect());
    }
}
