use crate::geom::{Matrix, Point, RRect, Rect};

/// Winding rule applied when a path is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathFillType {
    #[default]
    Winding,
    EvenOdd,
}

/// Path segment kinds handed to [`Path::decompose`] visitors. The point array always
/// carries the current point first, so a Line sees `[start, end, _, _]` and a Cubic
/// sees all four control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerb {
    Move,
    Line,
    Quad,
    Cubic,
    Close,
}

/// Circle-to-cubic control point distance.
const KAPPA: f32 = 0.552_284_75;

/// A sequence of move/line/quad/cubic/close verbs.
#[derive(Debug, Clone, Default)]
pub struct Path {
    verbs: Vec<PathVerb>,
    points: Vec<Point>,
    fill_type: PathFillType,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn fill_type(&self) -> PathFillType {
        self.fill_type
    }

    pub fn set_fill_type(&mut self, fill_type: PathFillType) {
        self.fill_type = fill_type;
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.verbs.push(PathVerb::Move);
        self.points.push(Point::new(x, y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.verbs.push(PathVerb::Line);
        self.points.push(Point::new(x, y));
    }

    pub fn quad_to(&mut self, control_x: f32, control_y: f32, x: f32, y: f32) {
        self.verbs.push(PathVerb::Quad);
        self.points.push(Point::new(control_x, control_y));
        self.points.push(Point::new(x, y));
    }

    pub fn cubic_to(
        &mut self, control1_x: f32, control1_y: f32, control2_x: f32, control2_y: f32, x: f32,
        y: f32,
    ) {
        self.verbs.push(PathVerb::Cubic);
        self.points.push(Point::new(control1_x, control1_y));
        self.points.push(Point::new(control2_x, control2_y));
        self.points.push(Point::new(x, y));
    }

    pub fn close(&mut self) {
        self.verbs.push(PathVerb::Close);
    }

    /// Appends a clockwise rectangle contour.
    pub fn add_rect(&mut self, rect: &Rect) {
        self.move_to(rect.left, rect.top);
        self.line_to(rect.right, rect.top);
        self.line_to(rect.right, rect.bottom);
        self.line_to(rect.left, rect.bottom);
        self.close();
    }

    /// Appends a rounded rectangle, approximating each corner arc with one cubic.
    pub fn add_rrect(&mut self, rrect: &RRect) {
        if rrect.is_rect() {
            self.add_rect(&rrect.rect);
            return;
        }
        let rect = rrect.rect;
        let rx = rrect.radii.x;
        let ry = rrect.radii.y;
        let cx = rx * KAPPA;
        let cy = ry * KAPPA;
        self.move_to(rect.left + rx, rect.top);
        self.line_to(rect.right - rx, rect.top);
        self.cubic_to(
            rect.right - rx + cx, rect.top, rect.right, rect.top + ry - cy, rect.right,
            rect.top + ry,
        );
        self.line_to(rect.right, rect.bottom - ry);
        self.cubic_to(
            rect.right, rect.bottom - ry + cy, rect.right - rx + cx, rect.bottom,
            rect.right - rx, rect.bottom,
        );
        self.line_to(rect.left + rx, rect.bottom);
        self.cubic_to(
            rect.left + rx - cx, rect.bottom, rect.left, rect.bottom - ry + cy, rect.left,
            rect.bottom - ry,
        );
        self.line_to(rect.left, rect.top + ry);
        self.cubic_to(
            rect.left, rect.top + ry - cy, rect.left + rx - cx, rect.top, rect.left + rx,
            rect.top,
        );
        self.close();
    }

    pub fn add_oval(&mut self, bounds: &Rect) {
        self.add_rrect(&RRect::new(*bounds, bounds.width() * 0.5, bounds.height() * 0.5));
    }

    pub fn add_path(&mut self, other: &Path) {
        self.verbs.extend_from_slice(&other.verbs);
        self.points.extend_from_slice(&other.points);
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        matrix.map_points(&mut self.points);
    }

    /// The control-point bounding box. Curves are bounded conservatively.
    pub fn bounds(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::empty();
        }
        let mut left = self.points[0].x;
        let mut top = self.points[0].y;
        let mut right = left;
        let mut bottom = top;
        for point in &self.points[1..] {
            left = left.min(point.x);
            top = top.min(point.y);
            right = right.max(point.x);
            bottom = bottom.max(point.y);
        }
        Rect::new(left, top, right, bottom)
    }

    /// Walks the path, handing each verb to `visitor` together with its points. The
    /// first slot always holds the segment's start point.
    pub fn decompose(&self, mut visitor: impl FnMut(PathVerb, &[Point; 4])) {
        let mut index = 0usize;
        let mut current = Point::zero();
        let mut contour_start = Point::zero();
        for verb in &self.verbs {
            let mut pts = [Point::zero(); 4];
            match verb {
                PathVerb::Move => {
                    current = self.points[index];
                    contour_start = current;
                    index += 1;
                    pts[0] = current;
                }
                PathVerb::Line => {
                    pts[0] = current;
                    pts[1] = self.points[index];
                    current = pts[1];
                    index += 1;
                }
                PathVerb::Quad => {
                    pts[0] = current;
                    pts[1] = self.points[index];
                    pts[2] = self.points[index + 1];
                    current = pts[2];
                    index += 2;
                }
                PathVerb::Cubic => {
                    pts[0] = current;
                    pts[1] = self.points[index];
                    pts[2] = self.points[index + 1];
                    pts[3] = self.points[index + 2];
                    current = pts[3];
                    index += 3;
                }
                PathVerb::Close => {
                    pts[0] = current;
                    pts[1] = contour_start;
                    current = contour_start;
                }
            }
            visitor(*verb, &pts);
        }
    }

    /// Detects a single closed axis-aligned rectangle contour. Returns the rect and
    /// whether the winding runs counter-clockwise.
    pub fn as_rect(&self) -> Option<(Rect, bool)> {
        // M, L, L, L, (L)?, Close with axis-aligned edges.
        let closed = matches!(self.verbs.last(), Some(PathVerb::Close));
        if !closed || self.verbs.len() < 5 {
            return None;
        }
        let line_count = self.verbs.len() - 2;
        if self.verbs[0] != PathVerb::Move || !(3..=4).contains(&line_count) {
            return None;
        }
        if self.verbs[1..=line_count].iter().any(|v| *v != PathVerb::Line) {
            return None;
        }
        let points = &self.points;
        if line_count == 4 && points[4] != points[0] {
            return None;
        }
        let quad = &points[0..4];
        for i in 0..4 {
            let a = quad[i];
            let b = quad[(i + 1) % 4];
            if a.x != b.x && a.y != b.y {
                return None;
            }
        }
        let bounds = self.bounds();
        if bounds.is_empty() {
            return None;
        }
        // Clockwise in y-down coordinates keeps positive cross products.
        let cross = Point::cross(quad[1] - quad[0], quad[2] - quad[1]);
        Some((bounds, cross < 0.0))
    }

    pub fn verb_count(&self) -> usize {
        self.verbs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_detection() {
        let mut path = Path::new();
        path.add_rect(&Rect::new(1.0, 2.0, 5.0, 6.0));
        let (rect, reversed) = path.as_rect().unwrap();
        assert_eq!(rect, Rect::new(1.0, 2.0, 5.0, 6.0));
        assert!(!reversed);

        let mut rotated = path.clone();
        rotated.transform(&Matrix::make_rotate(45.0));
        assert!(rotated.as_rect().is_none());
    }

    #[test]
    fn decompose_supplies_start_points() {
        let mut path = Path::new();
        path.move_to(1.0, 1.0);
        path.line_to(4.0, 1.0);
        path.quad_to(5.0, 2.0, 4.0, 3.0);
        path.close();
        let mut seen = Vec::new();
        path.decompose(|verb, pts| seen.push((verb, pts[0])));
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], (PathVerb::Line, Point::new(1.0, 1.0)));
        assert_eq!(seen[2], (PathVerb::Quad, Point::new(4.0, 1.0)));
        assert_eq!(seen[3], (PathVerb::Close, Point::new(4.0, 3.0)));
    }
}
