use std::sync::Arc;

use smallvec::SmallVec;

use crate::core::Image;
use crate::geom::math::{float_nearly_equal, float_nearly_zero};
use crate::geom::{Matrix3D, Point, Vec3};
use crate::gpu::Quad;

const SPLIT_THRESHOLD: f32 = 0.05;

type Points = SmallVec<[Vec3; 8]>;

fn interpolate_point(from: Vec3, to: Vec3, delta: f32) -> Vec3 {
    Vec3::new(
        from.x + (to.x - from.x) * delta,
        from.y + (to.y - from.y) * delta,
        from.z + (to.z - from.z) * delta,
    )
}

fn next_index(i: usize, count: usize) -> usize {
    (i + 1) % count
}

fn prev_index(i: usize, count: usize) -> usize {
    (i + count - 1) % count
}

fn collect_split_points(
    points: &[Vec3], start_intersection: Vec3, end_intersection: Vec3, begin_index: usize,
    end_index: usize,
) -> Points {
    let mut result = Points::new();
    result.push(start_intersection);
    let count = points.len();
    let mut index = begin_index;
    while index != end_index {
        result.push(points[index]);
        index = next_index(index, count);
    }
    if *result.last().unwrap() != end_intersection {
        result.push(end_intersection);
    }
    result
}

/// The outcome of splitting a polygon by a plane.
pub struct SplitResult {
    pub front: Option<Box<DrawPolygon3D>>,
    pub back: Option<Box<DrawPolygon3D>>,
    pub is_coplanar: bool,
}

/// A splittable convex polygon in screen space: an image's transformed corners,
/// possibly sliced by BSP planes.
pub struct DrawPolygon3D {
    points: Points,
    normal: Vec3,
    depth: i32,
    sequence_index: i32,
    is_split: bool,
    alpha: f32,
    anti_alias: bool,
    image: Arc<dyn Image>,
    matrix: Matrix3D,
}

impl DrawPolygon3D {
    /// Builds a polygon from the image's 2D bounds under a 3D transform. `depth` is
    /// the layer-tree depth and `sequence_index` the insertion order within it; the
    /// pair decides paint order for coplanar polygons.
    ///
    /// The caller guarantees the transformed vertices do not cross the observer's
    /// z-plane.
    pub fn new(
        image: Arc<dyn Image>, matrix: Matrix3D, depth: i32, sequence_index: i32, alpha: f32,
        anti_alias: bool,
    ) -> DrawPolygon3D {
        let src_w = image.width() as f32;
        let src_h = image.height() as f32;
        let corners = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(src_w, 0.0, 0.0),
            Vec3::new(src_w, src_h, 0.0),
            Vec3::new(0.0, src_h, 0.0),
        ];
        let mut points = Points::new();
        for corner in corners {
            points.push(matrix.map_point(corner));
        }
        let mut polygon = DrawPolygon3D {
            points,
            normal: Vec3::new(0.0, 0.0, 1.0),
            depth,
            sequence_index,
            is_split: false,
            alpha,
            anti_alias,
            image,
            matrix,
        };
        polygon.construct_normal();
        polygon
    }

    fn from_split(
        source: &DrawPolygon3D, points: Points,
    ) -> Box<DrawPolygon3D> {
        Box::new(DrawPolygon3D {
            points,
            normal: source.normal,
            depth: source.depth,
            sequence_index: source.sequence_index,
            is_split: true,
            alpha: source.alpha,
            anti_alias: source.anti_alias,
            image: Arc::clone(&source.image),
            matrix: source.matrix,
        })
    }

    /// Average of the cross products of opposite diagonals from vertex 0, normalized.
    /// A straight rectangle yields (0, 0, +-1).
    fn construct_normal(&mut self) {
        let mut normal = Vec3::new(0.0, 0.0, 0.0);
        let delta = self.points.len() / 2;
        let mut i = 1;
        while i + delta < self.points.len() {
            let v1 = self.points[i] - self.points[0];
            let v2 = self.points[i + delta] - self.points[0];
            normal += Vec3::cross(v1, v2);
            i += 1;
        }
        let length = normal.length();
        if !float_nearly_zero(length) && !float_nearly_equal(length, 1.0) {
            normal = normal * (1.0 / length);
        }
        self.normal = normal;
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn is_split(&self) -> bool {
        self.is_split
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn anti_alias(&self) -> bool {
        self.anti_alias
    }

    pub fn image(&self) -> &Arc<dyn Image> {
        &self.image
    }

    pub fn matrix(&self) -> &Matrix3D {
        &self.matrix
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn sequence_index(&self) -> i32 {
        self.sequence_index
    }

    pub fn is_facing_positive_z(&self) -> bool {
        self.normal.z > 0.0
    }

    /// Signed distance from a point to this polygon's plane. Positive means the same
    /// side as the normal.
    pub fn signed_distance_to(&self, point: Vec3) -> f32 {
        Vec3::dot(point - self.points[0], self.normal)
    }

    /// Splits `polygon` by this polygon's plane.
    ///
    /// Coplanar polygons are routed whole: the one painted later (greater depth, or
    /// equal depth and greater-or-equal sequence) goes to the front bucket. Straddling
    /// polygons are cut along the two boundary crossings into a front and a back
    /// fragment, both with at least 3 vertices.
    pub fn split_another(&self, polygon: Box<DrawPolygon3D>) -> SplitResult {
        debug_assert!((self.normal.length_squared() - 1.0).abs() <= 1e-3);
        let num_points = polygon.points.len();
        let mut vertex_distance = SmallVec::<[f32; 8]>::new();
        let mut positive_count = 0usize;
        let mut negative_count = 0usize;
        for point in &polygon.points {
            let mut distance = self.signed_distance_to(*point);
            if distance < -SPLIT_THRESHOLD {
                negative_count += 1;
            } else if distance > SPLIT_THRESHOLD {
                positive_count += 1;
            } else {
                distance = 0.0;
            }
            vertex_distance.push(distance);
        }

        if positive_count == 0 && negative_count == 0 {
            // Coplanar: order by (depth, sequence); later-painted goes in front.
            let polygon_is_later = polygon.depth > self.depth
                || (polygon.depth == self.depth
                    && polygon.sequence_index >= self.sequence_index);
            return if polygon_is_later {
                SplitResult { front: Some(polygon), back: None, is_coplanar: true }
            } else {
                SplitResult { front: None, back: Some(polygon), is_coplanar: true }
            };
        }
        if negative_count == 0 {
            return SplitResult { front: Some(polygon), back: None, is_coplanar: false };
        }
        if positive_count == 0 {
            return SplitResult { front: None, back: Some(polygon), is_coplanar: false };
        }

        // The polygon straddles the plane: find the first vertex of the positive and
        // negative runs around the boundary.
        let mut front_begin = 0usize;
        let mut back_begin = 0usize;
        for (i, distance) in vertex_distance.iter().enumerate() {
            if *distance > 0.0 {
                front_begin = i;
                break;
            }
        }
        loop {
            let previous = prev_index(front_begin, num_points);
            if vertex_distance[previous] > 0.0 {
                front_begin = previous;
            } else {
                break;
            }
        }
        for (i, distance) in vertex_distance.iter().enumerate() {
            if *distance < 0.0 {
                back_begin = i;
                break;
            }
        }
        loop {
            let previous = prev_index(back_begin, num_points);
            if vertex_distance[previous] < 0.0 {
                back_begin = previous;
            } else {
                break;
            }
        }

        let pre_front = prev_index(front_begin, num_points);
        let pre_positive_intersection = interpolate_point(
            polygon.points[pre_front],
            polygon.points[front_begin],
            vertex_distance[pre_front]
                / (vertex_distance[pre_front] - vertex_distance[front_begin]),
        );
        let pre_back = prev_index(back_begin, num_points);
        let pre_negative_intersection = interpolate_point(
            polygon.points[pre_back],
            polygon.points[back_begin],
            vertex_distance[pre_back]
                / (vertex_distance[pre_back] - vertex_distance[back_begin]),
        );

        let front_points = collect_split_points(
            &polygon.points,
            pre_positive_intersection,
            pre_negative_intersection,
            front_begin,
            back_begin,
        );
        let back_points = collect_split_points(
            &polygon.points,
            pre_negative_intersection,
            pre_positive_intersection,
            back_begin,
            front_begin,
        );
        let front = DrawPolygon3D::from_split(&polygon, front_points);
        let back = DrawPolygon3D::from_split(&polygon, back_points);
        debug_assert!(front.points.len() >= 3);
        debug_assert!(back.points.len() >= 3);
        SplitResult { front: Some(front), back: Some(back), is_coplanar: false }
    }

    /// Decomposes this polygon into quads in the image's local 2D space (inverse of
    /// the 3D matrix applied to the vertices). Triangles duplicate the last vertex;
    /// polygons with more than 4 vertices fan out into ceil((n-2)/2) quads.
    pub fn to_quads(&self) -> Vec<Quad> {
        let mut quads = Vec::new();
        let n = self.points.len();
        if n < 3 {
            debug_assert!(false, "polygon with fewer than 3 vertices");
            return quads;
        }
        let Some(inverse) = self.matrix.invert() else {
            debug_assert!(false, "polygon matrix not invertible");
            return quads;
        };
        let local: Vec<Point> =
            self.points.iter().map(|point| inverse.project(*point)).collect();
        if n == 3 {
            quads.push(Quad::from_cw(local[0], local[1], local[2], local[2]));
            return quads;
        }
        if n == 4 {
            quads.push(Quad::from_cw(local[0], local[1], local[2], local[3]));
            return quads;
        }
        let mut i = 1;
        while i + 2 < n {
            quads.push(Quad::from_cw(local[0], local[i], local[i + 1], local[i + 2]));
            i += 2;
        }
        if (n - 2) % 2 == 1 {
            quads.push(Quad::from_cw(local[0], local[n - 2], local[n - 1], local[n - 1]));
        }
        quads
    }
}

/// Paint order: smaller depth first (parents at the bottom), then smaller sequence.
pub fn draw_polygon_order(a: &DrawPolygon3D, b: &DrawPolygon3D) -> std::cmp::Ordering {
    a.depth.cmp(&b.depth).then(a.sequence_index.cmp(&b.sequence_index))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::{ColorType, Pixmap, RasterImage};

    pub fn test_image(width: i32, height: i32) -> Arc<dyn Image> {
        RasterImage::new(Pixmap::new(width, height, ColorType::Rgba8888).unwrap())
    }

    fn flat_polygon(z: f32, depth: i32, sequence: i32) -> Box<DrawPolygon3D> {
        Box::new(DrawPolygon3D::new(
            test_image(10, 10),
            Matrix3D::make_translate(0.0, 0.0, z),
            depth,
            sequence,
            1.0,
            true,
        ))
    }

    #[test]
    fn flat_rectangle_normal_is_unit_z() {
        let polygon = flat_polygon(0.0, 0, 0);
        let normal = polygon.normal();
        assert!(normal.z.abs() > 0.999);
        assert!(normal.x.abs() < 1e-4 && normal.y.abs() < 1e-4);
    }

    #[test]
    fn coplanar_polygons_route_by_paint_order() {
        let plane = flat_polygon(0.0, 0, 0);
        let later = flat_polygon(0.0, 0, 1);
        let result = plane.split_another(later);
        assert!(result.is_coplanar);
        assert!(result.front.is_some());
        assert!(result.back.is_none());

        let earlier = Box::new(DrawPolygon3D::new(
            test_image(10, 10),
            Matrix3D::identity(),
            0,
            0,
            1.0,
            true,
        ));
        let plane = flat_polygon(0.0, 0, 1);
        let result = plane.split_another(earlier);
        assert!(result.is_coplanar);
        assert!(result.back.is_some());
    }

    #[test]
    fn straddling_polygon_splits_into_two_fragments() {
        // Plane x = 5 (polygon rotated to be vertical), target flat at z crossing it.
        let plane = Box::new(DrawPolygon3D::new(
            test_image(10, 10),
            Matrix3D::concat(
                &Matrix3D::make_translate(5.0, 0.0, -5.0),
                &Matrix3D::make_rotate_y(90.0),
            ),
            0,
            0,
            1.0,
            true,
        ));
        let target = flat_polygon(0.0, 0, 1);
        let result = plane.split_another(target);
        assert!(!result.is_coplanar);
        let front = result.front.unwrap();
        let back = result.back.unwrap();
        assert!(front.is_split() && back.is_split());
        assert!(front.points().len() >= 3);
        assert!(back.points().len() >= 3);
        // The fragments together cover the original x range.
        let max_front: f32 =
            front.points().iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let min_back: f32 = back.points().iter().map(|p| p.x).fold(f32::MAX, f32::min);
        assert!((max_front - min_back).abs() < 0.1 || (min_back - max_front).abs() < 0.1);
    }

    #[test]
    fn fan_decomposition_counts() {
        let polygon = flat_polygon(0.0, 0, 0);
        assert_eq!(polygon.to_quads().len(), 1);

        // A vertical plane over the diagonal x + y = 5 slices one corner off the flat
        // square: a triangle on one side, a pentagon on the other.
        let sqrt_half = std::f32::consts::FRAC_1_SQRT_2;
        let diagonal = Matrix3D::from_rows([
            [sqrt_half, 0.0, 0.0, 2.5],
            [-sqrt_half, 0.0, 0.0, 2.5],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let plane =
            Box::new(DrawPolygon3D::new(test_image(10, 10), diagonal, 0, 0, 1.0, true));
        let target = flat_polygon(0.0, 0, 1);
        let result = plane.split_another(target);
        let fragments = [result.front.unwrap(), result.back.unwrap()];
        let mut sizes: Vec<usize> = fragments.iter().map(|f| f.points().len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 5]);
        for fragment in &fragments {
            let n = fragment.points().len();
            assert_eq!(fragment.to_quads().len(), (n - 2).div_ceil(2));
        }
    }
}
