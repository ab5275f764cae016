use std::sync::Arc;

use crate::alloc::{AllocatorReference, BlockAllocator, PlacementArray, PlacementCell};
use crate::geom::math::{FLOAT_NEARLY_ZERO, FLOAT_SQRT2};
use crate::geom::{packed_vertex_color, Color, LineJoin, Matrix, Point, Rect, Stroke};
use crate::gpu::provider::{VertexProvider, VertexWriter};
use crate::gpu::quad::{AAType, Quad};

/// Geometry record for one rectangle draw.
pub struct RectRecord {
    pub rect: Rect,
    pub view_matrix: Matrix,
    pub color: Color,
}

impl RectRecord {
    pub fn new(rect: Rect, view_matrix: Matrix) -> Self {
        RectRecord { rect, view_matrix, color: Color::WHITE }
    }

    pub fn with_color(rect: Rect, view_matrix: Matrix, color: Color) -> Self {
        RectRecord { rect, view_matrix, color }
    }
}

/// How UV rects are converted into the shader's subset channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UvSubsetMode {
    #[default]
    None,
    /// Inset the subset by half a texel.
    SubsetOnly,
    /// Round the subset out to integer texels first, then inset.
    RoundOutAndSubset,
}

/// Provides vertices for drawing batches of rectangles, antialiased or not, filled or
/// stroked.
pub struct RectsVertexProvider {
    rects: PlacementArray<RectRecord>,
    uv_rects: PlacementArray<Rect>,
    strokes: PlacementArray<Stroke>,
    aa_type: AAType,
    has_uv: bool,
    has_color: bool,
    subset_mode: UvSubsetMode,
    line_join: Option<LineJoin>,
    _reference: Arc<AllocatorReference>,
}

impl RectsVertexProvider {
    /// Creates a provider for a single untransformed rect.
    pub fn make_from_rect(
        allocator: &BlockAllocator, rect: Rect, aa_type: AAType,
    ) -> Option<PlacementCell<VertexProvider>> {
        if rect.is_empty() {
            return None;
        }
        let record = allocator.make(RectRecord::new(rect, Matrix::identity()));
        Self::make_from(allocator, vec![record], Vec::new(), aa_type, false, UvSubsetMode::None,
            Vec::new())
    }

    /// Creates a provider from a list of rect records, with optional per-rect UV rects
    /// and strokes. Returns None for an empty list.
    pub fn make_from(
        allocator: &BlockAllocator, rects: Vec<PlacementCell<RectRecord>>,
        uv_rects: Vec<PlacementCell<Rect>>, aa_type: AAType, need_uv: bool,
        subset_mode: UvSubsetMode, strokes: Vec<PlacementCell<Stroke>>,
    ) -> Option<PlacementCell<VertexProvider>> {
        if rects.is_empty() {
            return None;
        }
        // Colors become a per-vertex channel only when the records disagree.
        let mut has_color = false;
        if rects.len() > 1 {
            let first_color = rects[0].color;
            has_color = rects.iter().any(|record| record.color != first_color);
        }
        let line_join = strokes.first().map(|stroke| stroke.join);
        let provider = RectsVertexProvider {
            rects: allocator.make_array_from(rects),
            uv_rects: allocator.make_array_from(uv_rects),
            strokes: allocator.make_array_from(strokes),
            aa_type,
            has_uv: need_uv,
            has_color,
            subset_mode,
            line_join,
            _reference: allocator.add_reference(),
        };
        let cell = allocator.make(VertexProvider::Rects(provider));
        (!cell.is_empty()).then_some(cell)
    }

    pub fn rect_count(&self) -> usize {
        self.rects.len()
    }

    pub fn aa_type(&self) -> AAType {
        self.aa_type
    }

    pub fn has_uv(&self) -> bool {
        self.has_uv
    }

    pub fn has_color(&self) -> bool {
        self.has_color
    }

    pub fn has_subset(&self) -> bool {
        self.subset_mode != UvSubsetMode::None
    }

    pub fn line_join(&self) -> Option<LineJoin> {
        self.line_join
    }

    pub fn first_rect(&self) -> Rect {
        self.rects[0].rect
    }

    pub fn first_matrix(&self) -> Matrix {
        self.rects[0].view_matrix
    }

    /// The shared color when colors are uniform across records.
    pub fn first_color(&self) -> Color {
        self.rects[0].color
    }

    pub fn vertex_count(&self) -> usize {
        let rects = self.rects.len();
        match self.kind() {
            Kind::NonAa => rects * 4 * self.per_vertex_floats(2),
            Kind::Aa => rects * 2 * 4 * self.per_vertex_floats(3),
            Kind::AngularStroke => {
                let per_vertex = if self.line_join == Some(LineJoin::Miter) { 8 } else { 12 };
                let per_vertex = if self.aa_type == AAType::Coverage {
                    per_vertex * 2
                } else {
                    per_vertex
                };
                let base = if self.aa_type == AAType::Coverage { 3 } else { 2 };
                rects * per_vertex * self.per_vertex_floats(base)
            }
            Kind::RoundStroke => {
                if self.aa_type == AAType::Coverage {
                    // x, y, coverage, ellipse offsets (2), reciprocal radii (2)
                    rects * 24 * self.per_vertex_floats(7)
                } else {
                    // x, y, ellipse offsets (2)
                    rects * 20 * self.per_vertex_floats(4)
                }
            }
        }
    }

    pub fn get_vertices(&self, out: &mut [f32]) {
        let mut writer = VertexWriter::new(out);
        match self.kind() {
            Kind::NonAa => self.write_non_aa(&mut writer),
            Kind::Aa => self.write_aa(&mut writer),
            Kind::AngularStroke => {
                if self.aa_type == AAType::Coverage {
                    self.write_aa_angular_stroke(&mut writer);
                } else {
                    self.write_non_aa_angular_stroke(&mut writer);
                }
            }
            Kind::RoundStroke => {
                if self.aa_type == AAType::Coverage {
                    self.write_aa_round_stroke(&mut writer);
                } else {
                    self.write_non_aa_round_stroke(&mut writer);
                }
            }
        }
    }

    fn kind(&self) -> Kind {
        if !self.strokes.is_empty() {
            if self.line_join == Some(LineJoin::Round) {
                Kind::RoundStroke
            } else {
                Kind::AngularStroke
            }
        } else if self.aa_type == AAType::Coverage {
            Kind::Aa
        } else {
            Kind::NonAa
        }
    }

    fn per_vertex_floats(&self, base: usize) -> usize {
        let mut count = base;
        if self.has_uv {
            count += 2;
        }
        if self.has_color {
            count += 1;
        }
        if self.has_subset() {
            count += 4;
        }
        count
    }

    fn record_color(&self, record: &RectRecord) -> f32 {
        packed_vertex_color(record.color)
    }

    fn apply_subset_mode(&self, rect: &mut Rect) {
        match self.subset_mode {
            UvSubsetMode::None => {}
            UvSubsetMode::SubsetOnly => rect.inset(0.5, 0.5),
            UvSubsetMode::RoundOutAndSubset => {
                rect.round_out();
                rect.inset(0.5, 0.5);
            }
        }
    }

    fn write_non_aa(&self, writer: &mut VertexWriter) {
        let has_uv_rects = !self.uv_rects.is_empty();
        for i in 0..self.rects.len() {
            let record = &*self.rects[i];
            let color = self.has_color.then(|| self.record_color(record));
            let quad = Quad::from_rect(&record.rect, Some(&record.view_matrix));
            let uv_rect = if has_uv_rects { *self.uv_rects[i] } else { record.rect };
            let uv_quad = Quad::from_rect(&uv_rect, None);
            let mut subset = uv_rect;
            if self.has_subset() {
                self.apply_subset_mode(&mut subset);
            }
            // Reverse order matches the triangle-strip winding the renderer indexes.
            for j in (0..4).rev() {
                let point = quad.point(j);
                writer.push(point.x);
                writer.push(point.y);
                if self.has_uv {
                    let uv = uv_quad.point(j);
                    writer.push(uv.x);
                    writer.push(uv.y);
                }
                if let Some(color) = color {
                    writer.push(color);
                }
                if self.has_subset() {
                    writer.push_subset(&subset);
                }
            }
        }
    }

    fn write_aa(&self, writer: &mut VertexWriter) {
        let has_uv_rects = !self.uv_rects.is_empty();
        for i in 0..self.rects.len() {
            let record = &*self.rects[i];
            let view_matrix = &record.view_matrix;
            let rect = record.rect;
            let color = self.has_color.then(|| self.record_color(record));

            let scale = (view_matrix.scale_x() * view_matrix.scale_x()
                + view_matrix.skew_y() * view_matrix.skew_y())
            .sqrt();
            // The coverage ramp edge sits half a pixel off the original line.
            let padding = 0.5 / scale;
            let inset_bounds = rect.make_inset(padding, padding);
            let inset_quad = Quad::from_rect(&inset_bounds, Some(view_matrix));
            let outset_bounds = rect.make_outset(padding, padding);
            let outset_quad = Quad::from_rect(&outset_bounds, Some(view_matrix));

            let (mut inset_uv, mut outset_uv, mut subset) = (inset_bounds, outset_bounds, rect);
            if has_uv_rects {
                let uv_rect = *self.uv_rects[i];
                inset_uv = uv_rect.make_inset(padding, padding);
                outset_uv = uv_rect.make_outset(padding, padding);
                subset = uv_rect;
            }
            if self.has_subset() {
                self.apply_subset_mode(&mut subset);
            }
            let uv_inset_quad = Quad::from_rect(&inset_uv, None);
            let uv_outset_quad = Quad::from_rect(&outset_uv, None);

            for j in 0..2 {
                let (quad, uv_quad, coverage) = if j == 0 {
                    (&inset_quad, &uv_inset_quad, 1.0)
                } else {
                    (&outset_quad, &uv_outset_quad, 0.0)
                };
                for k in 0..4 {
                    let point = quad.point(k);
                    writer.push(point.x);
                    writer.push(point.y);
                    writer.push(coverage);
                    if self.has_uv {
                        let uv = uv_quad.point(k);
                        writer.push(uv.x);
                        writer.push(uv.y);
                    }
                    if let Some(color) = color {
                        writer.push(color);
                    }
                    if self.has_subset() {
                        writer.push_subset(&subset);
                    }
                }
            }
        }
    }

    fn write_stroke_quad(
        &self, writer: &mut VertexWriter, quad: &Quad, uv_quad: &Quad, color: Option<f32>,
        coverage: Option<f32>,
    ) {
        for i in 0..4 {
            let point = quad.point(i);
            writer.push(point.x);
            writer.push(point.y);
            if let Some(coverage) = coverage {
                writer.push(coverage);
            }
            if self.has_uv {
                let uv = uv_quad.point(i);
                writer.push(uv.x);
                writer.push(uv.y);
            }
            if let Some(color) = color {
                writer.push(color);
            }
        }
    }

    fn write_aa_angular_stroke(&self, writer: &mut VertexWriter) {
        let is_bevel = self.line_join == Some(LineJoin::Bevel);
        for i in 0..self.rects.len() {
            let stroke = &*self.strokes[i];
            let record = &*self.rects[i];
            let view_matrix = &record.view_matrix;
            let scale = (view_matrix.scale_x() * view_matrix.scale_x()
                + view_matrix.skew_y() * view_matrix.skew_y())
            .sqrt();
            let padding = 0.5 / scale;
            let stroke_width = if stroke.width > 0.0 { stroke.width } else { 1.0 / scale };
            let half_width = stroke_width * 0.5;
            let rect = record.rect;
            let mut out_side = rect.make_outset(half_width, half_width);
            let mut out_side_assist = rect;
            let mut in_side = rect.make_inset(half_width, half_width);
            let color = self.has_color.then(|| self.record_color(record));

            let mut out_uv = out_side;
            let mut in_uv = in_side;
            let mut assist_uv = out_side_assist;
            let mut v_offset = 0.0f32;
            if self.has_uv {
                let uv_rect = *self.uv_rects[i];
                let u_offset = half_width / rect.width() * uv_rect.width();
                v_offset = half_width / rect.height() * uv_rect.height();
                out_uv = uv_rect.make_outset(u_offset, v_offset);
                in_uv = uv_rect.make_inset(u_offset, v_offset);
                assist_uv = uv_rect;
            }

            // A stroke wider than the rect collapses the inner rect to the centerline
            // so the interior is not hit twice.
            let is_degenerate = in_side.is_empty();
            if is_degenerate {
                in_side.left = rect.center_x();
                in_side.right = rect.center_x();
                in_side.top = rect.center_y();
                in_side.bottom = rect.center_y();
                if self.has_uv {
                    let uv_rect = *self.uv_rects[i];
                    in_uv.left = uv_rect.center_x();
                    in_uv.right = uv_rect.center_x();
                    in_uv.top = uv_rect.center_y();
                    in_uv.bottom = uv_rect.center_y();
                }
            }
            // Bevel joins draw the octagonal outer contour from two overlapping boxes:
            // the main box narrowed vertically plus an assist box widened vertically.
            if is_bevel {
                out_side.inset(0.0, half_width);
                out_side_assist.outset(0.0, half_width);
                if self.has_uv {
                    out_uv.inset(0.0, v_offset);
                    assist_uv.outset(0.0, v_offset);
                }
            }

            let inset = padding.min(half_width);
            let mut inner_coverage = 1.0f32;
            if inset < padding {
                // Subpixel stroke: narrow the coverage instead of the geometry.
                inner_coverage = 2.0 * inset / (inset + padding);
            }
            let outset = 2.0 * padding - inset;
            let outer_coverage = 0.0f32;
            let interior_outset = outset;
            let interior_coverage = outer_coverage;

            let empty_uv = Quad::from_rect(&Rect::empty(), None);
            let uv = |rect: &Rect| Quad::from_rect(rect, None);

            let out_outset_quad =
                Quad::from_rect(&out_side.make_outset(outset, outset), Some(view_matrix));
            let uv_quad = if self.has_uv {
                uv(&out_uv.make_outset(outset, outset))
            } else {
                empty_uv
            };
            self.write_stroke_quad(writer, &out_outset_quad, &uv_quad, color, Some(outer_coverage));
            if is_bevel {
                let assist = Quad::from_rect(
                    &out_side_assist.make_outset(outset, outset),
                    Some(view_matrix),
                );
                let uv_quad = if self.has_uv {
                    uv(&assist_uv.make_outset(outset, outset))
                } else {
                    empty_uv
                };
                self.write_stroke_quad(writer, &assist, &uv_quad, color, Some(outer_coverage));
            }
            let out_inset_quad =
                Quad::from_rect(&out_side.make_inset(inset, inset), Some(view_matrix));
            let uv_quad = if self.has_uv {
                uv(&out_uv.make_inset(inset, inset))
            } else {
                empty_uv
            };
            self.write_stroke_quad(writer, &out_inset_quad, &uv_quad, color, Some(inner_coverage));
            if is_bevel {
                let assist = Quad::from_rect(
                    &out_side_assist.make_inset(inset, inset),
                    Some(view_matrix),
                );
                let uv_quad = if self.has_uv {
                    uv(&assist_uv.make_inset(inset, inset))
                } else {
                    empty_uv
                };
                self.write_stroke_quad(writer, &assist, &uv_quad, color, Some(inner_coverage));
            }
            if !is_degenerate {
                let inner_inset_quad =
                    Quad::from_rect(&in_side.make_outset(inset, inset), Some(view_matrix));
                let uv_quad = if self.has_uv {
                    uv(&in_uv.make_outset(inset, inset))
                } else {
                    empty_uv
                };
                self.write_stroke_quad(
                    writer, &inner_inset_quad, &uv_quad, color, Some(inner_coverage),
                );
                let mut interior_boundary = in_side.make_inset(interior_outset, interior_outset);
                if interior_boundary.left > interior_boundary.right {
                    let center = interior_boundary.center_x();
                    interior_boundary.left = center;
                    interior_boundary.right = center;
                }
                if interior_boundary.top > interior_boundary.bottom {
                    let center = interior_boundary.center_y();
                    interior_boundary.top = center;
                    interior_boundary.bottom = center;
                }
                let inner_aa_quad = Quad::from_rect(&interior_boundary, Some(view_matrix));
                let uv_quad = if self.has_uv {
                    let mut uv_boundary = in_uv.make_inset(interior_outset, interior_outset);
                    if uv_boundary.is_empty() {
                        let (cx, cy) = (in_uv.center_x(), in_uv.center_y());
                        uv_boundary = Rect::new(cx, cy, cx, cy);
                    }
                    uv(&uv_boundary)
                } else {
                    empty_uv
                };
                self.write_stroke_quad(
                    writer, &inner_aa_quad, &uv_quad, color, Some(interior_coverage),
                );
            } else {
                // Degenerate interior: smoosh both inner quads onto the centerline.
                let inner_quad = Quad::from_rect(&in_side, Some(view_matrix));
                let uv_quad = if self.has_uv { uv(&in_uv) } else { empty_uv };
                self.write_stroke_quad(writer, &inner_quad, &uv_quad, color, Some(inner_coverage));
                self.write_stroke_quad(writer, &inner_quad, &uv_quad, color, Some(inner_coverage));
            }
        }
    }

    fn write_non_aa_angular_stroke(&self, writer: &mut VertexWriter) {
        let is_bevel = self.line_join == Some(LineJoin::Bevel);
        for i in 0..self.rects.len() {
            let stroke = &*self.strokes[i];
            let record = &*self.rects[i];
            let view_matrix = &record.view_matrix;
            let mut stroke_width = stroke.width;
            if stroke_width <= 0.0 {
                let scale = (view_matrix.scale_x() * view_matrix.scale_x()
                    + view_matrix.skew_y() * view_matrix.skew_y())
                .sqrt();
                stroke_width = 1.0 / scale;
            }
            let half_width = stroke_width * 0.5;
            let rect = record.rect;
            let mut out_side = rect.make_outset(half_width, half_width);
            let mut out_side_assist = rect;
            let mut in_side = rect.make_inset(half_width, half_width);
            let color = self.has_color.then(|| self.record_color(record));

            let mut out_uv = out_side;
            let mut in_uv = in_side;
            let mut assist_uv = out_side_assist;
            let mut v_offset = 0.0f32;
            if self.has_uv {
                let uv_rect = *self.uv_rects[i];
                let u_offset = half_width / rect.width() * uv_rect.width();
                v_offset = half_width / rect.height() * uv_rect.height();
                out_uv = uv_rect.make_outset(u_offset, v_offset);
                in_uv = uv_rect.make_inset(u_offset, v_offset);
                assist_uv = uv_rect;
            }
            if in_side.is_empty() {
                in_side.left = rect.center_x();
                in_side.right = rect.center_x();
                in_side.top = rect.center_y();
                in_side.bottom = rect.center_y();
                if self.has_uv {
                    let uv_rect = *self.uv_rects[i];
                    in_uv.left = uv_rect.center_x();
                    in_uv.right = uv_rect.center_x();
                    in_uv.top = uv_rect.center_y();
                    in_uv.bottom = uv_rect.center_y();
                }
            }
            if is_bevel {
                out_side.inset(0.0, half_width);
                out_side_assist.outset(0.0, half_width);
                if self.has_uv {
                    out_uv.inset(0.0, v_offset);
                    assist_uv.outset(0.0, v_offset);
                }
            }

            let empty_uv = Quad::from_rect(&Rect::empty(), None);
            let out_quad = Quad::from_rect(&out_side, Some(view_matrix));
            let uv_quad =
                if self.has_uv { Quad::from_rect(&out_uv, None) } else { empty_uv };
            self.write_stroke_quad(writer, &out_quad, &uv_quad, color, None);
            if is_bevel {
                let assist_quad = Quad::from_rect(&out_side_assist, Some(view_matrix));
                let uv_quad =
                    if self.has_uv { Quad::from_rect(&assist_uv, None) } else { empty_uv };
                self.write_stroke_quad(writer, &assist_quad, &uv_quad, color, None);
            }
            let in_quad = Quad::from_rect(&in_side, Some(view_matrix));
            let uv_quad = if self.has_uv { Quad::from_rect(&in_uv, None) } else { empty_uv };
            self.write_stroke_quad(writer, &in_quad, &uv_quad, color, None);
        }
    }

    fn write_aa_round_stroke(&self, writer: &mut VertexWriter) {
        for i in 0..self.rects.len() {
            let stroke = &*self.strokes[i];
            let record = &*self.rects[i];
            let mut view_matrix = record.view_matrix;
            let scales = view_matrix.axis_scales();
            let mut rect = record.rect;
            let color = self.has_color.then(|| self.record_color(record));
            rect.scale(scales.x, scales.y);
            view_matrix.pre_scale(1.0 / scales.x, 1.0 / scales.y);
            let stroke_size = if stroke.width > 0.0 {
                Point::new(scales.x * stroke.width, scales.y * stroke.width)
            } else {
                Point::new(1.0, 1.0)
            };
            let x_radius = stroke_size.x * 0.5;
            let y_radius = stroke_size.y * 0.5;
            let reciprocal_radii = [1.0 / x_radius, 1.0 / y_radius];
            let aa_bloat = if self.aa_type == AAType::Msaa { FLOAT_SQRT2 } else { 0.5 };
            let x_outer_radius = x_radius + aa_bloat;
            let y_outer_radius = y_radius + aa_bloat;
            let x_max_offset = x_outer_radius / x_radius;
            let y_max_offset = y_outer_radius / y_radius;
            let bounds = rect.make_outset(x_radius + aa_bloat, y_radius + aa_bloat);
            let y_coords = [
                bounds.top,
                bounds.top + y_outer_radius,
                bounds.bottom - y_outer_radius,
                bounds.bottom,
            ];
            // The shader uses inversesqrt(), so offsets cannot be exactly zero.
            let y_outer_offsets =
                [y_max_offset, FLOAT_NEARLY_ZERO, FLOAT_NEARLY_ZERO, y_max_offset];
            let x_outer_offsets =
                [x_max_offset, FLOAT_NEARLY_ZERO, FLOAT_NEARLY_ZERO, x_max_offset];

            let mut u_coords = [0.0f32; 4];
            let mut v_coords = [0.0f32; 4];
            let mut u_step = 0.0f32;
            let mut v_step = 0.0f32;
            if self.has_uv {
                let uv_rect = *self.uv_rects[i];
                u_step = stroke.width * 0.5 / record.rect.width() * uv_rect.width();
                v_step = stroke.width * 0.5 / record.rect.height() * uv_rect.height();
                u_coords =
                    [uv_rect.left - u_step, uv_rect.left, uv_rect.right, uv_rect.right + u_step];
                v_coords =
                    [uv_rect.top - v_step, uv_rect.top, uv_rect.bottom, uv_rect.bottom + v_step];
            }

            // Round corner mesh: 4 rows x 4 columns.
            for j in 0..4 {
                let mut points = [
                    Point::new(bounds.left, y_coords[j]),
                    Point::new(bounds.left + x_radius, y_coords[j]),
                    Point::new(bounds.right - x_radius, y_coords[j]),
                    Point::new(bounds.right, y_coords[j]),
                ];
                view_matrix.map_points(&mut points);
                for (k, point) in points.iter().enumerate() {
                    writer.push(point.x);
                    writer.push(point.y);
                    writer.push(1.0);
                    writer.push(x_outer_offsets[j]);
                    writer.push(y_outer_offsets[k]);
                    writer.push(reciprocal_radii[0]);
                    writer.push(reciprocal_radii[1]);
                    if self.has_uv {
                        writer.push(u_coords[j]);
                        writer.push(v_coords[k]);
                    }
                    if let Some(color) = color {
                        writer.push(color);
                    }
                }
            }

            // Inner antialiased stroke ring.
            let bounds = rect.make_inset(x_radius, y_radius);
            let is_degenerate = bounds.width().min(bounds.height()) <= 1.0;
            let padding = 0.5f32;
            let mut inset_bounds = bounds.make_inset(padding, padding);
            let outset_bounds = bounds.make_outset(padding, padding);
            let mut inset_uv = inset_bounds;
            let mut outset_uv = outset_bounds;
            if self.has_uv {
                let matrix = &record.view_matrix;
                let uv_padding = 1.0
                    / (matrix.scale_x() * matrix.scale_x() + matrix.skew_y() * matrix.skew_y())
                        .sqrt();
                let uv_rect = self.uv_rects[i].make_inset(u_step, v_step);
                inset_uv = uv_rect.make_inset(uv_padding, uv_padding);
                outset_uv = uv_rect.make_outset(uv_padding, uv_padding);
            }
            if is_degenerate {
                let (cx, cy) = (bounds.center_x(), bounds.center_y());
                inset_bounds = Rect::new(cx, cy, cx, cy);
                inset_uv.set_empty();
            }
            let inset_quad = Quad::from_rect(&inset_bounds, Some(&view_matrix));
            let outset_quad = Quad::from_rect(&outset_bounds, Some(&view_matrix));
            let uv_inset_quad = Quad::from_rect(&inset_uv, None);
            let uv_outset_quad = Quad::from_rect(&outset_uv, None);
            for j in 0..2 {
                let (quad, uv_quad, coverage) = if j == 0 {
                    (&outset_quad, &uv_outset_quad, 1.0)
                } else {
                    (&inset_quad, &uv_inset_quad, 0.0)
                };
                for k in 0..4 {
                    let point = quad.point(k);
                    writer.push(point.x);
                    writer.push(point.y);
                    writer.push(coverage);
                    writer.push(0.0);
                    writer.push(0.0);
                    writer.push(1.0);
                    writer.push(1.0);
                    if self.has_uv {
                        let uv = uv_quad.point(k);
                        writer.push(uv.x);
                        writer.push(uv.y);
                    }
                    if let Some(color) = color {
                        writer.push(color);
                    }
                }
            }
        }
    }

    fn write_non_aa_round_stroke(&self, writer: &mut VertexWriter) {
        for i in 0..self.rects.len() {
            let stroke = &*self.strokes[i];
            let record = &*self.rects[i];
            let mut view_matrix = record.view_matrix;
            let scales = view_matrix.axis_scales();
            let mut rect = record.rect;
            let color = self.has_color.then(|| self.record_color(record));
            rect.scale(scales.x, scales.y);
            view_matrix.pre_scale(1.0 / scales.x, 1.0 / scales.y);
            let stroke_size = if stroke.width > 0.0 {
                Point::new(scales.x * stroke.width, scales.y * stroke.width)
            } else {
                Point::new(1.0, 1.0)
            };
            let x_radius = stroke_size.x * 0.5;
            let y_radius = stroke_size.y * 0.5;
            let bounds = rect.make_outset(x_radius, y_radius);
            let y_coords =
                [bounds.top, bounds.top + y_radius, bounds.bottom - y_radius, bounds.bottom];
            let mut u_coords = [0.0f32; 4];
            let mut v_coords = [0.0f32; 4];
            let mut u_step = 0.0f32;
            let mut v_step = 0.0f32;
            if self.has_uv {
                let uv_rect = *self.uv_rects[i];
                u_step = stroke.width * 0.5 / record.rect.width() * uv_rect.width();
                v_step = stroke.width * 0.5 / record.rect.height() * uv_rect.height();
                u_coords =
                    [uv_rect.left - u_step, uv_rect.left, uv_rect.right, uv_rect.right + u_step];
                v_coords =
                    [uv_rect.top - v_step, uv_rect.top, uv_rect.bottom, uv_rect.bottom + v_step];
            }

            let radii = [1.0f32, 0.0, 0.0, 1.0];
            for j in 0..4 {
                let mut points = [
                    Point::new(bounds.left, y_coords[j]),
                    Point::new(bounds.left + x_radius, y_coords[j]),
                    Point::new(bounds.right - x_radius, y_coords[j]),
                    Point::new(bounds.right, y_coords[j]),
                ];
                view_matrix.map_points(&mut points);
                for (k, point) in points.iter().enumerate() {
                    writer.push(point.x);
                    writer.push(point.y);
                    writer.push(radii[j]);
                    writer.push(radii[k]);
                    if self.has_uv {
                        writer.push(u_coords[k]);
                        writer.push(v_coords[k]);
                    }
                    if let Some(color) = color {
                        writer.push(color);
                    }
                }
            }

            let mut in_bounds = rect.make_inset(x_radius, y_radius);
            let mut in_uv = in_bounds;
            if self.has_uv {
                in_uv = *self.uv_rects[i];
                in_uv.inset(u_step, v_step);
            }
            if in_bounds.is_empty() {
                let (cx, cy) = (rect.center_x(), rect.center_y());
                in_bounds = Rect::new(cx, cy, cx, cy);
                if self.has_uv {
                    let uv_rect = *self.uv_rects[i];
                    in_uv = Rect::new(
                        uv_rect.center_x(),
                        uv_rect.center_y(),
                        uv_rect.center_x(),
                        uv_rect.center_y(),
                    );
                }
            }
            let in_quad = Quad::from_rect(&in_bounds, Some(&view_matrix));
            let in_uv_quad = Quad::from_rect(&in_uv, None);
            for k in 0..4 {
                let point = in_quad.point(k);
                writer.push(point.x);
                writer.push(point.y);
                writer.push(0.0);
                writer.push(0.0);
                if self.has_uv {
                    let uv = in_uv_quad.point(k);
                    writer.push(uv.x);
                    writer.push(uv.y);
                }
                if let Some(color) = color {
                    writer.push(color);
                }
            }
        }
    }
}

#[derive(PartialEq, Eq)]
enum Kind {
    NonAa,
    Aa,
    AngularStroke,
    RoundStroke,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_vertices(cell: &PlacementCell<VertexProvider>) -> Vec<f32> {
        let provider = cell.get().unwrap();
        let mut out = vec![0.0f32; provider.vertex_count()];
        provider.get_vertices(&mut out);
        out
    }

    #[test]
    fn aa_rect_coverage_ramp() {
        let allocator = BlockAllocator::new();
        let cell = RectsVertexProvider::make_from_rect(
            &allocator,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            AAType::Coverage,
        )
        .unwrap();
        let vertices = provider_vertices(&cell);
        // 8 vertices, 3 floats each.
        assert_eq!(vertices.len(), 24);
        let coverages: Vec<f32> = vertices.chunks(3).map(|v| v[2]).collect();
        assert_eq!(coverages, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        // Inset bound (0.5, 0.5, 9.5, 9.5), outset (-0.5, -0.5, 10.5, 10.5).
        let inset: Vec<(f32, f32)> = vertices[..12].chunks(3).map(|v| (v[0], v[1])).collect();
        assert_eq!(inset, vec![(0.5, 0.5), (0.5, 9.5), (9.5, 0.5), (9.5, 9.5)]);
        let outset: Vec<(f32, f32)> = vertices[12..].chunks(3).map(|v| (v[0], v[1])).collect();
        assert_eq!(outset, vec![(-0.5, -0.5), (-0.5, 10.5), (10.5, -0.5), (10.5, 10.5)]);
    }

    #[test]
    fn non_aa_rect_reverse_order() {
        let allocator = BlockAllocator::new();
        let cell = RectsVertexProvider::make_from_rect(
            &allocator,
            Rect::new(0.0, 0.0, 4.0, 2.0),
            AAType::None,
        )
        .unwrap();
        let vertices = provider_vertices(&cell);
        assert_eq!(vertices.len(), 8);
        // Z-order reversed: RB, RT, LB, LT.
        assert_eq!(&vertices[0..2], &[4.0, 2.0]);
        assert_eq!(&vertices[2..4], &[4.0, 0.0]);
        assert_eq!(&vertices[4..6], &[0.0, 2.0]);
        assert_eq!(&vertices[6..8], &[0.0, 0.0]);
    }

    #[test]
    fn empty_rect_is_rejected() {
        let allocator = BlockAllocator::new();
        assert!(RectsVertexProvider::make_from_rect(
            &allocator,
            Rect::empty(),
            AAType::Coverage
        )
        .is_none());
    }

    #[test]
    fn miter_stroke_vertex_budget() {
        let allocator = BlockAllocator::new();
        let record =
            allocator.make(RectRecord::new(Rect::new(0.0, 0.0, 20.0, 20.0), Matrix::identity()));
        let stroke = allocator.make(Stroke::with_join(4.0, LineJoin::Miter));
        let cell = RectsVertexProvider::make_from(
            &allocator,
            vec![record],
            Vec::new(),
            AAType::Coverage,
            false,
            UvSubsetMode::None,
            vec![stroke],
        )
        .unwrap();
        let provider = cell.get().unwrap();
        // 16 vertices x (x, y, coverage).
        assert_eq!(provider.vertex_count(), 16 * 3);
        let vertices = provider_vertices(&cell);
        assert!(vertices.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn degenerate_stroke_collapses_inner_rect() {
        let allocator = BlockAllocator::new();
        let record =
            allocator.make(RectRecord::new(Rect::new(0.0, 0.0, 4.0, 4.0), Matrix::identity()));
        // Stroke wider than the rect: the inner rect must collapse to the center.
        let stroke = allocator.make(Stroke::with_join(10.0, LineJoin::Miter));
        let cell = RectsVertexProvider::make_from(
            &allocator,
            vec![record],
            Vec::new(),
            AAType::None,
            false,
            UvSubsetMode::None,
            vec![stroke],
        )
        .unwrap();
        let vertices = provider_vertices(&cell);
        // Last 4 vertices are the collapsed inner quad at the rect center.
        let inner = &vertices[vertices.len() - 8..];
        for pair in inner.chunks(2) {
            assert_eq!(pair, &[2.0, 2.0]);
        }
    }
}
