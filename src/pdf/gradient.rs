//! Gradient shaders as PDF shading patterns.
//!
//! Clamped gradients become Type 2 (axial) or Type 3 (radial) shadings over stitched
//! exponential interpolation functions. Repeat and mirror tile modes need a Type 4
//! PostScript function that folds the parameter into [0, 1] before the color lookup.
//! Gradients with per-stop alpha split into an opaque color shader under a luminosity
//! soft mask, combined through a tiling pattern.

use std::hash::{Hash, Hasher};

use siphasher::sip::SipHasher13;

use crate::core::{GradientInfo, GradientType, PathFillType, TileMode};
use crate::geom::{Color, Matrix, Point, Rect};
use crate::pdf::document::{DocumentCore, PdfStreamCompression};
use crate::pdf::form_xobject::make_form_xobject;
use crate::pdf::graphic_state::{smask_graphic_state, SMaskMode};
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary};
use crate::pdf::resources::make_resource_dictionary;
use crate::pdf::utils::{
    append_color_component_u8, append_float, append_rectangle, apply_graphic_state,
    apply_pattern, inverse_transform_bbox, matrix_to_array, paint_path,
    populate_tiling_pattern_dict, rect_to_array,
};
use crate::stream::{MemoryWriteStream, WriteStream};

/// Everything that identifies one emitted gradient pattern.
pub struct GradientKey {
    pub gradient_type: GradientType,
    pub info: GradientInfo,
    pub canvas_transform: Matrix,
    pub bbox: Rect,
}

impl GradientKey {
    fn hash_value(&self) -> u64 {
        let mut hasher = SipHasher13::new();
        (self.gradient_type as u8).hash(&mut hasher);
        for color in &self.info.colors {
            color.red.to_bits().hash(&mut hasher);
            color.green.to_bits().hash(&mut hasher);
            color.blue.to_bits().hash(&mut hasher);
            color.alpha.to_bits().hash(&mut hasher);
        }
        for position in &self.info.positions {
            position.to_bits().hash(&mut hasher);
        }
        for point in &self.info.points {
            point.x.to_bits().hash(&mut hasher);
            point.y.to_bits().hash(&mut hasher);
        }
        for radius in &self.info.radiuses {
            radius.to_bits().hash(&mut hasher);
        }
        (self.info.tile_mode as u8).hash(&mut hasher);
        for value in self.canvas_transform.get6() {
            value.to_bits().hash(&mut hasher);
        }
        for value in
            [self.bbox.left, self.bbox.top, self.bbox.right, self.bbox.bottom]
        {
            value.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    fn has_alpha(&self) -> bool {
        self.info.has_alpha()
    }

    fn as_opaque(&self) -> GradientKey {
        let mut info = self.info.clone();
        for color in &mut info.colors {
            color.alpha = 1.0;
        }
        GradientKey {
            gradient_type: self.gradient_type,
            info,
            canvas_transform: self.canvas_transform,
            bbox: self.bbox,
        }
    }
}

/// Returns the pattern object for a gradient, emitting and caching it on first use.
pub fn make_gradient_shader(core: &mut DocumentCore, key: GradientKey) -> Option<ObjectRef> {
    let hash = key.hash_value();
    if let Some(reference) = core.caches.shader_map.get(&hash) {
        return Some(*reference);
    }
    let reference = if key.has_alpha() {
        make_alpha_function_shader(core, &key)?
    } else {
        make_function_shader(core, &key)?
    };
    core.caches.shader_map.insert(hash, reference);
    Some(reference)
}

fn gradient_resource_dictionary(
    function_shader: Option<ObjectRef>, graphic_state: Option<ObjectRef>,
) -> PdfDictionary {
    let shaders: Vec<ObjectRef> = function_shader.into_iter().collect();
    let states: Vec<ObjectRef> = graphic_state.into_iter().collect();
    make_resource_dictionary(&states, &shaders, &[], &[])
}

/// Content that fills `bounds` with a pattern, optionally under a graphic state.
fn pattern_fill_content(
    graphic_state_index: Option<i32>, pattern_index: i32, bounds: &Rect,
) -> Vec<u8> {
    let mut content = MemoryWriteStream::new();
    if let Some(index) = graphic_state_index {
        apply_graphic_state(index, &mut content);
    }
    apply_pattern(pattern_index, &mut content);
    append_rectangle(bounds, &mut content);
    paint_path(PathFillType::EvenOdd, &mut content);
    content.read_data()
}

/// A luminosity soft-mask graphic state whose group paints the gradient's alpha
/// channel as gray.
fn create_smask_graphic_state(core: &mut DocumentCore, key: &GradientKey) -> Option<ObjectRef> {
    let mut luminosity = key.as_opaque();
    for (color, original) in
        luminosity.info.colors.iter_mut().zip(key.info.colors.iter())
    {
        // Encode the original alpha as gray.
        let alpha = original.alpha;
        *color = Color::new(alpha, alpha, alpha, 1.0);
    }
    let luminosity_shader = make_function_shader(core, &luminosity)?;
    let resources = gradient_resource_dictionary(Some(luminosity_shader), None);
    let content = pattern_fill_content(None, luminosity_shader.get(), &key.bbox);
    let alpha_mask = make_form_xobject(
        &mut core.writer,
        content,
        rect_to_array(&key.bbox),
        resources,
        &Matrix::identity(),
        Some("DeviceRGB"),
    );
    Some(smask_graphic_state(core, alpha_mask, false, SMaskMode::Luminosity))
}

/// A tiling pattern that paints the opaque color shader under the alpha soft mask.
fn make_alpha_function_shader(core: &mut DocumentCore, key: &GradientKey) -> Option<ObjectRef> {
    let opaque = key.as_opaque();
    let color_shader = make_function_shader(core, &opaque)?;
    let alpha_state = create_smask_graphic_state(core, key)?;
    let resources = gradient_resource_dictionary(Some(color_shader), Some(alpha_state));
    let content =
        pattern_fill_content(Some(alpha_state.get()), color_shader.get(), &key.bbox);
    let mut pattern = PdfDictionary::new();
    populate_tiling_pattern_dict(&mut pattern, &key.bbox, resources, &Matrix::identity());
    Some(core.writer.emit_stream_data(pattern, content, PdfStreamCompression::Yes))
}

/// An exponential (Type 2) interpolation between two colors.
fn interpolation_function(color1: Color, color2: Color) -> PdfDictionary {
    let mut function = PdfDictionary::new();
    let mut c0 = PdfArray::new();
    c0.append_color_component((color1.red * 255.0) as u8);
    c0.append_color_component((color1.green * 255.0) as u8);
    c0.append_color_component((color1.blue * 255.0) as u8);
    function.insert_object("C0", c0);
    let mut c1 = PdfArray::new();
    c1.append_color_component((color2.red * 255.0) as u8);
    c1.append_color_component((color2.green * 255.0) as u8);
    c1.append_color_component((color2.blue * 255.0) as u8);
    function.insert_object("C1", c1);
    function.insert_object("Domain", crate::pdf_array![0, 1]);
    function.insert_int("FunctionType", 2);
    function.insert_float("N", 1.0);
    function
}

/// The stitched (Type 3) function over all color stops. Stops are normalized first:
/// out-of-order offsets clamp forward, runs of three coincident stops lose their
/// middle, and remaining coincident pairs are nudged apart by 1e-5 to avoid stitch
/// artifacts.
fn gradient_stitch_function(info: &GradientInfo) -> PdfDictionary {
    let mut colors = info.colors.clone();
    let mut offsets = info.positions.clone();
    let mut i = 1;
    while i + 1 < colors.len() {
        offsets[i] = offsets[i].max(offsets[i - 1]);
        if offsets[i - 1] == offsets[i] && offsets[i] == offsets[i + 1] {
            colors.remove(i);
            offsets.remove(i);
        } else {
            i += 1;
        }
    }
    let count = colors.len();
    for i in 1..count.saturating_sub(1) {
        if offsets[i - 1] == offsets[i] {
            offsets[i] += 0.00001;
        }
    }
    if count >= 2 && offsets[count - 2] == offsets[count - 1] {
        offsets[count - 2] -= 0.00001;
    }

    if count == 2 {
        return interpolation_function(colors[0], colors[1]);
    }

    let mut function = PdfDictionary::new();
    function.insert_object("Domain", crate::pdf_array![0, 1]);
    function.insert_int("FunctionType", 3);
    let mut encode = PdfArray::new();
    let mut bounds = PdfArray::new();
    let mut functions = PdfArray::new();
    for index in 1..count {
        if index > 1 {
            bounds.append_float(offsets[index - 1]);
        }
        encode.append_float(0.0);
        encode.append_float(1.0);
        functions.append_object(interpolation_function(colors[index - 1], colors[index]));
    }
    function.insert_object("Encode", encode);
    function.insert_object("Bounds", bounds);
    function.insert_object("Functions", functions);
    function
}

/// Nudges touching circles apart so Type 3 radial shadings stay well-defined.
fn fix_up_radius(p1: Point, r1: &mut f32, p2: Point, r2: &mut f32) {
    let distance = Point::distance(p1, p2);
    let radii_difference = (*r1 - *r2).abs();
    if (distance - radii_difference).abs() < 0.002 {
        if *r1 > *r2 {
            *r1 += 0.002;
        } else {
            *r2 += 0.002;
        }
    }
}

/// A rotation+scale matrix mapping the unit segment onto `points`.
fn unit_to_points_matrix(points: [Point; 2]) -> Matrix {
    let mut vector = points[1] - points[0];
    let magnitude = vector.length();
    let inverse = if magnitude != 0.0 { 1.0 / magnitude } else { 0.0 };
    vector = vector * inverse;
    let mut matrix = Matrix::identity();
    matrix.set_sin_cos(vector.y, vector.x);
    matrix.pre_scale(magnitude, magnitude);
    matrix.post_translate(points[0].x, points[0].y);
    matrix
}

/// Writes PostScript that folds `t` into [0, 1] for the tile mode.
fn tile_mode_code(mode: TileMode, function: &mut dyn WriteStream) {
    match mode {
        TileMode::Repeat => {
            function.write_text("dup truncate sub\n"); // fractional part
            function.write_text("dup 0 le {1 add} if\n"); // map (-1,0) => (0,1)
        }
        TileMode::Mirror => {
            // Map t mod 2 into [0, 1, 1, 0]. `t 2 mod 1 eq` is written as
            // `t 2 mod 0 gt` to survive viewers whose `eq` aborts the function.
            function.write_text(
                "abs \
                 dup \
                 truncate \
                 dup \
                 cvi \
                 2 mod \
                 0 gt \
                 3 1 roll \
                 sub \
                 exch \
                 {1 exch sub} if\n",
            );
        }
        TileMode::Clamp | TileMode::Decal => {}
    }
}

fn append_color_byte(value: f32, stream: &mut dyn WriteStream) {
    append_color_component_u8((value * 255.0) as u8, stream);
}

/// Interpolates from `begin_color` to `end_color` over `range`, assuming
/// `t - range_start` is on the stack, leaving r g b behind.
fn interpolate_color_code(
    range: f32, begin_color: Color, end_color: Color, stream: &mut dyn WriteStream,
) {
    const COMPONENTS: usize = 3;
    let begin = [begin_color.red, begin_color.green, begin_color.blue];
    let end = [end_color.red, end_color.green, end_color.blue];
    let mut multiplier = [0.0f32; COMPONENTS];
    for i in 0..COMPONENTS {
        multiplier[i] = (end[i] - begin[i]) / range;
    }
    // Track which components still need a copy of t on the stack.
    let mut dup_input = [false; COMPONENTS];
    for i in (0..COMPONENTS - 1).rev() {
        dup_input[i] = dup_input[i + 1] || multiplier[i + 1] != 0.0;
    }
    if !dup_input[0] && multiplier[0] == 0.0 {
        stream.write_text("pop ");
    }
    for i in 0..COMPONENTS {
        if dup_input[i] && multiplier[i] != 0.0 {
            stream.write_text("dup ");
        }
        if multiplier[i] == 0.0 {
            append_color_byte(begin[i], stream);
            stream.write_text(" ");
        } else {
            if multiplier[i] != 1.0 {
                append_float(multiplier[i], stream);
                stream.write_text(" mul ");
            }
            if (begin[i] * 255.0) as u8 != 0 {
                append_color_byte(begin[i], stream);
                stream.write_text(" add ");
            }
        }
        if dup_input[i] {
            stream.write_text("exch ");
        }
    }
}

/// Binary-searches the stop ranges, emitting nested `le`/`ifelse` checks.
fn write_gradient_ranges(
    info: &GradientInfo, range_ends: &[usize], top: bool, first: bool,
    stream: &mut dyn WriteStream,
) {
    debug_assert!(!range_ends.is_empty());
    let range_end_index = range_ends[range_ends.len() - 1];
    let range_end = info.positions[range_end_index];
    if top {
        debug_assert!(first);
        // t == 0 marks "already answered" below, so test 0 < t <= end.
        stream.write_text("dup dup 0 gt exch ");
        append_float(range_end, stream);
        stream.write_text(" le and {\n");
    } else if first {
        stream.write_text("dup ");
        append_float(range_end, stream);
        stream.write_text(" le {\n");
    } else {
        stream.write_text("{\n");
    }
    if range_ends.len() == 1 {
        let range_begin_index = range_end_index - 1;
        let range_begin = info.positions[range_begin_index];
        append_float(range_begin, stream);
        stream.write_text(" sub "); // consume t, leave t - range_begin
        interpolate_color_code(
            range_end - range_begin,
            info.colors[range_begin_index],
            info.colors[range_end_index],
            stream,
        );
        stream.write_text("\n");
    } else {
        let low_count = range_ends.len() / 2;
        write_gradient_ranges(info, &range_ends[..low_count], false, true, stream);
        write_gradient_ranges(info, &range_ends[low_count..], false, false, stream);
    }
    if top {
        // Leave a 0 marker for t so the final clamp is skipped.
        stream.write_text("0} if\n");
    } else if first {
        stream.write_text("}"); // the hi side follows
    } else {
        stream.write_text("} ifelse\n");
    }
}

/// Type 4 function body mapping t to a color, clamping at both ends.
fn gradient_function_code(info: &GradientInfo, stream: &mut dyn WriteStream) {
    // Any t <= 0 answers with the first color and flags the hit with a trailing 0.
    stream.write_text("dup 0 le {pop ");
    append_color_byte(info.colors[0].red, stream);
    stream.write_text(" ");
    append_color_byte(info.colors[0].green, stream);
    stream.write_text(" ");
    append_color_byte(info.colors[0].blue, stream);
    stream.write_text(" 0} if\n");

    // Skip ranges that are degenerate or visually constant on both sides.
    let nearly = |a: f32, b: f32| (a - b).abs() <= crate::geom::math::FLOAT_NEARLY_ZERO;
    let eq_ignoring_alpha = |a: Color, b: Color| {
        nearly(a.red, b.red) && nearly(a.green, b.green) && nearly(a.blue, b.blue)
    };
    let mut range_ends = Vec::with_capacity(info.colors.len());
    for i in 1..info.colors.len() {
        let constant_color_both_sides = eq_ignoring_alpha(info.colors[i - 1], info.colors[i])
            && i != info.colors.len() - 1
            && eq_ignoring_alpha(info.colors[i], info.colors[i + 1]);
        let degenerate_range = info.positions[i - 1] == info.positions[i];
        if !degenerate_range && !constant_color_both_sides {
            range_ends.push(i);
        }
    }
    write_gradient_ranges(info, &range_ends, true, true, stream);

    // Clamp past the last stop.
    stream.write_text("0 gt {");
    let last = *info.colors.last().unwrap();
    append_color_byte(last.red, stream);
    stream.write_text(" ");
    append_color_byte(last.green, stream);
    stream.write_text(" ");
    append_color_byte(last.blue, stream);
    stream.write_text("} if\n");
}

fn linear_code(info: &GradientInfo, function: &mut dyn WriteStream) {
    function.write_text("{");
    function.write_text("pop\n"); // ditch the y coordinate
    tile_mode_code(info.tile_mode, function);
    gradient_function_code(info, function);
    function.write_text("}");
}

fn radial_code(info: &GradientInfo, function: &mut dyn WriteStream) {
    function.write_text("{");
    // Distance from the origin.
    function.write_text("dup mul exch dup mul add sqrt\n");
    tile_mode_code(info.tile_mode, function);
    gradient_function_code(info, function);
    function.write_text("}");
}

/// Two-point conical code following the HTML canvas radial-gradient definition: the
/// largest root t with radius(t) > 0 wins; pixels outside the cone paint black.
fn two_point_conical_code(info: &GradientInfo, function: &mut dyn WriteStream) {
    let dx = info.points[1].x - info.points[0].x;
    let dy = info.points[1].y - info.points[0].y;
    let r0 = info.radiuses[0];
    let dr = info.radiuses[1] - info.radiuses[0];
    let a = dx * dx + dy * dy - dr * dr;

    function.write_text("{");
    function.write_text("2 copy ");

    // b = -2 * (y*dy + x*dx + r0*dr), keep b^2 too.
    append_float(dy, function);
    function.write_text(" mul exch ");
    append_float(dx, function);
    function.write_text(" mul add ");
    append_float(r0 * dr, function);
    function.write_text(" add -2 mul dup dup mul\n");

    // c = x^2 + y^2 - r0^2
    function.write_text("4 2 roll dup mul exch dup mul add ");
    append_float(r0 * r0, function);
    function.write_text(" sub dup 4 1 roll\n");

    if a == 0.0 {
        // Collapses to the linear case t = -c/b.
        function.write_text("pop pop div neg dup ");
        append_float(dr, function);
        function.write_text(" mul ");
        append_float(r0, function);
        function.write_text(" add\n");
        function.write_text("0 lt {pop false} {true} ifelse\n");
    } else {
        // Quadratic: discriminant = b^2 - 4ac.
        append_float(a * 4.0, function);
        function.write_text(" mul sub dup\n");
        function.write_text("0 ge {\n");
        // q = -0.5 * (b +/- sqrt(d))
        function.write_text("sqrt exch dup 0 lt {exch -1 mul} if");
        function.write_text(" add -0.5 mul dup\n");
        append_float(a, function);
        function.write_text(" div\n"); // root1 = q / a
        function.write_text("3 1 roll div\n"); // root2 = c / q
        function.write_text("2 copy gt {exch} if\n"); // larger root on top
        function.write_text("dup ");
        append_float(dr, function);
        function.write_text(" mul ");
        append_float(r0, function);
        function.write_text(" add\n");
        function.write_text(" 0 gt {exch pop true}\n");
        function.write_text("{pop dup\n");
        append_float(dr, function);
        function.write_text(" mul ");
        append_float(r0, function);
        function.write_text(" add\n");
        function.write_text("0 le {pop false} {true} ifelse\n");
        function.write_text("} ifelse\n");
        function.write_text("} {pop pop pop false} ifelse\n");
    }

    function.write_text("{");
    tile_mode_code(info.tile_mode, function);
    gradient_function_code(info, function);
    function.write_text("} {0 0 0} ifelse }");
}

fn make_ps_function(
    core: &mut DocumentCore, code: Vec<u8>, domain: PdfArray, range: PdfArray,
) -> ObjectRef {
    let mut dictionary = PdfDictionary::new();
    dictionary.insert_int("FunctionType", 4);
    dictionary.insert_object("Domain", domain);
    dictionary.insert_object("Range", range);
    core.writer.emit_stream_data(dictionary, code, PdfStreamCompression::Yes)
}

/// Emits the shading pattern for an opaque gradient.
fn make_function_shader(core: &mut DocumentCore, key: &GradientKey) -> Option<ObjectRef> {
    let info = &key.info;
    let mut final_matrix = key.canvas_transform;
    let mut shading = PdfDictionary::new();
    // Clamped gradients stitch Type 2 functions; other tile modes fold t in
    // PostScript.
    let stitchable = info.tile_mode == TileMode::Clamp;

    let shading_type: i32;
    if stitchable {
        shading.insert_object("Function", gradient_stitch_function(info));
        shading.insert_object("Extend", crate::pdf_array![true, true]);
        let coords = match key.gradient_type {
            GradientType::Linear => {
                shading_type = 2; // axial
                let p1 = info.points[0];
                let p2 = info.points[1];
                crate::pdf_array![p1.x, p1.y, p2.x, p2.y]
            }
            GradientType::Radial => {
                shading_type = 3; // radial
                let center = info.points[0];
                crate::pdf_array![center.x, center.y, 0.0f32, center.x, center.y,
                    info.radiuses[0]]
            }
            GradientType::Conic => {
                shading_type = 3;
                let mut r1 = info.radiuses[0];
                let mut r2 = info.radiuses[1];
                let p1 = info.points[0];
                let p2 = info.points[1];
                fix_up_radius(p1, &mut r1, p2, &mut r2);
                crate::pdf_array![p1.x, p1.y, r1, p2.x, p2.y, r2]
            }
        };
        shading.insert_object("Coords", coords);
    } else {
        shading_type = 1; // function-based
        let mut transform_points = [info.points[0], info.points[1]];
        match key.gradient_type {
            GradientType::Linear => {}
            GradientType::Radial => {
                transform_points[1] = transform_points[0];
                transform_points[1].x += info.radiuses[0];
            }
            GradientType::Conic => {
                transform_points[1] = transform_points[0];
                transform_points[1].x += 1.0;
            }
        }
        // Fold the gradient's scale/rotation/translation into the pattern matrix so
        // the function runs over the unit segment.
        let mapper = unit_to_points_matrix(transform_points);
        final_matrix.pre_concat(&mapper);
        let bbox = inverse_transform_bbox(&final_matrix, &key.bbox)?;

        let mut code = MemoryWriteStream::new();
        match key.gradient_type {
            GradientType::Linear => linear_code(info, &mut code),
            GradientType::Radial => radial_code(info, &mut code),
            GradientType::Conic => {
                // The conical code references the points and radii directly, so they
                // must be pulled back through the mapper.
                let inverse_mapper = mapper.invert()?;
                let mut info_copy = info.clone();
                inverse_mapper.map_points(&mut info_copy.points);
                info_copy.radiuses[0] =
                    inverse_mapper.map_xy(info.radiuses[0], info.radiuses[0]).length().sqrt();
                info_copy.radiuses[1] =
                    inverse_mapper.map_xy(info.radiuses[1], info.radiuses[1]).length().sqrt();
                two_point_conical_code(&info_copy, &mut code);
            }
        }
        let domain = crate::pdf_array![bbox.left, bbox.right, bbox.top, bbox.bottom];
        shading.insert_object(
            "Domain",
            crate::pdf_array![bbox.left, bbox.right, bbox.top, bbox.bottom],
        );
        let range = crate::pdf_array![0, 1, 0, 1, 0, 1];
        let function_ref = make_ps_function(core, code.read_data(), domain, range);
        shading.insert_ref("Function", function_ref);
    }
    shading.insert_int("ShadingType", shading_type);
    let color_space = core.color_space_ref();
    shading.insert_ref("ColorSpace", color_space);

    let mut pattern = PdfDictionary::of_type("Pattern");
    pattern.insert_int("PatternType", 2);
    pattern.insert_object("Matrix", matrix_to_array(&final_matrix));
    pattern.insert_object("Shading", shading);
    Some(core.writer.emit_dictionary(&pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stitch_function_dedups_coincident_stops() {
        let info = GradientInfo {
            colors: vec![
                Color::new(1.0, 0.0, 0.0, 1.0),
                Color::new(0.0, 1.0, 0.0, 1.0),
                Color::new(0.0, 1.0, 0.0, 1.0),
                Color::new(0.0, 1.0, 0.0, 1.0),
                Color::new(0.0, 0.0, 1.0, 1.0),
            ],
            positions: vec![0.0, 0.5, 0.5, 0.5, 1.0],
            points: [Point::zero(), Point::new(1.0, 0.0)],
            radiuses: [0.0, 0.0],
            tile_mode: TileMode::Clamp,
        };
        let function = gradient_stitch_function(&info);
        let mut stream = MemoryWriteStream::new();
        function.emit(&mut stream);
        let text = String::from_utf8(stream.read_data()).unwrap();
        assert!(text.contains("/FunctionType 3"));
        // The middle coincident stop was removed: 3 sub-functions remain.
        assert_eq!(text.matches("/FunctionType 2").count(), 3);
    }

    #[test]
    fn two_stop_gradient_is_plain_exponential() {
        let info = GradientInfo::linear(
            Point::zero(),
            Point::new(1.0, 0.0),
            vec![Color::new(1.0, 0.0, 0.0, 1.0), Color::new(0.0, 0.0, 1.0, 1.0)],
            vec![0.0, 1.0],
        );
        let function = gradient_stitch_function(&info);
        let mut stream = MemoryWriteStream::new();
        function.emit(&mut stream);
        let text = String::from_utf8(stream.read_data()).unwrap();
        assert!(text.contains("/FunctionType 2"));
        assert!(text.contains("/C0 [1 0 0]"));
        assert!(text.contains("/C1 [0 0 1]"));
    }

    #[test]
    fn tile_mode_codes() {
        let mut stream = MemoryWriteStream::new();
        tile_mode_code(TileMode::Repeat, &mut stream);
        assert!(String::from_utf8(stream.read_data()).unwrap().contains("truncate sub"));
        let mut stream = MemoryWriteStream::new();
        tile_mode_code(TileMode::Mirror, &mut stream);
        assert!(String::from_utf8(stream.read_data()).unwrap().contains("2 mod"));
        let mut stream = MemoryWriteStream::new();
        tile_mode_code(TileMode::Clamp, &mut stream);
        assert!(stream.as_bytes().is_empty());
    }

    #[test]
    fn touching_circles_get_nudged() {
        let mut r1 = 1.0f32;
        let mut r2 = 3.0f32;
        fix_up_radius(Point::zero(), &mut r1, Point::new(2.0, 0.0), &mut r2);
        assert!(r2 > 3.0);
    }
}
