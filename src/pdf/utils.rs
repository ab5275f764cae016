//! Shared emission helpers: number formatting, content-stream operators and path
//! serialization.

use crate::core::{BlendMode, Path, PathFillType, PathVerb};
use crate::geom::{Matrix, Point, Rect};
use crate::pdf::object::{PdfArray, PdfDictionary};
use crate::pdf::resources::{write_resource_name, ResourceType};
use crate::stream::WriteStream;

pub const HEX_UPPER: [u8; 16] = *b"0123456789ABCDEF";
pub const HEX_LOWER: [u8; 16] = *b"0123456789abcdef";

/// Writes `.nnn`-style permil decimals, trimming trailing zeros.
fn print_permil_as_decimal(mut value: i32, places: usize, out: &mut Vec<u8>) {
    let start = out.len();
    out.push(b'.');
    out.resize(start + places + 1, b'0');
    for i in (1..=places).rev() {
        out[start + i] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    while out.len() > start + 2 && *out.last().unwrap() == b'0' {
        out.pop();
    }
}

/// Formats a u8 color component as a decimal in [0, 1] with 3 significant places.
pub fn color_to_decimal_u8(value: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    if value == 255 || value == 0 {
        out.push(if value != 0 { b'1' } else { b'0' });
        return out;
    }
    let permil = ((1000.0 / 255.0) * f64::from(value)).round() as i32;
    print_permil_as_decimal(permil, 3, &mut out);
    out
}

/// Formats an f32 color component clamped to [0, 1] with 4 significant places.
pub fn color_to_decimal_f32(value: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    let factor = 10_000i32;
    let scaled = (f64::from(value) * f64::from(factor)).round() as i64;
    if scaled >= i64::from(factor) || scaled <= 0 {
        out.push(if scaled > 0 { b'1' } else { b'0' });
        return out;
    }
    print_permil_as_decimal(scaled as i32, 4, &mut out);
    out
}

pub fn append_color_component_u8(value: u8, stream: &mut dyn WriteStream) {
    stream.write(&color_to_decimal_u8(value));
}

pub fn append_color_component_f32(value: f32, stream: &mut dyn WriteStream) {
    stream.write(&color_to_decimal_f32(value));
}

/// Writes a float with a locale-independent fixed decimal form: infinities clamp to
/// the f32 range and NaN becomes 0.
pub fn append_float(value: f32, stream: &mut dyn WriteStream) {
    let mut value = value;
    if value == f32::INFINITY {
        value = f32::MAX;
    }
    if value == f32::NEG_INFINITY {
        value = -f32::MAX;
    }
    if !value.is_finite() {
        stream.write_text("0");
        return;
    }
    let mut formatted = format!("{value:.6}");
    if formatted.contains('.') {
        while formatted.ends_with('0') {
            formatted.pop();
        }
        if formatted.ends_with('.') {
            formatted.pop();
        }
    }
    stream.write_text(&formatted);
}

pub fn rect_to_array(rect: &Rect) -> PdfArray {
    let mut array = PdfArray::new();
    array.append_float(rect.left);
    array.append_float(rect.top);
    array.append_float(rect.right);
    array.append_float(rect.bottom);
    array
}

fn matrix_to_pdf_affine(matrix: &Matrix) -> [f32; 6] {
    [
        matrix.scale_x(),
        matrix.skew_y(),
        matrix.skew_x(),
        matrix.scale_y(),
        matrix.trans_x(),
        matrix.trans_y(),
    ]
}

pub fn matrix_to_array(matrix: &Matrix) -> PdfArray {
    let mut array = PdfArray::new();
    for value in matrix_to_pdf_affine(matrix) {
        array.append_float(value);
    }
    array
}

/// Emits `a b c d e f cm`.
pub fn append_transform(matrix: &Matrix, stream: &mut dyn WriteStream) {
    for value in matrix_to_pdf_affine(matrix) {
        append_float(value, stream);
        stream.write_text(" ");
    }
    stream.write_text("cm\n");
}

/// Emits `x y w h re`.
pub fn append_rectangle(rect: &Rect, stream: &mut dyn WriteStream) {
    let bottom = rect.bottom.min(rect.top);
    append_float(rect.left, stream);
    stream.write_text(" ");
    append_float(bottom, stream);
    stream.write_text(" ");
    append_float(rect.width(), stream);
    stream.write_text(" ");
    append_float(rect.height(), stream);
    stream.write_text(" re\n");
}

pub fn apply_graphic_state(index: i32, stream: &mut dyn WriteStream) {
    write_resource_name(stream, ResourceType::ExtGState, index);
    stream.write_text(" gs\n");
}

/// Selects the Pattern color space and sets the pattern as the current color.
pub fn apply_pattern(index: i32, stream: &mut dyn WriteStream) {
    stream.write_text("/Pattern CS/Pattern cs");
    write_resource_name(stream, ResourceType::Pattern, index);
    stream.write_text(" SCN");
    write_resource_name(stream, ResourceType::Pattern, index);
    stream.write_text(" scn\n");
}

fn move_to(point: Point, stream: &mut dyn WriteStream) {
    append_float(point.x, stream);
    stream.write_text(" ");
    append_float(point.y, stream);
    stream.write_text(" m\n");
}

fn append_line(point: Point, stream: &mut dyn WriteStream) {
    append_float(point.x, stream);
    stream.write_text(" ");
    append_float(point.y, stream);
    stream.write_text(" l\n");
}

fn append_cubic(control1: Point, control2: Point, end: Point, stream: &mut dyn WriteStream) {
    append_float(control1.x, stream);
    stream.write_text(" ");
    append_float(control1.y, stream);
    stream.write_text(" ");
    let mut command = "y\n";
    if control2 != end {
        command = "c\n";
        append_float(control2.x, stream);
        stream.write_text(" ");
        append_float(control2.y, stream);
        stream.write_text(" ");
    }
    append_float(end.x, stream);
    stream.write_text(" ");
    append_float(end.y, stream);
    stream.write_text(" ");
    stream.write_text(command);
}

fn quad_to_cubic(points: &[Point; 4]) -> [Point; 4] {
    let scale = 2.0 / 3.0;
    [
        points[0],
        points[0] + (points[1] - points[0]) * scale,
        points[2] + (points[1] - points[2]) * scale,
        points[2],
    ]
}

fn all_points_equal(points: &[Point]) -> bool {
    points.iter().all(|point| *point == points[0])
}

/// Serializes a path as `m`/`l`/`c`/`re` content operators. Rect-shaped closed paths
/// use the `re` fast path.
pub fn emit_path(path: &Path, consume_degenerates: bool, stream: &mut dyn WriteStream) {
    if path.is_empty() {
        append_rectangle(&Rect::empty(), stream);
        return;
    }
    if let Some((rect, reversed)) = path.as_rect() {
        if !reversed || path.fill_type() == PathFillType::EvenOdd {
            append_rectangle(&rect, stream);
            return;
        }
    }
    path.decompose(|verb, points| match verb {
        PathVerb::Move => move_to(points[0], stream),
        PathVerb::Line => {
            if !consume_degenerates || !all_points_equal(&points[0..2]) {
                append_line(points[1], stream);
            }
        }
        PathVerb::Quad => {
            if !consume_degenerates || !all_points_equal(&points[0..3]) {
                let cubic = quad_to_cubic(points);
                append_cubic(cubic[1], cubic[2], cubic[3], stream);
            }
        }
        PathVerb::Cubic => {
            if !consume_degenerates || !all_points_equal(&points[0..4]) {
                append_cubic(points[1], points[2], points[3], stream);
            }
        }
        PathVerb::Close => {
            stream.write_text("h\n");
        }
    });
}

/// Emits the fill operator for the given winding rule.
pub fn paint_path(fill_type: PathFillType, stream: &mut dyn WriteStream) {
    stream.write_text("f");
    if fill_type == PathFillType::EvenOdd {
        stream.write_text("*");
    }
    stream.write_text("\n");
}

/// The PDF blend-mode name, or None for Porter-Duff modes PDF cannot express.
/// See PDF32000 section 11.3.5 "Blend Mode".
pub fn blend_mode_name(mode: BlendMode) -> Option<&'static str> {
    match mode {
        // Xor / PlusLighter / PlusDarker are unsupported and draw as Normal.
        BlendMode::SrcOver
        | BlendMode::Xor
        | BlendMode::PlusLighter
        | BlendMode::PlusDarker => Some("Normal"),
        BlendMode::Screen => Some("Screen"),
        BlendMode::Overlay => Some("Overlay"),
        BlendMode::Darken => Some("Darken"),
        BlendMode::Lighten => Some("Lighten"),
        BlendMode::ColorDodge => Some("ColorDodge"),
        BlendMode::ColorBurn => Some("ColorBurn"),
        BlendMode::HardLight => Some("HardLight"),
        BlendMode::SoftLight => Some("SoftLight"),
        BlendMode::Difference => Some("Difference"),
        BlendMode::Exclusion => Some("Exclusion"),
        BlendMode::Multiply => Some("Multiply"),
        BlendMode::Hue => Some("Hue"),
        BlendMode::Saturation => Some("Saturation"),
        BlendMode::Color => Some("Color"),
        BlendMode::Luminosity => Some("Luminosity"),
        _ => None,
    }
}

/// Maps `bounds` through the inverse of `matrix`. Returns None for singular input.
pub fn inverse_transform_bbox(matrix: &Matrix, bounds: &Rect) -> Option<Rect> {
    let inverse = matrix.invert()?;
    Some(inverse.map_rect(bounds))
}

/// Fills in the tiling-pattern keys on `pattern`.
pub fn populate_tiling_pattern_dict(
    pattern: &mut PdfDictionary, bounds: &Rect, resources: PdfDictionary, matrix: &Matrix,
) {
    const TILING_PATTERN_TYPE: i32 = 1;
    const COLORED_TILING_PAINT_TYPE: i32 = 1;
    const CONSTANT_SPACING_TILING_TYPE: i32 = 1;
    pattern.insert_name("Type", "Pattern");
    pattern.insert_int("PatternType", TILING_PATTERN_TYPE);
    pattern.insert_int("PaintType", COLORED_TILING_PAINT_TYPE);
    pattern.insert_int("TilingType", CONSTANT_SPACING_TILING_TYPE);
    pattern.insert_object("BBox", rect_to_array(bounds));
    pattern.insert_float("XStep", bounds.width());
    pattern.insert_float("YStep", bounds.height());
    pattern.insert_object("Resources", resources);
    if !matrix.is_identity() {
        pattern.insert_object("Matrix", matrix_to_array(matrix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryWriteStream;

    fn as_text(stream: MemoryWriteStream) -> String {
        String::from_utf8(stream.read_data()).unwrap()
    }

    #[test]
    fn color_decimals() {
        assert_eq!(color_to_decimal_u8(0), b"0");
        assert_eq!(color_to_decimal_u8(255), b"1");
        assert_eq!(color_to_decimal_u8(128), b".502");
        assert_eq!(color_to_decimal_f32(0.5), b".5");
        assert_eq!(color_to_decimal_f32(1.5), b"1");
        assert_eq!(color_to_decimal_f32(-0.25), b"0");
    }

    #[test]
    fn rect_operator() {
        let mut stream = MemoryWriteStream::new();
        append_rectangle(&Rect::new(1.0, 2.0, 5.0, 6.0), &mut stream);
        assert_eq!(as_text(stream), "1 2 4 4 re\n");
    }

    #[test]
    fn path_rect_fast_path() {
        let mut path = Path::new();
        path.add_rect(&Rect::new(0.0, 0.0, 10.0, 20.0));
        let mut stream = MemoryWriteStream::new();
        emit_path(&path, false, &mut stream);
        assert_eq!(as_text(stream), "0 0 10 20 re\n");
    }

    #[test]
    fn path_curves() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0);
        path.quad_to(3.0, 0.0, 3.0, 3.0);
        path.close();
        let mut stream = MemoryWriteStream::new();
        emit_path(&path, false, &mut stream);
        let text = as_text(stream);
        assert!(text.starts_with("0 0 m\n"));
        assert!(text.contains(" c\n") || text.contains(" y\n"));
        assert!(text.ends_with("h\n"));
    }
}
