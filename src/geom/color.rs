/// An RGBA color with straight (unpremultiplied) f32 components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Color { red, green, blue, alpha }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    pub fn with_alpha(self, alpha: f32) -> Color {
        Color { alpha, ..self }
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    /// Scales the color components by alpha.
    pub fn premultiply(self) -> PMColor {
        PMColor {
            red: self.red * self.alpha,
            green: self.green * self.alpha,
            blue: self.blue * self.alpha,
            alpha: self.alpha,
        }
    }
}

/// An RGBA color with premultiplied components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PMColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl PMColor {
    pub const fn transparent() -> Self {
        PMColor { red: 0.0, green: 0.0, blue: 0.0, alpha: 0.0 }
    }

    /// Packs the color into 4 bytes (RGBA order) reinterpreted as one f32, the form the
    /// vertex layouts carry colors in.
    pub fn to_packed_float(self) -> f32 {
        let bytes = [
            (self.red * 255.0) as u8,
            (self.green * 255.0) as u8,
            (self.blue * 255.0) as u8,
            (self.alpha * 255.0) as u8,
        ];
        f32::from_le_bytes(bytes)
    }
}

/// Packs a straight color by premultiplying first; the common path for vertex writers.
pub fn packed_vertex_color(color: Color) -> f32 {
    color.premultiply().to_packed_float()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_bytes_order() {
        let packed = packed_vertex_color(Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(packed.to_le_bytes(), [255, 0, 0, 255]);
    }

    #[test]
    fn premultiply_scales() {
        let pm = Color::new(1.0, 0.5, 0.0, 0.5).premultiply();
        assert_eq!(pm.red, 0.5);
        assert_eq!(pm.green, 0.25);
        assert_eq!(pm.alpha, 0.5);
    }
}
