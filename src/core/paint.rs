use std::sync::Arc;

use crate::core::Image;
use crate::geom::{Color, Matrix, Point};

/// Porter-Duff and separable blend modes, in source paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    Clear,
    Src,
    Dst,
    #[default]
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcATop,
    DstATop,
    Xor,
    PlusLighter,
    PlusDarker,
    Modulate,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// How a shader samples outside its natural domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
    Decal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientType {
    Linear,
    Radial,
    Conic,
}

/// Gradient geometry and stops shared by the three gradient kinds.
///
/// `points` carries start/end for linear gradients, center (twice) for radial, and the
/// two circle centers for conic; `radiuses` is used by radial (index 0) and conic.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientInfo {
    pub colors: Vec<Color>,
    pub positions: Vec<f32>,
    pub points: [Point; 2],
    pub radiuses: [f32; 2],
    pub tile_mode: TileMode,
}

impl GradientInfo {
    pub fn linear(start: Point, end: Point, colors: Vec<Color>, positions: Vec<f32>) -> Self {
        GradientInfo {
            colors,
            positions,
            points: [start, end],
            radiuses: [0.0, 0.0],
            tile_mode: TileMode::Clamp,
        }
    }

    pub fn radial(center: Point, radius: f32, colors: Vec<Color>, positions: Vec<f32>) -> Self {
        GradientInfo {
            colors,
            positions,
            points: [center, center],
            radiuses: [radius, 0.0],
            tile_mode: TileMode::Clamp,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.colors.iter().any(|color| color.alpha < 1.0)
    }
}

/// The closed set of paint sources the exporter understands.
#[derive(Clone)]
pub enum Shader {
    Color(Color),
    Gradient(GradientType, GradientInfo),
    Image {
        image: Arc<dyn Image>,
        tile_x: TileMode,
        tile_y: TileMode,
    },
    /// A shader viewed through an extra local matrix.
    Matrix {
        source: Arc<Shader>,
        matrix: Matrix,
    },
    /// A shader post-processed by a color filter.
    ColorFilter {
        source: Arc<Shader>,
        filter: ColorFilter,
    },
}

impl Shader {
    pub fn as_color(&self) -> Option<Color> {
        match self {
            Shader::Color(color) => Some(*color),
            _ => None,
        }
    }

    pub fn with_matrix(self: Arc<Self>, matrix: Matrix) -> Arc<Shader> {
        Arc::new(Shader::Matrix { source: self, matrix })
    }

    pub fn with_color_filter(self: Arc<Self>, filter: ColorFilter) -> Arc<Shader> {
        Arc::new(Shader::ColorFilter { source: self, filter })
    }
}

/// A 4x5 color matrix filter (row-major, the fifth column is the bias).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFilter {
    pub matrix: [f32; 20],
}

impl ColorFilter {
    pub fn apply(&self, color: Color) -> Color {
        let m = &self.matrix;
        let input = [color.red, color.green, color.blue, color.alpha];
        let mut out = [0.0f32; 4];
        for (row, value) in out.iter_mut().enumerate() {
            let base = row * 5;
            *value = m[base] * input[0]
                + m[base + 1] * input[1]
                + m[base + 2] * input[2]
                + m[base + 3] * input[3]
                + m[base + 4];
        }
        Color::new(
            out[0].clamp(0.0, 1.0),
            out[1].clamp(0.0, 1.0),
            out[2].clamp(0.0, 1.0),
            out[3].clamp(0.0, 1.0),
        )
    }
}

/// A mask applied to a draw; only shader-backed masks exist.
#[derive(Clone)]
pub struct MaskFilter {
    pub shader: Arc<Shader>,
}

/// Filters applied to a whole layer before it lands on the destination.
#[derive(Clone)]
pub enum LayerFilter {
    DropShadow {
        dx: f32,
        dy: f32,
        blur_x: f32,
        blur_y: f32,
        color: Color,
        shadow_only: bool,
    },
    InnerShadow {
        dx: f32,
        dy: f32,
        blur_x: f32,
        blur_y: f32,
        color: Color,
    },
    Blur {
        blur_x: f32,
        blur_y: f32,
    },
}

/// Everything that describes how geometry is painted.
#[derive(Clone, Default)]
pub struct Fill {
    pub color: Color,
    pub blend_mode: BlendMode,
    pub shader: Option<Arc<Shader>>,
    pub mask_filter: Option<MaskFilter>,
    pub color_filter: Option<ColorFilter>,
}

impl Fill {
    pub fn from_color(color: Color) -> Self {
        Fill { color, ..Fill::default() }
    }

    pub fn is_opaque(&self) -> bool {
        self.color.is_opaque() && self.shader.is_none() && self.mask_filter.is_none()
    }
}
