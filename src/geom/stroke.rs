/// How stroked corners are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// How stroked endpoints are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Stroke parameters. A non-positive width requests a hairline, which the vertex
/// generators resolve to one device pixel using the view matrix scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub join: LineJoin,
    pub cap: LineCap,
    pub miter_limit: f32,
}

impl Default for Stroke {
    fn default() -> Self {
        Stroke { width: 1.0, join: LineJoin::Miter, cap: LineCap::Butt, miter_limit: 4.0 }
    }
}

impl Stroke {
    pub fn new(width: f32) -> Self {
        Stroke { width, ..Stroke::default() }
    }

    pub fn with_join(width: f32, join: LineJoin) -> Self {
        Stroke { width, join, ..Stroke::default() }
    }
}
