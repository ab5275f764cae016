use crate::geom::{Point, Rect};

/// A rectangle with a single x/y corner radius shared by all four corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RRect {
    pub rect: Rect,
    pub radii: Point,
}

impl RRect {
    pub fn new(rect: Rect, radius_x: f32, radius_y: f32) -> Self {
        let mut rrect = RRect { rect, radii: Point::new(radius_x, radius_y) };
        rrect.clamp_radii();
        rrect
    }

    /// An rrect with zero radii is just a rect.
    pub fn from_rect(rect: Rect) -> Self {
        RRect { rect, radii: Point::zero() }
    }

    pub fn is_rect(&self) -> bool {
        self.radii.x <= 0.0 || self.radii.y <= 0.0
    }

    /// True when the radii make the rrect an axis-aligned oval.
    pub fn is_oval(&self) -> bool {
        self.radii.x >= self.rect.width() * 0.5 && self.radii.y >= self.rect.height() * 0.5
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.rect.scale(sx, sy);
        self.radii.x *= sx;
        self.radii.y *= sy;
    }

    fn clamp_radii(&mut self) {
        self.radii.x = self.radii.x.max(0.0).min(self.rect.width() * 0.5);
        self.radii.y = self.radii.y.max(0.0).min(self.rect.height() * 0.5);
    }
}
