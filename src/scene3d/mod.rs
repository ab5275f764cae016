//! Depth-correct compositing of 3D-transformed images via Binary Space Partitioning.

mod bsp;
mod compositor;
mod polygon;

pub use bsp::{BspNode, BspTree};
pub use compositor::Context3DCompositor;
pub use polygon::{draw_polygon_order, DrawPolygon3D, SplitResult};
