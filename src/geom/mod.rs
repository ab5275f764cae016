//! Geometry value types shared by the vertex generators, the 3D compositor and the PDF
//! exporter.

pub mod math;

mod color;
mod matrix;
mod matrix3d;
mod point;
mod rect;
mod rrect;
mod stroke;
mod vec;

pub use color::{packed_vertex_color, Color, PMColor};
pub use matrix::Matrix;
pub use matrix3d::Matrix3D;
pub use point::{ISize, Point};
pub use rect::Rect;
pub use rrect::RRect;
pub use stroke::{LineCap, LineJoin, Stroke};
pub use vec::{Mask4, Vec2, Vec3, Vec4};
