//! GPU geometry generation: vertex providers that pack draw-op vertex buffers, the
//! quad primitive they share, and the async task plumbing that fills buffers on the
//! worker pool.

mod fill_rrects;
mod ops;
mod provider;
mod quad;
mod quads;
mod rects;
mod rrects;
mod vertex_task;

pub use fill_rrects::FillRRectsVertexProvider;
pub use ops::{Draw3DArgs, Quads3DDrawOp};
pub use provider::{VertexProvider, VertexWriter};
pub use quad::{AAType, Quad, QuadAAFlags, QuadRecord};
pub use quads::QuadsVertexProvider;
pub use rects::{RectRecord, RectsVertexProvider, UvSubsetMode};
pub use rrects::{RRectRecord, RRectsVertexProvider};
pub use vertex_task::AsyncVertexSource;
