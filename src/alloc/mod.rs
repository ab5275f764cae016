//! Region-based placement allocation for short-lived geometry objects.

mod block;
mod placement;

pub use block::{AllocatorReference, BlockAllocator, BlockData};
pub use placement::{PlacementArray, PlacementCell};
