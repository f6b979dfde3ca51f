//! Captured object-graph snapshot model.
//!
//! A [`Snapshot`] is the read-only record of every live API object at one
//! trace point: per-category handle-indexed tables, each object carrying its
//! immutable creation parameters plus last-known dynamic state. The rebuild
//! engine walks these tables to synthesize the creation calls that recreate
//! equivalent state in a fresh context.
//!
//! Objects reference each other by handle, never by owning pointer, so
//! cyclic or dangling references in a degenerate capture are representable
//! and cheap to detect.

mod format;
mod handle;
mod memory;
mod objects;
mod recorded;
mod snapshot;
mod types;

pub use format::{level_size, mip_dim, ByteSizeAndExtent, ElementAndTexelBlockSize, Format};
pub use handle::*;
pub use memory::{AddressSpaceLayout, MemoryData};
pub use objects::*;
pub use recorded::{
    BufferBarrier, BufferCopy, BufferImageCopy, ImageBarrier, ImageCopy, RecordedCommand,
};
pub use snapshot::{CaptureId, Snapshot};
pub use types::*;
