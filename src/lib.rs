//! `prism` reconstructs, from a captured snapshot of a GPU API's live object
//! graph, the minimal sequence of API calls that recreates equivalent
//! GPU-visible state in a fresh context.
//!
//! This is a facade over the workspace crates:
//! - [`prism_interval`] — coalescing byte-range bookkeeping.
//! - [`prism_capture`] — the captured object-graph snapshot model.
//! - [`prism_rebuild`] — the rebuild engine and its memoizing resolve layer.

pub use prism_capture as capture;
pub use prism_interval as interval;
pub use prism_rebuild as rebuild;

pub use prism_rebuild::{rebuild_state, Rebuild, RebuildError, RebuildOptions};
