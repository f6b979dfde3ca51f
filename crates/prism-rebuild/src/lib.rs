//! Rebuild engine: turns a captured object-graph [`Snapshot`] into the
//! ordered sequence of synthetic API calls that recreates equivalent
//! GPU-visible state in a fresh context, together with the exact host byte
//! ranges each call reads and writes.
//!
//! The engine is single-threaded and synchronous for one rebuild; see
//! [`resolve::InitialCommands`] for the memoizing layer callers go through.
//!
//! [`Snapshot`]: prism_capture::Snapshot

mod builder;
mod call;
mod mutate;
mod new_state;
mod orchestrator;
mod pipelines;
mod primer;
mod report;
mod resolve;
mod sparse;
mod wire;

pub use builder::{scratch_alloc_size, StateBuilder};
pub use call::{
    Call, Command, DescriptorWrite, GraphicsPipelineCreateInfo, QueueCreateInfo, SparseBindInfo,
    SparseBufferBindInfo, SparseImageBind, SparseImageBindInfo, SparseImageOpaqueBindInfo,
    StageInfo, SwapchainCreateInfo,
};
pub use mutate::MutateError;
pub use new_state::{AllocResult, HandleAllocator, NewState, ReplayAllocator};
pub use orchestrator::{rebuild_state, Rebuild, RebuildOptions};
pub use pipelines::pipelines_in_order;
pub use report::{
    Advisory, CancelToken, ObjectOutcome, ObjectResult, RebuildError, RebuildReport, SkipReason,
};
pub use resolve::InitialCommands;
pub use sparse::is_fully_bound;
