//! Structured per-object outcomes and the few hard failures.
//!
//! Recoverable trouble never aborts a rebuild: the offending object is
//! skipped and recorded here, so callers and tests assert on outcomes
//! instead of scraping the log stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Hard failures. Everything else degrades to a skip or a warning.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("replay address space exhausted (requested {requested} bytes)")]
    ReplaySpaceExhausted { requested: u64 },
    #[error("rebuild cancelled")]
    Cancelled,
}

/// Why an object (or its content) was not fully reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Recreated by the swapchain pass, not the image pass.
    SwapchainImage,
    /// A referenced object no longer exists in the rebuilt state.
    MissingDependency {
        dependency: &'static str,
        handle: u64,
    },
    /// No queue on the owning device to run reconstruction work on.
    NoQueueAvailable,
    /// A recorded sub-command references a dead handle; recording stopped.
    NotRecordable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectResult {
    Created,
    Skipped(SkipReason),
}

#[derive(Clone, Debug)]
pub struct ObjectOutcome {
    pub category: &'static str,
    pub handle: u64,
    pub result: ObjectResult,
}

/// Advisory conditions: reconstruction continued, possibly imperfectly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advisory {
    /// Dedicated allocation metadata present on only one side of the
    /// memory/resource pair.
    MissingDedicatedMetadata {
        kind: &'static str,
        handle: u64,
    },
    /// Content priming ran on an arbitrary same-device queue because the
    /// resource was never bound to one.
    PrimedOnArbitraryQueue { image: u64 },
    /// Multisampled content cannot be copied; only the layout was restored.
    MultisampledContentSkipped { image: u64 },
    /// Target layout is undefined, so content is left undefined too.
    UndefinedLayoutContentSkipped { image: u64 },
    /// No host-visible memory type qualified; scratch memory fell back to
    /// type index 0.
    NoHostVisibleMemoryType { device: u64 },
    /// A descriptor element referenced a dead handle and was dropped.
    DescriptorElementDropped {
        set: u64,
        binding: u32,
        element: u32,
    },
    /// A synthesized call failed to apply to the simulated state; it was
    /// still emitted.
    MutationFailed {
        command_index: usize,
        message: String,
    },
    /// Pipeline base-handle cycle (or unknown base); bases not honored.
    PipelineBaseCycle { pipelines: Vec<u64> },
}

/// Aggregated result of one rebuild.
#[derive(Clone, Debug, Default)]
pub struct RebuildReport {
    pub outcomes: Vec<ObjectOutcome>,
    pub advisories: Vec<Advisory>,
}

impl RebuildReport {
    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result == ObjectResult::Created)
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, ObjectResult::Skipped(_)))
    }
}

/// Cooperative cancellation for a rebuild in flight. Cancelling aborts the
/// whole rebuild with no guarantee of a consistent partial result.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
