//! The freshly simulated target-side state a rebuild constructs against:
//! a replay address-space allocator seeded from the captured free list,
//! per-category live-handle sets, and one deterministic fresh-handle source.

use std::collections::{BTreeMap, BTreeSet};

use prism_capture::*;
use prism_interval::MemRange;

use crate::report::RebuildError;

/// First-fit allocator over the simulated replay address space.
///
/// Determinism matters more than packing here: allocations always come from
/// the lowest free range, and frees coalesce back in address order, so two
/// rebuilds of the same snapshot produce identical observation addresses.
#[derive(Clone, Debug)]
pub struct ReplayAllocator {
    // Sorted by base; pairwise disjoint.
    free: Vec<MemRange>,
}

const ALLOC_ALIGN: u64 = 8;

impl ReplayAllocator {
    pub fn new(free_ranges: &[MemRange]) -> Self {
        let mut free: Vec<MemRange> = free_ranges.iter().copied().filter(|r| !r.is_empty()).collect();
        free.sort_by_key(|r| r.base);
        Self { free }
    }

    /// Allocate `size` bytes at 8-byte alignment.
    pub fn alloc(&mut self, size: u64) -> Result<MemRange, RebuildError> {
        let size = size.max(1);
        for (i, r) in self.free.iter().enumerate() {
            let base = align_up(r.base, ALLOC_ALIGN);
            let pad = base - r.base;
            if r.size < pad || r.size - pad < size {
                continue;
            }
            let range = MemRange::new(base, size);
            let mut replacement = Vec::with_capacity(2);
            if pad > 0 {
                replacement.push(MemRange::new(r.base, pad));
            }
            let tail = r.size - pad - size;
            if tail > 0 {
                replacement.push(MemRange::new(base + size, tail));
            }
            self.free.splice(i..=i, replacement);
            return Ok(range);
        }
        Err(RebuildError::ReplaySpaceExhausted { requested: size })
    }

    /// Return `range` to the free list, merging with neighbours.
    pub fn free(&mut self, range: MemRange) {
        if range.is_empty() {
            return;
        }
        let i = self
            .free
            .partition_point(|r| r.base < range.base);
        let mut base = range.base;
        let mut end = range.end();
        let mut lo = i;
        let mut hi = i;
        if lo > 0 && self.free[lo - 1].end() == base {
            lo -= 1;
            base = self.free[lo].base;
        }
        if hi < self.free.len() && self.free[hi].base == end {
            end = self.free[hi].end();
            hi += 1;
        }
        self.free.splice(lo..hi, [MemRange::new(base, end - base)]);
    }
}

pub(crate) fn align_up(v: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (v + align - 1) & !(align - 1)
}

/// One allocation in the replay address space, owned by exactly one pending
/// command and freed right after that command is appended.
#[derive(Clone, Debug)]
pub struct AllocResult {
    pub range: MemRange,
}

impl AllocResult {
    pub fn ptr(&self) -> u64 {
        self.range.base
    }
}

/// Deterministic fresh-handle source: a monotonic counter seeded above the
/// maximum handle observed anywhere in the snapshot, double-checked against
/// the live sets before issue.
#[derive(Clone, Debug)]
pub struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub fn seeded_above(max_observed: u64) -> Self {
        Self {
            next: max_observed + 1,
        }
    }

    pub fn fresh(&mut self, state: &NewState) -> u64 {
        while state.handle_in_use(self.next) {
            self.next += 1;
        }
        let h = self.next;
        self.next += 1;
        h
    }
}

/// Live object sets and observation memory of the simulated target.
#[derive(Clone, Debug, Default)]
pub struct NewState {
    pub instances: BTreeSet<InstanceHandle>,
    pub physical_devices: BTreeSet<PhysicalDeviceHandle>,
    pub surfaces: BTreeSet<SurfaceHandle>,
    pub devices: BTreeSet<DeviceHandle>,
    pub queues: BTreeSet<QueueHandle>,
    pub swapchains: BTreeSet<SwapchainHandle>,
    pub device_memories: BTreeSet<DeviceMemoryHandle>,
    pub buffers: BTreeSet<BufferHandle>,
    pub images: BTreeSet<ImageHandle>,
    pub samplers: BTreeSet<SamplerHandle>,
    pub fences: BTreeSet<FenceHandle>,
    pub semaphores: BTreeSet<SemaphoreHandle>,
    pub events: BTreeSet<EventHandle>,
    pub command_pools: BTreeSet<CommandPoolHandle>,
    pub pipeline_caches: BTreeSet<PipelineCacheHandle>,
    pub descriptor_set_layouts: BTreeSet<DescriptorSetLayoutHandle>,
    pub pipeline_layouts: BTreeSet<PipelineLayoutHandle>,
    pub render_passes: BTreeSet<RenderPassHandle>,
    pub shader_modules: BTreeSet<ShaderModuleHandle>,
    pub pipelines: BTreeSet<PipelineHandle>,
    pub image_views: BTreeSet<ImageViewHandle>,
    pub buffer_views: BTreeSet<BufferViewHandle>,
    pub descriptor_pools: BTreeSet<DescriptorPoolHandle>,
    pub framebuffers: BTreeSet<FramebufferHandle>,
    pub descriptor_sets: BTreeSet<DescriptorSetHandle>,
    pub query_pools: BTreeSet<QueryPoolHandle>,
    pub command_buffers: BTreeSet<CommandBufferHandle>,

    /// Command buffers that are allocated from a given pool, so destroying
    /// the pool implicitly frees them.
    pub pool_buffers: BTreeMap<CommandPoolHandle, Vec<CommandBufferHandle>>,
    /// Descriptor sets allocated from a given pool, freed with the pool.
    pub pool_sets: BTreeMap<DescriptorPoolHandle, Vec<DescriptorSetHandle>>,
    /// Memory allocations currently host-mapped.
    pub mapped_memories: BTreeSet<DeviceMemoryHandle>,

    /// Observation payload bytes, keyed by base address.
    pub observation_bytes: BTreeMap<u64, Vec<u8>>,

    pub next_pool_id: u64,
}

impl NewState {
    pub fn seeded_from(layout: &AddressSpaceLayout) -> (Self, ReplayAllocator) {
        let state = NewState {
            next_pool_id: layout.next_pool_id,
            ..NewState::default()
        };
        (state, ReplayAllocator::new(&layout.free_ranges))
    }

    /// True if `raw` is live in any category.
    pub fn handle_in_use(&self, raw: u64) -> bool {
        self.instances.contains(&InstanceHandle(raw))
            || self.physical_devices.contains(&PhysicalDeviceHandle(raw))
            || self.surfaces.contains(&SurfaceHandle(raw))
            || self.devices.contains(&DeviceHandle(raw))
            || self.queues.contains(&QueueHandle(raw))
            || self.swapchains.contains(&SwapchainHandle(raw))
            || self.device_memories.contains(&DeviceMemoryHandle(raw))
            || self.buffers.contains(&BufferHandle(raw))
            || self.images.contains(&ImageHandle(raw))
            || self.samplers.contains(&SamplerHandle(raw))
            || self.fences.contains(&FenceHandle(raw))
            || self.semaphores.contains(&SemaphoreHandle(raw))
            || self.events.contains(&EventHandle(raw))
            || self.command_pools.contains(&CommandPoolHandle(raw))
            || self.pipeline_caches.contains(&PipelineCacheHandle(raw))
            || self
                .descriptor_set_layouts
                .contains(&DescriptorSetLayoutHandle(raw))
            || self.pipeline_layouts.contains(&PipelineLayoutHandle(raw))
            || self.render_passes.contains(&RenderPassHandle(raw))
            || self.shader_modules.contains(&ShaderModuleHandle(raw))
            || self.pipelines.contains(&PipelineHandle(raw))
            || self.image_views.contains(&ImageViewHandle(raw))
            || self.buffer_views.contains(&BufferViewHandle(raw))
            || self.descriptor_pools.contains(&DescriptorPoolHandle(raw))
            || self.framebuffers.contains(&FramebufferHandle(raw))
            || self.descriptor_sets.contains(&DescriptorSetHandle(raw))
            || self.query_pools.contains(&QueryPoolHandle(raw))
            || self.command_buffers.contains(&CommandBufferHandle(raw))
    }

    pub fn store_observation(&mut self, base: u64, bytes: Vec<u8>) {
        self.observation_bytes.insert(base, bytes);
    }

    pub fn drop_observation(&mut self, base: u64) {
        self.observation_bytes.remove(&base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_first_fit_and_aligned() {
        let mut a = ReplayAllocator::new(&[MemRange::new(0x1001, 0x1000)]);
        let r = a.alloc(16).unwrap();
        assert_eq!(r.base, 0x1008);
        let r2 = a.alloc(16).unwrap();
        assert_eq!(r2.base, 0x1018);
    }

    #[test]
    fn free_coalesces_with_neighbours() {
        let mut a = ReplayAllocator::new(&[MemRange::new(0x1000, 0x100)]);
        let r1 = a.alloc(0x40).unwrap();
        let r2 = a.alloc(0x40).unwrap();
        a.free(r1);
        a.free(r2);
        // Everything back in one span: a full-size alloc succeeds again.
        let r = a.alloc(0x100).unwrap();
        assert_eq!(r.base, 0x1000);
    }

    #[test]
    fn exhaustion_is_a_hard_error() {
        let mut a = ReplayAllocator::new(&[MemRange::new(0x1000, 0x10)]);
        assert!(a.alloc(0x40).is_err());
    }

    #[test]
    fn fresh_handles_skip_live_ones() {
        let mut state = NewState::default();
        state.buffers.insert(BufferHandle(101));
        let mut alloc = HandleAllocator::seeded_above(100);
        assert_eq!(alloc.fresh(&state), 102);
        assert_eq!(alloc.fresh(&state), 103);
    }
}
