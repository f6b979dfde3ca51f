//! The state builder: shared bookkeeping every creation routine threads
//! its work through.
//!
//! Allocation discipline: each pointer payload allocated for the command
//! being assembled sits in a pending read or write list. Appending the
//! command attaches the pending ranges as its observations, applies the
//! mutate step, frees every pending allocation, and clears the lists — so at
//! most one unreleased allocation set is outstanding at any time.

use prism_capture::*;
use prism_interval::{MemRange, RangeList};
use tracing::{debug, error, warn};

use crate::call::{Call, Command, QueueCreateInfo};
use crate::new_state::{AllocResult, HandleAllocator, NewState, ReplayAllocator};
use crate::report::{Advisory, ObjectOutcome, ObjectResult, RebuildError, RebuildReport, SkipReason};
use crate::wire::{bytes_of, Encode};

pub struct StateBuilder<'a> {
    snapshot: &'a Snapshot,
    pub(crate) new_state: NewState,
    allocator: ReplayAllocator,
    handles: HandleAllocator,
    cmds: Vec<Command>,
    read_memories: Vec<AllocResult>,
    write_memories: Vec<AllocResult>,
    memory_intervals: RangeList,
    pub(crate) report: RebuildReport,
}

impl<'a> StateBuilder<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let (new_state, allocator) = NewState::seeded_from(&snapshot.address_space);
        let handles = HandleAllocator::seeded_above(snapshot.max_observed_handle());
        Self {
            snapshot,
            new_state,
            allocator,
            handles,
            cmds: Vec::new(),
            read_memories: Vec::new(),
            write_memories: Vec::new(),
            memory_intervals: RangeList::new(),
            report: RebuildReport::default(),
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn new_state(&self) -> &NewState {
        &self.new_state
    }

    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    pub fn into_output(self) -> (Vec<Command>, RangeList, RebuildReport) {
        (self.cmds, self.memory_intervals, self.report)
    }

    pub fn pending_is_empty(&self) -> bool {
        self.read_memories.is_empty() && self.write_memories.is_empty()
    }

    /// A fresh handle value unused by both the snapshot and the new state.
    pub fn fresh_handle(&mut self) -> u64 {
        self.handles.fresh(&self.new_state)
    }

    // -- allocation helpers ------------------------------------------------

    /// Allocate and fill a standalone payload the caller frees explicitly
    /// (used when one payload spans several commands).
    pub fn alloc_data(&mut self, bytes: Vec<u8>) -> Result<AllocResult, RebuildError> {
        let range = self.allocator.alloc(bytes.len() as u64)?;
        self.memory_intervals.merge(range);
        self.new_state.store_observation(range.base, bytes);
        Ok(AllocResult { range })
    }

    pub fn free_data(&mut self, alloc: AllocResult) {
        self.allocator.free(alloc.range);
    }

    /// Stage `bytes` as a read observation of the command being assembled.
    pub fn alloc_read_data(&mut self, bytes: Vec<u8>) -> Result<u64, RebuildError> {
        let alloc = self.alloc_data(bytes)?;
        let ptr = alloc.ptr();
        self.read_memories.push(alloc);
        Ok(ptr)
    }

    pub fn alloc_read(&mut self, v: &impl Encode) -> Result<u64, RebuildError> {
        self.alloc_read_data(bytes_of(v))
    }

    pub fn alloc_read_slice<T: Encode>(&mut self, v: &[T]) -> Result<u64, RebuildError> {
        self.alloc_read_data(crate::wire::bytes_of_slice(v))
    }

    /// Stage the bytes the call is expected to produce as a write
    /// observation of the command being assembled.
    pub fn alloc_write(&mut self, v: &impl Encode) -> Result<u64, RebuildError> {
        let alloc = self.alloc_data(bytes_of(v))?;
        let ptr = alloc.ptr();
        self.write_memories.push(alloc);
        Ok(ptr)
    }

    pub fn alloc_write_slice<T: Encode>(&mut self, v: &[T]) -> Result<u64, RebuildError> {
        let alloc = self.alloc_data(crate::wire::bytes_of_slice(v))?;
        let ptr = alloc.ptr();
        self.write_memories.push(alloc);
        Ok(ptr)
    }

    // -- command emission --------------------------------------------------

    /// Append one command carrying every pending allocation, apply its
    /// mutate step, then release the pending set.
    pub fn write(&mut self, call: Call) {
        self.write_with(call, &[], &[]);
    }

    /// Like [`write`](Self::write), with extra observation ranges that are
    /// owned by the caller and not freed here.
    pub fn write_with(&mut self, call: Call, extra_reads: &[MemRange], extra_writes: &[MemRange]) {
        let mut reads: Vec<MemRange> = self.read_memories.iter().map(|a| a.range).collect();
        reads.extend_from_slice(extra_reads);
        let mut writes: Vec<MemRange> = self.write_memories.iter().map(|a| a.range).collect();
        writes.extend_from_slice(extra_writes);

        let cmd = Command { call, reads, writes };
        let index = self.cmds.len();
        match cmd.mutate(&mut self.new_state) {
            Ok(()) => debug!(index, call = cmd.call.name(), "initial cmd"),
            Err(err) => {
                // The real replay target may still accept the call, so it is
                // emitted regardless; only the simulation failure is kept.
                warn!(index, call = cmd.call.name(), %err, "initial cmd failed to mutate");
                self.report.advisories.push(Advisory::MutationFailed {
                    command_index: index,
                    message: err.to_string(),
                });
            }
        }
        self.cmds.push(cmd);

        for alloc in self.read_memories.drain(..).collect::<Vec<_>>() {
            self.allocator.free(alloc.range);
        }
        for alloc in self.write_memories.drain(..).collect::<Vec<_>>() {
            self.allocator.free(alloc.range);
        }
    }

    // -- report helpers ----------------------------------------------------

    pub fn record_created(&mut self, category: &'static str, handle: u64) {
        self.report.outcomes.push(ObjectOutcome {
            category,
            handle,
            result: ObjectResult::Created,
        });
    }

    pub fn record_skipped(&mut self, category: &'static str, handle: u64, reason: SkipReason) {
        warn!(category, handle, ?reason, "object skipped");
        self.report.outcomes.push(ObjectOutcome {
            category,
            handle,
            result: ObjectResult::Skipped(reason),
        });
    }

    pub fn advise(&mut self, advisory: Advisory) {
        self.report.advisories.push(advisory);
    }

    // -- queue selection ---------------------------------------------------

    /// The queue reconstruction work for a resource should run on: its last
    /// bound queue when there is one, else any device queue matching the
    /// resource's captured queue-family indices, else any queue on the
    /// device.
    pub fn queue_for(
        &self,
        last_bound: Option<QueueHandle>,
        device: DeviceHandle,
        family_indices: &[u32],
    ) -> Option<QueueObject> {
        if let Some(q) = last_bound {
            if let Some(obj) = self.snapshot.queues.get(&q) {
                return Some(*obj);
            }
        }
        for q in self.snapshot.queues_on_device(device) {
            if family_indices.contains(&q.family) {
                return Some(*q);
            }
        }
        self.snapshot.queues_on_device(device).next().copied()
    }

    /// A queue able to execute sparse binding work: the last bound queue if
    /// its family advertises sparse binding, else a sparse-capable device
    /// queue from the captured family indices, else the last bound queue.
    pub fn sparse_queue_for(
        &self,
        last_bound: Option<QueueHandle>,
        device: DeviceHandle,
        family_indices: &[u32],
    ) -> Option<QueueObject> {
        let last = last_bound.and_then(|q| self.snapshot.queues.get(&q)).copied();
        if let Some(q) = last {
            if let Some(flags) = self.snapshot.queue_family_flags(q.device, q.family) {
                if flags.contains(QueueFlags::SPARSE_BINDING) {
                    return Some(q);
                }
            }
        }
        for q in self.snapshot.queues_on_device(device) {
            let sparse = self
                .snapshot
                .queue_family_flags(device, q.family)
                .is_some_and(|f| f.contains(QueueFlags::SPARSE_BINDING));
            if sparse && family_indices.contains(&q.family) {
                return Some(*q);
            }
        }
        last
    }

    // -- one-shot command helper -------------------------------------------

    /// Build a transient command pool and primary buffer on `queue`'s family
    /// and begin recording into it.
    pub fn get_command_buffer(
        &mut self,
        queue: &QueueObject,
    ) -> Result<(CommandBufferHandle, CommandPoolHandle), RebuildError> {
        let pool = CommandPoolHandle(self.fresh_handle());
        let buffer = CommandBufferHandle(self.fresh_handle());

        self.alloc_read(&queue.family)?;
        self.alloc_write(&pool)?;
        self.write(Call::CreateCommandPool {
            device: queue.device,
            flags: CommandPoolCreateFlags::empty(),
            queue_family_index: queue.family,
            pool,
        });

        self.alloc_read(&pool)?;
        self.alloc_write(&buffer)?;
        self.write(Call::AllocateCommandBuffers {
            device: queue.device,
            pool,
            level: CommandBufferLevel::Primary,
            buffers: vec![buffer],
        });

        let begin_info = CommandBufferBeginInfo::default();
        self.alloc_read(&begin_info.flags)?;
        self.write(Call::BeginCommandBuffer {
            buffer,
            begin_info,
        });

        Ok((buffer, pool))
    }

    /// End the one-shot buffer, submit it, wait for the queue to go idle and
    /// destroy the pool (implicitly freeing the buffer).
    pub fn end_submit_and_destroy_command_buffer(
        &mut self,
        queue: &QueueObject,
        buffer: CommandBufferHandle,
        pool: CommandPoolHandle,
    ) -> Result<(), RebuildError> {
        self.write(Call::EndCommandBuffer { buffer });

        self.alloc_read(&buffer)?;
        self.write(Call::QueueSubmit {
            queue: queue.handle,
            command_buffers: vec![buffer],
            signal_semaphores: Vec::new(),
        });

        self.write(Call::QueueWaitIdle {
            queue: queue.handle,
        });
        self.write(Call::DestroyCommandPool {
            device: queue.device,
            pool,
        });
        Ok(())
    }

    // -- scratch transfer buffers ------------------------------------------

    /// Memory type index scratch buffers allocate from: host-visible, masked
    /// by the captured transfer-buffer requirements when present. Falls back
    /// to index 0 when nothing qualifies — the replay target may still cope.
    pub fn scratch_buffer_memory_index(&mut self, device: &DeviceObject) -> u32 {
        let Some(phys) = self.snapshot.physical_devices.get(&device.physical_device) else {
            return 0;
        };
        let type_bits = self
            .snapshot
            .transfer_buffer_memory_requirements
            .get(&device.handle)
            .map(|req| req.memory_type_bits)
            .unwrap_or_else(|| {
                (1u64 << u64::from(phys.memory_properties.type_count()))
                    .wrapping_sub(1) as u32
            });
        match phys
            .memory_properties
            .type_index_for(type_bits, MemoryPropertyFlags::HOST_VISIBLE)
        {
            Some(i) => i,
            None => {
                error!(
                    device = device.handle.raw(),
                    "no host-visible memory type for scratch buffer, falling back to index 0"
                );
                self.advise(Advisory::NoHostVisibleMemoryType {
                    device: device.handle.raw(),
                });
                0
            }
        }
    }

    /// Create a host-visible buffer, fill it with `data`, and leave it bound
    /// and flushed, ready to act as the source of a device-side copy.
    ///
    /// Backing memory is allocated at twice the payload rounded up to a
    /// 256-byte boundary: real driver requirements cannot be queried during
    /// construction, so the size carries a safety margin.
    pub fn alloc_and_fill_scratch_buffer(
        &mut self,
        device: &DeviceObject,
        data: &[u8],
        extra_usage: BufferUsage,
    ) -> Result<(BufferHandle, DeviceMemoryHandle), RebuildError> {
        let buffer = BufferHandle(self.fresh_handle());
        let memory = DeviceMemoryHandle(self.fresh_handle());
        let size = data.len() as u64;

        let info = BufferCreateInfo {
            flags: BufferCreateFlags::empty(),
            size,
            usage: BufferUsage::TRANSFER_SRC | extra_usage,
            sharing_mode: SharingMode::Exclusive,
            queue_family_indices: Vec::new(),
            dedicated: false,
        };
        self.alloc_read(&info)?;
        self.alloc_write(&buffer)?;
        self.write(Call::CreateBuffer {
            device: device.handle,
            info,
            buffer,
        });

        let memory_type_index = self.scratch_buffer_memory_index(device);
        let alloc_size = scratch_alloc_size(size);
        self.alloc_read(&alloc_size)?;
        self.alloc_write(&memory)?;
        self.write(Call::AllocateMemory {
            device: device.handle,
            allocation_size: alloc_size,
            memory_type_index,
            dedicated: None,
            memory,
        });

        self.write(Call::BindBufferMemory {
            device: device.handle,
            buffer,
            memory,
            offset: 0,
        });

        // The mapped payload and the returned pointer cell outlive a single
        // command, so they are managed explicitly rather than as pending
        // observations.
        let payload = self.alloc_data(data.to_vec())?;
        let pointer_cell = self.alloc_data(payload.ptr().to_le_bytes().to_vec())?;

        self.write_with(
            Call::MapMemory {
                device: device.handle,
                memory,
                offset: 0,
                size,
                location: payload.ptr(),
            },
            &[pointer_cell.range],
            &[pointer_cell.range],
        );

        self.alloc_read(&memory)?;
        self.write_with(
            Call::FlushMappedMemoryRanges {
                device: device.handle,
                memory,
                offset: 0,
                size,
            },
            &[payload.range],
            &[],
        );

        self.write(Call::UnmapMemory {
            device: device.handle,
            memory,
        });

        self.free_data(payload);
        self.free_data(pointer_cell);

        Ok((buffer, memory))
    }

    pub fn free_scratch_buffer(
        &mut self,
        device: DeviceHandle,
        buffer: BufferHandle,
        memory: DeviceMemoryHandle,
    ) {
        self.write(Call::DestroyBuffer { device, buffer });
        self.write(Call::FreeMemory { device, memory });
    }

    // -- device creation payload -------------------------------------------

    /// Reconstruct per-family queue create infos with dense priority arrays,
    /// as device creation consumed them originally.
    pub fn queue_create_infos(device: &DeviceObject) -> Vec<QueueCreateInfo> {
        let mut families: Vec<u32> = Vec::new();
        for q in &device.queues {
            if !families.contains(&q.family) {
                families.push(q.family);
            }
        }
        families.sort_unstable();

        families
            .into_iter()
            .map(|family| {
                let mut priorities: Vec<f32> = Vec::new();
                for q in device.queues.iter().filter(|q| q.family == family) {
                    let needed = q.index as usize + 1;
                    if priorities.len() < needed {
                        priorities.resize(needed, 0.0);
                    }
                    priorities[q.index as usize] = q.priority;
                }
                QueueCreateInfo { family, priorities }
            })
            .collect()
    }
}

/// Twice the payload, rounded up to a 256-byte boundary.
pub fn scratch_alloc_size(payload: u64) -> u64 {
    (payload * 2 + 255) & !255
}
