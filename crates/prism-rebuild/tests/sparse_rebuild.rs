mod common;

use std::collections::BTreeMap;

use common::*;
use prism_capture::*;
use prism_rebuild::{rebuild_state, Call, RebuildOptions};

const SPARSE_MEMORY: DeviceMemoryHandle = DeviceMemoryHandle(41);
const DEDICATED_MEMORY: DeviceMemoryHandle = DeviceMemoryHandle(42);
const SPARSE_BUFFER: BufferHandle = BufferHandle(40);
const DEDICATED_SPARSE_BUFFER: BufferHandle = BufferHandle(43);
const SPARSE_IMAGE: ImageHandle = ImageHandle(44);

fn bind(
    resource_offset: u64,
    size: u64,
    memory: DeviceMemoryHandle,
    memory_offset: u64,
) -> SparseMemoryBind {
    SparseMemoryBind {
        resource_offset,
        size,
        memory,
        memory_offset,
        flags: SparseMemoryBindFlags::empty(),
    }
}

fn sparse_snapshot() -> Snapshot {
    let mut snapshot = sample_snapshot();

    snapshot.device_memories.insert(
        SPARSE_MEMORY,
        DeviceMemoryObject {
            handle: SPARSE_MEMORY,
            device: DEVICE,
            allocation_size: 0x2000,
            memory_type_index: 1,
            dedicated: None,
            mapped_location: 0,
            mapped_offset: 0,
            mapped_size: 0,
        },
    );
    snapshot.memory_data.insert(SPARSE_MEMORY, vec![0x5a; 0x2000]);

    snapshot.device_memories.insert(
        DEDICATED_MEMORY,
        DeviceMemoryObject {
            handle: DEDICATED_MEMORY,
            device: DEVICE,
            allocation_size: 0x1000,
            memory_type_index: 1,
            dedicated: Some(DedicatedAllocation {
                image: ImageHandle::NULL,
                buffer: DEDICATED_SPARSE_BUFFER,
            }),
            mapped_location: 0,
            mapped_offset: 0,
            mapped_size: 0,
        },
    );
    snapshot
        .memory_data
        .insert(DEDICATED_MEMORY, vec![0x77; 0x1000]);

    snapshot.buffers.insert(
        SPARSE_BUFFER,
        BufferObject {
            handle: SPARSE_BUFFER,
            device: DEVICE,
            info: BufferCreateInfo {
                flags: BufferCreateFlags::SPARSE_BINDING,
                size: 0x200,
                usage: BufferUsage::STORAGE_BUFFER,
                sharing_mode: SharingMode::Exclusive,
                queue_family_indices: vec![0],
                dedicated: false,
            },
            memory: None,
            memory_offset: 0,
            sparse_bindings: BTreeMap::from([
                (0, bind(0, 0x100, SPARSE_MEMORY, 0)),
                (0x100, bind(0x100, 0x100, SPARSE_MEMORY, 0x100)),
            ]),
            memory_requirements: MemoryRequirements {
                size: 0x200,
                alignment: 0x100,
                memory_type_bits: 0b11,
            },
            last_bound_queue: Some(QUEUE),
        },
    );

    // Both sparse binds point at one dedicated allocation: its backing
    // memory must be created on demand, exactly once.
    snapshot.buffers.insert(
        DEDICATED_SPARSE_BUFFER,
        BufferObject {
            handle: DEDICATED_SPARSE_BUFFER,
            device: DEVICE,
            info: BufferCreateInfo {
                flags: BufferCreateFlags::SPARSE_BINDING,
                size: 0x200,
                usage: BufferUsage::STORAGE_BUFFER,
                sharing_mode: SharingMode::Exclusive,
                queue_family_indices: vec![0],
                dedicated: true,
            },
            memory: None,
            memory_offset: 0,
            sparse_bindings: BTreeMap::from([
                (0, bind(0, 0x100, DEDICATED_MEMORY, 0)),
                (0x100, bind(0x100, 0x100, DEDICATED_MEMORY, 0x100)),
            ]),
            memory_requirements: MemoryRequirements {
                size: 0x200,
                alignment: 0x100,
                memory_type_bits: 0b11,
            },
            last_bound_queue: Some(QUEUE),
        },
    );

    snapshot.images.insert(
        SPARSE_IMAGE,
        ImageObject {
            handle: SPARSE_IMAGE,
            device: DEVICE,
            info: ImageCreateInfo {
                flags: ImageCreateFlags::SPARSE_BINDING,
                usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
                layout: ImageLayout::ShaderReadOnly,
                ..image_info(
                    ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
                    ImageLayout::ShaderReadOnly,
                )
            },
            aspect: ImageAspects::COLOR,
            memory: None,
            memory_offset: 0,
            opaque_sparse_bindings: BTreeMap::from([(0, bind(0, 0x400, SPARSE_MEMORY, 0x800))]),
            sparse_image_bindings: SparseImageBindings::new(),
            sparse_memory_requirements: BTreeMap::new(),
            memory_requirements: MemoryRequirements {
                size: 0x400,
                alignment: 0x100,
                memory_type_bits: 0b11,
            },
            last_bound_queue: Some(QUEUE),
            is_swapchain_image: false,
        },
    );

    snapshot
}

#[test]
fn sparse_buffer_bindings_are_replayed_in_one_submission() {
    let r = rebuild_state(&sparse_snapshot(), &RebuildOptions::default()).unwrap();

    let bind_calls: Vec<_> = r
        .commands
        .iter()
        .filter_map(|c| match &c.call {
            Call::QueueBindSparse { info, .. } => Some(info),
            _ => None,
        })
        .filter(|info| info.buffer_binds.iter().any(|b| b.buffer == SPARSE_BUFFER))
        .collect();
    assert_eq!(bind_calls.len(), 1, "one bind-sparse submission per buffer");
    assert_eq!(bind_calls[0].buffer_binds[0].binds.len(), 2);
}

#[test]
fn fully_bound_sparse_buffer_content_is_copied_per_bind() {
    let r = rebuild_state(&sparse_snapshot(), &RebuildOptions::default()).unwrap();

    let regions = r
        .commands
        .iter()
        .find_map(|c| match &c.call {
            Call::Record {
                command: RecordedCommand::CopyBuffer { dst, regions, .. },
                ..
            } if *dst == SPARSE_BUFFER => Some(regions.clone()),
            _ => None,
        })
        .expect("sparse buffer content must be primed");
    let dst_offsets: Vec<u64> = regions.iter().map(|r| r.dst_offset).collect();
    assert_eq!(dst_offsets, vec![0, 0x100]);
}

#[test]
fn dedicated_sparse_backing_memory_is_created_once() {
    let r = rebuild_state(&sparse_snapshot(), &RebuildOptions::default()).unwrap();

    let allocations = r
        .commands
        .iter()
        .filter(|c| matches!(
            &c.call,
            Call::AllocateMemory { memory, .. } if *memory == DEDICATED_MEMORY
        ))
        .count();
    assert_eq!(allocations, 1);

    // Created on demand in the buffer pass, not in the memory pass: the
    // owning buffer is created first.
    let buffer_index = r
        .commands
        .iter()
        .position(|c| matches!(
            &c.call,
            Call::CreateBuffer { buffer, .. } if *buffer == DEDICATED_SPARSE_BUFFER
        ))
        .unwrap();
    let memory_index = r
        .commands
        .iter()
        .position(|c| matches!(
            &c.call,
            Call::AllocateMemory { memory, .. } if *memory == DEDICATED_MEMORY
        ))
        .unwrap();
    assert!(buffer_index < memory_index);
}

#[test]
fn opaque_bound_sparse_image_is_bound_and_primed() {
    let r = rebuild_state(&sparse_snapshot(), &RebuildOptions::default()).unwrap();

    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::QueueBindSparse { info, .. }
            if info.image_opaque_binds.iter().any(|b| b.image == SPARSE_IMAGE)
    )));

    // Fully covered by its one opaque bind, so the whole image is primed
    // through a buffer copy.
    assert!(r.commands.iter().any(|c| matches!(
        &c.call,
        Call::Record {
            command: RecordedCommand::CopyBufferToImage { dst, .. },
            ..
        } if *dst == SPARSE_IMAGE
    )));
}

#[test]
fn unbound_sparse_buffer_content_is_left_undefined() {
    let mut snapshot = sparse_snapshot();
    // Punch a hole: only the first half of the buffer stays bound.
    snapshot
        .buffers
        .get_mut(&SPARSE_BUFFER)
        .unwrap()
        .sparse_bindings
        .remove(&0x100);

    let r = rebuild_state(&snapshot, &RebuildOptions::default()).unwrap();
    assert!(
        !r.commands.iter().any(|c| matches!(
            &c.call,
            Call::Record {
                command: RecordedCommand::CopyBuffer { dst, .. },
                ..
            } if *dst == SPARSE_BUFFER
        )),
        "partially bound non-resident buffer must not be primed"
    );
}
