mod common;

use common::*;
use prism_capture::BufferUsage;
use prism_rebuild::{Call, StateBuilder};

/// Materialize the fixture's instance/device/queue in the new state so the
/// helper calls under test mutate cleanly.
fn seed_device(sb: &mut StateBuilder<'_>) {
    sb.write(Call::CreateInstance {
        enabled_layers: Vec::new(),
        enabled_extensions: Vec::new(),
        instance: INSTANCE,
    });
    sb.write(Call::EnumeratePhysicalDevices {
        instance: INSTANCE,
        device_count: 1,
        devices: Some(vec![PHYSICAL_DEVICE]),
    });
    sb.write(Call::CreateDevice {
        physical_device: PHYSICAL_DEVICE,
        queue_create_infos: Vec::new(),
        enabled_layers: Vec::new(),
        enabled_extensions: Vec::new(),
        enabled_features: Vec::new(),
        device: DEVICE,
    });
    sb.write(Call::GetDeviceQueue {
        device: DEVICE,
        family: 0,
        index: 0,
        queue: QUEUE,
    });
}

#[test]
fn one_shot_cycle_leaves_no_live_objects_behind() {
    let snapshot = sample_snapshot();
    let mut sb = StateBuilder::new(&snapshot);
    seed_device(&mut sb);
    let queue = snapshot.queues[&QUEUE];

    let pools_before = sb.new_state().command_pools.len();
    let buffers_before = sb.new_state().command_buffers.len();

    let (cb, pool) = sb.get_command_buffer(&queue).unwrap();
    assert!(sb.new_state().command_pools.contains(&pool));
    assert!(sb.new_state().command_buffers.contains(&cb));

    sb.end_submit_and_destroy_command_buffer(&queue, cb, pool)
        .unwrap();
    assert!(!sb.new_state().command_pools.contains(&pool));
    assert!(
        !sb.new_state().command_buffers.contains(&cb),
        "destroying the pool must free its buffer"
    );
    assert_eq!(sb.new_state().command_pools.len(), pools_before);
    assert_eq!(sb.new_state().command_buffers.len(), buffers_before);

    // end -> submit -> wait -> destroy, in that order.
    let tail: Vec<&'static str> = sb
        .commands()
        .iter()
        .rev()
        .take(4)
        .map(|c| c.call.name())
        .collect();
    assert_eq!(
        tail,
        vec![
            "DestroyCommandPool",
            "QueueWaitIdle",
            "QueueSubmit",
            "EndCommandBuffer"
        ]
    );
}

#[test]
fn pending_allocations_are_released_after_every_command() {
    let snapshot = sample_snapshot();
    let mut sb = StateBuilder::new(&snapshot);
    let queue = snapshot.queues[&QUEUE];

    let (cb, pool) = sb.get_command_buffer(&queue).unwrap();
    assert!(sb.pending_is_empty());
    sb.end_submit_and_destroy_command_buffer(&queue, cb, pool)
        .unwrap();
    assert!(sb.pending_is_empty());

    let device = snapshot.devices[&DEVICE].clone();
    let (buffer, memory) = sb
        .alloc_and_fill_scratch_buffer(&device, &[0u8; 64], BufferUsage::empty())
        .unwrap();
    assert!(sb.pending_is_empty());
    sb.free_scratch_buffer(DEVICE, buffer, memory);
    assert!(sb.pending_is_empty());
}

#[test]
fn scratch_buffer_backing_is_doubled_and_256_aligned() {
    let snapshot = sample_snapshot();
    let mut sb = StateBuilder::new(&snapshot);
    let device = snapshot.devices[&DEVICE].clone();

    let payload = [0x5au8; 100];
    let (buffer, memory) = sb
        .alloc_and_fill_scratch_buffer(&device, &payload, BufferUsage::empty())
        .unwrap();

    let alloc = sb
        .commands()
        .iter()
        .find_map(|c| match &c.call {
            Call::AllocateMemory {
                allocation_size,
                memory_type_index,
                memory: m,
                ..
            } if *m == memory => Some((*allocation_size, *memory_type_index)),
            _ => None,
        })
        .expect("scratch memory allocation emitted");
    assert_eq!(alloc.0, 512);
    // Fixture type 1 is the host-visible one.
    assert_eq!(alloc.1, 1);

    let create = sb
        .commands()
        .iter()
        .find_map(|c| match &c.call {
            Call::CreateBuffer { info, buffer: b, .. } if *b == buffer => Some(info.clone()),
            _ => None,
        })
        .expect("scratch buffer creation emitted");
    assert_eq!(create.size, 100);
    assert!(create.usage.contains(BufferUsage::TRANSFER_SRC));

    // Map, flush, unmap round trip before first use.
    let names: Vec<&'static str> = sb.commands().iter().map(|c| c.call.name()).collect();
    let map = names.iter().position(|n| *n == "MapMemory").unwrap();
    let flush = names
        .iter()
        .position(|n| *n == "FlushMappedMemoryRanges")
        .unwrap();
    let unmap = names.iter().position(|n| *n == "UnmapMemory").unwrap();
    assert!(map < flush && flush < unmap);
}

#[test]
fn fresh_handles_never_collide_with_the_snapshot() {
    let snapshot = sample_snapshot();
    let max = snapshot.max_observed_handle();
    let mut sb = StateBuilder::new(&snapshot);

    let mut issued = Vec::new();
    for _ in 0..64 {
        let h = sb.fresh_handle();
        assert!(h > max, "fresh handle {h} collides with snapshot range");
        issued.push(h);
    }
    let mut deduped = issued.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), issued.len());
}
