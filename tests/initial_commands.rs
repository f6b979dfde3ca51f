//! Facade-level smoke tests: a minimal capture rebuilt through the public
//! crate surface and the memoizing resolve layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use prism::capture::*;
use prism::rebuild::{Call, InitialCommands, RebuildOptions};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn minimal_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();

    snapshot.instances.insert(
        InstanceHandle(1),
        InstanceObject {
            handle: InstanceHandle(1),
            enabled_layers: Vec::new(),
            enabled_extensions: Vec::new(),
        },
    );
    snapshot.physical_devices.insert(
        PhysicalDeviceHandle(2),
        PhysicalDeviceObject {
            handle: PhysicalDeviceHandle(2),
            instance: InstanceHandle(1),
            properties: PhysicalDeviceProperties::default(),
            memory_properties: MemoryProperties {
                types: vec![MemoryType {
                    property_flags: MemoryPropertyFlags::HOST_VISIBLE,
                    heap_index: 0,
                }],
            },
            queue_family_properties: BTreeMap::from([(
                0,
                QueueFamilyProperties {
                    flags: QueueFlags::GRAPHICS | QueueFlags::TRANSFER,
                    queue_count: 1,
                    timestamp_valid_bits: 64,
                },
            )]),
        },
    );
    snapshot.devices.insert(
        DeviceHandle(3),
        DeviceObject {
            handle: DeviceHandle(3),
            physical_device: PhysicalDeviceHandle(2),
            enabled_layers: Vec::new(),
            enabled_extensions: Vec::new(),
            enabled_features: Vec::new(),
            queues: vec![DeviceQueueConfig {
                family: 0,
                index: 0,
                priority: 1.0,
            }],
        },
    );
    snapshot.queues.insert(
        QueueHandle(4),
        QueueObject {
            handle: QueueHandle(4),
            device: DeviceHandle(3),
            family: 0,
            index: 0,
        },
    );
    snapshot.device_memories.insert(
        DeviceMemoryHandle(5),
        DeviceMemoryObject {
            handle: DeviceMemoryHandle(5),
            device: DeviceHandle(3),
            allocation_size: 0x1000,
            memory_type_index: 0,
            dedicated: None,
            mapped_location: 0x7000_0000,
            mapped_offset: 0,
            mapped_size: 0x1000,
        },
    );
    snapshot.memory_data.insert(DeviceMemoryHandle(5), vec![1; 0x1000]);
    snapshot.buffers.insert(
        BufferHandle(6),
        BufferObject {
            handle: BufferHandle(6),
            device: DeviceHandle(3),
            info: BufferCreateInfo {
                flags: BufferCreateFlags::empty(),
                size: 0x80,
                usage: BufferUsage::UNIFORM_BUFFER,
                sharing_mode: SharingMode::Exclusive,
                queue_family_indices: vec![0],
                dedicated: false,
            },
            memory: Some(DeviceMemoryHandle(5)),
            memory_offset: 0,
            sparse_bindings: BTreeMap::new(),
            memory_requirements: MemoryRequirements {
                size: 0x80,
                alignment: 0x10,
                memory_type_bits: 0b1,
            },
            last_bound_queue: Some(QueueHandle(4)),
        },
    );
    snapshot
}

#[test]
fn rebuild_recreates_the_whole_graph_in_order() {
    init_tracing();
    let rebuild = prism::rebuild_state(&minimal_snapshot(), &RebuildOptions::default()).unwrap();

    let names: Vec<&'static str> = rebuild.commands.iter().map(|c| c.call.name()).collect();
    let instance = names.iter().position(|n| *n == "CreateInstance").unwrap();
    let device = names.iter().position(|n| *n == "CreateDevice").unwrap();
    let buffer = names.iter().position(|n| *n == "CreateBuffer").unwrap();
    assert!(instance < device && device < buffer);

    // Captured mapping is re-established at the captured location.
    assert!(rebuild.commands.iter().any(|c| matches!(
        &c.call,
        Call::MapMemory { location, .. } if *location == 0x7000_0000
    )));

    assert!(!rebuild.ranges.is_empty());
    assert_eq!(rebuild.report.skipped().count(), 0);
}

#[test]
fn resolve_layer_memoizes_per_capture() {
    let snapshot = minimal_snapshot();
    let cache = InitialCommands::new();
    let opts = RebuildOptions::default();

    let first = cache.resolve(CaptureId(1), &snapshot, &opts).unwrap();
    let second = cache.resolve(CaptureId(1), &snapshot, &opts).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = cache.resolve(CaptureId(2), &snapshot, &opts).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(
        first.commands.len(),
        other.commands.len(),
        "same snapshot, same shape"
    );
}

#[test]
fn cancellation_aborts_the_rebuild() {
    let opts = RebuildOptions::default();
    opts.cancel.cancel();
    let err = prism::rebuild_state(&minimal_snapshot(), &opts).unwrap_err();
    assert!(matches!(err, prism::RebuildError::Cancelled));
}
