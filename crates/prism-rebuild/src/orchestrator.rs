//! Top-level rebuild driver.
//!
//! Emission runs one object category at a time in a fixed dependency order,
//! fully draining each stage before the next, so every creation call only
//! references handles that already exist. Pipelines are the one exception:
//! their shader-module / layout / render-pass dependencies may have been
//! destroyed after use in the original capture, so any missing dependency is
//! re-created as a temporary and destroyed right after the pipeline is
//! built.

use std::collections::BTreeMap;

use prism_capture::*;
use prism_interval::RangeList;
use tracing::warn;

use crate::builder::StateBuilder;
use crate::call::{
    Call, DescriptorWrite, GraphicsPipelineCreateInfo, SparseBindInfo, SparseBufferBindInfo,
    SparseImageBind, SparseImageBindInfo, SparseImageOpaqueBindInfo, StageInfo,
    SwapchainCreateInfo,
};
use crate::mutate::mutate_recorded;
use crate::pipelines::pipelines_in_order;
use crate::primer::ImagePrimer;
use crate::report::{Advisory, CancelToken, RebuildError, RebuildReport, SkipReason};
use crate::sparse::is_fully_bound;

#[derive(Clone, Debug, Default)]
pub struct RebuildOptions {
    pub cancel: CancelToken,
}

/// The rebuild's two persisted outputs plus the structured per-object
/// report.
#[derive(Clone, Debug)]
pub struct Rebuild {
    pub commands: Vec<crate::call::Command>,
    pub ranges: RangeList,
    pub report: RebuildReport,
}

macro_rules! check_cancel {
    ($opts:expr) => {
        if $opts.cancel.is_cancelled() {
            return Err(RebuildError::Cancelled);
        }
    };
}

/// Rebuild the minimal initial-command sequence for `snapshot`.
///
/// Individual object failures are isolated, reported and skipped; the only
/// hard failures are replay-space exhaustion and cancellation.
pub fn rebuild_state(snapshot: &Snapshot, opts: &RebuildOptions) -> Result<Rebuild, RebuildError> {
    let mut sb = StateBuilder::new(snapshot);

    for inst in snapshot.instances.values() {
        check_cancel!(opts);
        create_instance(&mut sb, inst)?;
    }

    create_physical_devices(&mut sb)?;

    for surface in snapshot.surfaces.values() {
        check_cancel!(opts);
        create_surface(&mut sb, surface)?;
    }

    for device in snapshot.devices.values() {
        check_cancel!(opts);
        create_device(&mut sb, device)?;
    }

    for queue in snapshot.queues.values() {
        check_cancel!(opts);
        create_queue(&mut sb, queue)?;
    }

    for swapchain in snapshot.swapchains.values() {
        check_cancel!(opts);
        create_swapchain(&mut sb, swapchain)?;
    }

    // Non-dedicated allocations only; dedicated ones are created on demand
    // next to the resource they exist for.
    for memory in snapshot.device_memories.values() {
        check_cancel!(opts);
        create_device_memory(&mut sb, memory, false)?;
    }

    for buffer in snapshot.buffers.values() {
        check_cancel!(opts);
        create_buffer(&mut sb, buffer)?;
    }

    {
        let mut primer = ImagePrimer::new();
        for image in snapshot.images.values() {
            check_cancel!(opts);
            create_image(&mut sb, image, &mut primer)?;
        }
        primer.free(&mut sb);
    }

    for sampler in snapshot.samplers.values() {
        check_cancel!(opts);
        create_sampler(&mut sb, sampler)?;
    }

    for fence in snapshot.fences.values() {
        check_cancel!(opts);
        create_fence(&mut sb, fence)?;
    }

    for semaphore in snapshot.semaphores.values() {
        check_cancel!(opts);
        create_semaphore(&mut sb, semaphore)?;
    }

    for event in snapshot.events.values() {
        check_cancel!(opts);
        create_event(&mut sb, event)?;
    }

    for pool in snapshot.command_pools.values() {
        check_cancel!(opts);
        create_command_pool(&mut sb, pool)?;
    }

    for cache in snapshot.pipeline_caches.values() {
        check_cancel!(opts);
        create_pipeline_cache(&mut sb, cache)?;
    }

    for layout in snapshot.descriptor_set_layouts.values() {
        check_cancel!(opts);
        create_descriptor_set_layout(&mut sb, layout)?;
    }

    for layout in snapshot.pipeline_layouts.values() {
        check_cancel!(opts);
        create_pipeline_layout(&mut sb, layout)?;
    }

    for render_pass in snapshot.render_passes.values() {
        check_cancel!(opts);
        create_render_pass(&mut sb, render_pass)?;
    }

    for module in snapshot.shader_modules.values() {
        check_cancel!(opts);
        create_shader_module(&mut sb, module)?;
    }

    let compute_bases: BTreeMap<PipelineHandle, PipelineHandle> = snapshot
        .compute_pipelines
        .iter()
        .map(|(h, p)| (*h, p.base_pipeline))
        .collect();
    let (compute_order, compute_cycle) = pipelines_in_order(&compute_bases);
    report_cycle(&mut sb, compute_cycle);
    for handle in compute_order {
        check_cancel!(opts);
        if let Some(pipeline) = snapshot.compute_pipelines.get(&handle) {
            create_compute_pipeline(&mut sb, pipeline)?;
        }
    }

    let graphics_bases: BTreeMap<PipelineHandle, PipelineHandle> = snapshot
        .graphics_pipelines
        .iter()
        .map(|(h, p)| (*h, p.base_pipeline))
        .collect();
    let (graphics_order, graphics_cycle) = pipelines_in_order(&graphics_bases);
    report_cycle(&mut sb, graphics_cycle);
    for handle in graphics_order {
        check_cancel!(opts);
        if let Some(pipeline) = snapshot.graphics_pipelines.get(&handle) {
            create_graphics_pipeline(&mut sb, pipeline)?;
        }
    }

    for view in snapshot.image_views.values() {
        check_cancel!(opts);
        create_image_view(&mut sb, view)?;
    }

    for view in snapshot.buffer_views.values() {
        check_cancel!(opts);
        create_buffer_view(&mut sb, view)?;
    }

    for pool in snapshot.descriptor_pools.values() {
        check_cancel!(opts);
        create_descriptor_pool(&mut sb, pool)?;
    }

    for framebuffer in snapshot.framebuffers.values() {
        check_cancel!(opts);
        create_framebuffer(&mut sb, framebuffer)?;
    }

    for set in snapshot.descriptor_sets.values() {
        check_cancel!(opts);
        create_descriptor_set(&mut sb, set)?;
    }

    for pool in snapshot.query_pools.values() {
        check_cancel!(opts);
        create_query_pool(&mut sb, pool)?;
    }

    for buffer in snapshot.command_buffers.values() {
        check_cancel!(opts);
        create_command_buffer(&mut sb, buffer, CommandBufferLevel::Secondary)?;
    }
    for buffer in snapshot.command_buffers.values() {
        check_cancel!(opts);
        create_command_buffer(&mut sb, buffer, CommandBufferLevel::Primary)?;
    }

    let (commands, ranges, report) = sb.into_output();
    Ok(Rebuild {
        commands,
        ranges,
        report,
    })
}

fn report_cycle(sb: &mut StateBuilder<'_>, cycle: Vec<PipelineHandle>) {
    if !cycle.is_empty() {
        warn!(?cycle, "pipeline base cycle, creating remainder without bases");
        sb.advise(Advisory::PipelineBaseCycle {
            pipelines: cycle.iter().map(|h| h.raw()).collect(),
        });
    }
}

fn create_instance(sb: &mut StateBuilder<'_>, inst: &InstanceObject) -> Result<(), RebuildError> {
    for layer in &inst.enabled_layers {
        sb.alloc_read_data(format!("{layer}\0").into_bytes())?;
    }
    for ext in &inst.enabled_extensions {
        sb.alloc_read_data(format!("{ext}\0").into_bytes())?;
    }
    sb.alloc_write(&inst.handle)?;
    sb.write(Call::CreateInstance {
        enabled_layers: inst.enabled_layers.clone(),
        enabled_extensions: inst.enabled_extensions.clone(),
        instance: inst.handle,
    });
    sb.record_created("instance", inst.handle.raw());
    Ok(())
}

fn create_physical_devices(sb: &mut StateBuilder<'_>) -> Result<(), RebuildError> {
    let mut by_instance: BTreeMap<InstanceHandle, Vec<PhysicalDeviceHandle>> = BTreeMap::new();
    for (handle, dev) in &sb.snapshot().physical_devices {
        by_instance.entry(dev.instance).or_default().push(*handle);
    }

    for (instance, devices) in by_instance {
        let count = devices.len() as u32;

        sb.alloc_write(&count)?;
        sb.write(Call::EnumeratePhysicalDevices {
            instance,
            device_count: count,
            devices: None,
        });

        sb.alloc_read(&count)?;
        sb.alloc_write_slice(&devices)?;
        sb.write(Call::EnumeratePhysicalDevices {
            instance,
            device_count: count,
            devices: Some(devices.clone()),
        });

        for handle in devices {
            let dev = sb.snapshot().physical_devices[&handle].clone();

            sb.alloc_write(&dev.properties)?;
            sb.write(Call::GetPhysicalDeviceProperties {
                physical_device: handle,
                properties: dev.properties.clone(),
            });

            sb.alloc_write(&dev.memory_properties)?;
            sb.write(Call::GetPhysicalDeviceMemoryProperties {
                physical_device: handle,
                properties: dev.memory_properties.clone(),
            });

            let family_count = dev.queue_family_properties.len() as u32;
            sb.alloc_write(&family_count)?;
            sb.write(Call::GetPhysicalDeviceQueueFamilyProperties {
                physical_device: handle,
                family_count,
                families: None,
            });

            let families: Vec<QueueFamilyProperties> =
                dev.queue_family_properties.values().copied().collect();
            sb.alloc_read(&family_count)?;
            sb.alloc_write_slice(&families)?;
            sb.write(Call::GetPhysicalDeviceQueueFamilyProperties {
                physical_device: handle,
                family_count,
                families: Some(families),
            });

            sb.record_created("physical device", handle.raw());
        }
    }
    Ok(())
}

fn create_surface(sb: &mut StateBuilder<'_>, surface: &SurfaceObject) -> Result<(), RebuildError> {
    // The original window-system objects cannot be captured; every platform
    // kind is re-created against null native handles.
    sb.alloc_write(&surface.handle)?;
    sb.write(Call::CreateSurface {
        instance: surface.instance,
        kind: surface.kind,
        surface: surface.handle,
    });
    sb.record_created("surface", surface.handle.raw());
    Ok(())
}

fn create_device(sb: &mut StateBuilder<'_>, device: &DeviceObject) -> Result<(), RebuildError> {
    for layer in &device.enabled_layers {
        sb.alloc_read_data(format!("{layer}\0").into_bytes())?;
    }
    for ext in &device.enabled_extensions {
        sb.alloc_read_data(format!("{ext}\0").into_bytes())?;
    }

    let queue_create_infos = StateBuilder::queue_create_infos(device);
    for info in &queue_create_infos {
        sb.alloc_read_slice(&info.priorities)?;
    }
    sb.alloc_read_slice(&device.enabled_features)?;
    sb.alloc_write(&device.handle)?;
    sb.write(Call::CreateDevice {
        physical_device: device.physical_device,
        queue_create_infos,
        enabled_layers: device.enabled_layers.clone(),
        enabled_extensions: device.enabled_extensions.clone(),
        enabled_features: device.enabled_features.clone(),
        device: device.handle,
    });
    sb.record_created("device", device.handle.raw());
    Ok(())
}

fn create_queue(sb: &mut StateBuilder<'_>, queue: &QueueObject) -> Result<(), RebuildError> {
    sb.alloc_write(&queue.handle)?;
    sb.write(Call::GetDeviceQueue {
        device: queue.device,
        family: queue.family,
        index: queue.index,
        queue: queue.handle,
    });
    sb.record_created("queue", queue.handle.raw());
    Ok(())
}

fn create_swapchain(sb: &mut StateBuilder<'_>, swp: &SwapchainObject) -> Result<(), RebuildError> {
    let info = SwapchainCreateInfo {
        surface: swp.surface,
        min_image_count: swp.images.len() as u32,
        format: swp.format,
        color_space: swp.color_space,
        extent: swp.extent,
        array_layers: swp.array_layers,
        usage: swp.usage,
        sharing_mode: swp.sharing_mode,
        queue_family_indices: swp.queue_family_indices.clone(),
        pre_transform: swp.pre_transform,
        composite_alpha: swp.composite_alpha,
        present_mode: swp.present_mode,
        clipped: swp.clipped,
    };
    sb.alloc_read_slice(&info.queue_family_indices)?;
    sb.alloc_write(&swp.handle)?;
    sb.write(Call::CreateSwapchain {
        device: swp.device,
        info,
        swapchain: swp.handle,
    });
    sb.record_created("swapchain", swp.handle.raw());

    let count = swp.images.len() as u32;
    sb.alloc_write(&count)?;
    sb.write(Call::GetSwapchainImages {
        device: swp.device,
        swapchain: swp.handle,
        image_count: count,
        images: None,
    });

    sb.alloc_read(&count)?;
    sb.alloc_write_slice(&swp.images)?;
    sb.write(Call::GetSwapchainImages {
        device: swp.device,
        swapchain: swp.handle,
        image_count: count,
        images: Some(swp.images.clone()),
    });

    for handle in &swp.images {
        let Some(img) = sb.snapshot().images.get(handle).cloned() else {
            continue;
        };
        let queue = sb.queue_for(
            img.last_bound_queue,
            img.device,
            &img.info.queue_family_indices,
        );
        if let Some(queue) = queue {
            transition_image(sb, &img, ImageLayout::Undefined, img.info.layout, None, &queue)?;
        }
    }
    Ok(())
}

/// One-shot whole-image layout transition. Images that were never bound to
/// a queue cannot be transitioned and are left alone.
fn transition_image(
    sb: &mut StateBuilder<'_>,
    img: &ImageObject,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
    old_queue: Option<&QueueObject>,
    new_queue: &QueueObject,
) -> Result<(), RebuildError> {
    let Some(pool_queue) = img
        .last_bound_queue
        .and_then(|q| sb.snapshot().queues.get(&q))
        .copied()
    else {
        return Ok(());
    };
    let (cb, pool) = sb.get_command_buffer(&pool_queue)?;

    let old_family = old_queue.unwrap_or(new_queue).family;
    let image_barrier = ImageBarrier {
        src_access: AccessFlags::MEMORY_WRITE,
        dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        old_layout,
        new_layout,
        src_queue_family: old_family,
        dst_queue_family: new_queue.family,
        image: img.handle,
        range: ImageSubresourceRange {
            aspects: img.aspect,
            base_mip_level: 0,
            level_count: img.info.mip_levels,
            base_array_layer: 0,
            layer_count: img.info.array_layers,
        },
    };
    sb.alloc_read(&image_barrier)?;
    sb.write(Call::Record {
        buffer: cb,
        command: RecordedCommand::PipelineBarrier {
            src_stages: PipelineStageFlags::ALL_COMMANDS,
            dst_stages: PipelineStageFlags::ALL_COMMANDS,
            buffer_barriers: Vec::new(),
            image_barriers: vec![image_barrier],
        },
    });

    sb.end_submit_and_destroy_command_buffer(new_queue, cb, pool)
}

fn create_device_memory(
    sb: &mut StateBuilder<'_>,
    memory: &DeviceMemoryObject,
    allow_dedicated: bool,
) -> Result<(), RebuildError> {
    if !allow_dedicated && memory.dedicated.is_some() {
        return Ok(());
    }

    if let Some(dedicated) = &memory.dedicated {
        sb.alloc_read(&dedicated.image)?;
        sb.alloc_read(&dedicated.buffer)?;
    }
    sb.alloc_read(&memory.allocation_size)?;
    sb.alloc_write(&memory.handle)?;
    sb.write(Call::AllocateMemory {
        device: memory.device,
        allocation_size: memory.allocation_size,
        memory_type_index: memory.memory_type_index,
        dedicated: memory.dedicated,
        memory: memory.handle,
    });
    sb.record_created("device memory", memory.handle.raw());

    if memory.mapped_location != 0 {
        sb.alloc_write(&memory.mapped_location)?;
        sb.write(Call::MapMemory {
            device: memory.device,
            memory: memory.handle,
            offset: memory.mapped_offset,
            size: memory.mapped_size,
            location: memory.mapped_location,
        });
    }
    Ok(())
}

fn create_buffer(sb: &mut StateBuilder<'_>, buffer: &BufferObject) -> Result<(), RebuildError> {
    let dense_bound = buffer.memory.is_some();
    let sparse_bound = !buffer.sparse_bindings.is_empty();
    let sparse_binding = buffer.info.flags.contains(BufferCreateFlags::SPARSE_BINDING);
    let sparse_residency =
        sparse_binding && buffer.info.flags.contains(BufferCreateFlags::SPARSE_RESIDENCY);

    // Everything is rebuilt through device-side copies, so the transfer
    // destination bit is always added to the captured usage.
    let mut info = buffer.info.clone();
    info.usage |= BufferUsage::TRANSFER_DST;
    sb.alloc_read_slice(&info.queue_family_indices)?;
    sb.alloc_read(&info)?;
    sb.alloc_write(&buffer.handle)?;
    sb.write(Call::CreateBuffer {
        device: buffer.device,
        info,
        buffer: buffer.handle,
    });
    sb.record_created("buffer", buffer.handle.raw());

    sb.alloc_write(&buffer.memory_requirements)?;
    sb.write(Call::GetBufferMemoryRequirements {
        device: buffer.device,
        buffer: buffer.handle,
        requirements: buffer.memory_requirements,
    });

    let bound_memory = buffer.memory.and_then(|m| sb.snapshot().device_memories.get(&m));
    // Dedicated-allocation metadata lives on both the resource and the
    // memory; captures exist that miss one side, so check both and report
    // the gap before re-creating the allocation.
    let dedicated_memory =
        bound_memory.is_some_and(|m| m.dedicated.is_some()) || (dense_bound && buffer.info.dedicated);
    if dedicated_memory {
        if !buffer.info.dedicated {
            sb.advise(Advisory::MissingDedicatedMetadata {
                kind: "buffer",
                handle: buffer.handle.raw(),
            });
        }
        if let Some(mem) = bound_memory {
            if mem.dedicated.is_none() {
                sb.advise(Advisory::MissingDedicatedMetadata {
                    kind: "device memory",
                    handle: mem.handle.raw(),
                });
            }
        }
        if let Some(mem) = bound_memory.cloned() {
            create_device_memory(sb, &mem, true)?;
        }
    }

    if !dense_bound && !sparse_bound {
        return Ok(());
    }

    let queue = sb.queue_for(
        buffer.last_bound_queue,
        buffer.device,
        &buffer.info.queue_family_indices,
    );

    let mut contents: Vec<u8> = Vec::new();
    let mut copies: Vec<BufferCopy> = Vec::new();
    let mut offset = 0u64;
    let mut old_family: Option<u32> = None;

    if sparse_bound {
        let Some(queue) = queue.as_ref() else {
            sb.record_skipped("buffer content", buffer.handle.raw(), SkipReason::NoQueueAvailable);
            return Ok(());
        };
        let sparse_queue = sb
            .sparse_queue_for(
                buffer.last_bound_queue,
                buffer.device,
                &buffer.info.queue_family_indices,
            )
            .unwrap_or(*queue);
        old_family = Some(sparse_queue.family);

        if buffer.info.dedicated {
            // Dedicated backing allocations are created on demand, at most
            // once per distinct memory handle.
            let mut seen: Vec<DeviceMemoryHandle> = Vec::new();
            for bind in buffer.sparse_bindings.values() {
                if seen.contains(&bind.memory) {
                    continue;
                }
                seen.push(bind.memory);
                if let Some(mem) = sb.snapshot().device_memories.get(&bind.memory).cloned() {
                    create_device_memory(sb, &mem, true)?;
                }
            }
        }

        let binds: Vec<SparseMemoryBind> = buffer.sparse_bindings.values().copied().collect();
        sb.alloc_read_slice(&binds)?;
        sb.write(Call::QueueBindSparse {
            queue: sparse_queue.handle,
            info: SparseBindInfo {
                buffer_binds: vec![SparseBufferBindInfo {
                    buffer: buffer.handle,
                    binds,
                }],
                ..SparseBindInfo::default()
            },
        });

        if sparse_residency || is_fully_bound(0, buffer.info.size, &buffer.sparse_bindings) {
            for bind in buffer.sparse_bindings.values() {
                let Some(data) = sb
                    .snapshot()
                    .memory_data
                    .bytes(bind.memory, bind.memory_offset, bind.size)
                else {
                    continue;
                };
                contents.extend_from_slice(data);
                copies.push(BufferCopy {
                    src_offset: offset,
                    dst_offset: bind.resource_offset,
                    size: bind.size,
                });
                offset = (offset + bind.size + 7) & !7;
                contents.resize(offset as usize, 0);
            }
        }
    } else {
        let Some(memory) = bound_memory else {
            return Ok(());
        };
        sb.write(Call::BindBufferMemory {
            device: buffer.device,
            buffer: buffer.handle,
            memory: memory.handle,
            offset: buffer.memory_offset,
        });

        let Some(data) = sb.snapshot().memory_data.bytes(
            memory.handle,
            buffer.memory_offset,
            buffer.info.size,
        ) else {
            return Ok(());
        };
        contents.extend_from_slice(data);
        copies.push(BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: buffer.info.size,
        });
    }

    if copies.is_empty() {
        return Ok(());
    }
    let Some(queue) = queue else {
        return Ok(());
    };
    let Some(device) = sb.snapshot().devices.get(&buffer.device).cloned() else {
        return Ok(());
    };

    let (scratch_buffer, scratch_memory) =
        sb.alloc_and_fill_scratch_buffer(&device, &contents, BufferUsage::empty())?;

    let (cb, pool) = sb.get_command_buffer(&queue)?;

    let (src_family, dst_family) = match old_family {
        Some(f) => (f, queue.family),
        None => (0, 0),
    };

    let pre_barrier = BufferBarrier {
        src_access: AccessFlags::MEMORY_WRITE,
        dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        src_queue_family: src_family,
        dst_queue_family: dst_family,
        buffer: scratch_buffer,
        offset: 0,
        size: contents.len() as u64,
    };
    sb.alloc_read(&pre_barrier)?;
    sb.write(Call::Record {
        buffer: cb,
        command: RecordedCommand::PipelineBarrier {
            src_stages: PipelineStageFlags::ALL_COMMANDS,
            dst_stages: PipelineStageFlags::ALL_COMMANDS,
            buffer_barriers: vec![pre_barrier],
            image_barriers: Vec::new(),
        },
    });

    sb.alloc_read_slice(&copies)?;
    sb.write(Call::Record {
        buffer: cb,
        command: RecordedCommand::CopyBuffer {
            src: scratch_buffer,
            dst: buffer.handle,
            regions: copies,
        },
    });

    let post_barrier = BufferBarrier {
        src_access: AccessFlags::MEMORY_WRITE,
        dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        src_queue_family: 0,
        dst_queue_family: 0,
        buffer: buffer.handle,
        offset: 0,
        size: contents.len() as u64,
    };
    sb.alloc_read(&post_barrier)?;
    sb.write(Call::Record {
        buffer: cb,
        command: RecordedCommand::PipelineBarrier {
            src_stages: PipelineStageFlags::ALL_COMMANDS,
            dst_stages: PipelineStageFlags::ALL_COMMANDS,
            buffer_barriers: vec![post_barrier],
            image_barriers: Vec::new(),
        },
    });

    sb.end_submit_and_destroy_command_buffer(&queue, cb, pool)?;
    sb.free_scratch_buffer(device.handle, scratch_buffer, scratch_memory);
    Ok(())
}

fn create_image(
    sb: &mut StateBuilder<'_>,
    img: &ImageObject,
    primer: &mut ImagePrimer,
) -> Result<(), RebuildError> {
    if img.is_swapchain_image {
        sb.record_skipped("image", img.handle.raw(), SkipReason::SwapchainImage);
        return Ok(());
    }

    sb.alloc_read_slice(&img.info.queue_family_indices)?;
    sb.alloc_read(&img.info)?;
    sb.alloc_write(&img.handle)?;
    sb.write(Call::CreateImage {
        device: img.device,
        info: img.info.clone(),
        image: img.handle,
    });
    sb.record_created("image", img.handle.raw());

    sb.alloc_write(&img.memory_requirements)?;
    sb.write(Call::GetImageMemoryRequirements {
        device: img.device,
        image: img.handle,
        requirements: img.memory_requirements,
    });

    let dense_bound = img.memory.is_some();
    let sparse_bound =
        !img.opaque_sparse_bindings.is_empty() || !img.sparse_image_bindings.is_empty();
    let sparse_binding = img.info.flags.contains(ImageCreateFlags::SPARSE_BINDING);
    let sparse_residency =
        sparse_binding && img.info.flags.contains(ImageCreateFlags::SPARSE_RESIDENCY);

    let bound_memory = img.memory.and_then(|m| sb.snapshot().device_memories.get(&m));
    let dedicated_memory =
        bound_memory.is_some_and(|m| m.dedicated.is_some()) || (dense_bound && img.info.dedicated);
    if dedicated_memory {
        if !img.info.dedicated {
            sb.advise(Advisory::MissingDedicatedMetadata {
                kind: "image",
                handle: img.handle.raw(),
            });
        }
        if let Some(mem) = bound_memory {
            if mem.dedicated.is_none() {
                sb.advise(Advisory::MissingDedicatedMetadata {
                    kind: "device memory",
                    handle: mem.handle.raw(),
                });
            }
        }
        if let Some(mem) = bound_memory.cloned() {
            create_device_memory(sb, &mem, true)?;
        }
    }

    if !dense_bound && !sparse_bound {
        return Ok(());
    }

    let queue = sb.queue_for(
        img.last_bound_queue,
        img.device,
        &img.info.queue_family_indices,
    );
    let mut sparse_queue: Option<QueueObject> = None;
    let mut opaque_ranges: Vec<ImageSubresourceRange> = Vec::new();

    if sparse_bound {
        let Some(fallback_queue) = queue else {
            sb.record_skipped("image content", img.handle.raw(), SkipReason::NoQueueAvailable);
            return Ok(());
        };
        let sq = sb
            .sparse_queue_for(
                img.last_bound_queue,
                img.device,
                &img.info.queue_family_indices,
            )
            .unwrap_or(fallback_queue);
        sparse_queue = Some(sq);

        let mut image_binds: Vec<SparseImageBind> = Vec::new();
        let mut seen: Vec<DeviceMemoryHandle> = Vec::new();
        for (aspects, layers) in &img.sparse_image_bindings {
            for (layer, levels) in layers {
                for (level, blocks) in levels {
                    for block in blocks {
                        if img.info.dedicated && !seen.contains(&block.memory) {
                            seen.push(block.memory);
                            if let Some(mem) =
                                sb.snapshot().device_memories.get(&block.memory).cloned()
                            {
                                create_device_memory(sb, &mem, true)?;
                            }
                        }
                        image_binds.push(SparseImageBind {
                            aspects: *aspects,
                            mip_level: *level,
                            array_layer: *layer,
                            bind: *block,
                        });
                    }
                }
            }
        }

        let opaque_binds: Vec<SparseMemoryBind> =
            img.opaque_sparse_bindings.values().copied().collect();
        sb.alloc_read_slice(&opaque_binds)?;
        for bind in &image_binds {
            sb.alloc_read(&bind.bind)?;
        }
        sb.write(Call::QueueBindSparse {
            queue: sq.handle,
            info: SparseBindInfo {
                image_opaque_binds: vec![SparseImageOpaqueBindInfo {
                    image: img.handle,
                    binds: opaque_binds,
                }],
                image_binds: vec![SparseImageBindInfo {
                    image: img.handle,
                    binds: image_binds,
                }],
                ..SparseBindInfo::default()
            },
        });

        if sparse_residency {
            // Content only exists if the metadata mip tail is resident.
            let mut metadata_bound = false;
            for req in img.sparse_memory_requirements.values() {
                if req
                    .format_properties
                    .aspect_mask
                    .contains(ImageAspects::METADATA)
                {
                    metadata_bound = is_fully_bound(
                        req.image_mip_tail_offset,
                        req.image_mip_tail_size,
                        &img.opaque_sparse_bindings,
                    );
                }
            }
            if metadata_bound {
                for req in img.sparse_memory_requirements.values() {
                    if req
                        .format_properties
                        .flags
                        .contains(SparseImageFormatFlags::SINGLE_MIPTAIL)
                    {
                        if !is_fully_bound(
                            req.image_mip_tail_offset,
                            req.image_mip_tail_size,
                            &img.opaque_sparse_bindings,
                        ) {
                            continue;
                        }
                        opaque_ranges.push(ImageSubresourceRange {
                            aspects: img.aspect,
                            base_mip_level: req.image_mip_tail_first_lod,
                            level_count: img.info.mip_levels - req.image_mip_tail_first_lod,
                            base_array_layer: 0,
                            layer_count: img.info.array_layers,
                        });
                    } else {
                        for layer in 0..img.info.array_layers {
                            let offset = req.image_mip_tail_offset
                                + u64::from(layer) * req.image_mip_tail_stride;
                            if !is_fully_bound(
                                offset,
                                req.image_mip_tail_size,
                                &img.opaque_sparse_bindings,
                            ) {
                                continue;
                            }
                            opaque_ranges.push(ImageSubresourceRange {
                                aspects: img.aspect,
                                base_mip_level: req.image_mip_tail_first_lod,
                                level_count: img.info.mip_levels - req.image_mip_tail_first_lod,
                                base_array_layer: layer,
                                layer_count: 1,
                            });
                        }
                    }
                }
            }
        } else if is_fully_bound(
            0,
            img.memory_requirements.size,
            &img.opaque_sparse_bindings,
        ) {
            opaque_ranges.push(ImageSubresourceRange {
                aspects: img.aspect,
                base_mip_level: 0,
                level_count: img.info.mip_levels,
                base_array_layer: 0,
                layer_count: img.info.array_layers,
            });
        }
    } else {
        let Some(memory) = bound_memory else {
            return Ok(());
        };
        opaque_ranges.push(ImageSubresourceRange {
            aspects: img.aspect,
            base_mip_level: 0,
            level_count: img.info.mip_levels,
            base_array_layer: 0,
            layer_count: img.info.array_layers,
        });
        sb.write(Call::BindImageMemory {
            device: img.device,
            image: img.handle,
            memory: memory.handle,
            offset: img.memory_offset,
        });
    }

    // Undefined target layout means the content is undefined too; there is
    // nothing to transition or prime.
    if img.info.layout == ImageLayout::Undefined {
        sb.advise(Advisory::UndefinedLayoutContentSkipped {
            image: img.handle.raw(),
        });
        return Ok(());
    }

    let Some(queue) = queue else {
        return Ok(());
    };

    if img.info.samples != 1 {
        warn!(image = img.handle.raw(), "multisampled image content not primable");
        sb.advise(Advisory::MultisampledContentSkipped {
            image: img.handle.raw(),
        });
        transition_image(
            sb,
            img,
            ImageLayout::Undefined,
            img.info.layout,
            sparse_queue.as_ref(),
            &queue,
        )?;
        return Ok(());
    }
    if img.last_bound_queue.is_none() {
        warn!(
            image = img.handle.raw(),
            "image never used on any queue, priming on an arbitrary queue"
        );
        sb.advise(Advisory::PrimedOnArbitraryQueue {
            image: img.handle.raw(),
        });
    }

    primer.prime(sb, img, &opaque_ranges, &queue, sparse_queue.as_ref())
}

fn create_sampler(sb: &mut StateBuilder<'_>, sampler: &SamplerObject) -> Result<(), RebuildError> {
    sb.alloc_read(&sampler.info)?;
    sb.alloc_write(&sampler.handle)?;
    sb.write(Call::CreateSampler {
        device: sampler.device,
        info: sampler.info.clone(),
        sampler: sampler.handle,
    });
    sb.record_created("sampler", sampler.handle.raw());
    Ok(())
}

fn create_fence(sb: &mut StateBuilder<'_>, fence: &FenceObject) -> Result<(), RebuildError> {
    sb.alloc_read(&(fence.signaled as u32))?;
    sb.alloc_write(&fence.handle)?;
    sb.write(Call::CreateFence {
        device: fence.device,
        signaled: fence.signaled,
        fence: fence.handle,
    });
    sb.record_created("fence", fence.handle.raw());
    Ok(())
}

fn create_semaphore(
    sb: &mut StateBuilder<'_>,
    semaphore: &SemaphoreObject,
) -> Result<(), RebuildError> {
    sb.alloc_write(&semaphore.handle)?;
    sb.write(Call::CreateSemaphore {
        device: semaphore.device,
        semaphore: semaphore.handle,
    });
    sb.record_created("semaphore", semaphore.handle.raw());

    if !semaphore.signaled {
        return Ok(());
    }

    // Re-signal with an empty submit on the original queue, falling back to
    // any queue of the same device.
    let mut queue = semaphore.last_queue;
    if !sb.snapshot().queues.contains_key(&queue) {
        for q in sb.snapshot().queues.values() {
            if q.device == semaphore.device {
                queue = q.handle;
            }
        }
    }
    sb.alloc_read(&semaphore.handle)?;
    sb.write(Call::QueueSubmit {
        queue,
        command_buffers: Vec::new(),
        signal_semaphores: vec![semaphore.handle],
    });
    Ok(())
}

fn create_event(sb: &mut StateBuilder<'_>, event: &EventObject) -> Result<(), RebuildError> {
    sb.alloc_write(&event.handle)?;
    sb.write(Call::CreateEvent {
        device: event.device,
        event: event.handle,
    });
    sb.record_created("event", event.handle.raw());

    if event.signaled {
        sb.write(Call::SetEvent {
            device: event.device,
            event: event.handle,
        });
    }
    Ok(())
}

fn create_command_pool(
    sb: &mut StateBuilder<'_>,
    pool: &CommandPoolObject,
) -> Result<(), RebuildError> {
    sb.alloc_read(&pool.flags)?;
    sb.alloc_write(&pool.handle)?;
    sb.write(Call::CreateCommandPool {
        device: pool.device,
        flags: pool.flags,
        queue_family_index: pool.queue_family_index,
        pool: pool.handle,
    });
    sb.record_created("command pool", pool.handle.raw());
    Ok(())
}

fn create_pipeline_cache(
    sb: &mut StateBuilder<'_>,
    cache: &PipelineCacheObject,
) -> Result<(), RebuildError> {
    sb.alloc_write(&cache.handle)?;
    sb.write(Call::CreatePipelineCache {
        device: cache.device,
        cache: cache.handle,
    });
    sb.record_created("pipeline cache", cache.handle.raw());
    Ok(())
}

fn create_descriptor_set_layout(
    sb: &mut StateBuilder<'_>,
    layout: &DescriptorSetLayoutObject,
) -> Result<(), RebuildError> {
    let mut bindings = Vec::with_capacity(layout.bindings.len());
    for (number, binding) in &layout.bindings {
        if !binding.immutable_samplers.is_empty() {
            sb.alloc_read_slice(&binding.immutable_samplers)?;
        }
        bindings.push((*number, binding.clone()));
    }
    sb.alloc_read(&(bindings.len() as u32))?;
    sb.alloc_write(&layout.handle)?;
    sb.write(Call::CreateDescriptorSetLayout {
        device: layout.device,
        bindings,
        layout: layout.handle,
    });
    sb.record_created("descriptor set layout", layout.handle.raw());
    Ok(())
}

fn create_pipeline_layout(
    sb: &mut StateBuilder<'_>,
    layout: &PipelineLayoutObject,
) -> Result<(), RebuildError> {
    sb.alloc_read_slice(&layout.set_layouts)?;
    sb.alloc_read_slice(&layout.push_constant_ranges)?;
    sb.alloc_write(&layout.handle)?;
    sb.write(Call::CreatePipelineLayout {
        device: layout.device,
        set_layouts: layout.set_layouts.clone(),
        push_constant_ranges: layout.push_constant_ranges.clone(),
        layout: layout.handle,
    });
    sb.record_created("pipeline layout", layout.handle.raw());
    Ok(())
}

fn create_render_pass(
    sb: &mut StateBuilder<'_>,
    render_pass: &RenderPassObject,
) -> Result<(), RebuildError> {
    sb.alloc_read_slice(&render_pass.attachments)?;
    sb.alloc_read_slice(&render_pass.subpasses)?;
    sb.alloc_read_slice(&render_pass.dependencies)?;
    sb.alloc_write(&render_pass.handle)?;
    sb.write(Call::CreateRenderPass {
        device: render_pass.device,
        attachments: render_pass.attachments.clone(),
        subpasses: render_pass.subpasses.clone(),
        dependencies: render_pass.dependencies.clone(),
        render_pass: render_pass.handle,
    });
    sb.record_created("render pass", render_pass.handle.raw());
    Ok(())
}

fn create_shader_module(
    sb: &mut StateBuilder<'_>,
    module: &ShaderModuleObject,
) -> Result<(), RebuildError> {
    sb.alloc_read_slice(&module.words)?;
    sb.alloc_write(&module.handle)?;
    sb.write(Call::CreateShaderModule {
        device: module.device,
        words: module.words.clone(),
        module: module.handle,
    });
    sb.record_created("shader module", module.handle.raw());
    Ok(())
}

fn alloc_specialization(
    sb: &mut StateBuilder<'_>,
    specialization: &Option<SpecializationInfo>,
) -> Result<(), RebuildError> {
    if let Some(spec) = specialization {
        sb.alloc_read(spec)?;
    }
    Ok(())
}

fn create_compute_pipeline(
    sb: &mut StateBuilder<'_>,
    pipeline: &ComputePipelineObject,
) -> Result<(), RebuildError> {
    let cache = pipeline.pipeline_cache.unwrap_or(PipelineCacheHandle::NULL);

    let mut base = PipelineHandle::NULL;
    if !pipeline.base_pipeline.is_null()
        && sb.new_state().pipelines.contains(&pipeline.base_pipeline)
    {
        base = pipeline.base_pipeline;
    }

    // A module destroyed after this pipeline was created in the capture is
    // re-created as a temporary and destroyed right after use.
    let mut temporary_module: Option<ShaderModuleHandle> = None;
    if !sb
        .new_state()
        .shader_modules
        .contains(&pipeline.stage.module.handle)
    {
        create_shader_module(sb, &pipeline.stage.module)?;
        temporary_module = Some(pipeline.stage.module.handle);
    }

    alloc_specialization(sb, &pipeline.stage.specialization)?;
    sb.alloc_read_data(format!("{}\0", pipeline.stage.entry_point).into_bytes())?;
    sb.alloc_write(&pipeline.handle)?;
    sb.write(Call::CreateComputePipeline {
        device: pipeline.device,
        cache,
        flags: pipeline.flags,
        stage: StageInfo {
            stage: pipeline.stage.stage,
            module: pipeline.stage.module.handle,
            entry_point: pipeline.stage.entry_point.clone(),
            specialization: pipeline.stage.specialization.clone(),
        },
        layout: pipeline.layout.handle,
        base_pipeline: base,
        pipeline: pipeline.handle,
    });
    sb.record_created("compute pipeline", pipeline.handle.raw());

    if let Some(module) = temporary_module {
        sb.write(Call::DestroyShaderModule {
            device: pipeline.device,
            module,
        });
    }
    Ok(())
}

fn create_graphics_pipeline(
    sb: &mut StateBuilder<'_>,
    pipeline: &GraphicsPipelineObject,
) -> Result<(), RebuildError> {
    let cache = pipeline.pipeline_cache.unwrap_or(PipelineCacheHandle::NULL);

    let mut base = PipelineHandle::NULL;
    if !pipeline.base_pipeline.is_null()
        && sb.new_state().pipelines.contains(&pipeline.base_pipeline)
    {
        base = pipeline.base_pipeline;
    }

    // Re-create missing dependencies as temporaries before assembling the
    // pipeline payload: their creation calls must not swallow the pending
    // observations of the pipeline call itself.
    let mut temporary_modules: Vec<ShaderModuleHandle> = Vec::new();
    for stage in &pipeline.stages {
        if !sb.new_state().shader_modules.contains(&stage.module.handle) {
            create_shader_module(sb, &stage.module)?;
            temporary_modules.push(stage.module.handle);
        }
    }

    let mut temporary_layout: Option<PipelineLayoutHandle> = None;
    if !sb
        .new_state()
        .pipeline_layouts
        .contains(&pipeline.layout.handle)
    {
        create_pipeline_layout(sb, &pipeline.layout)?;
        temporary_layout = Some(pipeline.layout.handle);
    }

    let mut temporary_render_pass: Option<RenderPassHandle> = None;
    if !sb
        .new_state()
        .render_passes
        .contains(&pipeline.render_pass.handle)
    {
        create_render_pass(sb, &pipeline.render_pass)?;
        temporary_render_pass = Some(pipeline.render_pass.handle);
    }

    let mut stages = Vec::with_capacity(pipeline.stages.len());
    for stage in &pipeline.stages {
        alloc_specialization(sb, &stage.specialization)?;
        sb.alloc_read_data(format!("{}\0", stage.entry_point).into_bytes())?;
        stages.push(StageInfo {
            stage: stage.stage,
            module: stage.module.handle,
            entry_point: stage.entry_point.clone(),
            specialization: stage.specialization.clone(),
        });
    }

    if let Some(viewport_state) = &pipeline.viewport_state {
        sb.alloc_read_slice(&viewport_state.viewports)?;
        sb.alloc_read_slice(&viewport_state.scissors)?;
    }
    if let Some(multisample_state) = &pipeline.multisample_state {
        sb.alloc_read_slice(&multisample_state.sample_mask)?;
    }

    let info = GraphicsPipelineCreateInfo {
        flags: pipeline.flags,
        stages,
        vertex_input_state: pipeline.vertex_input_state.clone(),
        input_assembly_state: pipeline.input_assembly_state,
        tessellation_state: pipeline.tessellation_state,
        viewport_state: pipeline.viewport_state.clone(),
        rasterization_state: pipeline.rasterization_state,
        multisample_state: pipeline.multisample_state.clone(),
        depth_stencil_state: pipeline.depth_stencil_state,
        color_blend_state: pipeline.color_blend_state.clone(),
        dynamic_state: pipeline.dynamic_state.clone(),
        layout: pipeline.layout.handle,
        render_pass: pipeline.render_pass.handle,
        subpass: pipeline.subpass,
        base_pipeline: base,
    };
    sb.alloc_read(&info.flags)?;
    sb.alloc_write(&pipeline.handle)?;
    sb.write(Call::CreateGraphicsPipeline {
        device: pipeline.device,
        cache,
        info: Box::new(info),
        pipeline: pipeline.handle,
    });
    sb.record_created("graphics pipeline", pipeline.handle.raw());

    for module in temporary_modules {
        sb.write(Call::DestroyShaderModule {
            device: pipeline.device,
            module,
        });
    }
    if let Some(render_pass) = temporary_render_pass {
        sb.write(Call::DestroyRenderPass {
            device: pipeline.device,
            render_pass,
        });
    }
    if let Some(layout) = temporary_layout {
        sb.write(Call::DestroyPipelineLayout {
            device: pipeline.device,
            layout,
        });
    }
    Ok(())
}

fn create_image_view(sb: &mut StateBuilder<'_>, view: &ImageViewObject) -> Result<(), RebuildError> {
    if !sb.new_state().images.contains(&view.image) {
        sb.record_skipped(
            "image view",
            view.handle.raw(),
            SkipReason::MissingDependency {
                dependency: "image",
                handle: view.image.raw(),
            },
        );
        return Ok(());
    }

    sb.alloc_read(&view.subresource_range)?;
    sb.alloc_write(&view.handle)?;
    sb.write(Call::CreateImageView {
        device: view.device,
        image: view.image,
        view_type: view.view_type,
        format: view.format,
        components: view.components,
        subresource_range: view.subresource_range,
        view: view.handle,
    });
    sb.record_created("image view", view.handle.raw());
    Ok(())
}

fn create_buffer_view(
    sb: &mut StateBuilder<'_>,
    view: &BufferViewObject,
) -> Result<(), RebuildError> {
    if !sb.new_state().buffers.contains(&view.buffer) {
        sb.record_skipped(
            "buffer view",
            view.handle.raw(),
            SkipReason::MissingDependency {
                dependency: "buffer",
                handle: view.buffer.raw(),
            },
        );
        return Ok(());
    }

    sb.alloc_read(&view.buffer)?;
    sb.alloc_write(&view.handle)?;
    sb.write(Call::CreateBufferView {
        device: view.device,
        buffer: view.buffer,
        format: view.format,
        offset: view.offset,
        range: view.range,
        view: view.handle,
    });
    sb.record_created("buffer view", view.handle.raw());
    Ok(())
}

fn create_descriptor_pool(
    sb: &mut StateBuilder<'_>,
    pool: &DescriptorPoolObject,
) -> Result<(), RebuildError> {
    sb.alloc_read(&(pool.sizes.len() as u32))?;
    sb.alloc_write(&pool.handle)?;
    sb.write(Call::CreateDescriptorPool {
        device: pool.device,
        flags: pool.flags,
        max_sets: pool.max_sets,
        sizes: pool.sizes.clone(),
        pool: pool.handle,
    });
    sb.record_created("descriptor pool", pool.handle.raw());
    Ok(())
}

fn create_framebuffer(
    sb: &mut StateBuilder<'_>,
    framebuffer: &FramebufferObject,
) -> Result<(), RebuildError> {
    let mut temporary_render_pass: Option<RenderPassHandle> = None;
    if !sb
        .new_state()
        .render_passes
        .contains(&framebuffer.render_pass.handle)
    {
        create_render_pass(sb, &framebuffer.render_pass)?;
        temporary_render_pass = Some(framebuffer.render_pass.handle);
    }

    sb.alloc_read_slice(&framebuffer.attachments)?;
    sb.alloc_write(&framebuffer.handle)?;
    sb.write(Call::CreateFramebuffer {
        device: framebuffer.device,
        render_pass: framebuffer.render_pass.handle,
        attachments: framebuffer.attachments.clone(),
        width: framebuffer.width,
        height: framebuffer.height,
        layers: framebuffer.layers,
        framebuffer: framebuffer.handle,
    });
    sb.record_created("framebuffer", framebuffer.handle.raw());

    if let Some(render_pass) = temporary_render_pass {
        sb.write(Call::DestroyRenderPass {
            device: framebuffer.device,
            render_pass,
        });
    }
    Ok(())
}

fn create_descriptor_set(
    sb: &mut StateBuilder<'_>,
    set: &DescriptorSetObject,
) -> Result<(), RebuildError> {
    if !sb.new_state().descriptor_pools.contains(&set.pool) {
        sb.record_skipped(
            "descriptor set",
            set.handle.raw(),
            SkipReason::MissingDependency {
                dependency: "descriptor pool",
                handle: set.pool.raw(),
            },
        );
        return Ok(());
    }

    sb.alloc_read(&set.layout)?;
    sb.alloc_write(&set.handle)?;
    sb.write(Call::AllocateDescriptorSets {
        device: set.device,
        pool: set.pool,
        layouts: vec![set.layout],
        sets: vec![set.handle],
    });
    sb.record_created("descriptor set", set.handle.raw());

    let mut writes: Vec<DescriptorWrite> = Vec::new();
    for (binding_number, binding) in &set.bindings {
        if binding.descriptor_type.is_image() {
            for (element, info) in &binding.image_bindings {
                if info.sampler.is_null() && info.image_view.is_null() {
                    continue;
                }
                if binding.descriptor_type == DescriptorType::CombinedImageSampler
                    && (info.sampler.is_null() || info.image_view.is_null())
                {
                    continue;
                }
                let sampler_dead =
                    !info.sampler.is_null() && !sb.new_state().samplers.contains(&info.sampler);
                let view_dead = !info.image_view.is_null()
                    && !sb.new_state().image_views.contains(&info.image_view);
                if sampler_dead || view_dead {
                    warn!(
                        set = set.handle.raw(),
                        binding = binding_number,
                        element,
                        "descriptor references a dead handle, left empty"
                    );
                    sb.advise(Advisory::DescriptorElementDropped {
                        set: set.handle.raw(),
                        binding: *binding_number,
                        element: *element,
                    });
                    continue;
                }
                sb.alloc_read(info)?;
                writes.push(DescriptorWrite {
                    set: set.handle,
                    binding: *binding_number,
                    array_element: *element,
                    descriptor_type: binding.descriptor_type,
                    image_info: Some(*info),
                    buffer_info: None,
                    texel_buffer_view: None,
                });
            }
        } else if binding.descriptor_type.is_buffer() {
            for (element, info) in &binding.buffer_bindings {
                if info.buffer.is_null() {
                    continue;
                }
                if !sb.new_state().buffers.contains(&info.buffer) {
                    warn!(
                        set = set.handle.raw(),
                        binding = binding_number,
                        element,
                        "descriptor references a dead buffer, left empty"
                    );
                    sb.advise(Advisory::DescriptorElementDropped {
                        set: set.handle.raw(),
                        binding: *binding_number,
                        element: *element,
                    });
                    continue;
                }
                sb.alloc_read(info)?;
                writes.push(DescriptorWrite {
                    set: set.handle,
                    binding: *binding_number,
                    array_element: *element,
                    descriptor_type: binding.descriptor_type,
                    image_info: None,
                    buffer_info: Some(*info),
                    texel_buffer_view: None,
                });
            }
        } else if binding.descriptor_type.is_texel_buffer_view() {
            for (element, view) in &binding.buffer_view_bindings {
                if view.is_null() {
                    continue;
                }
                if !sb.new_state().buffer_views.contains(view) {
                    warn!(
                        set = set.handle.raw(),
                        binding = binding_number,
                        element,
                        "descriptor references a dead buffer view, left empty"
                    );
                    sb.advise(Advisory::DescriptorElementDropped {
                        set: set.handle.raw(),
                        binding: *binding_number,
                        element: *element,
                    });
                    continue;
                }
                sb.alloc_read(view)?;
                writes.push(DescriptorWrite {
                    set: set.handle,
                    binding: *binding_number,
                    array_element: *element,
                    descriptor_type: binding.descriptor_type,
                    image_info: None,
                    buffer_info: None,
                    texel_buffer_view: Some(*view),
                });
            }
        }
    }

    sb.write(Call::UpdateDescriptorSets {
        device: set.device,
        writes,
    });
    Ok(())
}

fn create_query_pool(sb: &mut StateBuilder<'_>, pool: &QueryPoolObject) -> Result<(), RebuildError> {
    sb.alloc_read(&pool.query_count)?;
    sb.alloc_write(&pool.handle)?;
    sb.write(Call::CreateQueryPool {
        device: pool.device,
        query_type: pool.query_type,
        query_count: pool.query_count,
        pipeline_statistics: pool.pipeline_statistics,
        pool: pool.handle,
    });
    sb.record_created("query pool", pool.handle.raw());

    if pool.status.iter().all(|s| *s == QueryStatus::Inactive) {
        return Ok(());
    }
    let Some(queue) = sb.queue_for(None, pool.device, &[]) else {
        sb.record_skipped(
            "query pool state",
            pool.handle.raw(),
            SkipReason::NoQueueAvailable,
        );
        return Ok(());
    };

    let (cb, command_pool) = sb.get_command_buffer(&queue)?;
    for (query, status) in pool.status.iter().enumerate() {
        if *status != QueryStatus::Inactive {
            sb.write(Call::Record {
                buffer: cb,
                command: RecordedCommand::BeginQuery {
                    pool: pool.handle,
                    query: query as u32,
                    flags: QueryControlFlags::empty(),
                },
            });
        }
        if *status == QueryStatus::Complete {
            sb.write(Call::Record {
                buffer: cb,
                command: RecordedCommand::EndQuery {
                    pool: pool.handle,
                    query: query as u32,
                },
            });
        }
    }
    sb.end_submit_and_destroy_command_buffer(&queue, cb, command_pool)
}

fn create_command_buffer(
    sb: &mut StateBuilder<'_>,
    buffer: &CommandBufferObject,
    level: CommandBufferLevel,
) -> Result<(), RebuildError> {
    if buffer.level != level {
        return Ok(());
    }

    sb.alloc_read(&buffer.pool)?;
    sb.alloc_write(&buffer.handle)?;
    sb.write(Call::AllocateCommandBuffers {
        device: buffer.device,
        pool: buffer.pool,
        level: buffer.level,
        buffers: vec![buffer.handle],
    });
    sb.record_created("command buffer", buffer.handle.raw());

    if buffer.recording == RecordingState::NotStarted {
        return Ok(());
    }

    if buffer.begin_info.inherited {
        sb.alloc_read(&buffer.begin_info.inherited_render_pass)?;
    }
    sb.alloc_read(&buffer.begin_info.flags)?;
    sb.write(Call::BeginCommandBuffer {
        buffer: buffer.handle,
        begin_info: buffer.begin_info,
    });

    for command in &buffer.commands {
        // Probe against the simulated state first: an unrecordable command
        // stops this buffer's recording but never the rebuild.
        if let Err(err) = mutate_recorded(command, &mut sb.new_state) {
            warn!(
                buffer = buffer.handle.raw(),
                %err,
                "command buffer is not recordable, recording stopped"
            );
            sb.record_skipped(
                "command buffer recording",
                buffer.handle.raw(),
                SkipReason::NotRecordable,
            );
            return Ok(());
        }
        alloc_recorded_payload(sb, command)?;
        sb.write(Call::Record {
            buffer: buffer.handle,
            command: command.clone(),
        });
    }

    if buffer.recording == RecordingState::Completed {
        sb.write(Call::EndCommandBuffer {
            buffer: buffer.handle,
        });
    }
    Ok(())
}

/// Stage the pointer payloads a recorded command carries.
fn alloc_recorded_payload(
    sb: &mut StateBuilder<'_>,
    command: &RecordedCommand,
) -> Result<(), RebuildError> {
    match command {
        RecordedCommand::CopyBuffer { regions, .. } => {
            sb.alloc_read_slice(regions)?;
        }
        RecordedCommand::CopyImage { regions, .. } => {
            sb.alloc_read_slice(regions)?;
        }
        RecordedCommand::CopyBufferToImage { regions, .. }
        | RecordedCommand::CopyImageToBuffer { regions, .. } => {
            sb.alloc_read_slice(regions)?;
        }
        RecordedCommand::PipelineBarrier {
            buffer_barriers,
            image_barriers,
            ..
        } => {
            sb.alloc_read_slice(buffer_barriers)?;
            sb.alloc_read_slice(image_barriers)?;
        }
        RecordedCommand::BindDescriptorSets {
            sets,
            dynamic_offsets,
            ..
        } => {
            sb.alloc_read_slice(sets)?;
            sb.alloc_read_slice(dynamic_offsets)?;
        }
        RecordedCommand::BindVertexBuffers {
            buffers, offsets, ..
        } => {
            sb.alloc_read_slice(buffers)?;
            sb.alloc_read_slice(offsets)?;
        }
        RecordedCommand::PushConstants { data, .. } => {
            sb.alloc_read_data(data.clone())?;
        }
        RecordedCommand::ExecuteCommands { buffers } => {
            sb.alloc_read_slice(buffers)?;
        }
        RecordedCommand::BeginRenderPass { .. }
        | RecordedCommand::NextSubpass
        | RecordedCommand::EndRenderPass
        | RecordedCommand::BindPipeline { .. }
        | RecordedCommand::BindIndexBuffer { .. }
        | RecordedCommand::Draw { .. }
        | RecordedCommand::DrawIndexed { .. }
        | RecordedCommand::Dispatch { .. }
        | RecordedCommand::SetEvent { .. }
        | RecordedCommand::BeginQuery { .. }
        | RecordedCommand::EndQuery { .. } => {}
    }
    Ok(())
}
