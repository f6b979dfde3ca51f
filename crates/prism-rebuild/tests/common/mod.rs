//! Shared snapshot fixture: one device with one graphics/compute/sparse
//! queue, a handful of resources with captured content, and a few
//! deliberately-degenerate objects (destroyed pipeline dependencies, a dead
//! descriptor pool) to exercise the recovery paths.

// Not every test binary touches every fixture handle.
#![allow(dead_code)]

use std::collections::BTreeMap;

use prism_capture::*;

pub const INSTANCE: InstanceHandle = InstanceHandle(1);
pub const PHYSICAL_DEVICE: PhysicalDeviceHandle = PhysicalDeviceHandle(2);
pub const DEVICE: DeviceHandle = DeviceHandle(3);
pub const QUEUE: QueueHandle = QueueHandle(4);
pub const MEMORY: DeviceMemoryHandle = DeviceMemoryHandle(5);
pub const BUFFER: BufferHandle = BufferHandle(6);
pub const IMAGE: ImageHandle = ImageHandle(7);
pub const SAMPLER: SamplerHandle = SamplerHandle(8);
pub const FENCE: FenceHandle = FenceHandle(9);
pub const SEMAPHORE: SemaphoreHandle = SemaphoreHandle(10);
pub const EVENT: EventHandle = EventHandle(11);
pub const COMMAND_POOL: CommandPoolHandle = CommandPoolHandle(12);
pub const PIPELINE_CACHE: PipelineCacheHandle = PipelineCacheHandle(13);
pub const SET_LAYOUT: DescriptorSetLayoutHandle = DescriptorSetLayoutHandle(14);
pub const PIPELINE_LAYOUT: PipelineLayoutHandle = PipelineLayoutHandle(15);
pub const RENDER_PASS: RenderPassHandle = RenderPassHandle(16);
pub const SHADER_MODULE: ShaderModuleHandle = ShaderModuleHandle(17);
pub const COMPUTE_PIPELINE: PipelineHandle = PipelineHandle(18);
/// Module destroyed in the capture after the compute pipeline was created.
pub const DEAD_SHADER_MODULE: ShaderModuleHandle = ShaderModuleHandle(19);
pub const GRAPHICS_PIPELINE: PipelineHandle = PipelineHandle(20);
pub const DERIVED_PIPELINE: PipelineHandle = PipelineHandle(21);
pub const IMAGE_VIEW: ImageViewHandle = ImageViewHandle(24);
pub const BUFFER_VIEW: BufferViewHandle = BufferViewHandle(25);
pub const DESCRIPTOR_POOL: DescriptorPoolHandle = DescriptorPoolHandle(26);
pub const FRAMEBUFFER: FramebufferHandle = FramebufferHandle(27);
/// Render pass destroyed in the capture after the framebuffer was created.
pub const DEAD_RENDER_PASS: RenderPassHandle = RenderPassHandle(28);
pub const DESCRIPTOR_SET: DescriptorSetHandle = DescriptorSetHandle(29);
pub const ORPHAN_DESCRIPTOR_SET: DescriptorSetHandle = DescriptorSetHandle(30);
pub const DEAD_DESCRIPTOR_POOL: DescriptorPoolHandle = DescriptorPoolHandle(31);
pub const QUERY_POOL: QueryPoolHandle = QueryPoolHandle(32);
pub const PRIMARY_CB: CommandBufferHandle = CommandBufferHandle(33);
pub const SECONDARY_CB: CommandBufferHandle = CommandBufferHandle(34);
pub const SURFACE: SurfaceHandle = SurfaceHandle(35);
pub const SWAPCHAIN: SwapchainHandle = SwapchainHandle(36);
pub const SWAPCHAIN_IMAGE: ImageHandle = ImageHandle(37);

pub fn image_info(usage: ImageUsage, layout: ImageLayout) -> ImageCreateInfo {
    ImageCreateInfo {
        flags: ImageCreateFlags::empty(),
        image_type: ImageType::D2,
        format: Format::R8G8B8A8Unorm,
        extent: Extent3D {
            width: 16,
            height: 16,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: 1,
        tiling: ImageTiling::Optimal,
        usage,
        sharing_mode: SharingMode::Exclusive,
        queue_family_indices: vec![0],
        layout,
        dedicated: false,
    }
}

fn shader_module(handle: ShaderModuleHandle) -> ShaderModuleObject {
    ShaderModuleObject {
        handle,
        device: DEVICE,
        words: vec![0x0723_0203, 0x0001_0000, 0x0008_000b, 0x0000_0010],
    }
}

fn pipeline_layout() -> PipelineLayoutObject {
    PipelineLayoutObject {
        handle: PIPELINE_LAYOUT,
        device: DEVICE,
        set_layouts: vec![SET_LAYOUT],
        push_constant_ranges: Vec::new(),
    }
}

fn render_pass(handle: RenderPassHandle) -> RenderPassObject {
    RenderPassObject {
        handle,
        device: DEVICE,
        attachments: vec![AttachmentDescription {
            format: Format::R8G8B8A8Unorm,
            samples: 1,
            load_op: AttachmentLoadOp::Clear,
            store_op: AttachmentStoreOp::Store,
            stencil_load_op: AttachmentLoadOp::DontCare,
            stencil_store_op: AttachmentStoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::PresentSrc,
        }],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![AttachmentReference {
                attachment: 0,
                layout: ImageLayout::ColorAttachment,
            }],
            ..SubpassDescription::default()
        }],
        dependencies: Vec::new(),
    }
}

fn graphics_pipeline(handle: PipelineHandle, base: PipelineHandle) -> GraphicsPipelineObject {
    GraphicsPipelineObject {
        handle,
        device: DEVICE,
        flags: if base.is_null() {
            PipelineCreateFlags::ALLOW_DERIVATIVES
        } else {
            PipelineCreateFlags::DERIVATIVE
        },
        stages: vec![ShaderStage {
            stage: ShaderStageFlags::VERTEX,
            module: shader_module(SHADER_MODULE),
            entry_point: "main".to_owned(),
            specialization: None,
        }],
        vertex_input_state: VertexInputState::default(),
        input_assembly_state: InputAssemblyState::default(),
        tessellation_state: None,
        viewport_state: Some(ViewportState {
            viewport_count: 1,
            viewports: vec![Viewport {
                width: 16.0,
                height: 16.0,
                max_depth: 1.0,
                ..Viewport::default()
            }],
            scissor_count: 1,
            scissors: vec![Rect2D {
                x: 0,
                y: 0,
                width: 16,
                height: 16,
            }],
        }),
        rasterization_state: RasterizationState {
            line_width: 1.0,
            ..RasterizationState::default()
        },
        multisample_state: None,
        depth_stencil_state: None,
        color_blend_state: None,
        dynamic_state: None,
        layout: pipeline_layout(),
        render_pass: render_pass(RENDER_PASS),
        subpass: 0,
        base_pipeline: base,
        pipeline_cache: Some(PIPELINE_CACHE),
    }
}

pub fn sample_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();

    snapshot.instances.insert(
        INSTANCE,
        InstanceObject {
            handle: INSTANCE,
            enabled_layers: vec!["VK_LAYER_KHRONOS_validation".to_owned()],
            enabled_extensions: vec!["VK_KHR_surface".to_owned()],
        },
    );

    snapshot.physical_devices.insert(
        PHYSICAL_DEVICE,
        PhysicalDeviceObject {
            handle: PHYSICAL_DEVICE,
            instance: INSTANCE,
            properties: PhysicalDeviceProperties {
                api_version: 0x40_0000,
                driver_version: 1,
                vendor_id: 0x10de,
                device_id: 0x2184,
                device_name: "fixture-gpu".to_owned(),
            },
            memory_properties: MemoryProperties {
                types: vec![
                    MemoryType {
                        property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                        heap_index: 0,
                    },
                    MemoryType {
                        property_flags: MemoryPropertyFlags::HOST_VISIBLE
                            | MemoryPropertyFlags::HOST_COHERENT,
                        heap_index: 1,
                    },
                ],
            },
            queue_family_properties: BTreeMap::from([(
                0,
                QueueFamilyProperties {
                    flags: QueueFlags::GRAPHICS
                        | QueueFlags::COMPUTE
                        | QueueFlags::TRANSFER
                        | QueueFlags::SPARSE_BINDING,
                    queue_count: 1,
                    timestamp_valid_bits: 64,
                },
            )]),
        },
    );

    snapshot.surfaces.insert(
        SURFACE,
        SurfaceObject {
            handle: SURFACE,
            instance: INSTANCE,
            kind: SurfaceKind::Xcb,
        },
    );

    snapshot.devices.insert(
        DEVICE,
        DeviceObject {
            handle: DEVICE,
            physical_device: PHYSICAL_DEVICE,
            enabled_layers: Vec::new(),
            enabled_extensions: vec!["VK_KHR_swapchain".to_owned()],
            enabled_features: vec![1, 0, 1],
            queues: vec![DeviceQueueConfig {
                family: 0,
                index: 0,
                priority: 1.0,
            }],
        },
    );

    snapshot.queues.insert(
        QUEUE,
        QueueObject {
            handle: QUEUE,
            device: DEVICE,
            family: 0,
            index: 0,
        },
    );

    snapshot.swapchains.insert(
        SWAPCHAIN,
        SwapchainObject {
            handle: SWAPCHAIN,
            device: DEVICE,
            surface: SURFACE,
            format: Format::B8G8R8A8Unorm,
            color_space: ColorSpace::SrgbNonlinear,
            extent: Extent2D {
                width: 640,
                height: 480,
            },
            array_layers: 1,
            usage: ImageUsage::COLOR_ATTACHMENT,
            sharing_mode: SharingMode::Exclusive,
            queue_family_indices: vec![0],
            pre_transform: SurfaceTransform::Identity,
            composite_alpha: CompositeAlpha::Opaque,
            present_mode: PresentMode::Fifo,
            clipped: true,
            images: vec![SWAPCHAIN_IMAGE],
        },
    );

    snapshot.device_memories.insert(
        MEMORY,
        DeviceMemoryObject {
            handle: MEMORY,
            device: DEVICE,
            allocation_size: 0x2000,
            memory_type_index: 1,
            dedicated: None,
            mapped_location: 0,
            mapped_offset: 0,
            mapped_size: 0,
        },
    );
    snapshot.memory_data.insert(MEMORY, vec![0xab; 0x2000]);

    snapshot.buffers.insert(
        BUFFER,
        BufferObject {
            handle: BUFFER,
            device: DEVICE,
            info: BufferCreateInfo {
                flags: BufferCreateFlags::empty(),
                size: 0x100,
                usage: BufferUsage::VERTEX_BUFFER | BufferUsage::UNIFORM_TEXEL_BUFFER,
                sharing_mode: SharingMode::Exclusive,
                queue_family_indices: vec![0],
                dedicated: false,
            },
            memory: Some(MEMORY),
            memory_offset: 0,
            sparse_bindings: BTreeMap::new(),
            memory_requirements: MemoryRequirements {
                size: 0x100,
                alignment: 0x10,
                memory_type_bits: 0b11,
            },
            last_bound_queue: Some(QUEUE),
        },
    );

    snapshot.images.insert(
        IMAGE,
        ImageObject {
            handle: IMAGE,
            device: DEVICE,
            info: image_info(
                ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
                ImageLayout::ShaderReadOnly,
            ),
            aspect: ImageAspects::COLOR,
            memory: Some(MEMORY),
            memory_offset: 0x400,
            opaque_sparse_bindings: BTreeMap::new(),
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

    snapshot.images.insert(
        SWAPCHAIN_IMAGE,
        ImageObject {
            handle: SWAPCHAIN_IMAGE,
            device: DEVICE,
            info: ImageCreateInfo {
                format: Format::B8G8R8A8Unorm,
                extent: Extent3D {
                    width: 640,
                    height: 480,
                    depth: 1,
                },
                usage: ImageUsage::COLOR_ATTACHMENT,
                layout: ImageLayout::PresentSrc,
                ..image_info(ImageUsage::COLOR_ATTACHMENT, ImageLayout::PresentSrc)
            },
            aspect: ImageAspects::COLOR,
            memory: None,
            memory_offset: 0,
            opaque_sparse_bindings: BTreeMap::new(),
            sparse_image_bindings: SparseImageBindings::new(),
            sparse_memory_requirements: BTreeMap::new(),
            memory_requirements: MemoryRequirements::default(),
            last_bound_queue: Some(QUEUE),
            is_swapchain_image: true,
        },
    );

    snapshot.samplers.insert(
        SAMPLER,
        SamplerObject {
            handle: SAMPLER,
            device: DEVICE,
            info: SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                max_lod: 1.0,
                ..SamplerCreateInfo::default()
            },
        },
    );

    snapshot.fences.insert(
        FENCE,
        FenceObject {
            handle: FENCE,
            device: DEVICE,
            signaled: true,
        },
    );

    snapshot.semaphores.insert(
        SEMAPHORE,
        SemaphoreObject {
            handle: SEMAPHORE,
            device: DEVICE,
            signaled: true,
            last_queue: QUEUE,
        },
    );

    snapshot.events.insert(
        EVENT,
        EventObject {
            handle: EVENT,
            device: DEVICE,
            signaled: true,
        },
    );

    snapshot.command_pools.insert(
        COMMAND_POOL,
        CommandPoolObject {
            handle: COMMAND_POOL,
            device: DEVICE,
            flags: CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: 0,
        },
    );

    snapshot.pipeline_caches.insert(
        PIPELINE_CACHE,
        PipelineCacheObject {
            handle: PIPELINE_CACHE,
            device: DEVICE,
        },
    );

    snapshot.descriptor_set_layouts.insert(
        SET_LAYOUT,
        DescriptorSetLayoutObject {
            handle: SET_LAYOUT,
            device: DEVICE,
            bindings: BTreeMap::from([(
                0,
                DescriptorSetLayoutBinding {
                    descriptor_type: DescriptorType::UniformBuffer,
                    count: 1,
                    stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
                    immutable_samplers: Vec::new(),
                },
            )]),
        },
    );

    snapshot.pipeline_layouts.insert(PIPELINE_LAYOUT, pipeline_layout());
    snapshot.render_passes.insert(RENDER_PASS, render_pass(RENDER_PASS));
    snapshot
        .shader_modules
        .insert(SHADER_MODULE, shader_module(SHADER_MODULE));

    snapshot.compute_pipelines.insert(
        COMPUTE_PIPELINE,
        ComputePipelineObject {
            handle: COMPUTE_PIPELINE,
            device: DEVICE,
            flags: PipelineCreateFlags::empty(),
            stage: ShaderStage {
                stage: ShaderStageFlags::COMPUTE,
                // Destroyed after pipeline creation in the capture: only the
                // retained copy remains.
                module: shader_module(DEAD_SHADER_MODULE),
                entry_point: "main".to_owned(),
                specialization: None,
            },
            layout: pipeline_layout(),
            base_pipeline: PipelineHandle::NULL,
            pipeline_cache: None,
        },
    );

    snapshot
        .graphics_pipelines
        .insert(GRAPHICS_PIPELINE, graphics_pipeline(GRAPHICS_PIPELINE, PipelineHandle::NULL));
    snapshot
        .graphics_pipelines
        .insert(DERIVED_PIPELINE, graphics_pipeline(DERIVED_PIPELINE, GRAPHICS_PIPELINE));

    snapshot.image_views.insert(
        IMAGE_VIEW,
        ImageViewObject {
            handle: IMAGE_VIEW,
            device: DEVICE,
            image: IMAGE,
            view_type: ImageViewType::D2,
            format: Format::R8G8B8A8Unorm,
            components: ComponentMapping::default(),
            subresource_range: ImageSubresourceRange {
                aspects: ImageAspects::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
        },
    );

    snapshot.buffer_views.insert(
        BUFFER_VIEW,
        BufferViewObject {
            handle: BUFFER_VIEW,
            device: DEVICE,
            buffer: BUFFER,
            format: Format::R32Uint,
            offset: 0,
            range: 0x100,
        },
    );

    snapshot.descriptor_pools.insert(
        DESCRIPTOR_POOL,
        DescriptorPoolObject {
            handle: DESCRIPTOR_POOL,
            device: DEVICE,
            flags: DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            max_sets: 8,
            sizes: vec![(DescriptorType::UniformBuffer, 8)],
        },
    );

    snapshot.framebuffers.insert(
        FRAMEBUFFER,
        FramebufferObject {
            handle: FRAMEBUFFER,
            device: DEVICE,
            render_pass: render_pass(DEAD_RENDER_PASS),
            attachments: vec![IMAGE_VIEW],
            width: 16,
            height: 16,
            layers: 1,
        },
    );

    snapshot.descriptor_sets.insert(
        DESCRIPTOR_SET,
        DescriptorSetObject {
            handle: DESCRIPTOR_SET,
            device: DEVICE,
            pool: DESCRIPTOR_POOL,
            layout: SET_LAYOUT,
            bindings: BTreeMap::from([(
                0,
                DescriptorBinding {
                    descriptor_type: DescriptorType::UniformBuffer,
                    image_bindings: BTreeMap::new(),
                    buffer_bindings: BTreeMap::from([(
                        0,
                        DescriptorBufferInfo {
                            buffer: BUFFER,
                            offset: 0,
                            range: 0x100,
                        },
                    )]),
                    buffer_view_bindings: BTreeMap::new(),
                },
            )]),
        },
    );

    // Its pool was destroyed in the capture; the set must be skipped, not
    // abort the rebuild.
    snapshot.descriptor_sets.insert(
        ORPHAN_DESCRIPTOR_SET,
        DescriptorSetObject {
            handle: ORPHAN_DESCRIPTOR_SET,
            device: DEVICE,
            pool: DEAD_DESCRIPTOR_POOL,
            layout: SET_LAYOUT,
            bindings: BTreeMap::new(),
        },
    );

    snapshot.query_pools.insert(
        QUERY_POOL,
        QueryPoolObject {
            handle: QUERY_POOL,
            device: DEVICE,
            query_type: QueryType::Occlusion,
            query_count: 2,
            pipeline_statistics: QueryPipelineStatisticFlags::empty(),
            status: vec![QueryStatus::Complete, QueryStatus::Inactive],
        },
    );

    snapshot.command_buffers.insert(
        PRIMARY_CB,
        CommandBufferObject {
            handle: PRIMARY_CB,
            device: DEVICE,
            pool: COMMAND_POOL,
            level: CommandBufferLevel::Primary,
            recording: RecordingState::Completed,
            begin_info: CommandBufferBeginInfo::default(),
            commands: vec![RecordedCommand::CopyBuffer {
                src: BUFFER,
                dst: BUFFER,
                regions: vec![BufferCopy {
                    src_offset: 0,
                    dst_offset: 0x80,
                    size: 0x40,
                }],
            }],
        },
    );

    snapshot.command_buffers.insert(
        SECONDARY_CB,
        CommandBufferObject {
            handle: SECONDARY_CB,
            device: DEVICE,
            pool: COMMAND_POOL,
            level: CommandBufferLevel::Secondary,
            recording: RecordingState::NotStarted,
            begin_info: CommandBufferBeginInfo::default(),
            commands: Vec::new(),
        },
    );

    snapshot
}
