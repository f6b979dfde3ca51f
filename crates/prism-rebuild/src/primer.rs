//! Resource content priming: copying live byte content from the snapshot's
//! mapped memory into the freshly created, possibly sparsely-bound, image.
//!
//! Strategy selection runs in fixed priority order on the image's usage
//! bits: transfer-destination usage primes with a device-side copy from an
//! uploaded scratch buffer; attachment usage primes by rendering from a
//! staging image; storage usage primes with an image-store dispatch; images
//! with none of those are left with undefined content.

use prism_capture::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::builder::StateBuilder;
use crate::call::{Call, DescriptorWrite, GraphicsPipelineCreateInfo, StageInfo};
use crate::report::RebuildError;

/// Fullscreen-triangle vertex stage used for render priming. The words are
/// a prebuilt module; replay only needs them byte-identical, not compiled.
const PRIME_RENDER_VERT_WORDS: &[u32] = &[
    0x0723_0203, 0x0001_0000, 0x0008_000b, 0x0000_002d, 0x0000_0000, 0x0002_0011, 0x0000_0001,
    0x0006_000b, 0x0000_0001, 0x4c53_4c47, 0x6474_732e, 0x3035_342e, 0x0000_0000, 0x0003_000e,
    0x0000_0000, 0x0000_0001, 0x0007_000f, 0x0000_0000, 0x0000_0004, 0x6e69_616d, 0x0000_0000,
    0x0000_000d, 0x0000_0012,
];

/// Fragment stage sampling the staging image into a color attachment.
const PRIME_RENDER_FRAG_WORDS: &[u32] = &[
    0x0723_0203, 0x0001_0000, 0x0008_000b, 0x0000_0021, 0x0000_0000, 0x0002_0011, 0x0000_0001,
    0x0006_000b, 0x0000_0001, 0x4c53_4c47, 0x6474_732e, 0x3035_342e, 0x0000_0000, 0x0003_000e,
    0x0000_0000, 0x0000_0001, 0x0008_000f, 0x0000_0004, 0x0000_0004, 0x6e69_616d, 0x0000_0000,
    0x0000_0009, 0x0000_0011, 0x0000_0015,
];

/// Fragment stage writing sampled depth through the depth output.
const PRIME_RENDER_DEPTH_FRAG_WORDS: &[u32] = &[
    0x0723_0203, 0x0001_0000, 0x0008_000b, 0x0000_0025, 0x0000_0000, 0x0002_0011, 0x0000_0001,
    0x0006_000b, 0x0000_0001, 0x4c53_4c47, 0x6474_732e, 0x3035_342e, 0x0000_0000, 0x0003_000e,
    0x0000_0000, 0x0000_0001, 0x0008_000f, 0x0000_0004, 0x0000_0004, 0x6e69_616d, 0x0000_0000,
    0x0000_000b, 0x0000_0013, 0x0000_0017, 0x0003_0003,
];

/// Compute stage copying texels from a storage texel buffer into a storage
/// image, one invocation per texel.
const PRIME_STORE_COMP_WORDS: &[u32] = &[
    0x0723_0203, 0x0001_0000, 0x0008_000b, 0x0000_0031, 0x0000_0000, 0x0002_0011, 0x0000_0001,
    0x0002_0011, 0x0000_002e, 0x0006_000b, 0x0000_0001, 0x4c53_4c47, 0x6474_732e, 0x3035_342e,
    0x0000_0000, 0x0003_000e, 0x0000_0000, 0x0000_0001, 0x0006_000f, 0x0000_0005, 0x0000_0004,
    0x6e69_616d, 0x0000_0000, 0x0000_000c, 0x0006_0010, 0x0000_0004, 0x0000_0011, 0x0000_0008,
    0x0000_0008, 0x0000_0001,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PrimeStrategy {
    BufferCopy,
    Render,
    Store,
    Skip,
}

pub(crate) fn select_strategy(usage: ImageUsage) -> PrimeStrategy {
    let attachment = ImageUsage::COLOR_ATTACHMENT | ImageUsage::DEPTH_STENCIL_ATTACHMENT;
    if usage.contains(ImageUsage::TRANSFER_DST) {
        PrimeStrategy::BufferCopy
    } else if usage.intersects(attachment) {
        PrimeStrategy::Render
    } else if usage.contains(ImageUsage::STORAGE) {
        PrimeStrategy::Store
    } else {
        PrimeStrategy::Skip
    }
}

struct RenderHelpers {
    vert: ShaderModuleHandle,
    frag_color: ShaderModuleHandle,
    frag_depth: ShaderModuleHandle,
    sampler: SamplerHandle,
    set_layout: DescriptorSetLayoutHandle,
    pipeline_layout: PipelineLayoutHandle,
    descriptor_pool: DescriptorPoolHandle,
}

struct StoreHelpers {
    comp: ShaderModuleHandle,
    set_layout: DescriptorSetLayoutHandle,
    pipeline_layout: PipelineLayoutHandle,
    descriptor_pool: DescriptorPoolHandle,
}

/// Owns the per-device helper objects priming creates on demand. All of
/// them are destroyed by [`ImagePrimer::free`] once the image pass is done,
/// leaving the new state's object counts unchanged.
pub(crate) struct ImagePrimer {
    render: BTreeMap<DeviceHandle, RenderHelpers>,
    store: BTreeMap<DeviceHandle, StoreHelpers>,
}

impl ImagePrimer {
    pub(crate) fn new() -> Self {
        Self {
            render: BTreeMap::new(),
            store: BTreeMap::new(),
        }
    }

    pub(crate) fn free(&mut self, sb: &mut StateBuilder<'_>) {
        for (device, h) in std::mem::take(&mut self.render) {
            sb.write(Call::DestroyShaderModule { device, module: h.vert });
            sb.write(Call::DestroyShaderModule { device, module: h.frag_color });
            sb.write(Call::DestroyShaderModule { device, module: h.frag_depth });
            sb.write(Call::DestroySampler { device, sampler: h.sampler });
            sb.write(Call::DestroyDescriptorPool { device, pool: h.descriptor_pool });
            sb.write(Call::DestroyPipelineLayout { device, layout: h.pipeline_layout });
            sb.write(Call::DestroyDescriptorSetLayout { device, layout: h.set_layout });
        }
        for (device, h) in std::mem::take(&mut self.store) {
            sb.write(Call::DestroyShaderModule { device, module: h.comp });
            sb.write(Call::DestroyDescriptorPool { device, pool: h.descriptor_pool });
            sb.write(Call::DestroyPipelineLayout { device, layout: h.pipeline_layout });
            sb.write(Call::DestroyDescriptorSetLayout { device, layout: h.set_layout });
        }
    }

    /// Prime the content of `img` over `opaque_ranges` (already proven
    /// bound) using `queue` for ownership and submission.
    pub(crate) fn prime(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        opaque_ranges: &[ImageSubresourceRange],
        queue: &QueueObject,
        sparse_queue: Option<&QueueObject>,
    ) -> Result<(), RebuildError> {
        match select_strategy(img.info.usage) {
            PrimeStrategy::BufferCopy => {
                self.prime_by_buffer_copy(sb, img, opaque_ranges, queue, sparse_queue)
            }
            PrimeStrategy::Render => self.prime_by_rendering(sb, img, opaque_ranges, queue),
            PrimeStrategy::Store => self.prime_by_image_store(sb, img, opaque_ranges, queue),
            PrimeStrategy::Skip => {
                debug!(image = img.handle.raw(), "image has no primable usage, content left undefined");
                Ok(())
            }
        }
    }

    fn prime_by_buffer_copy(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        opaque_ranges: &[ImageSubresourceRange],
        queue: &QueueObject,
        sparse_queue: Option<&QueueObject>,
    ) -> Result<(), RebuildError> {
        let (contents, copies) = staging_contents(sb, img, opaque_ranges);
        if copies.is_empty() {
            return Ok(());
        }

        let device = match sb.snapshot().devices.get(&img.device) {
            Some(d) => d.clone(),
            None => return Ok(()),
        };
        let (scratch_buffer, scratch_memory) =
            sb.alloc_and_fill_scratch_buffer(&device, &contents, BufferUsage::empty())?;

        let (cb, pool) = sb.get_command_buffer(queue)?;

        let old_family = sparse_queue.map(|q| q.family).unwrap_or(queue.family);
        barrier(sb, cb, img, ImageLayout::Undefined, ImageLayout::TransferDst, old_family, queue.family)?;

        sb.alloc_read_slice(&copies)?;
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::CopyBufferToImage {
                src: scratch_buffer,
                dst: img.handle,
                dst_layout: ImageLayout::TransferDst,
                regions: copies,
            },
        });

        barrier(sb, cb, img, ImageLayout::TransferDst, img.info.layout, queue.family, queue.family)?;

        sb.end_submit_and_destroy_command_buffer(queue, cb, pool)?;
        sb.free_scratch_buffer(device.handle, scratch_buffer, scratch_memory);
        Ok(())
    }

    fn prime_by_rendering(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        opaque_ranges: &[ImageSubresourceRange],
        queue: &QueueObject,
    ) -> Result<(), RebuildError> {
        let device = match sb.snapshot().devices.get(&img.device) {
            Some(d) => d.clone(),
            None => return Ok(()),
        };

        // Stage the captured content into a sampled staging image first; the
        // actual priming renders from it into the target per subresource.
        let staging = self.create_staging_image(sb, img, &device)?;
        let (contents, copies) = staging_contents(sb, img, opaque_ranges);
        if !copies.is_empty() {
            let (scratch_buffer, scratch_memory) =
                sb.alloc_and_fill_scratch_buffer(&device, &contents, BufferUsage::empty())?;
            let (cb, pool) = sb.get_command_buffer(queue)?;
            barrier_image(sb, cb, staging.image, img, ImageLayout::Undefined, ImageLayout::TransferDst, queue.family)?;
            sb.alloc_read_slice(&copies)?;
            sb.write(Call::Record {
                buffer: cb,
                command: RecordedCommand::CopyBufferToImage {
                    src: scratch_buffer,
                    dst: staging.image,
                    dst_layout: ImageLayout::TransferDst,
                    regions: copies,
                },
            });
            barrier_image(sb, cb, staging.image, img, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly, queue.family)?;
            sb.end_submit_and_destroy_command_buffer(queue, cb, pool)?;
            sb.free_scratch_buffer(device.handle, scratch_buffer, scratch_memory);
        }

        let helpers = self.render_helpers(sb, &device)?;
        let depth = img.info.format.has_depth();
        let frag = if depth { helpers.frag_depth } else { helpers.frag_color };
        let (vert, sampler, set_layout, pipeline_layout, descriptor_pool) = (
            helpers.vert,
            helpers.sampler,
            helpers.set_layout,
            helpers.pipeline_layout,
            helpers.descriptor_pool,
        );

        for range in opaque_ranges {
            // Stencil content cannot be written from a fragment stage here;
            // leave it undefined rather than half-prime it.
            if range.aspects == ImageAspects::STENCIL {
                warn!(image = img.handle.raw(), "stencil aspect not primable by rendering");
                continue;
            }
            for layer in range.base_array_layer..range.base_array_layer + range.layer_count {
                for mip in range.base_mip_level..range.base_mip_level + range.level_count {
                    let size =
                        level_size(img.info.extent, img.info.format, mip, range.aspects);
                    self.render_one_subresource(
                        sb,
                        img,
                        &staging,
                        queue,
                        RenderPrime {
                            vert,
                            frag,
                            sampler,
                            set_layout,
                            pipeline_layout,
                            descriptor_pool,
                            depth,
                            aspects: range.aspects,
                            layer,
                            mip,
                            width: size.width as u32,
                            height: size.height as u32,
                        },
                    )?;
                }
            }
        }

        sb.write(Call::DestroyImage {
            device: device.handle,
            image: staging.image,
        });
        sb.write(Call::FreeMemory {
            device: device.handle,
            memory: staging.memory,
        });
        Ok(())
    }

    fn prime_by_image_store(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        opaque_ranges: &[ImageSubresourceRange],
        queue: &QueueObject,
    ) -> Result<(), RebuildError> {
        let device = match sb.snapshot().devices.get(&img.device) {
            Some(d) => d.clone(),
            None => return Ok(()),
        };
        let helpers = self.store_helpers(sb, &device)?;
        let (comp, set_layout, pipeline_layout, descriptor_pool) = (
            helpers.comp,
            helpers.set_layout,
            helpers.pipeline_layout,
            helpers.descriptor_pool,
        );

        for range in opaque_ranges {
            for layer in range.base_array_layer..range.base_array_layer + range.layer_count {
                for mip in range.base_mip_level..range.base_mip_level + range.level_count {
                    let Some(texels) = image_subresource_bytes(sb, img, range.aspects, layer, mip)
                    else {
                        continue;
                    };
                    let size = level_size(img.info.extent, img.info.format, mip, range.aspects);
                    self.store_one_subresource(
                        sb,
                        img,
                        &device,
                        queue,
                        StoreDispatch {
                            comp,
                            set_layout,
                            pipeline_layout,
                            descriptor_pool,
                            aspects: range.aspects,
                            layer,
                            mip,
                            extent: Extent3D {
                                width: size.width as u32,
                                height: size.height as u32,
                                depth: size.depth as u32,
                            },
                        },
                        &texels,
                    )?;
                }
            }
        }
        Ok(())
    }

    // -- helper object construction ----------------------------------------

    fn render_helpers(
        &mut self,
        sb: &mut StateBuilder<'_>,
        device: &DeviceObject,
    ) -> Result<&RenderHelpers, RebuildError> {
        if !self.render.contains_key(&device.handle) {
            let vert = create_shader(sb, device.handle, PRIME_RENDER_VERT_WORDS)?;
            let frag_color = create_shader(sb, device.handle, PRIME_RENDER_FRAG_WORDS)?;
            let frag_depth = create_shader(sb, device.handle, PRIME_RENDER_DEPTH_FRAG_WORDS)?;

            let sampler = SamplerHandle(sb.fresh_handle());
            let info = SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                ..SamplerCreateInfo::default()
            };
            sb.alloc_read(&info)?;
            sb.alloc_write(&sampler)?;
            sb.write(Call::CreateSampler {
                device: device.handle,
                info,
                sampler,
            });

            let set_layout = create_set_layout(
                sb,
                device.handle,
                vec![(
                    0,
                    DescriptorSetLayoutBinding {
                        descriptor_type: DescriptorType::CombinedImageSampler,
                        count: 1,
                        stages: ShaderStageFlags::FRAGMENT,
                        immutable_samplers: Vec::new(),
                    },
                )],
            )?;
            let pipeline_layout = create_pipeline_layout(sb, device.handle, set_layout)?;
            let descriptor_pool = create_descriptor_pool(
                sb,
                device.handle,
                vec![(DescriptorType::CombinedImageSampler, 1024)],
            )?;

            self.render.insert(
                device.handle,
                RenderHelpers {
                    vert,
                    frag_color,
                    frag_depth,
                    sampler,
                    set_layout,
                    pipeline_layout,
                    descriptor_pool,
                },
            );
        }
        Ok(&self.render[&device.handle])
    }

    fn store_helpers(
        &mut self,
        sb: &mut StateBuilder<'_>,
        device: &DeviceObject,
    ) -> Result<&StoreHelpers, RebuildError> {
        if !self.store.contains_key(&device.handle) {
            let comp = create_shader(sb, device.handle, PRIME_STORE_COMP_WORDS)?;
            let set_layout = create_set_layout(
                sb,
                device.handle,
                vec![
                    (
                        0,
                        DescriptorSetLayoutBinding {
                            descriptor_type: DescriptorType::StorageImage,
                            count: 1,
                            stages: ShaderStageFlags::COMPUTE,
                            immutable_samplers: Vec::new(),
                        },
                    ),
                    (
                        1,
                        DescriptorSetLayoutBinding {
                            descriptor_type: DescriptorType::StorageTexelBuffer,
                            count: 1,
                            stages: ShaderStageFlags::COMPUTE,
                            immutable_samplers: Vec::new(),
                        },
                    ),
                ],
            )?;
            let pipeline_layout = create_pipeline_layout(sb, device.handle, set_layout)?;
            let descriptor_pool = create_descriptor_pool(
                sb,
                device.handle,
                vec![
                    (DescriptorType::StorageImage, 1024),
                    (DescriptorType::StorageTexelBuffer, 1024),
                ],
            )?;
            self.store.insert(
                device.handle,
                StoreHelpers {
                    comp,
                    set_layout,
                    pipeline_layout,
                    descriptor_pool,
                },
            );
        }
        Ok(&self.store[&device.handle])
    }

    fn create_staging_image(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        device: &DeviceObject,
    ) -> Result<StagingImage, RebuildError> {
        let image = ImageHandle(sb.fresh_handle());
        let memory = DeviceMemoryHandle(sb.fresh_handle());

        let info = ImageCreateInfo {
            flags: ImageCreateFlags::empty(),
            usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            queue_family_indices: Vec::new(),
            sharing_mode: SharingMode::Exclusive,
            layout: ImageLayout::Undefined,
            dedicated: false,
            ..img.info.clone()
        };
        sb.alloc_read(&info)?;
        sb.alloc_write(&image)?;
        sb.write(Call::CreateImage {
            device: device.handle,
            info,
            image,
        });

        sb.alloc_write(&img.memory_requirements)?;
        sb.write(Call::GetImageMemoryRequirements {
            device: device.handle,
            image,
            requirements: img.memory_requirements,
        });

        let alloc_size = img.memory_requirements.size.max(1);
        sb.alloc_read(&alloc_size)?;
        sb.alloc_write(&memory)?;
        sb.write(Call::AllocateMemory {
            device: device.handle,
            allocation_size: alloc_size,
            memory_type_index: 0,
            dedicated: None,
            memory,
        });
        sb.write(Call::BindImageMemory {
            device: device.handle,
            image,
            memory,
            offset: 0,
        });

        Ok(StagingImage { image, memory })
    }

    fn render_one_subresource(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        staging: &StagingImage,
        queue: &QueueObject,
        pass: RenderPrime,
    ) -> Result<(), RebuildError> {
        let device = img.device;

        let src_view = create_view(sb, device, staging.image, img, pass.aspects, pass.layer, pass.mip)?;
        let dst_view = create_view(sb, device, img.handle, img, pass.aspects, pass.layer, pass.mip)?;

        let (load_layout, attachment_layout) = if pass.depth {
            (img.info.layout, ImageLayout::DepthStencilAttachment)
        } else {
            (img.info.layout, ImageLayout::ColorAttachment)
        };

        let render_pass = RenderPassHandle(sb.fresh_handle());
        let attachment = AttachmentDescription {
            format: img.info.format,
            samples: 1,
            load_op: AttachmentLoadOp::DontCare,
            store_op: AttachmentStoreOp::Store,
            stencil_load_op: AttachmentLoadOp::DontCare,
            stencil_store_op: AttachmentStoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: load_layout,
        };
        let reference = AttachmentReference {
            attachment: 0,
            layout: attachment_layout,
        };
        let subpass = if pass.depth {
            SubpassDescription {
                depth_stencil_attachment: Some(reference),
                ..SubpassDescription::default()
            }
        } else {
            SubpassDescription {
                color_attachments: vec![reference],
                ..SubpassDescription::default()
            }
        };
        sb.alloc_read(&attachment)?;
        sb.alloc_write(&render_pass)?;
        sb.write(Call::CreateRenderPass {
            device,
            attachments: vec![attachment],
            subpasses: vec![subpass],
            dependencies: Vec::new(),
            render_pass,
        });

        let framebuffer = FramebufferHandle(sb.fresh_handle());
        sb.alloc_read(&dst_view)?;
        sb.alloc_write(&framebuffer)?;
        sb.write(Call::CreateFramebuffer {
            device,
            render_pass,
            attachments: vec![dst_view],
            width: pass.width,
            height: pass.height,
            layers: 1,
            framebuffer,
        });

        let pipeline = PipelineHandle(sb.fresh_handle());
        let info = GraphicsPipelineCreateInfo {
            flags: PipelineCreateFlags::empty(),
            stages: vec![
                StageInfo {
                    stage: ShaderStageFlags::VERTEX,
                    module: pass.vert,
                    entry_point: "main".to_owned(),
                    specialization: None,
                },
                StageInfo {
                    stage: ShaderStageFlags::FRAGMENT,
                    module: pass.frag,
                    entry_point: "main".to_owned(),
                    specialization: None,
                },
            ],
            vertex_input_state: VertexInputState::default(),
            input_assembly_state: InputAssemblyState::default(),
            tessellation_state: None,
            viewport_state: Some(ViewportState {
                viewport_count: 1,
                viewports: vec![Viewport {
                    width: pass.width as f32,
                    height: pass.height as f32,
                    max_depth: 1.0,
                    ..Viewport::default()
                }],
                scissor_count: 1,
                scissors: vec![Rect2D {
                    x: 0,
                    y: 0,
                    width: pass.width,
                    height: pass.height,
                }],
            }),
            rasterization_state: RasterizationState {
                line_width: 1.0,
                ..RasterizationState::default()
            },
            multisample_state: Some(MultisampleState {
                rasterization_samples: 1,
                ..MultisampleState::default()
            }),
            depth_stencil_state: pass.depth.then(|| DepthStencilState {
                depth_test_enable: true,
                depth_write_enable: true,
                depth_compare_op: CompareOp::Always,
                ..DepthStencilState::default()
            }),
            color_blend_state: (!pass.depth).then(|| ColorBlendState {
                attachments: vec![ColorBlendAttachment {
                    color_write_mask: 0xf,
                    ..ColorBlendAttachment::default()
                }],
                ..ColorBlendState::default()
            }),
            dynamic_state: None,
            layout: pass.pipeline_layout,
            render_pass,
            subpass: 0,
            base_pipeline: PipelineHandle::NULL,
        };
        sb.alloc_read(&info.flags)?;
        sb.alloc_write(&pipeline)?;
        sb.write(Call::CreateGraphicsPipeline {
            device,
            cache: PipelineCacheHandle::NULL,
            info: Box::new(info),
            pipeline,
        });

        let set = DescriptorSetHandle(sb.fresh_handle());
        sb.alloc_read(&pass.set_layout)?;
        sb.alloc_write(&set)?;
        sb.write(Call::AllocateDescriptorSets {
            device,
            pool: pass.descriptor_pool,
            layouts: vec![pass.set_layout],
            sets: vec![set],
        });
        let image_info = DescriptorImageInfo {
            sampler: pass.sampler,
            image_view: src_view,
            layout: ImageLayout::ShaderReadOnly,
        };
        sb.alloc_read(&image_info)?;
        sb.write(Call::UpdateDescriptorSets {
            device,
            writes: vec![DescriptorWrite {
                set,
                binding: 0,
                array_element: 0,
                descriptor_type: DescriptorType::CombinedImageSampler,
                image_info: Some(image_info),
                buffer_info: None,
                texel_buffer_view: None,
            }],
        });

        let (cb, pool) = sb.get_command_buffer(queue)?;
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::BeginRenderPass {
                render_pass,
                framebuffer,
                render_area: Rect2D {
                    x: 0,
                    y: 0,
                    width: pass.width,
                    height: pass.height,
                },
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::BindPipeline {
                bind_point: PipelineBindPoint::Graphics,
                pipeline,
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::BindDescriptorSets {
                bind_point: PipelineBindPoint::Graphics,
                layout: pass.pipeline_layout,
                first_set: 0,
                sets: vec![set],
                dynamic_offsets: Vec::new(),
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::EndRenderPass,
        });
        sb.end_submit_and_destroy_command_buffer(queue, cb, pool)?;

        sb.write(Call::DestroyPipeline { device, pipeline });
        sb.write(Call::DestroyFramebuffer { device, framebuffer });
        sb.write(Call::DestroyRenderPass { device, render_pass });
        sb.write(Call::DestroyImageView { device, view: dst_view });
        sb.write(Call::DestroyImageView { device, view: src_view });
        Ok(())
    }

    fn store_one_subresource(
        &mut self,
        sb: &mut StateBuilder<'_>,
        img: &ImageObject,
        device: &DeviceObject,
        queue: &QueueObject,
        dispatch: StoreDispatch,
        texels: &[u8],
    ) -> Result<(), RebuildError> {
        let (scratch_buffer, scratch_memory) = sb.alloc_and_fill_scratch_buffer(
            device,
            texels,
            BufferUsage::STORAGE_TEXEL_BUFFER,
        )?;

        let buffer_view = BufferViewHandle(sb.fresh_handle());
        sb.alloc_read(&scratch_buffer)?;
        sb.alloc_write(&buffer_view)?;
        sb.write(Call::CreateBufferView {
            device: device.handle,
            buffer: scratch_buffer,
            format: Format::R32Uint,
            offset: 0,
            range: texels.len() as u64,
            view: buffer_view,
        });

        let image_view = create_view(
            sb,
            device.handle,
            img.handle,
            img,
            dispatch.aspects,
            dispatch.layer,
            dispatch.mip,
        )?;

        let set = DescriptorSetHandle(sb.fresh_handle());
        sb.alloc_read(&dispatch.set_layout)?;
        sb.alloc_write(&set)?;
        sb.write(Call::AllocateDescriptorSets {
            device: device.handle,
            pool: dispatch.descriptor_pool,
            layouts: vec![dispatch.set_layout],
            sets: vec![set],
        });
        let image_info = DescriptorImageInfo {
            sampler: SamplerHandle::NULL,
            image_view,
            layout: ImageLayout::General,
        };
        sb.alloc_read(&image_info)?;
        sb.alloc_read(&buffer_view)?;
        sb.write(Call::UpdateDescriptorSets {
            device: device.handle,
            writes: vec![
                DescriptorWrite {
                    set,
                    binding: 0,
                    array_element: 0,
                    descriptor_type: DescriptorType::StorageImage,
                    image_info: Some(image_info),
                    buffer_info: None,
                    texel_buffer_view: None,
                },
                DescriptorWrite {
                    set,
                    binding: 1,
                    array_element: 0,
                    descriptor_type: DescriptorType::StorageTexelBuffer,
                    image_info: None,
                    buffer_info: None,
                    texel_buffer_view: Some(buffer_view),
                },
            ],
        });

        let pipeline = PipelineHandle(sb.fresh_handle());
        sb.alloc_read(&dispatch.pipeline_layout)?;
        sb.alloc_write(&pipeline)?;
        sb.write(Call::CreateComputePipeline {
            device: device.handle,
            cache: PipelineCacheHandle::NULL,
            flags: PipelineCreateFlags::empty(),
            stage: StageInfo {
                stage: ShaderStageFlags::COMPUTE,
                module: dispatch.comp,
                entry_point: "main".to_owned(),
                specialization: None,
            },
            layout: dispatch.pipeline_layout,
            base_pipeline: PipelineHandle::NULL,
            pipeline,
        });

        let (cb, pool) = sb.get_command_buffer(queue)?;
        barrier(sb, cb, img, ImageLayout::Undefined, ImageLayout::General, queue.family, queue.family)?;
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::BindPipeline {
                bind_point: PipelineBindPoint::Compute,
                pipeline,
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::BindDescriptorSets {
                bind_point: PipelineBindPoint::Compute,
                layout: dispatch.pipeline_layout,
                first_set: 0,
                sets: vec![set],
                dynamic_offsets: Vec::new(),
            },
        });
        sb.write(Call::Record {
            buffer: cb,
            command: RecordedCommand::Dispatch {
                x: dispatch.extent.width.div_ceil(8),
                y: dispatch.extent.height.div_ceil(8),
                z: dispatch.extent.depth,
            },
        });
        barrier(sb, cb, img, ImageLayout::General, img.info.layout, queue.family, queue.family)?;
        sb.end_submit_and_destroy_command_buffer(queue, cb, pool)?;

        sb.write(Call::DestroyPipeline {
            device: device.handle,
            pipeline,
        });
        sb.write(Call::DestroyImageView {
            device: device.handle,
            view: image_view,
        });
        sb.write(Call::DestroyBufferView {
            device: device.handle,
            view: buffer_view,
        });
        sb.write(Call::DestroyBuffer {
            device: device.handle,
            buffer: scratch_buffer,
        });
        sb.write(Call::FreeMemory {
            device: device.handle,
            memory: scratch_memory,
        });
        Ok(())
    }
}

struct StagingImage {
    image: ImageHandle,
    memory: DeviceMemoryHandle,
}

struct RenderPrime {
    vert: ShaderModuleHandle,
    frag: ShaderModuleHandle,
    sampler: SamplerHandle,
    set_layout: DescriptorSetLayoutHandle,
    pipeline_layout: PipelineLayoutHandle,
    descriptor_pool: DescriptorPoolHandle,
    depth: bool,
    aspects: ImageAspects,
    layer: u32,
    mip: u32,
    width: u32,
    height: u32,
}

struct StoreDispatch {
    comp: ShaderModuleHandle,
    set_layout: DescriptorSetLayoutHandle,
    pipeline_layout: PipelineLayoutHandle,
    descriptor_pool: DescriptorPoolHandle,
    aspects: ImageAspects,
    layer: u32,
    mip: u32,
    extent: Extent3D,
}

// -- shared emission helpers ----------------------------------------------

fn create_shader(
    sb: &mut StateBuilder<'_>,
    device: DeviceHandle,
    words: &[u32],
) -> Result<ShaderModuleHandle, RebuildError> {
    let module = ShaderModuleHandle(sb.fresh_handle());
    sb.alloc_read_slice(words)?;
    sb.alloc_write(&module)?;
    sb.write(Call::CreateShaderModule {
        device,
        words: words.to_vec(),
        module,
    });
    Ok(module)
}

fn create_set_layout(
    sb: &mut StateBuilder<'_>,
    device: DeviceHandle,
    bindings: Vec<(u32, DescriptorSetLayoutBinding)>,
) -> Result<DescriptorSetLayoutHandle, RebuildError> {
    let layout = DescriptorSetLayoutHandle(sb.fresh_handle());
    sb.alloc_read(&(bindings.len() as u32))?;
    sb.alloc_write(&layout)?;
    sb.write(Call::CreateDescriptorSetLayout {
        device,
        bindings,
        layout,
    });
    Ok(layout)
}

fn create_pipeline_layout(
    sb: &mut StateBuilder<'_>,
    device: DeviceHandle,
    set_layout: DescriptorSetLayoutHandle,
) -> Result<PipelineLayoutHandle, RebuildError> {
    let layout = PipelineLayoutHandle(sb.fresh_handle());
    sb.alloc_read(&set_layout)?;
    sb.alloc_write(&layout)?;
    sb.write(Call::CreatePipelineLayout {
        device,
        set_layouts: vec![set_layout],
        push_constant_ranges: Vec::new(),
        layout,
    });
    Ok(layout)
}

fn create_descriptor_pool(
    sb: &mut StateBuilder<'_>,
    device: DeviceHandle,
    sizes: Vec<(DescriptorType, u32)>,
) -> Result<DescriptorPoolHandle, RebuildError> {
    let pool = DescriptorPoolHandle(sb.fresh_handle());
    sb.alloc_read(&(sizes.len() as u32))?;
    sb.alloc_write(&pool)?;
    sb.write(Call::CreateDescriptorPool {
        device,
        flags: DescriptorPoolCreateFlags::empty(),
        max_sets: 1024,
        sizes,
        pool,
    });
    Ok(pool)
}

fn create_view(
    sb: &mut StateBuilder<'_>,
    device: DeviceHandle,
    image: ImageHandle,
    img: &ImageObject,
    aspects: ImageAspects,
    layer: u32,
    mip: u32,
) -> Result<ImageViewHandle, RebuildError> {
    let view = ImageViewHandle(sb.fresh_handle());
    let range = ImageSubresourceRange {
        aspects,
        base_mip_level: mip,
        level_count: 1,
        base_array_layer: layer,
        layer_count: 1,
    };
    let view_type = match img.info.image_type {
        ImageType::D1 => ImageViewType::D1,
        ImageType::D2 => ImageViewType::D2,
        ImageType::D3 => ImageViewType::D3,
    };
    sb.alloc_read(&range)?;
    sb.alloc_write(&view)?;
    sb.write(Call::CreateImageView {
        device,
        image,
        view_type,
        format: img.info.format,
        components: ComponentMapping::default(),
        subresource_range: range,
        view,
    });
    Ok(view)
}

fn barrier(
    sb: &mut StateBuilder<'_>,
    cb: CommandBufferHandle,
    img: &ImageObject,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
    src_family: u32,
    dst_family: u32,
) -> Result<(), RebuildError> {
    let image_barrier = ImageBarrier {
        src_access: AccessFlags::MEMORY_WRITE,
        dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        old_layout,
        new_layout,
        src_queue_family: src_family,
        dst_queue_family: dst_family,
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
    Ok(())
}

/// Barrier for a helper image that borrows `img`'s geometry.
fn barrier_image(
    sb: &mut StateBuilder<'_>,
    cb: CommandBufferHandle,
    image: ImageHandle,
    img: &ImageObject,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
    family: u32,
) -> Result<(), RebuildError> {
    let image_barrier = ImageBarrier {
        src_access: AccessFlags::MEMORY_WRITE,
        dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        old_layout,
        new_layout,
        src_queue_family: family,
        dst_queue_family: family,
        image,
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
    Ok(())
}

// -- captured content access ----------------------------------------------

/// Offset of (aspect, layer, mip) within the image's natural subresource
/// layout: aspects in bit order, layers within an aspect, 8-byte-aligned
/// level sizes within a layer.
fn subresource_offset(img: &ImageObject, aspect: ImageAspects, layer: u32, mip: u32) -> u64 {
    let mut offset = 0u64;
    for bit in aspect_bits(img.aspect) {
        let per_layer: u64 = (0..img.info.mip_levels)
            .map(|m| level_size(img.info.extent, img.info.format, m, bit).aligned_level_size)
            .sum();
        if bit == aspect {
            offset += u64::from(layer) * per_layer;
            offset += (0..mip)
                .map(|m| level_size(img.info.extent, img.info.format, m, bit).aligned_level_size)
                .sum::<u64>();
            return offset;
        }
        offset += per_layer * u64::from(img.info.array_layers);
    }
    offset
}

pub(crate) fn aspect_bits(aspects: ImageAspects) -> Vec<ImageAspects> {
    [
        ImageAspects::COLOR,
        ImageAspects::DEPTH,
        ImageAspects::STENCIL,
        ImageAspects::PLANE_0,
        ImageAspects::PLANE_1,
        ImageAspects::PLANE_2,
    ]
    .into_iter()
    .filter(|b| aspects.contains(*b))
    .collect()
}

/// Captured bytes of one subresource, in image packing, or `None` when the
/// backing content was not captured.
pub(crate) fn image_subresource_bytes(
    sb: &StateBuilder<'_>,
    img: &ImageObject,
    aspect: ImageAspects,
    layer: u32,
    mip: u32,
) -> Option<Vec<u8>> {
    let size = level_size(img.info.extent, img.info.format, mip, aspect);
    let offset = subresource_offset(img, aspect, layer, mip);
    let snapshot = sb.snapshot();

    if let Some(memory) = img.memory {
        return snapshot
            .memory_data
            .bytes(memory, img.memory_offset + offset, size.level_size)
            .map(<[u8]>::to_vec);
    }

    // Sparse: stitch the range together from the opaque binds covering it.
    let mut out = Vec::with_capacity(size.level_size as usize);
    let mut cursor = offset;
    let end = offset + size.level_size;
    while cursor < end {
        let (_, bind) = img
            .opaque_sparse_bindings
            .range(..=cursor)
            .next_back()
            .filter(|(_, b)| b.resource_offset + b.size > cursor)?;
        let run = (bind.resource_offset + bind.size).min(end) - cursor;
        let src = snapshot.memory_data.bytes(
            bind.memory,
            bind.memory_offset + (cursor - bind.resource_offset),
            run,
        )?;
        out.extend_from_slice(src);
        cursor += run;
    }
    Some(out)
}

/// Repack a depth subresource from image packing to linear-buffer packing.
fn repack_depth_for_buffer(img: &ImageObject, bytes: &[u8]) -> Vec<u8> {
    let in_image = img.info.format.depth_element_size(false) as usize;
    let in_buffer = img.info.format.depth_element_size(true) as usize;
    if in_image == in_buffer || in_image == 0 {
        return bytes.to_vec();
    }
    let mut out = Vec::with_capacity(bytes.len() / in_image * in_buffer);
    for texel in bytes.chunks_exact(in_image) {
        out.extend_from_slice(texel);
        out.resize(out.len() + (in_buffer - in_image), 0);
    }
    out
}

/// Gather staging-buffer contents and the matching buffer→image copy
/// regions for every subresource in `opaque_ranges`. Contents are packed at
/// 8-byte-aligned offsets in linear-buffer layout.
pub(crate) fn staging_contents(
    sb: &StateBuilder<'_>,
    img: &ImageObject,
    opaque_ranges: &[ImageSubresourceRange],
) -> (Vec<u8>, Vec<BufferImageCopy>) {
    let mut contents: Vec<u8> = Vec::new();
    let mut copies: Vec<BufferImageCopy> = Vec::new();

    for range in opaque_ranges {
        for aspect in aspect_bits(range.aspects) {
            for layer in range.base_array_layer..range.base_array_layer + range.layer_count {
                for mip in range.base_mip_level..range.base_mip_level + range.level_count {
                    let Some(bytes) = image_subresource_bytes(sb, img, aspect, layer, mip) else {
                        debug!(
                            image = img.handle.raw(),
                            ?aspect,
                            layer,
                            mip,
                            "subresource content not captured, left undefined"
                        );
                        continue;
                    };
                    let bytes = if aspect == ImageAspects::DEPTH {
                        repack_depth_for_buffer(img, &bytes)
                    } else {
                        bytes
                    };
                    let size = level_size(img.info.extent, img.info.format, mip, aspect);
                    copies.push(BufferImageCopy {
                        buffer_offset: contents.len() as u64,
                        buffer_row_length: 0,
                        buffer_image_height: 0,
                        aspects: aspect,
                        mip_level: mip,
                        base_array_layer: layer,
                        layer_count: 1,
                        image_offset: Offset3D::default(),
                        image_extent: Extent3D {
                            width: size.width as u32,
                            height: size.height as u32,
                            depth: size.depth as u32,
                        },
                    });
                    contents.extend_from_slice(&bytes);
                    let aligned = (contents.len() + 7) & !7;
                    contents.resize(aligned, 0);
                }
            }
        }
    }
    (contents, copies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_priority_is_fixed() {
        assert_eq!(
            select_strategy(ImageUsage::TRANSFER_DST | ImageUsage::STORAGE),
            PrimeStrategy::BufferCopy
        );
        assert_eq!(
            select_strategy(ImageUsage::COLOR_ATTACHMENT | ImageUsage::STORAGE),
            PrimeStrategy::Render
        );
        assert_eq!(
            select_strategy(ImageUsage::DEPTH_STENCIL_ATTACHMENT),
            PrimeStrategy::Render
        );
        assert_eq!(select_strategy(ImageUsage::STORAGE), PrimeStrategy::Store);
        assert_eq!(select_strategy(ImageUsage::SAMPLED), PrimeStrategy::Skip);
    }

    #[test]
    fn aspect_bits_split_in_declaration_order() {
        let bits = aspect_bits(ImageAspects::DEPTH | ImageAspects::STENCIL);
        assert_eq!(bits, vec![ImageAspects::DEPTH, ImageAspects::STENCIL]);
    }
}
