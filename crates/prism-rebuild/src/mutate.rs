//! Applying synthesized calls to the simulated new state.
//!
//! Mutation is a best-effort mirror of what a real target would do: it keeps
//! the live-handle sets consistent so later creation calls can check their
//! references. A mutation failure does not stop the rebuild — the command is
//! emitted anyway, because the real replay target may still accept it — but
//! the failure is surfaced to the caller as an advisory.

use prism_capture::RecordedCommand;
use thiserror::Error;

use crate::call::{Call, Command};
use crate::new_state::NewState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutateError {
    #[error("{category} handle {handle:#x} does not exist")]
    MissingHandle {
        category: &'static str,
        handle: u64,
    },
    #[error("{category} handle {handle:#x} already exists")]
    DuplicateHandle {
        category: &'static str,
        handle: u64,
    },
    #[error("required {what} is null")]
    NullRequired { what: &'static str },
}

macro_rules! require {
    ($state:expr, $table:ident, $category:literal, $handle:expr) => {
        if !$state.$table.contains(&$handle) {
            return Err(MutateError::MissingHandle {
                category: $category,
                handle: $handle.raw(),
            });
        }
    };
}

macro_rules! create {
    ($state:expr, $table:ident, $category:literal, $handle:expr) => {{
        if $handle.is_null() {
            return Err(MutateError::NullRequired { what: $category });
        }
        if !$state.$table.insert($handle) {
            return Err(MutateError::DuplicateHandle {
                category: $category,
                handle: $handle.raw(),
            });
        }
    }};
}

macro_rules! destroy {
    ($state:expr, $table:ident, $category:literal, $handle:expr) => {
        if !$state.$table.remove(&$handle) {
            return Err(MutateError::MissingHandle {
                category: $category,
                handle: $handle.raw(),
            });
        }
    };
}

impl Command {
    pub fn mutate(&self, state: &mut NewState) -> Result<(), MutateError> {
        mutate_call(&self.call, state)
    }
}

pub(crate) fn mutate_call(call: &Call, state: &mut NewState) -> Result<(), MutateError> {
    match call {
        Call::CreateInstance { instance, .. } => create!(state, instances, "instance", *instance),
        Call::EnumeratePhysicalDevices {
            instance, devices, ..
        } => {
            require!(state, instances, "instance", *instance);
            if let Some(devices) = devices {
                for d in devices {
                    // Enumeration is idempotent across the count/fill pair.
                    state.physical_devices.insert(*d);
                }
            }
        }
        Call::GetPhysicalDeviceProperties {
            physical_device, ..
        }
        | Call::GetPhysicalDeviceMemoryProperties {
            physical_device, ..
        }
        | Call::GetPhysicalDeviceQueueFamilyProperties {
            physical_device, ..
        } => {
            require!(state, physical_devices, "physical device", *physical_device);
        }
        Call::CreateSurface {
            instance, surface, ..
        } => {
            require!(state, instances, "instance", *instance);
            create!(state, surfaces, "surface", *surface);
        }
        Call::CreateDevice {
            physical_device,
            device,
            ..
        } => {
            require!(state, physical_devices, "physical device", *physical_device);
            create!(state, devices, "device", *device);
        }
        Call::GetDeviceQueue { device, queue, .. } => {
            require!(state, devices, "device", *device);
            state.queues.insert(*queue);
        }
        Call::CreateSwapchain {
            device,
            info,
            swapchain,
        } => {
            require!(state, devices, "device", *device);
            require!(state, surfaces, "surface", info.surface);
            create!(state, swapchains, "swapchain", *swapchain);
        }
        Call::GetSwapchainImages {
            device,
            swapchain,
            images,
            ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, swapchains, "swapchain", *swapchain);
            if let Some(images) = images {
                for img in images {
                    state.images.insert(*img);
                }
            }
        }
        Call::AllocateMemory { device, memory, .. } => {
            require!(state, devices, "device", *device);
            create!(state, device_memories, "device memory", *memory);
        }
        Call::FreeMemory { device, memory } => {
            require!(state, devices, "device", *device);
            destroy!(state, device_memories, "device memory", *memory);
            state.mapped_memories.remove(memory);
        }
        Call::MapMemory { device, memory, .. } => {
            require!(state, devices, "device", *device);
            require!(state, device_memories, "device memory", *memory);
            state.mapped_memories.insert(*memory);
        }
        Call::FlushMappedMemoryRanges { device, memory, .. } => {
            require!(state, devices, "device", *device);
            require!(state, device_memories, "device memory", *memory);
        }
        Call::UnmapMemory { device, memory } => {
            require!(state, devices, "device", *device);
            require!(state, device_memories, "device memory", *memory);
            state.mapped_memories.remove(memory);
        }
        Call::CreateBuffer { device, buffer, .. } => {
            require!(state, devices, "device", *device);
            create!(state, buffers, "buffer", *buffer);
        }
        Call::DestroyBuffer { device, buffer } => {
            require!(state, devices, "device", *device);
            destroy!(state, buffers, "buffer", *buffer);
        }
        Call::GetBufferMemoryRequirements { device, buffer, .. } => {
            require!(state, devices, "device", *device);
            require!(state, buffers, "buffer", *buffer);
        }
        Call::BindBufferMemory {
            device,
            buffer,
            memory,
            ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, buffers, "buffer", *buffer);
            require!(state, device_memories, "device memory", *memory);
        }
        Call::CreateImage { device, image, .. } => {
            require!(state, devices, "device", *device);
            create!(state, images, "image", *image);
        }
        Call::DestroyImage { device, image } => {
            require!(state, devices, "device", *device);
            destroy!(state, images, "image", *image);
        }
        Call::GetImageMemoryRequirements { device, image, .. } => {
            require!(state, devices, "device", *device);
            require!(state, images, "image", *image);
        }
        Call::BindImageMemory {
            device,
            image,
            memory,
            ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, images, "image", *image);
            require!(state, device_memories, "device memory", *memory);
        }
        Call::CreateSampler {
            device, sampler, ..
        } => {
            require!(state, devices, "device", *device);
            create!(state, samplers, "sampler", *sampler);
        }
        Call::DestroySampler { device, sampler } => {
            require!(state, devices, "device", *device);
            destroy!(state, samplers, "sampler", *sampler);
        }
        Call::CreateFence { device, fence, .. } => {
            require!(state, devices, "device", *device);
            create!(state, fences, "fence", *fence);
        }
        Call::CreateSemaphore { device, semaphore } => {
            require!(state, devices, "device", *device);
            create!(state, semaphores, "semaphore", *semaphore);
        }
        Call::CreateEvent { device, event } => {
            require!(state, devices, "device", *device);
            create!(state, events, "event", *event);
        }
        Call::SetEvent { device, event } => {
            require!(state, devices, "device", *device);
            require!(state, events, "event", *event);
        }
        Call::CreateCommandPool { device, pool, .. } => {
            require!(state, devices, "device", *device);
            create!(state, command_pools, "command pool", *pool);
        }
        Call::DestroyCommandPool { device, pool } => {
            require!(state, devices, "device", *device);
            destroy!(state, command_pools, "command pool", *pool);
            // Destroying a pool frees every buffer allocated from it.
            if let Some(buffers) = state.pool_buffers.remove(pool) {
                for b in buffers {
                    state.command_buffers.remove(&b);
                }
            }
        }
        Call::CreatePipelineCache { device, cache } => {
            require!(state, devices, "device", *device);
            create!(state, pipeline_caches, "pipeline cache", *cache);
        }
        Call::CreateDescriptorSetLayout { device, layout, .. } => {
            require!(state, devices, "device", *device);
            create!(state, descriptor_set_layouts, "descriptor set layout", *layout);
        }
        Call::DestroyDescriptorSetLayout { device, layout } => {
            require!(state, devices, "device", *device);
            destroy!(state, descriptor_set_layouts, "descriptor set layout", *layout);
        }
        Call::CreatePipelineLayout {
            device,
            set_layouts,
            layout,
            ..
        } => {
            require!(state, devices, "device", *device);
            for sl in set_layouts {
                require!(state, descriptor_set_layouts, "descriptor set layout", *sl);
            }
            create!(state, pipeline_layouts, "pipeline layout", *layout);
        }
        Call::DestroyPipelineLayout { device, layout } => {
            require!(state, devices, "device", *device);
            destroy!(state, pipeline_layouts, "pipeline layout", *layout);
        }
        Call::CreateRenderPass {
            device,
            render_pass,
            ..
        } => {
            require!(state, devices, "device", *device);
            create!(state, render_passes, "render pass", *render_pass);
        }
        Call::DestroyRenderPass {
            device,
            render_pass,
        } => {
            require!(state, devices, "device", *device);
            destroy!(state, render_passes, "render pass", *render_pass);
        }
        Call::CreateShaderModule { device, module, .. } => {
            require!(state, devices, "device", *device);
            create!(state, shader_modules, "shader module", *module);
        }
        Call::DestroyShaderModule { device, module } => {
            require!(state, devices, "device", *device);
            destroy!(state, shader_modules, "shader module", *module);
        }
        Call::CreateComputePipeline {
            device,
            cache,
            stage,
            layout,
            base_pipeline,
            pipeline,
            ..
        } => {
            require!(state, devices, "device", *device);
            if !cache.is_null() {
                require!(state, pipeline_caches, "pipeline cache", *cache);
            }
            require!(state, shader_modules, "shader module", stage.module);
            require!(state, pipeline_layouts, "pipeline layout", *layout);
            if !base_pipeline.is_null() {
                require!(state, pipelines, "base pipeline", *base_pipeline);
            }
            create!(state, pipelines, "pipeline", *pipeline);
        }
        Call::CreateGraphicsPipeline {
            device,
            cache,
            info,
            pipeline,
        } => {
            require!(state, devices, "device", *device);
            if !cache.is_null() {
                require!(state, pipeline_caches, "pipeline cache", *cache);
            }
            for stage in &info.stages {
                require!(state, shader_modules, "shader module", stage.module);
            }
            require!(state, pipeline_layouts, "pipeline layout", info.layout);
            require!(state, render_passes, "render pass", info.render_pass);
            if !info.base_pipeline.is_null() {
                require!(state, pipelines, "base pipeline", info.base_pipeline);
            }
            create!(state, pipelines, "pipeline", *pipeline);
        }
        Call::DestroyPipeline { device, pipeline } => {
            require!(state, devices, "device", *device);
            destroy!(state, pipelines, "pipeline", *pipeline);
        }
        Call::CreateImageView {
            device, image, view, ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, images, "image", *image);
            create!(state, image_views, "image view", *view);
        }
        Call::DestroyImageView { device, view } => {
            require!(state, devices, "device", *device);
            destroy!(state, image_views, "image view", *view);
        }
        Call::CreateBufferView {
            device, buffer, view, ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, buffers, "buffer", *buffer);
            create!(state, buffer_views, "buffer view", *view);
        }
        Call::DestroyBufferView { device, view } => {
            require!(state, devices, "device", *device);
            destroy!(state, buffer_views, "buffer view", *view);
        }
        Call::CreateDescriptorPool { device, pool, .. } => {
            require!(state, devices, "device", *device);
            create!(state, descriptor_pools, "descriptor pool", *pool);
        }
        Call::DestroyDescriptorPool { device, pool } => {
            require!(state, devices, "device", *device);
            destroy!(state, descriptor_pools, "descriptor pool", *pool);
            // Destroying a pool implicitly frees every set allocated from it.
            if let Some(sets) = state.pool_sets.remove(pool) {
                for s in sets {
                    state.descriptor_sets.remove(&s);
                }
            }
        }
        Call::CreateFramebuffer {
            device,
            render_pass,
            attachments,
            framebuffer,
            ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, render_passes, "render pass", *render_pass);
            for view in attachments {
                require!(state, image_views, "image view", *view);
            }
            create!(state, framebuffers, "framebuffer", *framebuffer);
        }
        Call::DestroyFramebuffer {
            device,
            framebuffer,
        } => {
            require!(state, devices, "device", *device);
            destroy!(state, framebuffers, "framebuffer", *framebuffer);
        }
        Call::AllocateDescriptorSets {
            device,
            pool,
            layouts,
            sets,
        } => {
            require!(state, devices, "device", *device);
            require!(state, descriptor_pools, "descriptor pool", *pool);
            for l in layouts {
                require!(state, descriptor_set_layouts, "descriptor set layout", *l);
            }
            for s in sets {
                create!(state, descriptor_sets, "descriptor set", *s);
            }
            state
                .pool_sets
                .entry(*pool)
                .or_default()
                .extend(sets.iter().copied());
        }
        Call::UpdateDescriptorSets { device, writes } => {
            require!(state, devices, "device", *device);
            for w in writes {
                require!(state, descriptor_sets, "descriptor set", w.set);
            }
        }
        Call::CreateQueryPool { device, pool, .. } => {
            require!(state, devices, "device", *device);
            create!(state, query_pools, "query pool", *pool);
        }
        Call::AllocateCommandBuffers {
            device,
            pool,
            buffers,
            ..
        } => {
            require!(state, devices, "device", *device);
            require!(state, command_pools, "command pool", *pool);
            for b in buffers {
                create!(state, command_buffers, "command buffer", *b);
            }
            state
                .pool_buffers
                .entry(*pool)
                .or_default()
                .extend(buffers.iter().copied());
        }
        Call::BeginCommandBuffer { buffer, .. } | Call::EndCommandBuffer { buffer } => {
            require!(state, command_buffers, "command buffer", *buffer);
        }
        Call::Record { buffer, command } => {
            require!(state, command_buffers, "command buffer", *buffer);
            mutate_recorded(command, state)?;
        }
        Call::QueueSubmit {
            queue,
            command_buffers,
            signal_semaphores,
        } => {
            require!(state, queues, "queue", *queue);
            for b in command_buffers {
                require!(state, command_buffers, "command buffer", *b);
            }
            for s in signal_semaphores {
                require!(state, semaphores, "semaphore", *s);
            }
        }
        Call::QueueWaitIdle { queue } => {
            // Wait-idle is an immediate synchronous no-op during
            // construction; blocking only happens at real replay time.
            require!(state, queues, "queue", *queue);
        }
        Call::QueueBindSparse { queue, info } => {
            require!(state, queues, "queue", *queue);
            for b in &info.buffer_binds {
                require!(state, buffers, "buffer", b.buffer);
                for bind in &b.binds {
                    require!(state, device_memories, "device memory", bind.memory);
                }
            }
            for b in &info.image_opaque_binds {
                require!(state, images, "image", b.image);
                for bind in &b.binds {
                    require!(state, device_memories, "device memory", bind.memory);
                }
            }
            for b in &info.image_binds {
                require!(state, images, "image", b.image);
                for bind in &b.binds {
                    require!(state, device_memories, "device memory", bind.bind.memory);
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn mutate_recorded(cmd: &RecordedCommand, state: &mut NewState) -> Result<(), MutateError> {
    match cmd {
        RecordedCommand::CopyBuffer { src, dst, .. } => {
            require!(state, buffers, "buffer", *src);
            require!(state, buffers, "buffer", *dst);
        }
        RecordedCommand::CopyImage { src, dst, .. } => {
            require!(state, images, "image", *src);
            require!(state, images, "image", *dst);
        }
        RecordedCommand::CopyBufferToImage { src, dst, .. } => {
            require!(state, buffers, "buffer", *src);
            require!(state, images, "image", *dst);
        }
        RecordedCommand::CopyImageToBuffer { src, dst, .. } => {
            require!(state, images, "image", *src);
            require!(state, buffers, "buffer", *dst);
        }
        RecordedCommand::PipelineBarrier {
            buffer_barriers,
            image_barriers,
            ..
        } => {
            for b in buffer_barriers {
                require!(state, buffers, "buffer", b.buffer);
            }
            for b in image_barriers {
                require!(state, images, "image", b.image);
            }
        }
        RecordedCommand::BeginRenderPass {
            render_pass,
            framebuffer,
            ..
        } => {
            require!(state, render_passes, "render pass", *render_pass);
            require!(state, framebuffers, "framebuffer", *framebuffer);
        }
        RecordedCommand::NextSubpass | RecordedCommand::EndRenderPass => {}
        RecordedCommand::BindPipeline { pipeline, .. } => {
            require!(state, pipelines, "pipeline", *pipeline);
        }
        RecordedCommand::BindDescriptorSets { layout, sets, .. } => {
            require!(state, pipeline_layouts, "pipeline layout", *layout);
            for s in sets {
                require!(state, descriptor_sets, "descriptor set", *s);
            }
        }
        RecordedCommand::BindVertexBuffers { buffers, .. } => {
            for b in buffers {
                require!(state, buffers, "buffer", *b);
            }
        }
        RecordedCommand::BindIndexBuffer { buffer, .. } => {
            require!(state, buffers, "buffer", *buffer);
        }
        RecordedCommand::PushConstants { layout, .. } => {
            require!(state, pipeline_layouts, "pipeline layout", *layout);
        }
        RecordedCommand::Draw { .. }
        | RecordedCommand::DrawIndexed { .. }
        | RecordedCommand::Dispatch { .. } => {}
        RecordedCommand::SetEvent { event, .. } => {
            require!(state, events, "event", *event);
        }
        RecordedCommand::BeginQuery { pool, .. } | RecordedCommand::EndQuery { pool, .. } => {
            require!(state, query_pools, "query pool", *pool);
        }
        RecordedCommand::ExecuteCommands { buffers } => {
            for b in buffers {
                require!(state, command_buffers, "command buffer", *b);
            }
        }
    }
    Ok(())
}
