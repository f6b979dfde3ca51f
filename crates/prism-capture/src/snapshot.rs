//! The captured object graph: one handle-indexed table per category.

use std::collections::BTreeMap;

use crate::handle::*;
use crate::memory::{AddressSpaceLayout, MemoryData};
use crate::objects::*;
use crate::types::MemoryRequirements;

/// Identity of one capture point, used by the memoizing resolve layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(pub u64);

/// Read-only snapshot of every live object at one trace point.
///
/// Tables are `BTreeMap`s so iteration is deterministic and ascending by
/// handle; the rebuild's output order depends on it.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub instances: BTreeMap<InstanceHandle, InstanceObject>,
    pub physical_devices: BTreeMap<PhysicalDeviceHandle, PhysicalDeviceObject>,
    pub surfaces: BTreeMap<SurfaceHandle, SurfaceObject>,
    pub devices: BTreeMap<DeviceHandle, DeviceObject>,
    pub queues: BTreeMap<QueueHandle, QueueObject>,
    pub swapchains: BTreeMap<SwapchainHandle, SwapchainObject>,
    pub device_memories: BTreeMap<DeviceMemoryHandle, DeviceMemoryObject>,
    pub buffers: BTreeMap<BufferHandle, BufferObject>,
    pub images: BTreeMap<ImageHandle, ImageObject>,
    pub samplers: BTreeMap<SamplerHandle, SamplerObject>,
    pub fences: BTreeMap<FenceHandle, FenceObject>,
    pub semaphores: BTreeMap<SemaphoreHandle, SemaphoreObject>,
    pub events: BTreeMap<EventHandle, EventObject>,
    pub command_pools: BTreeMap<CommandPoolHandle, CommandPoolObject>,
    pub pipeline_caches: BTreeMap<PipelineCacheHandle, PipelineCacheObject>,
    pub descriptor_set_layouts: BTreeMap<DescriptorSetLayoutHandle, DescriptorSetLayoutObject>,
    pub pipeline_layouts: BTreeMap<PipelineLayoutHandle, PipelineLayoutObject>,
    pub render_passes: BTreeMap<RenderPassHandle, RenderPassObject>,
    pub shader_modules: BTreeMap<ShaderModuleHandle, ShaderModuleObject>,
    pub compute_pipelines: BTreeMap<PipelineHandle, ComputePipelineObject>,
    pub graphics_pipelines: BTreeMap<PipelineHandle, GraphicsPipelineObject>,
    pub image_views: BTreeMap<ImageViewHandle, ImageViewObject>,
    pub buffer_views: BTreeMap<BufferViewHandle, BufferViewObject>,
    pub descriptor_pools: BTreeMap<DescriptorPoolHandle, DescriptorPoolObject>,
    pub framebuffers: BTreeMap<FramebufferHandle, FramebufferObject>,
    pub descriptor_sets: BTreeMap<DescriptorSetHandle, DescriptorSetObject>,
    pub query_pools: BTreeMap<QueryPoolHandle, QueryPoolObject>,
    pub command_buffers: BTreeMap<CommandBufferHandle, CommandBufferObject>,

    /// Captured contents of host-mapped allocations.
    pub memory_data: MemoryData,
    /// Driver-reported requirements for transfer staging buffers, captured
    /// per device when available.
    pub transfer_buffer_memory_requirements: BTreeMap<DeviceHandle, MemoryRequirements>,
    /// Seed for the simulated replay address space.
    pub address_space: AddressSpaceLayout,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The largest raw handle observed in any category. Fresh handles are
    /// issued above this so a synthetic object can never collide with a
    /// captured one.
    pub fn max_observed_handle(&self) -> u64 {
        let mut max = 0u64;
        macro_rules! scan {
            ($($table:ident),+ $(,)?) => {
                $( if let Some(k) = self.$table.keys().next_back() {
                    max = max.max(k.raw());
                } )+
            };
        }
        scan!(
            instances,
            physical_devices,
            surfaces,
            devices,
            queues,
            swapchains,
            device_memories,
            buffers,
            images,
            samplers,
            fences,
            semaphores,
            events,
            command_pools,
            pipeline_caches,
            descriptor_set_layouts,
            pipeline_layouts,
            render_passes,
            shader_modules,
            compute_pipelines,
            graphics_pipelines,
            image_views,
            buffer_views,
            descriptor_pools,
            framebuffers,
            descriptor_sets,
            query_pools,
            command_buffers,
        );
        max
    }

    /// Queues belonging to `device`, in handle order.
    pub fn queues_on_device(&self, device: DeviceHandle) -> impl Iterator<Item = &QueueObject> {
        self.queues.values().filter(move |q| q.device == device)
    }

    pub fn queue_family_flags(
        &self,
        device: DeviceHandle,
        family: u32,
    ) -> Option<crate::types::QueueFlags> {
        let dev = self.devices.get(&device)?;
        let phys = self.physical_devices.get(&dev.physical_device)?;
        phys.queue_family_properties.get(&family).map(|p| p.flags)
    }
}
