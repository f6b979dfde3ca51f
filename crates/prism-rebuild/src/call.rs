//! The synthetic call model.
//!
//! One [`Call`] is one emitted API call with decoded payloads; a [`Command`]
//! is a call plus the host byte ranges the replay target reads and writes
//! when executing it. The emitted sequence must be replayed exactly in
//! order: later calls depend on handles and memory content produced by
//! earlier ones.

use prism_capture::*;
use prism_interval::MemRange;

/// One queue-family request inside a device creation.
#[derive(Clone, Debug)]
pub struct QueueCreateInfo {
    pub family: u32,
    pub priorities: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct SwapchainCreateInfo {
    pub surface: SurfaceHandle,
    pub min_image_count: u32,
    pub format: Format,
    pub color_space: ColorSpace,
    pub extent: Extent2D,
    pub array_layers: u32,
    pub usage: ImageUsage,
    pub sharing_mode: SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: SurfaceTransform,
    pub composite_alpha: CompositeAlpha,
    pub present_mode: PresentMode,
    pub clipped: bool,
}

/// One shader stage of a pipeline creation, by handle.
#[derive(Clone, Debug)]
pub struct StageInfo {
    pub stage: ShaderStageFlags,
    pub module: ShaderModuleHandle,
    pub entry_point: String,
    pub specialization: Option<SpecializationInfo>,
}

#[derive(Clone, Debug)]
pub struct GraphicsPipelineCreateInfo {
    pub flags: PipelineCreateFlags,
    pub stages: Vec<StageInfo>,
    pub vertex_input_state: VertexInputState,
    pub input_assembly_state: InputAssemblyState,
    pub tessellation_state: Option<TessellationState>,
    pub viewport_state: Option<ViewportState>,
    pub rasterization_state: RasterizationState,
    pub multisample_state: Option<MultisampleState>,
    pub depth_stencil_state: Option<DepthStencilState>,
    pub color_blend_state: Option<ColorBlendState>,
    pub dynamic_state: Option<DynamicState>,
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub subpass: u32,
    pub base_pipeline: PipelineHandle,
}

/// One descriptor write emitted by `UpdateDescriptorSets`.
#[derive(Clone, Debug)]
pub struct DescriptorWrite {
    pub set: DescriptorSetHandle,
    pub binding: u32,
    pub array_element: u32,
    pub descriptor_type: DescriptorType,
    pub image_info: Option<DescriptorImageInfo>,
    pub buffer_info: Option<DescriptorBufferInfo>,
    pub texel_buffer_view: Option<BufferViewHandle>,
}

#[derive(Clone, Debug)]
pub struct SparseBufferBindInfo {
    pub buffer: BufferHandle,
    pub binds: Vec<SparseMemoryBind>,
}

#[derive(Clone, Debug)]
pub struct SparseImageOpaqueBindInfo {
    pub image: ImageHandle,
    pub binds: Vec<SparseMemoryBind>,
}

/// A sparse image block bind flattened to its (aspect, mip, layer) address.
#[derive(Clone, Copy, Debug)]
pub struct SparseImageBind {
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub array_layer: u32,
    pub bind: SparseImageMemoryBind,
}

#[derive(Clone, Debug)]
pub struct SparseImageBindInfo {
    pub image: ImageHandle,
    pub binds: Vec<SparseImageBind>,
}

#[derive(Clone, Debug, Default)]
pub struct SparseBindInfo {
    pub buffer_binds: Vec<SparseBufferBindInfo>,
    pub image_opaque_binds: Vec<SparseImageOpaqueBindInfo>,
    pub image_binds: Vec<SparseImageBindInfo>,
}

#[derive(Clone, Debug)]
pub enum Call {
    CreateInstance {
        enabled_layers: Vec<String>,
        enabled_extensions: Vec<String>,
        instance: InstanceHandle,
    },
    /// `devices: None` is the count query of the two-call enumerate idiom.
    EnumeratePhysicalDevices {
        instance: InstanceHandle,
        device_count: u32,
        devices: Option<Vec<PhysicalDeviceHandle>>,
    },
    GetPhysicalDeviceProperties {
        physical_device: PhysicalDeviceHandle,
        properties: PhysicalDeviceProperties,
    },
    GetPhysicalDeviceMemoryProperties {
        physical_device: PhysicalDeviceHandle,
        properties: MemoryProperties,
    },
    GetPhysicalDeviceQueueFamilyProperties {
        physical_device: PhysicalDeviceHandle,
        family_count: u32,
        families: Option<Vec<QueueFamilyProperties>>,
    },
    CreateSurface {
        instance: InstanceHandle,
        kind: SurfaceKind,
        surface: SurfaceHandle,
    },
    CreateDevice {
        physical_device: PhysicalDeviceHandle,
        queue_create_infos: Vec<QueueCreateInfo>,
        enabled_layers: Vec<String>,
        enabled_extensions: Vec<String>,
        enabled_features: Vec<u32>,
        device: DeviceHandle,
    },
    GetDeviceQueue {
        device: DeviceHandle,
        family: u32,
        index: u32,
        queue: QueueHandle,
    },
    CreateSwapchain {
        device: DeviceHandle,
        info: SwapchainCreateInfo,
        swapchain: SwapchainHandle,
    },
    GetSwapchainImages {
        device: DeviceHandle,
        swapchain: SwapchainHandle,
        image_count: u32,
        images: Option<Vec<ImageHandle>>,
    },
    AllocateMemory {
        device: DeviceHandle,
        allocation_size: u64,
        memory_type_index: u32,
        dedicated: Option<DedicatedAllocation>,
        memory: DeviceMemoryHandle,
    },
    FreeMemory {
        device: DeviceHandle,
        memory: DeviceMemoryHandle,
    },
    MapMemory {
        device: DeviceHandle,
        memory: DeviceMemoryHandle,
        offset: u64,
        size: u64,
        location: u64,
    },
    FlushMappedMemoryRanges {
        device: DeviceHandle,
        memory: DeviceMemoryHandle,
        offset: u64,
        size: u64,
    },
    UnmapMemory {
        device: DeviceHandle,
        memory: DeviceMemoryHandle,
    },
    CreateBuffer {
        device: DeviceHandle,
        info: BufferCreateInfo,
        buffer: BufferHandle,
    },
    DestroyBuffer {
        device: DeviceHandle,
        buffer: BufferHandle,
    },
    GetBufferMemoryRequirements {
        device: DeviceHandle,
        buffer: BufferHandle,
        requirements: MemoryRequirements,
    },
    BindBufferMemory {
        device: DeviceHandle,
        buffer: BufferHandle,
        memory: DeviceMemoryHandle,
        offset: u64,
    },
    CreateImage {
        device: DeviceHandle,
        info: ImageCreateInfo,
        image: ImageHandle,
    },
    DestroyImage {
        device: DeviceHandle,
        image: ImageHandle,
    },
    GetImageMemoryRequirements {
        device: DeviceHandle,
        image: ImageHandle,
        requirements: MemoryRequirements,
    },
    BindImageMemory {
        device: DeviceHandle,
        image: ImageHandle,
        memory: DeviceMemoryHandle,
        offset: u64,
    },
    CreateSampler {
        device: DeviceHandle,
        info: SamplerCreateInfo,
        sampler: SamplerHandle,
    },
    DestroySampler {
        device: DeviceHandle,
        sampler: SamplerHandle,
    },
    CreateFence {
        device: DeviceHandle,
        signaled: bool,
        fence: FenceHandle,
    },
    CreateSemaphore {
        device: DeviceHandle,
        semaphore: SemaphoreHandle,
    },
    CreateEvent {
        device: DeviceHandle,
        event: EventHandle,
    },
    SetEvent {
        device: DeviceHandle,
        event: EventHandle,
    },
    CreateCommandPool {
        device: DeviceHandle,
        flags: CommandPoolCreateFlags,
        queue_family_index: u32,
        pool: CommandPoolHandle,
    },
    DestroyCommandPool {
        device: DeviceHandle,
        pool: CommandPoolHandle,
    },
    CreatePipelineCache {
        device: DeviceHandle,
        cache: PipelineCacheHandle,
    },
    CreateDescriptorSetLayout {
        device: DeviceHandle,
        bindings: Vec<(u32, DescriptorSetLayoutBinding)>,
        layout: DescriptorSetLayoutHandle,
    },
    DestroyDescriptorSetLayout {
        device: DeviceHandle,
        layout: DescriptorSetLayoutHandle,
    },
    CreatePipelineLayout {
        device: DeviceHandle,
        set_layouts: Vec<DescriptorSetLayoutHandle>,
        push_constant_ranges: Vec<PushConstantRange>,
        layout: PipelineLayoutHandle,
    },
    DestroyPipelineLayout {
        device: DeviceHandle,
        layout: PipelineLayoutHandle,
    },
    CreateRenderPass {
        device: DeviceHandle,
        attachments: Vec<AttachmentDescription>,
        subpasses: Vec<SubpassDescription>,
        dependencies: Vec<SubpassDependency>,
        render_pass: RenderPassHandle,
    },
    DestroyRenderPass {
        device: DeviceHandle,
        render_pass: RenderPassHandle,
    },
    CreateShaderModule {
        device: DeviceHandle,
        words: Vec<u32>,
        module: ShaderModuleHandle,
    },
    DestroyShaderModule {
        device: DeviceHandle,
        module: ShaderModuleHandle,
    },
    CreateComputePipeline {
        device: DeviceHandle,
        cache: PipelineCacheHandle,
        flags: PipelineCreateFlags,
        stage: StageInfo,
        layout: PipelineLayoutHandle,
        base_pipeline: PipelineHandle,
        pipeline: PipelineHandle,
    },
    CreateGraphicsPipeline {
        device: DeviceHandle,
        cache: PipelineCacheHandle,
        info: Box<GraphicsPipelineCreateInfo>,
        pipeline: PipelineHandle,
    },
    DestroyPipeline {
        device: DeviceHandle,
        pipeline: PipelineHandle,
    },
    CreateImageView {
        device: DeviceHandle,
        image: ImageHandle,
        view_type: ImageViewType,
        format: Format,
        components: ComponentMapping,
        subresource_range: ImageSubresourceRange,
        view: ImageViewHandle,
    },
    DestroyImageView {
        device: DeviceHandle,
        view: ImageViewHandle,
    },
    CreateBufferView {
        device: DeviceHandle,
        buffer: BufferHandle,
        format: Format,
        offset: u64,
        range: u64,
        view: BufferViewHandle,
    },
    DestroyBufferView {
        device: DeviceHandle,
        view: BufferViewHandle,
    },
    CreateDescriptorPool {
        device: DeviceHandle,
        flags: DescriptorPoolCreateFlags,
        max_sets: u32,
        sizes: Vec<(DescriptorType, u32)>,
        pool: DescriptorPoolHandle,
    },
    DestroyDescriptorPool {
        device: DeviceHandle,
        pool: DescriptorPoolHandle,
    },
    CreateFramebuffer {
        device: DeviceHandle,
        render_pass: RenderPassHandle,
        attachments: Vec<ImageViewHandle>,
        width: u32,
        height: u32,
        layers: u32,
        framebuffer: FramebufferHandle,
    },
    DestroyFramebuffer {
        device: DeviceHandle,
        framebuffer: FramebufferHandle,
    },
    AllocateDescriptorSets {
        device: DeviceHandle,
        pool: DescriptorPoolHandle,
        layouts: Vec<DescriptorSetLayoutHandle>,
        sets: Vec<DescriptorSetHandle>,
    },
    UpdateDescriptorSets {
        device: DeviceHandle,
        writes: Vec<DescriptorWrite>,
    },
    CreateQueryPool {
        device: DeviceHandle,
        query_type: QueryType,
        query_count: u32,
        pipeline_statistics: QueryPipelineStatisticFlags,
        pool: QueryPoolHandle,
    },
    AllocateCommandBuffers {
        device: DeviceHandle,
        pool: CommandPoolHandle,
        level: CommandBufferLevel,
        buffers: Vec<CommandBufferHandle>,
    },
    BeginCommandBuffer {
        buffer: CommandBufferHandle,
        begin_info: CommandBufferBeginInfo,
    },
    EndCommandBuffer {
        buffer: CommandBufferHandle,
    },
    /// One sub-command re-recorded into `buffer`.
    Record {
        buffer: CommandBufferHandle,
        command: RecordedCommand,
    },
    QueueSubmit {
        queue: QueueHandle,
        command_buffers: Vec<CommandBufferHandle>,
        signal_semaphores: Vec<SemaphoreHandle>,
    },
    QueueWaitIdle {
        queue: QueueHandle,
    },
    QueueBindSparse {
        queue: QueueHandle,
        info: SparseBindInfo,
    },
}

impl Call {
    /// Short call name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreateInstance { .. } => "CreateInstance",
            Call::EnumeratePhysicalDevices { .. } => "EnumeratePhysicalDevices",
            Call::GetPhysicalDeviceProperties { .. } => "GetPhysicalDeviceProperties",
            Call::GetPhysicalDeviceMemoryProperties { .. } => "GetPhysicalDeviceMemoryProperties",
            Call::GetPhysicalDeviceQueueFamilyProperties { .. } => {
                "GetPhysicalDeviceQueueFamilyProperties"
            }
            Call::CreateSurface { .. } => "CreateSurface",
            Call::CreateDevice { .. } => "CreateDevice",
            Call::GetDeviceQueue { .. } => "GetDeviceQueue",
            Call::CreateSwapchain { .. } => "CreateSwapchain",
            Call::GetSwapchainImages { .. } => "GetSwapchainImages",
            Call::AllocateMemory { .. } => "AllocateMemory",
            Call::FreeMemory { .. } => "FreeMemory",
            Call::MapMemory { .. } => "MapMemory",
            Call::FlushMappedMemoryRanges { .. } => "FlushMappedMemoryRanges",
            Call::UnmapMemory { .. } => "UnmapMemory",
            Call::CreateBuffer { .. } => "CreateBuffer",
            Call::DestroyBuffer { .. } => "DestroyBuffer",
            Call::GetBufferMemoryRequirements { .. } => "GetBufferMemoryRequirements",
            Call::BindBufferMemory { .. } => "BindBufferMemory",
            Call::CreateImage { .. } => "CreateImage",
            Call::DestroyImage { .. } => "DestroyImage",
            Call::GetImageMemoryRequirements { .. } => "GetImageMemoryRequirements",
            Call::BindImageMemory { .. } => "BindImageMemory",
            Call::CreateSampler { .. } => "CreateSampler",
            Call::DestroySampler { .. } => "DestroySampler",
            Call::CreateFence { .. } => "CreateFence",
            Call::CreateSemaphore { .. } => "CreateSemaphore",
            Call::CreateEvent { .. } => "CreateEvent",
            Call::SetEvent { .. } => "SetEvent",
            Call::CreateCommandPool { .. } => "CreateCommandPool",
            Call::DestroyCommandPool { .. } => "DestroyCommandPool",
            Call::CreatePipelineCache { .. } => "CreatePipelineCache",
            Call::CreateDescriptorSetLayout { .. } => "CreateDescriptorSetLayout",
            Call::DestroyDescriptorSetLayout { .. } => "DestroyDescriptorSetLayout",
            Call::CreatePipelineLayout { .. } => "CreatePipelineLayout",
            Call::DestroyPipelineLayout { .. } => "DestroyPipelineLayout",
            Call::CreateRenderPass { .. } => "CreateRenderPass",
            Call::DestroyRenderPass { .. } => "DestroyRenderPass",
            Call::CreateShaderModule { .. } => "CreateShaderModule",
            Call::DestroyShaderModule { .. } => "DestroyShaderModule",
            Call::CreateComputePipeline { .. } => "CreateComputePipeline",
            Call::CreateGraphicsPipeline { .. } => "CreateGraphicsPipeline",
            Call::DestroyPipeline { .. } => "DestroyPipeline",
            Call::CreateImageView { .. } => "CreateImageView",
            Call::DestroyImageView { .. } => "DestroyImageView",
            Call::CreateBufferView { .. } => "CreateBufferView",
            Call::DestroyBufferView { .. } => "DestroyBufferView",
            Call::CreateDescriptorPool { .. } => "CreateDescriptorPool",
            Call::DestroyDescriptorPool { .. } => "DestroyDescriptorPool",
            Call::CreateFramebuffer { .. } => "CreateFramebuffer",
            Call::DestroyFramebuffer { .. } => "DestroyFramebuffer",
            Call::AllocateDescriptorSets { .. } => "AllocateDescriptorSets",
            Call::UpdateDescriptorSets { .. } => "UpdateDescriptorSets",
            Call::CreateQueryPool { .. } => "CreateQueryPool",
            Call::AllocateCommandBuffers { .. } => "AllocateCommandBuffers",
            Call::BeginCommandBuffer { .. } => "BeginCommandBuffer",
            Call::EndCommandBuffer { .. } => "EndCommandBuffer",
            Call::Record { .. } => "Record",
            Call::QueueSubmit { .. } => "QueueSubmit",
            Call::QueueWaitIdle { .. } => "QueueWaitIdle",
            Call::QueueBindSparse { .. } => "QueueBindSparse",
        }
    }
}

/// One emitted command: the call plus its host observations.
#[derive(Clone, Debug)]
pub struct Command {
    pub call: Call,
    /// Host byte ranges the replay target reads while executing the call.
    pub reads: Vec<MemRange>,
    /// Host byte ranges the call produces (output handles, queried data).
    pub writes: Vec<MemRange>,
}
