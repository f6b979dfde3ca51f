//! Per-category object records.
//!
//! Every record carries the immutable creation parameters of the captured
//! object plus the last-known dynamic state the rebuild has to reproduce
//! (bound memory, layout, signal state, recorded sub-commands). References
//! to other objects are handles; the few embedded *Object copies exist so a
//! dependency destroyed later in the capture can still be re-created as a
//! temporary.

use std::collections::BTreeMap;

use crate::format::Format;
use crate::handle::*;
use crate::recorded::RecordedCommand;
use crate::types::*;

#[derive(Clone, Debug, Default)]
pub struct InstanceObject {
    pub handle: InstanceHandle,
    pub enabled_layers: Vec<String>,
    pub enabled_extensions: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PhysicalDeviceObject {
    pub handle: PhysicalDeviceHandle,
    pub instance: InstanceHandle,
    pub properties: PhysicalDeviceProperties,
    pub memory_properties: MemoryProperties,
    /// Keyed by queue family index.
    pub queue_family_properties: BTreeMap<u32, QueueFamilyProperties>,
}

#[derive(Clone, Debug)]
pub struct SurfaceObject {
    pub handle: SurfaceHandle,
    pub instance: InstanceHandle,
    pub kind: SurfaceKind,
}

/// One queue requested at device creation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceQueueConfig {
    pub family: u32,
    pub index: u32,
    pub priority: f32,
}

#[derive(Clone, Debug, Default)]
pub struct DeviceObject {
    pub handle: DeviceHandle,
    pub physical_device: PhysicalDeviceHandle,
    pub enabled_layers: Vec<String>,
    pub enabled_extensions: Vec<String>,
    pub enabled_features: Vec<u32>,
    pub queues: Vec<DeviceQueueConfig>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QueueObject {
    pub handle: QueueHandle,
    pub device: DeviceHandle,
    pub family: u32,
    pub index: u32,
}

#[derive(Clone, Debug)]
pub struct SwapchainObject {
    pub handle: SwapchainHandle,
    pub device: DeviceHandle,
    pub surface: SurfaceHandle,
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
    /// Presentable images, in acquisition-index order.
    pub images: Vec<ImageHandle>,
}

/// Dedicated-allocation metadata attached to a memory allocation, naming the
/// single resource the allocation exists for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedicatedAllocation {
    pub image: ImageHandle,
    pub buffer: BufferHandle,
}

#[derive(Clone, Debug, Default)]
pub struct DeviceMemoryObject {
    pub handle: DeviceMemoryHandle,
    pub device: DeviceHandle,
    pub allocation_size: u64,
    pub memory_type_index: u32,
    pub dedicated: Option<DedicatedAllocation>,
    /// Non-zero when the allocation was host-mapped at capture time.
    pub mapped_location: u64,
    pub mapped_offset: u64,
    pub mapped_size: u64,
}

/// One opaque sparse bind: a run of the resource's address space backed by a
/// run of a memory allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseMemoryBind {
    pub resource_offset: u64,
    pub size: u64,
    pub memory: DeviceMemoryHandle,
    pub memory_offset: u64,
    pub flags: SparseMemoryBindFlags,
}

/// One sparse image block bind at (aspect, layer, mip).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseImageMemoryBind {
    pub offset: Offset3D,
    pub extent: Extent3D,
    pub memory: DeviceMemoryHandle,
    pub memory_offset: u64,
    pub flags: SparseMemoryBindFlags,
}

/// Nested per-aspect → per-layer → per-mip → per-block sparse image binds,
/// mirroring how the capture layer records them.
pub type SparseImageBindings =
    BTreeMap<ImageAspects, BTreeMap<u32, BTreeMap<u32, Vec<SparseImageMemoryBind>>>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SparseImageFormatProperties {
    pub aspect_mask: ImageAspects,
    pub flags: SparseImageFormatFlags,
    pub image_granularity: Extent3D,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SparseImageMemoryRequirements {
    pub format_properties: SparseImageFormatProperties,
    pub image_mip_tail_first_lod: u32,
    pub image_mip_tail_size: u64,
    pub image_mip_tail_offset: u64,
    pub image_mip_tail_stride: u64,
}

#[derive(Clone, Debug, Default)]
pub struct BufferCreateInfo {
    pub flags: BufferCreateFlags,
    pub size: u64,
    pub usage: BufferUsage,
    pub sharing_mode: SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub dedicated: bool,
}

#[derive(Clone, Debug, Default)]
pub struct BufferObject {
    pub handle: BufferHandle,
    pub device: DeviceHandle,
    pub info: BufferCreateInfo,
    pub memory: Option<DeviceMemoryHandle>,
    pub memory_offset: u64,
    /// Keyed by resource byte offset.
    pub sparse_bindings: BTreeMap<u64, SparseMemoryBind>,
    pub memory_requirements: MemoryRequirements,
    pub last_bound_queue: Option<QueueHandle>,
}

#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    pub flags: ImageCreateFlags,
    pub image_type: ImageType,
    pub format: Format,
    pub extent: Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub sharing_mode: SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub layout: ImageLayout,
    pub dedicated: bool,
}

#[derive(Clone, Debug)]
pub struct ImageObject {
    pub handle: ImageHandle,
    pub device: DeviceHandle,
    pub info: ImageCreateInfo,
    pub aspect: ImageAspects,
    pub memory: Option<DeviceMemoryHandle>,
    pub memory_offset: u64,
    /// Opaque sparse binds keyed by resource byte offset.
    pub opaque_sparse_bindings: BTreeMap<u64, SparseMemoryBind>,
    pub sparse_image_bindings: SparseImageBindings,
    /// Keyed by aspect mask of the requirement entry.
    pub sparse_memory_requirements: BTreeMap<ImageAspects, SparseImageMemoryRequirements>,
    pub memory_requirements: MemoryRequirements,
    pub last_bound_queue: Option<QueueHandle>,
    pub is_swapchain_image: bool,
}

#[derive(Clone, Debug)]
pub struct SamplerObject {
    pub handle: SamplerHandle,
    pub device: DeviceHandle,
    pub info: SamplerCreateInfo,
}

#[derive(Clone, Debug, Default)]
pub struct SamplerCreateInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: SamplerMipmapMode,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
    pub unnormalized_coordinates: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct FenceObject {
    pub handle: FenceHandle,
    pub device: DeviceHandle,
    pub signaled: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SemaphoreObject {
    pub handle: SemaphoreHandle,
    pub device: DeviceHandle,
    pub signaled: bool,
    pub last_queue: QueueHandle,
}

#[derive(Clone, Copy, Debug)]
pub struct EventObject {
    pub handle: EventHandle,
    pub device: DeviceHandle,
    pub signaled: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct CommandPoolObject {
    pub handle: CommandPoolHandle,
    pub device: DeviceHandle,
    pub flags: CommandPoolCreateFlags,
    pub queue_family_index: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineCacheObject {
    pub handle: PipelineCacheHandle,
    pub device: DeviceHandle,
}

#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutBinding {
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
    pub immutable_samplers: Vec<SamplerHandle>,
}

#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutObject {
    pub handle: DescriptorSetLayoutHandle,
    pub device: DeviceHandle,
    /// Keyed by binding number.
    pub bindings: BTreeMap<u32, DescriptorSetLayoutBinding>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: u32,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug)]
pub struct PipelineLayoutObject {
    pub handle: PipelineLayoutHandle,
    pub device: DeviceHandle,
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

#[derive(Clone, Copy, Debug)]
pub struct AttachmentDescription {
    pub format: Format,
    pub samples: u32,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub stencil_load_op: AttachmentLoadOp,
    pub stencil_store_op: AttachmentStoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: ImageLayout,
}

#[derive(Clone, Debug, Default)]
pub struct SubpassDescription {
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    pub resolve_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: PipelineStageFlags,
    pub dst_stage_mask: PipelineStageFlags,
    pub src_access_mask: AccessFlags,
    pub dst_access_mask: AccessFlags,
}

#[derive(Clone, Debug, Default)]
pub struct RenderPassObject {
    pub handle: RenderPassHandle,
    pub device: DeviceHandle,
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
    pub dependencies: Vec<SubpassDependency>,
}

#[derive(Clone, Debug, Default)]
pub struct ShaderModuleObject {
    pub handle: ShaderModuleHandle,
    pub device: DeviceHandle,
    pub words: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct SpecializationInfo {
    /// (constant id, offset, size) triples.
    pub map_entries: Vec<(u32, u32, u32)>,
    pub data: Vec<u8>,
}

/// One shader stage of a pipeline. The module object is retained by value so
/// a module destroyed after pipeline creation can be re-created as a
/// temporary.
#[derive(Clone, Debug)]
pub struct ShaderStage {
    pub stage: ShaderStageFlags,
    pub module: ShaderModuleObject,
    pub entry_point: String,
    pub specialization: Option<SpecializationInfo>,
}

#[derive(Clone, Debug)]
pub struct ComputePipelineObject {
    pub handle: PipelineHandle,
    pub device: DeviceHandle,
    pub flags: PipelineCreateFlags,
    pub stage: ShaderStage,
    pub layout: PipelineLayoutObject,
    pub base_pipeline: PipelineHandle,
    pub pipeline_cache: Option<PipelineCacheHandle>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub per_instance: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: Format,
    pub offset: u32,
}

#[derive(Clone, Debug, Default)]
pub struct VertexInputState {
    pub bindings: Vec<VertexInputBinding>,
    pub attributes: Vec<VertexInputAttribute>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InputAssemblyState {
    pub topology: u32,
    pub primitive_restart_enable: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TessellationState {
    pub patch_control_points: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ViewportState {
    pub viewport_count: u32,
    pub viewports: Vec<Viewport>,
    pub scissor_count: u32,
    pub scissors: Vec<Rect2D>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RasterizationState {
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub polygon_mode: u32,
    pub cull_mode: u32,
    pub front_face: u32,
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
    pub line_width: f32,
}

#[derive(Clone, Debug, Default)]
pub struct MultisampleState {
    pub rasterization_samples: u32,
    pub sample_shading_enable: bool,
    pub min_sample_shading: f32,
    pub sample_mask: Vec<u32>,
    pub alpha_to_coverage_enable: bool,
    pub alpha_to_one_enable: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StencilOpState {
    pub fail_op: u32,
    pub pass_op: u32,
    pub depth_fail_op: u32,
    pub compare_op: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub depth_bounds_test_enable: bool,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_blend_factor: u32,
    pub dst_color_blend_factor: u32,
    pub color_blend_op: u32,
    pub src_alpha_blend_factor: u32,
    pub dst_alpha_blend_factor: u32,
    pub alpha_blend_op: u32,
    pub color_write_mask: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ColorBlendState {
    pub logic_op_enable: bool,
    pub logic_op: u32,
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [f32; 4],
}

#[derive(Clone, Debug, Default)]
pub struct DynamicState {
    pub dynamic_states: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct GraphicsPipelineObject {
    pub handle: PipelineHandle,
    pub device: DeviceHandle,
    pub flags: PipelineCreateFlags,
    pub stages: Vec<ShaderStage>,
    pub vertex_input_state: VertexInputState,
    pub input_assembly_state: InputAssemblyState,
    pub tessellation_state: Option<TessellationState>,
    pub viewport_state: Option<ViewportState>,
    pub rasterization_state: RasterizationState,
    pub multisample_state: Option<MultisampleState>,
    pub depth_stencil_state: Option<DepthStencilState>,
    pub color_blend_state: Option<ColorBlendState>,
    pub dynamic_state: Option<DynamicState>,
    /// Retained by value: see [`ShaderStage::module`].
    pub layout: PipelineLayoutObject,
    pub render_pass: RenderPassObject,
    pub subpass: u32,
    pub base_pipeline: PipelineHandle,
    pub pipeline_cache: Option<PipelineCacheHandle>,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageViewObject {
    pub handle: ImageViewHandle,
    pub device: DeviceHandle,
    pub image: ImageHandle,
    pub view_type: ImageViewType,
    pub format: Format,
    pub components: ComponentMapping,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSubresourceRange {
    pub aspects: ImageAspects,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct BufferViewObject {
    pub handle: BufferViewHandle,
    pub device: DeviceHandle,
    pub buffer: BufferHandle,
    pub format: Format,
    pub offset: u64,
    pub range: u64,
}

#[derive(Clone, Debug)]
pub struct DescriptorPoolObject {
    pub handle: DescriptorPoolHandle,
    pub device: DeviceHandle,
    pub flags: DescriptorPoolCreateFlags,
    pub max_sets: u32,
    pub sizes: Vec<(DescriptorType, u32)>,
}

#[derive(Clone, Debug)]
pub struct FramebufferObject {
    pub handle: FramebufferHandle,
    pub device: DeviceHandle,
    /// Retained by value: the render pass may have been destroyed after the
    /// framebuffer was created.
    pub render_pass: RenderPassObject,
    pub attachments: Vec<ImageViewHandle>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescriptorImageInfo {
    pub sampler: SamplerHandle,
    pub image_view: ImageViewHandle,
    pub layout: ImageLayout,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescriptorBufferInfo {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub range: u64,
}

/// Captured contents of one descriptor binding, element-indexed.
#[derive(Clone, Debug)]
pub struct DescriptorBinding {
    pub descriptor_type: DescriptorType,
    pub image_bindings: BTreeMap<u32, DescriptorImageInfo>,
    pub buffer_bindings: BTreeMap<u32, DescriptorBufferInfo>,
    pub buffer_view_bindings: BTreeMap<u32, BufferViewHandle>,
}

#[derive(Clone, Debug)]
pub struct DescriptorSetObject {
    pub handle: DescriptorSetHandle,
    pub device: DeviceHandle,
    pub pool: DescriptorPoolHandle,
    pub layout: DescriptorSetLayoutHandle,
    /// Keyed by binding number.
    pub bindings: BTreeMap<u32, DescriptorBinding>,
}

#[derive(Clone, Debug)]
pub struct QueryPoolObject {
    pub handle: QueryPoolHandle,
    pub device: DeviceHandle,
    pub query_type: QueryType,
    pub query_count: u32,
    pub pipeline_statistics: QueryPipelineStatisticFlags,
    /// Per-query status, indexed by query number.
    pub status: Vec<QueryStatus>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CommandBufferBeginInfo {
    pub flags: CommandBufferUsageFlags,
    pub inherited: bool,
    pub inherited_render_pass: RenderPassHandle,
    pub inherited_subpass: u32,
    pub inherited_framebuffer: FramebufferHandle,
    pub inherited_occlusion_query: bool,
    pub inherited_query_flags: QueryControlFlags,
    pub inherited_pipeline_stats: QueryPipelineStatisticFlags,
}

#[derive(Clone, Debug)]
pub struct CommandBufferObject {
    pub handle: CommandBufferHandle,
    pub device: DeviceHandle,
    pub pool: CommandPoolHandle,
    pub level: CommandBufferLevel,
    pub recording: RecordingState,
    pub begin_info: CommandBufferBeginInfo,
    pub commands: Vec<RecordedCommand>,
}
