//! Little-endian wire encoding of call payloads.
//!
//! Every pointer argument of a synthesized call points at bytes the replay
//! target will read from (or write to) host memory. Those bytes are encoded
//! here, field by field in declaration order, so observation ranges have
//! exact, deterministic extents without a generated marshaling layer.

use prism_capture::*;

#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn boolean(&mut self, v: bool) -> &mut Self {
        self.u32(v as u32)
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// NUL-terminated string, as the target API consumes names.
    pub fn cstr(&mut self, v: &str) -> &mut Self {
        self.buf.extend_from_slice(v.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn put(&mut self, v: &impl Encode) -> &mut Self {
        v.encode(self);
        self
    }

    pub fn slice<T: Encode>(&mut self, v: &[T]) -> &mut Self {
        for item in v {
            item.encode(self);
        }
        self
    }
}

/// Encodes one payload value onto an [`Encoder`].
pub trait Encode {
    fn encode(&self, e: &mut Encoder);
}

/// Byte image of a single value, for `alloc_read_data`-style staging.
pub fn bytes_of(v: &impl Encode) -> Vec<u8> {
    let mut e = Encoder::new();
    v.encode(&mut e);
    e.into_bytes()
}

pub fn bytes_of_slice<T: Encode>(v: &[T]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.slice(v);
    e.into_bytes()
}

impl Encode for u32 {
    fn encode(&self, e: &mut Encoder) {
        e.u32(*self);
    }
}

impl Encode for u64 {
    fn encode(&self, e: &mut Encoder) {
        e.u64(*self);
    }
}

impl Encode for f32 {
    fn encode(&self, e: &mut Encoder) {
        e.f32(*self);
    }
}

macro_rules! encode_handles {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, e: &mut Encoder) {
                    e.u64(self.raw());
                }
            }
        )+
    };
}

encode_handles!(
    InstanceHandle,
    PhysicalDeviceHandle,
    SurfaceHandle,
    DeviceHandle,
    QueueHandle,
    SwapchainHandle,
    DeviceMemoryHandle,
    BufferHandle,
    ImageHandle,
    SamplerHandle,
    FenceHandle,
    SemaphoreHandle,
    EventHandle,
    CommandPoolHandle,
    PipelineCacheHandle,
    DescriptorSetLayoutHandle,
    PipelineLayoutHandle,
    RenderPassHandle,
    ShaderModuleHandle,
    PipelineHandle,
    ImageViewHandle,
    BufferViewHandle,
    DescriptorPoolHandle,
    FramebufferHandle,
    DescriptorSetHandle,
    QueryPoolHandle,
    CommandBufferHandle,
);

macro_rules! encode_as_u32 {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, e: &mut Encoder) {
                    e.u32(*self as u32);
                }
            }
        )+
    };
}

encode_as_u32!(
    SharingMode,
    ImageLayout,
    ImageTiling,
    ImageType,
    ImageViewType,
    Filter,
    SamplerMipmapMode,
    SamplerAddressMode,
    CompareOp,
    BorderColor,
    ComponentSwizzle,
    DescriptorType,
    QueryType,
    AttachmentLoadOp,
    AttachmentStoreOp,
    PipelineBindPoint,
    IndexType,
    PresentMode,
    ColorSpace,
    SurfaceTransform,
    CompositeAlpha,
    Format,
);

macro_rules! encode_bits {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, e: &mut Encoder) {
                    e.u32(self.bits());
                }
            }
        )+
    };
}

encode_bits!(
    BufferUsage,
    BufferCreateFlags,
    ImageUsage,
    ImageCreateFlags,
    ImageAspects,
    QueueFlags,
    MemoryPropertyFlags,
    PipelineCreateFlags,
    ShaderStageFlags,
    SparseImageFormatFlags,
    SparseMemoryBindFlags,
    AccessFlags,
    PipelineStageFlags,
    CommandPoolCreateFlags,
    DescriptorPoolCreateFlags,
    CommandBufferUsageFlags,
    QueryControlFlags,
    QueryPipelineStatisticFlags,
);

impl Encode for Extent2D {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.width).u32(self.height);
    }
}

impl Encode for Extent3D {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.width).u32(self.height).u32(self.depth);
    }
}

impl Encode for Offset3D {
    fn encode(&self, e: &mut Encoder) {
        e.i32(self.x).i32(self.y).i32(self.z);
    }
}

impl Encode for Rect2D {
    fn encode(&self, e: &mut Encoder) {
        e.i32(self.x).i32(self.y).u32(self.width).u32(self.height);
    }
}

impl Encode for Viewport {
    fn encode(&self, e: &mut Encoder) {
        e.f32(self.x)
            .f32(self.y)
            .f32(self.width)
            .f32(self.height)
            .f32(self.min_depth)
            .f32(self.max_depth);
    }
}

impl Encode for MemoryRequirements {
    fn encode(&self, e: &mut Encoder) {
        e.u64(self.size).u64(self.alignment).u32(self.memory_type_bits);
    }
}

impl Encode for QueueFamilyProperties {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.flags)
            .u32(self.queue_count)
            .u32(self.timestamp_valid_bits);
    }
}

impl Encode for MemoryProperties {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.type_count());
        for t in &self.types {
            e.put(&t.property_flags).u32(t.heap_index);
        }
    }
}

impl Encode for PhysicalDeviceProperties {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.api_version)
            .u32(self.driver_version)
            .u32(self.vendor_id)
            .u32(self.device_id)
            .cstr(&self.device_name);
    }
}

impl Encode for BufferCreateInfo {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.flags)
            .u64(self.size)
            .put(&self.usage)
            .put(&self.sharing_mode)
            .u32(self.queue_family_indices.len() as u32)
            .slice(&self.queue_family_indices);
    }
}

impl Encode for ImageCreateInfo {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.flags)
            .put(&self.image_type)
            .put(&self.format)
            .put(&self.extent)
            .u32(self.mip_levels)
            .u32(self.array_layers)
            .u32(self.samples)
            .put(&self.tiling)
            .put(&self.usage)
            .put(&self.sharing_mode)
            .u32(self.queue_family_indices.len() as u32)
            .slice(&self.queue_family_indices)
            .put(&self.layout);
    }
}

impl Encode for SamplerCreateInfo {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.mag_filter)
            .put(&self.min_filter)
            .put(&self.mipmap_mode)
            .put(&self.address_mode_u)
            .put(&self.address_mode_v)
            .put(&self.address_mode_w)
            .f32(self.mip_lod_bias)
            .boolean(self.anisotropy_enable)
            .f32(self.max_anisotropy)
            .boolean(self.compare_enable)
            .put(&self.compare_op)
            .f32(self.min_lod)
            .f32(self.max_lod)
            .put(&self.border_color)
            .boolean(self.unnormalized_coordinates);
    }
}

impl Encode for SparseMemoryBind {
    fn encode(&self, e: &mut Encoder) {
        e.u64(self.resource_offset)
            .u64(self.size)
            .put(&self.memory)
            .u64(self.memory_offset)
            .put(&self.flags);
    }
}

impl Encode for SparseImageMemoryBind {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.offset)
            .put(&self.extent)
            .put(&self.memory)
            .u64(self.memory_offset)
            .put(&self.flags);
    }
}

impl Encode for PushConstantRange {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.stages).u32(self.offset).u32(self.size);
    }
}

impl Encode for AttachmentDescription {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.format)
            .u32(self.samples)
            .put(&self.load_op)
            .put(&self.store_op)
            .put(&self.stencil_load_op)
            .put(&self.stencil_store_op)
            .put(&self.initial_layout)
            .put(&self.final_layout);
    }
}

impl Encode for AttachmentReference {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.attachment).put(&self.layout);
    }
}

impl Encode for SubpassDescription {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.input_attachments.len() as u32)
            .slice(&self.input_attachments)
            .u32(self.color_attachments.len() as u32)
            .slice(&self.color_attachments)
            .u32(self.resolve_attachments.len() as u32)
            .slice(&self.resolve_attachments);
        match &self.depth_stencil_attachment {
            Some(att) => e.boolean(true).put(att),
            None => e.boolean(false),
        };
        e.u32(self.preserve_attachments.len() as u32)
            .slice(&self.preserve_attachments);
    }
}

impl Encode for SubpassDependency {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.src_subpass)
            .u32(self.dst_subpass)
            .put(&self.src_stage_mask)
            .put(&self.dst_stage_mask)
            .put(&self.src_access_mask)
            .put(&self.dst_access_mask);
    }
}

impl Encode for ImageSubresourceRange {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.aspects)
            .u32(self.base_mip_level)
            .u32(self.level_count)
            .u32(self.base_array_layer)
            .u32(self.layer_count);
    }
}

impl Encode for ComponentMapping {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.r).put(&self.g).put(&self.b).put(&self.a);
    }
}

impl Encode for DescriptorImageInfo {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.sampler).put(&self.image_view).put(&self.layout);
    }
}

impl Encode for DescriptorBufferInfo {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.buffer).u64(self.offset).u64(self.range);
    }
}

impl Encode for BufferCopy {
    fn encode(&self, e: &mut Encoder) {
        e.u64(self.src_offset).u64(self.dst_offset).u64(self.size);
    }
}

impl Encode for BufferImageCopy {
    fn encode(&self, e: &mut Encoder) {
        e.u64(self.buffer_offset)
            .u32(self.buffer_row_length)
            .u32(self.buffer_image_height)
            .put(&self.aspects)
            .u32(self.mip_level)
            .u32(self.base_array_layer)
            .u32(self.layer_count)
            .put(&self.image_offset)
            .put(&self.image_extent);
    }
}

impl Encode for ImageCopy {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.src_aspects)
            .u32(self.src_mip_level)
            .u32(self.src_base_layer)
            .put(&self.dst_aspects)
            .u32(self.dst_mip_level)
            .u32(self.dst_base_layer)
            .u32(self.layer_count)
            .put(&self.src_offset)
            .put(&self.dst_offset)
            .put(&self.extent);
    }
}

impl Encode for BufferBarrier {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.src_access)
            .put(&self.dst_access)
            .u32(self.src_queue_family)
            .u32(self.dst_queue_family)
            .put(&self.buffer)
            .u64(self.offset)
            .u64(self.size);
    }
}

impl Encode for ImageBarrier {
    fn encode(&self, e: &mut Encoder) {
        e.put(&self.src_access)
            .put(&self.dst_access)
            .put(&self.old_layout)
            .put(&self.new_layout)
            .u32(self.src_queue_family)
            .u32(self.dst_queue_family)
            .put(&self.image)
            .put(&self.range);
    }
}

impl Encode for SpecializationInfo {
    fn encode(&self, e: &mut Encoder) {
        e.u32(self.map_entries.len() as u32);
        for (id, offset, size) in &self.map_entries {
            e.u32(*id).u32(*offset).u32(*size);
        }
        e.u32(self.data.len() as u32).bytes(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic_and_sized_by_fields() {
        let info = BufferCreateInfo {
            flags: BufferCreateFlags::empty(),
            size: 0x100,
            usage: BufferUsage::TRANSFER_SRC,
            sharing_mode: SharingMode::Exclusive,
            queue_family_indices: vec![0, 1],
            dedicated: false,
        };
        let a = bytes_of(&info);
        let b = bytes_of(&info);
        assert_eq!(a, b);
        // flags + size + usage + sharing + count + 2 indices.
        assert_eq!(a.len(), 4 + 8 + 4 + 4 + 4 + 8);
    }

    #[test]
    fn cstr_is_nul_terminated() {
        let mut e = Encoder::new();
        e.cstr("main");
        assert_eq!(e.into_bytes(), b"main\0".to_vec());
    }
}
