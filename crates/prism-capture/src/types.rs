//! Shared value types: flag sets, enums, and small plain structs used across
//! the snapshot tables and the synthesized calls.

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Offset3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM_TEXEL_BUFFER = 1 << 2;
        const STORAGE_TEXEL_BUFFER = 1 << 3;
        const UNIFORM_BUFFER = 1 << 4;
        const STORAGE_BUFFER = 1 << 5;
        const INDEX_BUFFER = 1 << 6;
        const VERTEX_BUFFER = 1 << 7;
        const INDIRECT_BUFFER = 1 << 8;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BufferCreateFlags: u32 {
        const SPARSE_BINDING = 1 << 0;
        const SPARSE_RESIDENCY = 1 << 1;
        const SPARSE_ALIASED = 1 << 2;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const TRANSIENT_ATTACHMENT = 1 << 6;
        const INPUT_ATTACHMENT = 1 << 7;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ImageCreateFlags: u32 {
        const SPARSE_BINDING = 1 << 0;
        const SPARSE_RESIDENCY = 1 << 1;
        const SPARSE_ALIASED = 1 << 2;
        const MUTABLE_FORMAT = 1 << 3;
        const CUBE_COMPATIBLE = 1 << 4;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ImageAspects: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const METADATA = 1 << 3;
        const PLANE_0 = 1 << 4;
        const PLANE_1 = 1 << 5;
        const PLANE_2 = 1 << 6;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct QueueFlags: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const SPARSE_BINDING = 1 << 3;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED = 1 << 3;
        const LAZILY_ALLOCATED = 1 << 4;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PipelineCreateFlags: u32 {
        const DISABLE_OPTIMIZATION = 1 << 0;
        const ALLOW_DERIVATIVES = 1 << 1;
        const DERIVATIVE = 1 << 2;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SparseImageFormatFlags: u32 {
        const SINGLE_MIPTAIL = 1 << 0;
        const ALIGNED_MIP_SIZE = 1 << 1;
        const NONSTANDARD_BLOCK_SIZE = 1 << 2;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SparseMemoryBindFlags: u32 {
        const METADATA = 1 << 0;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct AccessFlags: u32 {
        const TRANSFER_READ = 1 << 0;
        const TRANSFER_WRITE = 1 << 1;
        const SHADER_READ = 1 << 2;
        const SHADER_WRITE = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 5;
        const MEMORY_READ = 1 << 6;
        const MEMORY_WRITE = 1 << 7;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const COMPUTE_SHADER = 1 << 3;
        const TRANSFER = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const BOTTOM_OF_PIPE = 1 << 6;
        const ALL_COMMANDS = 1 << 7;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CommandPoolCreateFlags: u32 {
        const TRANSIENT = 1 << 0;
        const RESET_COMMAND_BUFFER = 1 << 1;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct DescriptorPoolCreateFlags: u32 {
        const FREE_DESCRIPTOR_SET = 1 << 0;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CommandBufferUsageFlags: u32 {
        const ONE_TIME_SUBMIT = 1 << 0;
        const RENDER_PASS_CONTINUE = 1 << 1;
        const SIMULTANEOUS_USE = 1 << 2;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct QueryControlFlags: u32 {
        const PRECISE = 1 << 0;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct QueryPipelineStatisticFlags: u32 {
        const INPUT_ASSEMBLY_VERTICES = 1 << 0;
        const INPUT_ASSEMBLY_PRIMITIVES = 1 << 1;
        const VERTEX_SHADER_INVOCATIONS = 1 << 2;
        const FRAGMENT_SHADER_INVOCATIONS = 1 << 3;
        const COMPUTE_SHADER_INVOCATIONS = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SharingMode {
    #[default]
    Exclusive,
    Concurrent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageLayout {
    #[default]
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Preinitialized,
    PresentSrc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageTiling {
    #[default]
    Optimal,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageType {
    D1,
    #[default]
    D2,
    D3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageViewType {
    D1,
    #[default]
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SamplerMipmapMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompareOp {
    #[default]
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BorderColor {
    #[default]
    FloatTransparentBlack,
    IntTransparentBlack,
    FloatOpaqueBlack,
    IntOpaqueBlack,
    FloatOpaqueWhite,
    IntOpaqueWhite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ComponentSwizzle {
    #[default]
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComponentMapping {
    pub r: ComponentSwizzle,
    pub g: ComponentSwizzle,
    pub b: ComponentSwizzle,
    pub a: ComponentSwizzle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorType {
    /// Descriptors whose payload is a (sampler, image view, layout) triple.
    pub fn is_image(self) -> bool {
        matches!(
            self,
            DescriptorType::Sampler
                | DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
                | DescriptorType::InputAttachment
        )
    }

    /// Descriptors whose payload is a (buffer, offset, range) triple.
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer
                | DescriptorType::StorageBuffer
                | DescriptorType::UniformBufferDynamic
                | DescriptorType::StorageBufferDynamic
        )
    }

    pub fn is_texel_buffer_view(self) -> bool {
        matches!(
            self,
            DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Occlusion,
    PipelineStatistics,
    Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Inactive,
    Active,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    NotStarted,
    Recording,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AttachmentLoadOp {
    #[default]
    Load,
    Clear,
    DontCare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AttachmentStoreOp {
    #[default]
    Store,
    DontCare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndexType {
    #[default]
    U16,
    U32,
}

/// Platform flavor of a presentation surface. The window-system objects
/// behind a surface cannot be captured, so rebuild emits null native handles
/// for every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    Xcb,
    Xlib,
    Wayland,
    Android,
    Win32,
    Mir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    SrgbNonlinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SurfaceTransform {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeAlpha {
    #[default]
    Opaque,
    PreMultiplied,
    PostMultiplied,
    Inherit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    pub memory_type_bits: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MemoryProperties {
    pub types: Vec<MemoryType>,
}

impl MemoryProperties {
    pub fn type_count(&self) -> u32 {
        self.types.len() as u32
    }

    /// Index of the first memory type allowed by `type_bits` whose property
    /// flags contain `flags`, or `None`.
    pub fn type_index_for(&self, type_bits: u32, flags: MemoryPropertyFlags) -> Option<u32> {
        self.types.iter().enumerate().find_map(|(i, t)| {
            let allowed = type_bits & (1 << i) != 0;
            (allowed && t.property_flags.contains(flags)).then_some(i as u32)
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QueueFamilyProperties {
    pub flags: QueueFlags,
    pub queue_count: u32,
    pub timestamp_valid_bits: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PhysicalDeviceProperties {
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_index_honours_type_bits_and_flags() {
        let props = MemoryProperties {
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
        };
        assert_eq!(
            props.type_index_for(0b11, MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        // Type 1 masked out: nothing qualifies.
        assert_eq!(
            props.type_index_for(0b01, MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}
