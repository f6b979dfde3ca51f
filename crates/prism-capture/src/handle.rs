use std::fmt;

/// Declares one opaque `u64` handle newtype per object category.
///
/// Handles are unique within their category only; `0` is the null handle
/// everywhere, matching the captured API's convention.
macro_rules! handles {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
            pub struct $name(pub u64);

            impl $name {
                pub const NULL: Self = Self(0);

                pub fn is_null(self) -> bool {
                    self.0 == 0
                }

                pub fn raw(self) -> u64 {
                    self.0
                }
            }

            impl From<u64> for $name {
                fn from(raw: u64) -> Self {
                    Self(raw)
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($name), "({:#x})"), self.0)
                }
            }
        )+
    };
}

handles! {
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
}
