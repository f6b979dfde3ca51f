//! Sub-commands recorded into a captured command buffer.
//!
//! This is the replayable subset the rebuild re-records verbatim; a command
//! whose referenced handles no longer exist in the rebuilt state makes the
//! whole buffer unrecordable from that point on.

use crate::handle::*;
use crate::objects::{ImageSubresourceRange, Rect2D};
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub buffer_row_length: u32,
    pub buffer_image_height: u32,
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    pub image_offset: Offset3D,
    pub image_extent: Extent3D,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageCopy {
    pub src_aspects: ImageAspects,
    pub src_mip_level: u32,
    pub src_base_layer: u32,
    pub dst_aspects: ImageAspects,
    pub dst_mip_level: u32,
    pub dst_base_layer: u32,
    pub layer_count: u32,
    pub src_offset: Offset3D,
    pub dst_offset: Offset3D,
    pub extent: Extent3D,
}

#[derive(Clone, Copy, Debug)]
pub struct BufferBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub image: ImageHandle,
    pub range: ImageSubresourceRange,
}

#[derive(Clone, Debug)]
pub enum RecordedCommand {
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
        regions: Vec<BufferCopy>,
    },
    CopyImage {
        src: ImageHandle,
        src_layout: ImageLayout,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: Vec<ImageCopy>,
    },
    CopyBufferToImage {
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: Vec<BufferImageCopy>,
    },
    CopyImageToBuffer {
        src: ImageHandle,
        src_layout: ImageLayout,
        dst: BufferHandle,
        regions: Vec<BufferImageCopy>,
    },
    PipelineBarrier {
        src_stages: PipelineStageFlags,
        dst_stages: PipelineStageFlags,
        buffer_barriers: Vec<BufferBarrier>,
        image_barriers: Vec<ImageBarrier>,
    },
    BeginRenderPass {
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        render_area: Rect2D,
    },
    NextSubpass,
    EndRenderPass,
    BindPipeline {
        bind_point: PipelineBindPoint,
        pipeline: PipelineHandle,
    },
    BindDescriptorSets {
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: Vec<DescriptorSetHandle>,
        dynamic_offsets: Vec<u32>,
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<BufferHandle>,
        offsets: Vec<u64>,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    },
    PushConstants {
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    SetEvent {
        event: EventHandle,
        stages: PipelineStageFlags,
    },
    BeginQuery {
        pool: QueryPoolHandle,
        query: u32,
        flags: QueryControlFlags,
    },
    EndQuery {
        pool: QueryPoolHandle,
        query: u32,
    },
    ExecuteCommands {
        buffers: Vec<CommandBufferHandle>,
    },
}
