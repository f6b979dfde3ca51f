//! Image format descriptions and per-mip byte-layout math.
//!
//! The rebuild engine stages image content through linear transfer buffers,
//! and image packing differs from linear-buffer packing for depth and
//! multi-planar formats, so every level size is computed both ways.

use crate::types::{Extent3D, ImageAspects};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    B8G8R8A8Unorm,
    R16G16B16A16Sfloat,
    R32G32B32A32Sfloat,
    R32Uint,
    D16Unorm,
    X8D24UnormPack32,
    D32Sfloat,
    S8Uint,
    D16UnormS8Uint,
    D24UnormS8Uint,
    D32SfloatS8Uint,
    Bc1RgbaUnorm,
    Bc3RgbaUnorm,
    Bc7Unorm,
    Etc2R8G8B8Unorm,
    Astc4x4Unorm,
    G8B8R83Plane420Unorm,
}

/// Texel-block geometry and color-aspect element size for a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementAndTexelBlockSize {
    pub element_size: u32,
    pub block_width: u32,
    pub block_height: u32,
}

impl Format {
    pub fn element_and_block_size(self) -> ElementAndTexelBlockSize {
        let (element_size, block_width, block_height) = match self {
            Format::R8Unorm | Format::S8Uint => (1, 1, 1),
            Format::R8G8Unorm | Format::D16Unorm => (2, 1, 1),
            Format::R8G8B8A8Unorm
            | Format::B8G8R8A8Unorm
            | Format::R32Uint
            | Format::X8D24UnormPack32
            | Format::D32Sfloat => (4, 1, 1),
            Format::D16UnormS8Uint => (3, 1, 1),
            Format::D24UnormS8Uint => (4, 1, 1),
            Format::D32SfloatS8Uint => (5, 1, 1),
            Format::R16G16B16A16Sfloat => (8, 1, 1),
            Format::R32G32B32A32Sfloat => (16, 1, 1),
            Format::Bc1RgbaUnorm => (8, 4, 4),
            Format::Bc3RgbaUnorm | Format::Bc7Unorm => (16, 4, 4),
            Format::Etc2R8G8B8Unorm => (8, 4, 4),
            Format::Astc4x4Unorm => (16, 4, 4),
            // Per-plane sizes differ; the color element size covers plane 0.
            Format::G8B8R83Plane420Unorm => (1, 1, 1),
        };
        ElementAndTexelBlockSize {
            element_size,
            block_width,
            block_height,
        }
    }

    /// Aspects an image of this format carries.
    pub fn aspects(self) -> ImageAspects {
        match self {
            Format::D16Unorm | Format::X8D24UnormPack32 | Format::D32Sfloat => ImageAspects::DEPTH,
            Format::S8Uint => ImageAspects::STENCIL,
            Format::D16UnormS8Uint | Format::D24UnormS8Uint | Format::D32SfloatS8Uint => {
                ImageAspects::DEPTH | ImageAspects::STENCIL
            }
            Format::G8B8R83Plane420Unorm => {
                ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2
            }
            _ => ImageAspects::COLOR,
        }
    }

    pub fn has_depth(self) -> bool {
        self.aspects().contains(ImageAspects::DEPTH)
    }

    pub fn has_stencil(self) -> bool {
        self.aspects().contains(ImageAspects::STENCIL)
    }

    /// Byte size of one depth texel, which differs between image storage and
    /// linear-buffer storage for the packed 24-bit formats.
    pub fn depth_element_size(self, in_buffer: bool) -> u32 {
        match self {
            Format::D16Unorm | Format::D16UnormS8Uint => 2,
            Format::X8D24UnormPack32 | Format::D24UnormS8Uint => {
                if in_buffer {
                    4
                } else {
                    3
                }
            }
            Format::D32Sfloat | Format::D32SfloatS8Uint => 4,
            _ => 0,
        }
    }
}

/// Byte sizes and texel extent of one mip level for one aspect, both as
/// stored in an image and as stored in a linear transfer buffer, with
/// 8-byte-aligned variants for staging-buffer packing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ByteSizeAndExtent {
    pub level_size: u64,
    pub aligned_level_size: u64,
    pub level_size_in_buf: u64,
    pub aligned_level_size_in_buf: u64,
    pub width: u64,
    pub height: u64,
    pub depth: u64,
}

pub(crate) fn next_multiple_of_8(v: u64) -> u64 {
    (v + 7) & !7
}

/// Dimension of `base` at `mip`, clamped to 1 at the tail.
pub fn mip_dim(base: u32, mip: u32) -> u32 {
    base.checked_shr(mip).unwrap_or(0).max(1)
}

fn div_round_up(v: u32, d: u32) -> u32 {
    v.div_ceil(d)
}

/// Byte layout of mip level `mip` of an image with `extent` and `format`,
/// for a single layer of `aspect`.
pub fn level_size(
    extent: Extent3D,
    format: Format,
    mip: u32,
    aspect: ImageAspects,
) -> ByteSizeAndExtent {
    let block = format.element_and_block_size();

    let width = mip_dim(extent.width, mip);
    let height = mip_dim(extent.height, mip);
    let depth = mip_dim(extent.depth, mip);
    let width_in_blocks = div_round_up(width, block.block_width);
    let height_in_blocks = div_round_up(height, block.block_height);

    let element_size = if aspect.contains(ImageAspects::DEPTH) {
        format.depth_element_size(false)
    } else if aspect.contains(ImageAspects::STENCIL) {
        // Stencil elements are always one byte wide.
        1
    } else {
        block.element_size
    };
    let element_size_in_buf = if aspect.contains(ImageAspects::DEPTH) {
        format.depth_element_size(true)
    } else {
        element_size
    };

    let texels = u64::from(width_in_blocks) * u64::from(height_in_blocks) * u64::from(depth);
    let size = texels * u64::from(element_size);
    let size_in_buf = texels * u64::from(element_size_in_buf);

    ByteSizeAndExtent {
        level_size: size,
        aligned_level_size: next_multiple_of_8(size),
        level_size_in_buf: size_in_buf,
        aligned_level_size_in_buf: next_multiple_of_8(size_in_buf),
        width: width.into(),
        height: height.into(),
        depth: depth.into(),
    }
}
