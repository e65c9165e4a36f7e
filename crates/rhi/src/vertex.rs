//! Vertex input layout of the batch pipeline.
//!
//! Positions and per-vertex object tags live in two separate buffers so the
//! staging arrays can be copied out verbatim:
//!
//! | binding | location | format            | stride |
//! |---------|----------|-------------------|--------|
//! | 0       | 0        | `R32G32B32_SFLOAT`| 12     |
//! | 1       | 1        | `R32_SINT`        | 4      |

use ash::vk;

pub const POSITION_BINDING: u32 = 0;
pub const TAG_BINDING: u32 = 1;

/// Size of one position (`vec3`).
pub const POSITION_STRIDE: u32 = 12;
/// Size of one object tag (`int`).
pub const TAG_STRIDE: u32 = 4;

pub fn binding_descriptions() -> [vk::VertexInputBindingDescription; 2] {
    [
        vk::VertexInputBindingDescription {
            binding: POSITION_BINDING,
            stride: POSITION_STRIDE,
            input_rate: vk::VertexInputRate::VERTEX,
        },
        vk::VertexInputBindingDescription {
            binding: TAG_BINDING,
            stride: TAG_STRIDE,
            input_rate: vk::VertexInputRate::VERTEX,
        },
    ]
}

pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            binding: POSITION_BINDING,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            binding: TAG_BINDING,
            location: 1,
            format: vk::Format::R32_SINT,
            offset: 0,
        },
    ]
}
