use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Normalised device coordinates.
    pub position: [f32; 2],
    /// Texture coordinates with the origin at the bottom-left corner.
    pub uv: [f32; 2],
}

const fn vertex(position: [f32; 2], uv: [f32; 2]) -> QuadVertex {
    QuadVertex { position, uv }
}

/// Two counter-clockwise triangles spanning the whole clip space.
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    vertex([-1.0, -1.0], [0.0, 0.0]),
    vertex([1.0, -1.0], [1.0, 0.0]),
    vertex([1.0, 1.0], [1.0, 1.0]),
    vertex([-1.0, -1.0], [0.0, 0.0]),
    vertex([1.0, 1.0], [1.0, 1.0]),
    vertex([-1.0, 1.0], [0.0, 1.0]),
];

const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

impl QuadVertex {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// GPU copy of [`QUAD_VERTICES`], uploaded once and never modified.
pub(crate) struct QuadMesh {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
}

impl QuadMesh {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fullscreen quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            vertex_count: QUAD_VERTICES.len() as u32,
        }
    }
}
