use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use tracing::warn;
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::overlay::OverlayPaint;

pub(crate) const OVERLAY_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_color;

layout(set = 0, binding = 0) uniform OverlayScreen {
    vec2 size_in_points;
    float gamma_output;
    float _padding;
} screen;

layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec4 v_color;

void main() {
    v_uv = a_uv;
    v_color = a_color;
    gl_Position = vec4(
        2.0 * a_pos.x / screen.size_in_points.x - 1.0,
        1.0 - 2.0 * a_pos.y / screen.size_in_points.y,
        0.0,
        1.0
    );
}
";

pub(crate) const OVERLAY_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 1) in vec4 v_color;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform OverlayScreen {
    vec2 size_in_points;
    float gamma_output;
    float _padding;
} screen;

layout(set = 1, binding = 0) uniform texture2D overlay_texture;
layout(set = 1, binding = 1) uniform sampler overlay_sampler;

vec3 linear_from_gamma(vec3 srgb) {
    vec3 lower = srgb / 12.92;
    vec3 higher = pow((srgb + 0.055) / 1.055, vec3(2.4));
    return mix(higher, lower, step(srgb, vec3(0.04045)));
}

vec3 gamma_from_linear(vec3 rgb) {
    vec3 clamped = max(rgb, vec3(0.0));
    vec3 lower = clamped * 12.92;
    vec3 higher = 1.055 * pow(clamped, vec3(1.0 / 2.4)) - 0.055;
    return mix(higher, lower, step(clamped, vec3(0.0031308)));
}

void main() {
    vec4 tint = vec4(linear_from_gamma(v_color.rgb), v_color.a);
    vec4 color = tint * texture(sampler2D(overlay_texture, overlay_sampler), v_uv);
    if (screen.gamma_output > 0.5) {
        color.rgb = gamma_from_linear(color.rgb);
    }
    out_color = color;
}
";

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4];

/// Mirrors `OverlayScreen` in the overlay shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct OverlayScreen {
    size_in_points: [f32; 2],
    gamma_output: f32,
    _padding: f32,
}

struct OverlayTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct OverlayDraw {
    texture_id: egui::TextureId,
    scissor: [u32; 4],
    indices: Range<u32>,
    base_vertex: i32,
}

/// Buffers for one overlay frame, ready to be drawn into a render pass.
pub(crate) struct PreparedOverlay {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    draws: Vec<OverlayDraw>,
}

/// Draws egui meshes on top of the shader quad.
///
/// Built for the same surface format and sample count as the shader
/// pipelines so both can share one render pass.
pub(crate) struct OverlayPainter {
    pipeline: wgpu::RenderPipeline,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    gamma_output: bool,
    textures: HashMap<egui::TextureId, OverlayTexture>,
}

impl OverlayPainter {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(OVERLAY_VERTEX_GLSL),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay fragment"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(OVERLAY_FRAGMENT_GLSL),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay screen layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = super::texture::ScreenTexture::layout(device);

        let screen_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay screen buffer"),
            size: std::mem::size_of::<OverlayScreen>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay screen bind group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay pipeline layout"),
            bind_group_layouts: &[&screen_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("overlay pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<egui::epaint::Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            screen_buffer,
            screen_bind_group,
            texture_layout,
            gamma_output: !surface_format.is_srgb(),
            textures: HashMap::new(),
        }
    }

    /// Applies texture updates and uploads this frame's meshes.
    ///
    /// Returns `None` when there is nothing to draw.
    pub(crate) fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        paint: &OverlayPaint,
        target: PhysicalSize<u32>,
    ) -> Option<PreparedOverlay> {
        for (id, delta) in &paint.textures.set {
            self.update_texture(device, queue, *id, delta);
        }

        let screen = OverlayScreen {
            size_in_points: [
                target.width as f32 / paint.pixels_per_point,
                target.height as f32 / paint.pixels_per_point,
            ],
            gamma_output: if self.gamma_output { 1.0 } else { 0.0 },
            _padding: 0.0,
        };
        queue.write_buffer(&self.screen_buffer, 0, bytemuck::bytes_of(&screen));

        let mut vertices: Vec<egui::epaint::Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut draws = Vec::new();
        for clipped in &paint.primitives {
            let egui::epaint::Primitive::Mesh(mesh) = &clipped.primitive else {
                continue;
            };
            if mesh.indices.is_empty() {
                continue;
            }
            let Some(scissor) = scissor_rect(clipped.clip_rect, paint.pixels_per_point, target)
            else {
                continue;
            };

            let first_index = indices.len() as u32;
            draws.push(OverlayDraw {
                texture_id: mesh.texture_id,
                scissor,
                indices: first_index..first_index + mesh.indices.len() as u32,
                base_vertex: vertices.len() as i32,
            });
            indices.extend_from_slice(&mesh.indices);
            vertices.extend_from_slice(&mesh.vertices);
        }
        if draws.is_empty() {
            return None;
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("overlay vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("overlay indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Some(PreparedOverlay {
            vertex_buffer,
            index_buffer,
            draws,
        })
    }

    pub(crate) fn paint(&self, pass: &mut wgpu::RenderPass<'_>, prepared: &PreparedOverlay) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.screen_bind_group, &[]);
        pass.set_vertex_buffer(0, prepared.vertex_buffer.slice(..));
        pass.set_index_buffer(prepared.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        for draw in &prepared.draws {
            let Some(texture) = self.textures.get(&draw.texture_id) else {
                continue;
            };
            let [x, y, width, height] = draw.scissor;
            pass.set_scissor_rect(x, y, width, height);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.draw_indexed(draw.indices.clone(), draw.base_vertex, 0..1);
        }
    }

    /// Drops textures egui no longer needs; call after the frame is submitted.
    pub(crate) fn free_textures(&mut self, paint: &OverlayPaint) {
        for id in &paint.textures.free {
            self.textures.remove(id);
        }
    }

    fn update_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: egui::TextureId,
        delta: &egui::epaint::ImageDelta,
    ) {
        let egui::ImageData::Color(image) = &delta.image;
        let [width, height] = image.size;
        let size = wgpu::Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: 1,
        };

        let (texture, origin) = match delta.pos {
            None => {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("overlay texture"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });
                let bind_group = self.bind_texture(device, &texture, delta.options);
                let entry = self
                    .textures
                    .entry(id)
                    .insert_entry(OverlayTexture { texture, bind_group });
                (&entry.into_mut().texture, wgpu::Origin3d::ZERO)
            }
            Some([x, y]) => match self.textures.get(&id) {
                Some(existing) => (
                    &existing.texture,
                    wgpu::Origin3d {
                        x: x as u32,
                        y: y as u32,
                        z: 0,
                    },
                ),
                None => {
                    warn!(?id, "partial update for an unknown overlay texture");
                    return;
                }
            },
        };

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&image.pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }

    fn bind_texture(
        &self,
        device: &wgpu::Device,
        texture: &wgpu::Texture,
        options: egui::TextureOptions,
    ) -> wgpu::BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay sampler"),
            mag_filter: filter_mode(options.magnification),
            min_filter: filter_mode(options.minification),
            ..Default::default()
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        })
    }
}

fn filter_mode(filter: egui::TextureFilter) -> wgpu::FilterMode {
    match filter {
        egui::TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        egui::TextureFilter::Linear => wgpu::FilterMode::Linear,
    }
}

/// Converts a clip rectangle in points to a scissor rectangle in pixels,
/// clamped to the target. `None` when nothing of it is visible.
fn scissor_rect(
    clip: egui::Rect,
    pixels_per_point: f32,
    target: PhysicalSize<u32>,
) -> Option<[u32; 4]> {
    let to_pixels = |value: f32, limit: u32| {
        (value * pixels_per_point).round().clamp(0.0, limit as f32) as u32
    };

    let (min_x, max_x) = (to_pixels(clip.min.x, target.width), to_pixels(clip.max.x, target.width));
    let (min_y, max_y) = (to_pixels(clip.min.y, target.height), to_pixels(clip.max.y, target.height));
    (max_x > min_x && max_y > min_y).then(|| [min_x, min_y, max_x - min_x, max_y - min_y])
}
