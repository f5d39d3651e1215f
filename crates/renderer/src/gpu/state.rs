use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::mouse::MouseUniform;
use crate::overlay::OverlayPaint;
use crate::program::{ProgramSlot, ReloadOutcome};
use crate::quad::QuadMesh;
use crate::types::{Antialiasing, SurfaceAlpha};

use super::context::GpuContext;
use super::overlay::OverlayPainter;
use super::pipeline::{PipelineLayouts, ShaderPipeline};
use super::texture::ScreenTexture;
use super::uniforms::{FrameClock, PreviewUniforms};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    fn for_context(context: &GpuContext) -> Option<Self> {
        (context.sample_count > 1).then(|| {
            Self::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        })
    }
}

/// Per-window GPU resources and the active shader program.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    quad: QuadMesh,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    _screen_texture: ScreenTexture,
    uniforms: PreviewUniforms,
    clock: FrameClock,
    program: ProgramSlot<ShaderPipeline>,
    multisample_target: Option<MultisampleTarget>,
    overlay: OverlayPainter,
    last_stats: Instant,
    frames_since_stats: u32,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        surface_alpha: SurfaceAlpha,
        screen_texture: Option<&Path>,
        blur_radius: f32,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, antialiasing, surface_alpha)?;
        let layouts = PipelineLayouts::new(&context.device);
        let quad = QuadMesh::new(&context.device);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<PreviewUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let screen_texture = ScreenTexture::new(&context.device, &context.queue, screen_texture);
        let texture_bind_group = screen_texture.bind_group(&context.device, &layouts.texture_layout);

        let uniforms = PreviewUniforms::new(context.size.width, context.size.height, blur_radius);
        let multisample_target = MultisampleTarget::for_context(&context);
        let overlay =
            OverlayPainter::new(&context.device, context.surface_format, context.sample_count);

        Ok(Self {
            context,
            layouts,
            quad,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group,
            _screen_texture: screen_texture,
            uniforms,
            clock: FrameClock::new(),
            program: ProgramSlot::empty(),
            multisample_target,
            overlay,
            last_stats: Instant::now(),
            frames_since_stats: 0,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn has_program(&self) -> bool {
        self.program.active().is_some()
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.uniforms.set_resolution(new_size.width, new_size.height);
        self.multisample_target = MultisampleTarget::for_context(&self.context);
    }

    /// Compiles `source` and swaps it in only if it builds.
    pub(crate) fn reload(&mut self, source: &str) -> ReloadOutcome {
        let candidate = ShaderPipeline::build(
            &self.context.device,
            &self.layouts,
            self.context.surface_format,
            self.context.sample_count,
            source,
        );
        self.program.install(candidate)
    }

    /// Re-applies the current surface configuration after `Lost`/`Outdated`.
    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Draws the shader quad and, when given, the menu overlay on top.
    pub(crate) fn render(
        &mut self,
        mouse: MouseUniform,
        overlay: Option<&OverlayPaint>,
    ) -> Result<(), wgpu::SurfaceError> {
        // egui sends each texture once, so updates are applied even when
        // the surface is unavailable this frame.
        let prepared_overlay = overlay.and_then(|paint| {
            self.overlay.prepare(
                &self.context.device,
                &self.context.queue,
                paint,
                self.context.size,
            )
        });
        let frame = self.context.surface.get_current_texture()?;

        let now = Instant::now();
        let tick = self.clock.tick(now);
        self.uniforms.apply_tick(tick);
        self.uniforms.set_mouse(mouse);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
        self.log_stats(now);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(program) = self.program.active() {
                render_pass.set_pipeline(&program.pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.quad.buffer.slice(..));
                render_pass.draw(0..self.quad.vertex_count, 0..1);
            }
            if let Some(prepared) = prepared_overlay.as_ref() {
                self.overlay.paint(&mut render_pass, prepared);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        if let Some(paint) = overlay {
            self.overlay.free_textures(paint);
        }
        Ok(())
    }

    fn log_stats(&mut self, now: Instant) {
        self.frames_since_stats += 1;
        let elapsed = now.saturating_duration_since(self.last_stats);
        if elapsed < STATS_INTERVAL {
            return;
        }

        let fps = self.frames_since_stats as f32 / elapsed.as_secs_f32();
        debug!(
            fps = fps.round(),
            frame = self.clock.frames(),
            time = self.uniforms.i_time,
            mouse = ?self.uniforms.i_mouse,
            resolution = ?&self.uniforms.i_resolution[..2],
            generation = self.program.generation(),
            "render stats"
        );
        self.frames_since_stats = 0;
        self.last_stats = now;
    }
}
