//! GPU side of the preview.
//!
//! - `context` owns the wgpu instance, surface and device, and picks the
//!   sample count and composite alpha mode.
//! - `pipeline` links the quad vertex stage with a wrapped fragment shader.
//! - `texture` provides the image behind `screenTexture`.
//! - `uniforms` mirrors the GLSL uniform block and tracks frame time.
//! - `overlay` paints the egui menu meshes over the shader.
//! - `state` ties these together behind `GpuState`.

mod context;
mod overlay;
mod pipeline;
mod state;
mod texture;
mod uniforms;

pub(crate) use state::GpuState;
