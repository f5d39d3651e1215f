//! Renderer crate for glasshader.
//!
//! Opens a transparent, always-on-top window and draws one fragment shader
//! over a full-screen quad every frame:
//!
//! ```text
//!   glasshader CLI
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ render_frame()
//!          ▲                │                                    │
//!          │                ├─ ShaderDocument ◀── file dialogs   ├─▶ uniforms ─▶ GPU
//!          │                └─ MenuOverlay ──▶ MenuAction        └─▶ egui meshes ─▶ GPU
//! ```
//!
//! User GLSL is wrapped at runtime (see [`wrap_fragment_source`]) so that both
//! Shadertoy-style `mainImage` shaders and plain `main` shaders compile as
//! Vulkan GLSL against the same uniform block. Reloads go through a
//! [`ProgramSlot`], which only ever replaces a program with one that built.

mod compile;
mod dialog;
mod document;
mod gpu;
mod menu;
mod mouse;
mod overlay;
mod program;
mod quad;
mod types;
mod window;

use anyhow::Result;

pub use compile::{wrap_fragment_source, CompileError, ShaderDialect, WrappedShader, RESERVED_UNIFORMS};
pub use dialog::{apply_dialog_outcome, DialogKind, DialogOutcome, DocumentChange};
pub use document::{DocumentError, ShaderDocument};
pub use menu::{menu_action_for, MenuAction};
pub use mouse::{MouseState, MouseUniform};
pub use program::{ProgramSlot, ReloadOutcome};
pub use quad::{QuadVertex, QUAD_VERTICES};
pub use types::{
    Antialiasing, BuiltinShader, InputOptions, RendererConfig, ShaderOrigin, SurfaceAlpha,
    WindowOptions,
};
pub use window::PreviewEvent;

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the preview window and drives the event loop until it closes.
    ///
    /// Errors are returned only for startup failures: the shader file cannot
    /// be read, or the event loop, window, surface or GPU device cannot be
    /// created. Shader compile errors are logged and never end the loop.
    pub fn run(&mut self) -> Result<()> {
        window::run_preview(self.config.clone())
    }
}
