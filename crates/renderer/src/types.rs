use std::path::PathBuf;
use std::time::Duration;

const GLASS_FRAGMENT: &str = include_str!("../shaders/glass.frag");
const RIPPLE_FRAGMENT: &str = include_str!("../shaders/ripple.frag");

/// Fragment shaders compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinShader {
    /// Frosted-glass blur over `screenTexture`, written against the plain
    /// `resolution`/`u_time`/`u_mouse`/`blurRadius` uniforms.
    #[default]
    Glass,
    /// Shadertoy-style `mainImage` ripple following the cursor.
    Ripple,
}

impl BuiltinShader {
    pub fn source(self) -> &'static str {
        match self {
            BuiltinShader::Glass => GLASS_FRAGMENT,
            BuiltinShader::Ripple => RIPPLE_FRAGMENT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinShader::Glass => "glass",
            BuiltinShader::Ripple => "ripple",
        }
    }
}

impl std::fmt::Display for BuiltinShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the initial fragment shader text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderOrigin {
    Builtin(BuiltinShader),
    File(PathBuf),
}

impl Default for ShaderOrigin {
    fn default() -> Self {
        Self::Builtin(BuiltinShader::default())
    }
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Declares how the compositor should treat the swapchain alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceAlpha {
    /// Frames fully cover the window without transparency.
    Opaque,
    /// Frames may contain transparency and should be blended by the compositor.
    #[default]
    Transparent,
}

/// Window creation flags.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    /// Initial inner size in physical pixels.
    pub size: (u32, u32),
    pub surface_alpha: SurfaceAlpha,
    pub always_on_top: bool,
    pub resizable: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Glass Shader".to_string(),
            size: (600, 600),
            surface_alpha: SurfaceAlpha::Transparent,
            always_on_top: true,
            resizable: true,
        }
    }
}

/// Keyboard behaviour of the preview window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputOptions {
    /// Enables the load/save/reload shortcuts.
    pub menu: bool,
    /// Any key press terminates the preview.
    pub quit_on_any_key: bool,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            menu: true,
            quit_on_any_key: false,
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` is the merge of the settings file and CLI flags; the
/// renderer never looks at either directly.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub window: WindowOptions,
    /// Fragment shader rendered when the window opens.
    pub shader: ShaderOrigin,
    pub antialiasing: Antialiasing,
    /// Value uploaded to the `blurRadius` uniform.
    pub blur_radius: f32,
    /// Image bound to `screenTexture`; a 1x1 white texel when absent.
    pub screen_texture: Option<PathBuf>,
    pub input: InputOptions,
    /// Poll interval for reloading the shader file when it changes on disk.
    pub watch_interval: Option<Duration>,
    /// Start directory for file dialogs while the shader has no backing file.
    pub dialog_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window: WindowOptions::default(),
            shader: ShaderOrigin::default(),
            antialiasing: Antialiasing::default(),
            blur_radius: 2.0,
            screen_texture: None,
            input: InputOptions::default(),
            watch_interval: None,
            dialog_dir: None,
        }
    }
}
