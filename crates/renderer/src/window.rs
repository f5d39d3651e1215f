use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopWindowTarget};
use winit::keyboard::ModifiersState;
use winit::window::{Window, WindowBuilder, WindowLevel};

use crate::dialog::{apply_dialog_outcome, DialogKind, DialogLauncher, DialogOutcome, DocumentChange};
use crate::document::ShaderDocument;
use crate::gpu::GpuState;
use crate::menu::{menu_action_for, MenuAction};
use crate::mouse::MouseState;
use crate::overlay::MenuOverlay;
use crate::types::{InputOptions, RendererConfig, ShaderOrigin, SurfaceAlpha, WindowOptions};

/// Events injected into the window loop from other threads.
#[derive(Debug)]
pub enum PreviewEvent {
    Dialog(DialogOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreviewPhase {
    Uninitialized,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuitReason {
    WindowClosed,
    KeyPressed,
    MenuQuit,
    SurfaceOutOfMemory,
}

struct WindowState {
    // Declared before `window` so the surface is released first.
    gpu: GpuState,
    window: Arc<Window>,
    phase: PreviewPhase,
    mouse: MouseState,
    overlay: Option<MenuOverlay>,
    modifiers: ModifiersState,
    document: ShaderDocument,
    dialogs: DialogLauncher,
    input: InputOptions,
    base_title: String,
    dialog_dir: Option<PathBuf>,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        document: ShaderDocument,
        dialogs: DialogLauncher,
    ) -> Result<Self> {
        let size = window.inner_size();
        let mut gpu = GpuState::new(
            window.as_ref(),
            size,
            config.antialiasing,
            config.window.surface_alpha,
            config.screen_texture.as_deref(),
            config.blur_radius,
        )
        .context("failed to initialise GPU state")?;

        if !gpu.reload(document.text()).is_swapped() {
            warn!("initial shader failed to compile; rendering a cleared window until a reload succeeds");
        }

        let mut state = Self {
            mouse: MouseState::new(gpu.size().height),
            overlay: config
                .input
                .menu
                .then(|| MenuOverlay::new(window.scale_factor())),
            gpu,
            window,
            phase: PreviewPhase::Uninitialized,
            modifiers: ModifiersState::empty(),
            document,
            dialogs,
            input: config.input,
            base_title: config.window.title.clone(),
            dialog_dir: config.dialog_dir.clone(),
        };
        state.refresh_title();
        state.phase = PreviewPhase::Running;
        Ok(state)
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.mouse.set_height(self.gpu.size().height);
    }

    fn terminate(&mut self, reason: QuitReason, elwt: &EventLoopWindowTarget<PreviewEvent>) {
        if self.phase == PreviewPhase::Terminated {
            return;
        }
        info!(?reason, "closing shader preview");
        self.phase = PreviewPhase::Terminated;
        elwt.exit();
    }

    fn file_name(&self) -> Option<String> {
        self.document
            .path()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn refresh_title(&self) {
        let title = match self.file_name() {
            Some(name) => format!("{} - {}", self.base_title, name),
            None => self.base_title.clone(),
        };
        self.window().set_title(&title);
    }

    fn set_modifiers(&mut self, modifiers: ModifiersState) {
        self.modifiers = modifiers;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_modifiers(modifiers);
        }
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.mouse.handle_cursor_moved(position);
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.handle_cursor_moved(position);
        }
    }

    fn handle_cursor_left(&mut self) {
        self.mouse.handle_cursor_left();
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.handle_cursor_left();
        }
    }

    /// Presses on a menu item stay with the overlay; everything else drives
    /// the shader's mouse uniforms.
    fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let consumed = self
            .overlay
            .as_mut()
            .is_some_and(|overlay| overlay.handle_mouse_button(button, state));
        if button == MouseButton::Left && !consumed {
            self.mouse.handle_button(state);
        }
    }

    fn set_scale_factor(&mut self, scale_factor: f64) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_scale_factor(scale_factor);
        }
    }

    fn handle_key(&mut self, event: &KeyEvent, elwt: &EventLoopWindowTarget<PreviewEvent>) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let Some(action) = menu_action_for(&event.logical_key, self.modifiers, &self.input) else {
            return;
        };
        if action == MenuAction::Quit && self.input.quit_on_any_key {
            self.terminate(QuitReason::KeyPressed, elwt);
            return;
        }
        self.handle_menu_action(action, elwt);
    }

    fn handle_menu_action(&mut self, action: MenuAction, elwt: &EventLoopWindowTarget<PreviewEvent>) {
        debug!(?action, "menu action");
        match action {
            MenuAction::Quit => self.terminate(QuitReason::MenuQuit, elwt),
            MenuAction::Load => self.open_dialog(DialogKind::Load),
            MenuAction::Save => self.open_dialog(DialogKind::Save),
            MenuAction::ReloadFromDisk => match self.document.reload_from_disk() {
                Ok(true) => self.window().request_redraw(),
                Ok(false) => info!("built-in shader has no file to reload; use Ctrl+O to load one"),
                Err(err) => warn!(error = %err, "reload from disk failed"),
            },
        }
    }

    fn open_dialog(&mut self, kind: DialogKind) {
        let start_dir = self
            .document
            .path()
            .and_then(|path| path.parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| self.dialog_dir.clone().filter(|dir| dir.is_dir()));
        if let Some(outcome) = self.dialogs.open(kind, start_dir.as_deref()) {
            self.apply_dialog(outcome);
        }
    }

    fn handle_preview_event(&mut self, event: PreviewEvent) {
        match event {
            PreviewEvent::Dialog(outcome) => {
                debug!(kind = ?outcome.kind(), "dialog closed");
                self.dialogs.finish();
                self.apply_dialog(outcome);
            }
        }
    }

    fn apply_dialog(&mut self, outcome: DialogOutcome) {
        if apply_dialog_outcome(&mut self.document, outcome) == DocumentChange::Loaded {
            self.refresh_title();
            self.window().request_redraw();
        }
    }

    /// Renders one frame and returns the menu items clicked in it.
    fn render_frame(&mut self) -> Result<Vec<MenuAction>, wgpu::SurfaceError> {
        if self.document.poll_changes(Instant::now()) {
            debug!("shader file changed on disk");
        }
        if self.document.take_reload() {
            self.gpu.reload(self.document.text());
        }

        let status = self.file_name().unwrap_or_else(|| "built-in".to_owned());
        let size = self.gpu.size();
        let frame = self.overlay.as_mut().map(|overlay| overlay.run(size, &status));
        self.gpu
            .render(self.mouse.as_uniform(), frame.as_ref().map(|frame| &frame.paint))?;
        Ok(frame.map(|frame| frame.actions).unwrap_or_default())
    }
}

fn build_window(options: &WindowOptions, event_loop: &EventLoop<PreviewEvent>) -> Result<Window> {
    let level = if options.always_on_top {
        WindowLevel::AlwaysOnTop
    } else {
        WindowLevel::Normal
    };
    WindowBuilder::new()
        .with_title(options.title.clone())
        .with_inner_size(PhysicalSize::new(options.size.0, options.size.1))
        .with_transparent(options.surface_alpha == SurfaceAlpha::Transparent)
        .with_window_level(level)
        .with_resizable(options.resizable)
        .build(event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))
}

fn load_document(config: &RendererConfig) -> Result<ShaderDocument> {
    let mut document = match &config.shader {
        ShaderOrigin::Builtin(builtin) => {
            info!(shader = %builtin, "using built-in shader");
            ShaderDocument::from_text(builtin.source())
        }
        ShaderOrigin::File(path) => {
            info!(path = %path.display(), "loading shader");
            ShaderDocument::open(path)?
        }
    };

    if let Some(interval) = config.watch_interval {
        if document.path().is_some() {
            document.enable_watch(interval);
        } else {
            warn!("--watch has no effect on a built-in shader");
        }
    }
    Ok(document)
}

/// Opens the preview window and blocks until it is closed.
pub(crate) fn run_preview(config: RendererConfig) -> Result<()> {
    let document = load_document(&config)?;

    let event_loop = EventLoopBuilder::<PreviewEvent>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = Arc::new(build_window(&config.window, &event_loop)?);
    let dialogs = DialogLauncher::new(event_loop.create_proxy());

    let mut state = WindowState::new(window, &config, document, dialogs)?;
    info!(
        width = state.gpu.size().width,
        height = state.gpu.size().height,
        program = state.gpu.has_program(),
        "shader preview running"
    );
    state.window().request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::UserEvent(event) => state.handle_preview_event(event),
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        state.terminate(QuitReason::WindowClosed, elwt);
                    }
                    WindowEvent::ModifiersChanged(modifiers) => {
                        state.set_modifiers(modifiers.state());
                    }
                    WindowEvent::KeyboardInput { event, .. } => state.handle_key(&event, elwt),
                    WindowEvent::CursorMoved { position, .. } => {
                        state.handle_cursor_moved(position);
                    }
                    WindowEvent::CursorLeft { .. } => state.handle_cursor_left(),
                    WindowEvent::MouseInput {
                        state: button_state,
                        button,
                        ..
                    } => state.handle_mouse_button(button, button_state),
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::ScaleFactorChanged {
                        scale_factor,
                        mut inner_size_writer,
                    } => {
                        state.set_scale_factor(scale_factor);
                        let _ = inner_size_writer.request_inner_size(state.gpu.size());
                    }
                    WindowEvent::RedrawRequested if state.phase == PreviewPhase::Running => {
                        match state.render_frame() {
                            Ok(actions) => {
                                for action in actions {
                                    if state.phase == PreviewPhase::Terminated {
                                        break;
                                    }
                                    state.handle_menu_action(action, elwt);
                                }
                            }
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                state.gpu.reconfigure();
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                error!("surface out of memory; exiting preview");
                                state.terminate(QuitReason::SurfaceOutOfMemory, elwt);
                            }
                            Err(wgpu::SurfaceError::Timeout) => {
                                debug!("surface timeout; retrying next frame");
                            }
                            Err(other) => {
                                warn!(error = ?other, "surface error; retrying next frame");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait if state.phase == PreviewPhase::Running => {
                state.window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
            Event::LoopExiting => {
                debug!(
                    cursor = ?state.mouse.as_uniform().cursor,
                    "event loop exiting"
                );
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
