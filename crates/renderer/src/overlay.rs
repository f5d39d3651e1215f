//! Clickable menu drawn over the shader with egui.
//!
//! Window events are translated into `egui::RawInput` here and each frame's
//! tessellated output is handed to the GPU painter. Only the menu buttons
//! capture clicks; everywhere else the pointer keeps driving the shader's
//! mouse uniforms.

use std::time::Instant;

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::ModifiersState;

use crate::menu::MenuAction;

const MENU_ITEMS: [(MenuAction, &str, &str); 4] = [
    (MenuAction::Load, "Load", "Load a shader file (Ctrl+O)"),
    (MenuAction::Save, "Save", "Save the shader text (Ctrl+S)"),
    (MenuAction::ReloadFromDisk, "Reload", "Reload from disk (Ctrl+R, F5)"),
    (MenuAction::Quit, "Quit", "Close the preview (Ctrl+Q, Esc)"),
];

const MENU_OFFSET: f32 = 8.0;

/// Triangles and texture changes for one overlay frame, in egui points.
pub(crate) struct OverlayPaint {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub(crate) struct OverlayFrame {
    pub actions: Vec<MenuAction>,
    pub paint: OverlayPaint,
}

pub(crate) struct MenuOverlay {
    ctx: egui::Context,
    events: Vec<egui::Event>,
    modifiers: egui::Modifiers,
    pointer: Option<egui::Pos2>,
    pixels_per_point: f32,
    started: Instant,
    item_rects: Vec<(MenuAction, egui::Rect)>,
}

impl MenuOverlay {
    pub(crate) fn new(scale_factor: f64) -> Self {
        Self {
            ctx: egui::Context::default(),
            events: Vec::new(),
            modifiers: egui::Modifiers::NONE,
            pointer: None,
            pixels_per_point: scale_factor as f32,
            started: Instant::now(),
            item_rects: Vec::new(),
        }
    }

    pub(crate) fn set_scale_factor(&mut self, scale_factor: f64) {
        self.pixels_per_point = scale_factor as f32;
    }

    pub(crate) fn set_modifiers(&mut self, modifiers: ModifiersState) {
        self.modifiers = egui_modifiers(modifiers);
    }

    pub(crate) fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let pos = to_points(position, self.pixels_per_point);
        self.pointer = Some(pos);
        self.events.push(egui::Event::PointerMoved(pos));
    }

    pub(crate) fn handle_cursor_left(&mut self) {
        self.pointer = None;
        self.events.push(egui::Event::PointerGone);
    }

    /// Forwards a button change and reports whether a press landed on a
    /// menu item. Releases are never consumed so a drag that started on the
    /// shader always ends there.
    pub(crate) fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) -> bool {
        let (Some(pos), Some(button)) = (self.pointer, egui_button(button)) else {
            return false;
        };
        let pressed = state == ElementState::Pressed;
        self.events.push(egui::Event::PointerButton {
            pos,
            button,
            pressed,
            modifiers: self.modifiers,
        });
        pressed && self.captures_pointer()
    }

    pub(crate) fn captures_pointer(&self) -> bool {
        self.pointer
            .is_some_and(|pos| self.item_rects.iter().any(|(_, rect)| rect.contains(pos)))
    }

    /// Lays out the menu for a surface of `size` pixels and returns the
    /// actions clicked since the previous frame.
    pub(crate) fn run(&mut self, size: PhysicalSize<u32>, status: &str) -> OverlayFrame {
        let screen = egui::vec2(size.width as f32, size.height as f32) / self.pixels_per_point;
        let mut raw_input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, screen)),
            time: Some(self.started.elapsed().as_secs_f64()),
            modifiers: self.modifiers,
            events: std::mem::take(&mut self.events),
            focused: true,
            ..Default::default()
        };
        raw_input
            .viewports
            .entry(egui::ViewportId::ROOT)
            .or_default()
            .native_pixels_per_point = Some(self.pixels_per_point);

        let mut actions = Vec::new();
        let mut item_rects = Vec::with_capacity(MENU_ITEMS.len());
        let output = self.ctx.run(raw_input, |ctx| {
            // egui may run a frame twice; only the last pass counts.
            actions.clear();
            item_rects.clear();
            egui::Area::new(egui::Id::new("preview menu"))
                .anchor(egui::Align2::LEFT_TOP, egui::vec2(MENU_OFFSET, MENU_OFFSET))
                .show(ctx, |ui| {
                    egui::Frame::menu(ui.style()).show(ui, |ui| {
                        ui.horizontal(|ui| {
                            for (action, label, hint) in MENU_ITEMS {
                                let response = ui.button(label).on_hover_text(hint);
                                item_rects.push((action, response.rect));
                                if response.clicked() {
                                    actions.push(action);
                                }
                            }
                            ui.separator();
                            ui.label(status);
                        });
                    });
                });
        });
        self.item_rects = item_rects;

        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        OverlayFrame {
            actions,
            paint: OverlayPaint {
                primitives,
                textures: output.textures_delta,
                pixels_per_point: output.pixels_per_point,
            },
        }
    }
}

fn to_points(position: PhysicalPosition<f64>, pixels_per_point: f32) -> egui::Pos2 {
    egui::pos2(
        position.x as f32 / pixels_per_point,
        position.y as f32 / pixels_per_point,
    )
}

fn egui_button(button: MouseButton) -> Option<egui::PointerButton> {
    match button {
        MouseButton::Left => Some(egui::PointerButton::Primary),
        MouseButton::Right => Some(egui::PointerButton::Secondary),
        MouseButton::Middle => Some(egui::PointerButton::Middle),
        MouseButton::Back => Some(egui::PointerButton::Extra1),
        MouseButton::Forward => Some(egui::PointerButton::Extra2),
        MouseButton::Other(_) => None,
    }
}

fn egui_modifiers(modifiers: ModifiersState) -> egui::Modifiers {
    egui::Modifiers {
        alt: modifiers.alt_key(),
        ctrl: modifiers.control_key(),
        shift: modifiers.shift_key(),
        mac_cmd: cfg!(target_os = "macos") && modifiers.super_key(),
        command: if cfg!(target_os = "macos") {
            modifiers.super_key()
        } else {
            modifiers.control_key()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: PhysicalSize<u32> = PhysicalSize::new(600, 400);

    fn centre_of(overlay: &MenuOverlay, action: MenuAction) -> PhysicalPosition<f64> {
        let (_, rect) = overlay
            .item_rects
            .iter()
            .find(|(item, _)| *item == action)
            .copied()
            .expect("menu item laid out");
        let centre = rect.center() * overlay.pixels_per_point;
        PhysicalPosition::new(centre.x as f64, centre.y as f64)
    }

    fn click(overlay: &mut MenuOverlay, position: PhysicalPosition<f64>) -> (bool, Vec<MenuAction>) {
        let mut actions = Vec::new();
        overlay.handle_cursor_moved(position);
        actions.extend(overlay.run(SIZE, "built-in").actions);
        let consumed = overlay.handle_mouse_button(MouseButton::Left, ElementState::Pressed);
        actions.extend(overlay.run(SIZE, "built-in").actions);
        overlay.handle_mouse_button(MouseButton::Left, ElementState::Released);
        actions.extend(overlay.run(SIZE, "built-in").actions);
        (consumed, actions)
    }

    #[test]
    fn first_frame_uploads_font_atlas_and_lays_out_every_item() {
        let mut overlay = MenuOverlay::new(1.0);
        let frame = overlay.run(SIZE, "glass.frag");

        assert!(frame.actions.is_empty());
        assert!(!frame.paint.primitives.is_empty());
        assert!(frame
            .paint
            .textures
            .set
            .iter()
            .any(|(id, delta)| *id == egui::TextureId::default() && delta.pos.is_none()));

        let laid_out: Vec<_> = overlay.item_rects.iter().map(|(action, _)| *action).collect();
        assert_eq!(
            laid_out,
            vec![
                MenuAction::Load,
                MenuAction::Save,
                MenuAction::ReloadFromDisk,
                MenuAction::Quit
            ]
        );
        for (_, rect) in &overlay.item_rects {
            assert!(rect.min.x >= MENU_OFFSET && rect.min.y >= MENU_OFFSET);
        }
    }

    #[test]
    fn clicking_a_menu_item_emits_its_action() {
        for action in [MenuAction::Load, MenuAction::Quit] {
            let mut overlay = MenuOverlay::new(1.0);
            overlay.run(SIZE, "built-in");
            let target = centre_of(&overlay, action);

            let (consumed, actions) = click(&mut overlay, target);
            assert!(consumed);
            assert_eq!(actions, vec![action]);
        }
    }

    #[test]
    fn clicks_away_from_the_menu_reach_the_shader() {
        let mut overlay = MenuOverlay::new(1.0);
        overlay.run(SIZE, "built-in");

        let (consumed, actions) = click(&mut overlay, PhysicalPosition::new(500.0, 350.0));
        assert!(!consumed);
        assert!(actions.is_empty());
    }

    #[test]
    fn hidpi_positions_are_converted_to_points() {
        let mut overlay = MenuOverlay::new(1.0);
        overlay.set_scale_factor(2.0);
        overlay.handle_cursor_moved(PhysicalPosition::new(200.0, 100.0));
        assert_eq!(overlay.pointer, Some(egui::pos2(100.0, 50.0)));

        let frame = overlay.run(SIZE, "built-in");
        assert_eq!(frame.paint.pixels_per_point, 2.0);

        let target = centre_of(&overlay, MenuAction::Save);
        let (consumed, actions) = click(&mut overlay, target);
        assert!(consumed);
        assert_eq!(actions, vec![MenuAction::Save]);
    }

    #[test]
    fn cursor_leaving_releases_capture() {
        let mut overlay = MenuOverlay::new(1.0);
        overlay.run(SIZE, "built-in");
        overlay.handle_cursor_moved(centre_of(&overlay, MenuAction::Load));
        assert!(overlay.captures_pointer());

        overlay.handle_cursor_left();
        assert!(!overlay.captures_pointer());
        assert!(!overlay.handle_mouse_button(MouseButton::Left, ElementState::Pressed));
    }

    #[test]
    fn modifiers_follow_the_platform_command_key() {
        let ctrl = egui_modifiers(ModifiersState::CONTROL);
        assert!(ctrl.ctrl);
        assert_eq!(ctrl.command, !cfg!(target_os = "macos"));

        let shift_alt = egui_modifiers(ModifiersState::SHIFT | ModifiersState::ALT);
        assert!(shift_alt.shift && shift_alt.alt && !shift_alt.ctrl);
        assert_eq!(egui_button(MouseButton::Other(9)), None);
        assert_eq!(egui_button(MouseButton::Left), Some(egui::PointerButton::Primary));
    }
}
