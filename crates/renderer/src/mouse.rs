use winit::dpi::PhysicalPosition;
use winit::event::ElementState;

/// Mouse values uploaded with each frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseUniform {
    /// Shadertoy `iMouse`.
    pub i_mouse: [f32; 4],
    /// Current cursor for `u_mouse`, bottom-left origin.
    pub cursor: [f32; 2],
}

/// Tracks the primary button and cursor in window pixels.
///
/// `iMouse.xy` follows the cursor only while the button is held and keeps
/// its last value afterwards. `iMouse.zw` holds the click origin while the
/// button is down and its negation once released. Both are y-flipped at the
/// moment they are sampled so they share the bottom-left origin of
/// `gl_FragCoord`.
#[derive(Debug, Default)]
pub struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    height: f32,
    pressed: bool,
    drag: [f32; 2],
    click_origin: Option<[f32; 2]>,
}

impl MouseState {
    pub fn new(height: u32) -> Self {
        Self {
            height: height as f32,
            ..Self::default()
        }
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height as f32;
    }

    pub fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.position = Some(position);
        if self.pressed {
            self.drag = self.flipped(position);
        }
    }

    pub fn handle_cursor_left(&mut self) {
        self.position = None;
    }

    pub fn handle_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.pressed = true;
                if let Some(position) = self.position {
                    let flipped = self.flipped(position);
                    self.drag = flipped;
                    self.click_origin = Some(flipped);
                }
            }
            ElementState::Released => {
                self.pressed = false;
            }
        }
    }

    pub fn as_uniform(&self) -> MouseUniform {
        let origin = self.click_origin.unwrap_or([0.0, 0.0]);
        let sign = if self.pressed { 1.0 } else { -1.0 };
        let cursor = self
            .position
            .map(|position| self.flipped(position))
            .unwrap_or([0.0, 0.0]);

        MouseUniform {
            i_mouse: [self.drag[0], self.drag[1], origin[0] * sign, origin[1] * sign],
            cursor,
        }
    }

    fn flipped(&self, position: PhysicalPosition<f64>) -> [f32; 2] {
        [position.x as f32, self.height - position.y as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> PhysicalPosition<f64> {
        PhysicalPosition::new(x, y)
    }

    #[test]
    fn untouched_mouse_is_zero() {
        let mouse = MouseState::new(600);
        assert_eq!(mouse.as_uniform(), MouseUniform::default());
    }

    #[test]
    fn click_origin_is_positive_while_held_and_negated_after_release() {
        let mut mouse = MouseState::new(600);
        mouse.handle_cursor_moved(at(100.0, 100.0));
        mouse.handle_button(ElementState::Pressed);
        assert_eq!(mouse.as_uniform().i_mouse, [100.0, 500.0, 100.0, 500.0]);

        mouse.handle_cursor_moved(at(250.0, 50.0));
        assert_eq!(mouse.as_uniform().i_mouse, [250.0, 550.0, 100.0, 500.0]);

        mouse.handle_button(ElementState::Released);
        assert_eq!(mouse.as_uniform().i_mouse, [250.0, 550.0, -100.0, -500.0]);
    }

    #[test]
    fn drag_position_freezes_after_release() {
        let mut mouse = MouseState::new(600);
        mouse.handle_cursor_moved(at(10.0, 20.0));
        mouse.handle_button(ElementState::Pressed);
        mouse.handle_button(ElementState::Released);
        mouse.handle_cursor_moved(at(300.0, 300.0));

        let uniform = mouse.as_uniform();
        assert_eq!(&uniform.i_mouse[..2], &[10.0, 580.0]);
        assert_eq!(uniform.cursor, [300.0, 300.0]);
    }

    #[test]
    fn cursor_follows_resized_height() {
        let mut mouse = MouseState::new(600);
        mouse.handle_cursor_moved(at(0.0, 100.0));
        mouse.set_height(800);
        assert_eq!(mouse.as_uniform().cursor, [0.0, 700.0]);
    }

    #[test]
    fn cursor_leaving_window_clears_u_mouse_only() {
        let mut mouse = MouseState::new(400);
        mouse.handle_cursor_moved(at(40.0, 40.0));
        mouse.handle_button(ElementState::Pressed);
        mouse.handle_cursor_left();

        let uniform = mouse.as_uniform();
        assert_eq!(uniform.cursor, [0.0, 0.0]);
        assert_eq!(uniform.i_mouse, [40.0, 360.0, 40.0, 360.0]);

        // Still held: re-entering keeps dragging.
        mouse.handle_cursor_moved(at(80.0, 80.0));
        assert_eq!(mouse.as_uniform().i_mouse, [80.0, 320.0, 40.0, 360.0]);
    }
}
