//! Menu actions and the keyboard accelerators that trigger them alongside
//! the clickable overlay.

use winit::keyboard::{Key, ModifiersState, NamedKey};

use crate::types::InputOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Load,
    Save,
    ReloadFromDisk,
    Quit,
}

/// Maps a pressed key to a menu action.
///
/// `Ctrl` and `Super` are interchangeable so the bindings feel native on
/// every platform. File actions are ignored when the menu is disabled;
/// quitting always works.
pub fn menu_action_for(
    key: &Key,
    modifiers: ModifiersState,
    input: &InputOptions,
) -> Option<MenuAction> {
    if input.quit_on_any_key {
        return Some(MenuAction::Quit);
    }

    let command = modifiers.control_key() || modifiers.super_key();
    let action = match key {
        Key::Named(NamedKey::Escape) => MenuAction::Quit,
        Key::Named(NamedKey::F5) => MenuAction::ReloadFromDisk,
        Key::Character(text) if command => match text.to_ascii_lowercase().as_str() {
            "q" => MenuAction::Quit,
            "o" => MenuAction::Load,
            "s" => MenuAction::Save,
            "r" => MenuAction::ReloadFromDisk,
            _ => return None,
        },
        _ => return None,
    };

    if action != MenuAction::Quit && !input.menu {
        return None;
    }
    Some(action)
}
