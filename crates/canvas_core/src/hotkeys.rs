use crate::{canvas::CanvasStore, gesture::Modifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasCommand {
    FitToScreen,
    ResetZoom,
    FocusSelection,
    ClearSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// Logical key value, e.g. `"f"`, `"0"`, `"Escape"`.
    pub key: String,
    pub modifiers: Modifiers,
    /// Set while a text input or text area owns keyboard focus.
    pub text_input_focused: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
            text_input_focused: false,
        }
    }
}

pub fn command_for_key(press: &KeyPress) -> Option<CanvasCommand> {
    if press.text_input_focused {
        return None;
    }
    let command = press.modifiers.command();
    match press.key.to_ascii_lowercase().as_str() {
        "0" if command => Some(CanvasCommand::ResetZoom),
        "f" if !command => Some(CanvasCommand::FitToScreen),
        "z" if !command => Some(CanvasCommand::FocusSelection),
        "escape" => Some(CanvasCommand::ClearSelection),
        _ => None,
    }
}

impl CanvasCommand {
    pub fn apply(self, canvas: &CanvasStore) {
        match self {
            Self::FitToScreen => canvas.fit_to_screen(),
            Self::ResetZoom => canvas.reset_zoom(),
            Self::FocusSelection => canvas.focus_selected(),
            Self::ClearSelection => canvas.clear_selection(),
        }
    }
}
