//! Canvas state and viewport engine: entity store, pan/zoom math,
//! auto-framing, selection and pointer gesture routing.

pub mod canvas;
pub mod frame;
pub mod gesture;
pub mod hotkeys;
mod interaction;
pub mod state;
pub mod store;
pub mod viewport;

pub use canvas::{CanvasStore, ZOOM_STEP};
pub use frame::{FrameConfig, Insets};
pub use gesture::{
    apply_wheel, GestureController, GestureStart, HitTarget, Modifiers, PointerButton,
    PointerDown, WheelInput,
};
pub use hotkeys::{command_for_key, CanvasCommand, KeyPress};
pub use interaction::INTERACTION_SETTLE;
pub use state::CanvasState;
pub use store::Store;

pub use kurbo::{Point, Size, Vec2};
