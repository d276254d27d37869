//! Pointer routing for canvas gestures.
//!
//! The host reports pointer-down with the hit target under the pointer and
//! forwards every subsequent move/up from the window level, so a gesture keeps
//! tracking after the pointer leaves the canvas bounds.

use kurbo::{Point, Vec2};
use shared::domain::EntityId;
use tracing::debug;

use crate::{canvas::CanvasStore, viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// Empty canvas background.
    Background,
    /// The body of an entity card.
    Entity(EntityId),
    /// Buttons, panels and other interactive chrome.
    Chrome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerDown {
    pub position: Point,
    pub target: HitTarget,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub position: Point,
    pub delta: Vec2,
    pub target: HitTarget,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    PanningCanvas {
        pointer_start: Point,
        offset_at_start: Vec2,
    },
    /// Each move applies only the delta since the previous one, at the zoom
    /// current at that moment.
    DraggingEntity { id: EntityId, last: Point },
}

/// What a pointer-down started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureStart {
    CanvasPan,
    EntityDrag(EntityId),
    Ignored,
}

#[derive(Debug)]
pub struct GestureController {
    gesture: Gesture,
}

impl Default for GestureController {
    fn default() -> Self {
        Self {
            gesture: Gesture::Idle,
        }
    }
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, Gesture::PanningCanvas { .. })
    }

    pub fn dragged_entity(&self) -> Option<EntityId> {
        match self.gesture {
            Gesture::DraggingEntity { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, canvas: &CanvasStore, event: PointerDown) -> GestureStart {
        if event.button != PointerButton::Primary {
            return GestureStart::Ignored;
        }

        let state = canvas.snapshot();
        let start = match event.target {
            HitTarget::Chrome => GestureStart::Ignored,
            HitTarget::Background => GestureStart::CanvasPan,
            HitTarget::Entity(_) if event.modifiers.alt => GestureStart::CanvasPan,
            HitTarget::Entity(id) if state.contains(id) => {
                canvas.select_for_drag(id, event.modifiers.shift || event.modifiers.command());
                self.gesture = Gesture::DraggingEntity {
                    id,
                    last: event.position,
                };
                GestureStart::EntityDrag(id)
            }
            HitTarget::Entity(_) => GestureStart::Ignored,
        };

        if start == GestureStart::CanvasPan {
            self.gesture = Gesture::PanningCanvas {
                pointer_start: event.position,
                offset_at_start: viewport::offset(&state.viewport),
            };
        }
        debug!(?start, "gesture: pointer down");
        start
    }

    pub fn pointer_move(&mut self, canvas: &CanvasStore, position: Point) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::PanningCanvas {
                pointer_start,
                offset_at_start,
            } => {
                canvas.set_offset(viewport::drag_pan_offset(
                    offset_at_start,
                    pointer_start,
                    position,
                ));
            }
            Gesture::DraggingEntity { id, last } => {
                self.gesture = if canvas.drag_entity_by(id, position - last) {
                    Gesture::DraggingEntity { id, last: position }
                } else {
                    // Entity vanished mid-drag.
                    Gesture::Idle
                };
            }
        }
    }

    pub fn pointer_up(&mut self) {
        if self.gesture != Gesture::Idle {
            debug!("gesture: pointer up");
        }
        self.gesture = Gesture::Idle;
    }
}

/// Ctrl/meta + wheel zooms at the cursor, a plain wheel pans. Wheel input over
/// chrome never reaches the canvas.
pub fn apply_wheel(canvas: &CanvasStore, input: WheelInput) {
    if input.target == HitTarget::Chrome {
        return;
    }
    if input.modifiers.command() {
        canvas.zoom_at_point(input.position, viewport::wheel_zoom_factor(input.delta.y));
    } else {
        let delta = viewport::wheel_pan_delta(input.delta);
        canvas.pan(delta.x, delta.y);
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
