//! Entity store plus the viewport operations that mutate it.

use std::sync::Arc;

use kurbo::{Point, Size, Vec2};
use shared::domain::{ActiveFilter, Entity, EntityId, Viewport};
use tokio::sync::watch;
use tracing::debug;

use crate::{
    frame::{self, FrameConfig},
    interaction::{InteractionDebounce, INTERACTION_SETTLE},
    state::CanvasState,
    store::Store,
    viewport,
};

/// Step used by the zoom HUD buttons.
pub const ZOOM_STEP: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct CanvasStore {
    store: Store<CanvasState>,
    frame: FrameConfig,
    debounce: InteractionDebounce,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl CanvasStore {
    pub fn new(frame: FrameConfig) -> Self {
        Self::with_state(frame, CanvasState::default())
    }

    pub fn with_state(frame: FrameConfig, state: CanvasState) -> Self {
        Self {
            store: Store::new(state),
            frame,
            debounce: InteractionDebounce::new(INTERACTION_SETTLE),
        }
    }

    pub fn snapshot(&self) -> Arc<CanvasState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CanvasState>> {
        self.store.subscribe()
    }

    pub fn frame_config(&self) -> &FrameConfig {
        &self.frame
    }

    /// Raw atomic mutation, used by collaborators that must check a condition
    /// and mutate in one step. Publishes only when `mutate` returns `true`.
    pub fn update(&self, mutate: impl FnOnce(&mut CanvasState) -> bool) -> bool {
        self.store.update(mutate)
    }

    pub fn resize(&self, screen: Size) {
        if !(screen.width.is_finite() && screen.height.is_finite()) {
            return;
        }
        self.store.update(|state| {
            if state.screen == screen {
                return false;
            }
            state.screen = screen;
            true
        });
    }

    // --- viewport ---

    pub fn pan(&self, dx: f64, dy: f64) {
        self.set_viewport_with(|current, _| viewport::pan(current, Vec2::new(dx, dy)));
        self.debounce.touch(&self.store);
    }

    pub fn zoom_at_point(&self, anchor: Point, factor: f64) {
        self.set_viewport_with(|current, _| viewport::zoom_at_point(current, anchor, factor));
        self.debounce.touch(&self.store);
    }

    /// Moves the viewport offset without touching zoom; used by drag-to-pan.
    pub fn set_offset(&self, offset: Vec2) {
        if !offset.is_finite() {
            return;
        }
        self.set_viewport_with(|current, _| Viewport {
            x: offset.x,
            y: offset.y,
            zoom: current.zoom,
        });
        self.debounce.touch(&self.store);
    }

    /// Zoom back to 100% about the middle of the window.
    pub fn reset_zoom(&self) {
        self.set_viewport_with(|current, screen| {
            viewport::zoom_to_at_point(current, screen_center(screen), 1.0)
        });
    }

    /// Adds `delta` to the zoom level about the middle of the window.
    pub fn step_zoom(&self, delta: f64) {
        self.set_viewport_with(|current, screen| {
            let target = viewport::clamp_zoom(current.zoom + delta);
            viewport::zoom_to_at_point(current, screen_center(screen), target)
        });
    }

    pub fn fit_to_screen(&self) {
        let frame = self.frame;
        self.commit_framed(move |state| frame::frame_entities(&state.entities, state.screen, &frame));
    }

    /// Frames the selection, or everything when nothing is selected.
    pub fn focus_selected(&self) {
        let frame = self.frame;
        self.commit_framed(move |state| {
            if state.selection.is_empty() {
                frame::frame_entities(&state.entities, state.screen, &frame)
            } else {
                frame::frame_entities(
                    state
                        .entities
                        .iter()
                        .filter(|entity| state.selection.contains(&entity.id)),
                    state.screen,
                    &frame,
                )
            }
        });
    }

    /// World point at the centre of the window.
    pub fn screen_center_world(&self) -> Point {
        let state = self.snapshot();
        viewport::screen_center_to_world(&state.viewport, state.screen)
    }

    // --- entities ---

    pub fn add_entity(&self, entity: Entity) {
        debug!(entity_id = %entity.id, kind = %entity.kind, "canvas: add entity");
        self.store.update(|state| {
            state.entities.insert(0, entity);
            true
        });
    }

    /// Removes an entity and its selection entry in one published update.
    pub fn remove_entity(&self, id: EntityId) -> bool {
        let removed = self.store.update(|state| state.remove_entity(id));
        if removed {
            debug!(entity_id = %id, "canvas: removed entity");
        }
        removed
    }

    /// Shifts an entity by a screen-space delta, scaled into world units.
    pub fn drag_entity_by(&self, id: EntityId, screen_delta: Vec2) -> bool {
        if !screen_delta.is_finite() {
            return false;
        }
        let moved = self.store.update(|state| {
            let world = viewport::screen_delta_to_world(&state.viewport, screen_delta);
            match state.entity_mut(id) {
                Some(entity) => {
                    entity.position.x += world.x;
                    entity.position.y += world.y;
                    true
                }
                None => false,
            }
        });
        if moved {
            self.debounce.touch(&self.store);
        }
        moved
    }

    pub fn set_filter(&self, filter: ActiveFilter) {
        self.store.update(|state| {
            if state.filter == filter {
                return false;
            }
            state.filter = filter;
            true
        });
    }

    // --- selection ---

    /// `multi == false` replaces the selection with `{id}`; `multi == true`
    /// toggles `id` in the existing set. Unknown ids are ignored.
    pub fn toggle_selection(&self, id: EntityId, multi: bool) {
        self.store.update(|state| {
            if !state.contains(id) {
                return false;
            }
            if multi {
                if !state.selection.remove(&id) {
                    state.selection.insert(id);
                }
            } else {
                state.selection.clear();
                state.selection.insert(id);
            }
            true
        });
    }

    /// Selection applied when a drag starts on an entity. The dragged entity
    /// always ends up selected: `multi` adds it to the set, otherwise it
    /// replaces the set. An already selected entity keeps the selection as is.
    pub fn select_for_drag(&self, id: EntityId, multi: bool) {
        self.store.update(|state| {
            if !state.contains(id) || state.is_selected(id) {
                return false;
            }
            if !multi {
                state.selection.clear();
            }
            state.selection.insert(id);
            true
        });
    }

    pub fn clear_selection(&self) {
        self.store.update(|state| {
            if state.selection.is_empty() {
                return false;
            }
            state.selection.clear();
            true
        });
    }

    pub fn selected_entities(&self) -> Vec<Entity> {
        self.snapshot().selected_entities()
    }

    fn set_viewport_with(&self, next: impl FnOnce(Viewport, Size) -> Viewport) {
        self.store.update(|state| {
            let updated = next(state.viewport, state.screen);
            if updated == state.viewport {
                return false;
            }
            state.viewport = updated;
            true
        });
    }

    fn commit_framed(&self, compute: impl FnOnce(&CanvasState) -> Viewport) {
        self.debounce.settle_now(&self.store);
        self.store.update(|state| {
            let framed = compute(state);
            if framed == state.viewport {
                return false;
            }
            debug!(x = framed.x, y = framed.y, zoom = framed.zoom, "canvas: framed viewport");
            state.viewport = framed;
            true
        });
    }
}

fn screen_center(screen: Size) -> Point {
    Point::new(screen.width / 2.0, screen.height / 2.0)
}

#[cfg(test)]
#[path = "tests/canvas_tests.rs"]
mod tests;
