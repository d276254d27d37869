use super::*;

use shared::domain::{Entity, EntityKind, Position};

use crate::{frame::FrameConfig, state::CanvasState};

fn primary(position: Point, target: HitTarget) -> PointerDown {
    PointerDown {
        position,
        target,
        button: PointerButton::Primary,
        modifiers: Modifiers::default(),
    }
}

fn canvas_with_card() -> (CanvasStore, EntityId) {
    let card = Entity::new(EntityKind::Image, "shot", "", Position::new(50.0, 60.0));
    let id = card.id;
    let canvas = CanvasStore::with_state(
        FrameConfig::default(),
        CanvasState {
            entities: vec![card],
            ..CanvasState::default()
        },
    );
    (canvas, id)
}

#[test]
fn background_drag_pans_relative_to_start_offset() {
    let (canvas, _) = canvas_with_card();
    canvas.pan(100.0, 50.0);
    let mut gestures = GestureController::new();

    let start = gestures.pointer_down(&canvas, primary(Point::new(400.0, 300.0), HitTarget::Background));
    assert_eq!(start, GestureStart::CanvasPan);
    assert!(gestures.is_panning());

    gestures.pointer_move(&canvas, Point::new(430.0, 260.0));
    let viewport = canvas.snapshot().viewport;
    assert_eq!((viewport.x, viewport.y), (130.0, 10.0));

    // Pointer left the canvas; the gesture keeps tracking.
    gestures.pointer_move(&canvas, Point::new(-250.0, -90.0));
    let viewport = canvas.snapshot().viewport;
    assert_eq!((viewport.x, viewport.y), (-550.0, -340.0));

    gestures.pointer_up();
    gestures.pointer_move(&canvas, Point::new(0.0, 0.0));
    assert_eq!(canvas.snapshot().viewport.x, -550.0);
}

#[test]
fn entity_drag_selects_and_scales_by_zoom() {
    let (canvas, id) = canvas_with_card();
    canvas.zoom_at_point(Point::ZERO, 2.0);
    let mut gestures = GestureController::new();

    let start = gestures.pointer_down(&canvas, primary(Point::new(200.0, 200.0), HitTarget::Entity(id)));
    assert_eq!(start, GestureStart::EntityDrag(id));
    assert_eq!(gestures.dragged_entity(), Some(id));
    assert!(canvas.snapshot().is_selected(id));

    gestures.pointer_move(&canvas, Point::new(220.0, 210.0));
    gestures.pointer_move(&canvas, Point::new(240.0, 220.0));
    gestures.pointer_up();

    let state = canvas.snapshot();
    assert_eq!(state.entity(id).expect("entity").position, Position::new(70.0, 70.0));
    assert_eq!(state.viewport.x, 0.0, "entity drag must not pan");
}

#[test]
fn zoom_during_drag_does_not_move_the_entity() {
    let (canvas, id) = canvas_with_card();
    canvas.zoom_at_point(Point::ZERO, 2.0);
    let mut gestures = GestureController::new();

    gestures.pointer_down(&canvas, primary(Point::new(200.0, 200.0), HitTarget::Entity(id)));
    gestures.pointer_move(&canvas, Point::new(240.0, 220.0));
    let dragged = canvas.snapshot().entity(id).expect("entity").position;
    assert_eq!(dragged, Position::new(70.0, 70.0));

    canvas.zoom_at_point(Point::new(240.0, 220.0), 0.5);
    gestures.pointer_move(&canvas, Point::new(240.0, 220.0));
    assert_eq!(canvas.snapshot().entity(id).expect("entity").position, dragged);

    // Later moves scale by the new zoom.
    gestures.pointer_move(&canvas, Point::new(250.0, 230.0));
    assert_eq!(
        canvas.snapshot().entity(id).expect("entity").position,
        Position::new(80.0, 80.0)
    );
}

#[test]
fn modifier_press_on_selected_entity_keeps_it_selected() {
    let (canvas, id) = canvas_with_card();
    let other = Entity::new(EntityKind::Text, "note", "", Position::new(900.0, 0.0));
    let other_id = other.id;
    canvas.add_entity(other);
    canvas.toggle_selection(id, false);
    let mut gestures = GestureController::new();

    let mut shift = primary(Point::new(60.0, 70.0), HitTarget::Entity(id));
    shift.modifiers.shift = true;
    assert_eq!(gestures.pointer_down(&canvas, shift), GestureStart::EntityDrag(id));
    assert!(canvas.snapshot().is_selected(id));
    gestures.pointer_up();

    let mut ctrl = primary(Point::new(900.0, 0.0), HitTarget::Entity(other_id));
    ctrl.modifiers.ctrl = true;
    gestures.pointer_down(&canvas, ctrl);
    let state = canvas.snapshot();
    assert!(state.is_selected(id) && state.is_selected(other_id));

    // A second modifier press on either card removes nothing.
    gestures.pointer_up();
    gestures.pointer_down(&canvas, ctrl);
    assert_eq!(canvas.snapshot().selection.len(), 2);

    // Plain toggling still removes from a multi selection.
    canvas.toggle_selection(other_id, true);
    assert!(!canvas.snapshot().is_selected(other_id));
}

#[test]
fn chrome_and_secondary_buttons_do_nothing() {
    let (canvas, id) = canvas_with_card();
    let mut gestures = GestureController::new();
    let before = canvas.snapshot();

    assert_eq!(
        gestures.pointer_down(&canvas, primary(Point::new(10.0, 10.0), HitTarget::Chrome)),
        GestureStart::Ignored
    );
    let mut secondary = primary(Point::new(10.0, 10.0), HitTarget::Entity(id));
    secondary.button = PointerButton::Secondary;
    assert_eq!(gestures.pointer_down(&canvas, secondary), GestureStart::Ignored);

    gestures.pointer_move(&canvas, Point::new(500.0, 500.0));
    assert_eq!(canvas.snapshot(), before);
}

#[test]
fn alt_drag_on_entity_pans_instead() {
    let (canvas, id) = canvas_with_card();
    let mut gestures = GestureController::new();
    let mut down = primary(Point::new(0.0, 0.0), HitTarget::Entity(id));
    down.modifiers.alt = true;

    assert_eq!(gestures.pointer_down(&canvas, down), GestureStart::CanvasPan);
    gestures.pointer_move(&canvas, Point::new(15.0, -5.0));
    let state = canvas.snapshot();
    assert_eq!((state.viewport.x, state.viewport.y), (15.0, -5.0));
    assert_eq!(state.entity(id).expect("entity").position, Position::new(50.0, 60.0));
}

#[test]
fn drag_ends_when_entity_is_removed() {
    let (canvas, id) = canvas_with_card();
    let mut gestures = GestureController::new();
    gestures.pointer_down(&canvas, primary(Point::ZERO, HitTarget::Entity(id)));
    canvas.remove_entity(id);
    gestures.pointer_move(&canvas, Point::new(5.0, 5.0));
    assert_eq!(gestures.dragged_entity(), None);
}

#[test]
fn wheel_routes_zoom_and_pan() {
    let (canvas, _) = canvas_with_card();
    let cursor = Point::new(320.0, 240.0);
    let world_before = viewport::screen_to_world(&canvas.snapshot().viewport, cursor);

    let mut zoom = WheelInput {
        position: cursor,
        delta: Vec2::new(0.0, -120.0),
        target: HitTarget::Background,
        modifiers: Modifiers::default(),
    };
    zoom.modifiers.ctrl = true;
    apply_wheel(&canvas, zoom);
    let after = canvas.snapshot().viewport;
    assert!(after.zoom > 1.0);
    let world_after = viewport::screen_to_world(&after, cursor);
    assert!((world_before.x - world_after.x).abs() < 1e-9);
    assert!((world_before.y - world_after.y).abs() < 1e-9);

    let scroll = WheelInput {
        position: cursor,
        delta: Vec2::new(10.0, 20.0),
        target: HitTarget::Entity(EntityId::generate()),
        modifiers: Modifiers::default(),
    };
    apply_wheel(&canvas, scroll);
    let panned = canvas.snapshot().viewport;
    assert!((panned.x - (after.x - 15.0)).abs() < 1e-9);
    assert!((panned.y - (after.y - 30.0)).abs() < 1e-9);

    apply_wheel(
        &canvas,
        WheelInput {
            target: HitTarget::Chrome,
            ..scroll
        },
    );
    assert_eq!(canvas.snapshot().viewport, panned);
}
