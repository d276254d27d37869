//! Pure viewport math. A [`Viewport`] maps world coordinates to screen
//! coordinates as `screen = world * zoom + offset`.
//!
//! Every function here is total: non-finite inputs leave the viewport
//! unchanged and zoom is always clamped into `[ZOOM_MIN, ZOOM_MAX]`.

use kurbo::{Point, Size, Vec2};
use shared::domain::{Viewport, ZOOM_MAX, ZOOM_MIN};

/// Base of the exponential wheel zoom curve.
pub const WHEEL_ZOOM_BASE: f64 = 1.25;
/// Scales raw wheel delta into the exponent of [`WHEEL_ZOOM_BASE`].
pub const WHEEL_ZOOM_SPEED: f64 = 0.005;
/// Multiplier applied to plain wheel scrolling.
pub const WHEEL_PAN_SPEED: f64 = 1.5;

pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() {
        return ZOOM_MIN;
    }
    zoom.clamp(ZOOM_MIN, ZOOM_MAX)
}

pub fn offset(viewport: &Viewport) -> Vec2 {
    Vec2::new(viewport.x, viewport.y)
}

pub fn screen_to_world(viewport: &Viewport, screen: Point) -> Point {
    Point::new(
        (screen.x - viewport.x) / viewport.zoom,
        (screen.y - viewport.y) / viewport.zoom,
    )
}

pub fn world_to_screen(viewport: &Viewport, world: Point) -> Point {
    Point::new(
        world.x * viewport.zoom + viewport.x,
        world.y * viewport.zoom + viewport.y,
    )
}

/// World point currently shown at the middle of a `screen`-sized window.
pub fn screen_center_to_world(viewport: &Viewport, screen: Size) -> Point {
    screen_to_world(viewport, Point::new(screen.width / 2.0, screen.height / 2.0))
}

/// Screen-space delta expressed in world units. The entity layer is scaled by
/// the viewport, so a pointer delta shrinks by the zoom factor.
pub fn screen_delta_to_world(viewport: &Viewport, delta: Vec2) -> Vec2 {
    delta / viewport.zoom
}

pub fn pan(viewport: Viewport, delta: Vec2) -> Viewport {
    if !delta.is_finite() {
        return viewport;
    }
    Viewport {
        x: viewport.x + delta.x,
        y: viewport.y + delta.y,
        zoom: viewport.zoom,
    }
}

/// Zooms by `factor` while keeping the world point under `anchor` fixed on
/// screen.
pub fn zoom_at_point(viewport: Viewport, anchor: Point, factor: f64) -> Viewport {
    if !factor.is_finite() || factor <= 0.0 || !anchor.is_finite() {
        return viewport;
    }
    let world = screen_to_world(&viewport, anchor);
    let zoom = clamp_zoom(viewport.zoom * factor);
    Viewport {
        x: anchor.x - world.x * zoom,
        y: anchor.y - world.y * zoom,
        zoom,
    }
}

/// Sets an absolute zoom level about `anchor`.
pub fn zoom_to_at_point(viewport: Viewport, anchor: Point, zoom: f64) -> Viewport {
    if !zoom.is_finite() || zoom <= 0.0 || !anchor.is_finite() {
        return viewport;
    }
    let world = screen_to_world(&viewport, anchor);
    let zoom = clamp_zoom(zoom);
    Viewport {
        x: anchor.x - world.x * zoom,
        y: anchor.y - world.y * zoom,
        zoom,
    }
}

/// Offset for a canvas drag-to-pan gesture: the world point grabbed at
/// `pointer_start` follows the pointer.
pub fn drag_pan_offset(offset_at_start: Vec2, pointer_start: Point, pointer_now: Point) -> Vec2 {
    pointer_now.to_vec2() - (pointer_start.to_vec2() - offset_at_start)
}

pub fn wheel_zoom_factor(delta_y: f64) -> f64 {
    WHEEL_ZOOM_BASE.powf(-delta_y * WHEEL_ZOOM_SPEED)
}

pub fn wheel_pan_delta(delta: Vec2) -> Vec2 {
    -delta * WHEEL_PAN_SPEED
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_point_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn world_point_under_cursor_is_stable_across_zoom() {
        let anchors = [
            Point::new(0.0, 0.0),
            Point::new(640.0, 360.0),
            Point::new(-120.5, 2048.25),
        ];
        let factors = [0.5, 0.9, 1.1, 2.0, 7.5];
        let start = Viewport {
            x: 35.0,
            y: -80.0,
            zoom: 0.8,
        };

        for anchor in anchors {
            for factor in factors {
                let after = zoom_at_point(start, anchor, factor);
                assert_point_close(
                    screen_to_world(&start, anchor),
                    screen_to_world(&after, anchor),
                );
            }
        }
    }

    #[test]
    fn consecutive_zooms_stay_anchored() {
        let anchor = Point::new(300.0, 200.0);
        let mut viewport = Viewport::IDENTITY;
        let world = screen_to_world(&viewport, anchor);
        for _ in 0..40 {
            viewport = zoom_at_point(viewport, anchor, 1.13);
        }
        for _ in 0..25 {
            viewport = zoom_at_point(viewport, anchor, 0.7);
        }
        let after = screen_to_world(&viewport, anchor);
        assert!((after.x - world.x).abs() < 1e-6);
        assert!((after.y - world.y).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped_after_arbitrary_sequences() {
        let mut viewport = Viewport::IDENTITY;
        let steps: [(f64, f64); 6] = [(50.0, 0.0), (0.001, 12.0), (3.0, -4.0), (1e9, 1.0), (1e-12, 0.5), (1.0, 1.0)];
        for (factor, delta) in steps {
            viewport = zoom_at_point(viewport, Point::new(delta, delta), factor);
            viewport = pan(viewport, Vec2::new(delta, -delta));
            assert!(viewport.zoom >= ZOOM_MIN && viewport.zoom <= ZOOM_MAX);
        }
    }

    #[test]
    fn degenerate_inputs_are_ignored() {
        let start = Viewport {
            x: 4.0,
            y: 5.0,
            zoom: 2.0,
        };
        assert_eq!(zoom_at_point(start, Point::ZERO, 0.0), start);
        assert_eq!(zoom_at_point(start, Point::ZERO, f64::NAN), start);
        assert_eq!(zoom_at_point(start, Point::new(f64::INFINITY, 0.0), 2.0), start);
        assert_eq!(pan(start, Vec2::new(f64::NAN, 1.0)), start);
    }

    #[test]
    fn pan_is_independent_of_zoom() {
        let viewport = Viewport {
            x: 10.0,
            y: 10.0,
            zoom: 3.0,
        };
        let panned = pan(viewport, Vec2::new(5.0, -2.0));
        assert_eq!(panned.x, 15.0);
        assert_eq!(panned.y, 8.0);
        assert_eq!(panned.zoom, 3.0);
    }

    #[test]
    fn drag_delta_is_divided_by_zoom() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            zoom: 2.0,
        };
        assert_eq!(
            screen_delta_to_world(&viewport, Vec2::new(40.0, 20.0)),
            Vec2::new(20.0, 10.0)
        );
    }

    #[test]
    fn drag_pan_tracks_pointer() {
        let offset = drag_pan_offset(
            Vec2::new(100.0, 50.0),
            Point::new(400.0, 300.0),
            Point::new(430.0, 260.0),
        );
        assert_eq!(offset, Vec2::new(130.0, 10.0));
    }

    #[test]
    fn screen_center_maps_back_through_viewport() {
        let viewport = Viewport {
            x: -200.0,
            y: 120.0,
            zoom: 0.5,
        };
        let screen = Size::new(1600.0, 900.0);
        let center = screen_center_to_world(&viewport, screen);
        assert_point_close(world_to_screen(&viewport, center), Point::new(800.0, 450.0));
    }

    #[test]
    fn wheel_up_zooms_in() {
        assert!(wheel_zoom_factor(-100.0) > 1.0);
        assert!(wheel_zoom_factor(100.0) < 1.0);
        assert_eq!(wheel_zoom_factor(0.0), 1.0);
        assert_eq!(wheel_pan_delta(Vec2::new(2.0, -4.0)), Vec2::new(-3.0, 6.0));
    }
}
