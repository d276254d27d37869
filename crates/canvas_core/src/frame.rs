//! Auto-framing: choose a viewport that centres a set of entities inside the
//! part of the window not covered by fixed chrome.

use kurbo::{Point, Rect, Size};
use shared::domain::{Entity, EntityKind, Viewport, ZOOM_MIN};

/// Estimated on-canvas card width, shared by every kind.
pub const CARD_WIDTH: f64 = 400.0;

/// Screen-space margins occupied by persistent chrome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insets {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Insets {
    pub const fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }
}

impl Default for Insets {
    /// Left tool rail, right agent panel, bottom zoom strip.
    fn default() -> Self {
        Self::new(85.0, 380.0, 0.0, 80.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameConfig {
    pub obstruction: Insets,
    pub padding: f64,
    /// Upper zoom bound when framing exactly one entity.
    pub single_max_zoom: f64,
    /// Upper zoom bound when framing a group.
    pub group_max_zoom: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            obstruction: Insets::default(),
            padding: 60.0,
            single_max_zoom: 1.5,
            group_max_zoom: 1.0,
        }
    }
}

pub fn footprint_size(kind: EntityKind) -> Size {
    let height = match kind {
        EntityKind::Image => 300.0,
        EntityKind::Video => 225.0,
        EntityKind::Text => 360.0,
        EntityKind::Character => 420.0,
        EntityKind::Scene => 320.0,
    };
    Size::new(CARD_WIDTH, height)
}

pub fn footprint(entity: &Entity) -> Rect {
    Rect::from_origin_size(
        Point::new(entity.position.x, entity.position.y),
        footprint_size(entity.kind),
    )
}

pub fn bounding_box<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Option<Rect> {
    entities
        .into_iter()
        .map(footprint)
        .reduce(|acc, rect| acc.union(rect))
}

pub fn usable_rect(screen: Size, obstruction: &Insets) -> Rect {
    let x0 = obstruction.left;
    let y0 = obstruction.top;
    let x1 = (screen.width - obstruction.right).max(x0);
    let y1 = (screen.height - obstruction.bottom).max(y0);
    Rect::new(x0, y0, x1, y1)
}

/// Viewport centring `entities` in the unobstructed part of `screen`.
///
/// Identical inputs always produce a bit-identical viewport; an empty set
/// yields [`Viewport::IDENTITY`].
pub fn frame_entities<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
    screen: Size,
    config: &FrameConfig,
) -> Viewport {
    let mut count = 0usize;
    let bbox = bounding_box(entities.into_iter().inspect(|_| count += 1));
    let Some(bbox) = bbox else {
        return Viewport::IDENTITY;
    };

    let usable = usable_rect(screen, &config.obstruction);
    let available_w = (usable.width() - 2.0 * config.padding).max(1.0);
    let available_h = (usable.height() - 2.0 * config.padding).max(1.0);
    let scale = (available_w / bbox.width()).min(available_h / bbox.height());

    let max_zoom = if count == 1 {
        config.single_max_zoom
    } else {
        config.group_max_zoom
    };
    let zoom = scale.min(max_zoom).max(ZOOM_MIN);

    let usable_center = usable.center();
    let bbox_center = bbox.center();
    Viewport {
        x: usable_center.x - bbox_center.x * zoom,
        y: usable_center.y - bbox_center.y * zoom,
        zoom,
    }
}
