use std::collections::BTreeSet;

use kurbo::Size;
use shared::domain::{ActiveFilter, Entity, EntityId, Viewport};

pub const DEFAULT_SCREEN: Size = Size::new(1280.0, 800.0);

/// Canonical canvas state published by the entity store.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasState {
    /// Newest first.
    pub entities: Vec<Entity>,
    pub selection: BTreeSet<EntityId>,
    pub filter: ActiveFilter,
    pub viewport: Viewport,
    /// True during and shortly after a pan/zoom/drag gesture; renderers
    /// disable transition animation while it is set.
    pub interacting: bool,
    pub screen: Size,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            selection: BTreeSet::new(),
            filter: ActiveFilter::All,
            viewport: Viewport::IDENTITY,
            interacting: false,
            screen: DEFAULT_SCREEN,
        }
    }
}

impl CanvasState {
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    pub fn is_selected(&self, id: EntityId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected entities in canvas order.
    pub fn selected_entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|entity| self.selection.contains(&entity.id))
            .cloned()
            .collect()
    }

    pub fn filtered_entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities
            .iter()
            .filter(|entity| self.filter.matches(entity.kind))
    }

    pub(crate) fn remove_entity(&mut self, id: EntityId) -> bool {
        let before = self.entities.len();
        self.entities.retain(|entity| entity.id != id);
        self.selection.remove(&id);
        self.entities.len() != before
    }
}
