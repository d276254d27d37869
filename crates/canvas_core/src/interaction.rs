use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::runtime::Handle;

use crate::{state::CanvasState, store::Store};

pub const INTERACTION_SETTLE: Duration = Duration::from_millis(150);

/// Keeps `CanvasState::interacting` raised while gestures keep arriving and
/// lowers it once they have been quiet for `settle`.
///
/// Each gesture bumps a generation counter; a timer only clears the flag if no
/// newer gesture arrived while it slept. Without a tokio runtime the flag stays
/// raised until [`InteractionDebounce::settle_now`].
#[derive(Debug, Clone)]
pub(crate) struct InteractionDebounce {
    generation: Arc<AtomicU64>,
    settle: Duration,
}

impl InteractionDebounce {
    pub(crate) fn new(settle: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            settle,
        }
    }

    pub(crate) fn touch(&self, store: &Store<CanvasState>) {
        store.update(|state| {
            if state.interacting {
                return false;
            }
            state.interacting = true;
            true
        });

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let counter = Arc::clone(&self.generation);
        let store = store.clone();
        let settle = self.settle;
        handle.spawn(async move {
            tokio::time::sleep(settle).await;
            if counter.load(Ordering::SeqCst) == generation {
                clear(&store);
            }
        });
    }

    /// Lowers the flag immediately and invalidates pending timers.
    pub(crate) fn settle_now(&self, store: &Store<CanvasState>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        clear(store);
    }
}

fn clear(store: &Store<CanvasState>) {
    store.update(|state| {
        if !state.interacting {
            return false;
        }
        state.interacting = false;
        true
    });
}
