//! Snapshot store: one immutable state value, replaced wholesale on every
//! mutation and pushed to subscribers.

use std::sync::Arc;

use tokio::sync::watch;

pub struct Store<S> {
    tx: Arc<watch::Sender<Arc<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<S: Clone> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.tx.borrow())
    }

    /// Applies `mutate` to a private copy of the state and publishes it when
    /// the closure reports a change. Returns whether a snapshot was published.
    ///
    /// The closure runs while the channel is locked, so checks made inside it
    /// (cancellation flags, existence of an id) cannot race another writer.
    pub fn update(&self, mutate: impl FnOnce(&mut S) -> bool) -> bool {
        self.tx.send_if_modified(|current| {
            let mut next = S::clone(&**current);
            if mutate(&mut next) {
                *current = Arc::new(next);
                true
            } else {
                false
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.tx.subscribe()
    }
}

impl<S: Default + Clone> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
