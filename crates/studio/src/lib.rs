//! Composition root for the studio. A single [`Presenter`] owns the canvas
//! and chat stores, the turn orchestrator and the gesture state, and is the
//! only surface a UI calls into.

mod presenter;

pub use presenter::{Presenter, PresenterConfig, AUTO_FIT_DELAY};
