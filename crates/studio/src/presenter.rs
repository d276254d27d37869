use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use agent_core::{
    ChatState, ChatStore, ExecutorConfig, GenerationBackend, TurnOrchestrator, TurnOutcome,
};
use canvas_core::{
    apply_wheel, command_for_key, state::DEFAULT_SCREEN, CanvasState, CanvasStore, FrameConfig,
    GestureController, GestureStart, KeyPress, Point, PointerDown, Size, WheelInput, ZOOM_STEP,
};
use shared::domain::{ActiveFilter, Entity, EntityId};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

/// Pause between the first entity landing and the automatic fit, so cards
/// created in a burst are framed together.
pub const AUTO_FIT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct PresenterConfig {
    pub frame: FrameConfig,
    pub executor: ExecutorConfig,
    pub screen: Size,
    pub auto_fit_delay: Duration,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            executor: ExecutorConfig::default(),
            screen: DEFAULT_SCREEN,
            auto_fit_delay: AUTO_FIT_DELAY,
        }
    }
}

pub struct Presenter {
    canvas: CanvasStore,
    chat: ChatStore,
    turns: Arc<TurnOrchestrator>,
    gestures: Mutex<GestureController>,
    auto_fit_delay: Duration,
}

impl Presenter {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: PresenterConfig) -> Arc<Self> {
        let canvas = CanvasStore::new(config.frame);
        canvas.resize(config.screen);
        let chat = ChatStore::new();
        let turns = Arc::new(TurnOrchestrator::new(
            chat.clone(),
            canvas.clone(),
            backend,
            config.executor,
        ));
        info!(
            width = config.screen.width,
            height = config.screen.height,
            "presenter: ready"
        );
        Arc::new(Self {
            canvas,
            chat,
            turns,
            gestures: Mutex::new(GestureController::new()),
            auto_fit_delay: config.auto_fit_delay,
        })
    }

    pub fn canvas(&self) -> &CanvasStore {
        &self.canvas
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn subscribe_canvas(&self) -> watch::Receiver<Arc<CanvasState>> {
        self.canvas.subscribe()
    }

    pub fn subscribe_chat(&self) -> watch::Receiver<Arc<ChatState>> {
        self.chat.subscribe()
    }

    // --- viewport ---

    pub fn pan(&self, dx: f64, dy: f64) {
        self.canvas.pan(dx, dy);
    }

    pub fn zoom_at_point(&self, anchor: Point, factor: f64) {
        self.canvas.zoom_at_point(anchor, factor);
    }

    pub fn fit_to_screen(&self) {
        self.canvas.fit_to_screen();
    }

    pub fn focus_selected(&self) {
        self.canvas.focus_selected();
    }

    pub fn reset_zoom(&self) {
        self.canvas.reset_zoom();
    }

    pub fn step_zoom(&self, delta: f64) {
        self.canvas.step_zoom(delta);
    }

    pub fn zoom_in(&self) {
        self.canvas.step_zoom(ZOOM_STEP);
    }

    pub fn zoom_out(&self) {
        self.canvas.step_zoom(-ZOOM_STEP);
    }

    pub fn resize(&self, screen: Size) {
        self.canvas.resize(screen);
    }

    // --- entities and selection ---

    pub fn add_entity(&self, entity: Entity) {
        self.canvas.add_entity(entity);
    }

    pub fn remove_entity(&self, id: EntityId) -> bool {
        let removed = self.canvas.remove_entity(id);
        if removed && self.gestures().dragged_entity() == Some(id) {
            self.gestures().pointer_up();
        }
        removed
    }

    pub fn toggle_selection(&self, id: EntityId, multi: bool) {
        self.canvas.toggle_selection(id, multi);
    }

    pub fn clear_selection(&self) {
        self.canvas.clear_selection();
    }

    pub fn set_filter(&self, filter: ActiveFilter) {
        self.canvas.set_filter(filter);
    }

    // --- input ---

    pub fn pointer_down(&self, event: PointerDown) -> GestureStart {
        let start = self.gestures().pointer_down(&self.canvas, event);
        debug!(?start, "presenter: pointer down");
        start
    }

    pub fn pointer_move(&self, position: Point) {
        self.gestures().pointer_move(&self.canvas, position);
    }

    pub fn pointer_up(&self) {
        self.gestures().pointer_up();
    }

    pub fn wheel(&self, input: WheelInput) {
        apply_wheel(&self.canvas, input);
    }

    /// Returns `true` when the key was consumed as a canvas shortcut.
    pub fn handle_key(&self, press: &KeyPress) -> bool {
        match command_for_key(press) {
            Some(command) => {
                debug!(?command, "presenter: hotkey");
                command.apply(&self.canvas);
                true
            }
            None => false,
        }
    }

    // --- chat ---

    pub fn set_input(&self, input: impl Into<String>) {
        self.chat.set_input(input);
    }

    pub fn is_busy(&self) -> bool {
        self.turns.is_busy()
    }

    /// Sends the input box as a new turn and waits for it to end.
    pub async fn send_message(&self) -> TurnOutcome {
        self.turns.send_message().await
    }

    /// Sends the input box on a background task so the caller stays
    /// responsive while the turn streams.
    pub fn spawn_send_message(&self) -> JoinHandle<TurnOutcome> {
        let turns = self.turns.clone();
        tokio::spawn(async move { turns.send_message().await })
    }

    pub fn cancel_turn(&self) -> bool {
        self.turns.cancel_turn()
    }

    /// Watches the canvas and fits it to the screen the first time it goes
    /// from empty to populated. The task ends when the presenter is dropped.
    pub fn spawn_auto_fit(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.canvas.subscribe();
        let mut was_empty = rx.borrow_and_update().entities.is_empty();
        let presenter = Arc::downgrade(self);
        let delay = self.auto_fit_delay;
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let is_empty = rx.borrow_and_update().entities.is_empty();
                if !(was_empty && !is_empty) {
                    was_empty = is_empty;
                    continue;
                }
                tokio::time::sleep(delay).await;
                let Some(presenter) = presenter.upgrade() else {
                    break;
                };
                debug!("presenter: fitting first content");
                presenter.fit_to_screen();
                was_empty = presenter.canvas.snapshot().entities.is_empty();
            }
        })
    }

    fn gestures(&self) -> MutexGuard<'_, GestureController> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
