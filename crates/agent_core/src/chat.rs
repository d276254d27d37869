//! Transcript state for the agent panel.

use std::sync::Arc;

use canvas_core::Store;
use serde::{Deserialize, Serialize};
use shared::protocol::{HistoryEntry, HistoryRole};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Thinking,
    Writing,
    Generating,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub step: Step,
    pub is_streaming: bool,
    pub is_executing: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            step: Step::Done,
            is_streaming: false,
            is_executing: false,
        }
    }

    /// Empty agent message shown while the backend is thinking.
    pub fn placeholder() -> Self {
        Self {
            role: Role::Agent,
            content: String::new(),
            step: Step::Thinking,
            is_streaming: true,
            is_executing: false,
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            step: Step::Done,
            is_streaming: false,
            is_executing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_streaming || self.is_executing
    }

    pub(crate) fn settle(&mut self) {
        self.is_streaming = false;
        self.is_executing = false;
        self.step = Step::Done;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub messages: Vec<Message>,
    /// True while a turn is in flight.
    pub is_typing: bool,
    pub input: String,
}

impl ChatState {
    /// Transcript replayed to the backend, agent turns mapped to the model
    /// role. Empty messages carry no context and are dropped.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| HistoryEntry {
                role: match message.role {
                    Role::User => HistoryRole::User,
                    Role::Agent => HistoryRole::Model,
                },
                text: message.content.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    store: Store<ChatState>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<ChatState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ChatState>> {
        self.store.subscribe()
    }

    pub fn update(&self, mutate: impl FnOnce(&mut ChatState) -> bool) -> bool {
        self.store.update(mutate)
    }

    pub fn set_input(&self, input: impl Into<String>) {
        let input = input.into();
        self.store.update(|state| {
            if state.input == input {
                return false;
            }
            state.input = input;
            true
        });
    }

    pub fn is_typing(&self) -> bool {
        self.snapshot().is_typing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_maps_roles_and_skips_empty_messages() {
        let state = ChatState {
            messages: vec![
                Message::user("draw the bridge"),
                Message::agent("Added [Bridge] to the canvas."),
                Message::agent("   "),
                Message::user("now animate it"),
            ],
            ..ChatState::default()
        };
        let history = state.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, HistoryRole::User);
        assert_eq!(history[1].role, HistoryRole::Model);
        assert_eq!(history[2].text, "now animate it");
    }

    #[test]
    fn set_input_publishes_only_on_change() {
        let chat = ChatStore::new();
        let mut rx = chat.subscribe();
        chat.set_input("hello");
        assert!(rx.has_changed().expect("alive"));
        rx.borrow_and_update();
        chat.set_input("hello");
        assert!(!rx.has_changed().expect("alive"));
    }
}
