//! Plain-text rendering of the chat transcript and the canvas.

use agent_core::{ChatState, Message, Role};
use canvas_core::CanvasState;

/// Prints each agent message once it settles, plus a single progress line
/// while a tool is executing. User messages are never echoed back.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: usize,
    announced: Option<usize>,
}

impl TranscriptPrinter {
    pub fn render(&mut self, state: &ChatState) -> Vec<String> {
        let mut lines = Vec::new();
        // Trailing empty replies are dropped from the transcript.
        self.printed = self.printed.min(state.messages.len());

        for (index, message) in state.messages.iter().enumerate().skip(self.printed) {
            if message.is_active() {
                if message.is_executing && self.announced != Some(index) {
                    self.announced = Some(index);
                    lines.push(format!("  … {}", message.content));
                }
                break;
            }
            if let Some(line) = format_message(message) {
                lines.push(line);
            }
            self.printed = index + 1;
        }
        lines
    }
}

fn format_message(message: &Message) -> Option<String> {
    match message.role {
        Role::User => None,
        Role::Agent if message.content.trim().is_empty() => None,
        Role::Agent => Some(format!("agent> {}", message.content)),
    }
}

/// One numbered row per visible card, in the order `/select` and `/remove`
/// index them, followed by the viewport.
pub fn describe_canvas(state: &CanvasState) -> Vec<String> {
    let mut lines: Vec<String> = state
        .filtered_entities()
        .enumerate()
        .map(|(index, entity)| {
            let marker = if state.is_selected(entity.id) { '*' } else { ' ' };
            format!(
                "{marker}{index:>3}  {:<9} {:<24} ({:.0}, {:.0})",
                entity.kind.as_str(),
                entity.title,
                entity.position.x,
                entity.position.y
            )
        })
        .collect();
    if lines.is_empty() {
        lines.push("  (no cards)".to_string());
    }
    let hidden = state.entities.len() - state.filtered_entities().count();
    if hidden > 0 {
        lines.push(format!("  {hidden} hidden by filter {:?}", state.filter));
    }
    lines.push(format!(
        "  viewport x={:.1} y={:.1} zoom={:.2} screen={}x{}",
        state.viewport.x,
        state.viewport.y,
        state.viewport.zoom,
        state.screen.width,
        state.screen.height
    ));
    lines
}

#[cfg(test)]
mod tests {
    use shared::domain::{ActiveFilter, Entity, EntityKind, Position};

    use super::*;

    #[test]
    fn settled_agent_messages_print_once() {
        let mut printer = TranscriptPrinter::default();
        let mut state = ChatState {
            messages: vec![Message::user("hi"), Message::placeholder()],
            ..ChatState::default()
        };
        assert!(printer.render(&state).is_empty());

        state.messages[1] = Message::agent("Hello there.");
        assert_eq!(printer.render(&state), vec!["agent> Hello there."]);
        assert!(printer.render(&state).is_empty());
    }

    #[test]
    fn executing_tools_are_announced_once() {
        let mut printer = TranscriptPrinter::default();
        let mut working = Message::placeholder();
        working.is_streaming = false;
        working.is_executing = true;
        working.content = "🎨 Painting...".into();
        let mut state = ChatState {
            messages: vec![Message::user("paint"), working],
            ..ChatState::default()
        };

        assert_eq!(printer.render(&state), vec!["  … 🎨 Painting..."]);
        assert!(printer.render(&state).is_empty());

        state.messages[1] = Message::agent("✨ Done");
        assert_eq!(printer.render(&state), vec!["agent> ✨ Done"]);
    }

    #[test]
    fn removed_placeholder_does_not_stall_the_printer() {
        let mut printer = TranscriptPrinter::default();
        let mut state = ChatState {
            messages: vec![Message::user("one"), Message::agent("")],
            ..ChatState::default()
        };
        assert!(printer.render(&state).is_empty());

        state.messages.pop();
        state.messages.push(Message::user("two"));
        state.messages.push(Message::agent("answer"));
        assert_eq!(printer.render(&state), vec!["agent> answer"]);
    }

    #[test]
    fn canvas_rows_follow_the_filter() {
        let scene = Entity::new(EntityKind::Scene, "Harbor", "fog", Position::new(10.0, 20.0));
        let note = Entity::new(EntityKind::Text, "Note", "x", Position::default());
        let mut state = CanvasState {
            entities: vec![scene.clone(), note],
            filter: ActiveFilter::Scenes,
            ..CanvasState::default()
        };
        state.selection.insert(scene.id);

        let lines = describe_canvas(&state);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("*  0  scene"));
        assert!(lines[0].contains("Harbor"));
        assert!(lines[1].contains("1 hidden"));
        assert!(lines[2].contains("zoom=1.00"));
    }
}
