//! Terminal input parsing and the command queue into the backend thread.

use crossbeam_channel::{Sender, TrySendError};
use shared::domain::ActiveFilter;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    SendMessage { text: String },
    CancelTurn,
    FitToScreen,
    FocusSelection,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    Pan { dx: f64, dy: f64 },
    /// Indices refer to the numbered rows printed by `/list`.
    Select { index: usize, multi: bool },
    ClearSelection,
    Remove { index: usize },
    Filter(ActiveFilter),
    Resize { width: f64, height: f64 },
    Key(String),
    ListEntities,
    Quit,
}

pub const HELP: &str = "\
commands:
  <text>                 send a message to the agent
  /cancel                stop the running turn
  /fit  /focus           frame every card, or just the selection
  /zoom in|out|reset     step or reset the zoom
  /pan <dx> <dy>         pan by screen pixels
  /select <n> [multi]    toggle selection of card n from /list
  /clear                 clear the selection
  /remove <n>            delete card n
  /filter <all|media|video|text|scenes>
  /resize <w> <h>        change the virtual screen size
  /key <key>             press a canvas hotkey
  /list                  show cards and the viewport
  /quit";

/// Returns `Ok(None)` for blank lines and `/help`, which the caller handles
/// without touching the backend.
pub fn parse_command(line: &str) -> Result<Option<BackendCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(BackendCommand::SendMessage {
            text: line.to_string(),
        }));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("help", _) => return Ok(None),
        ("cancel", []) => BackendCommand::CancelTurn,
        ("fit", []) => BackendCommand::FitToScreen,
        ("focus", []) => BackendCommand::FocusSelection,
        ("zoom", ["in"]) => BackendCommand::ZoomIn,
        ("zoom", ["out"]) => BackendCommand::ZoomOut,
        ("zoom", ["reset"]) => BackendCommand::ResetZoom,
        ("pan", [dx, dy]) => BackendCommand::Pan {
            dx: parse_number(dx)?,
            dy: parse_number(dy)?,
        },
        ("select", [index]) => BackendCommand::Select {
            index: parse_index(index)?,
            multi: false,
        },
        ("select", [index, "multi"]) => BackendCommand::Select {
            index: parse_index(index)?,
            multi: true,
        },
        ("clear", []) => BackendCommand::ClearSelection,
        ("remove", [index]) => BackendCommand::Remove {
            index: parse_index(index)?,
        },
        ("filter", [filter]) => BackendCommand::Filter(filter.parse()?),
        ("resize", [width, height]) => {
            let width = parse_number(width)?;
            let height = parse_number(height)?;
            if width <= 0.0 || height <= 0.0 {
                return Err("screen size must be positive".to_string());
            }
            BackendCommand::Resize { width, height }
        }
        ("key", [key]) => BackendCommand::Key((*key).to_string()),
        ("list", []) => BackendCommand::ListEntities,
        ("quit" | "exit", []) => BackendCommand::Quit,
        _ => return Err(format!("unrecognised command '/{rest}'; try /help")),
    };
    Ok(Some(command))
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

fn parse_index(raw: &str) -> Result<usize, String> {
    raw.parse::<usize>()
        .map_err(|_| format!("'{raw}' is not a card number"))
}

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = match &cmd {
        BackendCommand::SendMessage { .. } => "send_message",
        BackendCommand::CancelTurn => "cancel_turn",
        BackendCommand::FitToScreen => "fit_to_screen",
        BackendCommand::FocusSelection => "focus_selection",
        BackendCommand::ZoomIn => "zoom_in",
        BackendCommand::ZoomOut => "zoom_out",
        BackendCommand::ResetZoom => "reset_zoom",
        BackendCommand::Pan { .. } => "pan",
        BackendCommand::Select { .. } => "select",
        BackendCommand::ClearSelection => "clear_selection",
        BackendCommand::Remove { .. } => "remove",
        BackendCommand::Filter(_) => "filter",
        BackendCommand::Resize { .. } => "resize",
        BackendCommand::Key(_) => "key",
        BackendCommand::ListEntities => "list_entities",
        BackendCommand::Quit => "quit",
    };

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued terminal->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "backend thread stopped (possible startup failure); restart the studio"
                .to_string();
        }
    }
}
