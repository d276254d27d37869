use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
    thread,
};

use agent_core::{ChatState, GenerationBackend, HttpGenerationBackend, MissingGenerationBackend};
use anyhow::{Context, Result};
use canvas_core::{KeyPress, Size};
use clap::Parser;
use crossbeam_channel::Receiver;
use shared::domain::EntityId;
use studio::Presenter;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod view;

use commands::{dispatch_backend_command, parse_command, BackendCommand, HELP};
use config::{load_settings, normalize_backend_url, Settings};
use view::{describe_canvas, TranscriptPrinter};

#[derive(Parser, Debug)]
#[command(name = "studio", about = "Terminal host for the creative canvas studio")]
struct Args {
    /// Flat `key = "value"` settings file; missing files are ignored.
    #[arg(long, default_value = "studio.toml")]
    config: PathBuf,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    #[arg(long)]
    log_filter: Option<String>,
}

fn apply_args(settings: &mut Settings, args: Args) {
    if let Some(v) = args.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = args.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = args.width {
        settings.window_width = v;
    }
    if let Some(v) = args.height {
        settings.window_height = v;
    }
    if let Some(v) = args.log_filter {
        settings.log_filter = v;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (mut settings, warnings) = load_settings(&args.config);
    apply_args(&mut settings, args);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    for warning in &warnings {
        warn!("{warning}");
    }

    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<BackendCommand>(256);
    let backend_thread = spawn_backend_thread(settings, cmd_rx);

    println!("{HELP}");
    let mut status = String::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read terminal input")?;
        match parse_command(&line) {
            Ok(None) => {
                if line.trim() == "/help" {
                    println!("{HELP}");
                }
            }
            Ok(Some(cmd)) => {
                let quit = cmd == BackendCommand::Quit;
                dispatch_backend_command(&cmd_tx, cmd, &mut status);
                if !status.is_empty() {
                    eprintln!("{status}");
                    status.clear();
                }
                if quit {
                    break;
                }
            }
            Err(message) => eprintln!("{message}"),
        }
    }

    drop(cmd_tx);
    if backend_thread.join().is_err() {
        error!("backend thread panicked");
    }
    Ok(())
}

fn build_backend(settings: &Settings) -> Arc<dyn GenerationBackend> {
    let backend = normalize_backend_url(&settings.backend_url).and_then(|url| {
        info!(backend = %url, "using http generation backend");
        HttpGenerationBackend::new(url, settings.api_key.clone())
    });
    match backend {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            warn!("{err:#}; agent turns will fail until the backend url is fixed");
            Arc::new(MissingGenerationBackend)
        }
    }
}

fn spawn_backend_thread(
    settings: Settings,
    cmd_rx: Receiver<BackendCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("failed to start backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let presenter = Presenter::new(build_backend(&settings), settings.presenter_config());
            let auto_fit = presenter.spawn_auto_fit();
            let printer = tokio::spawn(print_transcript(presenter.subscribe_chat()));

            while let Ok(cmd) = cmd_rx.recv() {
                if !handle_command(&presenter, cmd) {
                    break;
                }
            }

            presenter.cancel_turn();
            printer.abort();
            auto_fit.abort();
            info!("backend command loop stopped");
        });
    })
}

async fn print_transcript(mut rx: watch::Receiver<Arc<ChatState>>) {
    let mut printer = TranscriptPrinter::default();
    loop {
        let state = rx.borrow_and_update().clone();
        for line in printer.render(&state) {
            println!("{line}");
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Returns `false` once the loop should stop.
fn handle_command(presenter: &Arc<Presenter>, cmd: BackendCommand) -> bool {
    match cmd {
        BackendCommand::SendMessage { text } => {
            if presenter.is_busy() {
                println!("the agent is still working; /cancel to stop it");
            } else {
                presenter.set_input(text);
                drop(presenter.spawn_send_message());
            }
        }
        BackendCommand::CancelTurn => {
            if !presenter.cancel_turn() {
                println!("nothing to cancel");
            }
        }
        BackendCommand::FitToScreen => presenter.fit_to_screen(),
        BackendCommand::FocusSelection => presenter.focus_selected(),
        BackendCommand::ZoomIn => presenter.zoom_in(),
        BackendCommand::ZoomOut => presenter.zoom_out(),
        BackendCommand::ResetZoom => presenter.reset_zoom(),
        BackendCommand::Pan { dx, dy } => presenter.pan(dx, dy),
        BackendCommand::Select { index, multi } => match visible_entity(presenter, index) {
            Some(id) => presenter.toggle_selection(id, multi),
            None => println!("no card {index}"),
        },
        BackendCommand::ClearSelection => presenter.clear_selection(),
        BackendCommand::Remove { index } => match visible_entity(presenter, index) {
            Some(id) => {
                presenter.remove_entity(id);
            }
            None => println!("no card {index}"),
        },
        BackendCommand::Filter(filter) => presenter.set_filter(filter),
        BackendCommand::Resize { width, height } => presenter.resize(Size::new(width, height)),
        BackendCommand::Key(key) => {
            if !presenter.handle_key(&KeyPress::new(key.as_str())) {
                println!("'{key}' is not a canvas shortcut");
            }
        }
        BackendCommand::ListEntities => {
            for line in describe_canvas(&presenter.canvas().snapshot()) {
                println!("{line}");
            }
        }
        BackendCommand::Quit => return false,
    }
    true
}

fn visible_entity(presenter: &Presenter, index: usize) -> Option<EntityId> {
    presenter
        .canvas()
        .snapshot()
        .filtered_entities()
        .nth(index)
        .map(|entity| entity.id)
}
