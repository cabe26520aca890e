use clap::Parser;
use ratatui::DefaultTerminal;
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use compdir::backend::Backend;
use compdir::client::RestStore;
use compdir::controller::Controller;
use compdir::domain::{AppConfig, Args, DirError};
use compdir::export::expand_path;
use compdir::model::{Model, Status};
use compdir::ui::TableUI;

fn main() -> ExitCode {
    let args = Args::parse();
    let result = AppConfig::try_from(args).and_then(|cfg| {
        init_logging(&cfg)?;
        run(&cfg)
    });
    match result {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(cfg: &AppConfig) -> Result<(), DirError> {
    let path = expand_path(&cfg.log_file)?;
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DirError::Logging(e.to_string()))
}

fn run(cfg: &AppConfig) -> Result<(), DirError> {
    info!("Starting compdir against {}", cfg.api_url);

    let store = RestStore::new(cfg.api_url.clone(), cfg.timeout);
    let backend = Backend::launch(Arc::new(store))?;

    let mut model = Model::init(cfg, backend.commands.clone());
    let mut controller = Controller::new(cfg, backend.events.clone());
    let mut ui = TableUI::new();

    model.reload()?;

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut controller, &mut ui);
    ratatui::restore();

    // The model holds a command sender; it has to go before the worker can stop.
    drop(model);
    backend.shutdown();
    info!("compdir stopped");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    controller: &mut Controller,
    ui: &mut TableUI,
) -> Result<(), DirError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
