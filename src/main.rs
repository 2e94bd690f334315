use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod columns;
mod controller;
mod dataset;
mod domain;
mod export;
mod filter;
mod inputter;
mod markup;
mod model;
mod sort;
mod surface;
mod table;
mod ui;

use columns::TableOptions;
use controller::Controller;
use dataset::Dataset;
use domain::{TVConfig, TVError};
use export::FileDownloader;
use model::{Model, Status};
use surface::Screen;
use table::DataTable;
use ui::TableUI;

fn main() -> ExitCode {
    let config = TVConfig::parse();
    match run(config) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_tracing(log_file: &str) -> Result<(), TVError> {
    let file = File::create(expand(log_file)?)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVError::TracingInit(e.to_string()))
}

fn expand(path: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::InvalidArgument(e.to_string()))
}

fn run(config: TVConfig) -> Result<(), TVError> {
    init_tracing(&config.log_file)?;
    info!("Starting dtv with {:?}", config);

    let dataset = Dataset::load(expand(&config.path)?)?;
    let options = TableOptions::from_config(&config)?;
    let mut screen = Screen::new(config.containers.clone());
    let table = DataTable::mount(dataset, &config.mount, options, &mut screen)?;
    if let Some(term) = &config.search {
        table.set_global_filter(term)?;
    }
    for (key, term) in &config.filters {
        let column = table.column_index(key)?;
        table.set_column_filter(column, term)?;
    }
    let downloader = FileDownloader::new(expand(&config.output_dir)?);
    info!("Exports are written to {:?}", downloader.dir());

    let mut terminal = ratatui::init();
    let result = execute!(std::io::stdout(), EnableMouseCapture)
        .map_err(TVError::from)
        .and_then(|_| event_loop(&config, screen, downloader, &mut terminal));
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

fn event_loop(
    config: &TVConfig,
    screen: Screen,
    downloader: FileDownloader,
    terminal: &mut DefaultTerminal,
) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        config,
        screen,
        Box::new(downloader),
        size.width as usize,
        size.height as usize,
    );
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;
        let message = controller.handle_event(&model, &ui)?;
        model.update(message)?;
    }
    info!("Quitting");
    Ok(())
}
