use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dungeon::{ContentLoader, Diagnostics, TracingDiagnostics};
use error::{GameError, handle_error};
use hero::UpgradeTable;
use ratatui::{Terminal, backend::CrosstermBackend};
use scopeguard::defer;
use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use tile_rogue::{ConsoleInput, GameConfig, TerminalView, assemble};

const UPGRADES_FILE: &str = "upgrades.json";

fn main() -> ExitCode {
    let config = match GameConfig::discover() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", handle_error(&e));
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config) {
        eprintln!("{}", handle_error(&e));
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "game aborted");
            eprintln!("{}", handle_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &GameConfig) -> Result<(), GameError> {
    let default_level = if config.trace { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &config.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| GameError::io(path, e))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_upgrades(config: &GameConfig) -> Result<UpgradeTable, GameError> {
    let path = config.content_dir.join(UPGRADES_FILE);
    if path.exists() {
        UpgradeTable::load(&path)
    } else {
        tracing::info!(path = %path.display(), "no upgrade table, using built-in upgrades");
        Ok(UpgradeTable::builtin())
    }
}

fn run(config: &GameConfig) -> Result<(), GameError> {
    let diagnostics: Rc<dyn Diagnostics> = Rc::new(TracingDiagnostics::new(config.trace));
    let levels = ContentLoader::open(&config.content_dir, Rc::clone(&diagnostics))?;
    let upgrades = load_upgrades(config)?;

    enable_raw_mode().map_err(|e| GameError::Terminal(format!("failed to enable raw mode: {}", e)))?;
    defer! {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
    execute!(io::stdout(), EnterAlternateScreen)
        .map_err(|e| GameError::Terminal(format!("failed to enter alternate screen: {}", e)))?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .map_err(|e| GameError::Terminal(format!("failed to create terminal: {}", e)))?;

    let (mut game, shared) = assemble(
        config,
        Box::new(levels),
        upgrades,
        Box::new(ConsoleInput::new()),
        diagnostics,
    );
    game.attach(Rc::new(RefCell::new(TerminalView::new(
        terminal,
        shared.world,
        shared.modes,
    ))));

    game.run()
}
