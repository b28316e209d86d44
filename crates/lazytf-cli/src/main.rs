mod app;
mod cli;
mod keymap;
mod logging;
mod ui;

use std::env;

use clap::Parser;
use lazytf_core::ConfigResolver;
use lazytf_exec::CommandExecutionEngine;
use tracing::info;

use crate::app::App;
use crate::cli::Cli;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = env::current_dir()?;

    match logging::init(cli.log_file.as_deref()) {
        Ok(path) => info!(log = %path.display(), version = env!("CARGO_PKG_VERSION"), "lazytf starting"),
        Err(err) => eprintln!("warning: logging disabled: {err}"),
    }

    let resolver = ConfigResolver::locate(&cwd, cli.config.as_deref())?;
    let registry = resolver.load()?;
    let engine = CommandExecutionEngine::runtime(registry.settings());
    let app = App::new(resolver, registry, engine);

    ui::run(app)?;
    info!("lazytf exiting");
    Ok(())
}
